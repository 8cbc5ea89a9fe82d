use std::str::FromStr;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::tours::repo::Difficulty;

#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub name: String,
    pub duration_days: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub price: f64,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    #[serde(default)]
    pub start_dates: Vec<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTourRequest {
    pub name: Option<String>,
    pub duration_days: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub price: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub start_dates: Option<Vec<OffsetDateTime>>,
}

/// Distance unit accepted by the geospatial routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl FromStr for Unit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(Unit::Miles),
            "km" => Ok(Unit::Kilometers),
            _ => Err(AppError::Validation("unit must be 'mi' or 'km'".into())),
        }
    }
}

impl Unit {
    /// Kilometers per one of this unit.
    pub fn km_per_unit(self) -> f64 {
        match self {
            Unit::Miles => 1.609344,
            Unit::Kilometers => 1.0,
        }
    }
}

/// Parses a "lat,lng" path segment.
pub fn parse_latlng(raw: &str) -> Result<(f64, f64), AppError> {
    let invalid = || {
        AppError::Validation(
            "please provide latitude and longitude in the format lat,lng".into(),
        )
    };

    let mut parts = raw.split(',');
    let (lat, lng) = match (parts.next(), parts.next(), parts.next()) {
        (Some(lat), Some(lng), None) => (lat, lng),
        _ => return Err(invalid()),
    };
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::Validation("coordinates are out of range".into()));
    }
    Ok((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_latlng_pairs() {
        let (lat, lng) = parse_latlng("34.111745,-118.113491").expect("parse");
        assert!((lat - 34.111745).abs() < 1e-9);
        assert!((lng - -118.113491).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_latlng() {
        assert!(parse_latlng("34.1").is_err());
        assert!(parse_latlng("34.1,-118.1,7").is_err());
        assert!(parse_latlng("north,west").is_err());
        assert!(parse_latlng("91.0,0.0").is_err());
        assert!(parse_latlng("0.0,181.0").is_err());
    }

    #[test]
    fn unit_parsing_and_conversion() {
        assert_eq!("mi".parse::<Unit>().unwrap(), Unit::Miles);
        assert_eq!("km".parse::<Unit>().unwrap(), Unit::Kilometers);
        assert!("furlongs".parse::<Unit>().is_err());
        assert!((Unit::Miles.km_per_unit() - 1.609344).abs() < 1e-9);
        assert_eq!(Unit::Kilometers.km_per_unit(), 1.0);
    }
}
