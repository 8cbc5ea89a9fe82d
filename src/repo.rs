use serde::Deserialize;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

/// A table-backed record usable with the generic lookup helpers below.
/// `COLUMNS` must match the order the `FromRow` impl expects.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
}

pub async fn find_by_id<T: Entity>(db: &PgPool, id: Uuid) -> anyhow::Result<Option<T>> {
    let sql = format!("SELECT {} FROM {} WHERE id = $1", T::COLUMNS, T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn list<T: Entity>(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<T>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        T::COLUMNS,
        T::TABLE
    );
    let rows = sqlx::query_as::<_, T>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Returns whether a row was actually deleted.
pub async fn delete_by_id<T: Entity>(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
    let result = sqlx::query(&sql).bind(id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let p: Pagination = serde_json::from_str("{}").expect("empty pagination");
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn pagination_accepts_explicit_values() {
        let p: Pagination =
            serde_json::from_str(r#"{"limit": 5, "offset": 40}"#).expect("pagination");
        assert_eq!(p.limit, 5);
        assert_eq!(p.offset, 40);
    }
}
