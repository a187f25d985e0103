//! Key/value system parameters (schema version and similar bookkeeping).

use crate::error::Result;
use sqlx::postgres::PgPool;

#[derive(Clone)]
pub struct SystemRepo {
    pool: PgPool,
}

impl SystemRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn set_param(&self, key: &str, value: &str) -> Result<()> {
        let query = r#"
            INSERT INTO system_params (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = now();
        "#;
        sqlx::query(query)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_param(&self, key: &str) -> Result<Option<String>> {
        let query = r#"
            SELECT value
            FROM system_params
            WHERE key = $1;
        "#;
        let value = sqlx::query_scalar::<_, String>(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}
