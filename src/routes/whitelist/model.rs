use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WhitelistEntry {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

impl WhitelistEntry {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WhitelistEntry>(
            "SELECT email, created_at FROM whitelist ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
    }

    /// 邮箱是否在白名单中（不区分大小写）
    pub async fn contains(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM whitelist WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(pool)
        .await
    }

    pub async fn insert(pool: &PgPool, email: &str) -> Result<(), AppError> {
        let exists = Self::contains(pool, email)
            .await
            .map_err(|e| AppError::db("whitelist/processing-error", e))?;
        if exists {
            return Err(AppError::Duplicate("whitelist/email-already-exists"));
        }

        sqlx::query("INSERT INTO whitelist (email) VALUES ($1)")
            .bind(email)
            .execute(pool)
            .await
            .map_err(|e| {
                // 并发插入相同邮箱由唯一索引兜底
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    AppError::Duplicate("whitelist/email-already-exists")
                } else {
                    AppError::db("whitelist/processing-error", e)
                }
            })?;
        Ok(())
    }

    /// 删除白名单行；返回是否确有删除
    pub async fn remove(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM whitelist WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
