use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

/// 本地身份镜像行，uid 为上游身份ID
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub uid: String,
    pub username: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 身份镜像存储库
pub struct UserRepository;

impl UserRepository {
    /// 列出全部镜像行
    pub async fn list(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT uid, username, role, created_at, updated_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// 根据上游身份ID查找
    pub async fn find_by_uid(pool: &PgPool, uid: &str) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT uid, username, role, created_at, updated_at
            FROM users
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(pool)
        .await
    }

    /// 用户名是否已被占用
    pub async fn username_taken(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)
            "#,
        )
        .bind(username)
        .fetch_one(pool)
        .await
    }

    /// 插入镜像行；并发的同步轮次靠主键冲突收敛，不重复插入
    pub async fn insert(
        pool: &PgPool,
        uid: &str,
        username: &str,
        role: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, username, role)
            VALUES ($1, NULLIF($2, ''), $3)
            ON CONFLICT (uid) DO NOTHING
            "#,
        )
        .bind(uid)
        .bind(username)
        .bind(role)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 用上游资料覆盖本地用户名与角色
    pub async fn update_profile(
        pool: &PgPool,
        uid: &str,
        username: &str,
        role: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = NULLIF($1, ''), role = $2, updated_at = NOW()
            WHERE uid = $3
            "#,
        )
        .bind(username)
        .bind(role)
        .bind(uid)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 更新镜像中的角色（上游声明已先行写入）
    pub async fn update_role(pool: &PgPool, uid: &str, role: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = $1, updated_at = NOW()
            WHERE uid = $2
            "#,
        )
        .bind(role)
        .bind(uid)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 删除镜像行（仅本地撤销，从不反向删除上游）
    pub async fn delete(pool: &PgPool, uid: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM users WHERE uid = $1")
            .bind(uid)
            .execute(pool)
            .await?;
        Ok(())
    }
}
