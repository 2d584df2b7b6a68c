use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::guard;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub owner_uid: String,
    pub registration: String,
    pub make: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVehicleRequest {
    pub registration: Option<String>,
    pub make: Option<String>,
    pub color: Option<String>,
}

impl Vehicle {
    /// 在行程创建的同一事务内登记车辆
    pub async fn create(
        conn: &mut PgConnection,
        owner_uid: &str,
        registration: &str,
        make: &str,
        color: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (owner_uid, registration, make, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_uid, registration, make, color, created_at, updated_at
            "#,
        )
        .bind(owner_uid)
        .bind(registration)
        .bind(make)
        .bind(color)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, owner_uid, registration, make, color, created_at, updated_at
            FROM vehicles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_owner(pool: &PgPool, owner_uid: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, owner_uid, registration, make, color, created_at, updated_at
            FROM vehicles
            WHERE owner_uid = $1
            ORDER BY created_at
            "#,
        )
        .bind(owner_uid)
        .fetch_all(pool)
        .await
    }

    /// 车主更新车辆资料；省略的字段保留原值
    pub async fn update(
        pool: &PgPool,
        id: i64,
        actor_uid: &str,
        req: UpdateVehicleRequest,
    ) -> Result<Self, AppError> {
        let vehicle = Self::find_by_id(pool, id)
            .await
            .map_err(|e| AppError::db("vehicles/processing-error", e))?
            .ok_or(AppError::NotFound("vehicles/not-found"))?;

        if !guard::can_modify_vehicle(actor_uid, &vehicle) {
            return Err(AppError::Forbidden("vehicles/forbidden"));
        }

        sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET registration = COALESCE($1, registration),
                make = COALESCE($2, make),
                color = COALESCE($3, color),
                updated_at = NOW()
            WHERE id = $4
            RETURNING id, owner_uid, registration, make, color, created_at, updated_at
            "#,
        )
        .bind(req.registration)
        .bind(req.make)
        .bind(req.color)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::db("vehicles/processing-error", e))
    }
}
