use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::guard;
use crate::routes::trip::model::Trip;

/// 乘客请求状态机
///
/// pending 为初始态；declined 为终态，不可复用，被拒后同一用户
/// 要重新发起请求（但存在未拒绝请求时不允许再建）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Declined,
}

impl RequestStatus {
    /// 只接受 pending / confirmed / declined 三个状态值
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "pending" => Ok(RequestStatus::Pending),
            "confirmed" => Ok(RequestStatus::Confirmed),
            "declined" => Ok(RequestStatus::Declined),
            _ => Err(AppError::Validation("markers/validation-error")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Declined => "declined",
        }
    }

    /// pending 标志始终与状态保持同步
    pub fn pending_flag(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    /// 合法迁移：pending 可去任意状态（含原地不动），
    /// confirmed 只能被司机撤到 declined，declined 不再变化
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (RequestStatus::Pending, _) => true,
            (RequestStatus::Confirmed, RequestStatus::Declined) => true,
            _ => false,
        }
    }
}

/// 确认数未达座位预算时才有空位
pub fn has_free_seat(confirmed_count: i64, seats_available: i32) -> bool {
    confirmed_count < i64::from(seats_available)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PassengerRequest {
    pub id: i64,
    pub trip_id: i64,
    pub user_uid: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub status: String,
    pub pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMarkerRequest {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

// 载荷里没有状态字段，请求者经此路径改不了状态
#[derive(Debug, Deserialize)]
pub struct UpdateMarkerRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerUpdateRequest {
    pub status: String,
}

const MARKER_COLUMNS: &str = r#"
    id, trip_id, user_uid, lat, lng, address, status, pending, created_at, updated_at
"#;

const TRIP_FOR_UPDATE: &str = r#"
    SELECT id, trip_name, driver_uid, vehicle_id, seats_available, seats_occupied,
           date_of_trip, origin_lat, origin_long, origin_address,
           destination_lat, destination_long, destination_address,
           created_at, updated_at
    FROM trips
    WHERE id = $1
    FOR UPDATE
"#;

pub async fn count_confirmed(conn: &mut PgConnection, trip_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM passengers WHERE trip_id = $1 AND status = 'confirmed'",
    )
    .bind(trip_id)
    .fetch_one(conn)
    .await
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl PassengerRequest {
    /// 乘客发起加入请求
    ///
    /// 行程行加锁后检查：请求者不能是司机本人，同一行程不能有
    /// 未拒绝的旧请求，行程当前不能已满员（软性检查，确认时才是
    /// 权威判定）。并发重复创建由部分唯一索引兜底。
    pub async fn create(
        pool: &PgPool,
        trip_id: i64,
        requester_uid: &str,
        req: CreateMarkerRequest,
    ) -> Result<Self, AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        let trip = sqlx::query_as::<_, Trip>(TRIP_FOR_UPDATE)
            .bind(trip_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?
            .ok_or(AppError::NotFound("trips/not-found"))?;

        if !guard::can_request_seat(requester_uid, &trip) {
            return Err(AppError::Forbidden("markers/forbidden"));
        }

        let live_exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM passengers
                WHERE trip_id = $1 AND user_uid = $2 AND status <> 'declined'
            )
            "#,
        )
        .bind(trip_id)
        .bind(requester_uid)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?;

        if live_exists {
            return Err(AppError::Duplicate("markers/duplicate-request"));
        }

        let confirmed = count_confirmed(&mut tx, trip_id)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;
        if !has_free_seat(confirmed, trip.seats_available) {
            return Err(AppError::CapacityExceeded("markers/capacity-exceeded"));
        }

        let marker = sqlx::query_as::<_, PassengerRequest>(&format!(
            r#"
            INSERT INTO passengers (trip_id, user_uid, lat, lng, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MARKER_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(requester_uid)
        .bind(req.lat)
        .bind(req.lng)
        .bind(&req.address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Duplicate("markers/duplicate-request")
            } else {
                AppError::db("markers/processing-error", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        Ok(marker)
    }

    /// 行程司机确认或拒绝请求
    ///
    /// 容量在状态写入的同一事务里、行程行持锁时重新判定：竞争确认
    /// 把最后一个座位占掉时本次确认失败，请求保持 pending。
    pub async fn owner_transition(
        pool: &PgPool,
        marker_id: i64,
        actor_uid: &str,
        raw_status: &str,
    ) -> Result<Self, AppError> {
        let next = RequestStatus::parse(raw_status)?;

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        let marker = sqlx::query_as::<_, PassengerRequest>(&format!(
            "SELECT {MARKER_COLUMNS} FROM passengers WHERE id = $1 FOR UPDATE"
        ))
        .bind(marker_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?
        .ok_or(AppError::NotFound("markers/not-found"))?;

        let trip = sqlx::query_as::<_, Trip>(TRIP_FOR_UPDATE)
            .bind(marker.trip_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?
            .ok_or(AppError::NotFound("trips/not-found"))?;

        // 状态只能由请求所属行程的司机改
        if !guard::can_update_request_status(actor_uid, &trip) {
            return Err(AppError::Forbidden("markers/forbidden"));
        }

        let current = RequestStatus::parse(&marker.status)?;
        if !current.can_transition_to(next) {
            return Err(AppError::Validation("markers/validation-error"));
        }

        if next == RequestStatus::Confirmed {
            let confirmed = count_confirmed(&mut tx, trip.id)
                .await
                .map_err(|e| AppError::db("markers/processing-error", e))?;
            if !has_free_seat(confirmed, trip.seats_available) {
                return Err(AppError::CapacityExceeded("markers/capacity-exceeded"));
            }
        }

        let updated = sqlx::query_as::<_, PassengerRequest>(&format!(
            r#"
            UPDATE passengers
            SET status = $1, pending = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {MARKER_COLUMNS}
            "#
        ))
        .bind(next.as_str())
        .bind(next.pending_flag())
        .bind(marker_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?;

        // 每次状态变更后按确认数重算，不做增减计数
        Trip::recompute_seats_occupied(&mut tx, trip.id)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        Ok(updated)
    }

    /// 请求者更新接送点
    pub async fn update_pickup(
        pool: &PgPool,
        marker_id: i64,
        actor_uid: &str,
        req: UpdateMarkerRequest,
    ) -> Result<Self, AppError> {
        let marker = Self::find_by_id(pool, marker_id)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?
            .ok_or(AppError::NotFound("markers/not-found"))?;

        if !guard::can_edit_request(actor_uid, &marker) {
            return Err(AppError::Forbidden("markers/forbidden"));
        }

        sqlx::query_as::<_, PassengerRequest>(&format!(
            r#"
            UPDATE passengers
            SET lat = COALESCE($1, lat),
                lng = COALESCE($2, lng),
                address = COALESCE($3, address),
                updated_at = NOW()
            WHERE id = $4
            RETURNING {MARKER_COLUMNS}
            "#
        ))
        .bind(req.lat)
        .bind(req.lng)
        .bind(req.address)
        .bind(marker_id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))
    }

    /// 删除请求（请求者退出，或司机移除）
    ///
    /// 删掉的可能是已确认请求，座位占用在同一事务里重算。
    pub async fn delete(pool: &PgPool, marker_id: i64, actor_uid: &str) -> Result<(), AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        let marker = sqlx::query_as::<_, PassengerRequest>(&format!(
            "SELECT {MARKER_COLUMNS} FROM passengers WHERE id = $1 FOR UPDATE"
        ))
        .bind(marker_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?
        .ok_or(AppError::NotFound("markers/not-found"))?;

        let trip = sqlx::query_as::<_, Trip>(TRIP_FOR_UPDATE)
            .bind(marker.trip_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?
            .ok_or(AppError::NotFound("trips/not-found"))?;

        if !guard::can_remove_request(actor_uid, &marker, &trip) {
            return Err(AppError::Forbidden("markers/forbidden"));
        }

        sqlx::query("DELETE FROM passengers WHERE id = $1")
            .bind(marker_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        Trip::recompute_seats_occupied(&mut tx, trip.id)
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::db("markers/processing-error", e))?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PassengerRequest>(&format!(
            "SELECT {MARKER_COLUMNS} FROM passengers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_trip(pool: &PgPool, trip_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PassengerRequest>(&format!(
            "SELECT {MARKER_COLUMNS} FROM passengers WHERE trip_id = $1 ORDER BY created_at"
        ))
        .bind(trip_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_only_known_values() {
        assert_eq!(
            RequestStatus::parse("pending").unwrap(),
            RequestStatus::Pending
        );
        assert_eq!(
            RequestStatus::parse("confirmed").unwrap(),
            RequestStatus::Confirmed
        );
        assert_eq!(
            RequestStatus::parse("declined").unwrap(),
            RequestStatus::Declined
        );
        assert!(RequestStatus::parse("approved").is_err());
        assert!(RequestStatus::parse("PENDING").is_err());
        assert!(RequestStatus::parse("").is_err());
    }

    #[test]
    fn pending_flag_tracks_status() {
        assert!(RequestStatus::Pending.pending_flag());
        assert!(!RequestStatus::Confirmed.pending_flag());
        assert!(!RequestStatus::Declined.pending_flag());
    }

    #[test]
    fn declined_is_terminal() {
        assert!(!RequestStatus::Declined.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Declined.can_transition_to(RequestStatus::Confirmed));
        assert!(!RequestStatus::Declined.can_transition_to(RequestStatus::Declined));
    }

    #[test]
    fn pending_can_be_confirmed_or_declined() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Confirmed));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Declined));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Pending));
    }

    #[test]
    fn confirmed_can_only_be_revoked() {
        assert!(RequestStatus::Confirmed.can_transition_to(RequestStatus::Declined));
        assert!(!RequestStatus::Confirmed.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Confirmed.can_transition_to(RequestStatus::Confirmed));
    }

    #[test]
    fn last_seat_blocks_further_confirmations() {
        // 座位预算为 1：确认一人后即满员
        assert!(has_free_seat(0, 1));
        assert!(!has_free_seat(1, 1));
        assert!(!has_free_seat(2, 1));
        assert!(has_free_seat(2, 3));
    }
}
