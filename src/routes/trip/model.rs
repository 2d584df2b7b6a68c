use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::guard;
use crate::routes::passenger::model::{PassengerRequest, count_confirmed};
use crate::routes::vehicle::model::Vehicle;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Trip {
    pub id: i64,
    pub trip_name: String,
    pub driver_uid: String,
    pub vehicle_id: i64,
    pub seats_available: i32,
    pub seats_occupied: i32,
    pub date_of_trip: DateTime<Utc>,
    pub origin_lat: f64,
    pub origin_long: f64,
    pub origin_address: String,
    pub destination_lat: f64,
    pub destination_long: f64,
    pub destination_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub trip_name: String,
    pub seats_available: i32,
    pub date_of_trip: String,
    pub origin_lat: f64,
    pub origin_long: f64,
    pub origin_address: String,
    pub destination_lat: f64,
    pub destination_long: f64,
    pub destination_address: String,
    // 二选一：引用已有车辆，或内联属性新建一辆
    pub vehicle_id: Option<i64>,
    pub registration: Option<String>,
    pub make: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTripRequest {
    pub trip_name: Option<String>,
    pub seats_available: Option<i32>,
    pub date_of_trip: Option<String>,
    pub origin_lat: Option<f64>,
    pub origin_long: Option<f64>,
    pub origin_address: Option<String>,
    pub destination_lat: Option<f64>,
    pub destination_long: Option<f64>,
    pub destination_address: Option<String>,
    pub registration: Option<String>,
    pub make: Option<String>,
    pub color: Option<String>,
}

/// 行程详情，附带车辆与乘客请求
#[derive(Debug, Serialize)]
pub struct TripDetail {
    #[serde(flatten)]
    pub trip: Trip,
    pub vehicle: Option<Vehicle>,
    pub passengers: Vec<PassengerRequest>,
}

/// 行程时刻必须是可解析的 RFC 3339 时间
pub fn parse_trip_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::Validation("trips/validation-error"))
}

/// 局部更新语义：载荷里省略的字段保留原值
pub fn merge_update(trip: &Trip, req: &UpdateTripRequest) -> Result<Trip, AppError> {
    let mut next = trip.clone();

    if let Some(name) = &req.trip_name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("trips/validation-error"));
        }
        next.trip_name = name.clone();
    }
    if let Some(seats) = req.seats_available {
        if seats < 1 {
            return Err(AppError::Validation("trips/validation-error"));
        }
        next.seats_available = seats;
    }
    if let Some(raw) = &req.date_of_trip {
        next.date_of_trip = parse_trip_date(raw)?;
    }
    if let Some(lat) = req.origin_lat {
        next.origin_lat = lat;
    }
    if let Some(long) = req.origin_long {
        next.origin_long = long;
    }
    if let Some(address) = &req.origin_address {
        next.origin_address = address.clone();
    }
    if let Some(lat) = req.destination_lat {
        next.destination_lat = lat;
    }
    if let Some(long) = req.destination_long {
        next.destination_long = long;
    }
    if let Some(address) = &req.destination_address {
        next.destination_address = address.clone();
    }

    Ok(next)
}

const TRIP_COLUMNS: &str = r#"
    id, trip_name, driver_uid, vehicle_id, seats_available, seats_occupied,
    date_of_trip, origin_lat, origin_long, origin_address,
    destination_lat, destination_long, destination_address,
    created_at, updated_at
"#;

impl Trip {
    /// 司机发布行程；内联车辆属性会在同一事务里先建车
    pub async fn create(
        pool: &PgPool,
        driver_uid: &str,
        req: CreateTripRequest,
    ) -> Result<Self, AppError> {
        if req.trip_name.trim().is_empty() || req.seats_available < 1 {
            return Err(AppError::Validation("trips/validation-error"));
        }
        let date_of_trip = parse_trip_date(&req.date_of_trip)?;

        let inline_vehicle = req.registration.is_some() || req.make.is_some() || req.color.is_some();
        if req.vehicle_id.is_some() && inline_vehicle {
            return Err(AppError::Validation("trips/validation-error"));
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;

        let vehicle_id = match req.vehicle_id {
            Some(vehicle_id) => {
                let vehicle = sqlx::query_as::<_, Vehicle>(
                    r#"
                    SELECT id, owner_uid, registration, make, color, created_at, updated_at
                    FROM vehicles
                    WHERE id = $1
                    "#,
                )
                .bind(vehicle_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::db("trips/processing-error", e))?
                .ok_or(AppError::NotFound("trips/vehicle-not-found"))?;

                if vehicle.owner_uid != driver_uid {
                    return Err(AppError::Forbidden("trips/forbidden"));
                }
                vehicle.id
            }
            None => {
                let (Some(registration), Some(make), Some(color)) =
                    (&req.registration, &req.make, &req.color)
                else {
                    return Err(AppError::Validation("trips/validation-error"));
                };
                Vehicle::create(&mut tx, driver_uid, registration, make, color)
                    .await
                    .map_err(|e| AppError::db("trips/processing-error", e))?
                    .id
            }
        };

        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            INSERT INTO trips (
                trip_name, driver_uid, vehicle_id, seats_available, seats_occupied,
                date_of_trip, origin_lat, origin_long, origin_address,
                destination_lat, destination_long, destination_address
            )
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(&req.trip_name)
        .bind(driver_uid)
        .bind(vehicle_id)
        .bind(req.seats_available)
        .bind(date_of_trip)
        .bind(req.origin_lat)
        .bind(req.origin_long)
        .bind(&req.origin_address)
        .bind(req.destination_lat)
        .bind(req.destination_long)
        .bind(&req.destination_address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;

        Ok(trip)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trip>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_upcoming(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE date_of_trip >= NOW() ORDER BY date_of_trip"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips ORDER BY date_of_trip DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_driver(
        pool: &PgPool,
        driver_uid: &str,
        only_upcoming: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if only_upcoming {
            sqlx::query_as::<_, Trip>(&format!(
                r#"
                SELECT {TRIP_COLUMNS} FROM trips
                WHERE driver_uid = $1 AND date_of_trip >= NOW()
                ORDER BY date_of_trip
                "#
            ))
            .bind(driver_uid)
            .fetch_all(pool)
            .await
        } else {
            sqlx::query_as::<_, Trip>(&format!(
                r#"
                SELECT {TRIP_COLUMNS} FROM trips
                WHERE driver_uid = $1
                ORDER BY date_of_trip DESC
                "#
            ))
            .bind(driver_uid)
            .fetch_all(pool)
            .await
        }
    }

    /// 司机更新行程；返回更新后的行程以及是否发生了改名
    pub async fn update(
        pool: &PgPool,
        id: i64,
        actor_uid: &str,
        req: UpdateTripRequest,
    ) -> Result<(Self, bool), AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;

        let current = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?
        .ok_or(AppError::NotFound("trips/not-found"))?;

        if !guard::can_modify_trip(actor_uid, &current) {
            return Err(AppError::Forbidden("trips/forbidden"));
        }

        let next = merge_update(&current, &req)?;

        // 座位预算不能压到已确认的乘客数以下
        let confirmed = count_confirmed(&mut tx, id)
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;
        if i64::from(next.seats_available) < confirmed {
            return Err(AppError::Validation("trips/validation-error"));
        }

        let updated = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET trip_name = $1, seats_available = $2, date_of_trip = $3,
                origin_lat = $4, origin_long = $5, origin_address = $6,
                destination_lat = $7, destination_long = $8, destination_address = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(&next.trip_name)
        .bind(next.seats_available)
        .bind(next.date_of_trip)
        .bind(next.origin_lat)
        .bind(next.origin_long)
        .bind(&next.origin_address)
        .bind(next.destination_lat)
        .bind(next.destination_long)
        .bind(&next.destination_address)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;

        // 车辆属性跟随行程一起局部更新
        if req.registration.is_some() || req.make.is_some() || req.color.is_some() {
            sqlx::query(
                r#"
                UPDATE vehicles
                SET registration = COALESCE($1, registration),
                    make = COALESCE($2, make),
                    color = COALESCE($3, color),
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(req.registration)
            .bind(req.make)
            .bind(req.color)
            .bind(current.vehicle_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;

        let renamed = updated.trip_name != current.trip_name;
        Ok((updated, renamed))
    }

    /// 司机删除行程；乘客请求由外键级联删除
    pub async fn delete(pool: &PgPool, id: i64, actor_uid: &str) -> Result<(), AppError> {
        let trip = Self::find_by_id(pool, id)
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?
            .ok_or(AppError::NotFound("trips/not-found"))?;

        if !guard::can_modify_trip(actor_uid, &trip) {
            return Err(AppError::Forbidden("trips/forbidden"));
        }

        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| AppError::db("trips/processing-error", e))?;

        Ok(())
    }

    /// 按确认数重算座位占用
    ///
    /// 只允许请求工作流在状态写入的同一事务里调用；用重算而不是
    /// 增减计数，确认-拒绝-再确认不会累积漂移。
    pub async fn recompute_seats_occupied(
        conn: &mut PgConnection,
        trip_id: i64,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE trips
            SET seats_occupied = (
                    SELECT COUNT(*) FROM passengers
                    WHERE trip_id = $1 AND status = 'confirmed'
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING seats_occupied
            "#,
        )
        .bind(trip_id)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trip() -> Trip {
        Trip {
            id: 1,
            trip_name: "Airport Run".to_string(),
            driver_uid: "driver-1".to_string(),
            vehicle_id: 7,
            seats_available: 3,
            seats_occupied: 1,
            date_of_trip: Utc::now(),
            origin_lat: 35.1,
            origin_long: 33.3,
            origin_address: "Origin St 1".to_string(),
            destination_lat: 35.2,
            destination_long: 33.4,
            destination_address: "Destination Ave 2".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merge_keeps_omitted_fields() {
        let trip = sample_trip();
        let req = UpdateTripRequest {
            trip_name: Some("Station Run".to_string()),
            ..Default::default()
        };

        let next = merge_update(&trip, &req).unwrap();
        assert_eq!(next.trip_name, "Station Run");
        assert_eq!(next.seats_available, trip.seats_available);
        assert_eq!(next.origin_address, trip.origin_address);
        assert_eq!(next.date_of_trip, trip.date_of_trip);
    }

    #[test]
    fn merge_applies_provided_fields() {
        let trip = sample_trip();
        let req = UpdateTripRequest {
            seats_available: Some(5),
            destination_address: Some("New Terminal".to_string()),
            ..Default::default()
        };

        let next = merge_update(&trip, &req).unwrap();
        assert_eq!(next.seats_available, 5);
        assert_eq!(next.destination_address, "New Terminal");
        assert_eq!(next.trip_name, trip.trip_name);
    }

    #[test]
    fn merge_rejects_zero_seat_budget_and_bad_dates() {
        let trip = sample_trip();

        let bad_seats = UpdateTripRequest {
            seats_available: Some(0),
            ..Default::default()
        };
        assert!(merge_update(&trip, &bad_seats).is_err());

        let bad_date = UpdateTripRequest {
            date_of_trip: Some("tomorrow at noon".to_string()),
            ..Default::default()
        };
        assert!(merge_update(&trip, &bad_date).is_err());
    }

    #[test]
    fn trip_date_must_be_rfc3339() {
        assert!(parse_trip_date("2026-09-01T08:30:00Z").is_ok());
        assert!(parse_trip_date("2026-09-01T08:30:00+03:00").is_ok());
        assert!(parse_trip_date("01-09-2026").is_err());
        assert!(parse_trip_date("").is_err());
    }
}
