// 授权判定
// 每个受保护操作一个纯谓词，显式传入操作者身份，不读任何全局状态。
// 管理员判定只看上游声明（随验证过的 token 传入），不信本地镜像，
// 镜像滞后不会放大权限。

use crate::identity::{Role, TokenClaims};
use crate::routes::passenger::model::PassengerRequest;
use crate::routes::trip::model::Trip;
use crate::routes::vehicle::model::Vehicle;

/// 行程只能由归属司机修改或删除
pub fn can_modify_trip(actor_uid: &str, trip: &Trip) -> bool {
    trip.driver_uid == actor_uid
}

/// 乘客请求的状态只能由请求所属行程的司机改
pub fn can_update_request_status(actor_uid: &str, trip: &Trip) -> bool {
    trip.driver_uid == actor_uid
}

/// 司机不能向自己的行程发请求
pub fn can_request_seat(actor_uid: &str, trip: &Trip) -> bool {
    trip.driver_uid != actor_uid
}

/// 请求的非状态字段只能由请求者本人改
pub fn can_edit_request(actor_uid: &str, request: &PassengerRequest) -> bool {
    request.user_uid == actor_uid
}

/// 请求可由请求者本人或行程司机移除
pub fn can_remove_request(actor_uid: &str, request: &PassengerRequest, trip: &Trip) -> bool {
    request.user_uid == actor_uid || trip.driver_uid == actor_uid
}

/// 车辆只能由车主修改
pub fn can_modify_vehicle(actor_uid: &str, vehicle: &Vehicle) -> bool {
    vehicle.owner_uid == actor_uid
}

/// 角色变更仅限管理员
pub fn can_assign_roles(actor: &TokenClaims) -> bool {
    actor.role == Role::Admin
}

/// 用户名册仅限管理员查看
pub fn can_list_users(actor: &TokenClaims) -> bool {
    actor.role == Role::Admin
}

/// 白名单维护仅限管理员
pub fn can_manage_whitelist(actor: &TokenClaims) -> bool {
    actor.role == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trip_owned_by(driver_uid: &str) -> Trip {
        Trip {
            id: 1,
            trip_name: "Morning Commute".to_string(),
            driver_uid: driver_uid.to_string(),
            vehicle_id: 1,
            seats_available: 2,
            seats_occupied: 0,
            date_of_trip: Utc::now(),
            origin_lat: 0.0,
            origin_long: 0.0,
            origin_address: String::new(),
            destination_lat: 0.0,
            destination_long: 0.0,
            destination_address: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request_from(user_uid: &str) -> PassengerRequest {
        PassengerRequest {
            id: 1,
            trip_id: 1,
            user_uid: user_uid.to_string(),
            lat: 0.0,
            lng: 0.0,
            address: String::new(),
            status: "pending".to_string(),
            pending: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn claims(uid: &str, role: Role) -> TokenClaims {
        TokenClaims {
            uid: uid.to_string(),
            role,
        }
    }

    #[test]
    fn only_the_driver_touches_the_trip() {
        let trip = trip_owned_by("driver");
        assert!(can_modify_trip("driver", &trip));
        assert!(!can_modify_trip("someone-else", &trip));
    }

    #[test]
    fn status_changes_go_through_the_trips_driver() {
        let trip = trip_owned_by("driver");
        assert!(can_update_request_status("driver", &trip));
        assert!(!can_update_request_status("requester", &trip));
    }

    #[test]
    fn drivers_cannot_request_their_own_trip() {
        let trip = trip_owned_by("driver");
        assert!(!can_request_seat("driver", &trip));
        assert!(can_request_seat("passenger", &trip));
    }

    #[test]
    fn pickup_edits_are_requester_only() {
        let request = request_from("passenger");
        assert!(can_edit_request("passenger", &request));
        assert!(!can_edit_request("driver", &request));
    }

    #[test]
    fn removal_is_allowed_for_requester_and_driver() {
        let trip = trip_owned_by("driver");
        let request = request_from("passenger");
        assert!(can_remove_request("passenger", &request, &trip));
        assert!(can_remove_request("driver", &request, &trip));
        assert!(!can_remove_request("stranger", &request, &trip));
    }

    #[test]
    fn stale_local_role_cannot_grant_admin_operations() {
        // 判定只看上游声明：普通角色即便镜像尚未同步也进不来
        assert!(can_assign_roles(&claims("admin-uid", Role::Admin)));
        assert!(!can_assign_roles(&claims("user-uid", Role::User)));
        assert!(!can_manage_whitelist(&claims("user-uid", Role::User)));
        assert!(!can_list_users(&claims("user-uid", Role::User)));
    }
}
