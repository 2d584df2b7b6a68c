use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::users::UserRow;

#[derive(Debug, Deserialize)]
pub struct CheckUsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(rename = "userUid")]
    pub user_uid: String,
    pub role: String,
}

/// 名册里展示的镜像行
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub uid: String,
    pub username: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserInfo {
    fn from(row: UserRow) -> Self {
        Self {
            uid: row.uid,
            username: row.username,
            role: row.role,
            created_at: row.created_at,
        }
    }
}
