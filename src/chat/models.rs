use serde::{Deserialize, Serialize};

/// 文档存储中的聊天群组记录
///
/// trip_id 只是回指，不构成归属关系；date_of_trip 为冗余字段，
/// 仅用于列表排序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGroupDoc {
    pub group_id: String,
    pub name: String,
    pub trip_id: i64,
    pub creator_uid: String,
    pub member_uids: Vec<String>,
    pub date_of_trip: String,
}
