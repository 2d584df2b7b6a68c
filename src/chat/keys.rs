/// 群组文档键前缀
const CHAT_GROUP_PREFIX: &str = "chat:group:";

/// 行程 -> 群组的二级索引键前缀
const CHAT_TRIP_INDEX_PREFIX: &str = "chat:trip:";

/// 全部群组ID集合键
pub const CHAT_GROUPS_SET_KEY: &str = "chat:groups";

/// 生成群组文档键
pub fn chat_group_key(group_id: &str) -> String {
    format!("{}{}", CHAT_GROUP_PREFIX, group_id)
}

/// 生成行程二级索引键
pub fn chat_trip_index_key(trip_id: i64) -> String {
    format!("{}{}", CHAT_TRIP_INDEX_PREFIX, trip_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(chat_group_key("abc"), "chat:group:abc");
        assert_eq!(chat_trip_index_key(42), "chat:trip:42");
    }
}
