use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;
use uuid::Uuid;

use crate::chat::keys::{CHAT_GROUPS_SET_KEY, chat_group_key, chat_trip_index_key};
use crate::chat::models::ChatGroupDoc;

/// 聊天群组文档操作
pub struct ChatGroupOperations {
    redis_client: Arc<RedisClient>,
}

impl ChatGroupOperations {
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }

    /// 创建群组文档并登记二级索引
    ///
    /// 成员列表初始为空，创建者即行程司机；乘客确认后也不会自动入群，
    /// 入群由外部的成员追加接口完成。
    pub async fn create_group(
        &self,
        trip_id: i64,
        name: &str,
        creator_uid: &str,
        date_of_trip: DateTime<Utc>,
    ) -> Result<ChatGroupDoc, redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let doc = ChatGroupDoc {
            group_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            trip_id,
            creator_uid: creator_uid.to_string(),
            member_uids: Vec::new(),
            date_of_trip: date_of_trip.to_rfc3339(),
        };

        let json = serde_json::to_string(&doc).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "序列化错误", e.to_string()))
        })?;

        let _: () = conn.set(chat_group_key(&doc.group_id), json).await?;
        let _: () = conn
            .set(chat_trip_index_key(trip_id), &doc.group_id)
            .await?;
        let _: () = conn.sadd(CHAT_GROUPS_SET_KEY, &doc.group_id).await?;

        Ok(doc)
    }

    /// 按群组ID读取文档
    pub async fn get_group(
        &self,
        group_id: &str,
    ) -> Result<Option<ChatGroupDoc>, redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let json: Option<String> = conn.get(chat_group_key(group_id)).await?;

        match json {
            Some(json) => {
                let doc = serde_json::from_str::<ChatGroupDoc>(&json).map_err(|e| {
                    redis::RedisError::from((
                        redis::ErrorKind::IoError,
                        "反序列化错误",
                        e.to_string(),
                    ))
                })?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// 通过行程二级索引查群组
    pub async fn find_by_trip(
        &self,
        trip_id: i64,
    ) -> Result<Option<ChatGroupDoc>, redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let group_id: Option<String> = conn.get(chat_trip_index_key(trip_id)).await?;

        match group_id {
            Some(group_id) => self.get_group(&group_id).await,
            None => Ok(None),
        }
    }

    /// 行程改名后同步群组名；群组不存在时返回 false
    pub async fn rename_group(
        &self,
        trip_id: i64,
        new_name: &str,
    ) -> Result<bool, redis::RedisError> {
        let Some(mut doc) = self.find_by_trip(trip_id).await? else {
            return Ok(false);
        };

        doc.name = new_name.to_string();
        self.write_doc(&doc).await?;
        Ok(true)
    }

    /// 删除行程对应的群组文档、索引与集合登记
    pub async fn delete_group(&self, trip_id: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let index_key = chat_trip_index_key(trip_id);
        let group_id: Option<String> = conn.get(&index_key).await?;

        if let Some(group_id) = group_id {
            let _: () = conn.del(chat_group_key(&group_id)).await?;
            let _: () = conn.srem(CHAT_GROUPS_SET_KEY, &group_id).await?;
        }
        let _: () = conn.del(&index_key).await?;

        Ok(())
    }

    /// 向群组追加成员（去重）；群组不存在时返回 false
    pub async fn add_members(
        &self,
        group_id: &str,
        member_uids: &[String],
    ) -> Result<bool, redis::RedisError> {
        let Some(mut doc) = self.get_group(group_id).await? else {
            return Ok(false);
        };

        for uid in member_uids {
            if !doc.member_uids.contains(uid) {
                doc.member_uids.push(uid.clone());
            }
        }
        self.write_doc(&doc).await?;
        Ok(true)
    }

    /// 列出全部群组，按行程日期排序
    pub async fn list_groups(&self) -> Result<Vec<ChatGroupDoc>, redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let group_ids: Vec<String> = conn.smembers(CHAT_GROUPS_SET_KEY).await?;

        let mut groups = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            // 集合里可能残留已删除的ID，读不到就跳过
            if let Some(doc) = self.get_group(&group_id).await? {
                groups.push(doc);
            }
        }

        // RFC 3339 字符串按字典序即按时间序
        groups.sort_by(|a, b| a.date_of_trip.cmp(&b.date_of_trip));
        Ok(groups)
    }

    async fn write_doc(&self, doc: &ChatGroupDoc) -> Result<(), redis::RedisError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(doc).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "序列化错误", e.to_string()))
        })?;
        let _: () = conn.set(chat_group_key(&doc.group_id), json).await?;
        Ok(())
    }
}
