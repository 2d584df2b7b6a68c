use redis::Client as RedisClient;
use std::sync::Arc;

use crate::chat::models::ChatGroupDoc;
use crate::chat::operations::ChatGroupOperations;
use crate::routes::trip::model::Trip;

/// 行程生命周期对应的群组协同操作
///
/// 只在关系库写入提交之后调用。文档库这边的失败一律记日志吞掉，
/// 不重试，也不回滚已提交的行程变更。
pub struct GroupLifecycle {
    ops: ChatGroupOperations,
}

impl GroupLifecycle {
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self {
            ops: ChatGroupOperations::new(redis_client),
        }
    }

    /// 行程创建成功 -> 建群
    pub async fn on_trip_created(&self, trip: &Trip) -> Option<ChatGroupDoc> {
        match self
            .ops
            .create_group(trip.id, &trip.trip_name, &trip.driver_uid, trip.date_of_trip)
            .await
        {
            Ok(doc) => {
                tracing::info!("chat group {} created for trip {}", doc.group_id, trip.id);
                Some(doc)
            }
            Err(e) => {
                tracing::warn!("failed to create chat group for trip {}: {}", trip.id, e);
                None
            }
        }
    }

    /// 行程改名 -> 群组同名
    pub async fn on_trip_renamed(&self, trip_id: i64, new_name: &str) {
        match self.ops.rename_group(trip_id, new_name).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("no chat group to rename for trip {}", trip_id);
            }
            Err(e) => {
                tracing::warn!("failed to rename chat group for trip {}: {}", trip_id, e);
            }
        }
    }

    /// 行程删除 -> 拆群
    pub async fn on_trip_deleted(&self, trip_id: i64) {
        if let Err(e) = self.ops.delete_group(trip_id).await {
            tracing::warn!("failed to delete chat group for trip {}: {}", trip_id, e);
        }
    }
}
