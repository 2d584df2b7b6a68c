use std::collections::{HashMap, HashSet};

use sqlx::PgPool;

use crate::database::users::{UserRepository, UserRow};
use crate::error::AppError;
use crate::identity::provider::{IdentityProvider, ProviderIdentity, Role};

/// 一轮同步要执行的镜像写入集合
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub to_insert: Vec<ProviderIdentity>,
    pub to_update: Vec<ProviderIdentity>,
    pub to_delete: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// 上游ID集合与镜像ID集合是否完全一致（快路径判定）
pub fn same_id_sets(upstream: &[ProviderIdentity], mirror: &[UserRow]) -> bool {
    if upstream.len() != mirror.len() {
        return false;
    }
    let upstream_ids: HashSet<&str> = upstream.iter().map(|i| i.uid.as_str()).collect();
    mirror.iter().all(|row| upstream_ids.contains(row.uid.as_str()))
}

/// 计算上游名册与本地镜像的差异
///
/// 仅镜像有的行删除，仅上游有的身份插入，两侧都有且角色不一致的行
/// 以上游为准覆盖用户名与角色。
pub fn diff_rosters(upstream: &[ProviderIdentity], mirror: &[UserRow]) -> SyncPlan {
    let mirror_by_uid: HashMap<&str, &UserRow> =
        mirror.iter().map(|row| (row.uid.as_str(), row)).collect();
    let upstream_ids: HashSet<&str> = upstream.iter().map(|i| i.uid.as_str()).collect();

    let mut plan = SyncPlan::default();

    for row in mirror {
        if !upstream_ids.contains(row.uid.as_str()) {
            plan.to_delete.push(row.uid.clone());
        }
    }

    for identity in upstream {
        match mirror_by_uid.get(identity.uid.as_str()) {
            None => plan.to_insert.push(identity.clone()),
            Some(row) => {
                let upstream_role = identity.role.unwrap_or(Role::User);
                if row.role != upstream_role.as_str() {
                    plan.to_update.push(identity.clone());
                }
            }
        }
    }

    plan
}

/// 把本地身份镜像收敛到上游名册
///
/// 在每个认证请求上被动触发。上游拉取失败会使整轮失败并且不产生
/// 任何镜像写入；调用方只记录告警，不阻塞触发它的请求。
pub async fn reconcile(pool: &PgPool, provider: &IdentityProvider) -> Result<(), AppError> {
    let mut identities = provider.list_identities().await?;

    // 给缺少角色声明的身份补默认角色，一轮内每个身份至多补一次，
    // 下一轮拉取时声明已存在，自然跳过
    for identity in identities.iter_mut() {
        if identity.role.is_none() {
            provider.set_role_claim(&identity.uid, Role::User).await?;
            identity.role = Some(Role::User);
        }
    }

    let mirror = UserRepository::list(pool)
        .await
        .map_err(|e| AppError::db("users/processing-error", e))?;

    // 快路径：两侧ID集合一致时整轮不做写入
    if same_id_sets(&identities, &mirror) {
        return Ok(());
    }

    let plan = diff_rosters(&identities, &mirror);
    tracing::debug!(
        "reconciling identity mirror: +{} ~{} -{}",
        plan.to_insert.len(),
        plan.to_update.len(),
        plan.to_delete.len()
    );

    for uid in &plan.to_delete {
        UserRepository::delete(pool, uid)
            .await
            .map_err(|e| AppError::db("users/processing-error", e))?;
    }

    for identity in &plan.to_insert {
        let role = identity.role.unwrap_or(Role::User);
        UserRepository::insert(pool, &identity.uid, &identity.username, role.as_str())
            .await
            .map_err(|e| AppError::db("users/processing-error", e))?;
    }

    for identity in &plan.to_update {
        let role = identity.role.unwrap_or(Role::User);
        UserRepository::update_profile(pool, &identity.uid, &identity.username, role.as_str())
            .await
            .map_err(|e| AppError::db("users/processing-error", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(uid: &str, role: Option<Role>) -> ProviderIdentity {
        ProviderIdentity {
            uid: uid.to_string(),
            username: format!("{}-name", uid),
            email: None,
            role,
        }
    }

    fn mirror_row(uid: &str, role: &str) -> UserRow {
        UserRow {
            uid: uid.to_string(),
            username: Some(format!("{}-name", uid)),
            role: role.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn diff_inserts_missing_and_deletes_stale_rows() {
        // 上游 {u1, u2}，镜像 {u1, u3} => 插入 u2，删除 u3
        let upstream = vec![
            identity("u1", Some(Role::User)),
            identity("u2", Some(Role::User)),
        ];
        let mirror = vec![mirror_row("u1", "user"), mirror_row("u3", "user")];

        let plan = diff_rosters(&upstream, &mirror);

        assert_eq!(
            plan.to_insert.iter().map(|i| i.uid.as_str()).collect::<Vec<_>>(),
            vec!["u2"]
        );
        assert_eq!(plan.to_delete, vec!["u3".to_string()]);
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn identical_rosters_produce_an_empty_plan() {
        let upstream = vec![
            identity("u1", Some(Role::User)),
            identity("u2", Some(Role::Admin)),
        ];
        let mirror = vec![mirror_row("u1", "user"), mirror_row("u2", "admin")];

        assert!(same_id_sets(&upstream, &mirror));
        assert!(diff_rosters(&upstream, &mirror).is_empty());
    }

    #[test]
    fn role_drift_is_overwritten_from_upstream() {
        let upstream = vec![identity("u1", Some(Role::Admin))];
        let mirror = vec![mirror_row("u1", "user")];

        let plan = diff_rosters(&upstream, &mirror);
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].uid, "u1");
        assert!(plan.to_insert.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn same_id_sets_requires_equal_size_and_content() {
        let upstream = vec![identity("u1", None), identity("u2", None)];
        let mirror_smaller = vec![mirror_row("u1", "user")];
        let mirror_other = vec![mirror_row("u1", "user"), mirror_row("u3", "user")];

        assert!(!same_id_sets(&upstream, &mirror_smaller));
        assert!(!same_id_sets(&upstream, &mirror_other));
    }
}
