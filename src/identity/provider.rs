use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

/// 单页拉取上限，受上游分页限制约束
const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// 上游身份记录（角色声明可能缺失，由同步过程补默认值）
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub uid: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// 验证通过的 token 声明，角色以上游为准
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub uid: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
struct AccountRecord {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    // 上游把自定义声明编码成一个 JSON 字符串
    #[serde(rename = "customAttributes", default)]
    custom_attributes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountPage {
    #[serde(default)]
    users: Vec<AccountRecord>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

pub fn role_from_custom_attributes(attrs: Option<&str>) -> Option<Role> {
    let attrs = attrs?;
    let value: serde_json::Value = serde_json::from_str(attrs).ok()?;
    value
        .get("role")
        .and_then(|role| role.as_str())
        .and_then(Role::parse)
}

impl From<AccountRecord> for ProviderIdentity {
    fn from(record: AccountRecord) -> Self {
        let role = role_from_custom_attributes(record.custom_attributes.as_deref());
        ProviderIdentity {
            uid: record.local_id,
            username: record.display_name.unwrap_or_default(),
            email: record.email,
            role,
        }
    }
}

pub struct IdentityProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

impl IdentityProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            base_url: config.identity_api_url.trim_end_matches('/').to_string(),
            api_key: config.identity_api_key.clone(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, action, self.api_key)
    }

    /// 分页拉取完整的上游用户名册；任何一页失败则整体失败
    pub async fn list_identities(&self) -> Result<Vec<ProviderIdentity>, AppError> {
        let mut identities = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.endpoint("batchGet"))
                .query(&[("maxResults", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("nextPageToken", token.clone())]);
            }

            let page: AccountPage = request
                .send()
                .await
                .map_err(|e| Self::unreachable("list identities", e))?
                .error_for_status()
                .map_err(|e| Self::unreachable("list identities", e))?
                .json()
                .await
                .map_err(|e| Self::unreachable("decode identity page", e))?;

            identities.extend(page.users.into_iter().map(ProviderIdentity::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(identities)
    }

    /// 把角色写回上游自定义声明
    pub async fn set_role_claim(&self, uid: &str, role: Role) -> Result<(), AppError> {
        let claims = format!(r#"{{"role":"{}"}}"#, role.as_str());
        self.http
            .post(self.endpoint("update"))
            .json(&serde_json::json!({
                "localId": uid,
                "customAttributes": claims,
            }))
            .send()
            .await
            .map_err(|e| Self::unreachable("set role claim", e))?
            .error_for_status()
            .map_err(|e| Self::unreachable("set role claim", e))?;
        Ok(())
    }

    /// 验证客户端 token，返回 uid 与上游的角色声明
    pub async fn verify_token(&self, id_token: &str) -> Result<TokenClaims, AppError> {
        let response = self
            .http
            .post(self.endpoint("lookup"))
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| Self::unreachable("verify token", e))?;

        if response.status().is_client_error() {
            return Err(AppError::Unauthorized("auth/invalid-token"));
        }

        let page: AccountPage = response
            .error_for_status()
            .map_err(|e| Self::unreachable("verify token", e))?
            .json()
            .await
            .map_err(|e| Self::unreachable("decode token lookup", e))?;

        let record = page
            .users
            .into_iter()
            .next()
            .ok_or(AppError::Unauthorized("auth/invalid-token"))?;
        let identity = ProviderIdentity::from(record);

        Ok(TokenClaims {
            uid: identity.uid,
            // 缺失角色声明时按最小权限处理
            role: identity.role.unwrap_or(Role::User),
        })
    }

    /// 按邮箱查上游身份（白名单移除时的级联入口）
    pub async fn find_by_email(&self, email: &str) -> Result<Option<ProviderIdentity>, AppError> {
        let response = self
            .http
            .post(self.endpoint("lookup"))
            .json(&serde_json::json!({ "email": [email] }))
            .send()
            .await
            .map_err(|e| Self::unreachable("lookup by email", e))?;

        if response.status().is_client_error() {
            // 上游对未知邮箱返回 4xx
            return Ok(None);
        }

        let page: AccountPage = response
            .error_for_status()
            .map_err(|e| Self::unreachable("lookup by email", e))?
            .json()
            .await
            .map_err(|e| Self::unreachable("decode email lookup", e))?;

        Ok(page.users.into_iter().next().map(ProviderIdentity::from))
    }

    /// 删除上游身份；镜像行由调用方或下一轮同步清理
    pub async fn delete_identity(&self, uid: &str) -> Result<(), AppError> {
        self.http
            .post(self.endpoint("delete"))
            .json(&serde_json::json!({ "localId": uid }))
            .send()
            .await
            .map_err(|e| Self::unreachable("delete identity", e))?
            .error_for_status()
            .map_err(|e| Self::unreachable("delete identity", e))?;
        Ok(())
    }

    fn unreachable(action: &str, err: reqwest::Error) -> AppError {
        tracing::warn!("identity provider unreachable ({}): {}", action, err);
        AppError::UpstreamUnavailable("auth/provider-unreachable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_rejects_unknown_values() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_claim_is_read_from_custom_attributes() {
        assert_eq!(
            role_from_custom_attributes(Some(r#"{"role":"admin"}"#)),
            Some(Role::Admin)
        );
        assert_eq!(
            role_from_custom_attributes(Some(r#"{"role":"user"}"#)),
            Some(Role::User)
        );
    }

    #[test]
    fn missing_or_malformed_claims_yield_no_role() {
        assert_eq!(role_from_custom_attributes(None), None);
        assert_eq!(role_from_custom_attributes(Some("not json")), None);
        assert_eq!(role_from_custom_attributes(Some(r#"{"other":1}"#)), None);
        assert_eq!(
            role_from_custom_attributes(Some(r#"{"role":"owner"}"#)),
            None
        );
    }
}
