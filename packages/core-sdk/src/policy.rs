use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{Profile, ResolvedCredential, Role};

/**
 * \brief 按角色策略为一次请求选择上游凭证；纯函数，无 I/O。
 * \details 管理员只用个人 Key（缺失即失败，不降级到共享 Key），
 *          成员只用部署级共享 Key。这样 API 消耗的成本归属是可追责的：
 *          特权用户花自己的配额，普通用户共享运营方控制的池子。
 */
pub fn select_credential(
    profile: &Profile,
    config: &AppConfig,
) -> Result<ResolvedCredential, ApiError> {
    let api_key = match profile.role {
        Role::Admin => non_empty(profile.openai_api_key.as_deref())
            .ok_or_else(|| ApiError::MissingCredential("OpenAI".to_string()))?,
        Role::Member => non_empty(config.system_openai_api_key.as_deref())
            .ok_or_else(|| ApiError::MissingCredential("System OpenAI".to_string()))?,
    };
    let organization_id = non_empty(profile.openai_organization_id.as_deref())
        .or_else(|| non_empty(config.openai_organization_id.as_deref()))
        .map(|s| s.to_string());
    Ok(ResolvedCredential {
        api_key: api_key.to_string(),
        organization_id,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
