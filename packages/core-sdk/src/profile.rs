use anyhow::Result;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db;
use crate::models::{Identity, Profile};

/**
 * \brief 解析调用者的 Profile；不存在时惰性建档。
 * \details 首次访问会插入默认档案（member、无凭证）并补建主工作区。
 *          同一身份的并发首次访问由存储层的唯一约束兜底，最终只会留下一行。
 *          返回前叠加部署级覆盖层：环境里设置的 Key/Org 优先于库中存储值。
 */
pub fn resolve_profile(
    conn: &Connection,
    identity: &Identity,
    config: &AppConfig,
) -> Result<Profile> {
    let profile = match db::find_profile_by_user_id(conn, &identity.user_id)? {
        Some(existing) => existing,
        None => {
            let username = derive_username(&identity.email);
            let created = db::insert_profile(conn, &identity.user_id, &username)?;
            if db::get_home_workspace(conn, &identity.user_id)?.is_none() {
                db::create_workspace(conn, &identity.user_id, "Home", true)?;
            }
            created
        }
    };
    Ok(apply_overrides(profile, config))
}

/**
 * \brief 用户名取邮箱 @ 前的部分。
 */
fn derive_username(email: &str) -> String {
    email.split('@').next().unwrap_or("").to_string()
}

fn apply_overrides(mut profile: Profile, config: &AppConfig) -> Profile {
    if let Some(key) = &config.openai_api_key_override {
        profile.openai_api_key = Some(key.clone());
    }
    if let Some(org) = &config.openai_organization_id {
        profile.openai_organization_id = Some(org.clone());
    }
    profile
}
