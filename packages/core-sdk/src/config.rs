use std::time::Duration;

/**
 * \brief 部署级配置，进程启动时从环境读取一次。
 * \details 之后以不可变值显式传递，凭证选择策略不在调用点临时读环境。
 */
#[derive(Debug, Clone)]
pub struct AppConfig {
    /** \brief 普通成员共享的系统级 OpenAI API Key */
    pub system_openai_api_key: Option<String>,
    /** \brief 部署默认的 OpenAI Organization ID */
    pub openai_organization_id: Option<String>,
    /** \brief 环境覆盖层：存在时优先于 Profile 中存储的个人 Key */
    pub openai_api_key_override: Option<String>,
    /** \brief 上游 API 基地址 */
    pub openai_api_base: String,
    /** \brief SQLite 数据库文件路径 */
    pub db_path: String,
    /** \brief 前端静态资源目录 */
    pub ui_dir: String,
    /** \brief 前端静态资源备选目录 */
    pub ui_fallback_dir: String,
    /** \brief 上游流式读取的单块空闲超时 */
    pub upstream_idle_timeout: Duration,
}

impl AppConfig {
    /**
     * \brief 读取环境变量构建配置；空字符串视为未设置。
     */
    pub fn from_env() -> AppConfig {
        let idle_secs = std::env::var("CHATFORGE_UPSTREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(90);
        AppConfig {
            system_openai_api_key: env_opt("SYSTEM_OPENAI_API_KEY"),
            openai_organization_id: env_opt("OPENAI_ORGANIZATION_ID"),
            openai_api_key_override: env_opt("OPENAI_API_KEY"),
            openai_api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            db_path: std::env::var("CHATFORGE_DB")
                .unwrap_or_else(|_| "chatforge.db".to_string()),
            ui_dir: std::env::var("CHATFORGE_UI_DIR")
                .unwrap_or_else(|_| "packages/ui/dist".to_string()),
            ui_fallback_dir: std::env::var("CHATFORGE_UI_FALLBACK")
                .unwrap_or_else(|_| "web".to_string()),
            upstream_idle_timeout: Duration::from_secs(idle_secs),
        }
    }
}

impl Default for AppConfig {
    /**
     * \brief 测试与 CLI 使用的空配置：无共享 Key、无覆盖层。
     */
    fn default() -> AppConfig {
        AppConfig {
            system_openai_api_key: None,
            openai_organization_id: None,
            openai_api_key_override: None,
            openai_api_base: "https://api.openai.com".to_string(),
            db_path: "chatforge.db".to_string(),
            ui_dir: "packages/ui/dist".to_string(),
            ui_fallback_dir: "web".to_string(),
            upstream_idle_timeout: Duration::from_secs(90),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
