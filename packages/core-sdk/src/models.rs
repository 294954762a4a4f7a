use serde::{Deserialize, Serialize};

/**
 * \brief 用户访问等级，决定凭证选择策略。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /** \brief 管理员：使用个人 API Key，消耗自己的配额 */
    Admin,
    /** \brief 普通成员：使用部署级共享 Key */
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /**
     * \brief 从存储字符串解析角色；未知值一律按 member 处理。
     */
    pub fn from_str_or_member(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }
}

/**
 * \brief 经过会话校验的调用者身份。
 */
#[derive(Debug, Clone)]
pub struct Identity {
    /** \brief 外部身份系统的不透明用户 ID */
    pub user_id: String,
    /** \brief 邮箱形式的标签，用于派生用户名 */
    pub email: String,
}

/**
 * \brief 每个身份对应一条持久化的设置记录。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /** \brief 自增主键 */
    pub id: i64,
    /** \brief 身份引用（唯一） */
    pub user_id: String,
    /** \brief 用户名，首次创建时取邮箱 @ 前缀 */
    pub username: String,
    /** \brief 角色 */
    pub role: Role,
    /** \brief 个人 OpenAI API Key（可选） */
    pub openai_api_key: Option<String>,
    /** \brief 个人 OpenAI Organization ID（可选） */
    pub openai_organization_id: Option<String>,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

/**
 * \brief 聊天请求的采样设置。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /** \brief 目标模型标识 */
    pub model: String,
    /** \brief 采样温度 */
    pub temperature: f64,
}

/**
 * \brief 单次请求内派生的凭证，不落库，每次重新计算。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    /** \brief 选中的 API Key */
    pub api_key: String,
    /** \brief 选中的 Organization ID（可选） */
    pub organization_id: Option<String>,
}

/**
 * \brief 工作区，按用户组织会话内容。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /** \brief 自增主键 */
    pub id: i64,
    /** \brief 所属用户 ID */
    pub user_id: String,
    /** \brief 显示名称 */
    pub name: String,
    /** \brief 是否为默认主工作区 */
    pub is_home: bool,
    /** \brief 创建时间（RFC3339） */
    pub created_at: String,
}
