use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/**
 * \brief 面向调用方的错误分类。
 * \details 仅 MissingCredential 与 Upstream 会携带业务信息到达用户；
 *          Profile 插入竞争在解析器内部恢复，不会出现在这里。
 */
#[derive(Debug, Error)]
pub enum ApiError {
    /** \brief 无有效会话 */
    #[error("User not found")]
    Unauthenticated,

    /** \brief 当前策略分支下没有可用的 API Key；参数为 Key 名称 */
    #[error("{0} API Key not found")]
    MissingCredential(String),

    /** \brief 上游拒绝或失败；状态码缺失时按 500 处理 */
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /** \brief 请求体校验失败 */
    #[error("{0}")]
    BadRequest(String),

    /** \brief 资源不存在或不属于调用者 */
    #[error("{0}")]
    NotFound(String),

    /** \brief 内部错误（存储等） */
    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/**
 * \brief 将上游错误文本规范化为用户可见的提示。
 * \details 大小写不敏感匹配；无法识别的消息原样透传。
 */
pub fn normalize_upstream_message(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("api key not found") {
        "OpenAI API Key not found. Please set it in your profile settings.".to_string()
    } else if lower.contains("incorrect api key") {
        "OpenAI API Key is incorrect. Please fix it in your profile settings.".to_string()
    } else {
        message.to_string()
    }
}

/** \brief 统一的错误响应体：{ "message": ... }。 */
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::MissingCredential(_) => (
                StatusCode::BAD_REQUEST,
                normalize_upstream_message(&self.to_string()),
            ),
            ApiError::Upstream { status, message } => (
                status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                normalize_upstream_message(message),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
