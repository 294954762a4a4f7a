use async_stream::try_stream;
use futures_util::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::ApiError;
use crate::models::{ChatSettings, Message, ResolvedCredential};

/** \brief 上游能识别的模型标识。 */
pub const KNOWN_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4-vision-preview",
    "gpt-4o",
    "gpt-4o-mini",
];

/**
 * \brief 已知需要显式输出上限的模型返回 4096，其余交给上游默认值。
 */
pub fn max_tokens_for_model(model: &str) -> Option<u32> {
    match model {
        "gpt-4-vision-preview" | "gpt-4o" => Some(4096),
        _ => None,
    }
}

/**
 * \brief 以流式方式调用上游 Chat Completions，返回增量文本流。
 * \details 返回 Ok 时上游已接受请求（响应头就绪）；之后每块增量按到达顺序
 *          产出，不做整体缓冲。流被丢弃时停止读取上游并释放连接。
 *          每块读取受 idle_timeout 约束，上游停滞不会悬挂调用方。
 */
pub async fn stream_chat(
    api_base: &str,
    credential: &ResolvedCredential,
    settings: &ChatSettings,
    messages: &[Message],
    idle_timeout: Duration,
) -> Result<Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>, ApiError> {
    let url = format!("{}/v1/chat/completions", api_base.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut body = json!({
        "model": settings.model,
        "messages": messages,
        "temperature": settings.temperature,
        "stream": true
    });
    if let Some(cap) = max_tokens_for_model(&settings.model) {
        body["max_tokens"] = json!(cap);
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", credential.api_key))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    if let Some(org) = &credential.organization_id {
        headers.insert(
            "OpenAI-Organization",
            HeaderValue::from_str(org).map_err(|e| ApiError::Internal(e.to_string()))?,
        );
    }

    let resp = client
        .post(url)
        .headers(headers)
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream {
            status: None,
            message: e.to_string(),
        })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(ApiError::Upstream {
            status: Some(status),
            message: extract_error_message(&text),
        });
    }

    let mut stream = resp.bytes_stream();
    let mut buf = Vec::<u8>::new();

    let out = try_stream! {
        use futures_util::StreamExt;
        loop {
            let next = timeout(idle_timeout, stream.next())
                .await
                .map_err(|_| ApiError::Upstream {
                    status: None,
                    message: "upstream stream stalled (idle timeout)".to_string(),
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| ApiError::Upstream {
                status: None,
                message: e.to_string(),
            })?;
            buf.extend_from_slice(&chunk);
            loop {
                if let Some(pos) = find_double_newline(&buf) {
                    let block = buf.drain(..pos + 2).collect::<Vec<u8>>();
                    if let Some(line) = extract_data_line(&block) {
                        if line.trim() == "[DONE]" {
                            break;
                        }
                        if let Some(delta) = parse_openai_delta(&line) {
                            yield delta;
                        }
                    }
                } else {
                    break;
                }
            }
        }
        if !buf.is_empty() {
            if let Some(line) = extract_data_line(&buf) {
                if line.trim() != "[DONE]" {
                    if let Some(delta) = parse_openai_delta(&line) {
                        yield delta;
                    }
                }
            }
        }
    };

    Ok(Box::pin(out))
}

/**
 * \brief 从上游错误响应体里提取人可读的消息。
 * \details OpenAI 风格的 {"error":{"message":...}} 优先，否则原样返回文本。
 */
fn extract_error_message(text: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }
    if text.is_empty() {
        "An unexpected error occurred".to_string()
    } else {
        text.to_string()
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn extract_data_line(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    for line in text.lines() {
        let line = line.trim_start();
        if line.starts_with("data:") {
            return Some(line[5..].trim().to_string());
        }
    }
    None
}

fn parse_openai_delta(line: &str) -> Option<String> {
    let v: Value = serde_json::from_str(line).ok()?;
    v.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}
