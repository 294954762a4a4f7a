use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Response,
    routing::{get, get_service, post},
    Json, Router,
};
use futures_util::StreamExt;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::{
    config::AppConfig,
    db,
    error::ApiError,
    llm,
    models::{ChatSettings, Identity, Message, Profile, Workspace},
    policy, profile, telemetry,
};

/**
 * \brief 启动 HTTP 服务，提供静态前端与 API。
 * \param addr 监听地址，如 "127.0.0.1:5173"
 */
pub async fn run(addr: &str, config: AppConfig) -> Result<()> {
    let conn = db::open_db(&config.db_path)?;
    db::migrate(&conn)?;
    telemetry::set_enabled(db::get_telemetry_enabled(&conn).unwrap_or(false));
    drop(conn);

    let app = router(config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 组装路由；独立出来便于测试直接挂载。
 */
pub fn router(config: AppConfig) -> Router {
    let static_handler = if std::path::Path::new(&config.ui_dir).exists() {
        ServeDir::new(config.ui_dir.clone())
    } else {
        ServeDir::new(config.ui_fallback_dir.clone())
    }
    .append_index_html_on_directories(true);

    let static_service = get_service(static_handler);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat/openai", post(chat_openai))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route(
            "/api/workspaces",
            get(list_workspaces).post(create_workspace),
        )
        .route("/api/workspaces/home", get(get_home_workspace))
        .route("/api/workspaces/admin", get(list_admin_workspaces))
        .route(
            "/api/workspaces/{id}",
            get(get_workspace)
                .put(rename_workspace)
                .delete(delete_workspace),
        )
        .fallback_service(static_service)
        .with_state(Arc::new(config))
}

fn open(config: &AppConfig) -> Result<Connection, ApiError> {
    db::open_db(&config.db_path).map_err(ApiError::from)
}

/**
 * \brief 从 Authorization: Bearer 头解析会话并返回身份。
 */
fn authenticate(conn: &Connection, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    db::find_session(conn, token)
        .map_err(ApiError::from)?
        .ok_or(ApiError::Unauthenticated)
}

/** \brief 入站聊天请求体：{ chatSettings, messages }。 */
#[derive(Deserialize, Debug)]
struct ChatRequestBody {
    #[serde(rename = "chatSettings")]
    chat_settings: ChatSettings,
    messages: Vec<Message>,
}

/**
 * \brief 聊天转发入口：POST /api/chat/openai。
 * \details 鉴权 → 解析 Profile → 按角色选凭证 → 上游流式调用 →
 *          将增量按到达顺序转发给调用方（不整体缓冲）。
 *          调用方断开时响应体流被丢弃，上游读取随之停止。
 */
async fn chat_openai(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequestBody>,
) -> Result<Response, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;

    if payload.messages.is_empty() {
        return Err(ApiError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }
    let model = payload.chat_settings.model.as_str();
    if !llm::KNOWN_MODELS.contains(&model) {
        return Err(ApiError::BadRequest(format!("unknown model: {}", model)));
    }

    let profile = profile::resolve_profile(&conn, &identity, &config)?;
    let credential = policy::select_credential(&profile, &config)?;
    drop(conn);

    telemetry::log_event(
        "server.chat",
        &format!(
            "user={} role={} model={} msgs={}",
            profile.user_id,
            profile.role.as_str(),
            model,
            payload.messages.len()
        ),
    );

    let stream = llm::stream_chat(
        &config.openai_api_base,
        &credential,
        &payload.chat_settings,
        &payload.messages,
        config.upstream_idle_timeout,
    )
    .await?;

    let body_stream = stream.map(|item| match item {
        Ok(delta) => Ok(Bytes::from(delta)),
        Err(e) => {
            telemetry::log_error("server.chat", &format!("stream error: {}", e));
            Err(std::io::Error::other(e.to_string()))
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/** \brief Profile 的对外视图；个人 Key 只暴露是否已配置。 */
#[derive(Serialize, Debug)]
struct ProfileDto {
    user_id: String,
    username: String,
    role: String,
    has_openai_api_key: bool,
    openai_organization_id: Option<String>,
}

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        ProfileDto {
            user_id: p.user_id,
            username: p.username,
            role: p.role.as_str().to_string(),
            has_openai_api_key: p
                .openai_api_key
                .as_deref()
                .map(|k| !k.is_empty())
                .unwrap_or(false),
            openai_organization_id: p.openai_organization_id,
        }
    }
}

/**
 * \brief 获取当前用户的 Profile（不存在时惰性创建）。
 */
async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<ProfileDto>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    let profile = profile::resolve_profile(&conn, &identity, &config)?;
    Ok(Json(profile.into()))
}

#[derive(Deserialize, Debug)]
struct ProfileUpdateRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    openai_api_key: Option<String>,
    #[serde(default)]
    openai_organization_id: Option<String>,
}

/**
 * \brief 更新当前用户的设置字段；未提供的字段保持不变。
 */
async fn update_profile(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileDto>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    profile::resolve_profile(&conn, &identity, &config)?;
    db::update_profile_settings(
        &conn,
        &identity.user_id,
        payload.username.as_deref(),
        payload.openai_api_key.as_deref(),
        payload.openai_organization_id.as_deref(),
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    telemetry::log_event("server.profile", &format!("update user={}", identity.user_id));
    let updated = profile::resolve_profile(&conn, &identity, &config)?;
    Ok(Json(updated.into()))
}

#[derive(Deserialize, Debug)]
struct WorkspaceInput {
    name: String,
}

/**
 * \brief 列出当前用户的工作区。
 */
async fn list_workspaces(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workspace>>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    profile::resolve_profile(&conn, &identity, &config)?;
    let spaces = db::list_workspaces_by_user(&conn, &identity.user_id)?;
    Ok(Json(spaces))
}

/**
 * \brief 获取当前用户的主工作区；历史数据缺失时就地补建。
 */
async fn get_home_workspace(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Workspace>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    profile::resolve_profile(&conn, &identity, &config)?;
    if let Some(home) = db::get_home_workspace(&conn, &identity.user_id)? {
        return Ok(Json(home));
    }
    db::create_workspace(&conn, &identity.user_id, "Home", true)?;
    let home = db::get_home_workspace(&conn, &identity.user_id)?
        .ok_or_else(|| ApiError::Internal("home workspace missing after create".to_string()))?;
    Ok(Json(home))
}

/**
 * \brief 列出所有管理员创建的工作区；无管理员时为空列表。
 */
async fn list_admin_workspaces(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workspace>>, ApiError> {
    let conn = open(&config)?;
    authenticate(&conn, &headers)?;
    let spaces = db::list_admin_workspaces(&conn)?;
    Ok(Json(spaces))
}

/**
 * \brief 新建工作区。
 */
async fn create_workspace(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(payload): Json<WorkspaceInput>,
) -> Result<Json<Workspace>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "workspace name must not be empty".to_string(),
        ));
    }
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    profile::resolve_profile(&conn, &identity, &config)?;
    let id = db::create_workspace(&conn, &identity.user_id, name, false)?;
    let ws = db::get_workspace_by_id(&conn, id)?
        .ok_or_else(|| ApiError::Internal("workspace missing after create".to_string()))?;
    telemetry::log_event(
        "server.workspace",
        &format!("create id={} user={}", id, identity.user_id),
    );
    Ok(Json(ws))
}

fn owned_workspace(
    conn: &Connection,
    identity: &Identity,
    id: i64,
) -> Result<Workspace, ApiError> {
    let ws = db::get_workspace_by_id(conn, id)?
        .filter(|ws| ws.user_id == identity.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("workspace {} not found", id)))?;
    Ok(ws)
}

/**
 * \brief 获取单个工作区（仅限本人）。
 */
async fn get_workspace(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Workspace>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    Ok(Json(owned_workspace(&conn, &identity, id)?))
}

/**
 * \brief 重命名工作区（仅限本人）。
 */
async fn rename_workspace(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<WorkspaceInput>,
) -> Result<Json<Workspace>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "workspace name must not be empty".to_string(),
        ));
    }
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    owned_workspace(&conn, &identity, id)?;
    db::update_workspace(&conn, id, name)?;
    let ws = db::get_workspace_by_id(&conn, id)?
        .ok_or_else(|| ApiError::Internal("workspace missing after rename".to_string()))?;
    telemetry::log_event("server.workspace", &format!("rename id={}", id));
    Ok(Json(ws))
}

/**
 * \brief 删除工作区（仅限本人；主工作区不可删）。
 */
async fn delete_workspace(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = open(&config)?;
    let identity = authenticate(&conn, &headers)?;
    let ws = owned_workspace(&conn, &identity, id)?;
    if ws.is_home {
        return Err(ApiError::BadRequest(
            "home workspace cannot be deleted".to_string(),
        ));
    }
    db::delete_workspace(&conn, id)?;
    telemetry::log_event("server.workspace", &format!("delete id={}", id));
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/**
 * \brief 存活探针。
 */
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::routing::post as axum_post;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DB_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn temp_db_path() -> String {
        let n = DB_SEQ.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!("chatforge-test-{}-{}.db", std::process::id(), n))
            .to_string_lossy()
            .to_string()
    }

    struct TestApp {
        base: String,
        config: AppConfig,
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            std::fs::remove_file(&self.config.db_path).ok();
        }
    }

    async fn spawn_app(mut config: AppConfig) -> TestApp {
        config.db_path = temp_db_path();
        let conn = db::open_db(&config.db_path).expect("open db");
        db::migrate(&conn).expect("migrate");
        drop(conn);

        let app = router(config.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        TestApp {
            base: format!("http://{}", addr),
            config,
        }
    }

    fn seed_session(config: &AppConfig, token: &str, user_id: &str, email: &str) {
        let conn = db::open_db(&config.db_path).expect("open db");
        db::insert_session(&conn, token, user_id, email).expect("session");
    }

    fn chat_body(model: &str) -> serde_json::Value {
        json!({
            "chatSettings": { "model": model, "temperature": 0.7 },
            "messages": [{ "role": "user", "content": "hi" }]
        })
    }

    /** \brief 一次性 mock 上游：立即吐出固定的 SSE 增量序列。 */
    async fn spawn_canned_upstream(deltas: Vec<&'static str>) -> String {
        async fn handler(State(deltas): State<Arc<Vec<&'static str>>>) -> Response {
            let mut body = String::new();
            for d in deltas.iter() {
                body.push_str(&format!(
                    "data: {}\n\n",
                    json!({"choices": [{"delta": {"content": d}}]})
                ));
            }
            body.push_str("data: [DONE]\n\n");
            Response::builder()
                .status(200)
                .header("content-type", "text/event-stream")
                .body(Body::from(body))
                .expect("response")
        }
        let app = Router::new()
            .route("/v1/chat/completions", axum_post(handler))
            .with_state(Arc::new(deltas));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_chat_requires_session() {
        let app = spawn_app(AppConfig::default()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .json(&chat_body("gpt-4o"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 401);

        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("bogus-token")
            .json(&chat_body("gpt-4o"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn test_chat_validates_request_shape() {
        let app = spawn_app(AppConfig::default()).await;
        seed_session(&app.config, "tok", "u-1", "alice@example.com");
        let client = reqwest::Client::new();

        let empty = json!({
            "chatSettings": { "model": "gpt-4o", "temperature": 0.7 },
            "messages": []
        });
        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("tok")
            .json(&empty)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 400);

        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("tok")
            .json(&chat_body("gpt-9000"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 400);
        let v: serde_json::Value = resp.json().await.expect("json");
        assert!(v["message"].as_str().unwrap_or("").contains("unknown model"));
    }

    #[tokio::test]
    async fn test_member_without_system_key_gets_guidance() {
        let app = spawn_app(AppConfig::default()).await;
        seed_session(&app.config, "tok", "u-1", "alice@example.com");
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("tok")
            .json(&chat_body("gpt-4o"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 400);
        let v: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(
            v["message"],
            "OpenAI API Key not found. Please set it in your profile settings."
        );
    }

    #[tokio::test]
    async fn test_member_chat_relays_stream_with_shared_key() {
        let upstream = spawn_canned_upstream(vec!["Hello", " world"]).await;
        let config = AppConfig {
            system_openai_api_key: Some("sk-system".to_string()),
            openai_api_base: upstream,
            ..AppConfig::default()
        };
        let app = spawn_app(config).await;
        seed_session(&app.config, "tok", "u-1", "alice@example.com");
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("tok")
            .json(&chat_body("gpt-4o"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let text = resp.text().await.expect("body");
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_admin_incorrect_key_maps_status_and_message() {
        async fn reject() -> Response {
            Response::builder()
                .status(401)
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"error": {"message": "Incorrect API key provided: sk-bad"}})
                        .to_string(),
                ))
                .expect("response")
        }
        let upstream_app = Router::new().route("/v1/chat/completions", axum_post(reject));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let upstream = format!("http://{}", listener.local_addr().expect("addr"));
        tokio::spawn(async move {
            axum::serve(listener, upstream_app).await.ok();
        });

        let config = AppConfig {
            openai_api_base: upstream,
            ..AppConfig::default()
        };
        let app = spawn_app(config).await;
        seed_session(&app.config, "tok", "u-admin", "boss@example.com");
        {
            let conn = db::open_db(&app.config.db_path).expect("open db");
            db::insert_profile(&conn, "u-admin", "boss").expect("profile");
            db::set_profile_role(&conn, "u-admin", Role::Admin).expect("role");
            db::update_profile_settings(&conn, "u-admin", None, Some("sk-bad"), None)
                .expect("key");
        }

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/chat/openai", app.base))
            .bearer_auth("tok")
            .json(&chat_body("gpt-4o"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 401);
        let v: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(
            v["message"],
            "OpenAI API Key is incorrect. Please fix it in your profile settings."
        );
    }

    #[tokio::test]
    async fn test_profile_roundtrip_and_redaction() {
        let app = spawn_app(AppConfig::default()).await;
        seed_session(&app.config, "tok", "u-1", "alice@example.com");
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/api/profile", app.base))
            .bearer_auth("tok")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let v: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(v["username"], "alice");
        assert_eq!(v["role"], "member");
        assert_eq!(v["has_openai_api_key"], false);

        let resp = client
            .put(format!("{}/api/profile", app.base))
            .bearer_auth("tok")
            .json(&json!({ "openai_api_key": "sk-own", "username": "alice2" }))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let v: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(v["username"], "alice2");
        assert_eq!(v["has_openai_api_key"], true);
        // 原始 Key 不出现在响应里
        assert!(v.get("openai_api_key").is_none());
    }

    #[tokio::test]
    async fn test_workspace_lifecycle_and_ownership() {
        let app = spawn_app(AppConfig::default()).await;
        seed_session(&app.config, "tok-a", "u-a", "a@example.com");
        seed_session(&app.config, "tok-b", "u-b", "b@example.com");
        let client = reqwest::Client::new();

        // 首次访问自动有主工作区
        let resp = client
            .get(format!("{}/api/workspaces/home", app.base))
            .bearer_auth("tok-a")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let home: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(home["is_home"], true);

        let resp = client
            .post(format!("{}/api/workspaces", app.base))
            .bearer_auth("tok-a")
            .json(&json!({ "name": "Research" }))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let ws: serde_json::Value = resp.json().await.expect("json");
        let ws_id = ws["id"].as_i64().expect("id");

        // 他人不可见
        let resp = client
            .get(format!("{}/api/workspaces/{}", app.base, ws_id))
            .bearer_auth("tok-b")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 404);

        let resp = client
            .put(format!("{}/api/workspaces/{}", app.base, ws_id))
            .bearer_auth("tok-a")
            .json(&json!({ "name": "Research v2" }))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
        let ws: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(ws["name"], "Research v2");

        // 主工作区拒绝删除
        let home_id = home["id"].as_i64().expect("home id");
        let resp = client
            .delete(format!("{}/api/workspaces/{}", app.base, home_id))
            .bearer_auth("tok-a")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 400);

        let resp = client
            .delete(format!("{}/api/workspaces/{}", app.base, ws_id))
            .bearer_auth("tok-a")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);

        let resp = client
            .get(format!("{}/api/workspaces", app.base))
            .bearer_auth("tok-a")
            .send()
            .await
            .expect("request");
        let list: Vec<serde_json::Value> = resp.json().await.expect("json");
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_admin_workspace_listing_endpoint() {
        let app = spawn_app(AppConfig::default()).await;
        seed_session(&app.config, "tok-a", "u-admin", "boss@example.com");
        seed_session(&app.config, "tok-m", "u-member", "worker@example.com");
        let client = reqwest::Client::new();

        // 双方都触发建档 + 主工作区
        for tok in ["tok-a", "tok-m"] {
            client
                .get(format!("{}/api/profile", app.base))
                .bearer_auth(tok)
                .send()
                .await
                .expect("request");
        }

        let resp = client
            .get(format!("{}/api/workspaces/admin", app.base))
            .bearer_auth("tok-m")
            .send()
            .await
            .expect("request");
        let list: Vec<serde_json::Value> = resp.json().await.expect("json");
        assert!(list.is_empty());

        {
            let conn = db::open_db(&app.config.db_path).expect("open db");
            db::set_profile_role(&conn, "u-admin", Role::Admin).expect("role");
        }
        let resp = client
            .get(format!("{}/api/workspaces/admin", app.base))
            .bearer_auth("tok-m")
            .send()
            .await
            .expect("request");
        let list: Vec<serde_json::Value> = resp.json().await.expect("json");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["user_id"], "u-admin");
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let app = spawn_app(AppConfig::default()).await;
        let resp = reqwest::get(format!("{}/api/health", app.base))
            .await
            .expect("request");
        assert_eq!(resp.status().as_u16(), 200);
    }
}
