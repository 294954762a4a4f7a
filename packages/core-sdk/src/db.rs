use anyhow::{anyhow, bail, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::{thread, time::Duration};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::models::{Identity, Profile, Role, Workspace};

/**
 * \brief 打开指定路径的数据库。
 */
pub fn open_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief 运行数据库迁移，创建必要表结构。
 * \details profiles.user_id 上的唯一约束是惰性建档幂等性的基础。
 */
pub fn migrate(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id  TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL,
            role     TEXT NOT NULL DEFAULT 'member',
            openai_api_key TEXT,
            openai_organization_id TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token   TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            email   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workspaces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            name    TEXT NOT NULL,
            is_home INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
        )
    })?;
    Ok(())
}

fn set_bool_config(conn: &Connection, key: &str, value: bool) -> Result<()> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, if value { "1" } else { "0" }],
        )
    })?;
    Ok(())
}

fn get_bool_config(conn: &Connection, key: &str, default: bool) -> Result<bool> {
    let val = conn
        .query_row(
            "SELECT value FROM app_config WHERE key=?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(val.map(|s| s == "1").unwrap_or(default))
}

/**
 * \brief 读取遥测开关。
 */
pub fn get_telemetry_enabled(conn: &Connection) -> Result<bool> {
    get_bool_config(conn, "telemetry_enabled", false)
}

/**
 * \brief 更新遥测开关。
 */
pub fn set_telemetry_enabled(conn: &Connection, enabled: bool) -> Result<()> {
    set_bool_config(conn, "telemetry_enabled", enabled)
}

/**
 * \brief 按会话令牌查找身份；无效令牌返回 None。
 */
pub fn find_session(conn: &Connection, token: &str) -> Result<Option<Identity>> {
    conn.query_row(
        "SELECT user_id, email FROM sessions WHERE token=?1",
        params![token],
        |row| {
            Ok(Identity {
                user_id: row.get(0)?,
                email: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 签发一条会话记录。
 */
pub fn insert_session(conn: &Connection, token: &str, user_id: &str, email: &str) -> Result<()> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO sessions (token, user_id, email) VALUES (?1, ?2, ?3)",
            params![token, user_id, email],
        )
    })?;
    Ok(())
}

/**
 * \brief 按邮箱反查用户 ID（CLI 管理命令使用）。
 */
pub fn find_user_id_by_email(conn: &Connection, email: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE email=?1 LIMIT 1",
        params![email],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let role: String = row.get(3)?;
    Ok(Profile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        role: Role::from_str_or_member(&role),
        openai_api_key: row.get(4)?,
        openai_organization_id: row.get(5)?,
    })
}

const PROFILE_COLUMNS: &str =
    "id, user_id, username, role, openai_api_key, openai_organization_id";

/**
 * \brief 按身份查找 Profile。
 */
pub fn find_profile_by_user_id(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE user_id=?1", PROFILE_COLUMNS),
        params![user_id],
        map_profile_row,
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 为身份插入默认 Profile（角色 member、无凭证）。
 * \details 与并发建档竞争时容忍唯一约束冲突：读回已存在的行而不是报错，
 *          调用方视角下始终幂等。
 */
pub fn insert_profile(conn: &Connection, user_id: &str, username: &str) -> Result<Profile> {
    let inserted = conn.execute(
        "INSERT INTO profiles (user_id, username, role) VALUES (?1, ?2, 'member')",
        params![user_id, username],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation => {}
        Err(e) => return Err(e.into()),
    }
    find_profile_by_user_id(conn, user_id)?
        .ok_or_else(|| anyhow!("profile for {} missing after insert", user_id))
}

/**
 * \brief 更新 Profile 的设置字段；None 表示保持不变。
 */
pub fn update_profile_settings(
    conn: &Connection,
    user_id: &str,
    username: Option<&str>,
    openai_api_key: Option<&str>,
    openai_organization_id: Option<&str>,
) -> Result<()> {
    if let Some(name) = username {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("username must not be empty");
        }
        retry_on_locked(|| {
            conn.execute(
                "UPDATE profiles SET username=?1 WHERE user_id=?2",
                params![trimmed, user_id],
            )
        })?;
    }
    if let Some(key) = openai_api_key {
        retry_on_locked(|| {
            conn.execute(
                "UPDATE profiles SET openai_api_key=?1 WHERE user_id=?2",
                params![key, user_id],
            )
        })?;
    }
    if let Some(org) = openai_organization_id {
        retry_on_locked(|| {
            conn.execute(
                "UPDATE profiles SET openai_organization_id=?1 WHERE user_id=?2",
                params![org, user_id],
            )
        })?;
    }
    Ok(())
}

/**
 * \brief 设置用户角色。
 */
pub fn set_profile_role(conn: &Connection, user_id: &str, role: Role) -> Result<()> {
    let rows = retry_on_locked(|| {
        conn.execute(
            "UPDATE profiles SET role=?1 WHERE user_id=?2",
            params![role.as_str(), user_id],
        )
    })?;
    if rows == 0 {
        bail!("profile for {} not found", user_id);
    }
    Ok(())
}

/**
 * \brief 列出全部 Profile（CLI 管理命令使用）。
 */
pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM profiles ORDER BY id ASC",
        PROFILE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], map_profile_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_workspace_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        is_home: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

const WORKSPACE_COLUMNS: &str = "id, user_id, name, is_home, created_at";

/**
 * \brief 创建工作区。
 */
pub fn create_workspace(
    conn: &Connection,
    user_id: &str,
    name: &str,
    is_home: bool,
) -> Result<i64> {
    let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO workspaces (user_id, name, is_home, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, is_home as i64, created_at],
        )
    })?;
    Ok(conn.last_insert_rowid())
}

/**
 * \brief 按 ID 获取工作区。
 */
pub fn get_workspace_by_id(conn: &Connection, id: i64) -> Result<Option<Workspace>> {
    conn.query_row(
        &format!("SELECT {} FROM workspaces WHERE id=?1", WORKSPACE_COLUMNS),
        params![id],
        map_workspace_row,
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 获取用户的主工作区。
 */
pub fn get_home_workspace(conn: &Connection, user_id: &str) -> Result<Option<Workspace>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM workspaces WHERE user_id=?1 AND is_home=1 LIMIT 1",
            WORKSPACE_COLUMNS
        ),
        params![user_id],
        map_workspace_row,
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 列出用户的全部工作区，按创建时间倒序。
 */
pub fn list_workspaces_by_user(conn: &Connection, user_id: &str) -> Result<Vec<Workspace>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM workspaces WHERE user_id=?1 ORDER BY created_at DESC, id DESC",
        WORKSPACE_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![user_id], map_workspace_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief 列出所有管理员用户创建的工作区；无管理员时返回空列表。
 */
pub fn list_admin_workspaces(conn: &Connection) -> Result<Vec<Workspace>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM workspaces
         WHERE user_id IN (SELECT user_id FROM profiles WHERE role='admin')
         ORDER BY created_at DESC, id DESC",
        WORKSPACE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], map_workspace_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief 更新工作区名称。
 */
pub fn update_workspace(conn: &Connection, id: i64, name: &str) -> Result<()> {
    let rows = retry_on_locked(|| {
        conn.execute(
            "UPDATE workspaces SET name=?1 WHERE id=?2",
            params![name, id],
        )
    })?;
    if rows == 0 {
        bail!("workspace id {} not found", id);
    }
    Ok(())
}

/**
 * \brief 删除工作区。
 */
pub fn delete_workspace(conn: &Connection, id: i64) -> Result<()> {
    retry_on_locked(|| conn.execute("DELETE FROM workspaces WHERE id=?1", params![id]))?;
    Ok(())
}

/**
 * \brief 针对 SQLite 锁冲突的重试助手。
 * \details 捕获 `database is locked`/`database table is locked` 等错误并进行指数退避，最大尝试 6 次。
 */
fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    for attempt in 0..=MAX_RETRIES {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                let backoff = Duration::from_millis(200 * (attempt as u64 + 1));
                thread::sleep(backoff);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("retry_on_locked should have returned within the loop");
}
