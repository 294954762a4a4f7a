use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use chatforge_core_sdk::{config::AppConfig, db, models::Role, server, telemetry};

/**
 * \brief 运维 CLI：用户开通、角色与凭证管理、启动服务。
 */
#[derive(Parser, Debug)]
#[command(name = "chatforge", version, about = "ChatForge chat relay service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 创建用户：建档、主工作区与会话令牌，令牌打印到标准输出。
     */
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "member")]
        role: String,
        /** \brief 管理员的个人 OpenAI API Key（可选） */
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long, default_value_t = false)]
        enable_telemetry: bool,
    },

    /**
     * \brief 修改用户角色。
     */
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: String,
    },

    /**
     * \brief 设置用户的个人凭证。
     */
    SetKey {
        #[arg(long)]
        email: String,
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        organization_id: Option<String>,
    },

    /**
     * \brief 列出全部用户档案。
     */
    ListUsers,

    /**
     * \brief 启动 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:5173")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let conn = db::open_db(&config.db_path).context("open database failed")?;
    db::migrate(&conn).context("apply migrations failed")?;
    telemetry::set_enabled(db::get_telemetry_enabled(&conn).unwrap_or(false));

    match cli.command {
        Commands::AddUser {
            email,
            role,
            api_key,
            enable_telemetry,
        } => {
            let user_id = Uuid::new_v4().to_string();
            let username = email.split('@').next().unwrap_or("").to_string();
            let profile = db::insert_profile(&conn, &user_id, &username)
                .context("create profile failed")?;
            let role = Role::from_str_or_member(&role);
            if role != profile.role {
                db::set_profile_role(&conn, &user_id, role).context("set role failed")?;
            }
            if let Some(key) = api_key.as_deref() {
                db::update_profile_settings(&conn, &user_id, None, Some(key), None)
                    .context("store api key failed")?;
            }
            db::create_workspace(&conn, &user_id, "Home", true)
                .context("create home workspace failed")?;

            let token = Uuid::new_v4().to_string();
            db::insert_session(&conn, &token, &user_id, &email)
                .context("issue session failed")?;

            db::set_telemetry_enabled(&conn, enable_telemetry)
                .context("save telemetry failed")?;
            telemetry::set_enabled(enable_telemetry);
            telemetry::log_event(
                "cli.user",
                &format!("add email={} role={}", email, role.as_str()),
            );
            println!(
                "Created user id={} (email={} role={})",
                user_id,
                email,
                role.as_str()
            );
            println!("Session token: {}", token);
        }
        Commands::SetRole { email, role } => {
            let user_id = db::find_user_id_by_email(&conn, &email)?
                .with_context(|| format!("no user with email {}", email))?;
            let role = Role::from_str_or_member(&role);
            db::set_profile_role(&conn, &user_id, role).context("set role failed")?;
            telemetry::log_event(
                "cli.user",
                &format!("set-role email={} role={}", email, role.as_str()),
            );
            println!("Updated {} -> role={}", email, role.as_str());
        }
        Commands::SetKey {
            email,
            api_key,
            organization_id,
        } => {
            let user_id = db::find_user_id_by_email(&conn, &email)?
                .with_context(|| format!("no user with email {}", email))?;
            db::update_profile_settings(
                &conn,
                &user_id,
                None,
                Some(&api_key),
                organization_id.as_deref(),
            )
            .context("store api key failed")?;
            telemetry::log_event("cli.user", &format!("set-key email={}", email));
            println!("Stored personal key for {}", email);
        }
        Commands::ListUsers => {
            let profiles = db::list_profiles(&conn).context("list profiles failed")?;
            for p in profiles {
                println!(
                    "{}  {}  role={}  key={}",
                    p.id,
                    p.username,
                    p.role.as_str(),
                    if p.openai_api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false) {
                        "set"
                    } else {
                        "-"
                    }
                );
            }
        }
        Commands::Serve { addr } => {
            drop(conn);
            server::run(&addr, config).await?;
        }
    }

    Ok(())
}
