pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod policy;
pub mod profile;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config;
    pub use crate::db;
    pub use crate::error;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::policy;
    pub use crate::profile;
    pub use crate::server;
    pub use crate::telemetry;
}
