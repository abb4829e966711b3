pub mod chat;
pub mod config;
pub mod error;
pub mod failover;
pub mod fallback;
pub mod history;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod relay;
pub mod retry;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::chat;
    pub use crate::config;
    pub use crate::error;
    pub use crate::fallback;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::server;
    pub use crate::telemetry;
}
