//! 统一错误类型：持久化、设置文件、开机自启

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 存储中的记录无法解析（日期或计数格式错误）
    #[error("corrupt record field `{field}`: {value:?}")]
    CorruptRecord { field: &'static str, value: String },

    #[error("auto-launch registration failed: {0}")]
    AutoLaunch(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
