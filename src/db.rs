//! SQLite 持久化：今日计数以键值对形式保存，便于迁移与长期保存

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use crate::counter::{CounterRecord, CounterStorage};
use crate::error::{Result, StoreError};

/// 数据库文件名（放在应用数据目录下）
pub const DB_FILENAME: &str = "water_cup.db";

/// 设置文件名（与数据库同目录）
pub const SETTINGS_FILENAME: &str = "settings.json";

/// 覆盖数据目录的环境变量
pub const DATA_DIR_ENV: &str = "WATER_CUP_DATA_DIR";

pub const KEY_DATE: &str = "water-date";
pub const KEY_COUNT: &str = "water-count";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 应用数据目录（可迁移：复制此目录即可）
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("water-cup")
}

pub fn db_path() -> PathBuf {
    data_dir().join(DB_FILENAME)
}

pub fn settings_path() -> PathBuf {
    data_dir().join(SETTINGS_FILENAME)
}

/// 打开默认位置的数据库并建表（若不存在）
pub fn open_and_init() -> Result<SqliteStorage> {
    SqliteStorage::open(&db_path())
}

/// 以 SQLite 键值表保存计数记录
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        log::debug!("counter database opened at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }
}

/// 写入或覆盖一个键
fn upsert(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// 创建 kv 表
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

impl CounterStorage for SqliteStorage {
    fn load(&mut self) -> Result<Option<CounterRecord>> {
        let (Some(date), Some(count)) = (self.get(KEY_DATE)?, self.get(KEY_COUNT)?) else {
            return Ok(None);
        };
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| {
            StoreError::CorruptRecord {
                field: KEY_DATE,
                value: date.clone(),
            }
        })?;
        let count = count.trim().parse::<u32>().map_err(|_| StoreError::CorruptRecord {
            field: KEY_COUNT,
            value: count.clone(),
        })?;
        Ok(Some(CounterRecord { date, count }))
    }

    fn save(&mut self, record: &CounterRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        upsert(&tx, KEY_DATE, &record.date.format(DATE_FORMAT).to_string())?;
        upsert(&tx, KEY_COUNT, &record.count.to_string())?;
        tx.commit()?;
        Ok(())
    }
}

/// 内存存储：数据库不可用时的后备，也用于测试
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    record: Option<CounterRecord>,
}

impl MemoryStorage {
    pub fn with_record(record: CounterRecord) -> Self {
        Self {
            record: Some(record),
        }
    }

    pub fn record(&self) -> Option<CounterRecord> {
        self.record
    }
}

impl CounterStorage for MemoryStorage {
    fn load(&mut self) -> Result<Option<CounterRecord>> {
        Ok(self.record)
    }

    fn save(&mut self, record: &CounterRecord) -> Result<()> {
        self.record = Some(*record);
        Ok(())
    }
}
