//! 基于 SQLite 的每日计数：模拟重启与跨天，以及设置文件的读写

use std::cell::Cell;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use water_cup::db::{SqliteStorage, KEY_COUNT, KEY_DATE};
use water_cup::settings::SettingsStore;
use water_cup::{CounterRecord, CounterStorage, DailyCounterStore};

fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

fn shared_clock(start: NaiveDateTime) -> (Rc<Cell<NaiveDateTime>>, impl Fn() -> NaiveDateTime + Clone) {
    let now = Rc::new(Cell::new(start));
    let handle = now.clone();
    (now, move || handle.get())
}

#[test]
fn yesterday_record_is_reset_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water_cup.db");
    {
        let mut db = SqliteStorage::open(&path).unwrap();
        db.save(&CounterRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            count: 7,
        })
        .unwrap();
    }

    let (_, clock) = shared_clock(noon(2024, 1, 2));
    let mut store = DailyCounterStore::new(SqliteStorage::open(&path).unwrap(), clock);
    let record = store.read();
    assert_eq!(record, CounterRecord::fresh(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));

    let db = SqliteStorage::open(&path).unwrap();
    assert_eq!(db.get(KEY_DATE).unwrap().as_deref(), Some("2024-01-02"));
    assert_eq!(db.get(KEY_COUNT).unwrap().as_deref(), Some("0"));
}

#[test]
fn count_survives_restart_on_the_same_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water_cup.db");
    let (now, clock) = shared_clock(noon(2024, 6, 1));

    {
        let mut store = DailyCounterStore::new(SqliteStorage::open(&path).unwrap(), clock.clone());
        for _ in 0..5 {
            store.increment();
        }
    }

    now.set(noon(2024, 6, 1) + chrono::Duration::hours(6));
    let mut store = DailyCounterStore::new(SqliteStorage::open(&path).unwrap(), clock);
    assert_eq!(store.read().count, 5);
    assert_eq!(store.increment(), 6);
}

#[test]
fn corrupt_database_values_reset_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water_cup.db");
    {
        drop(SqliteStorage::open(&path).unwrap());
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO kv (key, value) VALUES ('water-date', 'not a date'), ('water-count', 'many');",
        )
        .unwrap();
    }

    let (_, clock) = shared_clock(noon(2024, 6, 1));
    let mut store = DailyCounterStore::new(SqliteStorage::open(&path).unwrap(), clock);
    store.reset();
    assert_eq!(store.read(), CounterRecord::fresh(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
}

/// 读取正常、写入可被关掉的 SQLite 存储
struct FlakyWrites {
    inner: SqliteStorage,
    failing: Rc<Cell<bool>>,
}

impl CounterStorage for FlakyWrites {
    fn load(&mut self) -> water_cup::Result<Option<CounterRecord>> {
        self.inner.load()
    }

    fn save(&mut self, record: &CounterRecord) -> water_cup::Result<()> {
        if self.failing.get() {
            return Err(water_cup::StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(record)
    }
}

#[test]
fn failed_writes_do_not_lose_taps_or_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water_cup.db");
    let (_, clock) = shared_clock(noon(2024, 6, 1));
    let failing = Rc::new(Cell::new(false));
    let storage = FlakyWrites {
        inner: SqliteStorage::open(&path).unwrap(),
        failing: failing.clone(),
    };
    let mut store = DailyCounterStore::new(storage, clock);
    for _ in 0..4 {
        store.increment();
    }

    failing.set(true);
    let taps: Vec<u32> = (0..3).map(|_| store.increment()).collect();
    assert_eq!(taps, vec![5, 6, 7]);
    store.reset();
    assert_eq!(store.read().count, 0);
    assert_eq!(store.increment(), 1);

    let db = SqliteStorage::open(&path).unwrap();
    assert_eq!(db.get(KEY_COUNT).unwrap().as_deref(), Some("4"));

    failing.set(false);
    assert_eq!(store.increment(), 2);
    assert_eq!(db.get(KEY_COUNT).unwrap().as_deref(), Some("2"));
}

#[test]
fn settings_file_round_trip_and_partial_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/settings.json");

    let mut settings = SettingsStore::load(path.clone());
    assert_eq!(settings.get().number_color, "#1a1a1a");
    settings.set_number_color("#3366ff");
    assert!(settings.apply_partial(&serde_json::json!({ "autoLaunch": true, "cupImage": 5 })));

    let reloaded = SettingsStore::load(path);
    assert_eq!(reloaded.get().number_color, "#3366ff");
    assert!(reloaded.get().auto_launch);
    assert_eq!(reloaded.get().cup_image, None);
}

#[test]
fn malformed_settings_file_falls_back_field_by_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "numberColor": 12, "autoLaunch": true, "cupImage": "/tmp/cup.svg" }"#).unwrap();

    let settings = SettingsStore::load(path);
    assert_eq!(settings.get().number_color, "#1a1a1a");
    assert!(settings.get().auto_launch);
    assert_eq!(settings.get().cup_image.as_deref(), Some("/tmp/cup.svg"));
}

#[test]
fn presets_are_listed_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.svg", "a.PNG", "notes.txt"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    let presets = water_cup::settings::list_presets(dir.path());
    let names: Vec<_> = presets
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.PNG", "b.svg"]);
    assert!(water_cup::settings::list_presets(&dir.path().join("missing")).is_empty());
}
