//! Water Cup — 桌面喝水杯贴纸（Rust + egui）
//!
//! 点一下杯子记一杯，按住拖动移动窗口，每天零点自动清零。

pub mod app;
pub mod autolaunch;
pub mod counter;
pub mod db;
pub mod error;
pub mod gesture;
pub mod settings;

pub use counter::{Clock, CounterRecord, CounterStorage, DailyCounterStore, SystemClock};
pub use error::{Result, StoreError};
pub use gesture::{GestureClassifier, GestureEvent, Point, PointerButton, DRAG_THRESHOLD};
