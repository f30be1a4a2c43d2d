//! 每日喝水计数：持久化的 (日期, 次数)，跨天自动清零
//!
//! 清零有两条路径：
//! - 惰性：每次读取时发现存储的日期不是今天，改写为 `{今天, 0}`
//! - 定时：`schedule_rollover` 在本地午夜后 `ROLLOVER_MARGIN_MS` 触发一次 `reset()`，随后自动续订下一天
//!
//! 两条路径都收敛到同一个 `{今天, 0}`，存储读写失败只记日志、不会中断挂件。

use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// 午夜后的安全余量（毫秒），避开恰好跨零点的瞬间
pub const ROLLOVER_MARGIN_MS: u32 = 50;

/// 某一天的计数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub date: NaiveDate,
    pub count: u32,
}

impl CounterRecord {
    /// 当天的零记录
    pub fn fresh(date: NaiveDate) -> Self {
        Self { date, count: 0 }
    }
}

/// 本地时钟（测试中可替换为任意 `Fn() -> NaiveDateTime`）
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    /// 本地日历日
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// 系统本地时间
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDateTime,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// 计数记录的持久化介质。`load` 返回 `None` 表示从未写入过（首次运行）
pub trait CounterStorage {
    fn load(&mut self) -> Result<Option<CounterRecord>>;
    fn save(&mut self, record: &CounterRecord) -> Result<()>;
}

impl<S: CounterStorage + ?Sized> CounterStorage for Box<S> {
    fn load(&mut self) -> Result<Option<CounterRecord>> {
        (**self).load()
    }

    fn save(&mut self, record: &CounterRecord) -> Result<()> {
        (**self).save(record)
    }
}

/// `now` 之后的下一个清零时刻：次日 00:00:00 + 余量
pub fn next_rollover_after(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date().succ_opt().unwrap_or(NaiveDate::MAX);
    tomorrow
        .and_hms_milli_opt(0, 0, 0, ROLLOVER_MARGIN_MS)
        .unwrap_or(NaiveDateTime::MAX)
}

/// 已挂起的午夜定时器
struct Rollover {
    deadline: NaiveDateTime,
    on_reset: Box<dyn FnMut(u32)>,
}

pub struct DailyCounterStore<S, C = SystemClock> {
    storage: S,
    clock: C,
    /// 最近一次读写的记录；读失败或有未落盘的修改时以它为准
    cached: CounterRecord,
    /// 上次写入失败，`cached` 比存储中的记录新
    dirty: bool,
    rollover: Option<Rollover>,
}

impl<S: CounterStorage, C: Clock> DailyCounterStore<S, C> {
    pub fn new(storage: S, clock: C) -> Self {
        let cached = CounterRecord::fresh(clock.today());
        Self {
            storage,
            clock,
            cached,
            dirty: false,
            rollover: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// 是否有写入失败、尚未落盘的修改
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// 读取今天的记录；存储中的记录缺失、过期或损坏时改写为 `{今天, 0}`
    ///
    /// 有未落盘的修改时不读存储，以内存记录为准并重试写入。
    pub fn read(&mut self) -> CounterRecord {
        let today = self.clock.today();
        if self.dirty {
            let record = if self.cached.date == today {
                self.cached
            } else {
                log::info!("counter rolled over lazily ({} -> {today})", self.cached.date);
                CounterRecord::fresh(today)
            };
            return self.commit(record);
        }

        let stored = match self.storage.load() {
            Ok(record) => record,
            Err(err @ StoreError::CorruptRecord { .. }) => {
                log::warn!("counter record unreadable, starting over: {err}");
                None
            }
            Err(err) => {
                log::warn!("counter storage read failed, using in-memory record: {err}");
                Some(self.cached)
            }
        };

        match stored {
            Some(record) if record.date == today => {
                self.cached = record;
                record
            }
            Some(record) => {
                log::info!("counter rolled over lazily ({} -> {today})", record.date);
                self.commit(CounterRecord::fresh(today))
            }
            None => self.commit(CounterRecord::fresh(today)),
        }
    }

    /// 今天的计数 +1 并返回新值
    pub fn increment(&mut self) -> u32 {
        let mut record = self.read();
        record.count = record.count.saturating_add(1);
        self.commit(record).count
    }

    /// 无条件清零为 `{今天, 0}`
    pub fn reset(&mut self) {
        let record = self.commit(CounterRecord::fresh(self.clock.today()));
        log::info!("counter reset for {}", record.date);
    }

    /// 挂起午夜定时器。到点时依次执行 `reset()`、`on_reset(0)`，然后续订下一天
    pub fn schedule_rollover(&mut self, on_reset: impl FnMut(u32) + 'static) {
        let deadline = next_rollover_after(self.clock.now());
        log::info!("next counter rollover at {deadline}");
        self.rollover = Some(Rollover {
            deadline,
            on_reset: Box::new(on_reset),
        });
    }

    /// 取消午夜定时器
    pub fn cancel_rollover(&mut self) {
        if self.rollover.take().is_some() {
            log::debug!("counter rollover cancelled");
        }
    }

    pub fn next_rollover(&self) -> Option<NaiveDateTime> {
        self.rollover.as_ref().map(|r| r.deadline)
    }

    /// 由事件循环驱动：到点则触发清零并续订。返回距下一次触发的时间，未挂起时返回 `None`
    pub fn tick(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        let next = next_rollover_after(now);
        let deadline = self.rollover.as_ref()?.deadline;

        if now >= deadline {
            self.reset();
            if let Some(rollover) = self.rollover.as_mut() {
                (rollover.on_reset)(0);
                rollover.deadline = next;
            }
            log::info!("next counter rollover at {next}");
        } else if deadline > next {
            // 系统时钟被往回调过，按当前时间重新计算
            if let Some(rollover) = self.rollover.as_mut() {
                rollover.deadline = next;
            }
        }

        let deadline = self.rollover.as_ref()?.deadline;
        Some((deadline - now).to_std().unwrap_or_default())
    }

    fn commit(&mut self, record: CounterRecord) -> CounterRecord {
        self.cached = record;
        match self.storage.save(&record) {
            Ok(()) => {
                if self.dirty {
                    log::info!("counter storage writable again, record saved");
                }
                self.dirty = false;
            }
            Err(err) => {
                if !self.dirty {
                    log::warn!("counter storage write failed, keeping in-memory record: {err}");
                }
                self.dirty = true;
            }
        }
        record
    }
}
