// File: ./src/scheduler.rs
//! Weekly check scheduler.
//!
//! `Idle -> ArmedOneShot -> ArmedRecurring`, back to `Idle` on `disarm`.
//! Arming computes the next occurrence of the configured weekday/time,
//! sleeps until then, emits a tick, then emits one tick per week.
//!
//! Ticks travel over an mpsc channel to whoever runs the check. Every arming
//! gets a new generation and disarming bumps it too, so a tick that was
//! already queued when the schedule changed is rejected by `accepts`.
//!
//! This only fires while the process is alive. Missed weeks are skipped,
//! never backfilled.
use chrono::{DateTime, Datelike, Days, Local, NaiveTime, TimeZone, Weekday};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Next occurrence of `weekday` at `at`, strictly after `now`.
///
/// When `now` already falls on `weekday` the result is one week later,
/// whatever the time of day: a check is never scheduled for "later today".
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, weekday: Weekday, at: NaiveTime) -> DateTime<Tz> {
    let today = now.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let days_ahead = match (target - today).rem_euclid(7) {
        0 => 7,
        n => n,
    };

    let date = now.date_naive() + Days::new(days_ahead as u64);
    let naive = date.and_time(at);
    let tz = now.timezone();
    // A DST gap can swallow the wall-clock time; take the first valid instant after it.
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    ArmedOneShot { next: DateTime<Local> },
    ArmedRecurring { next: DateTime<Local> },
}

impl SchedulerState {
    pub fn next_due(&self) -> Option<DateTime<Local>> {
        match self {
            SchedulerState::Idle => None,
            SchedulerState::ArmedOneShot { next } | SchedulerState::ArmedRecurring { next } => {
                Some(*next)
            }
        }
    }
}

/// Emitted when a scheduled check is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub generation: u64,
    pub fired_at: DateTime<Local>,
}

#[derive(Debug)]
struct Shared {
    generation: u64,
    state: SchedulerState,
}

pub struct WeeklyScheduler {
    weekday: Weekday,
    at: NaiveTime,
    tx: mpsc::Sender<ScheduledTick>,
    shared: Arc<Mutex<Shared>>,
    handle: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WeeklyScheduler {
    /// Creates an idle scheduler and the receiving end of its tick channel.
    pub fn new(weekday: Weekday, at: NaiveTime) -> (Self, mpsc::Receiver<ScheduledTick>) {
        let (tx, rx) = mpsc::channel(10);
        let scheduler = Self {
            weekday,
            at,
            tx,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                state: SchedulerState::Idle,
            })),
            handle: None,
        };
        (scheduler, rx)
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.shared).state
    }

    pub fn is_armed(&self) -> bool {
        self.state() != SchedulerState::Idle
    }

    pub fn next_due(&self) -> Option<DateTime<Local>> {
        self.state().next_due()
    }

    /// Whether `tick` belongs to the current arming.
    pub fn accepts(&self, tick: &ScheduledTick) -> bool {
        let shared = lock(&self.shared);
        shared.state != SchedulerState::Idle && shared.generation == tick.generation
    }

    pub fn arm(&mut self) -> DateTime<Local> {
        self.arm_from(Local::now())
    }

    /// Disarms, then arms relative to `now`. Returns the first trigger instant.
    pub fn arm_from(&mut self, now: DateTime<Local>) -> DateTime<Local> {
        self.disarm();

        let first = next_trigger(&now, self.weekday, self.at);
        let delay = (first - now).to_std().unwrap_or_default();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = SchedulerState::ArmedOneShot { next: first };
            shared.generation
        };
        log::debug!("Weekly check armed for {} (generation {})", first, generation);

        let tx = self.tx.clone();
        let shared = self.shared.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut interval = tokio::time::interval_at(Instant::now() + WEEK, WEEK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut fired_at = first;

            loop {
                {
                    let mut shared = lock(&shared);
                    if shared.generation != generation {
                        return;
                    }
                    shared.state = SchedulerState::ArmedRecurring {
                        next: fired_at + chrono::Duration::weeks(1),
                    };
                }
                log::debug!("Weekly check due (generation {})", generation);
                if tx
                    .send(ScheduledTick {
                        generation,
                        fired_at,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                interval.tick().await;
                fired_at += chrono::Duration::weeks(1);
            }
        }));

        first
    }

    /// Cancels both the pending one-shot and the weekly interval.
    /// Disarming an idle scheduler is a no-op.
    pub fn disarm(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.state != SchedulerState::Idle {
                log::debug!("Weekly check disarmed (generation {})", shared.generation);
            }
            shared.generation += 1;
            shared.state = SchedulerState::Idle;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for WeeklyScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn fixed(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_next_trigger_later_this_week() {
        // 2025-03-05 is a Wednesday.
        let now = fixed(2025, 3, 5, 12, 0);
        let next = next_trigger(&now, Weekday::Fri, at(9, 0));
        assert_eq!(next, fixed(2025, 3, 7, 9, 0));
    }

    #[test]
    fn test_same_weekday_rolls_to_next_week_even_before_time() {
        // Friday 08:00, check time Friday 09:00: not "later today".
        let now = fixed(2025, 3, 7, 8, 0);
        let next = next_trigger(&now, Weekday::Fri, at(9, 0));
        assert_eq!(next, fixed(2025, 3, 14, 9, 0));

        let now = fixed(2025, 3, 7, 23, 59);
        assert_eq!(next_trigger(&now, Weekday::Fri, at(9, 0)), fixed(2025, 3, 14, 9, 0));
    }

    #[test]
    fn test_next_trigger_wraps_week() {
        // Saturday -> next Friday.
        let now = fixed(2025, 3, 8, 10, 0);
        let next = next_trigger(&now, Weekday::Fri, at(18, 30));
        assert_eq!(next, fixed(2025, 3, 14, 18, 30));
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn test_next_trigger_is_always_in_future_and_within_a_week() {
        let start = fixed(2025, 1, 1, 0, 0);
        for hours in (0..24 * 14).step_by(5) {
            let now = start + chrono::Duration::hours(hours);
            for weekday in [Weekday::Mon, Weekday::Thu, Weekday::Sun] {
                let next = next_trigger(&now, weekday, at(9, 0));
                assert!(next > now);
                assert!(next - now <= chrono::Duration::days(8));
                assert_eq!(next.weekday(), weekday);
                assert_ne!(next.date_naive(), now.date_naive());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_is_idempotent() {
        let (mut scheduler, _rx) = WeeklyScheduler::new(Weekday::Fri, at(9, 0));
        scheduler.disarm();
        scheduler.disarm();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.arm();
        assert!(scheduler.is_armed());
        scheduler.disarm();
        scheduler.disarm();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_rejects_ticks_from_old_generation() {
        let (mut scheduler, _rx) = WeeklyScheduler::new(Weekday::Fri, at(9, 0));
        scheduler.arm();
        let stale = ScheduledTick {
            generation: lock(&scheduler.shared).generation,
            fired_at: Local::now(),
        };
        assert!(scheduler.accepts(&stale));

        scheduler.arm();
        assert!(!scheduler.accepts(&stale));

        scheduler.disarm();
        let current = ScheduledTick {
            generation: lock(&scheduler.shared).generation,
            fired_at: Local::now(),
        };
        assert!(!scheduler.accepts(&current), "idle scheduler accepts nothing");
    }
}
