use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::gateway::NotificationGateway;
use crate::types::{Reminder, ReminderOptions};

/// Title used when a reminder was created without one
pub const DEFAULT_REMINDER_TITLE: &str = "Reminder";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Longest timer actually armed; larger delays wait this long instead.
const MAX_TIMER: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `scheduled_for` stays within what RFC 3339 can represent.
const EARLIEST_SCHEDULED: OffsetDateTime = datetime!(0000-01-01 0:00 UTC);
const LATEST_SCHEDULED: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Observer invoked with the full set of pending reminders after every change
pub type ReminderCallback = Arc<dyn Fn(&[Reminder]) + Send + Sync>;

struct PendingReminder {
    reminder: Reminder,
    deadline: Instant,
    timer: AbortHandle,
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    callbacks: Vec<(u64, ReminderCallback)>,
}

struct Inner {
    gateway: Arc<NotificationGateway>,
    pending: Mutex<HashMap<String, PendingReminder>>,
    observers: Mutex<Observers>,
}

/// Owns the pending, timer-backed reminders.
///
/// Each reminder is a Tokio task sleeping until its deadline. On expiry the
/// task claims (removes) its entry and asks the gateway to push the message;
/// the outcome is only logged. Cloning shares the same set; when the last
/// clone is dropped every pending timer is aborted.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

/// Handle returned by [`ReminderScheduler::subscribe`]
pub struct ReminderSubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl ReminderSubscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.observers.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl ReminderScheduler {
    pub fn new(gateway: Arc<NotificationGateway>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                pending: Mutex::new(HashMap::new()),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    /// Arm a reminder. Non-positive delays fire as soon as possible.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_reminder(&self, options: ReminderOptions) -> Reminder {
        let created_at = OffsetDateTime::now_utc();
        let scheduled_for = scheduled_time(created_at, options.delay_seconds);
        let deadline = timer_deadline(Instant::now(), options.delay_seconds);

        let reminder = {
            let mut pending = self.inner.pending.lock();

            let mut id = generate_id(created_at);
            while pending.contains_key(&id) {
                id = generate_id(created_at);
            }

            let reminder = Reminder {
                id: id.clone(),
                message: options.message,
                title: options.title,
                delay_seconds: options.delay_seconds,
                created_at,
                scheduled_for,
            };

            // The entry is inserted before the lock is released, so the timer
            // can never run ahead of it.
            let weak = Arc::downgrade(&self.inner);
            let timer_id = id.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(inner) = weak.upgrade() {
                    inner.fire(&timer_id).await;
                }
            })
            .abort_handle();

            pending.insert(
                id,
                PendingReminder {
                    reminder: reminder.clone(),
                    deadline,
                    timer,
                },
            );
            reminder
        };

        info!(
            reminder_id = %reminder.id,
            delay_seconds = reminder.delay_seconds,
            "Reminder scheduled"
        );
        self.inner.notify();
        reminder
    }

    pub fn set_quick_reminder(&self, message: impl Into<String>, seconds: i64) -> Reminder {
        self.set_reminder(ReminderOptions::new(message, seconds).with_title("Quick Reminder"))
    }

    pub fn set_timed_reminder(&self, message: impl Into<String>, minutes: i64) -> Reminder {
        self.set_reminder(
            ReminderOptions::new(message, minutes.saturating_mul(60)).with_title("Timed Reminder"),
        )
    }

    pub fn set_hourly_reminder(&self, message: impl Into<String>, hours: i64) -> Reminder {
        self.set_reminder(
            ReminderOptions::new(message, hours.saturating_mul(60 * 60)).with_title("Hourly Reminder"),
        )
    }

    /// Returns whether a pending reminder was found.
    pub fn cancel_reminder(&self, id: &str) -> bool {
        let Some(entry) = self.inner.pending.lock().remove(id) else {
            return false;
        };
        entry.timer.abort();
        debug!(reminder_id = %id, "Reminder cancelled");
        self.inner.notify();
        true
    }

    /// Returns how many reminders were pending.
    pub fn cancel_all_reminders(&self) -> usize {
        let drained: Vec<PendingReminder> = {
            let mut pending = self.inner.pending.lock();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.timer.abort();
        }
        info!(count = drained.len(), "All reminders cancelled");
        self.inner.notify();
        drained.len()
    }

    /// Unordered snapshot
    pub fn active_reminders(&self) -> Vec<Reminder> {
        self.inner.snapshot()
    }

    pub fn reminder(&self, id: &str) -> Option<Reminder> {
        self.inner
            .pending
            .lock()
            .get(id)
            .map(|entry| entry.reminder.clone())
    }

    pub fn has_reminder(&self, id: &str) -> bool {
        self.inner.pending.lock().contains_key(id)
    }

    pub fn reminders_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Whole seconds until the reminder fires, floored and clamped at zero.
    pub fn time_remaining(&self, id: &str) -> Option<u64> {
        let pending = self.inner.pending.lock();
        let entry = pending.get(id)?;
        Some(
            entry
                .deadline
                .saturating_duration_since(Instant::now())
                .as_secs(),
        )
    }

    pub fn subscribe<F>(&self, callback: F) -> ReminderSubscription
    where
        F: Fn(&[Reminder]) + Send + Sync + 'static,
    {
        let mut observers = self.inner.observers.lock();
        observers.next_id += 1;
        let id = observers.next_id;
        observers.callbacks.push((id, Arc::new(callback)));
        ReminderSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Clear every timer. Called at process teardown.
    pub fn shutdown(&self) {
        let cancelled = self.cancel_all_reminders();
        info!(cancelled, "Reminder scheduler stopped");
    }
}

impl Inner {
    async fn fire(&self, id: &str) {
        let Some(entry) = self.pending.lock().remove(id) else {
            // cancelled while the timer was waking up
            return;
        };
        self.notify();

        let reminder = entry.reminder;
        let title = reminder.title.as_deref().unwrap_or(DEFAULT_REMINDER_TITLE);
        match self
            .gateway
            .send_push_notification(&reminder.message, Some(title))
            .await
        {
            Ok(report) => info!(
                reminder_id = %reminder.id,
                delivered = report.delivered,
                "Reminder notification sent"
            ),
            Err(e) => error!(
                reminder_id = %reminder.id,
                error = %e,
                "Failed to send reminder notification"
            ),
        }
    }

    fn snapshot(&self) -> Vec<Reminder> {
        self.pending
            .lock()
            .values()
            .map(|entry| entry.reminder.clone())
            .collect()
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let callbacks: Vec<ReminderCallback> = self
            .observers
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for entry in self.pending.get_mut().values() {
            entry.timer.abort();
        }
    }
}

/// `created_at + delay`, saturated to the representable range.
fn scheduled_time(created_at: OffsetDateTime, delay_seconds: i64) -> OffsetDateTime {
    let bound = if delay_seconds > 0 {
        LATEST_SCHEDULED
    } else {
        EARLIEST_SCHEDULED
    };
    created_at
        .checked_add(time::Duration::seconds(delay_seconds))
        .unwrap_or(bound)
        .clamp(EARLIEST_SCHEDULED, LATEST_SCHEDULED)
}

/// Non-positive delays fire now; huge ones are capped at `MAX_TIMER`.
fn timer_deadline(now: Instant, delay_seconds: i64) -> Instant {
    now + Duration::from_secs(delay_seconds.max(0) as u64).min(MAX_TIMER)
}

fn generate_id(now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("reminder_{millis}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::gateway::testing::RecordingActions;

    fn scheduler() -> (ReminderScheduler, Arc<RecordingActions>) {
        let actions = Arc::new(RecordingActions::default());
        let gateway = Arc::new(NotificationGateway::push_only(actions.clone()));
        (ReminderScheduler::new(gateway), actions)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_fires_once_and_is_removed() {
        let (scheduler, actions) = scheduler();
        let reminder = scheduler.set_reminder(ReminderOptions::new("ping", 1));
        assert!(scheduler.has_reminder(&reminder.id));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        settle().await;

        assert_eq!(actions.sent(), vec!["Reminder: ping"]);
        assert!(scheduler.active_reminders().is_empty());
        assert_eq!(scheduler.time_remaining(&reminder.id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_remaining_counts_down() {
        let (scheduler, _) = scheduler();
        let reminder = scheduler.set_reminder(ReminderOptions::new("stretch", 10));
        assert_eq!(scheduler.time_remaining(&reminder.id), Some(10));

        tokio::time::advance(Duration::from_millis(3_500)).await;
        assert_eq!(scheduler.time_remaining(&reminder.id), Some(6));

        tokio::time::advance(Duration::from_millis(6_400)).await;
        assert_eq!(scheduler.time_remaining(&reminder.id), Some(0));

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(scheduler.time_remaining(&reminder.id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_for_is_created_at_plus_delay() {
        let (scheduler, _) = scheduler();
        let reminder = scheduler.set_reminder(ReminderOptions::new("water", 90));
        assert_eq!(
            reminder.scheduled_for - reminder.created_at,
            time::Duration::seconds(90)
        );
        assert!(reminder.id.starts_with("reminder_"));
        assert_eq!(reminder.id.rsplit('_').next().map(str::len), Some(ID_SUFFIX_LEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (scheduler, actions) = scheduler();
        let reminder = scheduler.set_reminder(ReminderOptions::new("never", 5));

        assert!(scheduler.cancel_reminder(&reminder.id));
        assert!(!scheduler.cancel_reminder(&reminder.id));

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert!(actions.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_returns_pending_count() {
        let (scheduler, actions) = scheduler();
        scheduler.set_reminder(ReminderOptions::new("a", 5));
        scheduler.set_reminder(ReminderOptions::new("b", 6));
        scheduler.set_reminder(ReminderOptions::new("c", 7));

        assert_eq!(scheduler.cancel_all_reminders(), 3);
        assert!(scheduler.active_reminders().is_empty());
        assert_eq!(scheduler.cancel_all_reminders(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert!(actions.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_see_every_mutation() {
        let (scheduler, _) = scheduler();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let other = Arc::new(Mutex::new(0usize));

        let sink = sizes.clone();
        let subscription = scheduler.subscribe(move |reminders| sink.lock().push(reminders.len()));
        let counter = other.clone();
        let _second = scheduler.subscribe(move |_| *counter.lock() += 1);

        let a = scheduler.set_reminder(ReminderOptions::new("a", 30));
        scheduler.set_reminder(ReminderOptions::new("b", 1));
        scheduler.cancel_reminder(&a.id);
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        scheduler.cancel_all_reminders();

        assert_eq!(*sizes.lock(), vec![1, 2, 1, 0, 0]);
        assert_eq!(*other.lock(), 5);

        subscription.unsubscribe();
        scheduler.set_reminder(ReminderOptions::new("c", 30));
        assert_eq!(sizes.lock().len(), 5);
        assert_eq!(*other.lock(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_may_query_scheduler() {
        let (scheduler, _) = scheduler();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observed = scheduler.clone();
        let sink = seen.clone();
        scheduler.subscribe(move |_| sink.lock().push(observed.reminders_count()));

        scheduler.set_reminder(ReminderOptions::new("a", 30));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_still_removes_entry() {
        let (scheduler, actions) = scheduler();
        *actions.fail_with.lock() = Some(NotificationError::NoSubscriptions);

        scheduler.set_reminder(ReminderOptions::new("lonely", 1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(actions.sent().len(), 1);
        assert_eq!(scheduler.reminders_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_delay_fires_immediately() {
        let (scheduler, actions) = scheduler();
        let reminder = scheduler.set_reminder(ReminderOptions::new("now", -5));
        assert_eq!(scheduler.time_remaining(&reminder.id), Some(0));

        settle().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(actions.sent(), vec!["Reminder: now"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_helpers_set_titles_and_delays() {
        let (scheduler, actions) = scheduler();
        let quick = scheduler.set_quick_reminder("tea", 15);
        let timed = scheduler.set_timed_reminder("call", 2);
        let hourly = scheduler.set_hourly_reminder("stand", 1);

        assert_eq!(quick.title.as_deref(), Some("Quick Reminder"));
        assert_eq!(quick.delay_seconds, 15);
        assert_eq!(timed.title.as_deref(), Some("Timed Reminder"));
        assert_eq!(timed.delay_seconds, 120);
        assert_eq!(hourly.title.as_deref(), Some("Hourly Reminder"));
        assert_eq!(hourly.delay_seconds, 3_600);
        assert_eq!(scheduler.reminders_count(), 3);

        tokio::time::sleep(Duration::from_secs(16)).await;
        settle().await;
        assert_eq!(actions.sent(), vec!["Quick Reminder: tea"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extreme_delays_are_saturated() {
        let (scheduler, actions) = scheduler();
        let far = scheduler.set_reminder(ReminderOptions::new("someday", i64::MAX));
        let past = scheduler.set_reminder(ReminderOptions::new("long ago", i64::MIN));
        let hourly = scheduler.set_hourly_reminder("never", i64::MAX);
        let timed = scheduler.set_timed_reminder("nope", i64::MIN);

        assert_eq!(far.delay_seconds, i64::MAX);
        assert_eq!(far.scheduled_for, LATEST_SCHEDULED);
        assert_eq!(past.scheduled_for, EARLIEST_SCHEDULED);
        assert_eq!(hourly.delay_seconds, i64::MAX);
        assert_eq!(timed.delay_seconds, i64::MIN);
        assert!(serde_json::to_value(&far).is_ok());
        assert!(serde_json::to_value(&past).is_ok());

        assert_eq!(scheduler.time_remaining(&far.id), Some(MAX_TIMER.as_secs()));
        assert_eq!(scheduler.time_remaining(&past.id), Some(0));
        assert_eq!(scheduler.reminders_count(), 4);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;

        let mut sent = actions.sent();
        sent.sort();
        assert_eq!(sent, vec!["Reminder: long ago", "Timed Reminder: nope"]);
        assert!(scheduler.has_reminder(&far.id));
        assert!(scheduler.has_reminder(&hourly.id));
        assert_eq!(scheduler.reminders_count(), 2);
        assert_eq!(scheduler.cancel_all_reminders(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_timers() {
        let (scheduler, actions) = scheduler();
        scheduler.set_reminder(ReminderOptions::new("a", 1));
        scheduler.shutdown();

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert!(actions.sent().is_empty());
        assert_eq!(scheduler.reminders_count(), 0);
    }
}
