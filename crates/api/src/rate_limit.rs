//! In-process sliding-window submission quotas.
//!
//! Each user gets two rolling windows: one per minute and one per day.
//! A denied request consumes no slot, so retrying against a full window
//! does not extend the lockout. Counters are per-process and
//! best-effort; a multi-instance deployment multiplies the effective
//! quota by the instance count.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use oratia_core::types::DbId;
use tokio::sync::Mutex;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed.
    Allowed,
    /// A quota is exhausted; the oldest relevant slot frees up after the
    /// hinted number of seconds.
    Denied { retry_after_secs: u64 },
}

/// Timestamps of one user's recent admissions.
#[derive(Debug, Default)]
struct UserWindows {
    minute: VecDeque<Instant>,
    day: VecDeque<Instant>,
}

/// Per-user sliding-window rate limiter for evaluation submissions.
pub struct RateLimiter {
    per_minute: u32,
    per_day: u32,
    windows: Mutex<HashMap<DbId, UserWindows>>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_day,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one admission for `user_id`.
    pub async fn admit(&self, user_id: DbId) -> Admission {
        self.admit_at(user_id, Instant::now()).await
    }

    /// Clock-injectable form of [`admit`](Self::admit).
    async fn admit_at(&self, user_id: DbId, now: Instant) -> Admission {
        let mut windows = self.windows.lock().await;
        let user = windows.entry(user_id).or_default();

        prune(&mut user.minute, now, MINUTE);
        prune(&mut user.day, now, DAY);

        if user.minute.len() >= self.per_minute as usize {
            return Admission::Denied {
                retry_after_secs: retry_hint(&user.minute, now, MINUTE),
            };
        }
        if user.day.len() >= self.per_day as usize {
            return Admission::Denied {
                retry_after_secs: retry_hint(&user.day, now, DAY),
            };
        }

        user.minute.push_back(now);
        user.day.push_back(now);
        Admission::Allowed
    }
}

/// Drop timestamps that have aged out of the window.
fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(front) = window.front() {
        if now.duration_since(*front) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}

/// Seconds until the oldest in-window timestamp ages out, at least 1.
fn retry_hint(window: &VecDeque<Instant>, now: Instant, span: Duration) -> u64 {
    window
        .front()
        .map(|oldest| span.saturating_sub(now.duration_since(*oldest)).as_secs())
        .unwrap_or(0)
        .max(1)
}
