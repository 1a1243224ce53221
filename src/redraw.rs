use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::brush::Region;

/// When overlay changes are pushed to the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RedrawPolicy {
    /// Push after every mutation.
    Immediate,
    /// Push at most once per interval while a stroke is running; the
    /// pending frame is always pushed on stroke end or [`RedrawScheduler::flush`].
    Coalesce { interval_ms: u64 },
}

impl Default for RedrawPolicy {
    fn default() -> Self {
        RedrawPolicy::Coalesce { interval_ms: 33 }
    }
}

/// Coalesces dirty regions into redraw passes.
///
/// The region handed out by a pass covers every request made before it, so
/// the last mutation before a frame is always part of that frame.
#[derive(Clone, Debug)]
pub struct RedrawScheduler {
    policy: RedrawPolicy,
    pending: Option<Region>,
    last_pass: Option<Instant>,
}

impl RedrawScheduler {
    pub fn new(policy: RedrawPolicy) -> Self {
        Self {
            policy,
            pending: None,
            last_pass: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn request(&mut self, region: Region) {
        self.pending = Some(match self.pending {
            Some(pending) => pending.union(region),
            None => region,
        });
    }

    /// Take the pending region if the policy allows a pass at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Region> {
        self.pending?;
        let due = match (self.policy, self.last_pass) {
            (RedrawPolicy::Immediate, _) | (_, None) => true,
            (RedrawPolicy::Coalesce { interval_ms }, Some(last)) => {
                now.duration_since(last) >= Duration::from_millis(interval_ms)
            }
        };
        if due { self.flush(now) } else { None }
    }

    /// When the pending region may next be taken by [`poll`](Self::poll).
    ///
    /// `None` if nothing is waiting. Event loops use this to schedule an idle
    /// wakeup so a paused stroke is still shown within one interval.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending?;
        let last = self.last_pass?;
        Some(match self.policy {
            RedrawPolicy::Immediate => last,
            RedrawPolicy::Coalesce { interval_ms } => last + Duration::from_millis(interval_ms),
        })
    }

    /// Take the pending region unconditionally.
    pub fn flush(&mut self, now: Instant) -> Option<Region> {
        let region = self.pending.take()?;
        self.last_pass = Some(now);
        Some(region)
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
