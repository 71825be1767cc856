//! Idle-timeout state machine for signed-in sessions.
//!
//! The timer holds a single deadline. Every tracked interaction pushes the
//! deadline to `now + window`; once `now` reaches the deadline the session is
//! expired and stays that way until it is disarmed. The timer is stored in
//! the server-side session, so it serializes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default idle window: four minutes.
pub const DEFAULT_IDLE_WINDOW_SECS: i64 = 240;

/// Current state of an [`IdleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IdleState {
    /// No one is signed in.
    Disarmed,
    /// Signed in; expires at `deadline` unless there is activity first.
    Active { deadline: DateTime<Utc> },
    /// The deadline passed. Terminal until disarmed.
    Expired,
}

/// Single-deadline inactivity timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTimer {
    window_secs: i64,
    state: IdleState,
}

impl IdleTimer {
    /// A disarmed timer with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window_secs: window.num_seconds(),
            state: IdleState::Disarmed,
        }
    }

    /// A timer armed at `now`, as on sign-in.
    #[must_use]
    pub fn armed(window: Duration, now: DateTime<Utc>) -> Self {
        let mut timer = Self::new(window);
        timer.arm(now);
        timer
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    #[must_use]
    pub const fn state(&self) -> IdleState {
        self.state
    }

    /// Arm (or re-arm) the timer with a fresh deadline.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.state = IdleState::Active {
            deadline: now + self.window(),
        };
    }

    /// Stop tracking, as on sign-out.
    pub fn disarm(&mut self) {
        self.state = IdleState::Disarmed;
    }

    /// Evaluate the deadline at `now` and return the resulting state.
    pub fn poll(&mut self, now: DateTime<Utc>) -> IdleState {
        if matches!(self.state, IdleState::Active { deadline } if now >= deadline) {
            self.state = IdleState::Expired;
        }
        self.state
    }

    /// Record an interaction at `now`.
    ///
    /// The deadline is checked first: activity after expiry does not revive
    /// the session. Returns the state after the interaction.
    pub fn record_activity(&mut self, now: DateTime<Utc>) -> IdleState {
        if let IdleState::Active { .. } = self.poll(now) {
            self.arm(now);
        }
        self.state
    }

    /// The pending deadline, if the timer is active.
    #[must_use]
    pub const fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            IdleState::Active { deadline } => Some(deadline),
            IdleState::Disarmed | IdleState::Expired => None,
        }
    }
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_IDLE_WINDOW_SECS))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn four_minutes() -> Duration {
        Duration::minutes(4)
    }

    #[test]
    fn test_armed_expires_after_window() {
        let mut timer = IdleTimer::armed(four_minutes(), t0());
        assert_eq!(timer.deadline(), Some(t0() + Duration::minutes(4)));

        let just_before = t0() + Duration::minutes(4) - Duration::seconds(1);
        assert!(matches!(timer.poll(just_before), IdleState::Active { .. }));

        assert_eq!(timer.poll(t0() + Duration::minutes(4)), IdleState::Expired);
    }

    #[test]
    fn test_activity_pushes_deadline() {
        let mut timer = IdleTimer::armed(four_minutes(), t0());
        timer.record_activity(t0() + Duration::minutes(3));
        assert_eq!(timer.deadline(), Some(t0() + Duration::minutes(7)));

        assert!(matches!(
            timer.poll(t0() + Duration::minutes(6)),
            IdleState::Active { .. }
        ));
        assert_eq!(timer.poll(t0() + Duration::minutes(7)), IdleState::Expired);
    }

    #[test]
    fn test_activity_after_expiry_does_not_revive() {
        let mut timer = IdleTimer::armed(four_minutes(), t0());
        let state = timer.record_activity(t0() + Duration::minutes(5));
        assert_eq!(state, IdleState::Expired);
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_disarmed_never_expires() {
        let mut timer = IdleTimer::new(four_minutes());
        assert_eq!(timer.poll(t0() + Duration::days(1)), IdleState::Disarmed);
        assert_eq!(
            timer.record_activity(t0() + Duration::days(2)),
            IdleState::Disarmed
        );
    }

    #[test]
    fn test_disarm_after_expiry() {
        let mut timer = IdleTimer::armed(four_minutes(), t0());
        timer.poll(t0() + Duration::minutes(10));
        timer.disarm();
        assert_eq!(timer.state(), IdleState::Disarmed);
    }

    #[test]
    fn test_serde_roundtrip_keeps_deadline() {
        let timer = IdleTimer::armed(four_minutes(), t0());
        let json = serde_json::to_string(&timer).unwrap();
        let back: IdleTimer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timer);
    }
}
