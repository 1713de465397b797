use crate::client::{Clock, RefreshOutcome, SessionClient};
use crate::logger::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long before expiry a renewal is attempted.
pub const LEAD_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled { wake_at_ms: i64 },
    Refreshing,
    LoggedOut,
}

/// What the scheduler wants to happen next. Wake times are data so tests can
/// check the arithmetic without arming real timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    RefreshNow,
    WakeAt { at_ms: i64 },
    Stop,
}

/// Self-rescheduling renewal process: one-shot wakeups computed from the
/// stored expiry, re-planned after every attempt regardless of outcome.
/// Re-arming supersedes the previous wakeup; the in-flight guard lives in
/// `SessionClient`, so a wakeup racing a visibility event costs at most one
/// network call.
pub struct SessionScheduler {
    client: Arc<SessionClient>,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    lead: Duration,
}

impl SessionScheduler {
    pub fn new(client: Arc<SessionClient>, clock: Arc<dyn Clock>) -> Self {
        SessionScheduler {
            client,
            clock,
            state: Mutex::new(SchedulerState::Idle),
            lead: LEAD_TIME,
        }
    }

    pub fn with_lead_time(mut self, lead: Duration) -> Self {
        self.lead = lead;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SchedulerState::Idle)
    }

    fn set_state(&self, state: SchedulerState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Computes the next action from the stored expiry: refresh immediately
    /// when already expired, otherwise wake `LEAD_TIME` before expiry (never
    /// in the past). No expiry or no refresh token means nothing to do.
    pub fn plan(&self) -> Directive {
        let expiry = self.client.store().expiry_ms();
        if expiry == 0 || self.client.store().refresh_token().is_none() {
            return Directive::Stop;
        }

        let now = self.clock.now_ms();
        if expiry <= now {
            return Directive::RefreshNow;
        }
        let lead_ms = self.lead.as_millis() as i64;
        Directive::WakeAt {
            at_ms: now.max(expiry - lead_ms),
        }
    }

    /// Plans and records the resulting state. Any previously armed wakeup is
    /// superseded by whatever this returns.
    pub fn arm(&self) -> Directive {
        let directive = self.plan();
        self.set_state(match directive {
            Directive::RefreshNow => SchedulerState::Idle,
            Directive::WakeAt { at_ms } => SchedulerState::Scheduled { wake_at_ms: at_ms },
            Directive::Stop => match self.state() {
                SchedulerState::LoggedOut => SchedulerState::LoggedOut,
                _ => SchedulerState::Idle,
            },
        });
        directive
    }

    /// Runs one renewal attempt and re-plans from the (possibly updated)
    /// expiry, success or not.
    pub async fn on_wake(&self) -> Directive {
        self.set_state(SchedulerState::Refreshing);
        let outcome = self.client.refresh_session().await;
        debug!("scheduled refresh finished: {outcome:?}");
        if matches!(
            outcome,
            RefreshOutcome::LoggedOut | RefreshOutcome::NoRefreshToken
        ) {
            self.set_state(SchedulerState::LoggedOut);
            return Directive::Stop;
        }
        self.arm()
    }

    /// The page regained foreground visibility: refresh immediately when the
    /// remaining lifetime is under the lead, then re-arm.
    pub async fn on_visibility_regained(&self) -> Directive {
        if !self.client.is_authenticated() {
            return self.arm();
        }
        let remaining = self.client.store().expiry_ms() - self.clock.now_ms();
        if remaining < self.lead.as_millis() as i64 {
            debug!("visibility regained with {remaining}ms left, refreshing");
            return self.on_wake().await;
        }
        self.arm()
    }

    /// Timer driver. Sleeps until each planned wakeup, refreshes, re-plans;
    /// exits on cancellation or when there is no session left to renew.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            match self.arm() {
                Directive::Stop => break,
                Directive::RefreshNow => {
                    if self.on_wake().await == Directive::Stop {
                        break;
                    }
                }
                Directive::WakeAt { at_ms } => {
                    let delay = (at_ms - self.clock.now_ms()).max(0) as u64;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {
                            if self.on_wake().await == Directive::Stop {
                                break;
                            }
                        }
                    }
                }
            }
        }
        debug!("scheduler stopped in state {:?}", self.state());
    }
}
