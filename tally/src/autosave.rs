use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Paces background saves: fires on a fixed interval, but only once edits have paused
#[derive(Debug)]
pub struct AutosaveTimer {
    period: Duration,
    quiet_period: Duration,
    interval: Option<Interval>,
    last_edit: Option<Instant>,
}

impl AutosaveTimer {
    pub fn new(period: Duration, quiet_period: Duration) -> Self {
        Self {
            period,
            quiet_period,
            interval: None,
            last_edit: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Note an edit; saving waits for the quiet period after it
    pub fn touch(&mut self) {
        self.last_edit = Some(Instant::now());
    }

    pub fn is_quiet(&self, now: Instant) -> bool {
        self.last_edit
            .is_none_or(|edit| now.saturating_duration_since(edit) >= self.quiet_period)
    }

    /// Wait until the next save is due
    pub async fn tick(&mut self) {
        loop {
            let period = self.period;
            // created lazily so the timer can be built outside a runtime
            let interval = self.interval.get_or_insert_with(|| {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            interval.tick().await;
            if self.is_quiet(Instant::now()) {
                return;
            }
        }
    }
}
