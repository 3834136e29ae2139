use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::bootstrap::Application;

/// Starts the periodic reminder sweep when the scanner is enabled. The
/// loop shares the scanner instance the manual scan endpoint uses, so a
/// manual pass between ticks never double-drafts a reminder.
pub fn spawn(app: &Application) {
    if !app.config.scanner.enabled {
        info!(event_name = "reminder_scanner_disabled", "reminder scanner not started");
        return;
    }

    let scanner = app.state.scanner.clone();
    let initial_delay = Duration::from_secs(app.config.scanner.initial_delay_secs);
    let interval = Duration::from_secs(app.config.scanner.interval_secs);

    info!(
        event_name = "reminder_scanner_started",
        initial_delay_secs = initial_delay.as_secs(),
        interval_secs = interval.as_secs(),
        "reminder scanner running"
    );

    tokio::spawn(async move {
        tokio::time::sleep(initial_delay).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match scanner.scan_once().await {
                Ok(created) if created > 0 => {
                    info!(event_name = "reminder_scan_complete", created, "reminder drafts created");
                }
                Ok(_) => {}
                Err(scan_error) => {
                    error!(
                        event_name = "reminder_scan_failed",
                        error = %scan_error,
                        "reminder sweep failed, retrying next tick"
                    );
                }
            }
        }
    });
}
