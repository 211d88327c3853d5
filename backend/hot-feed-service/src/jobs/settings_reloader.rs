//! Settings Reloader Background Job
//!
//! Re-reads the keyword policy every `reload_interval` and publishes a new
//! snapshot when it changed. A failed reload keeps the snapshot in effect.

use crate::config::{SettingsPublisher, SettingsSource};
use crate::error::ConfigError;
use crate::metrics::jobs as metrics;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub async fn start_settings_reloader(
    mut publisher: SettingsPublisher,
    source: SettingsSource,
    reload_interval: Duration,
) {
    tracing::info!(
        source = ?source,
        interval_secs = reload_interval.as_secs(),
        "Starting settings reloader background job"
    );
    metrics::set_settings_version(publisher.version());

    loop {
        // The initial policy was loaded at startup.
        sleep(reload_interval).await;

        let cycle_start = Instant::now();
        let previous = publisher.version();
        match reload_once(&mut publisher, &source).await {
            Ok(version) => {
                metrics::record_job_run("settings_reloader", "success", cycle_start.elapsed());
                if version != previous {
                    metrics::set_settings_version(version);
                    tracing::info!(version, "Published new filter settings");
                }
            }
            Err(e) => {
                metrics::record_job_run("settings_reloader", "error", cycle_start.elapsed());
                tracing::warn!(
                    error = %e,
                    version = previous,
                    "Settings reload failed, keeping current snapshot"
                );
            }
        }
    }
}

/// Loads the policy and publishes it. Returns the version now in effect.
pub async fn reload_once(
    publisher: &mut SettingsPublisher,
    source: &SettingsSource,
) -> Result<u64, ConfigError> {
    let policy = source.load().await?;
    Ok(publisher.publish(policy))
}
