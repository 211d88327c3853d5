//! Background jobs and their single-start supervisor.

pub mod classification_queue;
pub mod score_refresher;
pub mod settings_reloader;
pub mod stale_evictor;

use crate::clients::{Classifier, ContentSource};
use crate::config::{
    ClassifierConfig, EvictionConfig, RankingConfig, SettingsPublisher, SettingsSource,
};
use crate::db::ItemStore;
use crate::services::RefreshRequests;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything the periodic jobs need.
pub struct JobSet {
    pub store: Arc<dyn ItemStore>,
    pub content: Arc<dyn ContentSource>,
    /// `None` leaves the classification queue stopped
    pub classifier: Option<Arc<dyn Classifier>>,
    pub ranking: RankingConfig,
    pub classification: ClassifierConfig,
    pub eviction: EvictionConfig,
    pub refresh_requests: RefreshRequests,
    pub settings: Option<SettingsReload>,
}

pub struct SettingsReload {
    pub publisher: SettingsPublisher,
    pub source: SettingsSource,
    pub interval: Duration,
}

/// Spawns the periodic jobs at most once per runner.
#[derive(Default)]
pub struct JobRunner {
    handles: OnceCell<Vec<JoinHandle<()>>>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns every job in `jobs`. Returns `false`, spawning nothing, when
    /// this runner already started.
    pub fn start(&self, jobs: JobSet) -> bool {
        let mut started = false;
        self.handles.get_or_init(|| {
            started = true;
            spawn_jobs(jobs)
        });
        started
    }

    pub fn is_started(&self) -> bool {
        self.handles.get().is_some()
    }

    /// Number of spawned tasks, 0 before `start`.
    pub fn task_count(&self) -> usize {
        self.handles.get().map_or(0, Vec::len)
    }

    pub fn abort_all(&self) {
        if let Some(handles) = self.handles.get() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

fn spawn_jobs(jobs: JobSet) -> Vec<JoinHandle<()>> {
    let JobSet {
        store,
        content,
        classifier,
        ranking,
        classification,
        eviction,
        refresh_requests,
        settings,
    } = jobs;

    let mut handles = Vec::new();

    handles.push(tokio::spawn(score_refresher::start_score_refresher(
        store.clone(),
        content.clone(),
        ranking,
        refresh_requests,
    )));
    info!("Score refresher background job started");

    match classifier {
        Some(classifier) => {
            handles.push(tokio::spawn(
                classification_queue::start_classification_queue(
                    store.clone(),
                    content,
                    classifier,
                    classification,
                ),
            ));
            info!("Classification queue background job started");
        }
        None => info!("Classification queue disabled - no classifier configured"),
    }

    handles.push(tokio::spawn(stale_evictor::start_stale_evictor(
        store, eviction,
    )));
    info!("Stale evictor background job started");

    if let Some(SettingsReload {
        publisher,
        source,
        interval,
    }) = settings
    {
        handles.push(tokio::spawn(settings_reloader::start_settings_reloader(
            publisher, source, interval,
        )));
        info!("Settings reloader background job started");
    }

    handles
}
