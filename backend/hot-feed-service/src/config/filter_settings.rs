//! Keyword policy for the filter pipeline.
//!
//! The policy is published as an immutable, versioned [`FilterSettings`]
//! snapshot over a `watch` channel. Readers clone the `Arc` and keep using
//! that snapshot for the whole batch; a reload swaps in a new snapshot and
//! never mutates one that is in use.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Raw policy as written in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPolicy {
    /// Whole-word matches
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Substring matches
    #[serde(default)]
    pub partial_keywords: Vec<String>,
    /// Substring matches that always veto
    #[serde(default)]
    pub negative_keywords: Vec<String>,
    /// Substring matches that flag an item for secondary classification
    #[serde(default)]
    pub keywords_to_eval: Vec<String>,
    /// keyword -> boost; the largest matching boost wins
    #[serde(default)]
    pub boosted_keywords: BTreeMap<String, f64>,
    #[serde(default = "default_accepted_language")]
    pub accepted_language: String,
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,
}

fn default_accepted_language() -> String {
    "en".to_string()
}

fn default_max_hashtags() -> usize {
    6
}

impl Default for FilterPolicy {
    fn default() -> Self {
        let strings = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            keywords: strings(&[
                "film",
                "movie",
                "cinema",
                "screenplay",
                "actress",
                "actor",
                "oscars",
                "screenwriter",
                "blockbuster",
                "filmsky",
                "theaters",
                "director",
                "letterboxd",
            ]),
            partial_keywords: Vec::new(),
            negative_keywords: strings(&[
                "game",
                "gaming",
                "video game",
                "videogame",
                "gamer",
                "games",
                "gameplay",
                "game developer",
                "game development",
                "esports",
                "art director",
                "short film",
            ]),
            keywords_to_eval: strings(&["director", "film", "actress", "actor", "movie"]),
            boosted_keywords: BTreeMap::new(),
            accepted_language: default_accepted_language(),
            max_hashtags: default_max_hashtags(),
        }
    }
}

/// Normalized, read-only snapshot consumed by the filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub version: u64,
    pub keywords: Vec<String>,
    pub partial_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub keywords_to_eval: Vec<String>,
    pub boosted_keywords: Vec<(String, f64)>,
    pub accepted_language: String,
    pub max_hashtags: usize,
}

impl FilterSettings {
    /// Lowercases every keyword and folds boosted keywords into the partial list.
    pub fn from_policy(policy: &FilterPolicy, version: u64) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        let boosted_keywords: Vec<(String, f64)> = policy
            .boosted_keywords
            .iter()
            .map(|(keyword, boost)| (keyword.trim().to_lowercase(), *boost))
            .filter(|(keyword, _)| !keyword.is_empty())
            .collect();

        let mut partial_keywords = lower(&policy.partial_keywords);
        for (keyword, _) in &boosted_keywords {
            if !partial_keywords.contains(keyword) {
                partial_keywords.push(keyword.clone());
            }
        }

        Self {
            version,
            keywords: lower(&policy.keywords),
            partial_keywords,
            negative_keywords: lower(&policy.negative_keywords),
            keywords_to_eval: lower(&policy.keywords_to_eval),
            boosted_keywords,
            accepted_language: policy.accepted_language.trim().to_lowercase(),
            max_hashtags: policy.max_hashtags,
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self::from_policy(&FilterPolicy::default(), 0)
    }
}

/// Where the policy is loaded from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    Builtin,
    File(PathBuf),
}

impl SettingsSource {
    pub async fn load(&self) -> Result<FilterPolicy, ConfigError> {
        match self {
            SettingsSource::Builtin => Ok(FilterPolicy::default()),
            SettingsSource::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ConfigError::SettingsFile {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                serde_json::from_str(&raw).map_err(|e| ConfigError::SettingsFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Write side of the settings channel, owned by the reloader.
pub struct SettingsPublisher {
    tx: watch::Sender<Arc<FilterSettings>>,
    current: FilterPolicy,
    version: u64,
}

impl SettingsPublisher {
    /// Publishes `policy` as a new snapshot unless it equals the current one.
    /// Returns the version now in effect.
    pub fn publish(&mut self, policy: FilterPolicy) -> u64 {
        if policy == self.current {
            return self.version;
        }
        self.version += 1;
        let snapshot = Arc::new(FilterSettings::from_policy(&policy, self.version));
        self.current = policy;
        self.tx.send_replace(snapshot);
        self.version
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Read side of the settings channel.
#[derive(Clone)]
pub struct SettingsHandle {
    rx: watch::Receiver<Arc<FilterSettings>>,
}

impl SettingsHandle {
    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<FilterSettings> {
        self.rx.borrow().clone()
    }

    /// Handle pinned to a fixed snapshot, for callers without a reloader.
    pub fn fixed(settings: FilterSettings) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(settings));
        Self { rx }
    }
}

pub fn settings_channel(initial: FilterPolicy) -> (SettingsPublisher, SettingsHandle) {
    let version = 1;
    let snapshot = Arc::new(FilterSettings::from_policy(&initial, version));
    let (tx, rx) = watch::channel(snapshot);
    (
        SettingsPublisher {
            tx,
            current: initial,
            version,
        },
        SettingsHandle { rx },
    )
}
