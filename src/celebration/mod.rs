// Celebration overlay plumbing. A trigger is a one-shot JSON file on
// disk so that external tools (curl, automations) and this process see
// the same thing; the watcher consumes it and fans the event out to
// connected walls, with a cooldown so back-to-back triggers don't
// restart the video mid-play.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const TRIGGER_FILE: &str = "celebration-trigger.json";

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const COOLDOWN: Duration = Duration::from_secs(5);
const DEFAULT_DURATION_MS: u64 = 10_000;

fn default_trigger_kind() -> String {
    "celebration_trigger".to_string()
}

/// The stored trigger payload, also returned to the HTTP caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelebrationTrigger {
    #[serde(rename = "type", default = "default_trigger_kind")]
    pub kind: String,
    #[serde(rename = "videoFile")]
    pub video_file: String,
    #[serde(rename = "autoHide")]
    pub auto_hide: bool,
    /// How long the overlay stays up, in milliseconds.
    pub duration: u64,
    pub timestamp: DateTime<Utc>,
}

/// Fields a caller may set when firing a celebration; everything is
/// optional and falls back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CelebrationRequest {
    #[serde(rename = "videoFile")]
    pub video_file: Option<String>,
    #[serde(rename = "autoHide")]
    pub auto_hide: Option<bool>,
    pub duration: Option<u64>,
}

pub struct CelebrationCoordinator {
    path: PathBuf,
    default_video: String,
    event_tx: broadcast::Sender<CelebrationTrigger>,
    last_fired: Mutex<Option<Instant>>,
}

impl CelebrationCoordinator {
    pub fn new(data_dir: &Path, default_video: String) -> CelebrationCoordinator {
        let (event_tx, _) = broadcast::channel(8);
        CelebrationCoordinator {
            path: data_dir.join(TRIGGER_FILE),
            default_video,
            event_tx,
            last_fired: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CelebrationTrigger> {
        self.event_tx.subscribe()
    }

    /// Write a new trigger file, replacing any unconsumed one.
    pub async fn trigger(&self, request: CelebrationRequest) -> Result<CelebrationTrigger> {
        let payload = CelebrationTrigger {
            kind: default_trigger_kind(),
            video_file: request
                .video_file
                .unwrap_or_else(|| self.default_video.clone()),
            auto_hide: request.auto_hide.unwrap_or(true),
            duration: request.duration.unwrap_or(DEFAULT_DURATION_MS),
            timestamp: Utc::now(),
        };
        let body = serde_json::to_string(&payload)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        info!(video = %payload.video_file, "celebration trigger stored");
        Ok(payload)
    }

    /// Consume the trigger file if present. The file is deleted either
    /// way; a malformed payload is discarded rather than replayed.
    pub async fn take_pending(&self) -> Option<CelebrationTrigger> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "could not read celebration trigger file");
                return None;
            }
        };
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(error = %e, "could not remove celebration trigger file");
        }
        match serde_json::from_str(&content) {
            Ok(trigger) => Some(trigger),
            Err(e) => {
                warn!(error = %e, "discarding malformed celebration trigger");
                None
            }
        }
    }

    /// One watcher step: consume a pending trigger and broadcast it,
    /// unless the cooldown window is still open. A suppressed trigger
    /// is still consumed.
    pub async fn poll_and_fire(&self) -> Option<CelebrationTrigger> {
        let trigger = self.take_pending().await?;
        if !self.cooldown_elapsed().await {
            debug!("celebration suppressed by cooldown");
            return None;
        }
        info!(video = %trigger.video_file, "firing celebration");
        let _ = self.event_tx.send(trigger.clone());
        Some(trigger)
    }

    /// True (and the window restarts) when the last celebration is old
    /// enough to allow another.
    async fn cooldown_elapsed(&self) -> bool {
        let mut last = self.last_fired.lock().await;
        match *last {
            Some(fired_at) if fired_at.elapsed() < COOLDOWN => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    /// Peek at the cooldown window without restarting it.
    pub async fn cooldown_active(&self) -> bool {
        matches!(
            *self.last_fired.lock().await,
            Some(fired_at) if fired_at.elapsed() < COOLDOWN
        )
    }

    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.poll_and_fire().await;
            }
        })
    }
}
