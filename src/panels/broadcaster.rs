use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::scoreboard::{self, ScoreboardView};
use super::standings;
use crate::hass::HassClient;
use crate::state::StateEngine;

/// The tracker integration can miss pushes, so the score entity is also
/// re-fetched on a fixed cadence.
const SCORE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Watch the entity cache and the team selection, and publish a fresh
/// [`ScoreboardView`] whenever the active game changes. The watch
/// channel keeps the latest view around so a wall that connects
/// mid-game paints without waiting for the next update.
pub fn spawn(
    engine: Arc<StateEngine>,
    hass: HassClient,
    mut active_entity: watch::Receiver<String>,
    view_tx: watch::Sender<Option<ScoreboardView>>,
    http: reqwest::Client,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = engine.subscribe();
        let mut removals = engine.subscribe_removals();
        let mut refresh = tokio::time::interval(SCORE_REFRESH_INTERVAL);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        refresh.tick().await;

        publish_current(&engine, &active_entity, &view_tx, &http).await;
        loop {
            tokio::select! {
                changed = active_entity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    publish_current(&engine, &active_entity, &view_tx, &http).await;
                }
                update = updates.recv() => match update {
                    Ok(update) => {
                        if update.entity_id == *active_entity.borrow() {
                            publish_current(&engine, &active_entity, &view_tx, &http).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "panel broadcaster lagged behind state updates");
                        publish_current(&engine, &active_entity, &view_tx, &http).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                removed = removals.recv() => match removed {
                    Ok(removed) => {
                        if removed.entity_id == *active_entity.borrow() {
                            warn!(
                                entity_id = %removed.entity_id,
                                "active entity removed from Home Assistant"
                            );
                            view_tx.send_replace(Some(scoreboard::missing_view(
                                &removed.entity_id,
                            )));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = refresh.tick() => {
                    hass.request_refresh();
                }
            }
        }
    })
}

async fn publish_current(
    engine: &StateEngine,
    active: &watch::Receiver<String>,
    view_tx: &watch::Sender<Option<ScoreboardView>>,
    http: &reqwest::Client,
) {
    let entity_id = active.borrow().clone();
    let Some(entity) = engine.get_entity(&entity_id) else {
        debug!(entity_id = %entity_id, "no cached state for active entity yet");
        return;
    };
    let standings = if scoreboard::wants_standings(&entity) {
        match standings::fetch_premier_league_standings(http).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(error = %e, "standings fetch failed");
                None
            }
        }
    } else {
        None
    };
    let view = scoreboard::build_view(&entity, standings);
    view_tx.send_replace(Some(view));
}
