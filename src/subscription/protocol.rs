use crate::celebration::CelebrationTrigger;
use crate::config::{PanelsConfig, TeamEntry, VideoConfig, WallConfig};
use crate::hass::ConnectionStatus;
use crate::panels::{MaskRegions, PanelRegion, ScoreboardView};
use crate::state::StateUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client → Server message types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { entity_id: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { entity_id: String },
    /// Change the tracked team; written back to the Home Assistant
    /// helper so every wall and the CLI see the same selection.
    #[serde(rename = "select_team")]
    SelectTeam { entity_id: String },
}

/// Server → Client: one-time greeting with everything the kiosk needs to
/// lay itself out before the first panel update arrives.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub active_entity: String,
    pub panels: PanelsConfig,
    pub regions: [PanelRegion; 3],
    pub mask: String,
    pub video: VideoConfig,
    pub teams: Vec<TeamEntry>,
    pub timestamp: DateTime<Utc>,
}

impl ConfigMessage {
    pub fn new(config: &WallConfig, active_entity: String) -> Self {
        let mask = MaskRegions::from_layout(config.panels.width_pct, config.panels.gap_pct);
        Self {
            msg_type: "config".to_string(),
            active_entity,
            panels: config.panels.clone(),
            regions: mask.regions(),
            mask: mask.mask_css(),
            video: config.video.clone(),
            teams: config.teams.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Server → Client: full scoreboard view for the active entity
#[derive(Debug, Clone, Serialize)]
pub struct PanelUpdateMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub view: ScoreboardView,
    pub timestamp: DateTime<Utc>,
}

impl From<ScoreboardView> for PanelUpdateMessage {
    fn from(view: ScoreboardView) -> Self {
        Self {
            msg_type: "panel_update".to_string(),
            view,
            timestamp: Utc::now(),
        }
    }
}

/// Server → Client: raw entity update notification
#[derive(Debug, Clone, Serialize)]
pub struct StateUpdateMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub entity_id: String,
    pub state: String,
    pub attributes: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl From<StateUpdate> for StateUpdateMessage {
    fn from(update: StateUpdate) -> Self {
        Self {
            msg_type: "state_update".to_string(),
            entity_id: update.entity_id,
            state: update.new_state.state,
            attributes: update.new_state.attributes,
            timestamp: update.timestamp,
        }
    }
}

/// Server → Client: upstream connection status change
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub connection: ConnectionStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    pub fn new(connection: ConnectionStatus) -> Self {
        Self {
            msg_type: "status".to_string(),
            connection,
            timestamp: Utc::now(),
        }
    }
}

/// Server → Client: play a celebration. Carries the mask and playback
/// settings so the page needs no other state to start the video.
#[derive(Debug, Clone, Serialize)]
pub struct CelebrationMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub trigger: CelebrationTrigger,
    pub mask: String,
    pub volume: f64,
    /// Celebrations play once; looping is for the ambient video.
    pub loop_playback: bool,
    pub timestamp: DateTime<Utc>,
}

impl CelebrationMessage {
    pub fn new(trigger: CelebrationTrigger, mask: String, video: &VideoConfig) -> Self {
        Self {
            msg_type: "celebration".to_string(),
            trigger,
            mask,
            volume: video.celebration_volume,
            loop_playback: false,
            timestamp: Utc::now(),
        }
    }
}

/// Server → Client: Error message
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: String) -> Self {
        Self {
            msg_type: "error".to_string(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parses_subscribe() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","entity_id":"sensor.arsenal"}"#).unwrap();
        match msg {
            ClientMessage::Subscribe { entity_id } => assert_eq!(entity_id, "sensor.arsenal"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_client_message_parses_select_team() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"select_team","entity_id":"sensor.boston_celtics"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SelectTeam { entity_id } => {
                assert_eq!(entity_id, "sensor.boston_celtics")
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_config_message_shape() {
        let config = WallConfig::default();
        let msg = ConfigMessage::new(&config, "sensor.atlanta_falcons".to_string());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "config");
        assert_eq!(json["active_entity"], "sensor.atlanta_falcons");
        assert_eq!(json["regions"].as_array().unwrap().len(), 3);
        // Default layout: width 27, gap 2, strip centered at 7.5%.
        assert_eq!(json["regions"][0]["start"], 7.5);
        assert!(json["mask"]
            .as_str()
            .unwrap()
            .starts_with("linear-gradient(to right"));
        assert_eq!(json["teams"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_celebration_message_carries_playback_settings() {
        let trigger = CelebrationTrigger {
            kind: "celebration_trigger".to_string(),
            video_file: "assets/videos/goal.mp4".to_string(),
            auto_hide: true,
            duration: 10_000,
            timestamp: Utc::now(),
        };
        let msg = CelebrationMessage::new(trigger, "mask-css".to_string(), &VideoConfig::default());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "celebration");
        assert_eq!(json["trigger"]["videoFile"], "assets/videos/goal.mp4");
        assert_eq!(json["volume"], 0.8);
        assert_eq!(json["loop_playback"], false);
    }
}
