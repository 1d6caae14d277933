use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Complete wall display configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WallConfig {
    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub panels: PanelsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default = "default_teams")]
    pub teams: Vec<TeamEntry>,
}

/// Home Assistant connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    /// WebSocket API endpoint
    #[serde(default = "default_ha_url")]
    pub url: String,
    /// Long-lived access token
    #[serde(default)]
    pub token: String,
    /// Entity driving the three panels
    #[serde(default = "default_game_score_entity")]
    pub game_score_entity: String,
    /// Helper entity holding the externally selected team
    #[serde(default = "default_team_helper_entity")]
    pub team_helper_entity: String,
}

fn default_ha_url() -> String {
    "ws://homeassistant.local:8123/api/websocket".to_string()
}

fn default_game_score_entity() -> String {
    "sensor.atlanta_falcons".to_string()
}

fn default_team_helper_entity() -> String {
    "input_text.theater_wall_selected_entity".to_string()
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            url: default_ha_url(),
            token: String::new(),
            game_score_entity: default_game_score_entity(),
            team_helper_entity: default_team_helper_entity(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Static file roots tried in order; first hit wins
    #[serde(default = "default_static_dirs")]
    pub static_dirs: Vec<String>,
    /// Directory holding the celebration trigger file
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dirs() -> Vec<String> {
    vec![
        "static".to_string(),
        "static/css".to_string(),
        "static/js".to_string(),
        "static/assets".to_string(),
        "static/config".to_string(),
    ]
}

fn default_data_dir() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dirs: default_static_dirs(),
            data_dir: default_data_dir(),
        }
    }
}

/// Panel geometry configuration (viewport percentages)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelsConfig {
    #[serde(default = "default_panel_width")]
    pub width_pct: f64,
    #[serde(default = "default_panel_gap")]
    pub gap_pct: f64,
}

fn default_panel_width() -> f64 {
    27.0
}

fn default_panel_gap() -> f64 {
    2.0
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            width_pct: default_panel_width(),
            gap_pct: default_panel_gap(),
        }
    }
}

/// Video playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
    /// Sources offered by the manual video selector; first is preloaded
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_celebration_volume")]
    pub celebration_volume: f64,
    /// Played when a trigger names no file
    #[serde(default = "default_celebration_video")]
    pub default_celebration: String,
}

fn default_volume() -> f64 {
    0.5
}

fn default_loop_playback() -> bool {
    true
}

fn default_sources() -> Vec<String> {
    vec!["assets/videos/ric-flair.mp4".to_string()]
}

fn default_celebration_volume() -> f64 {
    0.8
}

fn default_celebration_video() -> String {
    "assets/videos/ric-flair-celebration.mp4".to_string()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            loop_playback: default_loop_playback(),
            sources: default_sources(),
            celebration_volume: default_celebration_volume(),
            default_celebration: default_celebration_video(),
        }
    }
}

/// Quick-select team entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEntry {
    pub entity_id: String,
    pub name: String,
}

fn default_teams() -> Vec<TeamEntry> {
    [
        ("sensor.lakers_score", "Lakers"),
        ("sensor.celtics_score", "Celtics"),
        ("sensor.warriors_score", "Warriors"),
        ("sensor.heat_score", "Heat"),
    ]
    .iter()
    .map(|(entity_id, name)| TeamEntry {
        entity_id: entity_id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            home_assistant: HomeAssistantConfig::default(),
            server: ServerConfig::default(),
            panels: PanelsConfig::default(),
            video: VideoConfig::default(),
            teams: default_teams(),
        }
    }
}

impl WallConfig {
    /// Apply environment variable overrides on top of file/default values.
    ///
    /// Both naming conventions are honored, with the long form winning:
    /// HOME_ASSISTANT_URL/HA_URL, HOME_ASSISTANT_TOKEN/HA_TOKEN,
    /// GAME_SCORE_ENTITY, PANEL_WIDTH, PANEL_GAP, PORT.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub(crate) fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("HOME_ASSISTANT_URL").or_else(|| var("HA_URL")) {
            if !url.is_empty() {
                self.home_assistant.url = url;
            }
        }
        if let Some(token) = var("HOME_ASSISTANT_TOKEN").or_else(|| var("HA_TOKEN")) {
            if !token.is_empty() {
                self.home_assistant.token = token;
            }
        }
        if let Some(entity) = var("GAME_SCORE_ENTITY") {
            if !entity.is_empty() {
                self.home_assistant.game_score_entity = entity;
            }
        }
        if let Some(raw) = var("PANEL_WIDTH") {
            match raw.parse::<f64>() {
                Ok(width) => self.panels.width_pct = width,
                Err(_) => warn!(value = %raw, "Ignoring unparseable PANEL_WIDTH"),
            }
        }
        if let Some(raw) = var("PANEL_GAP") {
            match raw.parse::<f64>() {
                Ok(gap) => self.panels.gap_pct = gap,
                Err(_) => warn!(value = %raw, "Ignoring unparseable PANEL_GAP"),
            }
        }
        if let Some(raw) = var("PORT") {
            match raw.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %raw, "Ignoring unparseable PORT"),
            }
        }
    }

    /// Validate configuration, returning all problems found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.panels.width_pct < 10.0 || self.panels.width_pct > 40.0 {
            errors.push("Panel width must be between 10% and 40%".to_string());
        }
        if self.panels.gap_pct < 1.0 || self.panels.gap_pct > 10.0 {
            errors.push("Panel gap must be between 1% and 10%".to_string());
        }
        if self.home_assistant.url.is_empty() {
            errors.push("Home Assistant URL is required".to_string());
        }

        errors
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<WallConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config: WallConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {path}"))?;
    Ok(config)
}
