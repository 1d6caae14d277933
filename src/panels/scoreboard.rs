use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::standings::StandingsRow;
use crate::state::EntityState;

/// Entity whose soccer panel is replaced by the league table.
pub const ARSENAL_ENTITY: &str = "sensor.arsenal";

// Match event minutes look like "81'" or "45+2'", always followed by
// whitespace when another event trails them.
static EVENT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\+\d+)?'\s+").unwrap());
static EVENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\+\d+)?')\s+([^:]+):\s*(.+)$").unwrap());

/// Stat layout used for the center panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Hockey,
    Football,
    Basketball,
    Baseball,
    Soccer,
    Generic,
}

impl Sport {
    pub fn from_attr(sport: Option<&str>) -> Sport {
        let Some(sport) = sport else {
            return Sport::Generic;
        };
        match sport.to_ascii_lowercase().as_str() {
            "hockey" => Sport::Hockey,
            "football" | "nfl" => Sport::Football,
            "basketball" | "nba" => Sport::Basketball,
            "baseball" | "mlb" => Sport::Baseball,
            "soccer" => Sport::Soccer,
            _ => Sport::Generic,
        }
    }
}

/// One side panel: the tracked team or its opponent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSide {
    pub abbr: String,
    pub logo: Option<String>,
    pub record: String,
    pub score: String,
    /// True when this side is the tracked team rather than the opponent.
    pub tracked: bool,
}

/// One parsed soccer match event, e.g. a card or a goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEvent {
    pub minute: String,
    pub label: String,
    pub detail: String,
}

/// Center panel content, keyed by stat layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CenterStats {
    Hockey {
        period: String,
        clock: String,
        last_play: String,
        shots_on_goal: String,
        venue: String,
        location: String,
        tv_network: String,
    },
    Football {
        period: String,
        clock: String,
        possession: String,
        down_distance: String,
        last_play: String,
        venue: String,
        tv_network: String,
    },
    Basketball {
        period: String,
        clock: String,
        possession: String,
        timeouts: String,
        last_play: String,
        venue: String,
        tv_network: String,
    },
    Baseball {
        inning: String,
        clock: String,
        last_play: String,
        balls_strikes: String,
        outs: String,
        runners_on: String,
        venue: String,
    },
    Soccer {
        clock: String,
        shots_on_target: String,
        venue: String,
        tv_network: String,
        match_events: Vec<MatchEvent>,
    },
    /// League table shown instead of soccer stats for the special entity.
    /// `rows` is `None` until a standings fetch succeeds.
    Standings {
        clock: String,
        rows: Option<Vec<StandingsRow>>,
    },
    Generic {
        period: String,
        clock: String,
        venue: String,
        location: String,
        tv_network: String,
        last_play: String,
    },
}

/// Everything the wall needs to draw all three panels for one game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreboardView {
    pub entity_id: String,
    /// Raw tracker state: PRE, IN, POST, BYE or NOT_FOUND.
    pub status: String,
    pub sport: Sport,
    pub left: TeamSide,
    pub right: TeamSide,
    pub center: CenterStats,
}

/// True when this entity's soccer panel should carry the league table.
pub fn wants_standings(entity: &EntityState) -> bool {
    entity.entity_id == ARSENAL_ENTITY
        && Sport::from_attr(entity.attr_str("sport")) == Sport::Soccer
}

pub fn build_view(entity: &EntityState, standings: Option<Vec<StandingsRow>>) -> ScoreboardView {
    let attrs = &entity.attributes;
    let sport = Sport::from_attr(entity.attr_str("sport"));
    let (left, right) = team_sides(attrs);
    let center = if wants_standings(entity) {
        CenterStats::Standings {
            clock: attr_text(attrs, "clock", "N/A"),
            rows: standings,
        }
    } else {
        match sport {
            Sport::Hockey => hockey_stats(attrs),
            Sport::Football => football_stats(attrs),
            Sport::Basketball => basketball_stats(attrs),
            Sport::Baseball => baseball_stats(attrs),
            Sport::Soccer => soccer_stats(attrs),
            Sport::Generic => generic_stats(attrs),
        }
    };
    ScoreboardView {
        entity_id: entity.entity_id.clone(),
        status: entity.state.clone(),
        sport,
        left,
        right,
        center,
    }
}

/// View for an active entity with no cached state, e.g. one that was
/// removed from Home Assistant. Mirrors the NOT_FOUND shape the tracker
/// reports when it has no game data.
pub fn missing_view(entity_id: &str) -> ScoreboardView {
    let entity = EntityState {
        entity_id: entity_id.to_string(),
        state: "NOT_FOUND".to_string(),
        attributes: Map::new(),
        last_changed: None,
        last_updated: None,
    };
    build_view(&entity, None)
}

/// Soccer conventions put the home side on the left; American sports
/// broadcasts put it on the right. Non-NFL football counts as soccer.
fn uses_soccer_layout(sport: Option<&str>, league: Option<&str>) -> bool {
    let Some(sport) = sport else {
        return false;
    };
    let sport = sport.to_ascii_lowercase();
    sport == "soccer"
        || (sport == "football" && league.map_or(true, |l| !l.eq_ignore_ascii_case("nfl")))
}

fn team_sides(attrs: &Map<String, Value>) -> (TeamSide, TeamSide) {
    let tracked_is_home = attrs.get("team_homeaway").and_then(Value::as_str) == Some("home");
    let soccer = uses_soccer_layout(
        attrs.get("sport").and_then(Value::as_str),
        attrs.get("league").and_then(Value::as_str),
    );
    let tracked_left = if soccer {
        tracked_is_home
    } else {
        !tracked_is_home
    };

    let tracked = TeamSide {
        abbr: attr_text(attrs, "team_abbr", "N/A"),
        logo: attr_opt(attrs, "team_logo"),
        record: attr_text(attrs, "team_record", "0-0"),
        score: attr_text(attrs, "team_score", "0"),
        tracked: true,
    };
    let opponent = TeamSide {
        abbr: attr_text(attrs, "opponent_abbr", "N/A"),
        logo: attr_opt(attrs, "opponent_logo"),
        record: attr_text(attrs, "opponent_record", "0-0"),
        score: attr_text(attrs, "opponent_score", "0"),
        tracked: false,
    };
    if tracked_left {
        (tracked, opponent)
    } else {
        (opponent, tracked)
    }
}

fn hockey_stats(attrs: &Map<String, Value>) -> CenterStats {
    let period = match attr_text(attrs, "quarter", "") {
        q if q.is_empty() => "N/A".to_string(),
        q => match q.parse::<i64>() {
            Ok(n) => format!("{} Period", ordinal(n)),
            Err(_) => format!("{} Period", q),
        },
    };
    CenterStats::Hockey {
        period,
        clock: attr_text(attrs, "clock", "N/A"),
        last_play: attr_text(attrs, "last_play", "N/A"),
        shots_on_goal: format!(
            "{} - {}",
            attr_text(attrs, "team_shots_on_target", "0"),
            attr_text(attrs, "opponent_shots_on_target", "0")
        ),
        venue: attr_text(attrs, "venue", "N/A"),
        location: attr_text(attrs, "location", "N/A"),
        tv_network: attr_text(attrs, "tv_network", "N/A"),
    }
}

fn football_stats(attrs: &Map<String, Value>) -> CenterStats {
    CenterStats::Football {
        period: quarter_label(attrs),
        clock: attr_text(attrs, "clock", "N/A"),
        possession: possession_abbr(attrs),
        down_distance: attr_text(attrs, "down_distance_text", "N/A"),
        last_play: attr_text(attrs, "last_play", "N/A"),
        venue: attr_text(attrs, "venue", "N/A"),
        tv_network: attr_text(attrs, "tv_network", "N/A"),
    }
}

fn basketball_stats(attrs: &Map<String, Value>) -> CenterStats {
    CenterStats::Basketball {
        period: quarter_label(attrs),
        clock: attr_text(attrs, "clock", "N/A"),
        possession: possession_abbr(attrs),
        timeouts: format!(
            "{} - {}",
            attr_text(attrs, "team_timeouts", "N/A"),
            attr_text(attrs, "opponent_timeouts", "N/A")
        ),
        last_play: attr_text(attrs, "last_play", "N/A"),
        venue: attr_text(attrs, "venue", "N/A"),
        tv_network: attr_text(attrs, "tv_network", "N/A"),
    }
}

fn baseball_stats(attrs: &Map<String, Value>) -> CenterStats {
    CenterStats::Baseball {
        inning: attr_text(attrs, "quarter", "N/A"),
        clock: attr_text(attrs, "clock", "N/A"),
        last_play: attr_text(attrs, "last_play", "N/A"),
        balls_strikes: format!(
            "{} - {}",
            attr_text(attrs, "balls", "0"),
            attr_text(attrs, "strikes", "0")
        ),
        outs: attr_text(attrs, "outs", "0"),
        runners_on: runners_on_base(attrs),
        venue: attr_text(attrs, "venue", "N/A"),
    }
}

fn soccer_stats(attrs: &Map<String, Value>) -> CenterStats {
    let last_play = attrs
        .get("last_play")
        .and_then(Value::as_str)
        .unwrap_or_default();
    CenterStats::Soccer {
        clock: attr_text(attrs, "clock", "N/A"),
        shots_on_target: format!(
            "{} - {}",
            attr_text(attrs, "team_shots_on_target", "0"),
            attr_text(attrs, "opponent_shots_on_target", "0")
        ),
        venue: attr_text(attrs, "venue", "N/A"),
        tv_network: attr_text(attrs, "tv_network", "N/A"),
        match_events: parse_match_events(last_play),
    }
}

fn generic_stats(attrs: &Map<String, Value>) -> CenterStats {
    CenterStats::Generic {
        period: attr_text(attrs, "quarter", "N/A"),
        clock: attr_text(attrs, "clock", "N/A"),
        venue: attr_text(attrs, "venue", "N/A"),
        location: attr_text(attrs, "location", "N/A"),
        tv_network: attr_text(attrs, "tv_network", "N/A"),
        last_play: attr_text(attrs, "last_play", "N/A"),
    }
}

fn quarter_label(attrs: &Map<String, Value>) -> String {
    match attr_text(attrs, "quarter", "") {
        q if q.is_empty() => "N/A".to_string(),
        q => format!("Q{}", q),
    }
}

/// Which team has the ball. The tracker reports `possession` as the id
/// of the team holding it; comparing raw values also treats two absent
/// fields as the tracked team having possession.
fn possession_abbr(attrs: &Map<String, Value>) -> String {
    if attrs.get("possession") == attrs.get("team_id") {
        attr_text(attrs, "team_abbr", "N/A")
    } else {
        attr_text(attrs, "opponent_abbr", "N/A")
    }
}

fn runners_on_base(attrs: &Map<String, Value>) -> String {
    let mut runners = Vec::new();
    if attr_truthy(attrs, "on_first") {
        runners.push("1B");
    }
    if attr_truthy(attrs, "on_second") {
        runners.push("2B");
    }
    if attr_truthy(attrs, "on_third") {
        runners.push("3B");
    }
    if runners.is_empty() {
        "None".to_string()
    } else {
        runners.join(", ")
    }
}

/// Split a tracker last_play blob like
/// `"81' Yellow Card: Bogarde (AVL) 85' Goal: Saka (ARS)"` into events.
/// Chunks without the `minute' Label: detail` shape (possession
/// percentages and the like) are skipped.
pub fn parse_match_events(last_play: &str) -> Vec<MatchEvent> {
    if last_play.is_empty() || last_play == "N/A" || last_play.contains("Entity not found") {
        return Vec::new();
    }
    let starts: Vec<usize> = EVENT_MARKER
        .find_iter(last_play)
        .map(|m| m.start())
        .collect();
    let mut events = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(last_play.len());
        let segment = last_play[start..end].trim();
        if let Some(caps) = EVENT_LINE.captures(segment) {
            events.push(MatchEvent {
                minute: caps[1].to_string(),
                label: caps[2].trim().to_string(),
                detail: caps[3].trim().to_string(),
            });
        }
    }
    events
}

fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Attribute as display text. Mirrors template fallbacks: absent, empty
/// and zero all yield the fallback.
fn attr_text(attrs: &Map<String, Value>, name: &str, fallback: &str) -> String {
    match attrs.get(name) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => {
            if n.as_f64() == Some(0.0) {
                fallback.to_string()
            } else {
                n.to_string()
            }
        }
        _ => fallback.to_string(),
    }
}

fn attr_opt(attrs: &Map<String, Value>, name: &str) -> Option<String> {
    match attrs.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn attr_truthy(attrs: &Map<String, Value>, name: &str) -> bool {
    match attrs.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}
