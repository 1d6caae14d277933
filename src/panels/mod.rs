// Three-panel scoreboard: video mask geometry, sport-specific stat
// views, and the broadcaster that pushes view updates to the wall.

pub mod broadcaster;
mod mask;
mod scoreboard;
mod standings;

pub use mask::{MaskRegions, PanelRegion};
pub use scoreboard::{
    build_view, parse_match_events, wants_standings, CenterStats, MatchEvent, ScoreboardView,
    Sport, TeamSide, ARSENAL_ENTITY,
};
pub use standings::{fetch_premier_league_standings, parse_standings, StandingsRow, STANDINGS_URL};
