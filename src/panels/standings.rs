use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

pub const STANDINGS_URL: &str =
    "https://site.api.espn.com/apis/v2/sports/soccer/eng.1/standings";

/// One row of the league table, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsRow {
    pub rank: String,
    pub name: String,
    pub short_name: String,
    pub logo: String,
    pub points: String,
}

/// Fetch the Premier League table from ESPN and keep the top six.
pub async fn fetch_premier_league_standings(
    client: &reqwest::Client,
) -> Result<Vec<StandingsRow>> {
    let response = client
        .get(STANDINGS_URL)
        .send()
        .await
        .context("standings request failed")?;
    if !response.status().is_success() {
        anyhow::bail!("standings API returned {}", response.status());
    }
    let body: Value = response
        .json()
        .await
        .context("standings response was not JSON")?;
    Ok(parse_standings(&body))
}

pub fn parse_standings(body: &Value) -> Vec<StandingsRow> {
    let entries = body
        .pointer("/children/0/standings/entries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    entries.iter().take(6).map(parse_entry).collect()
}

fn parse_entry(entry: &Value) -> StandingsRow {
    let stats = entry
        .get("stats")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    // Stats are matched by name first; the positional indexes are the
    // layout ESPN used when names are absent.
    let named = |name: &str| {
        stats
            .iter()
            .find(|s| s.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|s| s.get("displayValue"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let indexed = |i: usize| {
        stats
            .get(i)
            .and_then(|s| s.get("displayValue"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let team = |path: &str| {
        entry
            .pointer(path)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    };

    StandingsRow {
        rank: named("rank")
            .or_else(|| indexed(10))
            .unwrap_or_else(|| "?".to_string()),
        name: team("/team/displayName").unwrap_or("Unknown").to_string(),
        short_name: team("/team/abbreviation")
            .or_else(|| team("/team/shortDisplayName"))
            .unwrap_or("UNK")
            .to_string(),
        logo: team("/team/logos/0/href").unwrap_or_default().to_string(),
        points: named("points")
            .or_else(|| indexed(3))
            .unwrap_or_else(|| "0".to_string()),
    }
}
