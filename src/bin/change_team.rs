// Change the team shown on the theater wall from the command line.
//
// The selection is written to a local current-team.json as a fallback
// record, then posted to the wall server, which persists it in the
// Home Assistant helper entity.

use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;

const TEAM_FILE: &str = "current-team.json";

fn base_url() -> String {
    std::env::var("SCOREWALL_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("set") => {
            if args.len() < 3 {
                eprintln!("Missing arguments: team-name and entity-id required");
                print_usage();
                std::process::exit(1);
            }
            set_team(&args[1], &args[2]).await;
        }
        Some("get") => get_current_team(),
        Some("help") | Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn set_team(name: &str, entity_id: &str) {
    let team = json!({
        "name": name,
        "entity_id": entity_id,
        "timestamp": Utc::now(),
    });

    // Local record first, so the selection survives even when the
    // server is down.
    match serde_json::to_string_pretty(&team) {
        Ok(body) => match std::fs::write(TEAM_FILE, body) {
            Ok(()) => println!("Team saved to file: {name} ({entity_id})"),
            Err(e) => eprintln!("Failed to save to file: {e}"),
        },
        Err(e) => eprintln!("Failed to encode team record: {e}"),
    }

    let url = format!("{}/api/set-team", base_url());
    let response = reqwest::Client::new().post(&url).json(&team).send().await;
    match response {
        Ok(response) => match response.json::<Value>().await {
            Ok(body) if body["success"] == json!(true) => {
                println!("Team updated via API: {name}");
            }
            Ok(body) => {
                let error = body["error"].as_str().unwrap_or("Unknown error");
                println!("API response: {error}");
            }
            Err(e) => println!("API response parsing failed: {e}"),
        },
        Err(e) => {
            println!("API request failed: {e}");
            println!("Team saved to file - will be picked up once the server is back");
        }
    }
}

fn get_current_team() {
    if !Path::new(TEAM_FILE).exists() {
        println!("No team currently set");
        return;
    }
    let team = std::fs::read_to_string(TEAM_FILE)
        .map_err(|e| e.to_string())
        .and_then(|body| serde_json::from_str::<Value>(&body).map_err(|e| e.to_string()));
    match team {
        Ok(team) => {
            println!(
                "Current team: {} ({})",
                team["name"].as_str().unwrap_or("?"),
                team["entity_id"].as_str().unwrap_or("?")
            );
            println!(
                "Last updated: {}",
                team["timestamp"].as_str().unwrap_or("?")
            );
        }
        Err(e) => eprintln!("Failed to read current team: {e}"),
    }
}

fn print_usage() {
    println!(
        "
Usage: change-team <command> [options]

Commands:
  set <team-name> <entity-id>    Set the current team
  get                            Get the current team
  help                           Show this help

Examples:
  change-team set \"Lakers\" \"sensor.lakers_score\"
  change-team set \"Celtics\" \"sensor.celtics_score\"
  change-team get

Available Teams:
  Lakers     - sensor.lakers_score
  Celtics    - sensor.celtics_score
  Warriors   - sensor.warriors_score
  Heat       - sensor.heat_score

The server address defaults to http://localhost:8000; set SCOREWALL_URL
to override it.
"
    );
}
