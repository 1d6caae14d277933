// Fire a celebration video on the theater wall from the command line.

use serde_json::{json, Value};

const DEFAULT_VIDEO: &str = "assets/videos/ric-flair-celebration.mp4";

fn base_url() -> String {
    std::env::var("SCOREWALL_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|arg| arg == "--help") {
        print_usage();
        return;
    }

    let mut video_file = DEFAULT_VIDEO.to_string();
    let mut auto_hide = true;
    let mut duration: u64 = 10_000;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--no-auto-hide" => auto_hide = false,
            "--duration" if i + 1 < args.len() => {
                i += 1;
                duration = match args[i].parse() {
                    Ok(ms) => ms,
                    Err(_) => {
                        eprintln!("Invalid --duration value: {}", args[i]);
                        std::process::exit(1);
                    }
                };
            }
            arg if !arg.starts_with("--") => video_file = arg.to_string(),
            other => {
                eprintln!("Unknown option: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    println!("Triggering celebration video: {video_file}");
    println!("Options: autoHide={auto_hide}, duration={duration}ms");

    let url = format!("{}/api/trigger-celebration", base_url());
    let payload = json!({
        "videoFile": video_file,
        "autoHide": auto_hide,
        "duration": duration,
    });
    let response = reqwest::Client::new()
        .post(&url)
        .json(&payload)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error triggering celebration: {e}");
            eprintln!("Make sure the server is running on {}", base_url());
            std::process::exit(1);
        }
    };
    println!("Status: {}", response.status());
    match response.json::<Value>().await {
        Ok(body) if body["success"] == json!(true) => {
            println!("Celebration triggered successfully");
            println!("Video should start playing in 1-2 seconds");
        }
        Ok(body) => {
            let error = body["error"].as_str().unwrap_or("Unknown error");
            eprintln!("Failed to trigger celebration: {error}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Response parsing failed: {e}");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        "
Theater Wall Celebration Trigger

Usage:
  trigger-celebration [videoFile] [options]

Examples:
  trigger-celebration \"assets/videos/goal-celebration.mp4\"
  trigger-celebration \"assets/videos/custom.mp4\" --no-auto-hide

Options:
  --no-auto-hide    Don't auto-hide the video
  --duration MS     Auto-hide after MS milliseconds (default: 10000)
  --help            Show this help

The celebration video plays across all three panels with masking.
The server address defaults to http://localhost:8000; set SCOREWALL_URL
to override it.
"
    );
}
