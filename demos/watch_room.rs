//! Watch a live room and print its events.
//!
//! Demonstrates:
//! - Building a client with an event handler
//! - Classifying events by kind
//! - Reconnecting from outside the library when a session dies
//!
//! Usage:
//!   cargo run --example watch_room -- <room_id>
//!   cargo run --example watch_room -- <room_id> --uid 12345
//!   cargo run --example watch_room -- <room_id> --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use danmaku_client::{Client, Event, EventKind, Result, RoomId, UserId};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    room_id: u64,
    uid: u64,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Option<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();

        let room_id = args.iter().find_map(|a| a.parse::<u64>().ok())?;
        let uid = args
            .iter()
            .position(|a| a == "--uid")
            .and_then(|i| args.get(i + 1))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Some(Self {
            room_id,
            uid,
            debug: args.iter().any(|a| a == "--debug"),
        })
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "danmaku_client=debug"
    } else {
        "danmaku_client=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let Some(args) = Args::parse() else {
        eprintln!("usage: watch_room <room_id> [--uid N] [--debug]");
        std::process::exit(2);
    };
    init_logging(args.debug);

    tokio::select! {
        result = run(args) => {
            if let Err(e) = result {
                eprintln!("\n[ERROR] {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => println!("\nInterrupted"),
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Watching room {} ===\n", args.room_id);

    let client = Client::builder().on_event(print_event).build()?;
    let uid = UserId::new(args.uid);
    let room_id = RoomId::new(args.room_id);

    loop {
        match client.connect(uid, room_id).await {
            Ok(session) => {
                println!("[Connected] host {}", session.host());
                session.closed().await;
                println!(
                    "[Closed] {}",
                    session
                        .close_reason()
                        .map_or_else(|| "unknown".to_string(), |r| r.to_string())
                );
                if session.dropped_events() > 0 {
                    println!("         {} events dropped", session.dropped_events());
                }
            }
            Err(e) if e.is_establishment_error() => {
                println!("[Retry] {e}");
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

fn print_event(event: Event) {
    match event.kind() {
        EventKind::Notification { .. } if event.cmd_name() == Some("DANMU_MSG") => {
            let info = event.json().and_then(|json| json.get("info"));
            let text = info.and_then(|info| info.get(1)).and_then(|v| v.as_str());
            let user = info
                .and_then(|info| info.get(2))
                .and_then(|user| user.get(1))
                .and_then(|v| v.as_str());
            if let (Some(user), Some(text)) = (user, text) {
                println!("{user}: {text}");
            }
        }
        EventKind::Notification { cmd } => println!("[{cmd}]"),
        EventKind::Popularity { count } => println!("[Popularity] {count}"),
        EventKind::Control { code } => println!("[Entered] code {code}"),
        EventKind::Raw => {}
    }
}
