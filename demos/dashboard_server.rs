//! Dashboard notification server
//!
//! Run with: cargo run --example dashboard_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example dashboard_server                  # binds to 0.0.0.0:8080
//!   cargo run --example dashboard_server localhost        # binds to 127.0.0.1:8080
//!   cargo run --example dashboard_server 127.0.0.1:9000   # binds to 127.0.0.1:9000
//!
//! ## Watch the stream
//!
//!   curl -N http://localhost:8080/api/notifications/stream
//!
//! ## Publish a notification
//!
//!   curl -X POST http://localhost:8080/api/notifications \
//!        -d '{"type":"alert","severity":"critical","message":"disk full"}'
//!
//! A background task also simulates device status changes every few seconds
//! so an idle dashboard still has something to show.

use std::net::SocketAddr;
use std::time::Duration;

use notify_hub::bus::kinds;
use notify_hub::{EventBus, Notification, NotificationServer, ServerConfig};

const DEVICES: [&str; 3] = ["edge-router-1", "core-switch-2", "ap-lobby"];

/// Publishes a status change for one simulated device per tick
async fn simulate_devices(bus: EventBus) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut round: usize = 0;

    loop {
        ticker.tick().await;

        let device = DEVICES[round % DEVICES.len()];
        let online = round % 4 != 3;
        round += 1;

        bus.publish(
            Notification::new(kinds::CONNECTION_STATUS)
                .with_field("device", device)
                .with_field("status", if online { "online" } else { "offline" }),
        );

        if !online {
            bus.publish(
                Notification::new(kinds::ALERT)
                    .with_field("severity", "warning")
                    .with_field("message", format!("{} stopped responding", device)),
            );
        }

        tracing::debug!(
            device = device,
            online = online,
            subscribers = bus.subscriber_count(),
            "Simulated status change"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 8080)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notify_hub=debug".parse()?)
                .add_directive("dashboard_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    let bus = EventBus::new();

    println!("Starting notification server on {}", config.bind_addr);
    println!();
    println!("Stream:  curl -N http://{}{}", config.bind_addr, config.stream_path);
    println!("Stats:   curl http://{}{}", config.bind_addr, config.stats_path);
    println!();

    let simulator = tokio::spawn(simulate_devices(bus.clone()));
    let server = NotificationServer::new(config, bus);

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    simulator.abort();

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    // Give draining streams a moment to flush
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = server.bus().stats();
    println!(
        "Published {} notifications, delivered {}, dropped {}",
        stats.total_published, stats.total_delivered, stats.total_dropped
    );

    Ok(())
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: dashboard_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR  Address to listen on (default: 0.0.0.0:8080)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG   Log filter, e.g. RUST_LOG=notify_hub=trace");
}
