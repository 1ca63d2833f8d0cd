//! MJPEG server demo with a synthetic frame source
//!
//! Run with: cargo run --example pattern_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example pattern_server                    # binds to 0.0.0.0:5001
//!   cargo run --example pattern_server localhost          # binds to 127.0.0.1:5001
//!   cargo run --example pattern_server 127.0.0.1:8080     # binds to 127.0.0.1:8080
//!
//! ## Viewing
//!
//! Browser:  open http://localhost:5001/ and follow the stream link
//! ffplay:   ffplay http://localhost:5001/stream
//! curl:     curl http://localhost:5001/snapshot -o frame.jpg
//!
//! ## Features
//!
//! - Any number of concurrent viewers on /stream
//! - Slow viewers skip frames instead of buffering; they never stall the
//!   producer or other viewers
//! - /status reports active viewers and totals as JSON

use std::net::SocketAddr;
use std::sync::Arc;

use mjpeg_rs::hub::FrameHub;
use mjpeg_rs::source::{PatternSource, SourceAdapter, SourceConfig, SourceEvent};
use mjpeg_rs::{ServerConfig, StreamServer};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:5001
/// - "localhost:8080" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:5001
/// - "0.0.0.0:5001" -> 0.0.0.0:5001
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 5001;

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
    eprintln!("Usage: pattern_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:5001)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  pattern_server                     # binds to 0.0.0.0:5001");
    eprintln!("  pattern_server localhost           # binds to 127.0.0.1:5001");
    eprintln!("  pattern_server 127.0.0.1:8080      # binds to 127.0.0.1:8080");
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
        None => "0.0.0.0:5001".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?)
                .add_directive("pattern_server=debug".parse()?),
        )
        .init();

    let hub = Arc::new(FrameHub::new());

    let adapter = SourceAdapter::new(
        Arc::new(PatternSource::new()),
        SourceConfig::default().fps(15),
        Arc::clone(&hub),
    );
    adapter.start()?;
    let mut source_events = adapter
        .take_events()
        .ok_or("source event channel unavailable")?;

    let config = ServerConfig::default().bind(bind_addr);
    let server = StreamServer::new(config, Arc::clone(&hub));

    println!("Starting MJPEG server on {}", bind_addr);
    println!();
    println!("=== View the stream ===");
    println!("Browser: http://localhost:{}/", bind_addr.port());
    println!("ffplay:  ffplay http://localhost:{}/stream", bind_addr.port());
    println!("curl:    curl http://localhost:{}/snapshot -o frame.jpg", bind_addr.port());
    println!();

    let mut fatal: Option<String> = None;
    tokio::select! {
        result = server.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        }) => {
            if let Err(e) = result {
                fatal = Some(e.to_string());
            }
        }
        event = source_events.recv() => {
            match event {
                Some(SourceEvent::Error(e)) => fatal = Some(e.to_string()),
                Some(SourceEvent::Eos) => eprintln!("source reached end of stream"),
                None => eprintln!("source event channel closed"),
            }
        }
    }

    adapter.stop();
    hub.close();

    if let Some(e) = fatal {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
