//! Tail an SSE endpoint
//!
//! Prints every event received from the given URL until Ctrl-C.
//!
//! Run with: `cargo run -p hpx-eventsource --example tail -- <url> [event-name...]`
//!
//! Set `RUST_LOG=hpx_eventsource=debug` to see connection state changes.

use std::time::Duration;

use hpx_eventsource::{Event, EventSource, EventSourceConfig, handlers::LoggingHandler};
use tracing_subscriber::EnvFilter;

fn print_event(event: &Event) {
    println!(
        "[{}] id={} {}",
        event.event_type(),
        event.id().unwrap_or("-"),
        event.data()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: tail <url> [event-name...]");
        std::process::exit(2);
    };

    let config = EventSourceConfig::new(url)
        .timeout(Duration::from_secs(90))
        .reconnect_jitter(0.2);
    let source = EventSource::with_config(config)?;

    source.on_open(|_: &Event| println!("-- connected"));
    source.on_error(LoggingHandler::info());
    source.on_message(print_event);
    for name in args {
        source.add_event_listener(name, print_event);
    }

    source.open()?;
    tokio::signal::ctrl_c().await?;

    source.close();
    println!("-- closed (last event id: {:?})", source.last_event_id());
    Ok(())
}
