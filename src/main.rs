use std::time::{Duration, Instant};

use graphite_emitter::observability::init_tracing;
use graphite_emitter::{Config, GraphiteClient};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json = std::env::var("GRAPHITE_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    init_tracing(json)?;

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    let period = config.flush_interval();
    info!(
        address = %config.address(),
        protocol = %config.protocol,
        namespace = %config.namespace,
        "starting graphite emitter"
    );

    let aggregator = GraphiteClient::new(config).into_aggregator();
    let handle = aggregator.run(period);

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    aggregator.set_active("emitter.up")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let loop_start = Instant::now();
                aggregator.increase("emitter.ticks")?;
                aggregator.add_sum("emitter.uptime_seconds", 1)?;
                aggregator.add_average(
                    "emitter.buffered_paths",
                    aggregator.len() as i64,
                )?;
                aggregator.add_average(
                    "emitter.tick_micros",
                    loop_start.elapsed().as_micros() as i64,
                )?;
            }
        }
    }

    info!(uptime_secs = started.elapsed().as_secs(), "shutting down");
    handle.shutdown().await;

    aggregator.set_inactive("emitter.up")?;
    match aggregator.flush().await {
        Ok(bytes) => info!(bytes, "final flush complete"),
        Err(e) => {
            warn!(error = %e, "final flush failed, retrying once");
            if let Err(e) = aggregator.retry().await {
                error!(error = %e, dropped = aggregator.len(), "metrics not delivered");
            }
        }
    }

    Ok(())
}
