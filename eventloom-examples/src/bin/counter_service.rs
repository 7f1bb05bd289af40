//! Runs a counter totals consumer under the service host until Ctrl-C.
//!
//! A handful of counters are written to an in-memory message store first so
//! the consumer has something to report on. `COUNTER_HOST_POLL_MS` sets the host
//! poll interval; `RUST_LOG` controls the log level.

use anyhow::{Context, Result};
use eventloom::{Category, Consumer, ConsumerName, HostConfig, InMemoryPositionStore, ServiceHost};
use eventloom_examples::counter::{CounterCommands, CounterId, Step, Totals, CATEGORY};
use eventloom_memory::InMemoryMessageStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn host_config_from_env() -> Result<HostConfig> {
    match std::env::var("COUNTER_HOST_POLL_MS") {
        Ok(value) => {
            let poll_ms = value
                .parse::<u64>()
                .with_context(|| format!("invalid COUNTER_HOST_POLL_MS: {value}"))?;
            Ok(HostConfig::new(poll_ms)?)
        }
        Err(_) => Ok(HostConfig::default()),
    }
}

async fn seed(commands: &CounterCommands<InMemoryMessageStore>) -> Result<()> {
    for (id, steps) in [("visits", [1, 1, 1]), ("signups", [2, 3, 5])] {
        let id = CounterId::try_new(id)?;
        for step in steps {
            commands.increment(&id, Step::try_new(step)?).await?;
        }
    }
    let visits = CounterId::try_new("visits")?;
    commands.reset(&visits).await?;
    commands.increment(&visits, Step::try_new(4)?).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = InMemoryMessageStore::new();
    let commands = CounterCommands::new(store.clone())?;
    seed(&commands).await?;

    let totals = Totals::new();
    let consumer = Consumer::new(
        ConsumerName::try_new("counter-totals")?,
        Category::try_new(CATEGORY)?,
        store.clone(),
        InMemoryPositionStore::new(),
        totals.clone(),
    );

    let mut host = ServiceHost::new(host_config_from_env()?);
    host.register(consumer);

    info!(messages = store.len(), "serving counter totals; press Ctrl-C to stop");
    let summary = host
        .run_until(None, async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "could not listen for Ctrl-C");
            }
        })
        .await;

    for (id, total) in totals.snapshot() {
        info!(id = %id, total, "final total");
    }
    info!(
        iterations = summary.iterations,
        failed = summary.failed_iterations,
        grand_total = totals.grand_total(),
        "stopped"
    );
    Ok(())
}
