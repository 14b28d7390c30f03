//! Simulate command - drive configured pools against a flaky fake provider.
//!
//! Every pool in the config is filled from a [`SimulatedProvider`] that
//! answers after a fixed latency and fails every N-th request. The command
//! consumes from every pool on a fixed cadence, logs pool updates, and prints
//! a snapshot table when the run ends (after `--duration` or on Ctrl+C).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use warmpool::config::ConfigFile;
use warmpool::logging::{init_logging, LoggingOptions};
use warmpool::provider::{FetchError, FetchFuture, FetchProvider, FetchRequest};
use warmpool::registry::PoolRegistry;

use super::check::load_pools;
use crate::error::CliError;

/// Arguments for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub config: PathBuf,
    pub duration: Duration,
    pub failure_rate: u64,
    pub latency: Duration,
    pub consume_every: Duration,
    pub debug: bool,
}

/// Item handed out by the simulated provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedItem {
    pub unit_id: String,
    pub serial: u64,
}

/// Provider that sleeps for `latency` and fails every `failure_rate`-th call.
///
/// A `failure_rate` of 0 never fails.
pub struct SimulatedProvider {
    failure_rate: u64,
    latency: Duration,
    requests: AtomicU64,
}

impl SimulatedProvider {
    pub fn new(failure_rate: u64, latency: Duration) -> Self {
        Self {
            failure_rate,
            latency,
            requests: AtomicU64::new(0),
        }
    }

    /// Number of fetches issued so far.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn should_fail(&self, serial: u64) -> bool {
        self.failure_rate > 0 && serial % self.failure_rate == 0
    }
}

impl FetchProvider<SimulatedItem> for SimulatedProvider {
    fn fetch(&self, request: FetchRequest) -> FetchFuture<SimulatedItem> {
        let serial = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let fail = self.should_fail(serial);
        let latency = self.latency;

        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if fail {
                trace!(key = %request.key, serial, "Simulated fetch failure");
                return Err(FetchError::Provider(format!(
                    "simulated failure for {}",
                    request.unit_id
                )));
            }
            Ok(SimulatedItem {
                unit_id: request.unit_id,
                serial,
            })
        }
        .boxed()
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let config = load_pools(&args.config)?;

    let options = LoggingOptions {
        debug: args.debug,
        ..LoggingOptions::default()
    };
    let _logging_guard =
        init_logging(&options).map_err(|e| CliError::LoggingInit(e.to_string()))?;

    info!("warmpool v{}", warmpool::VERSION);
    info!(
        config = %args.config.display(),
        pools = config.pools.len(),
        duration_secs = args.duration.as_secs_f64(),
        failure_rate = args.failure_rate,
        latency_ms = args.latency.as_millis() as u64,
        "Starting simulation"
    );

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(simulate(config, args))
}

async fn simulate(config: ConfigFile, args: SimulateArgs) -> Result<(), CliError> {
    let provider = Arc::new(SimulatedProvider::new(args.failure_rate, args.latency));
    let registry = Arc::new(PoolRegistry::new(
        Arc::clone(&provider) as Arc<dyn FetchProvider<SimulatedItem>>,
        config.registry,
    ));
    registry.configure(config.pools)?;

    let cancellation = CancellationToken::new();
    spawn_ctrl_c_handler(cancellation.clone());
    spawn_update_logger(&registry, cancellation.clone());

    let sweeper = registry.start();
    let consumed = consume_loop(&registry, &args, &cancellation).await;

    cancellation.cancel();
    registry.shutdown();
    if let Err(e) = sweeper.await {
        debug!(error = %e, "Sweeper task ended abnormally");
    }

    println!();
    println!(
        "Simulation finished: {} fetches issued, {} items consumed",
        provider.requests(),
        consumed
    );
    for snapshot in registry.snapshots() {
        println!("  {}", snapshot);
    }
    Ok(())
}

/// Consume one item from every pool each `consume_every` until the run ends.
///
/// Returns the number of items consumed.
async fn consume_loop(
    registry: &PoolRegistry<SimulatedItem>,
    args: &SimulateArgs,
    cancellation: &CancellationToken,
) -> u64 {
    let deadline = tokio::time::sleep(args.duration);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(args.consume_every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    let keys = registry.keys();
    let mut consumed = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                info!("Simulation interrupted");
                break;
            }

            _ = &mut deadline => {
                info!("Simulation duration elapsed");
                break;
            }

            _ = ticker.tick() => {
                for key in &keys {
                    match registry.consume(key.as_str()) {
                        Some(item) => {
                            consumed += 1;
                            info!(key = %key, unit = %item.unit_id, serial = item.serial, "Consumed item");
                        }
                        None => info!(key = %key, "Pool empty"),
                    }
                }
            }
        }
    }
    consumed
}

fn spawn_ctrl_c_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancellation.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    cancellation.cancel();
                }
            }
        }
    });
}

fn spawn_update_logger(registry: &PoolRegistry<SimulatedItem>, cancellation: CancellationToken) {
    let mut updates = registry.subscribe_channel();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                result = updates.recv() => match result {
                    Ok(update) => debug!(key = %update.key, "Pool updated"),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(n)) => trace!("Update logger lagged by {} events", n),
                },
            }
        }
    });
}
