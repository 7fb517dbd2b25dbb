//! `breakerctl`: operator CLI for dependency breakers.
//!
//! ```text
//!     config.toml ──▶ validate
//!                         │
//!     state store ◀───────┼──── list / inspect / reset
//!          ▲              │
//!          └──── simulate (registry + health monitor + hot reload)
//! ```
//!
//! `list`, `inspect` and `reset` work against the configured store, so with
//! the file backend they see the state written by every process sharing the
//! directory.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dependency_breaker::config::{load_config, BreakerSettings};
use dependency_breaker::health::HealthReporter;
use dependency_breaker::lifecycle::{self, Shutdown};
use dependency_breaker::observability::logging;
use dependency_breaker::resilience::{BreakerMetricsView, SystemClock};
use dependency_breaker::store::{open_store, StateStore};

#[derive(Parser)]
#[command(name = "breakerctl")]
#[command(about = "Inspect and exercise dependency circuit breakers", long_about = None)]
struct Cli {
    /// Breaker configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the effective settings
    Validate,
    /// List breakers with stored state
    List,
    /// Show stored metrics and health of one breaker
    Inspect { name: String },
    /// Force a breaker closed and clear its counters
    Reset { name: String },
    /// Drive a breaker with a dependency that goes down for a while
    Simulate {
        #[arg(long, default_value = "demo-dependency")]
        name: String,
        /// Total calls to make
        #[arg(long, default_value_t = 200)]
        calls: u64,
        /// Pause between calls
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// First call of the outage window
        #[arg(long, default_value_t = 20)]
        outage_start: u64,
        /// Length of the outage window, in calls
        #[arg(long, default_value_t = 60)]
        outage_calls: u64,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("simulated dependency outage")]
struct SimulatedOutage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = read_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate => {
            println!("{}", toml::to_string_pretty(&settings)?);
            eprintln!("Configuration is valid");
        }
        Commands::List => {
            logging::init_logging(&settings.observability);
            let store = open_store(&settings.store, Arc::new(SystemClock));
            let reporter = HealthReporter::from(&settings.health);
            let mut rows = Vec::new();
            for name in store.names().await? {
                if let Some(view) = stored_view(store.as_ref(), &name).await? {
                    rows.push(json!({
                        "name": name,
                        "state": view.state,
                        "health": reporter.health_of(&view).status,
                        "total_requests": view.total_requests,
                        "success_rate": view.success_rate,
                    }));
                }
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Inspect { name } => {
            logging::init_logging(&settings.observability);
            let store = open_store(&settings.store, Arc::new(SystemClock));
            match stored_view(store.as_ref(), &name).await? {
                Some(view) => {
                    let health = HealthReporter::from(&settings.health).health_of(&view);
                    let out = json!({ "metrics": view, "health": health });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                None => {
                    eprintln!("No stored state for breaker '{}'", name);
                    std::process::exit(1);
                }
            }
        }
        Commands::Reset { name } => {
            let registry = lifecycle::bootstrap(settings);
            let breaker = registry.breaker(&name);
            breaker.refresh().await;
            breaker.reset().await?;
            println!("Breaker '{}' reset to closed", name);
        }
        Commands::Simulate {
            name,
            calls,
            interval_ms,
            outage_start,
            outage_calls,
        } => {
            let registry = lifecycle::bootstrap(settings);
            let shutdown = Shutdown::new();
            let (tasks, _watcher) =
                lifecycle::spawn_background(registry.clone(), &shutdown, cli.config.as_deref());

            let breaker = registry.breaker(&name);
            let outage = outage_start..outage_start.saturating_add(outage_calls);

            let drive = async {
                for i in 0..calls {
                    let failing = outage.contains(&i);
                    let result = breaker
                        .call(|| async move {
                            if failing {
                                Err(SimulatedOutage)
                            } else {
                                Ok(i)
                            }
                        })
                        .await;
                    match result {
                        Ok(_) => tracing::debug!(call = i, "Call succeeded"),
                        Err(e) => tracing::debug!(call = i, error = %e, "Call failed"),
                    }
                    tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                }
            };

            tokio::select! {
                _ = drive => tracing::info!("Simulation finished"),
                _ = lifecycle::wait_for_signal() => tracing::info!("Simulation interrupted"),
            }

            shutdown
                .drain(&registry, registry.settings().store.timeout() * 4)
                .await;
            for task in tasks {
                let _ = task.await;
            }

            println!("{}", serde_json::to_string_pretty(&registry.all_metrics())?);
        }
    }

    Ok(())
}

fn read_settings(path: Option<&Path>) -> Result<BreakerSettings, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(BreakerSettings::default()),
    }
}

async fn stored_view(
    store: &dyn StateStore,
    name: &str,
) -> Result<Option<BreakerMetricsView>, Box<dyn std::error::Error>> {
    let snapshot = store.load(name).await?;
    Ok(snapshot.map(|s| BreakerMetricsView::from_core(name, &s.into_core())))
}
