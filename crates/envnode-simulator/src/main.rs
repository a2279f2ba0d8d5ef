//! Desktop simulator for the envnode telemetry device.
//!
//! Plays the firmware main loop against synthetic sensors: binds the sensor
//! selected by the configuration, runs the startup self-test, then performs
//! one acquisition per cycle and prints every telemetry record as JSON, the
//! way the uplink encoder would receive it.
//!
//! ```text
//! envnode-simulator --config bme280.json --cycles 5 --failure-rate 0.3
//! ```

mod sim;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use embassy_futures::block_on;
use log::{error, info, warn};

use envnode_core::{Acquisition, AnySensor, Config, MAX_VALUES_READ};

use sim::{HostDelay, SimulatedBuses, VirtualClock};

/// Upper estimate of one physical read on real hardware, for watchdog sizing.
const PER_READ_MS: u32 = 1000;

#[derive(Parser)]
#[command(name = "envnode-simulator")]
#[command(about = "Run the envnode acquisition core against simulated sensors")]
struct Cli {
    /// JSON acquisition config. Defaults to a DHT22 on GPIO4.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of telemetry cycles to run
    #[arg(long, default_value_t = 3)]
    cycles: u32,

    /// Device time between telemetry cycles, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    interval_ms: u64,

    /// Host seconds slept per simulated second (0 runs as fast as possible)
    #[arg(long, default_value_t = 0.01)]
    time_scale: f64,

    /// Probability that a single physical read fails
    #[arg(long, default_value_t = 0.2)]
    failure_rate: f64,

    /// Seed for the simulated noise, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let Some(path) = path else {
        info!("No config given, using the built-in default");
        return Ok(Config::default());
    };

    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config {}: {}", path.display(), e))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let clock = VirtualClock::default();
    let mut buses = SimulatedBuses::new(clock.clone(), cli.failure_rate, cli.seed);
    let delay = HostDelay::new(clock.clone(), cli.time_scale);

    let mut sensor = match AnySensor::from_config(&config, &mut buses, delay) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("Refusing to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Worst-case acquisition time: {} ms",
        config.sampling_policy().worst_case_latency_ms(PER_READ_MS)
    );

    block_on(sensor.init());
    if !block_on(sensor.test()) {
        warn!("{} did not respond to the self-test", sensor.name());
    }

    for cycle in 1..=cli.cycles {
        match block_on(sensor.read_values::<MAX_VALUES_READ>()) {
            Ok(acquired) => {
                if !acquired.is_complete() {
                    warn!(
                        "Cycle {}: {}/{} samples valid",
                        cycle, acquired.contributing, acquired.requested
                    );
                }
                match serde_json::to_string(&acquired.record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => error!("Cycle {}: cannot encode record: {}", cycle, e),
                }
            }
            Err(e) => warn!("Cycle {}: {}, skipping uplink", cycle, e),
        }

        if cycle < cli.cycles {
            clock.sleep(cli.interval_ms as f64 / 1e3, cli.time_scale);
        }
    }

    ExitCode::SUCCESS
}
