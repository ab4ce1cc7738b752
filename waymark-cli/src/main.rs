//! Waymark CLI - scripted navigation simulation
//!
//! Drives the waymark core end to end against simulated positioning feeds
//! and a scripted routing engine, logging every state transition. Useful for
//! eyeballing the session behavior without a device.

mod scenario;

use clap::Parser;
use std::process;

use waymark::logging;
use waymark::routing::RouterKind;

use scenario::ScenarioConfig;

#[derive(Parser)]
#[command(name = "waymark")]
#[command(about = "Run a scripted navigation session against simulated feeds", long_about = None)]
#[command(version = waymark::VERSION)]
struct Args {
    /// Start latitude in decimal degrees
    #[arg(long, default_value_t = 53.5503)]
    from_lat: f64,

    /// Start longitude in decimal degrees
    #[arg(long, default_value_t = 9.9937)]
    from_lon: f64,

    /// Destination latitude in decimal degrees
    #[arg(long, default_value_t = 53.5630)]
    to_lat: f64,

    /// Destination longitude in decimal degrees
    #[arg(long, default_value_t = 10.0000)]
    to_lon: f64,

    /// Router kind (vehicle, pedestrian, bicycle, transit)
    #[arg(long, default_value = "vehicle")]
    router: String,

    /// Number of simulated fixes along the drive
    #[arg(long, default_value_t = 12)]
    steps: usize,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let Some(router) = RouterKind::from_str(&args.router) else {
        eprintln!("Error: unknown router kind '{}'", args.router);
        process::exit(1);
    };

    if args.steps == 0 {
        eprintln!("Error: at least one simulation step is required");
        process::exit(1);
    }

    let _guard = match logging::init_logging(&args.log_dir, logging::default_log_file()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let config = ScenarioConfig {
        from: (args.from_lat, args.from_lon),
        to: (args.to_lat, args.to_lon),
        router,
        steps: args.steps,
    };

    if !scenario::run(config).await {
        eprintln!("Error: scenario did not reach completion");
        process::exit(1);
    }
}
