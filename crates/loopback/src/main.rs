mod link;
mod sim;
mod world;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use sim::{Simulation, SimulationConfig};
use tickwire::config::{DEFAULT_BACKUP_COMMANDS, DEFAULT_SNAPSHOT_DEPTH};
use tickwire::{NetConfig, SnapshotConfig};

#[derive(Parser)]
#[command(name = "loopback")]
#[command(about = "Runs a client and a server against each other over a simulated lossy link")]
struct Args {
    #[arg(short, long, default_value_t = 600)]
    ticks: u32,

    #[arg(short, long, default_value_t = 5.0, help = "Packet loss percentage (0-100)")]
    loss: f32,

    #[arg(long, default_value_t = 3, help = "Maximum one-way latency in ticks")]
    latency: u32,

    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_DEPTH)]
    snapshot_depth: usize,

    #[arg(long, default_value_t = DEFAULT_BACKUP_COMMANDS, help = "Previous commands re-sent with each move")]
    backups: usize,

    #[arg(long, default_value_t = 0, help = "Ticks per level, 0 for a single level")]
    level_ticks: u32,

    #[arg(long, default_value_t = 45, help = "Longest delay between a pickup and its item spawning")]
    max_spawn_lag: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if !(0.0..=100.0).contains(&args.loss) {
        bail!("loss must be between 0 and 100, got {}", args.loss);
    }
    if args.snapshot_depth == 0 {
        bail!("snapshot depth must be at least 1");
    }

    let net = NetConfig {
        snapshot: SnapshotConfig {
            depth: args.snapshot_depth,
        },
        ..Default::default()
    }
    .with_backup_commands(args.backups);

    let mut simulation = Simulation::new(SimulationConfig {
        net,
        loss_percent: args.loss,
        max_latency: args.latency,
        seed: args.seed,
        level_ticks: args.level_ticks,
        max_spawn_lag: args.max_spawn_lag,
    });

    info!(
        "running {} ticks at {}% loss, up to {} ticks latency, seed {}",
        args.ticks, args.loss, args.latency, args.seed
    );
    for _ in 0..args.ticks {
        simulation.step();
    }
    info!("stopped at tick {}", simulation.tick());
    simulation.log_summary();

    Ok(())
}
