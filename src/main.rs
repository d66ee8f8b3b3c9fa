use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    thread,
    time::Duration,
};
use towersim::persona::ActivityKind;
use towersim::resident::Status;
use towersim::{Config, Engine, Runtime, RuntimeError, Snapshot};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML configuration file; the bundled Optima Signature tower if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured random seed.
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate whole days and summarize them.
    Run {
        #[arg(long, default_value_t = 1)]
        days: u32,

        /// Write hourly snapshots to this file, MessagePack encoded.
        #[arg(long)]
        trajectory: Option<PathBuf>,

        /// Number of recent events to print.
        #[arg(long, default_value_t = 10)]
        events: usize,
    },

    /// Run the background loop in real time for a while.
    Watch {
        #[arg(long, default_value = "fast")]
        speed: String,

        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },

    /// Check the configuration and report persona warnings.
    Validate,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut cfg = match &args.config {
        Some(file) => Config::from_file(file)?,
        None => Config::builtin()?,
    };
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }

    match args.command {
        Command::Run {
            days,
            trajectory,
            events,
        } => run_days(cfg, days, trajectory, events)?,
        Command::Watch { speed, seconds } => watch(cfg, &speed, seconds)?,
        Command::Validate => validate(cfg)?,
    }

    Ok(())
}

fn run_days(cfg: Config, days: u32, trajectory: Option<PathBuf>, n_events: usize) -> Result<()> {
    let mut engine = Engine::new(cfg).context("failed to create engine")?;

    let mut writer = match &trajectory {
        Some(file) => {
            let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    engine.run_days(days, |snapshot| {
        log::info!("{}", hourly_breakdown(snapshot));
        if let Some(writer) = writer.as_mut() {
            encode::write(writer, snapshot).context("failed to serialize snapshot")?;
        }
        Ok(())
    })?;

    if let Some(mut writer) = writer {
        writer.flush().context("failed to flush writer stream")?;
    }

    let snapshot = engine.snapshot();
    println!(
        "{} after {} day(s): {} residents, {} boardings, {} crowding events today",
        snapshot.building.name,
        days,
        snapshot.residents.len(),
        snapshot.day_stats.boardings,
        snapshot.day_stats.crowding_events,
    );
    println!("busiest amenities:");
    for (name, count) in snapshot.busiest_amenities().into_iter().take(5) {
        println!("  {name:<24} {count:>4}");
    }
    println!("recent events:");
    for event in engine.events().recent(n_events) {
        println!(
            "  {} {:<20} {} @ {}",
            event.clock,
            event.resident_name.as_deref().unwrap_or("-"),
            event.description,
            event.location
        );
    }

    Ok(())
}

fn watch(cfg: Config, speed: &str, seconds: u64) -> Result<()> {
    let engine = Engine::new(cfg).context("failed to create engine")?;
    let mut runtime = Runtime::new(engine);
    runtime.set_speed(speed)?;
    runtime.start()?;

    for _ in 0..seconds {
        thread::sleep(Duration::from_secs(1));
        match runtime.get_snapshot() {
            Ok(snapshot) => log::info!("{}", hourly_breakdown(&snapshot)),
            Err(RuntimeError::NotReady) => log::info!("waiting for the first tick"),
            Err(error) => return Err(error.into()),
        }
    }

    runtime.stop()?;
    Ok(())
}

fn validate(cfg: Config) -> Result<()> {
    let engine = Engine::new(cfg).context("failed to create engine")?;
    let building = engine.building();
    let title = match building.address() {
        "" => building.name().to_string(),
        address => format!("{}, {address}", building.name()),
    };
    println!(
        "{title}: {} floors, {} units, {} amenities, {} residents, {} personas",
        building.floors().len(),
        building.units().len(),
        building.amenities().len(),
        engine.residents().len(),
        engine.catalog().personas().len(),
    );
    let warnings = engine.config_warnings();
    if warnings.is_empty() {
        println!("no configuration warnings");
    } else {
        for warning in warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

fn hourly_breakdown(snapshot: &Snapshot) -> String {
    format!(
        "{} | work {:>3} | amenity {:>3} | leisure {:>3} | outside {:>3} | waiting {:>3} | mood {:.2}",
        snapshot.time,
        snapshot.count(ActivityKind::Work),
        snapshot.count(ActivityKind::Amenity),
        snapshot.count(ActivityKind::Leisure),
        snapshot
            .residents
            .iter()
            .filter(|resident| resident.location == "Outside")
            .count(),
        snapshot.status_count(Status::WaitingElevator),
        mean_mood(snapshot),
    )
}

fn mean_mood(snapshot: &Snapshot) -> f64 {
    if snapshot.residents.is_empty() {
        return 0.0;
    }
    snapshot.residents.iter().map(|resident| resident.mood).sum::<f64>()
        / snapshot.residents.len() as f64
}
