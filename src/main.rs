use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use ndarray::Axis;

use kite_calc::metrics::COLUMNS;
use kite_calc::{FlightLog, FlightSummary, SimConfig, Simulation, UpdateStatus};

/// Headless delta-kite flight simulation.
#[derive(Parser, Debug)]
#[command(name = "kite_sim", version, about)]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated time (s)
    #[arg(short, long, default_value_t = 20.0)]
    duration: f64,

    /// Frame timestep (s)
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Wind speed override (km/h)
    #[arg(short, long)]
    wind: Option<f64>,

    /// Constant bar input in [-1, 1], positive steers right
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    bar_rotation: f64,

    /// Print a progress line every N frames (0 disables)
    #[arg(short, long, default_value_t = 60)]
    report_every: u64,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(speed) = cli.wind {
        config.wind.speed_kmh = speed;
    }
    if !(cli.dt.is_finite() && cli.dt > 0.0) {
        return Err(format!("--dt must be positive, got {}", cli.dt).into());
    }

    let ground = config.controller.pilot_position.y;
    let mut sim = Simulation::new(config)?;
    sim.control_mut().set_rotation(cli.bar_rotation);

    println!("===================================================");
    println!("Delta Kite Flight Simulation (kite_calc {})", kite_calc::VERSION);
    println!("===================================================");
    print_setup(sim.config());

    let frames = (cli.duration.max(0.0) / cli.dt).ceil() as u64;
    info!("running {} frames of {:.4} s", frames, cli.dt);

    let mut log = FlightLog::with_ground(ground);
    for frame in 1..=frames {
        let status = sim.update(cli.dt);
        let snapshot = sim.snapshot();
        log.record(&snapshot);

        if cli.report_every > 0 && frame % cli.report_every == 0 {
            let p = snapshot.position;
            let marker = match status {
                UpdateStatus::Stepped => "",
                UpdateStatus::RolledBack(_) => "  [rolled back]",
            };
            println!(
                "t={:6.2}s  pos=({:6.2}, {:6.2}, {:7.2})  zone={:<10}  tension L/R={:6.1}/{:6.1} N{}",
                snapshot.time,
                p.x,
                p.y,
                p.z,
                snapshot.zone.to_string(),
                snapshot.tensions[0],
                snapshot.tensions[1],
                marker
            );
        }
    }

    println!();
    match log.summary(sim.faults()) {
        Ok(summary) => print_summary(&summary),
        Err(msg) => println!("No summary: {msg}"),
    }
    print_column_means(&log);

    Ok(())
}

fn print_setup(config: &SimConfig) {
    println!("Setup:");
    println!("  kite mass     = {:.3} kg", config.kite.mass);
    println!("  line length   = {:.1} m", config.lines.length);
    println!(
        "  bridles       = nose {:.2} / inter {:.2} / center {:.2} m",
        config.bridles.lengths.nose, config.bridles.lengths.inter, config.bridles.lengths.center
    );
    println!(
        "  wind          = {:.1} km/h towards {:.0}°, turbulence {:.2}",
        config.wind.speed_kmh, config.wind.direction_deg, config.wind.turbulence
    );
    println!(
        "  solver        = {} passes, {:?} control points",
        config.solver.iterations, config.solver.control_point_model
    );
    println!();
}

fn print_summary(summary: &FlightSummary) {
    println!("Flight Summary:");
    println!("  Frames:            {}", summary.frames);
    println!("  Duration:          {:.2} s", summary.duration);
    println!("  Max speed:         {:.2} m/s", summary.max_speed);
    println!("  Mean speed:        {:.2} m/s", summary.mean_speed);
    println!("  Altitude range:    {:.2} .. {:.2} m", summary.min_altitude, summary.max_altitude);
    println!("  Mean tension:      {:.2} N", summary.mean_tension);
    println!("  Max tension:       {:.2} N", summary.max_tension);
    println!("  Worst constraint:  {:.2e} m", summary.worst_constraint_error);
    println!("  Rolled-back steps: {}", summary.faults);
}

fn print_column_means(log: &FlightLog) {
    let Some(means) = log.to_array().mean_axis(Axis(0)) else {
        return;
    };
    println!();
    println!("Column means:");
    for (name, value) in COLUMNS.iter().zip(means.iter()) {
        println!("  {:<14} {:>12.4}", name, value);
    }
}
