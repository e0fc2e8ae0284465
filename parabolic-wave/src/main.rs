use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parabolic_wave::{Config, DataExporter, DualParabolicSimulation, FieldVisualiser};

/// Acoustic FDTD simulation between two confocal parabolic reflectors
#[derive(Parser)]
#[command(name = "parabolic-wave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (reference setup when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of time steps, overriding the configuration
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Output directory for snapshots and frames
    #[arg(short, long)]
    output: Option<String>,

    /// Write flat-file snapshots and metadata
    #[arg(long)]
    export: bool,

    /// Render PNG frames of the displacement
    #[arg(long)]
    frames: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let mut config = Config::default();
            config.validate()?;
            config
        }
    };

    if let Some(steps) = cli.steps {
        if steps == 0 {
            return Err(anyhow!("--steps must be positive"));
        }
        config.simulation.steps = steps;
    }
    if let Some(dir) = &cli.output {
        config.output.directory = dir.clone();
    }
    config.output.export |= cli.export;
    config.output.frames |= cli.frames;

    Ok(config)
}

fn capture(
    simulation: &DualParabolicSimulation,
    exporter: Option<&mut DataExporter>,
    visualiser: Option<&FieldVisualiser>,
) -> Result<()> {
    if let Some(exporter) = exporter {
        exporter.capture(simulation)?;
    }
    if let Some(visualiser) = visualiser {
        visualiser.plot_field(
            simulation.displacement(),
            simulation.materials(),
            simulation.steps(),
        )?;
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    config.print_summary();

    let mut simulation = DualParabolicSimulation::from_config(&config)?;
    let steps = config.simulation.steps;
    let interval = config.output.capture_interval;

    let mut exporter = if config.output.export {
        Some(DataExporter::new(&config.output.directory, interval)?)
    } else {
        None
    };
    let visualiser = if config.output.frames {
        let dir = Path::new(&config.output.directory).join("frames");
        Some(FieldVisualiser::new(
            dir,
            config.output.image_width,
            config.output.image_height,
        )?)
    } else {
        None
    };

    if let Some(exporter) = &exporter {
        exporter.write_materials(&simulation)?;
    }

    info!("Starting simulation...");
    capture(&simulation, exporter.as_mut(), visualiser.as_ref())?;

    let report_every = (steps / config.simulation.report_period).max(1);
    for step in 1..=steps {
        simulation.update();

        if step % interval == 0 {
            capture(&simulation, exporter.as_mut(), visualiser.as_ref())?;
        }

        if step % report_every == 0 {
            let field = simulation.field();
            if !field.is_finite() {
                bail!(
                    "Field diverged at step {} (dt={:e} s, stable limit {:e} s)",
                    step,
                    simulation.time_step(),
                    simulation.stable_time_step()
                );
            }
            info!(
                max_abs = field.max_abs(),
                energy = field.energy(),
                "Step {}/{} (t={:.4e}s)",
                step,
                steps,
                simulation.time()
            );
        }
    }

    if let Some(exporter) = &exporter {
        let metadata = exporter.write_metadata(&simulation)?;
        info!(
            "Exported {} snapshot(s) and {}",
            exporter.captures(),
            metadata.display()
        );
    }
    if visualiser.is_some() {
        info!("Frames saved to {}/frames", config.output.directory);
    }
    info!("Simulation complete!");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
