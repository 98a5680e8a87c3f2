use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tilecraft::{Acquired, Error, RunConfig};

#[derive(Parser)]
#[command(name = "tilecraft")]
#[command(about = "Generate tile worlds from declarative JSON specs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a world and write it as JSON
    Generate {
        #[command(flatten)]
        config: RunConfig,
    },
    /// Check a spec without generating
    Validate {
        #[command(flatten)]
        config: RunConfig,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate { config } => generate(&config),
        Commands::Validate { config } => validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate(config: &RunConfig) -> Result<(), Error> {
    let world = tilecraft::generate(config)?;

    let out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(File::create(path).map_err(|e| Error::io(path, e))?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(out);
    if config.pretty {
        serde_json::to_writer_pretty(&mut out, &world)?;
    } else {
        serde_json::to_writer(&mut out, &world)?;
    }
    writeln!(out).and_then(|_| out.flush()).map_err(|e| Error::io(output_label(config), e))?;

    if let Some(path) = &config.output {
        eprintln!("Wrote terrain JSON to {}", path.display());
    }
    Ok(())
}

fn validate(config: &RunConfig) -> Result<(), Error> {
    match tilecraft::load_spec(config)? {
        Acquired::Ready(world) => {
            println!("ok: generated world {}x{}", world.area.width, world.area.height);
        }
        Acquired::Spec(spec) => {
            let plan = tilecraft::plan(config, &spec)?;
            println!(
                "ok: {}x{} world, {} background / {} foreground tiles, {} layers, {} ops",
                spec.world.width,
                spec.world.height,
                plan.tiles.tiles.background.len(),
                plan.tiles.tiles.foreground.len(),
                plan.layer_count(),
                plan.ops.len(),
            );
        }
    }
    Ok(())
}

fn output_label(config: &RunConfig) -> std::path::PathBuf {
    config.output.clone().unwrap_or_else(|| "<stdout>".into())
}
