#![warn(unused_qualifications)]

pub mod run;
pub mod scenario;

use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Error,
    bail,
};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

fn main() -> Result<(), Error> {
    let _ = dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run { scenario, restart } => {
            let scenario = Scenario::load(&scenario)?;
            run::run(&scenario, restart.as_deref())?;
        }
        Command::Tiles { scenario, format } => {
            let scenario = Scenario::load(&scenario)?;
            run::print_tiles(&scenario, &format)?;
        }
        Command::DumpDefaultConfig { output, format } => {
            let scenario = Scenario::default();
            let scenario = match format.as_str() {
                "toml" => toml::to_string_pretty(&scenario)?,
                "json" => serde_json::to_string_pretty(&scenario)?,
                _ => bail!("Invalid format: {format}"),
            };
            if let Some(output) = &output {
                std::fs::write(output, &scenario)?;
            }
            else {
                println!("{scenario}");
            }
        }
    }

    Ok(())
}

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Builds the layer and runs exchange steps with a pulse in the interior.
    Run {
        scenario: PathBuf,

        /// Restart the layer from a checkpoint with this prefix.
        #[clap(long)]
        restart: Option<PathBuf>,
    },
    /// Prints the tiles of the layer.
    Tiles {
        scenario: PathBuf,
        #[clap(short, long, default_value = "text")]
        format: String,
    },
    DumpDefaultConfig {
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(short, long, default_value = "toml")]
        format: String,
    },
}
