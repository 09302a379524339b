use trainkit::metagraph::MetagraphRenderer;
use trainkit::run::HParams;
use trainkit::session;
use trainkit::telemetry::init_tracing;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, batch and one-hot encode a dataset, and log a summary of it
    Prepare {
        /// "mnist" (ubyte files under data/) or an image folder with a metadata.json
        #[arg(long, default_value = "mnist")]
        dataset: String,
        #[arg(long, default_value_t = 128)]
        batch_size: usize,
        #[arg(long, default_value = "runs")]
        log_dir: PathBuf,
        #[arg(long, default_value_t = 64)]
        image_size: u32, // Only used by image folders
    },
    /// Render a component graph snapshot and log it
    Metagraph {
        /// JSON array of {"name", "revenue", "weights"} components
        #[arg(long)]
        components: PathBuf,
        #[arg(long, default_value = "runs")]
        log_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        step: i64,
        #[arg(long, default_value_t = 1000)]
        size: u32,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            dataset,
            batch_size,
            log_dir,
            image_size,
        } => {
            let mut hparams = HParams {
                dataset,
                batch_size,
                log_dir,
                image_size,
                ..Default::default()
            };
            match session::prepare_run(&mut hparams) {
                Ok(run_dir) => println!("Run written to: {}", run_dir.display()),
                Err(e) => {
                    eprintln!("Error during preparation: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Metagraph {
            components,
            log_dir,
            step,
            size,
        } => {
            let hparams = HParams {
                log_dir,
                ..Default::default()
            };
            let renderer = MetagraphRenderer::new(size, size);
            match session::metagraph_run(&components, &hparams, &renderer, step) {
                Ok(path) => println!("Metagraph saved to: {}", path.display()),
                Err(e) => {
                    eprintln!("Error rendering metagraph: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
