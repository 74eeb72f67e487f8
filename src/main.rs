use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use charnn::commands::{train, TrainArgs};

#[derive(Parser)]
#[command(name = "charnn")]
#[command(version)]
#[command(about = "Byte-level recurrent language model (GRU / LSTM / mLSTM)")]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // First Ctrl-C ends the current epoch after its batch; the epoch is
    // still evaluated and saved.
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    match train::execute(&cli.train, &interrupt) {
        Ok(saved) => {
            for path in saved {
                tracing::info!("Saved {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
