use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jacart_console::config::ConsoleConfig;

/// On-board operator console for the autonomous shuttle cart
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file (cart name, wake word, transform, destinations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name announced to the backend
    #[arg(long)]
    cart_name: Option<String>,

    /// Word every voice command must start with
    #[arg(long)]
    wake_word: Option<String>,

    /// Log outbound messages instead of publishing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ConsoleConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error ({}): {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ConsoleConfig::default(),
    };
    if let Some(name) = args.cart_name {
        config.cart_name = name;
    }
    if let Some(word) = args.wake_word {
        config.wake_word = word;
    }

    if let Err(e) = jacart_console::runtime::run(config, args.dry_run).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
