#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;
use roundtrip::RoundTrip;

/// Round trip mail delivery latency monitor
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file, overrides `ROUNDTRIP_CONFIG` and the default locations
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run with the built in defaults when no configuration file is found
    #[arg(long)]
    defaults: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let roundtrip = match args.config.map_or_else(find_config_file, Ok) {
        Ok(config_path) => {
            let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to read config from {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            RoundTrip::from_ron(&config_content).map_err(|e| {
                anyhow::anyhow!("Invalid config in {}: {}", config_path.display(), e)
            })?
        }
        Err(_) if args.defaults => RoundTrip::default(),
        Err(e) => return Err(e),
    };

    roundtrip.run().await
}

/// Find the configuration file using the following precedence:
/// 1. `ROUNDTRIP_CONFIG` environment variable
/// 2. ./roundtrip.config.ron (current working directory)
/// 3. /etc/roundtrip/roundtrip.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("ROUNDTRIP_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "ROUNDTRIP_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./roundtrip.config.ron"),
        PathBuf::from("/etc/roundtrip/roundtrip.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found (pass --defaults to run without one). Tried:\n  - ROUNDTRIP_CONFIG environment variable\n{paths_tried}"
    )
}
