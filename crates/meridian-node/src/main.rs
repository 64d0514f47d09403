use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use meridian_node::clock::MonotonicClock;
use meridian_node::{Node, NodeConfig, NodeInfo};
use meridian_media::UdpMedia;
use meridian_transport::FixedArena;

#[derive(Parser)]
#[command(name = "meridian-node", about = "Meridian bus node")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/meridian/config.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        meridian_node::logging::init_json(&config.logging.level);
    } else {
        meridian_node::logging::init(&config.logging.level);
    }

    let Some(udp) = config.media.udp.clone() else {
        tracing::error!("no [media.udp] section configured");
        return ExitCode::FAILURE;
    };
    let media_config = match udp.to_media_config(config.node.mtu) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("invalid media configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut media = match UdpMedia::open(media_config) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("failed to open media: {e}");
            return ExitCode::FAILURE;
        }
    };

    let info = match NodeInfo::new(config.node.product_name.clone()) {
        Ok(i) => i,
        Err(e) => {
            tracing::error!("invalid node identity: {e}");
            return ExitCode::FAILURE;
        }
    };

    let arena = FixedArena::new(config.node.arena_bytes);
    let mut node = match Node::new(&config, info, MonotonicClock::new(), arena) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("failed to build node: {e}");
            return ExitCode::FAILURE;
        }
    };

    // The loop only returns on a fatal media error.
    match node.run(&mut media) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("node loop terminated: {e}");
            ExitCode::FAILURE
        }
    }
}
