use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use worker_factory::config::ConsoleConfig;
use worker_factory::console::Console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsoleConfig::from_env();

    // Logs go to stderr so they stay out of the console output on stdout.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "worker-factory.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    config.validate()?;

    eprintln!("🏭 Worker Factory v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.base_url);
    eprintln!("   Refresh: every {}s", config.poll_interval.as_secs());
    eprintln!("   Session: {}", config.session_file.display());
    if let Some(dir) = &config.log_dir {
        eprintln!("   Log dir: {}", dir.display());
    }
    eprintln!("   Type /help for commands. /quit to exit.\n");

    let console = Console::from_config(&config).await?;
    console.run().await?;

    Ok(())
}
