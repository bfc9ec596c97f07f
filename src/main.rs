use std::env;

use calbridge::Config;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::{Command, Session, parse_command, usage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let command = match parse_command(env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", usage());
            return Ok(());
        }
    };

    if command == Command::Help {
        println!("{}", usage());
        return Ok(());
    }

    let mut session = Session::open().inspect_err(|e| {
        tracing::error!("Failed to open calendar: {:#}", e);
    })?;

    session.run(command).await.inspect_err(|e| {
        tracing::error!("Command failed: {:#}", e);
    })?;

    Ok(())
}

fn setup_logging() {
    let log_dir = Config::config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "calbridge.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("calbridge started");
}
