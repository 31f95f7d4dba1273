use std::process::ExitCode;

use anyhow::{Context, Error};
use delivery_validator::{
    config::{OutputFormat, Settings, ValidatorArgs},
    context::build_reader,
    validation::validate,
};
use envconfig::Envconfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// stdout is reserved for the report, logs go to stderr
fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(log_layer).init();
}

async fn run() -> Result<(), Error> {
    let config = ValidatorArgs::parse_args(std::env::args_os())?.validate()?;
    let settings = Settings::init_from_env().context("Invalid validator settings")?;

    let mut reader = build_reader(&config.target, &settings).await?;
    let report = validate(reader.as_mut(), config.input_records, &config.log_delay)
        .await
        .context("Validation aborted")?;

    let mut stdout = std::io::stdout().lock();
    match config.output {
        OutputFormat::Text => report.write_text(&mut stdout)?,
        OutputFormat::Json => report.write_json(&mut stdout)?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    setup_tracing();
    info!("Starting delivery validation");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[TEST FAILURE] {e:#}");
            ExitCode::FAILURE
        }
    }
}
