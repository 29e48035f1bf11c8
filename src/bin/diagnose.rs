//! diagnose: analyze one crop photo from the command line.
//! Run with: cargo run --bin diagnose -- <image_path> [--note "..."] [--json]

use agridoc::{
    core::config::{level_directive, Config},
    orchestration::{DiagnosisPipeline, DiagnosisSession},
    utils::read_image_file,
};

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diagnose")]
#[command(version, about = "Identify crop disease from a photo")]
struct Cli {
    /// Image file (JPEG, PNG, WebP, ...)
    image: PathBuf,

    /// Extra context for the model, e.g. "Leaves turned yellow after rain"
    #[arg(short, long, default_value = "")]
    note: String,

    /// Print the view as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Arc::new(Config::new()?);

    // Logs go to stderr so stdout stays parseable with --json
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "agridoc={}",
            level_directive(config.log_level())
        )))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let pipeline = Arc::new(DiagnosisPipeline::from_config(config, None)?);
    let session = DiagnosisSession::new(pipeline);

    let file = read_image_file(&cli.image).await?;
    let view = match session.on_file_selected(file) {
        Some(rejection) => rejection,
        None => {
            session.set_note(cli.note);
            session.on_generate().await
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", view.to_text());
    }

    Ok(if view.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
