//! RhythMC pack builder - command line entry point.
//!
//! Loads the config, wires the ffmpeg engine and HTTP uploader into an
//! orchestrator and runs one job. Job log lines go to stderr; the
//! identifier is the only thing written to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;

use rhythmc_core::config::{ConfigManager, ConfigSection, Settings};
use rhythmc_core::engine::FfmpegEngine;
use rhythmc_core::identifier;
use rhythmc_core::logging::{init_tracing, LogLevel};
use rhythmc_core::models::JobRequest;
use rhythmc_core::orchestrator::Orchestrator;
use rhythmc_core::upload::{HttpUploader, PackUploader};

mod cli;

use cli::{BuildArgs, Cli, Command, ConfigCommand};

/// `.config/rhythmc.toml` in the working directory when present, otherwise
/// the per-user config directory.
fn default_config_path() -> PathBuf {
    let local = PathBuf::from(".config").join("rhythmc.toml");
    if local.exists() {
        return local;
    }
    directories::ProjectDirs::from("", "", "rhythmc")
        .map(|dirs| dirs.config_dir().join("rhythmc.toml"))
        .unwrap_or(local)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn });

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = ConfigManager::new(&config_path);
    config
        .load_or_create()
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    tracing::debug!("Config: {}", config_path.display());
    tracing::debug!("Core version: {}", rhythmc_core::version());

    if cli.verbose {
        let logging = &mut config.settings_mut().logging;
        logging.level = LogLevel::Debug;
        logging.compact = false;
    }

    match cli.command {
        Command::Build(args) => {
            config
                .ensure_dirs_exist()
                .context("Failed to create working directories")?;
            build(config.settings().clone(), args).await
        }
        Command::Verify { access_key } => {
            let uploader = HttpUploader::from_settings(&config.settings().backend)?;
            uploader
                .verify(access_key.trim())
                .await
                .context("Access key check failed")?;
            eprintln!("Access key accepted by {}", uploader.base_url());
            Ok(ExitCode::SUCCESS)
        }
        Command::Decode { identifier: id, schema } => {
            let schema = schema.unwrap_or(config.settings().identifier.schema);
            let decoded = identifier::decode(schema, &id)?;
            println!("hash:     {}", decoded.hash);
            println!("ticks:    {}", decoded.duration_ticks);
            println!("song:     {}", decoded.song_name);
            if let Some(composer) = decoded.composer_name {
                println!("composer: {}", composer);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config(command) => {
            edit_config(&mut config, command)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn build(mut settings: Settings, args: BuildArgs) -> Result<ExitCode> {
    if args.no_upload {
        settings.backend.upload = false;
    }
    if args.keep_work_dir {
        settings.paths.keep_work_dir = true;
    }

    let mut request = JobRequest::new(&args.audio, args.song, args.composer);
    if let Some(path) = &args.thumbnail {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read thumbnail {}", path.display()))?;
        request = request.with_thumbnail(Bytes::from(data));
    }
    if let Some(key) = args.access_key {
        request = request.with_access_key(key);
    }
    if let Some(dir) = args.save_archives {
        let dir = dir.unwrap_or_else(|| PathBuf::from(&settings.paths.output_folder));
        request = request.with_export_dir(dir);
    }

    let uploader = if settings.backend.upload {
        let http = HttpUploader::from_settings(&settings.backend)?;
        Some(Arc::new(http) as Arc<dyn PackUploader>)
    } else {
        None
    };
    let engine = Arc::new(FfmpegEngine::new(settings.engine.clone()));

    let orchestrator = Orchestrator::new(settings, engine, uploader)
        .with_log_callback(Arc::new(|line: &str| eprintln!("{}", line)));

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current step...");
            cancel.cancel();
        }
    });

    let result = orchestrator.submit(request).await;

    if !result.success {
        let message = result.error.unwrap_or_else(|| "Job failed".to_string());
        eprintln!("Error: {}", message);
        if let Some(log) = &result.log_path {
            eprintln!("Log: {}", log.display());
        }
        return Ok(ExitCode::FAILURE);
    }

    for path in &result.saved_archives {
        eprintln!("Saved {}", path.display());
    }
    match &result.identifier {
        Some(id) => println!("{}", id),
        None => eprintln!("Upload skipped; no identifier produced"),
    }
    Ok(ExitCode::SUCCESS)
}

fn edit_config(config: &mut ConfigManager, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("# {}", config.path().display());
            print!("{}", toml::to_string_pretty(config.settings())?);
        }
        ConfigCommand::SetBackend { url } => {
            let url = url.trim().trim_end_matches('/').to_string();
            HttpUploader::new(&url, None)?;
            config.settings_mut().backend.base_url = url;
            config.update_section(ConfigSection::Backend)?;
            eprintln!("Backend set to {}", config.settings().backend.base_url);
        }
        ConfigCommand::SetSchema { schema } => {
            config.settings_mut().identifier.schema = schema;
            config.update_section(ConfigSection::Identifier)?;
            eprintln!("Identifier schema set to {}", schema);
        }
    }
    Ok(())
}
