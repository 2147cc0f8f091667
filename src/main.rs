use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use pomf_uploader::config::{self, Settings, UploadConfig, UPLOADER_TYPE, URL_SETTING};
use pomf_uploader::security::InputValidator;
use pomf_uploader::uploader::{build_http_client, EventReceiver, UploadClient, UploadEvent};

#[derive(Parser, Debug)]
#[command(name = "pomf-uploader", about = "Upload files to pomf-compatible hosts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a base URL hosts a pomf upload endpoint
    Verify { base_url: String },

    /// Verify a base URL and save it as the uploader URL
    SetUrl { base_url: String },

    /// Upload files to the saved uploader URL, one at a time
    Upload {
        #[arg(required = true)]
        files: Vec<String>,
    },
}

enum Finished {
    Uploaded,
    Failed,
    Cancelled,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = config::load_settings().context("Loading settings")?;

    // RUST_LOG takes precedence over the configured level
    env_logger::Builder::new()
        .filter_level(settings.log_level_filter())
        .parse_default_env()
        .init();

    match cli.command {
        Command::Verify { base_url } => verify(&settings, &base_url).await,
        Command::SetUrl { base_url } => set_url(settings, &base_url).await,
        Command::Upload { files } => upload_files(&settings, &files).await,
    }
}

async fn verify(settings: &Settings, base_url: &str) -> anyhow::Result<ExitCode> {
    let http = build_http_client(settings.request_timeout())?;
    let (client, _events) = UploadClient::new(
        UploadConfig::from_settings(settings),
        http,
        Handle::current(),
    );

    if client.verify(base_url).await {
        println!("{} is a pomf upload host", base_url);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} is not a pomf upload host", base_url);
        Ok(ExitCode::FAILURE)
    }
}

async fn set_url(mut settings: Settings, base_url: &str) -> anyhow::Result<ExitCode> {
    InputValidator::validate_uploader_url(base_url)?;

    let http = build_http_client(settings.request_timeout())?;
    let (client, _events) = UploadClient::new(
        UploadConfig::from_settings(&settings),
        http,
        Handle::current(),
    );

    if !client.verify(base_url).await {
        bail!("{} did not answer like a pomf upload host", base_url);
    }

    settings.set_uploader_setting(
        UPLOADER_TYPE,
        URL_SETTING,
        serde_json::Value::String(base_url.trim().to_string()),
    );
    config::save_settings(&settings).context("Saving settings")?;

    println!("Uploader URL set to {}", base_url.trim());
    Ok(ExitCode::SUCCESS)
}

async fn upload_files(settings: &Settings, files: &[String]) -> anyhow::Result<ExitCode> {
    let http = build_http_client(settings.request_timeout())?;
    let (client, mut events) = UploadClient::new(
        UploadConfig::from_settings(settings),
        http,
        Handle::current(),
    );

    let mut failures = 0;

    // One Ctrl-C listener for the whole run, so a signal between events is kept
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for file in files {
        let handle = client.upload(file);

        match wait_for_result(&client, &mut events, handle, &mut ctrl_c).await {
            Finished::Uploaded => {}
            Finished::Failed => failures += 1,
            Finished::Cancelled => {
                eprintln!("Upload of {} cancelled", file);
                return Ok(ExitCode::from(130));
            }
        }
    }

    if failures > 0 {
        log::warn!("{} of {} uploads failed", failures, files.len());
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn wait_for_result<F>(
    client: &UploadClient,
    events: &mut EventReceiver,
    mut handle: Option<JoinHandle<()>>,
    ctrl_c: &mut std::pin::Pin<&mut F>,
) -> Finished
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(UploadEvent::Progress { file_path, percent }) => {
                    eprint!("\r{}: {:>3}%", file_path, percent);
                    let _ = std::io::stderr().flush();
                }
                Some(UploadEvent::Uploaded { file_path, url, .. }) => {
                    eprintln!();
                    println!("{} -> {}", file_path, url);
                    return Finished::Uploaded;
                }
                Some(UploadEvent::Error { kind, message, file_path }) => {
                    eprintln!();
                    eprintln!("{}: {} ({})", file_path, message, kind);
                    return Finished::Failed;
                }
                None => return Finished::Failed,
            },
            _ = ctrl_c.as_mut() => {
                client.cancel();
                if let Some(handle) = handle.take() {
                    if let Err(e) = handle.await {
                        log::warn!("Cancelled upload task ended abnormally: {}", e);
                    }
                }
                eprintln!();
                return Finished::Cancelled;
            }
        }
    }
}
