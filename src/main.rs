use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use voxloop::app::{self, ConversationOptions};
use voxloop::audio::capture::suppress_audio_warnings;
use voxloop::cli::{Cli, Commands};
use voxloop::error::VoxError;
use voxloop::logging;
use voxloop::pipeline::{AudioInRequest, AudioOutRequest};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose);
    tracing::debug!(version = %voxloop::version_string(), "Starting voxloop");

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// Print `error[CODE]: message` for library errors, the full chain otherwise.
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<VoxError>() {
        Some(vox) => eprintln!("{}: {}", format!("error[{}]", vox.code()).red().bold(), vox),
        None => eprintln!("{}: {:#}", "error".red().bold(), err),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "voxloop", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }
    if let Commands::Devices = cli.command {
        suppress_audio_warnings();
        app::run_devices()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = app::load_config(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.audio.device = Some(device);
    }
    let base_dir = std::env::current_dir().context("Failed to read working directory")?;
    let store = app::build_store(&config, &base_dir);

    match cli.command {
        Commands::AudioIn {
            file,
            duration,
            model,
            language,
            output,
            save_transcript,
        } => {
            suppress_audio_warnings();
            let request = AudioInRequest {
                audio_path: file,
                duration: Duration::from_secs(
                    duration.unwrap_or(config.conversation.duration_secs),
                ),
                model_hint: model,
                language_hint: language,
                output_path: output,
                save_transcript,
            };
            app::run_audio_in(&config, store, request, cli.quiet).await?;
        }
        Commands::AudioOut {
            data_source,
            output,
            no_play,
            return_text_output,
            no_latest,
            voice,
        } => {
            let request = AudioOutRequest {
                data_source,
                output_path: output,
                play_audio: !no_play,
                return_text_output,
                use_latest_transcript: !no_latest,
                voice: voice.or_else(|| config.tts.voice.clone()),
            };
            app::run_audio_out(&config, store, request, cli.quiet).await?;
        }
        Commands::Conversation {
            turns,
            duration,
            wait,
            model,
            language,
            speak_first,
            json,
        } => {
            suppress_audio_warnings();
            let options = ConversationOptions {
                turns,
                duration_secs: duration,
                wait,
                model,
                language,
                speak_first,
            };

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nStopping after the current phase...");
                    on_signal.cancel();
                }
            });

            let report =
                app::run_conversation(config, store, &options, cancel, json, cli.quiet).await?;
            if report.cancelled {
                return Ok(ExitCode::from(130));
            }
        }
        Commands::Latest => {
            app::run_latest(&store)?;
        }
        Commands::Completions { .. } | Commands::Devices => {}
    }

    Ok(ExitCode::SUCCESS)
}
