mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, ProgressAction, ViewsAction},
    commands::{CommandExecutor, PlayOptions},
    config::AppConfig,
    error::Result,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.command.output_format();
    let result = run(args).await;

    if let Err(e) = result {
        match output_format {
            Some(format) if format.is_json() => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": e.to_string(),
                });
                println!("{error_json}");
            }
            _ => {
                error!("Application error: {}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {}", e);
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    #[cfg(feature = "colored-output")]
    {
        if args.no_color {
            colored::control::set_override(false);
        }
    }

    let config = AppConfig::load(args.config.as_deref())?;
    let executor = CommandExecutor::new(config, !args.no_color);

    match args.command {
        Commands::Resolve { urls, output } => {
            executor.resolve_urls(&urls, &output)?;
        }

        Commands::Platforms { output } => {
            executor.list_platforms(&output)?;
        }

        Commands::Play {
            url,
            video_id,
            viewer,
            start,
            resume,
            rate,
            max_bandwidth,
            dry_run,
            output,
        } => {
            executor
                .play(PlayOptions {
                    url,
                    video_id,
                    viewer,
                    start,
                    resume,
                    rate,
                    max_bandwidth,
                    dry_run,
                    output,
                })
                .await?;
        }

        Commands::Progress { action } => match action {
            ProgressAction::Show {
                video_ids,
                viewer,
                output,
            } => {
                executor.show_progress(&video_ids, viewer, &output).await?;
            }
            ProgressAction::Reset { video_id, viewer } => {
                executor.reset_progress(&video_id, viewer).await?;
            }
            ProgressAction::Complete { video_id, viewer } => {
                executor.complete_progress(&video_id, viewer).await?;
            }
            ProgressAction::Clear { viewer, yes } => {
                executor.clear_progress(viewer, yes).await?;
            }
        },

        Commands::Views { action } => match action {
            ViewsAction::Register { video_id, viewer } => {
                executor.register_view(&video_id, viewer).await?;
            }
            ViewsAction::Count { video_id, output } => {
                executor.count_views(&video_id, &output).await?;
            }
        },

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }

        Commands::Config { show, reset } => {
            if reset {
                AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults");
            } else if show {
                let config = AppConfig::load(args.config.as_deref())?;
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
    Ok(())
}
