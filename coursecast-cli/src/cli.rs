use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "coursecast",
    version,
    about = "Resolve course video links, play them headlessly and sync watch progress"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "COURSECAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one or more video URLs to embed and thumbnail URLs
    Resolve {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// List supported hosting platforms
    Platforms {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Play a video headlessly while recording progress and a view
    Play {
        url: String,

        /// Identifier progress is stored under. Derived from the URL if omitted.
        #[arg(long)]
        video_id: Option<String>,

        /// Viewer id. Defaults to the configured viewer, then the client session.
        #[arg(long)]
        viewer: Option<String>,

        /// Start position in seconds
        #[arg(long, conflicts_with = "resume")]
        start: Option<f64>,

        /// Continue from the stored progress
        #[arg(long)]
        resume: bool,

        /// Playback speed multiplier
        #[arg(long)]
        rate: Option<f64>,

        /// Highest variant bandwidth to pick from a master playlist (bits/s)
        #[arg(long)]
        max_bandwidth: Option<u64>,

        /// Keep progress and views in memory only
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Inspect or change stored progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Register or count views
    Views {
        #[command(subcommand)]
        action: ViewsAction,
    },

    /// Manage configuration
    Config {
        /// Print the current configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProgressAction {
    /// Show progress records, all of the viewer's when no video is given
    Show {
        video_ids: Vec<String>,

        #[arg(long)]
        viewer: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Reset a video to 0% and not completed
    Reset {
        video_id: String,

        #[arg(long)]
        viewer: Option<String>,
    },

    /// Mark a video completed
    Complete {
        video_id: String,

        #[arg(long)]
        viewer: Option<String>,
    },

    /// Delete every progress record of the viewer
    Clear {
        #[arg(long)]
        viewer: Option<String>,

        /// Required to confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ViewsAction {
    /// Register a view of a video for this client
    Register {
        video_id: String,

        #[arg(long)]
        viewer: Option<String>,
    },

    /// Count distinct client views of a video
    Count {
        video_id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable
    Pretty,
    /// Indented JSON
    Json,
    /// Single-line JSON
    JsonCompact,
    /// Table
    Table,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonCompact)
    }
}

impl Commands {
    /// Output format requested by the command, if it has one.
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Commands::Resolve { output, .. }
            | Commands::Platforms { output }
            | Commands::Play { output, .. } => Some(*output),
            Commands::Progress {
                action: ProgressAction::Show { output, .. },
            } => Some(*output),
            Commands::Views {
                action: ViewsAction::Count { output, .. },
            } => Some(*output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_play_arguments() {
        let args = Args::try_parse_from([
            "coursecast",
            "play",
            "https://youtu.be/dQw4w9WgXcQ",
            "--resume",
            "--rate",
            "8",
            "-o",
            "json",
        ])
        .unwrap();
        match &args.command {
            Commands::Play {
                resume, rate, url, ..
            } => {
                assert!(*resume);
                assert_eq!(*rate, Some(8.0));
                assert_eq!(url, "https://youtu.be/dQw4w9WgXcQ");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.command.output_format(), Some(OutputFormat::Json));
    }

    #[test]
    fn test_start_conflicts_with_resume() {
        let result = Args::try_parse_from([
            "coursecast",
            "play",
            "https://cdn.example.com/a.mp4",
            "--resume",
            "--start",
            "10",
        ]);
        assert!(result.is_err());
    }
}
