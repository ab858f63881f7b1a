use std::io::Write;

#[cfg(feature = "colored-output")]
use colored::*;
use platforms_resolver::{PlatformDescriptor, VideoSource};
use player_engine::{ErrorKind, PlayerState};
use progress_sync::{ProgressRecord, ViewRegistration};
use serde::Serialize;
#[cfg(feature = "table-output")]
use tabled::{Table, Tabled, settings::Style};

use crate::{cli::OutputFormat, error::Result};

/// Result of one `play` run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySummary {
    pub video_id: String,
    pub viewer_id: String,
    pub source: VideoSource,
    pub final_state: PlayerState,
    pub error: Option<ErrorKind>,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    #[serde(serialize_with = "serialize_registration")]
    pub view: ViewRegistration,
    pub progress: Option<ProgressRecord>,
    pub persistence_error: Option<String>,
}

fn serialize_registration<S: serde::Serializer>(
    view: &ViewRegistration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(registration_str(view))
}

fn registration_str(view: &ViewRegistration) -> &'static str {
    match view {
        ViewRegistration::Recorded => "recorded",
        ViewRegistration::AlreadyRecorded => "already-recorded",
        ViewRegistration::Failed => "failed",
    }
}

#[derive(Debug, Serialize)]
struct PlatformRow {
    platform: &'static str,
    thumbnails: bool,
}

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    fn json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
        let mut out = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }?;
        out.push('\n');
        Ok(out)
    }

    pub fn format_sources(&self, sources: &[VideoSource], format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(sources.iter().map(|s| self.source_pretty(s)).collect()),
            OutputFormat::Json => Self::json(sources, true),
            OutputFormat::JsonCompact => Self::json(sources, false),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => Ok(self.sources_table(sources)),
            #[cfg(not(feature = "table-output"))]
            OutputFormat::Table => Ok(sources.iter().map(|s| self.source_pretty(s)).collect()),
        }
    }

    fn source_pretty(&self, source: &VideoSource) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize(&source.raw_url, &Color::Green, true));
        output.push('\n');
        output.push_str(&self.field("Platform", source.platform.as_str(), &Color::Cyan));
        if let Some(id) = &source.resolved_id {
            output.push_str(&self.field("Id", id, &Color::Cyan));
        }
        output.push_str(&self.field("Embed URL", &source.embed_url, &Color::Blue));
        if let Some(thumbnail) = &source.thumbnail_url {
            output.push_str(&self.field("Thumbnail", thumbnail, &Color::Blue));
        }
        output.push_str(&self.field("Stream", source.stream_kind().as_str(), &Color::Cyan));
        if source.degraded {
            output.push_str(&self.field(
                "Note",
                "id could not be extracted, playing the raw URL",
                &Color::Yellow,
            ));
        }
        output.push('\n');
        output
    }

    #[cfg(feature = "table-output")]
    fn sources_table(&self, sources: &[VideoSource]) -> String {
        #[derive(Tabled)]
        struct SourceTableRow<'a> {
            platform: &'a str,
            id: &'a str,
            embed_url: &'a str,
            thumbnail: &'a str,
            stream: String,
        }

        let rows = sources.iter().map(|s| SourceTableRow {
            platform: s.platform.as_str(),
            id: s.resolved_id.as_deref().unwrap_or("-"),
            embed_url: &s.embed_url,
            thumbnail: s.thumbnail_url.as_deref().unwrap_or("-"),
            stream: s.stream_kind().as_str().to_string(),
        });
        let mut table = Table::new(rows).with(Style::modern()).to_string();
        table.push('\n');
        table
    }

    pub fn format_platforms(
        &self,
        platforms: &[PlatformDescriptor],
        format: &OutputFormat,
    ) -> Result<String> {
        let rows: Vec<PlatformRow> = platforms
            .iter()
            .map(|p| PlatformRow {
                platform: p.tag.as_str(),
                thumbnails: p.has_thumbnail(),
            })
            .collect();

        match format {
            OutputFormat::Json => Self::json(&rows, true),
            OutputFormat::JsonCompact => Self::json(&rows, false),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => {
                #[derive(Tabled)]
                struct PlatformTableRow {
                    platform: &'static str,
                    thumbnails: &'static str,
                }
                let table = Table::new(rows.iter().map(|r| PlatformTableRow {
                    platform: r.platform,
                    thumbnails: if r.thumbnails { "yes" } else { "no" },
                }))
                .with(Style::modern())
                .to_string();
                Ok(format!("{table}\n"))
            }
            _ => {
                let mut output = self.colorize("Supported platforms:", &Color::Green, true);
                output.push('\n');
                for row in &rows {
                    let note = if row.thumbnails { "" } else { " (no thumbnails)" };
                    output.push_str(&format!(
                        "  - {}{}\n",
                        self.colorize(row.platform, &Color::Cyan, false),
                        note
                    ));
                }
                Ok(output)
            }
        }
    }

    pub fn format_progress(
        &self,
        records: &[ProgressRecord],
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(records, true),
            OutputFormat::JsonCompact => Self::json(records, false),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => {
                #[derive(Tabled)]
                struct ProgressTableRow<'a> {
                    video: &'a str,
                    progress: String,
                    completed: bool,
                    updated: String,
                }
                let table = Table::new(records.iter().map(|r| ProgressTableRow {
                    video: &r.video_id,
                    progress: format!("{}%", r.progress_percent),
                    completed: r.completed,
                    updated: r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                }))
                .with(Style::modern())
                .to_string();
                Ok(format!("{table}\n"))
            }
            _ => {
                if records.is_empty() {
                    return Ok("No progress recorded\n".to_string());
                }
                let mut output = String::new();
                for record in records {
                    let status = if record.completed {
                        self.colorize("completed", &Color::Green, true)
                    } else {
                        self.colorize("in progress", &Color::Yellow, false)
                    };
                    output.push_str(&format!(
                        "{} {:>3}% {} ({})\n",
                        self.colorize(&record.video_id, &Color::Cyan, false),
                        record.progress_percent,
                        status,
                        record.updated_at.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                Ok(output)
            }
        }
    }

    pub fn format_play_summary(
        &self,
        summary: &PlaySummary,
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(summary, true),
            OutputFormat::JsonCompact => Self::json(summary, false),
            _ => {
                let mut output = self.colorize("Playback summary:", &Color::Green, true);
                output.push('\n');
                output.push_str(&self.field("Video", &summary.video_id, &Color::Cyan));
                output.push_str(&self.field("Viewer", &summary.viewer_id, &Color::Cyan));
                output.push_str(&self.field(
                    "Platform",
                    summary.source.platform.as_str(),
                    &Color::Cyan,
                ));
                output.push_str(&self.field(
                    "State",
                    summary.final_state.as_str(),
                    &Color::Cyan,
                ));
                if let Some(error) = summary.error {
                    output.push_str(&self.field("Error", error.as_str(), &Color::Yellow));
                }
                output.push_str(&self.field(
                    "Position",
                    &format!(
                        "{:.1}s / {:.1}s",
                        summary.position_seconds, summary.duration_seconds
                    ),
                    &Color::Cyan,
                ));
                output.push_str(&self.field(
                    "View",
                    registration_str(&summary.view),
                    &Color::Cyan,
                ));
                if let Some(record) = &summary.progress {
                    output.push_str(&self.field(
                        "Progress",
                        &format!(
                            "{}%{}",
                            record.progress_percent,
                            if record.completed { " (completed)" } else { "" }
                        ),
                        &Color::Cyan,
                    ));
                }
                if let Some(error) = &summary.persistence_error {
                    output.push_str(&self.field("Persistence", error, &Color::Yellow));
                }
                Ok(output)
            }
        }
    }

    fn field(&self, name: &str, value: &str, color: &Color) -> String {
        format!(
            "  {}: {}\n",
            self.colorize(name, &Color::Yellow, false),
            self.colorize(value, color, false)
        )
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}

pub fn write_output(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
