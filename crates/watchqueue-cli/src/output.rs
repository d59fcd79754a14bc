use clap::ValueEnum;
use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use watch_queue_models::{QueueItem, QueueState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{} {}", "✓".green(), msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "success",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{}", msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "info",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => {
                println!("{} {}", "⚠".yellow(), msg.as_ref());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({
                    "type": "warning",
                    "message": msg.as_ref()
                }));
            }
        }
    }

    /// Report a mutation; JSON output carries the resulting state
    pub fn state_changed(&self, msg: impl AsRef<str>, state: &QueueState) {
        match self.format {
            OutputFormat::Human => self.success(msg),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.json(&json!({
                    "type": "success",
                    "message": msg.as_ref(),
                    "state": state
                }));
            }
        }
    }

    /// The queue in play order
    pub fn queue(&self, state: &QueueState) {
        match self.format {
            OutputFormat::Human => {
                if self.quiet {
                    return;
                }
                if state.is_empty() {
                    println!("{}", "Queue is empty".bright_black());
                    return;
                }
                println!("{}", queue_table(state));
                println!("{} item(s)", state.len());
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.json(&json!(state));
            }
        }
    }

    pub fn next_up(&self, item: &QueueItem) {
        match self.format {
            OutputFormat::Human => {
                if self.quiet {
                    return;
                }
                println!("{} {}", "Next up:".bright_cyan().bold(), describe(item));
                println!("  {}", item.url);
            }
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.json(&json!({ "type": "next", "item": item }));
            }
        }
    }

    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && self.format != OutputFormat::Human {
            return;
        }

        self.print_json(data);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(data).unwrap_or_default());
            }
            OutputFormat::JsonPretty => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
            }
            OutputFormat::Human => {
                println!("{}", data);
            }
        }
    }
}

fn queue_table(state: &QueueState) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Title").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Service").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Length").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Id").add_attribute(comfy_table::Attribute::Bold),
    ]);
    for item in state.ordered() {
        let title = if item.completed {
            format!("{} (watched)", describe(item))
        } else {
            describe(item)
        };
        table.add_row(vec![
            Cell::new(item.order),
            Cell::new(title),
            Cell::new(item.service.as_str()),
            Cell::new(item.duration.map(format_duration).unwrap_or_default()),
            Cell::new(&item.id).fg(comfy_table::Color::DarkGrey),
        ]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

/// `Series S1E2 - Title` for episodes, the bare title otherwise
fn describe(item: &QueueItem) -> String {
    match item.episode_info() {
        Some(info) => format!(
            "{} S{}E{} - {}",
            info.series_title, info.season_number, info.episode_number, item.title
        ),
        None => item.title.clone(),
    }
}

fn format_duration(seconds: u32) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_queue_models::{EpisodeInfo, StreamingService};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(2530), "42:10");
        assert_eq!(format_duration(3723), "1:02:03");
    }

    #[test]
    fn test_describe() {
        let movie = QueueItem::movie("m", "Heat", "/watch/m", StreamingService::Max);
        assert_eq!(describe(&movie), "Heat");

        let episode = QueueItem::episode(
            "e",
            "Pilot",
            "/watch/e",
            StreamingService::Netflix,
            EpisodeInfo::new("foo", "Foo", 2, 5),
        );
        assert_eq!(describe(&episode), "Foo S2E5 - Pilot");
    }
}
