//! Default configuration file generation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a fully commented default `keylight.toml` to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create config directory {}", private_path(parent))
        })?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default config file: {}", private_path(path));
    Ok(())
}

pub(crate) fn default_config_content() -> String {
    let content = ConfigBuilder::new()
        .add_section("Device")
        .add_disabled_setting(
            "device",
            "\"00000000-0000-0000-0000-000000000000\"",
            "Accessory identifier (omit to scan)",
        )
        .add_setting(
            "scan_timeout",
            &DEFAULT_SCAN_TIMEOUT.to_string(),
            &format!(
                "Advertisement scan window in seconds ({MINIMUM_SCAN_TIMEOUT}-{MAXIMUM_SCAN_TIMEOUT})"
            ),
        )
        .add_setting(
            "keep_alive_interval",
            &DEFAULT_KEEP_ALIVE_INTERVAL.to_string(),
            &format!(
                "Resend interval for keep-alive mode in seconds ({MINIMUM_KEEP_ALIVE_INTERVAL:.0}-{MAXIMUM_KEEP_ALIVE_INTERVAL:.0})"
            ),
        )
        .add_section("Night window")
        .add_setting(
            "night_start",
            &format!("\"{DEFAULT_NIGHT_START}\""),
            "Start of the night window (HH:MM or hour)",
        )
        .add_setting(
            "night_end",
            &format!("\"{DEFAULT_NIGHT_END}\""),
            "End of the night window (HH:MM or hour)",
        )
        .add_section("Triggers")
        .add_setting(
            "debounce",
            &format!("{DEFAULT_DEBOUNCE:.1}"),
            &format!(
                "Minimum seconds between two events of one kind ({MINIMUM_DEBOUNCE:.0}-{MAXIMUM_DEBOUNCE:.0})"
            ),
        )
        .add_setting(
            "display_poll_interval",
            &DEFAULT_DISPLAY_POLL_INTERVAL.to_string(),
            &format!(
                "Display power polling interval in ms ({MINIMUM_DISPLAY_POLL_INTERVAL}-{MAXIMUM_DISPLAY_POLL_INTERVAL})"
            ),
        )
        .add_setting(
            "trigger_on_display_sleep",
            &DEFAULT_TRIGGER_ON_DISPLAY_SLEEP.to_string(),
            "Turn the light off when displays power down",
        )
        .add_setting(
            "trigger_on_display_wake",
            &DEFAULT_TRIGGER_ON_DISPLAY_WAKE.to_string(),
            "Turn the light on when displays power up at night",
        )
        .add_setting(
            "trigger_on_system_sleep",
            &DEFAULT_TRIGGER_ON_SYSTEM_SLEEP.to_string(),
            "React to suspend and resume",
        )
        .add_setting(
            "trigger_on_screensaver",
            &DEFAULT_TRIGGER_ON_SCREENSAVER.to_string(),
            "React to the session screensaver",
        )
        .add_section("Dispatch")
        .add_disabled_setting(
            "command",
            "\"/usr/bin/keylight\"",
            "External command (omit to drive the radio in-process)",
        )
        .add_disabled_setting(
            "log_file",
            "\"~/keylight.log\"",
            "Append log output to this file",
        )
        .build();

    format!("{content}\n")
}

/// Builder for dynamically-aligned configuration files.
///
/// Comments line up one column past the widest setting line, so the file
/// stays tidy when defaults in `constants.rs` change width.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    /// A setting with no default, written commented out as an example.
    fn add_disabled_setting(mut self, key: &str, example: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("# {key} = {example}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_are_aligned() {
        let content = ConfigBuilder::new()
            .add_section("A")
            .add_setting("short", "1", "one")
            .add_setting("much_longer_key", "2", "two")
            .build();
        let columns: Vec<usize> = content
            .lines()
            .filter(|l| !l.starts_with("#["))
            .filter_map(|l| l.find("# "))
            .collect();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], columns[1]);
    }

    #[test]
    fn test_default_content_parses() {
        let config: crate::config::Config = toml::from_str(&default_config_content()).unwrap();
        assert_eq!(config.device, None);
        assert_eq!(config.command, None);
        assert_eq!(config.night_start.as_deref(), Some(DEFAULT_NIGHT_START));
        assert_eq!(config.debounce, Some(DEFAULT_DEBOUNCE));
        assert_eq!(config.trigger_on_screensaver, Some(false));
    }
}
