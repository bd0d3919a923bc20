//! Default configuration file generation.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a commented default `duskshift.toml` to `path`.
pub fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let config_content = ConfigBuilder::new()
        .add_section("Backend")
        .add_setting(
            "backend",
            &format!("\"{}\"", DEFAULT_BACKEND.as_str()),
            "Backend to use: \"auto\", \"wayland\" or \"dry-run\"",
        )
        .add_section("Schedule")
        .add_setting(
            "night_start",
            &format!("\"{DEFAULT_NIGHT_START}\""),
            "Centre of the dusk transition (HH:MM or HH:MM:SS)",
        )
        .add_setting(
            "night_end",
            &format!("\"{DEFAULT_NIGHT_END}\""),
            "Centre of the dawn transition (HH:MM or HH:MM:SS)",
        )
        .add_setting(
            "transition",
            &format!("\"{DEFAULT_TRANSITION}\""),
            "Transition length, up to 4h: \"90m\", \"1h30m\", \"45s\" or \"HH:MM\"",
        )
        .add_section("Colors")
        .add_setting(
            "night_temp",
            &DEFAULT_NIGHT_TEMP.to_string(),
            &format!("Color temperature during night ({MINIMUM_TEMP}-{MAXIMUM_TEMP}) Kelvin"),
        )
        .add_setting(
            "day_temp",
            &DEFAULT_DAY_TEMP.to_string(),
            &format!("Color temperature during day ({MINIMUM_TEMP}-{MAXIMUM_TEMP}) Kelvin"),
        )
        .add_setting(
            "invert_at_night",
            &DEFAULT_INVERT_AT_NIGHT.to_string(),
            "Invert the display during the night phase",
        )
        .add_section("Exclusions")
        .add_setting(
            "exclude_apps",
            "[]",
            "App ids or window classes that pause duskshift while focused",
        )
        .build();

    fs::write(path, config_content).with_context(|| {
        format!("Failed to write default config to {}", private_path(path))
    })?;

    log_block_start!("Created default configuration");
    log_indented!("{}", private_path(path));
    Ok(())
}

/// Lays out settings with their comments aligned in one column.
struct ConfigBuilder {
    entries: Vec<Entry>,
}

enum Entry {
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
        self.entries.push(Entry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Setting { line, .. } => Some(line.len()),
                Entry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for (i, entry) in self.entries.into_iter().enumerate() {
            match entry {
                Entry::Section(header) => {
                    if i > 0 {
                        lines.push(String::new());
                    }
                    lines.push(header);
                }
                Entry::Setting { line, comment } => {
                    lines.push(format!("{line:<width$}{comment}"));
                }
            }
        }

        let mut content = lines.join("\n");
        content.push('\n');
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_aligns_comments() {
        let content = ConfigBuilder::new()
            .add_section("A")
            .add_setting("x", "1", "short")
            .add_setting("longer_key", "2", "long")
            .add_section("B")
            .build();

        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "#[A]");
        assert_eq!(lines[1].find('#'), lines[2].find('#'));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "#[B]");
    }
}
