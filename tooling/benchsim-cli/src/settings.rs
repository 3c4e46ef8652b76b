// Copyright (C) 2024 Ethan Uppal.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3 of the License only.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{fs, io};

use benchsim_icarus::{DiscoveryMode, ToolPaths};
use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use snafu::{OptionExt, ResultExt, Whatever, whatever};

const APP_NAME: &str = "BenchSim";
const SETTINGS_FILE: &str = "settings.toml";
const MAX_RECENT_PROJECTS: usize = 10;

/// `<config dir>/BenchSim/settings.toml`, if the platform has a config
/// directory.
pub fn default_settings_path() -> Result<Utf8PathBuf, Whatever> {
    let directories = ProjectDirs::from("", "", APP_NAME)
        .whatever_context("Failed to determine the user configuration directory")?;
    Utf8PathBuf::from_path_buf(directories.config_dir().join(SETTINGS_FILE))
        .map_err(|_| "?")
        .whatever_context("Failed to parse the configuration directory as UTF-8")
}

/// Preferences that apply to every project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSettings {
    pub iverilog_path: Option<Utf8PathBuf>,
    pub vvp_path: Option<Utf8PathBuf>,
    pub gtkwave_path: Option<Utf8PathBuf>,
    pub project_mode: Option<DiscoveryMode>,
    /// Most recent first.
    pub recent_projects: Vec<Utf8PathBuf>,
}

impl UserSettings {
    /// Reads the settings at `path`. A missing file yields the defaults.
    pub fn load(path: &Utf8Path) -> Result<Self, Whatever> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::debug!("No settings at {path}, using defaults");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error).whatever_context(format!(
                    "Failed to read settings at {path}"
                ));
            }
        };
        let document: toml::Value = toml::from_str(&contents)
            .whatever_context(format!("Failed to parse settings at {path}"))?;

        let string = |key: &str| -> Result<Option<String>, Whatever> {
            match document.get(key) {
                None => Ok(None),
                Some(value) => match value.as_str() {
                    Some(value) if value.is_empty() => Ok(None),
                    Some(value) => Ok(Some(value.to_string())),
                    None => whatever!("`{key}` in {path} must be a string"),
                },
            }
        };

        let project_mode = match string("project_mode")? {
            Some(mode) => Some(
                mode.parse::<DiscoveryMode>().whatever_context(format!(
                    "Invalid `project_mode` in {path}"
                ))?,
            ),
            None => None,
        };

        let recent_projects = match document.get("recent_projects") {
            None => vec![],
            Some(value) => value
                .as_array()
                .whatever_context(format!(
                    "`recent_projects` in {path} must be an array"
                ))?
                .iter()
                .filter_map(|project| project.as_str())
                .map(Utf8PathBuf::from)
                .collect(),
        };

        Ok(Self {
            iverilog_path: string("iverilog_path")?.map(Into::into),
            vvp_path: string("vvp_path")?.map(Into::into),
            gtkwave_path: string("gtkwave_path")?.map(Into::into),
            project_mode,
            recent_projects,
        })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), Whatever> {
        let mut table = toml::Table::new();
        let paths = [
            ("iverilog_path", &self.iverilog_path),
            ("vvp_path", &self.vvp_path),
            ("gtkwave_path", &self.gtkwave_path),
        ];
        for (key, value) in paths {
            if let Some(value) = value {
                table.insert(key.into(), toml::Value::String(value.to_string()));
            }
        }
        if let Some(mode) = self.project_mode {
            table.insert("project_mode".into(), toml::Value::String(mode.to_string()));
        }
        table.insert(
            "recent_projects".into(),
            toml::Value::Array(
                self.recent_projects
                    .iter()
                    .map(|project| toml::Value::String(project.to_string()))
                    .collect(),
            ),
        );

        let contents = toml::to_string_pretty(&toml::Value::Table(table))
            .whatever_context("Failed to format settings as TOML")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).whatever_context(format!(
                "Failed to create settings directory {parent}"
            ))?;
        }
        fs::write(path, contents)
            .whatever_context(format!("Failed to write settings to {path}"))
    }

    /// Puts `project` at the front of the recent projects, keeping at most
    /// ten.
    pub fn push_recent(&mut self, project: &Utf8Path) {
        self.recent_projects.retain(|recent| recent != project);
        self.recent_projects.insert(0, project.to_path_buf());
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
    }

    /// Forgets recent projects that no longer exist. Returns whether any
    /// were removed.
    pub fn prune_missing(&mut self) -> bool {
        let before = self.recent_projects.len();
        self.recent_projects.retain(|recent| recent.is_dir());
        self.recent_projects.len() != before
    }

    /// Overrides the tools configured here. Setting only the compiler also
    /// moves the simulator next to it.
    pub fn apply_to_tools(&self, tools: &mut ToolPaths) {
        if let Some(iverilog) = &self.iverilog_path {
            *tools = ToolPaths {
                viewer: tools.viewer.clone(),
                ..ToolPaths::from_compiler(iverilog)
            };
        }
        if let Some(vvp) = &self.vvp_path {
            tools.simulator = vvp.clone();
        }
        if let Some(gtkwave) = &self.gtkwave_path {
            tools.viewer = gtkwave.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_path(directory: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(directory.path().join("BenchSim/settings.toml"))
            .expect("tempdir is not UTF-8")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let directory = tempfile::tempdir().expect("failed to create tempdir");
        let settings = UserSettings::load(&settings_path(&directory))
            .expect("failed to load settings");
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let directory = tempfile::tempdir().expect("failed to create tempdir");
        let path = settings_path(&directory);
        let settings = UserSettings {
            iverilog_path: Some("/opt/iverilog/bin/iverilog".into()),
            vvp_path: None,
            gtkwave_path: Some("/usr/bin/gtkwave".into()),
            project_mode: Some(DiscoveryMode::Icestudio),
            recent_projects: vec!["/home/me/blinky".into()],
        };

        settings.save(&path).expect("failed to save settings");

        assert_eq!(
            UserSettings::load(&path).expect("failed to load settings"),
            settings
        );
    }

    #[test]
    fn recent_projects_are_capped_and_unique() {
        let mut settings = UserSettings::default();
        for index in 0..12 {
            settings.push_recent(Utf8Path::new(&format!("/projects/{index}")));
        }
        settings.push_recent(Utf8Path::new("/projects/5"));

        assert_eq!(settings.recent_projects.len(), 10);
        assert_eq!(settings.recent_projects[0], Utf8PathBuf::from("/projects/5"));
        assert_eq!(settings.recent_projects[1], Utf8PathBuf::from("/projects/11"));
        assert_eq!(
            settings
                .recent_projects
                .iter()
                .filter(|project| project.as_str() == "/projects/5")
                .count(),
            1
        );
    }

    #[test]
    fn missing_projects_are_pruned() {
        let directory = tempfile::tempdir().expect("failed to create tempdir");
        let existing = Utf8PathBuf::try_from(directory.path().to_path_buf())
            .expect("tempdir is not UTF-8");
        let mut settings = UserSettings {
            recent_projects: vec![existing.join("gone"), existing.clone()],
            ..Default::default()
        };

        assert!(settings.prune_missing());
        assert_eq!(settings.recent_projects, vec![existing]);
        assert!(!settings.prune_missing());
    }

    #[test]
    fn compiler_path_moves_the_simulator() {
        let settings = UserSettings {
            iverilog_path: Some("/definitely/missing/iverilog".into()),
            gtkwave_path: Some("/opt/gtkwave".into()),
            ..Default::default()
        };
        let mut tools = ToolPaths::default();
        settings.apply_to_tools(&mut tools);

        assert_eq!(tools.compiler, Utf8PathBuf::from("/definitely/missing/iverilog"));
        assert_eq!(tools.simulator, ToolPaths::default().simulator);
        assert_eq!(tools.viewer, Utf8PathBuf::from("/opt/gtkwave"));
    }
}
