// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Per-project settings read from `benchsim.toml`.
//!
//! ```toml
//! [project]
//! mode = "icestudio"
//! testbench = "main_tb.v"
//! subproject = "blink"
//! trace = "simulation.vcd"
//!
//! [tools]
//! iverilog = "/opt/iverilog/bin/iverilog"
//! gtkwave = "/usr/bin/gtkwave"
//! ```
//!
//! Every key is optional and unknown keys are ignored.

use std::{fs, io};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::ResultExt;

use crate::{
    error::{ConfigSnafu, IoSnafu, ParseConfigSnafu, Result},
    plan::PlanOptions,
    run::{ToolPaths, sibling_simulator},
    scan::DiscoveryMode,
};

/// Name of the per-project settings file.
pub const PROJECT_FILE: &str = "benchsim.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    pub mode: Option<DiscoveryMode>,
    /// Relative to the project folder.
    pub testbench: Option<Utf8PathBuf>,
    pub subproject: Option<String>,
    pub trace: Option<String>,
    pub iverilog: Option<Utf8PathBuf>,
    pub vvp: Option<Utf8PathBuf>,
    pub gtkwave: Option<Utf8PathBuf>,
}

impl ProjectConfig {
    /// Reads `benchsim.toml` from `root`, or returns `None` if there isn't
    /// one.
    pub fn load(root: &Utf8Path) -> Result<Option<Self>> {
        let path = root.join(PROJECT_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(error) => return Err(error).context(IoSnafu { path }),
        };
        log::debug!("Loading project settings from {path}");
        Self::from_toml_str(&contents, &path).map(Some)
    }

    /// Parses the contents of a settings file; `path` is only used in error
    /// messages.
    pub fn from_toml_str(contents: &str, path: &Utf8Path) -> Result<Self> {
        let document: toml::Value =
            toml::from_str(contents).context(ParseConfigSnafu { path })?;
        let reader = Reader {
            document: &document,
            path,
        };

        let mode = match reader.string("project", "mode")? {
            Some(mode) => Some(mode.parse::<DiscoveryMode>().map_err(
                |message| ConfigSnafu { path, message }.build(),
            )?),
            None => None,
        };

        Ok(Self {
            mode,
            testbench: reader.string("project", "testbench")?.map(Into::into),
            subproject: reader.string("project", "subproject")?.map(Into::into),
            trace: reader.string("project", "trace")?.map(Into::into),
            iverilog: reader.string("tools", "iverilog")?.map(Into::into),
            vvp: reader.string("tools", "vvp")?.map(Into::into),
            gtkwave: reader.string("tools", "gtkwave")?.map(Into::into),
        })
    }

    /// Overrides the tools this file names. Setting only `iverilog` also
    /// moves the simulator to the `vvp` next to it.
    pub fn apply_to_tools(&self, tools: &mut ToolPaths) {
        if let Some(iverilog) = &self.iverilog {
            tools.compiler = iverilog.clone();
            if self.vvp.is_none() {
                tools.simulator = sibling_simulator(iverilog);
            }
        }
        if let Some(vvp) = &self.vvp {
            tools.simulator = vvp.clone();
        }
        if let Some(gtkwave) = &self.gtkwave {
            tools.viewer = gtkwave.clone();
        }
    }

    /// Overrides the planning choices this file names.
    pub fn apply_to_plan_options(&self, options: &mut PlanOptions) {
        if let Some(testbench) = &self.testbench {
            options.testbench = Some(testbench.clone());
        }
        if let Some(subproject) = &self.subproject {
            options.subproject = Some(subproject.clone());
        }
        if let Some(trace) = &self.trace {
            options.trace_file_name = trace.clone();
        }
    }
}

struct Reader<'a> {
    document: &'a toml::Value,
    path: &'a Utf8Path,
}

impl Reader<'_> {
    fn string(&self, table: &str, key: &str) -> Result<Option<&str>> {
        let Some(section) = self.document.get(table) else {
            return Ok(None);
        };
        let Some(section) = section.as_table() else {
            return ConfigSnafu {
                path: self.path,
                message: format!("`{table}` must be a table"),
            }
            .fail();
        };
        match section.get(key) {
            None => Ok(None),
            Some(value) => match value.as_str() {
                Some(value) => Ok(Some(value)),
                None => ConfigSnafu {
                    path: self.path,
                    message: format!("`{table}.{key}` must be a string"),
                }
                .fail(),
            },
        }
    }
}
