// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use camino::Utf8PathBuf;
use snafu::Snafu;

use crate::{
    diagnostics::Diagnostics,
    run::{RunResult, Step, Tool},
};

/// Everything that can go wrong between picking a project folder and
/// looking at its waveform.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SimulationError {
    #[snafu(display(
        "Project folder {root} does not exist or is not a directory"
    ))]
    NotFound { root: Utf8PathBuf },

    #[snafu(display("Failed to access {path}"))]
    Io { path: Utf8PathBuf, source: io::Error },

    #[snafu(display("Invalid search pattern {pattern}"))]
    Glob {
        pattern: String,
        source: glob::PatternError,
    },

    #[snafu(display(
        "No testbench (a file named `*_tb.v`) was found in {root}"
    ))]
    NoTestbench { root: Utf8PathBuf },

    #[snafu(display(
        "Testbench {testbench} is not one of the testbenches found in {root}"
    ))]
    UnknownTestbench {
        testbench: Utf8PathBuf,
        root: Utf8PathBuf,
    },

    #[snafu(display(
        "There is no Icestudio subproject named `{name}` (found: {})",
        available.join(", ")
    ))]
    UnknownSubproject {
        name: String,
        available: Vec<String>,
    },

    #[snafu(display(
        "Icestudio subprojects {} expose different top-level ports: pick one explicitly",
        subprojects.join(", ")
    ))]
    Conflict { subprojects: Vec<String> },

    #[snafu(display(
        "Trace file name `{name}` must be an identifier followed by `.vcd`"
    ))]
    InvalidTraceName { name: String },

    #[snafu(display(
        "The {tool} executable {path} does not exist or is not executable"
    ))]
    ToolNotFound { tool: Tool, path: Utf8PathBuf },

    #[snafu(display("Invocation of the {tool} ({path}) failed"))]
    Spawn {
        tool: Tool,
        path: Utf8PathBuf,
        source: io::Error,
    },

    #[snafu(display("Failed to capture the output of the {tool}"))]
    Capture { tool: Tool, source: io::Error },

    #[snafu(display(
        "{step} failed with {}\n\n{}",
        describe_exit(code),
        result.transcript(*step)
    ))]
    ToolExecution {
        step: Step,
        code: Option<i32>,
        result: Box<RunResult>,
    },

    #[snafu(display(
        "Simulation finished but no trace file was written (expected {trace}): does the testbench call $dumpfile and $dumpvars?"
    ))]
    TraceNotFound { trace: Utf8PathBuf },

    #[snafu(display("Failed to launch the waveform viewer {path}"))]
    ViewerSpawn { path: Utf8PathBuf, source: io::Error },

    #[snafu(display("Failed to stop the previous waveform viewer"))]
    ViewerTerminate { source: io::Error },

    #[snafu(display("Failed to parse {path} as a valid TOML file"))]
    ParseConfig {
        path: Utf8PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Invalid configuration in {path}: {message}"))]
    Config { path: Utf8PathBuf, message: String },

    #[snafu(display(
        "Failed to read the top-level interface in {path}: {message}"
    ))]
    Interface { path: Utf8PathBuf, message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".into(),
    }
}

impl SimulationError {
    /// The captured tool output, if this error came from a tool that ran
    /// but exited unsuccessfully.
    pub fn run_result(&self) -> Option<&RunResult> {
        match self {
            Self::ToolExecution { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Diagnostics found in the captured tool output. Empty for errors that
    /// did not come from a tool.
    pub fn diagnostics(&self) -> Option<Diagnostics<'_>> {
        self.run_result().map(RunResult::diagnostics)
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
