// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Turning a [`SourceSet`] into the exact compiler invocation.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{OptionExt, ensure};

use crate::{
    error::{
        ConflictSnafu, InvalidTraceNameSnafu, NoTestbenchSnafu, Result,
        UnknownSubprojectSnafu, UnknownTestbenchSnafu,
    },
    interface::{ModuleInterface, read_interface},
    scan::{ResolvedMode, SourceSet, Subproject},
};

/// Trace file written when the user does not ask for another name.
pub const DEFAULT_TRACE_FILE: &str = "simulation.vcd";

/// Compiled simulation written into the project folder.
pub const ARTIFACT_FILE: &str = "simulation.out";

/// Macro the testbench uses to name its dump file. Icestudio testbenches
/// expand it with `DUMPSTR`, so the value must be a bare token.
pub const TRACE_MACRO: &str = "VCD_OUTPUT";

/// Optional choices made by the user before planning. Usually, you can just
/// use [`PlanOptions::default()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Testbench to compile, absolute or relative to the project folder.
    /// If `None`, [`SourceSet::default_testbench`] is used.
    pub testbench: Option<Utf8PathBuf>,

    /// Icestudio subproject to compile when several are present.
    pub subproject: Option<String>,

    /// File name of the waveform dump, e.g. `simulation.vcd`.
    pub trace_file_name: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            testbench: None,
            subproject: None,
            trace_file_name: DEFAULT_TRACE_FILE.into(),
        }
    }
}

/// A `-D` preprocessor definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => self.name.fmt(f),
        }
    }
}

/// Everything needed to compile and simulate one testbench. Only valid for
/// the scan it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilePlan {
    pub root: Utf8PathBuf,
    pub mode: ResolvedMode,
    /// Name of the Icestudio subproject being compiled, if any.
    pub subproject: Option<String>,
    pub testbench: Utf8PathBuf,
    /// Design sources followed by [`CompilePlan::testbench`] as the last
    /// entry.
    pub files: Vec<Utf8PathBuf>,
    pub defines: Vec<Define>,
    pub artifact_path: Utf8PathBuf,
    pub trace_path: Utf8PathBuf,
}

impl CompilePlan {
    /// Arguments for `iverilog`.
    pub fn compiler_arguments(&self) -> Vec<String> {
        let mut arguments =
            vec!["-o".to_string(), self.artifact_path.to_string()];
        arguments.extend(self.defines.iter().map(|define| format!("-D{define}")));
        arguments.extend(self.files.iter().map(|file| file.to_string()));
        arguments
    }

    /// Arguments for `vvp`.
    pub fn simulator_arguments(&self) -> Vec<String> {
        vec![self.artifact_path.to_string()]
    }

    /// The design sources, without the testbench.
    pub fn design_sources(&self) -> &[Utf8PathBuf] {
        &self.files[..self.files.len().saturating_sub(1)]
    }
}

/// Decides what to compile.
///
/// The file list is the top-level design sources, then the sources of the
/// Icestudio subproject in use (if any), then the selected testbench. No
/// other testbench is ever included, since each one declares its own top
/// module.
pub fn plan(source_set: &SourceSet, options: &PlanOptions) -> Result<CompilePlan> {
    let trace_stem = trace_stem(&options.trace_file_name)?;
    let testbench = select_testbench(source_set, options.testbench.as_deref())?;

    let subproject = match source_set.mode {
        ResolvedMode::Icestudio => choose_subproject(
            source_set,
            &testbench,
            options.subproject.as_deref(),
        )?,
        ResolvedMode::Generic => None,
    };

    let mut files: Vec<Utf8PathBuf> = source_set
        .top_level_sources()
        .map(Utf8Path::to_path_buf)
        .collect();
    if let Some(subproject) = subproject {
        files.extend(subproject.sources.iter().cloned());
    }
    files.push(testbench.clone());

    log::debug!(
        "Planned {} file(s) for testbench {testbench}",
        files.len()
    );

    Ok(CompilePlan {
        root: source_set.root.clone(),
        mode: source_set.mode,
        subproject: subproject.map(|subproject| subproject.name.clone()),
        testbench,
        files,
        defines: vec![Define {
            name: TRACE_MACRO.into(),
            value: Some(trace_stem.into()),
        }],
        artifact_path: source_set.root.join(ARTIFACT_FILE),
        trace_path: source_set.root.join(&options.trace_file_name),
    })
}

fn trace_stem(trace_file_name: &str) -> Result<&str> {
    let stem = trace_file_name.strip_suffix(".vcd").unwrap_or_default();
    ensure!(
        !stem.is_empty()
            && stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        InvalidTraceNameSnafu {
            name: trace_file_name
        }
    );
    Ok(stem)
}

fn select_testbench(
    source_set: &SourceSet,
    requested: Option<&Utf8Path>,
) -> Result<Utf8PathBuf> {
    let Some(requested) = requested else {
        return source_set
            .default_testbench()
            .map(Utf8Path::to_path_buf)
            .context(NoTestbenchSnafu {
                root: &source_set.root,
            });
    };

    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        source_set.root.join(requested)
    };
    let candidate = candidate.canonicalize_utf8().unwrap_or(candidate);

    source_set
        .testbenches
        .iter()
        .find(|testbench| **testbench == candidate)
        .cloned()
        .context(UnknownTestbenchSnafu {
            testbench: requested,
            root: &source_set.root,
        })
}

fn choose_subproject<'a>(
    source_set: &'a SourceSet,
    testbench: &Utf8Path,
    requested: Option<&str>,
) -> Result<Option<&'a Subproject>> {
    if let Some(owner) = source_set.subproject_containing(testbench) {
        return Ok(Some(owner));
    }

    if let Some(name) = requested {
        return source_set.subproject(name).map(Some).context(
            UnknownSubprojectSnafu {
                name,
                available: subproject_names(source_set),
            },
        );
    }

    // A single project directory wins over loose files in `ice-build/`.
    let mut directories = source_set.project_directories();
    if let (Some(only), None) = (directories.next(), directories.next()) {
        if source_set.subprojects.len() > 1 {
            log::debug!(
                "Using `{}`, the only project directory in `ice-build`",
                only.name
            );
        }
        return Ok(Some(only));
    }

    match source_set.subprojects.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only)),
        [first, rest @ ..] => {
            let Some(expected) = interface_of(first) else {
                return ConflictSnafu {
                    subprojects: subproject_names(source_set),
                }
                .fail();
            };
            let all_compatible = rest.iter().all(|subproject| {
                interface_of(subproject)
                    .is_some_and(|other| expected.is_compatible_with(&other))
            });
            ensure!(
                all_compatible,
                ConflictSnafu {
                    subprojects: subproject_names(source_set),
                }
            );

            log::warn!(
                "Icestudio subprojects share the interface `{expected}`; using `{}`",
                first.name
            );
            Ok(Some(first))
        }
    }
}

fn interface_of(subproject: &Subproject) -> Option<ModuleInterface> {
    match read_interface(subproject) {
        Ok(interface) => Some(interface),
        Err(error) => {
            log::warn!(
                "Treating subproject `{}` as incompatible: {error}",
                subproject.name
            );
            None
        }
    }
}

fn subproject_names(source_set: &SourceSet) -> Vec<String> {
    source_set
        .subprojects
        .iter()
        .map(|subproject| subproject.name.clone())
        .collect()
}
