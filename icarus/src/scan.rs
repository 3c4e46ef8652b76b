// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Source discovery for project folders.
//!
//! A scan is always done from scratch: nothing is cached between calls, so
//! the returned [`SourceSet`] reflects the folder exactly as it was when
//! [`scan`] ran.

use std::{collections::HashSet, fmt, str::FromStr};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, ensure};

use crate::error::{GlobSnafu, IoSnafu, NotFoundSnafu, Result};

/// Directory Icestudio exports generated Verilog into.
pub const ICE_BUILD_DIRECTORY: &str = "ice-build";

/// File name suffix identifying a testbench.
pub const TESTBENCH_SUFFIX: &str = "_tb.v";

/// Testbench preferred over all others when present.
pub const PREFERRED_TESTBENCH: &str = "main_tb.v";

/// How to decide which files belong to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiscoveryMode {
    /// [`DiscoveryMode::Icestudio`] if the folder has an `ice-build`
    /// directory, [`DiscoveryMode::Generic`] otherwise.
    #[default]
    Auto,
    /// Top-level files plus everything under `ice-build/`.
    Icestudio,
    /// Top-level files only.
    Generic,
}

impl DiscoveryMode {
    /// Picks the concrete discovery rules for `root`.
    pub fn resolve(self, root: &Utf8Path) -> ResolvedMode {
        match self {
            Self::Auto => {
                if root.join(ICE_BUILD_DIRECTORY).is_dir() {
                    ResolvedMode::Icestudio
                } else {
                    ResolvedMode::Generic
                }
            }
            Self::Icestudio => ResolvedMode::Icestudio,
            Self::Generic => ResolvedMode::Generic,
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => "auto",
            Self::Icestudio => "icestudio",
            Self::Generic => "generic",
        }
        .fmt(f)
    }
}

impl FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "icestudio" => Ok(Self::Icestudio),
            "generic" => Ok(Self::Generic),
            other => Err(format!(
                "unknown project mode `{other}` (expected auto, icestudio, or generic)"
            )),
        }
    }
}

/// A [`DiscoveryMode`] after `Auto` has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedMode {
    Icestudio,
    Generic,
}

impl fmt::Display for ResolvedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icestudio => DiscoveryMode::Icestudio.fmt(f),
            Self::Generic => DiscoveryMode::Generic.fmt(f),
        }
    }
}

/// One design exported by Icestudio under `ice-build/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subproject {
    pub name: String,
    pub directory: Utf8PathBuf,
    /// Non-testbench files, in lexical order.
    pub sources: Vec<Utf8PathBuf>,
    /// Testbench files, in lexical order.
    pub testbenches: Vec<Utf8PathBuf>,
}

impl Subproject {
    fn from_files(
        name: impl Into<String>,
        directory: &Utf8Path,
        files: Vec<Utf8PathBuf>,
    ) -> Self {
        let (sources, testbenches) = split_testbenches(files);
        Self {
            name: name.into(),
            directory: directory.to_path_buf(),
            sources,
            testbenches,
        }
    }

    /// Whether `path` is one of this subproject's files.
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.sources.iter().chain(&self.testbenches).any(|file| file == path)
    }
}

/// The files found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Canonical project folder.
    pub root: Utf8PathBuf,
    pub mode: ResolvedMode,
    /// Non-testbench files: top-level files first, then the `ice-build`
    /// tree, each part in lexical order.
    pub sources: Vec<Utf8PathBuf>,
    /// Testbench files in lexical order.
    pub testbenches: Vec<Utf8PathBuf>,
    /// Icestudio subprojects, sorted by name. Always empty in generic mode.
    pub subprojects: Vec<Subproject>,
}

impl SourceSet {
    /// The testbench to use when the user has not picked one: `main_tb.v`
    /// if there is one (the top-level one first), otherwise the first
    /// testbench in lexical order.
    pub fn default_testbench(&self) -> Option<&Utf8Path> {
        let named_main = |testbench: &&Utf8PathBuf| {
            testbench.file_name() == Some(PREFERRED_TESTBENCH)
        };
        self.testbenches
            .iter()
            .filter(named_main)
            .find(|testbench| self.is_top_level(testbench))
            .or_else(|| self.testbenches.iter().find(named_main))
            .or_else(|| self.testbenches.first())
            .map(Utf8PathBuf::as_path)
    }

    /// Sources directly inside the project folder.
    pub fn top_level_sources(&self) -> impl Iterator<Item = &Utf8Path> {
        self.sources
            .iter()
            .filter(|source| self.is_top_level(source))
            .map(Utf8PathBuf::as_path)
    }

    pub fn subproject(&self, name: &str) -> Option<&Subproject> {
        self.subprojects
            .iter()
            .find(|subproject| subproject.name == name)
    }

    /// Subprojects that are directories under `ice-build/`, leaving out the
    /// one formed by loose files directly in `ice-build/`.
    pub fn project_directories(&self) -> impl Iterator<Item = &Subproject> {
        let ice_build = self.root.join(ICE_BUILD_DIRECTORY);
        self.subprojects
            .iter()
            .filter(move |subproject| subproject.directory != ice_build)
    }

    /// The subproject that owns `path`, if any.
    pub fn subproject_containing(&self, path: &Utf8Path) -> Option<&Subproject> {
        self.subprojects
            .iter()
            .find(|subproject| subproject.contains(path))
    }

    fn is_top_level(&self, path: &Utf8Path) -> bool {
        path.parent() == Some(self.root.as_path())
    }
}

/// Finds the Verilog sources and testbenches of the project in `root`.
///
/// Fails with [`crate::SimulationError::NotFound`] if `root` is not a
/// directory.
pub fn scan(root: &Utf8Path, mode: DiscoveryMode) -> Result<SourceSet> {
    ensure!(root.is_dir(), NotFoundSnafu { root });
    let root = root.canonicalize_utf8().context(IoSnafu { path: root })?;

    let mode = mode.resolve(&root);
    log::debug!("Scanning {root} in {mode} mode");

    let (mut sources, mut testbenches) =
        split_testbenches(verilog_files(&root, "*.v")?);

    let mut subprojects = vec![];
    let ice_build = root.join(ICE_BUILD_DIRECTORY);
    if mode == ResolvedMode::Icestudio && ice_build.is_dir() {
        let (ice_sources, ice_testbenches) =
            split_testbenches(verilog_files(&ice_build, "**/*.v")?);
        sources.extend(ice_sources);
        testbenches.extend(ice_testbenches);
        subprojects = scan_subprojects(&ice_build)?;
    }

    testbenches.sort();
    testbenches.dedup();

    Ok(SourceSet {
        root,
        mode,
        sources: dedup_in_order(sources),
        testbenches,
        subprojects,
    })
}

fn scan_subprojects(ice_build: &Utf8Path) -> Result<Vec<Subproject>> {
    let mut subprojects = vec![];

    let loose_files = verilog_files(ice_build, "*.v")?;
    if !loose_files.is_empty() {
        subprojects.push(Subproject::from_files(
            ICE_BUILD_DIRECTORY,
            ice_build,
            loose_files,
        ));
    }

    for entry in ice_build
        .read_dir_utf8()
        .context(IoSnafu { path: ice_build })?
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::warn!("Skipping unreadable entry in {ice_build}: {error}");
                continue;
            }
        };
        if !entry.path().is_dir() {
            continue;
        }

        let files = verilog_files(entry.path(), "**/*.v")?;
        if files.is_empty() {
            continue;
        }
        subprojects.push(Subproject::from_files(
            entry.file_name(),
            entry.path(),
            files,
        ));
    }

    subprojects.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
    Ok(subprojects)
}

/// Regular files under `directory` matching `pattern`, in lexical order.
fn verilog_files(
    directory: &Utf8Path,
    pattern: &str,
) -> Result<Vec<Utf8PathBuf>> {
    let pattern =
        format!("{}/{}", glob::Pattern::escape(directory.as_str()), pattern);

    let mut files = vec![];
    for entry in glob::glob(&pattern).context(GlobSnafu {
        pattern: pattern.clone(),
    })? {
        let path = match entry {
            Ok(path) => path,
            Err(error) => {
                log::warn!("Skipping unreadable path: {error}");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => files.push(path),
            Err(path) => {
                log::warn!("Skipping non-UTF-8 path {}", path.display())
            }
        }
    }

    files.sort();
    Ok(files)
}

pub(crate) fn is_testbench(path: &Utf8Path) -> bool {
    path.file_name()
        .map(|name| name.ends_with(TESTBENCH_SUFFIX))
        .unwrap_or(false)
}

fn split_testbenches(
    files: Vec<Utf8PathBuf>,
) -> (Vec<Utf8PathBuf>, Vec<Utf8PathBuf>) {
    let (testbenches, sources): (Vec<_>, Vec<_>) =
        files.into_iter().partition(|file| is_testbench(file));
    (sources, testbenches)
}

fn dedup_in_order(paths: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}
