// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Finding the waveform a simulation just wrote.
//!
//! Testbenches normally name their dump after the `VCD_OUTPUT` macro, but
//! hand-written ones often hardcode `$dumpfile("whatever.vcd")`. Comparing
//! the `*.vcd` files in the project folder before and after simulation finds
//! the trace either way.

use std::{collections::HashMap, fs, time::SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{OptionExt, ResultExt};

use crate::{
    error::{GlobSnafu, Result, TraceNotFoundSnafu},
    plan::CompilePlan,
};

/// Modification times of the `*.vcd` files in a folder at some instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSnapshot {
    modified: HashMap<Utf8PathBuf, SystemTime>,
}

impl TraceSnapshot {
    /// Records the `*.vcd` files directly inside `root`.
    pub fn capture(root: &Utf8Path) -> Result<Self> {
        let pattern = format!("{}/*.vcd", glob::Pattern::escape(root.as_str()));

        let mut modified = HashMap::new();
        for path in glob::glob(&pattern)
            .context(GlobSnafu {
                pattern: pattern.clone(),
            })?
            .flatten()
        {
            let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                continue;
            };
            if let Ok(mtime) =
                fs::metadata(&path).and_then(|metadata| metadata.modified())
            {
                modified.insert(path, mtime);
            }
        }

        Ok(Self { modified })
    }

    pub fn len(&self) -> usize {
        self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty()
    }

    pub fn modified(&self, path: &Utf8Path) -> Option<SystemTime> {
        self.modified.get(path).copied()
    }

    /// Traces in `self` that are absent from `before` or were modified since.
    fn changed_since<'a>(
        &'a self,
        before: &'a TraceSnapshot,
    ) -> impl Iterator<Item = (&'a Utf8PathBuf, SystemTime)> + 'a {
        self.modified
            .iter()
            .filter(move |(path, mtime)| {
                before
                    .modified(path)
                    .is_none_or(|previous| **mtime > previous)
            })
            .map(|(path, mtime)| (path, *mtime))
    }

    fn newest(&self) -> Option<&Utf8PathBuf> {
        self.modified
            .iter()
            .max_by(|lhs, rhs| lhs.1.cmp(rhs.1).then_with(|| rhs.0.cmp(lhs.0)))
            .map(|(path, _)| path)
    }
}

/// Picks the trace written by simulating `plan`, given a `before` snapshot
/// taken just before the simulator ran.
///
/// In order of preference: the plan's trace path if it is new or modified,
/// the newest other new or modified `*.vcd`, the plan's trace path if it
/// exists at all, then the newest `*.vcd` in the folder.
pub fn locate_trace(
    plan: &CompilePlan,
    before: &TraceSnapshot,
) -> Result<Utf8PathBuf> {
    let after = TraceSnapshot::capture(&plan.root)?;

    let mut changed: Vec<_> = after.changed_since(before).collect();
    if changed.iter().any(|(path, _)| **path == plan.trace_path) {
        return Ok(plan.trace_path.clone());
    }
    changed.sort_by(|lhs, rhs| rhs.1.cmp(&lhs.1).then_with(|| lhs.0.cmp(rhs.0)));
    if let Some((path, _)) = changed.first() {
        log::debug!("Using trace {path} written by the testbench");
        return Ok((*path).clone());
    }

    if plan.trace_path.is_file() {
        log::debug!("Trace {} was not updated by the simulation", plan.trace_path);
        return Ok(plan.trace_path.clone());
    }

    after.newest().cloned().context(TraceNotFoundSnafu {
        trace: &plan.trace_path,
    })
}
