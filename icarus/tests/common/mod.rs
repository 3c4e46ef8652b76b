// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, Whatever};
use tempfile::TempDir;

pub const AND_GATE: &str = "\
module and_gate(input a, input b, output y);
  assign y = a & b;
endmodule
";

pub const AND_GATE_TB: &str = "\
`define DUMPSTR(x) `\"x.vcd`\"

module main_tb;
  reg a, b;
  wire y;
  and_gate dut(.a(a), .b(b), .y(y));
  initial begin
    $dumpfile(`DUMPSTR(`VCD_OUTPUT));
    $dumpvars(0, main_tb);
    a = 0; b = 0; #10 a = 1; #10 b = 1; #10 $finish;
  end
endmodule
";

/// A project folder that is deleted when dropped.
pub struct Project {
    _directory: TempDir,
    pub root: Utf8PathBuf,
}

impl Project {
    pub fn new() -> Result<Self, Whatever> {
        let directory =
            tempfile::tempdir().whatever_context("Failed to create tempdir")?;
        let root = Utf8PathBuf::try_from(directory.path().to_path_buf())
            .whatever_context("Tempdir path is not UTF-8")?
            .canonicalize_utf8()
            .whatever_context("Failed to canonicalize tempdir")?;
        Ok(Self {
            _directory: directory,
            root,
        })
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(
        &self,
        relative: &str,
        contents: &str,
    ) -> Result<Utf8PathBuf, Whatever> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).whatever_context(format!(
                "Failed to create directory {parent}"
            ))?;
        }
        fs::write(&path, contents)
            .whatever_context(format!("Failed to write {path}"))?;
        Ok(path)
    }

    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// The standard `and_gate.v` plus `main_tb.v` project.
    pub fn and_gate() -> Result<Self, Whatever> {
        let project = Self::new()?;
        project.write("and_gate.v", AND_GATE)?;
        project.write("main_tb.v", AND_GATE_TB)?;
        Ok(project)
    }
}

/// Routes the library's log output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn top_module(ports: &str) -> String {
    format!("module main({ports});\nendmodule\n")
}

pub fn file_names(paths: &[Utf8PathBuf]) -> Vec<&str> {
    paths.iter().filter_map(|path| path.file_name()).collect()
}

pub fn relative_to<'a>(paths: &'a [Utf8PathBuf], root: &Utf8Path) -> Vec<&'a str> {
    paths
        .iter()
        .filter_map(|path| path.strip_prefix(root).ok())
        .map(Utf8Path::as_str)
        .collect()
}
