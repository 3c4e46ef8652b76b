// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction of `file:line:column` locations from Icarus Verilog output.

use std::{fmt, str::Lines, sync::LazyLock};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>(?:[A-Za-z]:)?[^:\n]+?):(?P<line>\d+)(?::(?P<column>\d+))?:\s*(?:(?P<severity>error|warning|sorry)\s*:\s*)?(?P<message>.+?)\s*$",
    )
    .expect("diagnostic pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
        .fmt(f)
    }
}

/// A located message from the compiler or simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Always absolute.
    pub path: Utf8PathBuf,
    pub line: u32,
    /// 1 when the tool did not report a column.
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.path, self.line, self.column, self.severity, self.message
        )
    }
}

/// Lazily parses diagnostics out of captured tool output. See
/// [`parse_diagnostics`].
#[derive(Debug, Clone)]
pub struct Diagnostics<'a> {
    lines: Lines<'a>,
    root: &'a Utf8Path,
}

impl Iterator for Diagnostics<'_> {
    type Item = Diagnostic;

    fn next(&mut self) -> Option<Self::Item> {
        let root = self.root;
        self.lines.find_map(|line| parse_line(line, root))
    }
}

/// Parses every diagnostic in `text`, resolving relative paths against
/// `root` (the directory the tools ran in). Lines that are not diagnostics
/// are skipped.
///
/// Nothing is parsed until the iterator is advanced, and parsing the same
/// text again yields the same diagnostics.
pub fn parse_diagnostics<'a>(
    text: &'a str,
    root: &'a Utf8Path,
) -> Diagnostics<'a> {
    Diagnostics {
        lines: text.lines(),
        root,
    }
}

fn parse_line(line: &str, root: &Utf8Path) -> Option<Diagnostic> {
    let captures = DIAGNOSTIC_LINE.captures(line)?;

    let message = captures["message"].to_string();
    let severity = match captures.name("severity").map(|token| token.as_str())
    {
        Some("warning") => Severity::Warning,
        Some(_) => Severity::Error,
        // Icarus prints parse failures as `file:line: syntax error`
        None if message.to_ascii_lowercase().contains("error") => {
            Severity::Error
        }
        None => return None,
    };

    let line_number = captures["line"].parse().ok()?;
    let column = match captures.name("column") {
        Some(column) => column.as_str().parse().ok()?,
        None => 1,
    };

    let file = captures["file"].trim().trim_matches(['"', '\'', '`']);
    let path = Utf8Path::new(file);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    Some(Diagnostic {
        path,
        line: line_number,
        column,
        severity,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/projects/blinky";

    fn parse(text: &str) -> Vec<Diagnostic> {
        parse_diagnostics(text, Utf8Path::new(ROOT)).collect()
    }

    #[test]
    fn full_diagnostic_line() {
        assert_eq!(
            parse("foo.v:12:5: error: syntax error"),
            vec![Diagnostic {
                path: Utf8PathBuf::from("/projects/blinky/foo.v"),
                line: 12,
                column: 5,
                severity: Severity::Error,
                message: "syntax error".into(),
            }]
        );
    }

    #[test]
    fn unrelated_output_is_ignored() {
        let log = "VCD info: dumpfile simulation.vcd opened for output.\n\
                   main_tb.v:20: $finish called at 100 (1s)\n\
                   I give up.\n";
        assert!(parse(log).is_empty());
    }

    #[test]
    fn icarus_style_lines() {
        let log = "and_gate.v:4: syntax error\n\
                   and_gate.v:4: error: Invalid module item.\n\
                   /abs/main_tb.v:9: warning: Port 2 (b) of and_gate expects 1 bits, got 2.\n\
                   main_tb.v:7: sorry: constant selects are not supported.\n";
        let diagnostics = parse(log);

        assert_eq!(diagnostics.len(), 4);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].column, 1);
        assert_eq!(diagnostics[0].message, "syntax error");
        assert_eq!(diagnostics[1].message, "Invalid module item.");
        assert_eq!(diagnostics[2].path, Utf8PathBuf::from("/abs/main_tb.v"));
        assert_eq!(diagnostics[2].severity, Severity::Warning);
        assert_eq!(diagnostics[3].severity, Severity::Error);
        assert_eq!(
            diagnostics[3].message,
            "constant selects are not supported."
        );
    }

    #[test]
    fn quoted_paths_are_unquoted() {
        let diagnostics = parse("\"sub dir/foo.v\":3: error: oops");
        assert_eq!(
            diagnostics[0].path,
            Utf8PathBuf::from("/projects/blinky/sub dir/foo.v")
        );
    }

    #[test]
    fn parsing_is_repeatable() {
        let log = "a.v:1: error: one\nnoise\nb.v:2:3: warning: two\n";
        let root = Utf8Path::new(ROOT);
        let first: Vec<_> = parse_diagnostics(log, root).collect();
        let second: Vec<_> = parse_diagnostics(log, root).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
