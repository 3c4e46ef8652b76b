// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! This crate drives [Icarus Verilog](https://steveicarus.github.io/iverilog/)
//! and [GTKWave](https://gtkwave.sourceforge.net) for a folder of Verilog
//! sources and testbenches.
//!
//! A run goes through these stages, each of which is usable on its own:
//!
//! 1. [`scan()`] finds the sources and testbenches (`*_tb.v`) in a project
//!    folder, including Icestudio's `ice-build/` exports.
//! 2. [`plan()`] picks one testbench and the matching design files.
//! 3. [`compile_and_run`] invokes `iverilog` and then `vvp`.
//! 4. [`locate_trace`] finds the waveform the testbench dumped.
//! 5. [`open_trace`] shows it, keeping at most one viewer open.
//!
//! [`Session`] chains all of these and owns the viewer between runs:
//!
//! ```no_run
//! use benchsim_icarus::{Session, SessionOptions, SimulationRequest};
//!
//! let mut session = Session::new(SessionOptions::default_logging());
//! match session.simulate(&SimulationRequest::new("projects/and_gate")) {
//!     Ok(report) => println!("Trace written to {}", report.trace),
//!     Err(error) => {
//!         for diagnostic in error.diagnostics().into_iter().flatten() {
//!             eprintln!("{diagnostic}");
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod diagnostics;
mod error;
pub mod interface;
pub mod plan;
pub mod run;
pub mod scan;
pub mod session;
pub mod trace;
pub mod viewer;

pub use config::{PROJECT_FILE, ProjectConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, parse_diagnostics};
pub use error::{Result, SimulationError};
pub use interface::{ModuleInterface, PortDirection, read_interface};
pub use plan::{CompilePlan, Define, PlanOptions, plan};
pub use run::{
    RunResult, RunnerOptions, Step, StepOutput, Tool, ToolPaths,
    compile_and_run, is_stale, resolve_executable,
};
pub use scan::{DiscoveryMode, ResolvedMode, SourceSet, Subproject, scan};
pub use session::{
    BackgroundSimulation, Session, SessionOptions, SimulationReport,
    SimulationRequest, ViewerOutcome,
};
pub use trace::{TraceSnapshot, locate_trace};
pub use viewer::{
    ChildViewer, DEFAULT_TERMINATION_GRACE, SystemSpawner, ViewerHandle,
    ViewerLaunch, ViewerProcess, ViewerSpawner, open_trace,
};
