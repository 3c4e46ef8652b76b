// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The full scan, compile, simulate, and view chain for one user.

use std::{
    panic,
    thread::{self, JoinHandle},
    time::Duration,
};

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    error::{Result, SimulationError},
    plan::{CompilePlan, PlanOptions, plan},
    run::{RunResult, RunnerOptions, Tool, ToolPaths, compile_and_run},
    scan::{DiscoveryMode, SourceSet, scan},
    trace::{TraceSnapshot, locate_trace},
    viewer::{
        DEFAULT_TERMINATION_GRACE, SystemSpawner, ViewerHandle, ViewerLaunch,
        ViewerSpawner, open_trace,
    },
};

/// Optional configuration for a [`Session`]. Usually, you can just use
/// [`SessionOptions::default()`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tools: ToolPaths,

    /// Used for requests that do not pick a mode themselves.
    pub mode: DiscoveryMode,

    /// Whether to show the trace in the waveform viewer after a successful
    /// simulation.
    pub open_viewer: bool,

    /// How long a viewer gets to exit before it is killed.
    pub viewer_grace: Duration,

    /// Whether to use the log crate.
    pub log: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            mode: DiscoveryMode::Auto,
            open_viewer: true,
            viewer_grace: DEFAULT_TERMINATION_GRACE,
            log: false,
        }
    }
}

impl SessionOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self {
            log: true,
            ..Default::default()
        }
    }
}

/// A project folder and the choices made for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRequest {
    pub root: Utf8PathBuf,
    /// Overrides [`SessionOptions::mode`].
    pub mode: Option<DiscoveryMode>,
    pub plan: PlanOptions,
}

impl SimulationRequest {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: None,
            plan: PlanOptions::default(),
        }
    }
}

/// What happened with the viewer after a simulation.
#[derive(Debug)]
pub enum ViewerOutcome {
    /// The session is configured not to open a viewer.
    Skipped,
    Launched,
    /// The viewer was already showing the trace.
    Reused,
    /// A viewer showing another trace was closed first.
    Replaced,
    /// The simulation succeeded but the viewer could not be opened.
    Failed(SimulationError),
}

impl From<ViewerLaunch> for ViewerOutcome {
    fn from(launch: ViewerLaunch) -> Self {
        match launch {
            ViewerLaunch::Spawned => Self::Launched,
            ViewerLaunch::Reused => Self::Reused,
            ViewerLaunch::Replaced => Self::Replaced,
        }
    }
}

/// Everything produced by a successful [`Session::simulate`].
#[derive(Debug)]
pub struct SimulationReport {
    pub source_set: SourceSet,
    pub plan: CompilePlan,
    pub run: RunResult,
    pub trace: Utf8PathBuf,
    pub viewer: ViewerOutcome,
}

/// Runs simulations and owns the single waveform viewer they share.
pub struct Session<S: ViewerSpawner = SystemSpawner> {
    options: SessionOptions,
    spawner: S,
    viewer: Option<ViewerHandle<S::Process>>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_spawner(options, SystemSpawner)
    }
}

impl<S: ViewerSpawner> Session<S> {
    /// A session that starts viewers through `spawner`.
    pub fn with_spawner(options: SessionOptions, spawner: S) -> Self {
        Self {
            options,
            spawner,
            viewer: None,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// The viewer this session opened, if any.
    pub fn viewer(&mut self) -> Option<&mut ViewerHandle<S::Process>> {
        self.viewer.as_mut()
    }

    /// Scans and plans without running anything.
    pub fn prepare(
        &self,
        request: &SimulationRequest,
    ) -> Result<(SourceSet, CompilePlan)> {
        let mode = request.mode.unwrap_or(self.options.mode);
        let source_set = scan(&request.root, mode)?;
        if self.options.log {
            log::info!(
                "Found {} source(s), {} testbench(es) and {} subproject(s) in {}",
                source_set.sources.len(),
                source_set.testbenches.len(),
                source_set.subprojects.len(),
                source_set.root
            );
        }
        let plan = plan(&source_set, &request.plan)?;
        Ok((source_set, plan))
    }

    /// Scans, plans, compiles and simulates `request`, then shows the trace.
    ///
    /// Failing to open the viewer does not fail the simulation; it is
    /// reported as [`ViewerOutcome::Failed`].
    pub fn simulate(
        &mut self,
        request: &SimulationRequest,
    ) -> Result<SimulationReport> {
        let (source_set, plan) = self.prepare(request)?;

        let snapshot = TraceSnapshot::capture(&plan.root)?;
        let run = compile_and_run(
            &plan,
            &self.options.tools,
            &RunnerOptions {
                log: self.options.log,
            },
        )?;
        let trace = locate_trace(&plan, &snapshot)?;
        if self.options.log {
            log::info!("Simulation wrote {trace}");
        }

        let viewer = if self.options.open_viewer {
            self.show(&trace)
        } else {
            ViewerOutcome::Skipped
        };

        Ok(SimulationReport {
            source_set,
            plan,
            run,
            trace,
            viewer,
        })
    }

    fn show(&mut self, trace: &Utf8Path) -> ViewerOutcome {
        let viewer = match self.options.tools.resolve(Tool::Viewer) {
            Ok(viewer) => viewer,
            Err(error) => return ViewerOutcome::Failed(error),
        };
        match open_trace(
            &mut self.spawner,
            &viewer,
            trace,
            &mut self.viewer,
            self.options.viewer_grace,
        ) {
            Ok(launch) => launch.into(),
            Err(error) => {
                if self.options.log {
                    log::warn!("{error}");
                }
                ViewerOutcome::Failed(error)
            }
        }
    }

    /// Closes the viewer this session opened, if it is still open.
    pub fn close_viewer(&mut self) -> Result<()> {
        if let Some(mut handle) = self.viewer.take() {
            if let Err(source) = handle.close(self.options.viewer_grace) {
                self.viewer = Some(handle);
                return Err(SimulationError::ViewerTerminate { source });
            }
        }
        Ok(())
    }
}

impl<S> Session<S>
where
    S: ViewerSpawner + Send + 'static,
    S::Process: Send + 'static,
{
    /// Runs [`Session::simulate`] on a worker thread. The session moves
    /// with it and comes back from [`BackgroundSimulation::join`], so two
    /// runs can never share a viewer at the same time.
    pub fn spawn_simulation(
        mut self,
        request: SimulationRequest,
    ) -> BackgroundSimulation<S> {
        let handle = thread::spawn(move || {
            let result = self.simulate(&request);
            (self, result)
        });
        BackgroundSimulation { handle }
    }
}

/// A simulation running on a worker thread.
pub struct BackgroundSimulation<S: ViewerSpawner = SystemSpawner> {
    handle: JoinHandle<(Session<S>, Result<SimulationReport>)>,
}

impl<S: ViewerSpawner> BackgroundSimulation<S> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run and gives back the session. A panic on the worker
    /// thread is resumed on the caller's.
    pub fn join(self) -> (Session<S>, Result<SimulationReport>) {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}
