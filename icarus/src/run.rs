// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

// hardcoded knowledge:
// - `iverilog -o <artifact>` writes a script that `vvp <artifact>` executes
// - `vvp` is installed next to `iverilog`
// - both tools report paths relative to their working directory

use std::{
    env, fmt, fs,
    io::{self, Read},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, ensure};

use crate::{
    diagnostics::{Diagnostics, parse_diagnostics},
    error::{
        CaptureSnafu, IoSnafu, Result, SpawnSnafu, ToolExecutionSnafu,
        ToolNotFoundSnafu,
    },
    plan::CompilePlan,
};

/// An external program BenchSim drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Compiler,
    Simulator,
    Viewer,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Compiler => "compiler",
            Tool::Simulator => "simulator",
            Tool::Viewer => "waveform viewer",
        }
        .fmt(f)
    }
}

/// One of the two subprocess invocations of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Compile,
    Simulate,
}

impl Step {
    pub fn tool(self) -> Tool {
        match self {
            Step::Compile => Tool::Compiler,
            Step::Simulate => Tool::Simulator,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Compile => "Compilation",
            Step::Simulate => "Simulation",
        }
        .fmt(f)
    }
}

/// Where to find the external tools. Bare names (the default) are looked up
/// on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// The `iverilog` executable.
    pub compiler: Utf8PathBuf,

    /// The `vvp` executable.
    pub simulator: Utf8PathBuf,

    /// The `gtkwave` executable.
    pub viewer: Utf8PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            compiler: "iverilog".into(),
            simulator: "vvp".into(),
            viewer: "gtkwave".into(),
        }
    }
}

impl ToolPaths {
    /// Uses `compiler` and the `vvp` installed next to it, falling back to
    /// `vvp` on `PATH`.
    pub fn from_compiler(compiler: impl Into<Utf8PathBuf>) -> Self {
        let compiler = compiler.into();
        Self {
            simulator: sibling_simulator(&compiler),
            compiler,
            ..Default::default()
        }
    }

    pub fn path(&self, tool: Tool) -> &Utf8Path {
        match tool {
            Tool::Compiler => &self.compiler,
            Tool::Simulator => &self.simulator,
            Tool::Viewer => &self.viewer,
        }
    }

    /// Finds the executable configured for `tool`.
    pub fn resolve(&self, tool: Tool) -> Result<Utf8PathBuf> {
        resolve_executable(tool, self.path(tool))
    }
}

pub(crate) fn sibling_simulator(compiler: &Utf8Path) -> Utf8PathBuf {
    let simulator_name = if cfg!(windows) { "vvp.exe" } else { "vvp" };
    compiler
        .parent()
        .filter(|directory| !directory.as_str().is_empty())
        .map(|directory| directory.join(simulator_name))
        .filter(|simulator| simulator.is_file())
        .unwrap_or_else(|| simulator_name.into())
}

/// Checks that `path` names an executable file. A bare program name is
/// searched for on `PATH`.
pub fn resolve_executable(tool: Tool, path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        ensure!(is_executable(path.as_std_path()), ToolNotFoundSnafu { tool, path });
        return Ok(path.to_path_buf());
    }

    if !path.as_str().is_empty() {
        let search_path = env::var_os("PATH").unwrap_or_default();
        for directory in env::split_paths(&search_path) {
            let mut candidates = vec![directory.join(path)];
            if cfg!(windows) {
                candidates.push(directory.join(format!("{path}.exe")));
            }
            for candidate in candidates {
                if is_executable(&candidate) {
                    if let Ok(candidate) = Utf8PathBuf::from_path_buf(candidate) {
                        return Ok(candidate);
                    }
                }
            }
        }
    }

    ToolNotFoundSnafu { tool, path }.fail()
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// What one subprocess printed and how it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: Step,
    /// The command line, for display.
    pub command: String,
    /// `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// The outcome of [`compile_and_run`]. The simulator step is absent when
/// compilation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    root: Utf8PathBuf,
    compile: StepOutput,
    simulate: Option<StepOutput>,
    text: String,
}

impl RunResult {
    fn new(
        root: Utf8PathBuf,
        compile: StepOutput,
        simulate: Option<StepOutput>,
    ) -> Self {
        let mut text = compile.combined();
        if let Some(simulate) = &simulate {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&simulate.combined());
        }
        Self {
            root,
            compile,
            simulate,
            text,
        }
    }

    pub fn compile(&self) -> &StepOutput {
        &self.compile
    }

    pub fn simulate(&self) -> Option<&StepOutput> {
        self.simulate.as_ref()
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepOutput> {
        std::iter::once(&self.compile).chain(self.simulate.as_ref())
    }

    pub fn step(&self, step: Step) -> Option<&StepOutput> {
        self.steps().find(|output| output.step == step)
    }

    /// Exit code of the last step that ran.
    pub fn exit_code(&self) -> Option<i32> {
        self.steps().last().and_then(|output| output.code)
    }

    pub fn success(&self) -> bool {
        self.steps().all(|output| output.success)
            && self.simulate.is_some()
    }

    /// Output of all steps, in order.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Diagnostics in [`RunResult::text`], with absolute paths.
    pub fn diagnostics(&self) -> Diagnostics<'_> {
        parse_diagnostics(&self.text, &self.root)
    }

    /// Human-readable dump of one step's output.
    pub fn transcript(&self, step: Step) -> String {
        match self.step(step) {
            Some(output) => format!(
                "$ {}\n\n--- STDOUT ---\n{}\n\n--- STDERR ---\n{}",
                output.command, output.stdout, output.stderr
            ),
            None => format!("{step} did not run"),
        }
    }
}

/// Optional configuration for [`compile_and_run`]. Usually, you can just
/// use [`RunnerOptions::default()`].
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Whether to use the log crate.
    pub log: bool,
}

impl RunnerOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self { log: true }
    }
}

/// Compiles `plan` and, if that succeeds, simulates it. Both tools run in
/// the project folder and block until they exit.
///
/// A tool that exits unsuccessfully yields
/// [`crate::SimulationError::ToolExecution`] carrying everything captured so
/// far; when the compiler fails the simulator is never started.
pub fn compile_and_run(
    plan: &CompilePlan,
    tools: &ToolPaths,
    options: &RunnerOptions,
) -> Result<RunResult> {
    if options.log {
        log::info!("Validating tool paths");
    }
    let compiler = tools.resolve(Tool::Compiler)?;
    let simulator = tools.resolve(Tool::Simulator)?;

    if options.log {
        log::info!(
            "Compiling {} file(s) with {compiler} in {}",
            plan.files.len(),
            plan.root
        );
    }
    let compile = run_step(
        Step::Compile,
        &compiler,
        &plan.compiler_arguments(),
        &plan.root,
    )?;
    if !compile.success {
        if options.log {
            log::info!("Compilation failed, skipping simulation");
        }
        return ToolExecutionSnafu {
            step: Step::Compile,
            code: compile.code,
            result: Box::new(RunResult::new(plan.root.clone(), compile, None)),
        }
        .fail();
    }

    if options.log {
        log::info!("Simulating {} with {simulator}", plan.artifact_path);
    }
    let simulate = run_step(
        Step::Simulate,
        &simulator,
        &plan.simulator_arguments(),
        &plan.root,
    )?;
    let (success, code) = (simulate.success, simulate.code);
    let result = RunResult::new(plan.root.clone(), compile, Some(simulate));
    ensure!(
        success,
        ToolExecutionSnafu {
            step: Step::Simulate,
            code,
            result: Box::new(result),
        }
    );

    Ok(result)
}

fn run_step(
    step: Step,
    program: &Utf8Path,
    arguments: &[String],
    working_directory: &Utf8Path,
) -> Result<StepOutput> {
    let tool = step.tool();
    let child = ScopedChild::spawn(
        Command::new(program)
            .args(arguments)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped()),
    )
    .context(SpawnSnafu {
        tool,
        path: program,
    })?;

    let (status, stdout, stderr) =
        child.wait_with_output().context(CaptureSnafu { tool })?;

    Ok(StepOutput {
        step,
        command: format!("{program} {}", arguments.join(" ")),
        code: status.code(),
        success: status.success(),
        stdout,
        stderr,
    })
}

/// A child process that is killed and reaped if it is dropped before
/// [`ScopedChild::wait_with_output`] collects it.
struct ScopedChild {
    child: Child,
    reaped: bool,
}

impl ScopedChild {
    fn spawn(command: &mut Command) -> io::Result<Self> {
        Ok(Self {
            child: command.spawn()?,
            reaped: false,
        })
    }

    /// Drains stdout and stderr concurrently so neither pipe can fill up and
    /// stall the child, then waits for it to exit.
    fn wait_with_output(mut self) -> io::Result<(ExitStatus, String, String)> {
        let stdout_pipe = self.child.stdout.take();
        let stderr_pipe = self.child.stderr.take();

        let (stdout, stderr) = thread::scope(|scope| {
            let stderr_reader = scope.spawn(move || read_pipe(stderr_pipe));
            let stdout = read_pipe(stdout_pipe);
            let stderr = stderr_reader.join().unwrap_or_else(|_| {
                Err(io::Error::other("stderr reader thread panicked"))
            });
            (stdout, stderr)
        });
        let (stdout, stderr) = (stdout?, stderr?);

        let status = self.child.wait()?;
        self.reaped = true;
        Ok((status, stdout, stderr))
    }
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn read_pipe(pipe: Option<impl Read>) -> io::Result<String> {
    let mut buffer = vec![];
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer)?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Whether `plan` needs to be compiled again: the artifact is missing or
/// some file in the plan was edited after it was built.
pub fn is_stale(plan: &CompilePlan) -> Result<bool> {
    let Ok(last_built) =
        fs::metadata(&plan.artifact_path).and_then(|metadata| metadata.modified())
    else {
        return Ok(true);
    };

    for file in &plan.files {
        let last_edited = fs::metadata(file)
            .and_then(|metadata| metadata.modified())
            .context(IoSnafu { path: file })?;
        if last_edited > last_built {
            return Ok(true);
        }
    }

    Ok(false)
}
