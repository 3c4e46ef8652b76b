// Copyright (C) 2024 Ethan Uppal.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3 of the License only.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{
    env::{self, current_dir},
    fs, thread,
    time::{Duration, SystemTime},
};

use argh::FromArgs;
use benchsim_icarus::{
    CompilePlan, Diagnostic, DiscoveryMode, ProjectConfig,
    Session, SessionOptions, Severity, SimulationError, SimulationReport,
    SimulationRequest, ToolPaths, ViewerOutcome, is_stale, parse_diagnostics,
    scan,
};
use camino::{Utf8Path, Utf8PathBuf};
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use settings::{UserSettings, default_settings_path};
use snafu::{ResultExt, Whatever, whatever};

mod settings;

/// Compile, simulate, and view Verilog testbenches with Icarus Verilog and
/// GTKWave
#[derive(FromArgs)]
struct BenchSimCommand {
    /// log what BenchSim is doing
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// read and write user settings at this path instead of the per-user
    /// configuration directory
    #[argh(option)]
    settings: Option<Utf8PathBuf>,

    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Scan(ScanSubcommand),
    Plan(PlanSubcommand),
    Run(RunSubcommand),
    Watch(WatchSubcommand),
    Diagnostics(DiagnosticsSubcommand),
    Settings(SettingsSubcommand),
}

/// list the sources, testbenches, and Icestudio subprojects of a project
#[derive(FromArgs)]
#[argh(subcommand, name = "scan")]
struct ScanSubcommand {
    /// the project folder (defaults to the current directory)
    #[argh(positional)]
    root: Option<Utf8PathBuf>,

    /// how to find sources: auto, icestudio, or generic
    #[argh(option)]
    mode: Option<DiscoveryMode>,
}

/// show the commands a run would execute
#[derive(FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanSubcommand {
    /// the project folder (defaults to the current directory)
    #[argh(positional)]
    root: Option<Utf8PathBuf>,

    /// how to find sources: auto, icestudio, or generic
    #[argh(option)]
    mode: Option<DiscoveryMode>,

    /// the testbench to simulate, relative to the project folder
    #[argh(option, short = 't')]
    testbench: Option<Utf8PathBuf>,

    /// the Icestudio subproject to simulate
    #[argh(option, short = 's')]
    subproject: Option<String>,

    /// the waveform file name, e.g. simulation.vcd
    #[argh(option)]
    trace: Option<String>,
}

/// compile and simulate a testbench, then show its waveform
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunSubcommand {
    /// the project folder (defaults to the current directory)
    #[argh(positional)]
    root: Option<Utf8PathBuf>,

    /// how to find sources: auto, icestudio, or generic
    #[argh(option)]
    mode: Option<DiscoveryMode>,

    /// the testbench to simulate, relative to the project folder
    #[argh(option, short = 't')]
    testbench: Option<Utf8PathBuf>,

    /// the Icestudio subproject to simulate
    #[argh(option, short = 's')]
    subproject: Option<String>,

    /// the waveform file name, e.g. simulation.vcd
    #[argh(option)]
    trace: Option<String>,

    /// do not open the waveform viewer
    #[argh(switch)]
    no_viewer: bool,

    /// keep running until the waveform viewer is closed
    #[argh(switch, short = 'w')]
    wait: bool,
}

/// rerun the simulation whenever a source file changes
#[derive(FromArgs)]
#[argh(subcommand, name = "watch")]
struct WatchSubcommand {
    /// the project folder (defaults to the current directory)
    #[argh(positional)]
    root: Option<Utf8PathBuf>,

    /// how to find sources: auto, icestudio, or generic
    #[argh(option)]
    mode: Option<DiscoveryMode>,

    /// the testbench to simulate, relative to the project folder
    #[argh(option, short = 't')]
    testbench: Option<Utf8PathBuf>,

    /// the Icestudio subproject to simulate
    #[argh(option, short = 's')]
    subproject: Option<String>,

    /// the waveform file name, e.g. simulation.vcd
    #[argh(option)]
    trace: Option<String>,

    /// milliseconds between checks for changes
    #[argh(option, default = "1000")]
    interval: u64,
}

/// extract file:line:column diagnostics from a saved compiler or simulator
/// log
#[derive(FromArgs)]
#[argh(subcommand, name = "diagnostics")]
struct DiagnosticsSubcommand {
    /// the log file
    #[argh(positional)]
    log: Utf8PathBuf,

    /// the directory the tools ran in (defaults to the log's directory)
    #[argh(option)]
    root: Option<Utf8PathBuf>,
}

/// show or change the user settings
#[derive(FromArgs)]
#[argh(subcommand, name = "settings")]
struct SettingsSubcommand {
    /// path to iverilog (an empty string resets it)
    #[argh(option)]
    iverilog: Option<String>,

    /// path to vvp (an empty string resets it)
    #[argh(option)]
    vvp: Option<String>,

    /// path to gtkwave (an empty string resets it)
    #[argh(option)]
    gtkwave: Option<String>,

    /// default discovery mode: auto, icestudio, or generic
    #[argh(option)]
    mode: Option<DiscoveryMode>,

    /// forget the recently used projects
    #[argh(switch)]
    clear_recent: bool,
}

/// The project-selecting flags shared by `plan`, `run`, and `watch`.
struct ProjectArguments {
    root: Option<Utf8PathBuf>,
    mode: Option<DiscoveryMode>,
    testbench: Option<Utf8PathBuf>,
    subproject: Option<String>,
    trace: Option<String>,
}

impl From<PlanSubcommand> for ProjectArguments {
    fn from(command: PlanSubcommand) -> Self {
        Self {
            root: command.root,
            mode: command.mode,
            testbench: command.testbench,
            subproject: command.subproject,
            trace: command.trace,
        }
    }
}

/// Everything resolved from the command line, `benchsim.toml`, and the user
/// settings, in that order of precedence.
struct Project {
    request: SimulationRequest,
    tools: ToolPaths,
}

impl Project {
    fn resolve(
        arguments: ProjectArguments,
        current_directory: &Utf8Path,
        settings: &UserSettings,
    ) -> Result<Self, Whatever> {
        let root = match arguments.root {
            Some(root) if root.is_relative() => current_directory.join(root),
            Some(root) => root,
            None => current_directory.to_path_buf(),
        };

        let mut tools = ToolPaths::default();
        settings.apply_to_tools(&mut tools);
        let mut request = SimulationRequest::new(&root);
        request.mode = settings.project_mode;

        if root.is_dir() {
            if let Some(config) = ProjectConfig::load(&root)
                .whatever_context("Failed to load project settings")?
            {
                config.apply_to_tools(&mut tools);
                config.apply_to_plan_options(&mut request.plan);
                request.mode = config.mode.or(request.mode);
            }
        }

        request.mode = arguments.mode.or(request.mode);
        if let Some(testbench) = arguments.testbench {
            request.plan.testbench = Some(testbench);
        }
        if let Some(subproject) = arguments.subproject {
            request.plan.subproject = Some(subproject);
        }
        if let Some(trace) = arguments.trace {
            request.plan.trace_file_name = trace;
        }

        Ok(Self { request, tools })
    }

    fn session_options(&self, verbose: bool) -> SessionOptions {
        SessionOptions {
            tools: self.tools.clone(),
            log: verbose,
            ..Default::default()
        }
    }
}

fn status(label: &str, message: impl std::fmt::Display) {
    println!("{:>12} {}", label.bold().green(), message);
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let severity = match diagnostic.severity {
        Severity::Error => "error".bold().bright_red().to_string(),
        Severity::Warning => "warning".bold().bright_yellow().to_string(),
    };
    println!(
        "{}:{}:{}: {}: {}",
        diagnostic.path,
        diagnostic.line,
        diagnostic.column,
        severity,
        diagnostic.message
    );
}

fn print_report(report: &SimulationReport) {
    let simulator_output = report
        .run
        .simulate()
        .map(|output| output.combined())
        .unwrap_or_default();
    if !simulator_output.trim().is_empty() {
        println!("{}", simulator_output.trim_end());
    }
    for diagnostic in report
        .run
        .diagnostics()
        .filter(|diagnostic| diagnostic.severity == Severity::Warning)
    {
        print_diagnostic(&diagnostic);
    }

    status("Finished", format!("trace written to {}", report.trace));
    match &report.viewer {
        ViewerOutcome::Skipped => {}
        ViewerOutcome::Launched => status("Viewing", &report.trace),
        ViewerOutcome::Reused => {
            status("Viewing", format!("{} (already open)", report.trace))
        }
        ViewerOutcome::Replaced => {
            status("Viewing", format!("{} (reopened)", report.trace))
        }
        ViewerOutcome::Failed(error) => println!(
            "{:>12} {}",
            "warning".bold().bright_yellow(),
            snafu::Report::from_error(error)
        ),
    }
}

/// Prints what went wrong, with any diagnostics the tools reported.
fn print_failure(error: &SimulationError) {
    let diagnostics: Vec<_> =
        error.diagnostics().into_iter().flatten().collect();
    if diagnostics.is_empty() {
        println!("{:>12} {}", "error".bold().bright_red(), error);
        return;
    }

    let step = match error {
        SimulationError::ToolExecution { step, .. } => step.to_string(),
        _ => "The run".into(),
    };
    println!(
        "{:>12} {} reported {} problem{}",
        "error".bold().bright_red(),
        step,
        diagnostics.len(),
        if diagnostics.len() == 1 { "" } else { "s" }
    );
    for diagnostic in &diagnostics {
        print_diagnostic(diagnostic);
    }
}

fn simulate_once(
    session: &mut Session,
    request: &SimulationRequest,
) -> Result<SimulationReport, SimulationError> {
    let spinner = ProgressBar::new_spinner()
        .with_message(format!("Compiling and simulating {}", request.root));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = session.simulate(request);
    spinner.finish_and_clear();
    result
}

fn describe_plan(plan: &CompilePlan, tools: &ToolPaths) {
    status("Testbench", &plan.testbench);
    if let Some(subproject) = &plan.subproject {
        status("Subproject", subproject);
    }
    println!(
        "{:>12} {} {}",
        "Compile".bold().cyan(),
        tools.compiler,
        plan.compiler_arguments().join(" ")
    );
    println!(
        "{:>12} {} {}",
        "Simulate".bold().cyan(),
        tools.simulator,
        plan.simulator_arguments().join(" ")
    );
    println!("{:>12} {}", "Trace".bold().cyan(), plan.trace_path);
}

fn scan_command(
    command: ScanSubcommand,
    current_directory: &Utf8Path,
    settings: &UserSettings,
) -> Result<(), Whatever> {
    let root = command
        .root
        .map(|root| current_directory.join(root))
        .unwrap_or_else(|| current_directory.to_path_buf());
    let mode = command
        .mode
        .or(settings.project_mode)
        .unwrap_or_default();

    let source_set =
        scan(&root, mode).whatever_context("Failed to scan project")?;

    status("Scanned", format!("{} ({} mode)", source_set.root, source_set.mode));
    let relative = |path: &Utf8Path| {
        path.strip_prefix(&source_set.root)
            .unwrap_or(path)
            .to_string()
    };
    println!("{}", "Sources".bold());
    for source in &source_set.sources {
        println!("  {}", relative(source.as_path()));
    }
    println!("{}", "Testbenches".bold());
    for testbench in &source_set.testbenches {
        let marker = if Some(testbench.as_path()) == source_set.default_testbench()
        {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", relative(testbench.as_path()), marker);
    }
    if !source_set.subprojects.is_empty() {
        println!("{}", "Subprojects".bold());
        for subproject in &source_set.subprojects {
            println!(
                "  {} ({} source{})",
                subproject.name,
                subproject.sources.len(),
                if subproject.sources.len() == 1 { "" } else { "s" }
            );
        }
    }
    Ok(())
}

fn plan_command(
    project: Project,
    verbose: bool,
) -> Result<(), Whatever> {
    let session = Session::new(project.session_options(verbose));
    let (_, plan) = session
        .prepare(&project.request)
        .whatever_context("Failed to plan simulation")?;
    describe_plan(&plan, &project.tools);
    Ok(())
}

fn run_command(
    project: Project,
    no_viewer: bool,
    wait: bool,
    verbose: bool,
) -> Result<(), Whatever> {
    let mut options = project.session_options(verbose);
    options.open_viewer = !no_viewer;
    let mut session = Session::new(options);

    match simulate_once(&mut session, &project.request) {
        Ok(report) => print_report(&report),
        Err(error) => {
            print_failure(&error);
            whatever!("Exiting due to failure");
        }
    }

    if wait {
        if let Some(viewer) = session.viewer() {
            status("Waiting", "for the waveform viewer to close");
            while viewer.is_running() {
                thread::sleep(Duration::from_millis(250));
            }
        }
    }

    Ok(())
}

fn watch_command(
    project: Project,
    interval: Duration,
    verbose: bool,
) -> Result<(), Whatever> {
    let mut session = Session::new(project.session_options(verbose));
    status(
        "Watching",
        format!("{} (press Ctrl-C to stop)", project.request.root),
    );

    // inputs of the last failed run, so it is retried only after an edit
    let mut failed: Option<(Vec<Utf8PathBuf>, SystemTime)> = None;
    let mut ran_once = false;
    loop {
        match session.prepare(&project.request) {
            Ok((_, plan)) => {
                let stale = is_stale(&plan).unwrap_or(true);
                let retry = match &failed {
                    Some((files, failed_at)) => {
                        *files != plan.files || edited_since(&plan.files, *failed_at)
                    }
                    None => true,
                };
                if (stale || !ran_once) && retry {
                    ran_once = true;
                    let started = SystemTime::now();
                    match simulate_once(&mut session, &project.request) {
                        Ok(report) => {
                            print_report(&report);
                            failed = None;
                        }
                        Err(error) => {
                            print_failure(&error);
                            failed = Some((plan.files, started));
                        }
                    }
                }
            }
            Err(error) => {
                let files = vec![];
                if failed.as_ref().is_none_or(|(previous, _)| *previous != files) {
                    print_failure(&error);
                    failed = Some((files, SystemTime::now()));
                }
            }
        }
        thread::sleep(interval);
    }
}

fn edited_since(files: &[Utf8PathBuf], instant: SystemTime) -> bool {
    files.iter().any(|file| {
        fs::metadata(file)
            .and_then(|metadata| metadata.modified())
            .map(|modified| modified > instant)
            .unwrap_or(true)
    })
}

fn diagnostics_command(
    command: DiagnosticsSubcommand,
    current_directory: &Utf8Path,
) -> Result<(), Whatever> {
    let log_path = current_directory.join(&command.log);
    let text = fs::read_to_string(&log_path)
        .whatever_context(format!("Failed to read {log_path}"))?;
    let root = match command.root {
        Some(root) => current_directory.join(root),
        None => log_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| current_directory.to_path_buf()),
    };

    let mut count = 0;
    for diagnostic in parse_diagnostics(&text, &root) {
        print_diagnostic(&diagnostic);
        count += 1;
    }
    status(
        "Finished",
        format!("{count} diagnostic{}", if count == 1 { "" } else { "s" }),
    );
    Ok(())
}

fn settings_command(
    command: SettingsSubcommand,
    settings: &mut UserSettings,
    settings_path: &Utf8Path,
) -> Result<(), Whatever> {
    let as_path = |value: String| {
        if value.is_empty() {
            None
        } else {
            Some(Utf8PathBuf::from(value))
        }
    };
    let mut changed = false;
    if let Some(iverilog) = command.iverilog {
        settings.iverilog_path = as_path(iverilog);
        changed = true;
    }
    if let Some(vvp) = command.vvp {
        settings.vvp_path = as_path(vvp);
        changed = true;
    }
    if let Some(gtkwave) = command.gtkwave {
        settings.gtkwave_path = as_path(gtkwave);
        changed = true;
    }
    if let Some(mode) = command.mode {
        settings.project_mode = Some(mode);
        changed = true;
    }
    if command.clear_recent {
        settings.recent_projects.clear();
        changed = true;
    }
    if changed {
        settings.save(settings_path)?;
        status("Saved", settings_path);
    }

    let mut tools = ToolPaths::default();
    settings.apply_to_tools(&mut tools);
    println!("{:>12} {}", "iverilog".bold().cyan(), tools.compiler);
    println!("{:>12} {}", "vvp".bold().cyan(), tools.simulator);
    println!("{:>12} {}", "gtkwave".bold().cyan(), tools.viewer);
    println!(
        "{:>12} {}",
        "mode".bold().cyan(),
        settings.project_mode.unwrap_or_default()
    );
    if !settings.recent_projects.is_empty() {
        println!("{}", "Recent projects".bold());
        for project in &settings.recent_projects {
            println!("  {project}");
        }
    }
    Ok(())
}

/// Records `root` as recently used. Failing to do so only costs a warning.
fn remember_project(
    settings: &mut UserSettings,
    settings_path: &Utf8Path,
    root: &Utf8Path,
) {
    let root = root.canonicalize_utf8().unwrap_or_else(|_| root.to_path_buf());
    settings.push_recent(&root);
    if let Err(error) = settings.save(settings_path) {
        log::warn!("{}", snafu::Report::from_error(error));
    }
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    let command: BenchSimCommand = argh::from_env();

    if command.verbose || env::var_os("RUST_LOG").is_some() {
        let mut logger = colog::default_builder();
        if command.verbose {
            logger.filter_level(log::LevelFilter::Debug);
        }
        logger.init();
    }

    let current_directory = Utf8PathBuf::from_path_buf(
        current_dir()
            .whatever_context("Failed to determine current directory")?,
    )
    .map_err(|_| "?")
    .whatever_context("Failed to parse current directory as UTF-8")?;

    let settings_path = match command.settings {
        Some(path) => current_directory.join(path),
        None => default_settings_path()?,
    };
    let mut settings = UserSettings::load(&settings_path)?;
    if settings.prune_missing() {
        log::info!("Removed missing folders from the recent projects");
        if let Err(error) = settings.save(&settings_path) {
            log::warn!("{}", snafu::Report::from_error(error));
        }
    }

    let verbose = command.verbose;
    match command.subcommand {
        Subcommand::Scan(scan_subcommand) => {
            scan_command(scan_subcommand, &current_directory, &settings)
        }
        Subcommand::Plan(plan_subcommand) => {
            let project = Project::resolve(
                plan_subcommand.into(),
                &current_directory,
                &settings,
            )?;
            plan_command(project, verbose)
        }
        Subcommand::Run(run_subcommand) => {
            let RunSubcommand {
                root,
                mode,
                testbench,
                subproject,
                trace,
                no_viewer,
                wait,
            } = run_subcommand;
            let project = Project::resolve(
                ProjectArguments {
                    root,
                    mode,
                    testbench,
                    subproject,
                    trace,
                },
                &current_directory,
                &settings,
            )?;
            let root = project.request.root.clone();
            run_command(project, no_viewer, wait, verbose)?;
            remember_project(&mut settings, &settings_path, &root);
            Ok(())
        }
        Subcommand::Watch(watch_subcommand) => {
            let WatchSubcommand {
                root,
                mode,
                testbench,
                subproject,
                trace,
                interval,
            } = watch_subcommand;
            let project = Project::resolve(
                ProjectArguments {
                    root,
                    mode,
                    testbench,
                    subproject,
                    trace,
                },
                &current_directory,
                &settings,
            )?;
            remember_project(&mut settings, &settings_path, &project.request.root);
            watch_command(project, Duration::from_millis(interval.max(50)), verbose)
        }
        Subcommand::Diagnostics(diagnostics_subcommand) => {
            diagnostics_command(diagnostics_subcommand, &current_directory)
        }
        Subcommand::Settings(settings_subcommand) => {
            settings_command(settings_subcommand, &mut settings, &settings_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use benchsim_icarus::PlanOptions;
    use snafu::{ResultExt, Whatever};

    use super::*;

    fn arguments() -> ProjectArguments {
        ProjectArguments {
            root: None,
            mode: None,
            testbench: None,
            subproject: None,
            trace: None,
        }
    }

    fn project_folder() -> Result<(tempfile::TempDir, Utf8PathBuf), Whatever> {
        let directory =
            tempfile::tempdir().whatever_context("Failed to create tempdir")?;
        let root = Utf8PathBuf::try_from(directory.path().to_path_buf())
            .whatever_context("Tempdir is not UTF-8")?;
        Ok((directory, root))
    }

    fn user_settings() -> UserSettings {
        UserSettings {
            vvp_path: Some("/settings/vvp".into()),
            gtkwave_path: Some("/settings/gtkwave".into()),
            project_mode: Some(DiscoveryMode::Generic),
            ..Default::default()
        }
    }

    #[test]
    #[snafu::report]
    fn defaults_apply_without_any_settings() -> Result<(), Whatever> {
        let (_directory, root) = project_folder()?;

        let project =
            Project::resolve(arguments(), &root, &UserSettings::default())?;

        assert_eq!(project.request.root, root);
        assert_eq!(project.request.mode, None);
        assert_eq!(project.request.plan, PlanOptions::default());
        assert_eq!(project.tools, ToolPaths::default());
        Ok(())
    }

    #[test]
    #[snafu::report]
    fn user_settings_override_defaults() -> Result<(), Whatever> {
        let (_directory, root) = project_folder()?;

        let project = Project::resolve(arguments(), &root, &user_settings())?;

        assert_eq!(project.request.mode, Some(DiscoveryMode::Generic));
        assert_eq!(project.tools.compiler, ToolPaths::default().compiler);
        assert_eq!(project.tools.simulator, Utf8PathBuf::from("/settings/vvp"));
        assert_eq!(project.tools.viewer, Utf8PathBuf::from("/settings/gtkwave"));
        Ok(())
    }

    #[test]
    #[snafu::report]
    fn project_file_overrides_user_settings() -> Result<(), Whatever> {
        let (_directory, root) = project_folder()?;
        fs::write(
            root.join("benchsim.toml"),
            "[project]\nmode = \"icestudio\"\ntestbench = \"config_tb.v\"\n\
             subproject = \"blink\"\ntrace = \"config.vcd\"\n\n\
             [tools]\ngtkwave = \"/config/gtkwave\"\n",
        )
        .whatever_context("Failed to write benchsim.toml")?;

        let project = Project::resolve(arguments(), &root, &user_settings())?;

        assert_eq!(project.request.mode, Some(DiscoveryMode::Icestudio));
        assert_eq!(
            project.request.plan.testbench,
            Some(Utf8PathBuf::from("config_tb.v"))
        );
        assert_eq!(project.request.plan.subproject.as_deref(), Some("blink"));
        assert_eq!(project.request.plan.trace_file_name, "config.vcd");
        assert_eq!(project.tools.viewer, Utf8PathBuf::from("/config/gtkwave"));
        assert_eq!(project.tools.simulator, Utf8PathBuf::from("/settings/vvp"));
        Ok(())
    }

    #[test]
    #[snafu::report]
    fn command_line_overrides_everything() -> Result<(), Whatever> {
        let (_directory, root) = project_folder()?;
        fs::write(
            root.join("benchsim.toml"),
            "[project]\nmode = \"icestudio\"\ntestbench = \"config_tb.v\"\n\
             subproject = \"blink\"\ntrace = \"config.vcd\"\n",
        )
        .whatever_context("Failed to write benchsim.toml")?;

        let project = Project::resolve(
            ProjectArguments {
                root: Some(root.clone()),
                mode: Some(DiscoveryMode::Generic),
                testbench: Some("cli_tb.v".into()),
                subproject: None,
                trace: Some("cli.vcd".into()),
            },
            Utf8Path::new("/somewhere/else"),
            &user_settings(),
        )?;

        assert_eq!(project.request.root, root);
        assert_eq!(project.request.mode, Some(DiscoveryMode::Generic));
        assert_eq!(
            project.request.plan.testbench,
            Some(Utf8PathBuf::from("cli_tb.v"))
        );
        assert_eq!(project.request.plan.subproject.as_deref(), Some("blink"));
        assert_eq!(project.request.plan.trace_file_name, "cli.vcd");
        Ok(())
    }

    #[test]
    #[snafu::report]
    fn relative_roots_use_the_current_directory() -> Result<(), Whatever> {
        let (_directory, root) = project_folder()?;
        fs::create_dir(root.join("design"))
            .whatever_context("Failed to create project folder")?;

        let project = Project::resolve(
            ProjectArguments {
                root: Some("design".into()),
                ..arguments()
            },
            &root,
            &UserSettings::default(),
        )?;

        assert_eq!(project.request.root, root.join("design"));
        Ok(())
    }
}
