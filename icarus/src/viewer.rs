// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Launching GTKWave and keeping at most one instance of it per session.

use std::{
    io,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, ensure};

use crate::error::{
    Result, TraceNotFoundSnafu, ViewerSpawnSnafu, ViewerTerminateSnafu,
};

/// How long a viewer gets to exit after being asked to before it is killed.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_millis(1500);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const KILL_TIMEOUT: Duration = Duration::from_secs(1);

/// A running viewer process.
pub trait ViewerProcess {
    /// Whether the process has not exited yet.
    fn is_running(&mut self) -> io::Result<bool>;

    /// Politely asks the process to exit.
    fn request_termination(&mut self) -> io::Result<()>;

    /// Forcibly stops the process.
    fn kill(&mut self) -> io::Result<()>;

    /// Waits up to `timeout` for the process to exit and reaps it. Returns
    /// whether it exited.
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool>;
}

/// Starts viewer processes.
pub trait ViewerSpawner {
    type Process: ViewerProcess;

    /// Starts `viewer` on `trace`.
    fn spawn(
        &mut self,
        viewer: &Utf8Path,
        trace: &Utf8Path,
    ) -> io::Result<Self::Process>;
}

/// Spawns real operating system processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ViewerSpawner for SystemSpawner {
    type Process = ChildViewer;

    fn spawn(
        &mut self,
        viewer: &Utf8Path,
        trace: &Utf8Path,
    ) -> io::Result<ChildViewer> {
        let mut command = Command::new(viewer);
        command
            .arg(trace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(directory) = trace.parent() {
            command.current_dir(directory);
        }
        Ok(ChildViewer {
            child: command.spawn()?,
        })
    }
}

/// A viewer started by [`SystemSpawner`].
#[derive(Debug)]
pub struct ChildViewer {
    child: Child,
}

impl ChildViewer {
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl ViewerProcess for ChildViewer {
    fn is_running(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    #[cfg(unix)]
    fn request_termination(&mut self) -> io::Result<()> {
        if !self.is_running()? {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(io::Error::other)?;
        // SAFETY: `pid` belongs to a child we have not reaped yet, so it
        // cannot have been recycled for another process.
        if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&mut self) -> io::Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.is_running()? {
            self.child.kill()?;
        }
        Ok(())
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.child.try_wait()?.is_some() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// The viewer a session started and the trace it is showing.
#[derive(Debug)]
pub struct ViewerHandle<P: ViewerProcess> {
    trace: Utf8PathBuf,
    process: P,
}

impl<P: ViewerProcess> ViewerHandle<P> {
    pub fn trace(&self) -> &Utf8Path {
        &self.trace
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Whether the viewer is still open. A process whose state cannot be
    /// queried is treated as gone.
    pub fn is_running(&mut self) -> bool {
        self.process.is_running().unwrap_or(false)
    }

    /// Asks the viewer to exit, waits up to `grace`, then kills it. The
    /// process is always reaped unless an error is returned.
    pub fn close(&mut self, grace: Duration) -> io::Result<()> {
        if !self.process.is_running()? {
            return Ok(());
        }

        if let Err(error) = self.process.request_termination() {
            log::debug!("Failed to ask the viewer to exit: {error}");
        } else if self.process.wait_timeout(grace)? {
            return Ok(());
        }

        log::debug!("Viewer did not exit within {grace:?}, killing it");
        self.process.kill()?;
        if self.process.wait_timeout(KILL_TIMEOUT)? {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("viewer still running {KILL_TIMEOUT:?} after being killed"),
            ))
        }
    }
}

/// What [`open_trace`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerLaunch {
    /// No viewer was open, so one was started.
    Spawned,
    /// The open viewer already shows the trace.
    Reused,
    /// The open viewer was closed and a new one started.
    Replaced,
}

/// Shows `trace` in the viewer, reusing or replacing the one in `current`.
///
/// If `current` is already showing `trace` and is still running it is left
/// alone. Otherwise the old viewer is closed (see [`ViewerHandle::close`])
/// before a new one is spawned, so a session never has two viewers open.
/// On failure `current` still holds whatever viewer, if any, is running.
pub fn open_trace<S: ViewerSpawner>(
    spawner: &mut S,
    viewer: &Utf8Path,
    trace: &Utf8Path,
    current: &mut Option<ViewerHandle<S::Process>>,
    grace: Duration,
) -> Result<ViewerLaunch> {
    ensure!(trace.is_file(), TraceNotFoundSnafu { trace });

    let mut replaced = false;
    if let Some(mut previous) = current.take() {
        if previous.trace == trace && previous.is_running() {
            log::debug!("Viewer already shows {trace}");
            *current = Some(previous);
            return Ok(ViewerLaunch::Reused);
        }

        if let Err(error) = previous.close(grace) {
            *current = Some(previous);
            return Err(error).context(ViewerTerminateSnafu);
        }
        replaced = true;
    }

    log::info!("Opening {trace} in {viewer}");
    let process = spawner
        .spawn(viewer, trace)
        .context(ViewerSpawnSnafu { path: viewer })?;
    *current = Some(ViewerHandle {
        trace: trace.to_path_buf(),
        process,
    });

    Ok(if replaced {
        ViewerLaunch::Replaced
    } else {
        ViewerLaunch::Spawned
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs, rc::Rc};

    use super::*;

    #[derive(Debug, Default)]
    struct Events {
        spawned: Vec<Utf8PathBuf>,
        terminated: usize,
        killed: usize,
    }

    struct FakeProcess {
        events: Rc<RefCell<Events>>,
        running: bool,
        ignores_termination: bool,
        ignores_kill: bool,
    }

    impl ViewerProcess for FakeProcess {
        fn is_running(&mut self) -> io::Result<bool> {
            Ok(self.running)
        }

        fn request_termination(&mut self) -> io::Result<()> {
            self.events.borrow_mut().terminated += 1;
            if !self.ignores_termination {
                self.running = false;
            }
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            self.events.borrow_mut().killed += 1;
            if !self.ignores_kill {
                self.running = false;
            }
            Ok(())
        }

        fn wait_timeout(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.running)
        }
    }

    #[derive(Default)]
    struct FakeSpawner {
        events: Rc<RefCell<Events>>,
        stubborn: bool,
        unkillable: bool,
    }

    impl ViewerSpawner for FakeSpawner {
        type Process = FakeProcess;

        fn spawn(
            &mut self,
            _viewer: &Utf8Path,
            trace: &Utf8Path,
        ) -> io::Result<FakeProcess> {
            self.events.borrow_mut().spawned.push(trace.to_path_buf());
            Ok(FakeProcess {
                events: self.events.clone(),
                running: true,
                ignores_termination: self.stubborn || self.unkillable,
                ignores_kill: self.unkillable,
            })
        }
    }

    fn traces() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf) {
        let directory = tempfile::tempdir().expect("failed to create tempdir");
        let root = Utf8PathBuf::try_from(directory.path().to_path_buf())
            .expect("tempdir is not UTF-8");
        let first = root.join("first.vcd");
        let second = root.join("second.vcd");
        fs::write(&first, "$enddefinitions $end\n").expect("write failed");
        fs::write(&second, "$enddefinitions $end\n").expect("write failed");
        (directory, first, second)
    }

    #[test]
    fn missing_trace_is_rejected() {
        let mut spawner = FakeSpawner::default();
        let mut current = None;
        let result = open_trace(
            &mut spawner,
            Utf8Path::new("gtkwave"),
            Utf8Path::new("/definitely/not/here.vcd"),
            &mut current,
            DEFAULT_TERMINATION_GRACE,
        );
        assert!(matches!(
            result,
            Err(crate::SimulationError::TraceNotFound { .. })
        ));
        assert!(spawner.events.borrow().spawned.is_empty());
    }

    #[test]
    fn stubborn_viewer_is_killed() {
        let (_directory, first, second) = traces();
        let mut spawner = FakeSpawner {
            stubborn: true,
            ..Default::default()
        };
        let mut current = None;
        let viewer = Utf8Path::new("gtkwave");

        open_trace(&mut spawner, viewer, &first, &mut current, Duration::ZERO)
            .expect("first launch failed");
        let launch = open_trace(
            &mut spawner,
            viewer,
            &second,
            &mut current,
            Duration::ZERO,
        )
        .expect("second launch failed");

        assert_eq!(launch, ViewerLaunch::Replaced);
        let events = spawner.events.borrow();
        assert_eq!(events.terminated, 1);
        assert_eq!(events.killed, 1);
        assert_eq!(events.spawned, vec![first, second]);
    }

    #[test]
    fn exited_viewer_is_respawned_for_the_same_trace() {
        let (_directory, first, _) = traces();
        let mut spawner = FakeSpawner::default();
        let mut current = None;
        let viewer = Utf8Path::new("gtkwave");

        open_trace(&mut spawner, viewer, &first, &mut current, Duration::ZERO)
            .expect("first launch failed");
        if let Some(handle) = current.as_mut() {
            handle.process.running = false;
        }
        let launch =
            open_trace(&mut spawner, viewer, &first, &mut current, Duration::ZERO)
                .expect("second launch failed");

        assert_eq!(launch, ViewerLaunch::Replaced);
        let events = spawner.events.borrow();
        assert_eq!(events.spawned.len(), 2);
        assert_eq!(events.terminated, 0);
    }

    #[test]
    fn unkillable_viewer_is_kept() {
        let (_directory, first, second) = traces();
        let mut spawner = FakeSpawner {
            unkillable: true,
            ..Default::default()
        };
        let mut current = None;
        let viewer = Utf8Path::new("gtkwave");

        open_trace(&mut spawner, viewer, &first, &mut current, Duration::ZERO)
            .expect("first launch failed");
        let result = open_trace(
            &mut spawner,
            viewer,
            &second,
            &mut current,
            Duration::ZERO,
        );

        assert!(matches!(
            result,
            Err(crate::SimulationError::ViewerTerminate { .. })
        ));
        assert_eq!(
            current.as_ref().map(|handle| handle.trace().to_path_buf()),
            Some(first.clone())
        );
        let events = spawner.events.borrow();
        assert_eq!(events.killed, 1);
        assert_eq!(events.spawned, vec![first]);
    }
}
