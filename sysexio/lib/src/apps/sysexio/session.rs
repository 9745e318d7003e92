use super::*;
use crate::{
    midi::{DeviceHosting, DeviceInfo},
    sysex::{SysexHeader, SysexSplitter},
};
use crossbeam::channel::Receiver;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("already scanning")]
    AlreadyScanning,

    #[error("failed to spawn {0:?} task : {1}")]
    Spawn(Task, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Stopping,
}

pub enum Flow {
    Continue,
    Exit,
}

struct Session {
    cancel: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Session {
    fn cancel(&self, num_tasks: usize) {
        for _ in 0..num_tasks {
            if self.cancel.send(()).is_err() {
                log::trace!("every session task has already finished");
                return;
            }
        }
    }

    fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("Failed to join session task thread");
            }
        }
    }
}

/// Owns the lifecycle of scanning sessions.
///
/// Commands and task completions are the only inputs, both handled on
/// the thread driving the coordinator, so its state needs no locking.
pub struct SessionCoordinator {
    host: Arc<dyn DeviceHosting>,
    device: DeviceInfo,
    splitter: SysexSplitter,
    consumer: Arc<dyn FrameConsuming>,
    state: SessionState,
    outstanding: usize,
    quitting: bool,
    session: Option<Session>,
    completion_tx: Sender<Task>,
    completion_rx: Receiver<Task>,
}

impl SessionCoordinator {
    pub fn new(
        host: Arc<dyn DeviceHosting>,
        device: DeviceInfo,
        header: SysexHeader,
        consumer: Arc<dyn FrameConsuming>,
    ) -> Self {
        let (completion_tx, completion_rx) = crossbeam::channel::unbounded();

        Self {
            host,
            device,
            splitter: SysexSplitter::new(header),
            consumer,
            state: SessionState::Idle,
            outstanding: 0,
            quitting: false,
            session: None,
            completion_tx,
            completion_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of session tasks that have not reported completion yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// Parse and apply a command line, ignoring anything unrecognised.
    pub fn handle_line(&mut self, line: &str) -> Result<(), SessionError> {
        match line.parse::<Command>() {
            Ok(command) => self.handle_command(command),
            Err(e) => {
                log::debug!("ignoring {e}");
                Ok(())
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Result<(), SessionError> {
        log::trace!("{command:?} requested while {:?}", self.state);

        match command {
            Command::Start => self.start(),
            Command::Halt => {
                self.halt();
                Ok(())
            }
            Command::Quit => {
                self.quitting = true;
                self.halt();
                Ok(())
            }
        }
    }

    pub fn handle_completion(&mut self, task: Task) {
        log::debug!("{task:?} task finished");
        self.outstanding = self.outstanding.saturating_sub(1);

        if self.outstanding == 0 {
            if let Some(session) = self.session.take() {
                session.join();
            }

            if self.state != SessionState::Idle {
                log::info!("Scan finished");
            }
            self.state = SessionState::Idle;
        }
    }

    /// Wait for the next command or task completion and apply it.
    ///
    /// A closed command source counts as a quit request, after which
    /// only completions are waited on.
    pub fn step(&mut self, commands: &mut Receiver<String>) -> Flow {
        if self.quitting && self.outstanding == 0 {
            return Flow::Exit;
        }

        let completions = self.completion_rx.clone();
        let mut commands_closed = false;

        crossbeam::select! {
            recv(commands) -> line => match line {
                Ok(line) => {
                    if let Err(e) = self.handle_line(&line) {
                        log::warn!("{e}");
                    }
                }
                Err(_) => commands_closed = true,
            },
            recv(completions) -> task => {
                if let Ok(task) = task {
                    self.handle_completion(task);
                }
            },
        }

        if commands_closed {
            log::debug!("command source closed, quitting");
            *commands = crossbeam::channel::never();
            self.quitting = true;
            self.halt();
        }

        if self.quitting && self.outstanding == 0 {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    /// Drive the coordinator until a quit request has been fully honoured.
    pub fn run(mut self, mut commands: Receiver<String>) {
        while let Flow::Continue = self.step(&mut commands) {}
        log::info!("Quitting");
    }

    /// Apply task completions until the current session is over.
    pub fn wait_for_idle(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let start = Instant::now();

        while self.state != SessionState::Idle {
            let remaining = timeout.saturating_sub(start.elapsed());
            match self.completion_rx.recv_timeout(remaining) {
                Ok(task) => self.handle_completion(task),
                Err(_) => anyhow::bail!(
                    "session still has {} outstanding tasks after {timeout:?}",
                    self.outstanding
                ),
            }
        }

        Ok(())
    }

    fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyScanning);
        }

        let (cancel_tx, cancel_rx) = crossbeam::channel::unbounded();
        let (frame_tx, frame_rx) = crossbeam::channel::bounded(0);

        self.state = SessionState::Scanning;
        let session = self.session.insert(Session {
            cancel: cancel_tx,
            handles: Vec::with_capacity(2),
        });

        // a task that fails to spawn still reports completion, so it is counted first
        self.outstanding += 1;
        let sink = FrameSink {
            consumer: self.consumer.clone(),
            frames: frame_rx,
            cancel: cancel_rx.clone(),
        };
        session.handles.push(sink.spawn(self.completion_tx.clone())?);

        self.outstanding += 1;
        let reader = FrameReader {
            host: self.host.clone(),
            device: self.device.clone(),
            splitter: self.splitter,
            frames: frame_tx,
            cancel: cancel_rx,
        };
        session.handles.push(reader.spawn(self.completion_tx.clone())?);

        log::debug!("session started on {}", self.device.name);
        Ok(())
    }

    fn halt(&mut self) {
        match self.state {
            SessionState::Idle => log::debug!("no scan to halt"),
            SessionState::Stopping => log::debug!("scan is already stopping"),
            SessionState::Scanning => {
                self.state = SessionState::Stopping;
                if let Some(session) = &self.session {
                    session.cancel(self.outstanding);
                }
            }
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel(self.outstanding);
            session.join();
        }
    }
}
