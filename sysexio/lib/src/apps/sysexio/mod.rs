//! SysEx scanning pipeline.
//!
//! ```text
//! device chunks -> reader (accumulate + split) -> frames -> sink
//! command lines -> dispatcher -> coordinator -> cancellation -> reader, sink
//! ```

mod commands;
mod reader;
mod session;
mod sink;

pub use commands::*;
pub use reader::*;
pub use session::*;
pub use sink::*;

use crate::sysex::SysexFrame;
use crossbeam::channel::Sender;
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Reader,
    Sink,
}

impl Task {
    fn thread_name(&self) -> &'static str {
        match self {
            Self::Reader => "sysexio-reader",
            Self::Sink => "sysexio-sink",
        }
    }
}

/// Receives every frame extracted during a session.
pub trait FrameConsuming: Send + Sync {
    fn consume(&self, frame: SysexFrame);
}

impl<F> FrameConsuming for F
where
    F: Fn(SysexFrame) + Send + Sync,
{
    fn consume(&self, frame: SysexFrame) {
        self(frame)
    }
}

/// Logs every frame, the way the console reports captures.
#[derive(Default)]
pub struct FrameLogger;

impl FrameConsuming for FrameLogger {
    fn consume(&self, frame: SysexFrame) {
        log::info!("Got sysex! {frame}");
    }
}

/// Reports a task as finished to the coordinator once dropped,
/// including on early returns and panics.
struct CompletionGuard {
    task: Task,
    done: Sender<Task>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.done.send(self.task).is_err() {
            log::trace!("{:?} finished after the coordinator went away", self.task);
        }
    }
}

/// Run `f` on a named thread that reports to `done` when it ends.
///
/// The guard is created before spawning so a thread that
/// cannot be spawned is still reported as finished.
fn spawn_task<F>(task: Task, done: Sender<Task>, f: F) -> Result<JoinHandle<()>, SessionError>
where
    F: FnOnce() + Send + 'static,
{
    let completion = CompletionGuard { task, done };

    std::thread::Builder::new()
        .name(task.thread_name().into())
        .spawn(move || {
            let _completion = completion;
            f();
        })
        .map_err(|e| SessionError::Spawn(task, e.to_string()))
}
