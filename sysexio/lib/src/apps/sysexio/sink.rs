use super::*;
use crossbeam::channel::Receiver;
use std::sync::Arc;

/// Hands frames coming out of the reader to a consumer.
pub struct FrameSink {
    pub consumer: Arc<dyn FrameConsuming>,
    pub frames: Receiver<SysexFrame>,
    pub cancel: Receiver<()>,
}

impl FrameSink {
    pub fn spawn(self, done: Sender<Task>) -> Result<JoinHandle<()>, SessionError> {
        spawn_task(Task::Sink, done, move || self.run())
    }

    fn run(self) {
        loop {
            crossbeam::select! {
                recv(self.frames) -> frame => match frame {
                    Ok(frame) => self.consumer.consume(frame),
                    Err(_) => {
                        log::debug!("Frame reader finished, quitting import");
                        return;
                    }
                },
                recv(self.cancel) -> _ => {
                    log::info!("Quitting import");
                    return;
                },
            }
        }
    }
}
