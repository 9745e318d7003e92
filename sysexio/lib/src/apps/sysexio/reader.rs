use super::*;
use crate::{
    midi::{ConnectionGuard, DeviceHosting, DeviceInfo},
    sysex::{FrameAccumulator, SysexSplitter},
};
use crossbeam::channel::Receiver;
use std::sync::Arc;

/// Pulls chunks from a device, frames them and hands frames to the sink.
pub struct FrameReader {
    pub host: Arc<dyn DeviceHosting>,
    pub device: DeviceInfo,
    pub splitter: SysexSplitter,
    pub frames: Sender<SysexFrame>,
    pub cancel: Receiver<()>,
}

impl FrameReader {
    pub fn spawn(self, done: Sender<Task>) -> Result<JoinHandle<()>, SessionError> {
        spawn_task(Task::Reader, done, move || self.run())
    }

    /// Every return path drops the connection guard first,
    /// which closes the device, then the frame sender.
    fn run(self) {
        let FrameReader {
            host,
            device,
            splitter,
            frames,
            cancel,
        } = self;

        let connection = match host.open_device(&device) {
            Ok(connection) => ConnectionGuard::new(connection),
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };

        let chunks = match connection.chunks() {
            Ok(chunks) => chunks,
            Err(e) => {
                log::error!("Error connecting : {e}");
                return;
            }
        };

        log::info!("Scanning {}, waiting for data...", device.name);

        let mut accumulator = FrameAccumulator::new(splitter);

        loop {
            crossbeam::select! {
                recv(chunks) -> chunk => {
                    let Ok(chunk) = chunk else {
                        log::error!("Chunk source of {} closed", device.name);
                        return;
                    };

                    for frame in accumulator.push(&chunk.bytes) {
                        if !forward(frame, &frames, &cancel) {
                            return;
                        }
                    }
                },
                recv(cancel) -> _ => {
                    log::info!("Quitting scan");
                    return;
                },
            }
        }
    }
}

/// Blocks until the sink takes the frame, unless cancelled first.
fn forward(frame: SysexFrame, frames: &Sender<SysexFrame>, cancel: &Receiver<()>) -> bool {
    crossbeam::select! {
        send(frames, frame) -> sent => {
            if sent.is_err() {
                log::warn!("Frame sink is gone, dropping frame");
            }
            sent.is_ok()
        },
        recv(cancel) -> _ => {
            log::info!("Quitting scan");
            false
        },
    }
}
