use super::*;
use bytes::{Buf, BytesMut};

const INITIAL_CAPACITY: usize = 4 * 1024;

/// Holds the bytes the splitter has not consumed yet.
///
/// The buffer only grows by appending chunks and only shrinks by
/// dropping the prefix the splitter reports as consumed.
pub struct FrameAccumulator {
    splitter: SysexSplitter,
    buffer: BytesMut,
}

impl FrameAccumulator {
    pub fn new(splitter: SysexSplitter) -> Self {
        Self {
            splitter,
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append a chunk and extract every frame it completes, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SysexFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = vec![];

        loop {
            let Split { advance, frame } = self.splitter.split(&self.buffer, false);

            if let Some(frame) = frame {
                frames.push(frame);
            }

            if advance == 0 {
                break;
            }

            self.buffer.advance(advance);
        }

        frames
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
