use super::*;

const MARKER_LEN: usize = 2;

/// Outcome of a single split over the accumulated bytes.
///
/// `advance` bytes must be dropped from the front of the buffer
/// by the caller, whether or not a frame was produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Split {
    pub advance: usize,
    pub frame: Option<SysexFrame>,
}

impl Split {
    fn wait() -> Self {
        Self::default()
    }

    fn skip(advance: usize) -> Self {
        Self {
            advance,
            frame: None,
        }
    }

    fn emit(buffer: &[u8], start: usize, end: usize) -> Self {
        Self {
            advance: end + 1,
            frame: Some(SysexFrame::from_slice(&buffer[start..=end])),
        }
    }
}

/// Stateless SysEx splitter for a single vendor/model pair.
///
/// It never consumes bytes it cannot yet classify, so a marker or
/// header cut across chunks is found again once the rest arrives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SysexSplitter {
    header: SysexHeader,
}

impl SysexSplitter {
    pub fn new(header: SysexHeader) -> Self {
        Self { header }
    }

    /// Decide how much of `buffer` can be dropped and whether it holds a complete frame.
    ///
    /// `at_end` mirrors the signature of streaming scanners; an unterminated
    /// frame is not flushed when the stream ends.
    pub fn split(&self, buffer: &[u8], _at_end: bool) -> Split {
        let marker = self.header.start_marker();

        let Some(start) = find_marker(buffer, &marker, 0) else {
            return Split::wait();
        };

        if buffer.len() < start + SYSEX_HEADER_LEN {
            return Split::wait();
        }

        if buffer[start + 3] != self.header.model {
            // a leading bogus marker has to go too, or the buffer would never shrink
            return Split::skip(if start == 0 { MARKER_LEN } else { start });
        }

        let end = buffer[start + SYSEX_HEADER_LEN..]
            .iter()
            .position(|&byte| byte == SYSEX_END)
            .map(|offset| start + SYSEX_HEADER_LEN + offset);

        let next_start = find_marker(buffer, &marker, start + 1);

        match (end, next_start) {
            (Some(end), Some(next_start)) if next_start < end => Split::skip(next_start),
            (Some(end), _) => Split::emit(buffer, start, end),
            (None, Some(next_start)) => Split::skip(next_start),
            (None, None) => Split::wait(),
        }
    }
}

fn find_marker(buffer: &[u8], marker: &[u8; MARKER_LEN], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(MARKER_LEN)
        .position(|window| window == marker)
        .map(|offset| from + offset)
}
