use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to list MIDI devices : {0}")]
    Enumerate(String),

    #[error("error opening {device} : {reason}")]
    Open { device: String, reason: String },

    #[error("error closing {device} : {reason}")]
    Close { device: String, reason: String },

    #[error("{0} is not open, did you remember to open the device?")]
    NotOpen(String),

    #[error("transport failure on {device} : {reason}")]
    Transport { device: String, reason: String },
}

impl DeviceError {
    pub fn open(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Open {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn close(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Close {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}
