mod error;
mod host;

pub use error::*;
pub use host::*;

use crossbeam::channel::Receiver;

/// Raw chunk of bytes as delivered by the MIDI driver.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MidiData {
    pub timestamp: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceDirection {
    Input,
    Output,
    Duplex,
}

impl DeviceDirection {
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Input | Self::Duplex)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::Output | Self::Duplex)
    }
}

impl std::fmt::Display for DeviceDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "Input"),
            Self::Output => write!(f, "Output"),
            Self::Duplex => write!(f, "Input/Output (Duplex)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub direction: DeviceDirection,
    /// Number of chunks buffered between the driver callback and the reader.
    pub queue_size: usize,
}

pub trait DeviceHosting: Send + Sync {
    /// List every device currently visible to the host.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    /// Open a device, handing back the connection as an owned capability.
    /// Fails if the device is already open or the driver rejects it.
    fn open_device(&self, device: &DeviceInfo) -> Result<Box<dyn DeviceConnection>, DeviceError>;
}

pub trait DeviceConnection {
    fn info(&self) -> &DeviceInfo;
    fn is_open(&self) -> bool;
    /// Stream of raw chunks received from the device.
    fn chunks(&self) -> Result<Receiver<MidiData>, DeviceError>;
    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError>;
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Closes the wrapped connection when it goes out of scope,
/// whichever path the owner leaves through.
pub struct ConnectionGuard {
    connection: Box<dyn DeviceConnection>,
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn DeviceConnection>) -> Self {
        Self { connection }
    }
}

impl std::ops::Deref for ConnectionGuard {
    type Target = dyn DeviceConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl std::ops::DerefMut for ConnectionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.connection.is_open() {
            return;
        }

        log::info!("Closing connection...");
        if let Err(e) = self.connection.close() {
            log::error!("Error closing connection : {e}");
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crossbeam::channel::Sender;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DeviceEvent {
        Opened(String),
        Closed(String),
        Wrote(Vec<u8>),
    }

    pub fn device(name: &str) -> DeviceInfo {
        DeviceInfo {
            id: format!("mock:{name}"),
            name: name.to_owned(),
            direction: DeviceDirection::Duplex,
            queue_size: 16,
        }
    }

    mockall::mock! {
        pub Host {}

        impl DeviceHosting for Host {
            fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;
            fn open_device(&self, device: &DeviceInfo) -> Result<Box<dyn DeviceConnection>, DeviceError>;
        }
    }

    /// Host whose single device streams whatever the test pushes
    /// into the chunk sender, and reports open/close/write events.
    pub struct MockDeviceHost {
        chunks: Receiver<MidiData>,
        events: Sender<DeviceEvent>,
    }

    impl MockDeviceHost {
        pub fn new() -> (Self, Sender<MidiData>, Receiver<DeviceEvent>) {
            let (chunk_tx, chunk_rx) = crossbeam::channel::unbounded();
            let (event_tx, event_rx) = crossbeam::channel::unbounded();
            (
                Self {
                    chunks: chunk_rx,
                    events: event_tx,
                },
                chunk_tx,
                event_rx,
            )
        }
    }

    impl DeviceHosting for MockDeviceHost {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
            Ok(vec![device("mock-device")])
        }

        fn open_device(
            &self,
            device: &DeviceInfo,
        ) -> Result<Box<dyn DeviceConnection>, DeviceError> {
            let _ = self.events.send(DeviceEvent::Opened(device.name.clone()));
            Ok(Box::new(MockConnection {
                info: device.clone(),
                chunks: self.chunks.clone(),
                events: self.events.clone(),
                is_open: true,
            }))
        }
    }

    pub struct MockConnection {
        info: DeviceInfo,
        chunks: Receiver<MidiData>,
        events: Sender<DeviceEvent>,
        is_open: bool,
    }

    impl DeviceConnection for MockConnection {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn is_open(&self) -> bool {
            self.is_open
        }

        fn chunks(&self) -> Result<Receiver<MidiData>, DeviceError> {
            if !self.is_open {
                return Err(DeviceError::NotOpen(self.info.name.clone()));
            }
            Ok(self.chunks.clone())
        }

        fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
            if !self.is_open {
                return Err(DeviceError::NotOpen(self.info.name.clone()));
            }
            let _ = self.events.send(DeviceEvent::Wrote(bytes.to_vec()));
            Ok(bytes.len())
        }

        fn close(&mut self) -> Result<(), DeviceError> {
            if !self.is_open {
                return Err(DeviceError::close(&self.info.name, "device is not open"));
            }
            self.is_open = false;
            let _ = self.events.send(DeviceEvent::Closed(self.info.name.clone()));
            Ok(())
        }
    }

    #[test]
    fn closed_connections_refuse_io_and_a_second_close() {
        let (host, _chunks, events) = MockDeviceHost::new();
        let mut connection = host.open_device(&device("dev")).unwrap();

        assert_eq!(connection.write(&[0xB0, 0x00, 0x7D]).unwrap(), 3);
        assert!(connection.chunks().is_ok());
        connection.close().unwrap();

        assert_eq!(
            connection.chunks().unwrap_err(),
            DeviceError::NotOpen("dev".into())
        );
        assert_eq!(
            connection.write(&[0xB0]).unwrap_err(),
            DeviceError::NotOpen("dev".into())
        );
        assert!(matches!(
            connection.close().unwrap_err(),
            DeviceError::Close { .. }
        ));

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                DeviceEvent::Opened("dev".into()),
                DeviceEvent::Wrote(vec![0xB0, 0x00, 0x7D]),
                DeviceEvent::Closed("dev".into()),
            ]
        );
    }

    #[test]
    fn guard_closes_the_connection_when_dropped() {
        let (host, _chunks, events) = MockDeviceHost::new();

        {
            let mut guard = ConnectionGuard::new(host.open_device(&device("dev")).unwrap());
            guard.write(&[0xF0, 0xF7]).unwrap();
        }

        assert_eq!(
            events.try_iter().last(),
            Some(DeviceEvent::Closed("dev".into()))
        );
    }

    #[test]
    fn guard_does_not_close_twice() {
        let (host, _chunks, events) = MockDeviceHost::new();

        {
            let mut guard = ConnectionGuard::new(host.open_device(&device("dev")).unwrap());
            guard.close().unwrap();
        }

        let closes = events
            .try_iter()
            .filter(|event| matches!(event, DeviceEvent::Closed(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn device_errors_read_like_operator_messages() {
        assert_eq!(
            DeviceError::open("Launchpad Mini", "device is already open").to_string(),
            "error opening Launchpad Mini : device is already open"
        );
        assert_eq!(
            DeviceError::NotOpen("Launchpad Mini".into()).to_string(),
            "Launchpad Mini is not open, did you remember to open the device?"
        );
    }
}
