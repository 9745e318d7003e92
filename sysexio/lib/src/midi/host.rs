use super::*;
use crossbeam::channel::{Receiver, Sender};
use midir::*;
use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

pub const DEFAULT_QUEUE_SIZE: usize = 1_024;

/// Device host backed by the platform MIDI driver.
///
/// Every open connection is registered by device id so that a
/// device cannot be opened twice through the same host.
pub struct HostedMidiDevices {
    client_name: String,
    queue_size: usize,
    open_devices: Arc<RwLock<HashSet<String>>>,
}

impl Default for HostedMidiDevices {
    fn default() -> Self {
        Self::new("sysexio")
    }
}

impl HostedMidiDevices {
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_owned(),
            queue_size: DEFAULT_QUEUE_SIZE,
            open_devices: Arc::default(),
        }
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    fn input_names(&self) -> Result<Vec<String>, DeviceError> {
        let host = MidiInput::new(&format!("{}-in", self.client_name))
            .map_err(|e| DeviceError::Enumerate(e.to_string()))?;

        host.ports()
            .iter()
            .map(|port| host.port_name(port))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DeviceError::Enumerate(e.to_string()))
    }

    fn output_names(&self) -> Result<Vec<String>, DeviceError> {
        let host = MidiOutput::new(&format!("{}-out", self.client_name))
            .map_err(|e| DeviceError::Enumerate(e.to_string()))?;

        host.ports()
            .iter()
            .map(|port| host.port_name(port))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DeviceError::Enumerate(e.to_string()))
    }

    fn connect(&self, device: &DeviceInfo) -> Result<HostedMidiConnection, DeviceError> {
        let (sender, receiver) = crossbeam::channel::bounded(device.queue_size.max(1));

        let input = if device.direction.can_read() {
            Some(self.connect_input(device, sender)?)
        } else {
            None
        };

        let output = if device.direction.can_write() {
            Some(self.connect_output(device)?)
        } else {
            None
        };

        log::trace!("[ MIDI ] : connected to {}", device.name);

        Ok(HostedMidiConnection {
            info: device.clone(),
            input,
            output,
            chunks: receiver,
            open_devices: self.open_devices.clone(),
            is_open: true,
        })
    }

    fn connect_input(
        &self,
        device: &DeviceInfo,
        sender: Sender<MidiData>,
    ) -> Result<MidiInputConnection<Sender<MidiData>>, DeviceError> {
        let mut host = MidiInput::new(&format!("{}-in", self.client_name))
            .map_err(|e| DeviceError::open(&device.name, e))?;
        host.ignore(Ignore::None);

        let ports = host.ports();
        let names: Vec<_> = ports
            .iter()
            .map(|port| host.port_name(port).unwrap_or_default())
            .collect();
        let port = select_port(&device.id, "in", &names, &device.name)
            .and_then(|index| ports.get(index).ok_or("no such port"))
            .map_err(|e| DeviceError::open(&device.name, e))?;

        let callback = move |timestamp: u64, bytes: &[u8], sender: &mut Sender<MidiData>| {
            let chunk = MidiData {
                timestamp,
                bytes: bytes.into(),
            };

            if let Err(e) = sender.try_send(chunk) {
                log::error!("Failed to push midi chunk to reader : {e}");
            }
        };

        host.connect(port, "sysexio-in", callback, sender)
            .map_err(|e| DeviceError::open(&device.name, e))
    }

    fn connect_output(&self, device: &DeviceInfo) -> Result<MidiOutputConnection, DeviceError> {
        let host = MidiOutput::new(&format!("{}-out", self.client_name))
            .map_err(|e| DeviceError::open(&device.name, e))?;

        let ports = host.ports();
        let names: Vec<_> = ports
            .iter()
            .map(|port| host.port_name(port).unwrap_or_default())
            .collect();
        let port = select_port(&device.id, "out", &names, &device.name)
            .and_then(|index| ports.get(index).ok_or("no such port"))
            .map_err(|e| DeviceError::open(&device.name, e))?;

        host.connect(port, "sysexio-out")
            .map_err(|e| DeviceError::open(&device.name, e))
    }
}

impl DeviceHosting for HostedMidiDevices {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(pair_ports(
            &self.input_names()?,
            &self.output_names()?,
            self.queue_size,
        ))
    }

    fn open_device(&self, device: &DeviceInfo) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        {
            let mut open_devices = self
                .open_devices
                .write()
                .map_err(|_| DeviceError::open(&device.name, "device registry is poisoned"))?;

            if !open_devices.insert(device.id.clone()) {
                return Err(DeviceError::open(&device.name, "device is already open"));
            }
        }

        match self.connect(device) {
            Ok(connection) => Ok(Box::new(connection)),
            Err(e) => {
                release(&self.open_devices, &device.id);
                Err(e)
            }
        }
    }
}

/// Merge input and output port lists into devices.
/// Ports sharing a name on both sides become a single duplex device.
pub fn pair_ports(inputs: &[String], outputs: &[String], queue_size: usize) -> Vec<DeviceInfo> {
    let mut paired_outputs = vec![false; outputs.len()];
    let mut devices = Vec::with_capacity(inputs.len().max(outputs.len()));

    for (i, name) in inputs.iter().enumerate() {
        let output = (0..outputs.len()).find(|&j| !paired_outputs[j] && outputs[j] == *name);

        let (id, direction) = match output {
            Some(j) => {
                paired_outputs[j] = true;
                (format!("in:{i}/out:{j}"), DeviceDirection::Duplex)
            }
            None => (format!("in:{i}"), DeviceDirection::Input),
        };

        devices.push(DeviceInfo {
            id,
            name: name.clone(),
            direction,
            queue_size,
        });
    }

    for (j, name) in outputs.iter().enumerate() {
        if paired_outputs[j] {
            continue;
        }

        devices.push(DeviceInfo {
            id: format!("out:{j}"),
            name: name.clone(),
            direction: DeviceDirection::Output,
            queue_size,
        });
    }

    devices
}

/// Index of the `side` port named by a device id such as `in:0/out:1`.
fn port_index(id: &str, side: &str) -> Option<usize> {
    id.split('/')
        .find_map(|part| part.strip_prefix(side)?.strip_prefix(':')?.parse().ok())
}

/// Resolve the port a device id points at, refusing it if the port
/// list changed since the device was listed.
fn select_port(
    id: &str,
    side: &str,
    names: &[String],
    name: &str,
) -> Result<usize, &'static str> {
    let index = port_index(id, side).ok_or("device has no such port")?;

    match names.get(index) {
        Some(port_name) if port_name == name => Ok(index),
        Some(_) => Err("port list changed since the device was listed"),
        None => Err("no such port"),
    }
}

fn release(open_devices: &RwLock<HashSet<String>>, id: &str) {
    match open_devices.write() {
        Ok(mut open_devices) => {
            open_devices.remove(id);
        }
        Err(_) => log::error!("Failed to release {id} : device registry is poisoned"),
    }
}

pub struct HostedMidiConnection {
    info: DeviceInfo,
    input: Option<MidiInputConnection<Sender<MidiData>>>,
    output: Option<MidiOutputConnection>,
    chunks: Receiver<MidiData>,
    open_devices: Arc<RwLock<HashSet<String>>>,
    is_open: bool,
}

impl DeviceConnection for HostedMidiConnection {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn chunks(&self) -> Result<Receiver<MidiData>, DeviceError> {
        if !self.is_open || self.input.is_none() {
            return Err(DeviceError::NotOpen(self.info.name.clone()));
        }

        Ok(self.chunks.clone())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, DeviceError> {
        if !self.is_open {
            return Err(DeviceError::NotOpen(self.info.name.clone()));
        }

        let Some(output) = self.output.as_mut() else {
            return Err(DeviceError::transport(&self.info.name, "device has no output"));
        };

        output
            .send(bytes)
            .map_err(|e| DeviceError::transport(&self.info.name, e))?;

        Ok(bytes.len())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if !self.is_open {
            return Err(DeviceError::close(&self.info.name, "device is not open"));
        }

        if let Some(input) = self.input.take() {
            let _ = input.close();
        }

        if let Some(output) = self.output.take() {
            let _ = output.close();
        }

        self.is_open = false;
        release(&self.open_devices, &self.info.id);
        log::trace!("[ MIDI ] : disconnected from {}", self.info.name);
        Ok(())
    }
}

impl Drop for HostedMidiConnection {
    fn drop(&mut self) {
        if self.is_open {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ports_with_the_same_name_on_both_sides_are_duplex() {
        let devices = pair_ports(
            &names(&["launchpad", "keys"]),
            &names(&["synth", "launchpad"]),
            8,
        );

        assert_eq!(
            devices,
            vec![
                DeviceInfo {
                    id: "in:0/out:1".into(),
                    name: "launchpad".into(),
                    direction: DeviceDirection::Duplex,
                    queue_size: 8,
                },
                DeviceInfo {
                    id: "in:1".into(),
                    name: "keys".into(),
                    direction: DeviceDirection::Input,
                    queue_size: 8,
                },
                DeviceInfo {
                    id: "out:0".into(),
                    name: "synth".into(),
                    direction: DeviceDirection::Output,
                    queue_size: 8,
                },
            ]
        );
    }

    #[test]
    fn duplicate_port_names_are_each_paired_once() {
        let devices = pair_ports(&names(&["dev", "dev"]), &names(&["dev"]), 1);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].direction, DeviceDirection::Duplex);
        assert_eq!(devices[0].id, "in:0/out:0");
        assert_eq!(devices[1].direction, DeviceDirection::Input);
        assert_eq!(devices[1].id, "in:1");
    }

    #[test]
    fn ports_sharing_a_name_are_opened_by_their_own_index() {
        let inputs = names(&["dev", "dev"]);
        let outputs = names(&["dev"]);
        let devices = pair_ports(&inputs, &outputs, 1);

        assert_eq!(select_port(&devices[0].id, "in", &inputs, "dev"), Ok(0));
        assert_eq!(select_port(&devices[0].id, "out", &outputs, "dev"), Ok(0));
        assert_eq!(select_port(&devices[1].id, "in", &inputs, "dev"), Ok(1));
        assert!(select_port(&devices[1].id, "out", &outputs, "dev").is_err());
    }

    #[test]
    fn a_port_that_moved_since_listing_is_refused() {
        let devices = pair_ports(&names(&["keys", "dev"]), &[], 1);
        assert_eq!(devices[1].id, "in:1");

        assert!(select_port(&devices[1].id, "in", &names(&["dev"]), "dev").is_err());
        assert!(select_port(&devices[1].id, "in", &names(&["dev", "keys"]), "dev").is_err());
        assert_eq!(port_index("in:3/out:12", "out"), Some(12));
        assert_eq!(port_index("out:2", "in"), None);
    }

    #[test]
    fn no_ports_means_no_devices() {
        assert!(pair_ports(&[], &[], DEFAULT_QUEUE_SIZE).is_empty());
    }

    #[test]
    fn direction_labels_match_the_device_listing() {
        assert_eq!(DeviceDirection::Input.to_string(), "Input");
        assert_eq!(DeviceDirection::Output.to_string(), "Output");
        assert_eq!(
            DeviceDirection::Duplex.to_string(),
            "Input/Output (Duplex)"
        );
        assert!(DeviceDirection::Duplex.can_read() && DeviceDirection::Duplex.can_write());
        assert!(!DeviceDirection::Output.can_read());
        assert!(!DeviceDirection::Input.can_write());
    }
}
