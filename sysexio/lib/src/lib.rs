pub mod apps;
pub mod midi;
pub mod sysex;
