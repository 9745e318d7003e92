/// Default locations stored in `~/.sysexio`
///
/// .
/// └── log
///    └── sysexio.log
///
use std::path::PathBuf;

pub fn sysexio() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(".sysexio"))
}

pub fn log() -> Option<PathBuf> {
    Some(sysexio()?.join("log"))
}

pub fn log_file(name: &str) -> Option<PathBuf> {
    Some(log()?.join(format!("{name}.log")))
}
