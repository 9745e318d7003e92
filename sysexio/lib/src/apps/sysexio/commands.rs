use crossbeam::channel::Sender;
use std::{io::BufRead, str::FromStr, thread::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `s` : start scanning the selected device
    Start,
    /// `h` : halt the running scan, keep the process alive
    Halt,
    /// `q` : halt and quit once every task has finished
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim() {
            "s" => Ok(Self::Start),
            "h" => Ok(Self::Halt),
            "q" => Ok(Self::Quit),
            other => anyhow::bail!("unknown command : {other:?}"),
        }
    }
}

/// Forward every input line, untouched, to the coordinator on a dedicated thread.
///
/// The thread ends at end of input, on a read error,
/// or once the coordinator stops listening.
pub fn spawn_dispatcher<R>(input: R, commands: Sender<String>) -> anyhow::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    Ok(std::thread::Builder::new()
        .name("sysexio-commands".into())
        .spawn(move || dispatch(input, &commands))?)
}

fn dispatch(input: impl BufRead, commands: &Sender<String>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read command : {e}");
                return;
            }
        };

        if commands.send(line).is_err() {
            log::trace!("command channel closed");
            return;
        }
    }

    log::debug!("command input closed");
}
