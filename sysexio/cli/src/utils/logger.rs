use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Once,
    },
};

static INIT: Once = Once::new();
static IS_INITIALIZED: AtomicBool = AtomicBool::new(false);

pub fn is_active() -> bool {
    IS_INITIALIZED.load(Ordering::SeqCst)
}

/// Operator messages go to stdout as they are, everything
/// else ends up in the log file when there is one.
pub fn start(id: &str, file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Debug
    };

    if is_active() {
        anyhow::bail!("attempted to setup logger more than once");
    }

    let id = format!("{}:{}", id.to_owned(), std::process::id());

    let console = fern::Dispatch::new()
        .format(|out, msg, _| out.finish(format_args!("{msg}")))
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        .level_for("midir", log::LevelFilter::Off)
        .chain(console);

    if let Some(file) = file {
        if let Some(dir) = file.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let file = fern::Dispatch::new()
            .format(move |out, msg, record| {
                let time = humantime::format_rfc3339_seconds(std::time::SystemTime::now());

                if cfg!(debug_assertions) {
                    out.finish(format_args!(
                        "[ {id} ] : [ {time} ] : [ {} {} ] : {msg}",
                        record.target(),
                        record.level(),
                    ))
                } else {
                    out.finish(format_args!("[ {id} ] : [ {time} ] : {msg}"))
                }
            })
            .chain(fern::log_file(file)?);

        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;

    log::trace!("started");

    INIT.call_once(|| IS_INITIALIZED.store(true, Ordering::SeqCst));
    Ok(())
}
