use failure::ResultExt;
use signal_hook::iterator::Signals;
use slog::Logger;

use super::flags::Flags;
use super::ErrorKind;
use super::Result;

/// Register SIGINT/SIGTERM as graceful-shutdown requests (§5, §6).
///
/// `signal-hook`'s iterator delivers signals over a self-pipe to a dedicated watcher thread, so
/// the actual signal-handler context never runs any of our code -- `Flags::set_should_stop` is a
/// single atomic store executed on an ordinary thread, not inside the handler itself.
pub fn install(flags: Flags, logger: Logger) -> Result<()> {
    let signals = Signals::new(&[signal_hook::SIGINT, signal_hook::SIGTERM])
        .with_context(|_| ErrorKind::SignalInit)?;
    ::std::thread::Builder::new()
        .name("anycast:signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                info!(logger, "Received signal, requesting graceful shutdown"; "signal" => signal);
                flags.set_should_stop();
            }
        })
        .with_context(|_| ErrorKind::SpawnThread("signals"))?;
    Ok(())
}
