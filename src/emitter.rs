use std::io::Stdout;
use std::io::Write;
use std::sync::Mutex;

use failure::ResultExt;
use slog::Logger;

use super::route::Route;
use super::route::RouteTable;
use super::ErrorKind;
use super::Result;

/// Formats and writes BGP announce/withdraw commands.
///
/// Wraps the destination writer in a `Mutex` so the control loop's batch emission and the session
/// listener's Suspended-branch emission (§5) can never interleave mid-line: whichever acquires the
/// lock first writes and flushes its whole batch before the other proceeds.
pub struct Emitter<W: Write> {
    logger: Logger,
    writer: Mutex<W>,
}

impl Emitter<Stdout> {
    pub fn stdout(logger: Logger) -> Emitter<Stdout> {
        Emitter::new(::std::io::stdout(), logger)
    }
}

impl<W: Write> Emitter<W> {
    pub fn new(writer: W, logger: Logger) -> Emitter<W> {
        Emitter {
            logger,
            writer: Mutex::new(writer),
        }
    }

    /// Emit an announce line for every route in the given snapshot, in order, then flush once.
    pub fn announce_all(&self, routes: &[Route]) -> Result<()> {
        let mut writer = self.writer.lock().expect("emitter lock poisoned");
        for route in routes {
            self.write_line(&mut writer, "announce", route)?;
        }
        writer.flush().with_context(|_| ErrorKind::EmitterWrite)?;
        Ok(())
    }

    /// Emit a withdraw line for every route in the given snapshot, in order, then flush once.
    pub fn withdraw_all(&self, routes: &[Route]) -> Result<()> {
        let mut writer = self.writer.lock().expect("emitter lock poisoned");
        for route in routes {
            self.write_line(&mut writer, "withdraw", route)?;
        }
        writer.flush().with_context(|_| ErrorKind::EmitterWrite)?;
        Ok(())
    }

    /// Emit the full current table as announces; convenience for the control loop's per-iteration
    /// re-emission (§4.5 step 6).
    pub fn announce_table(&self, table: &RouteTable) -> Result<()> {
        self.announce_all(&table.snapshot())
    }

    fn write_line(&self, writer: &mut W, verb: &str, route: &Route) -> Result<()> {
        let line = format!(
            "{} route {}/32 next-hop {} med {}\n",
            verb,
            route.prefix(),
            route.next_hop_tag(),
            route.metric(),
        );
        writer
            .write_all(line.as_bytes())
            .with_context(|_| ErrorKind::EmitterWrite)?;
        debug!(self.logger, "Emitted BGP command"; "verb" => verb, "prefix" => route.prefix());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use slog::Discard;
    use slog::Logger;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::Emitter;
    use super::super::route::Route;

    fn logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl ::std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> ::std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> ::std::io::Result<()> {
            Ok(())
        }
    }

    fn lines(buffer: &Buffer) -> Vec<String> {
        let data = buffer.0.lock().unwrap().clone();
        String::from_utf8(data)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn announce_formats_expected_line() {
        let buffer = Buffer::default();
        let emitter = Emitter::new(buffer.clone(), logger());
        let route = Route::with_self_next_hop("10.0.0.1", 100).unwrap();
        emitter.announce_all(&[route]).unwrap();
        assert_eq!(lines(&buffer), vec!["announce route 10.0.0.1/32 next-hop self med 100"]);
    }

    #[test]
    fn withdraw_formats_expected_line() {
        let buffer = Buffer::default();
        let emitter = Emitter::new(buffer.clone(), logger());
        let route = Route::with_self_next_hop("10.0.0.2", 200).unwrap();
        emitter.withdraw_all(&[route]).unwrap();
        assert_eq!(lines(&buffer), vec!["withdraw route 10.0.0.2/32 next-hop self med 200"]);
    }

    #[test]
    fn batch_preserves_order() {
        let buffer = Buffer::default();
        let emitter = Emitter::new(buffer.clone(), logger());
        let routes = vec![
            Route::with_self_next_hop("10.0.0.2", 200).unwrap(),
            Route::with_self_next_hop("10.0.0.3", 200).unwrap(),
            Route::with_self_next_hop("10.0.0.1", 100).unwrap(),
        ];
        emitter.announce_all(&routes).unwrap();
        assert_eq!(
            lines(&buffer),
            vec![
                "announce route 10.0.0.2/32 next-hop self med 200",
                "announce route 10.0.0.3/32 next-hop self med 200",
                "announce route 10.0.0.1/32 next-hop self med 100",
            ]
        );
    }
}
