use std::io::Write;
use std::sync::Arc;

use failure::ResultExt;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::ZkError;
use zookeeper::ZkState;

use super::super::config::Config;
use super::super::emitter::Emitter;
use super::super::flags::Flags;
use super::super::metrics::LOST_TOTAL;
use super::super::metrics::RECREATE_SOFT_FAIL_TOTAL;
use super::super::metrics::RECREATE_TOTAL;
use super::super::metrics::SUSPENDED_TOTAL;
use super::super::route::Route;
use super::super::route::SharedTable;
use super::super::ErrorKind;
use super::super::Result;
use super::client::Client;

/// Observed session state, augmented from the client library's own state machine (§3).
///
/// The `zookeeper` crate's `ZkState` does not distinguish a transient reconnect attempt from a
/// permanently expired session the way kazoo's `SUSPENDED`/`LOST` pair does; `From<ZkState>`
/// below resolves that mapping (documented in `DESIGN.md`).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum SessionState {
    Init,
    Connected,
    Suspended,
    Lost,
}

impl From<ZkState> for SessionState {
    fn from(state: ZkState) -> SessionState {
        match state {
            ZkState::Connected | ZkState::ConnectedReadOnly => SessionState::Connected,
            ZkState::Connecting => SessionState::Suspended,
            ZkState::Closed | ZkState::AuthFailed => SessionState::Lost,
            _ => SessionState::Suspended,
        }
    }
}

/// Owns the zookeeper client lifecycle and reacts to session-state transitions (§4.3).
pub struct Session<W: Write + Send + 'static> {
    client: Arc<Client>,
    config: Arc<Config>,
    emitter: Arc<Emitter<W>>,
    flags: Flags,
    logger: Logger,
    table: SharedTable,
}

impl<W: Write + Send + 'static> Session<W> {
    pub fn new(
        client: Arc<Client>,
        config: Arc<Config>,
        emitter: Arc<Emitter<W>>,
        flags: Flags,
        logger: Logger,
        table: SharedTable,
    ) -> Session<W> {
        Session {
            client,
            config,
            emitter,
            flags,
            logger,
            table,
        }
    }

    /// Register the session-state listener described in §4.3. Must be called once, after the
    /// client has connected.
    pub fn watch_state(&self) {
        let config = Arc::clone(&self.config);
        let emitter = Arc::clone(&self.emitter);
        let flags = self.flags.clone();
        let logger = self.logger.clone();
        let table = Arc::clone(&self.table);
        self.client.handle().add_listener(move |state| {
            let state = SessionState::from(state);
            info!(logger, "Zookeeper session state changed"; "state" => ?state);
            match state {
                SessionState::Suspended => {
                    SUSPENDED_TOTAL.inc();
                    error!(logger, "Zookeeper session suspended, withdrawing all routes");
                    Session::<W>::withdraw_everything(&config, &emitter, &table, &logger);
                }
                SessionState::Lost => {
                    LOST_TOTAL.inc();
                    error!(logger, "Zookeeper session lost, membership node must be recreated");
                    flags.set_recreate();
                }
                SessionState::Connected => {
                    flags.set_refresh();
                }
                SessionState::Init => {}
            }
        });
    }

    /// Emit a withdraw for the auth IP and every non-auth IP, then empty the shared table so the
    /// control loop's next per-iteration re-announce (§4.5 step 6) has nothing left to re-send
    /// until a refresh rebuilds it (§4.3's Suspended action).
    fn withdraw_everything(config: &Config, emitter: &Emitter<W>, table: &SharedTable, logger: &Logger) {
        let mut withdraws = Vec::new();
        for ip in &config.srv_non_auth_ips {
            match Route::with_self_next_hop(ip.clone(), 200) {
                Ok(route) => withdraws.push(route),
                Err(error) => error!(logger, "Skipping malformed non-auth route"; "error" => %error),
            }
        }
        match Route::with_self_next_hop(config.srv_auth_ip.clone(), 100) {
            Ok(route) => withdraws.push(route),
            Err(error) => error!(logger, "Skipping malformed auth route"; "error" => %error),
        }
        if let Err(error) = emitter.withdraw_all(&withdraws) {
            error!(logger, "Failed to emit withdraws on session suspend"; "error" => %error);
        }
        table.lock().expect("route table lock poisoned").clear();
    }

    /// Attempt to (re)create the ephemeral membership znode (§4.3, §4.5 step 4).
    ///
    /// A session-expired or connection-loss failure is treated as a soft failure: `recreate` is
    /// re-asserted and the next healthy iteration will try again. Any other failure is fatal and
    /// surfaced to the caller.
    pub fn create_node(&self) -> Result<()> {
        RECREATE_TOTAL.inc();
        let path = self.config.membership_path();
        let keeper = self.client.handle();
        let result = Client::create(
            &keeper,
            &path,
            Vec::new(),
            Acl::open_unsafe().clone(),
            CreateMode::Ephemeral,
        );
        match result {
            Ok(_) => {
                info!(self.logger, "Created membership node"; "path" => &path);
                Ok(())
            }
            Err(ZkError::NodeExists) => {
                debug!(self.logger, "Membership node already exists"; "path" => &path);
                Ok(())
            }
            Err(ZkError::SessionExpired) | Err(ZkError::ConnectionLoss) => {
                RECREATE_SOFT_FAIL_TOTAL.inc();
                warn!(
                    self.logger, "Session expired while creating membership node, will retry";
                    "path" => &path
                );
                self.flags.set_recreate();
                Ok(())
            }
            Err(error) => Err(error).with_context(|_| ErrorKind::Backend("membership node creation"))?,
        }
    }

    /// Disconnect the client. Idempotent; errors are logged but not raised (§4.3).
    pub fn stop(&self) {
        match self.client.handle().close() {
            Ok(()) => info!(self.logger, "Zookeeper session closed"),
            Err(error) => warn!(self.logger, "Error while closing zookeeper session"; "error" => %error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use slog::Discard;
    use slog::Logger;
    use zookeeper::ZkState;

    use super::super::super::config::Config;
    use super::super::super::emitter::Emitter;
    use super::super::super::route::Route;
    use super::super::super::route::RouteTable;
    use super::Session;
    use super::SessionState;

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
        String::from_utf8(data).unwrap().lines().map(|l| l.to_string()).collect()
    }

    fn config() -> Config {
        Config {
            zk_hosts: vec!["zk1:2181".to_string()],
            zk_path_service: "/services".to_string(),
            srv_name: "web".to_string(),
            srv_auth_ip: "10.0.0.1".to_string(),
            srv_non_auth_ips: vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()],
            local_check: "/usr/bin/check.sh".to_string(),
            zk_session_timeout_secs: 10,
            probe_timeout_ms: 1000,
            tick_interval_ms: 100,
            long_sleep_secs: 10,
        }
    }

    #[test]
    fn connected_maps_to_connected() {
        assert_eq!(SessionState::from(ZkState::Connected), SessionState::Connected);
        assert_eq!(SessionState::from(ZkState::ConnectedReadOnly), SessionState::Connected);
    }

    #[test]
    fn connecting_maps_to_suspended() {
        assert_eq!(SessionState::from(ZkState::Connecting), SessionState::Suspended);
    }

    #[test]
    fn closed_maps_to_lost() {
        assert_eq!(SessionState::from(ZkState::Closed), SessionState::Lost);
    }

    /// §8 property 3 / scenario S4: a Suspended transition withdraws the auth IP and every
    /// non-auth IP, in order, and empties the shared table so nothing is re-announced before the
    /// next refresh rebuilds it.
    #[test]
    fn suspended_withdraws_everything_and_clears_table() {
        let buffer = Buffer::default();
        let emitter = Emitter::new(buffer.clone(), logger());
        let table = Arc::new(Mutex::new(RouteTable::new()));
        table.lock().unwrap().add(Route::with_self_next_hop("10.0.0.1", 100).unwrap());
        let config = config();

        Session::<Buffer>::withdraw_everything(&config, &emitter, &table, &logger());

        assert_eq!(
            lines(&buffer),
            vec![
                "withdraw route 10.0.0.2/32 next-hop self med 200",
                "withdraw route 10.0.0.3/32 next-hop self med 200",
                "withdraw route 10.0.0.1/32 next-hop self med 100",
            ]
        );
        assert!(table.lock().unwrap().is_empty());
    }
}
