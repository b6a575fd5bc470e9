#[macro_use]
extern crate clap;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate lazy_static;
extern crate nix;
extern crate prometheus;
extern crate serde;
extern crate serde_derive;
extern crate serde_yaml;
extern crate signal_hook;
#[macro_use]
extern crate slog;
extern crate slog_json;
extern crate slog_term;
extern crate wait_timeout;
extern crate zookeeper;

mod control;
mod emitter;
mod error;
mod flags;
mod health;
mod route;
mod signals;
mod zk;

pub mod config;
pub mod logging;
pub mod metrics;

pub use self::config::Config;
pub use self::control::reconcile;
pub use self::control::ControlLoop;
pub use self::emitter::Emitter;
pub use self::error::format_fail;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::error::Result;
pub use self::flags::Flags;
pub use self::health::Probe;
pub use self::route::Route;
pub use self::route::RouteTable;
pub use self::route::SharedTable;

use std::sync::Arc;
use std::time::Duration;

use slog::Logger;

use self::zk::Client;
use self::zk::Session;
use self::zk::Watcher;

/// Run the controller end to end, per the startup sequence in §4.6.
///
/// Connects to the ensemble, ensures the service directory exists, spins past any stale
/// membership node left by a prior instance on the same host, installs the child watcher and
/// session listener, then hands off to the control loop until a shutdown signal is observed.
pub fn run(config: Config, logger: Logger) -> Result<()> {
    let registry = prometheus::Registry::new();
    self::metrics::register_metrics(&logger, &registry);

    let config = Arc::new(config);
    let flags = Flags::new();
    self::signals::install(flags.clone(), logger.clone())?;

    let emitter = Arc::new(Emitter::stdout(logger.clone()));
    let table: SharedTable = Arc::new(::std::sync::Mutex::new(RouteTable::new()));

    info!(logger, "Connecting to zookeeper ensemble"; "hosts" => config.zk_hosts.join(","));
    let timeout = Duration::from_secs(config.zk_session_timeout_secs);
    let client = Arc::new(Client::connect(&config.zk_hosts, timeout, &logger)?);
    client.ensure_persistent(&config.service_path())?;

    wait_for_stale_node(&client, &config, &flags, &logger);
    if flags.should_stop() {
        info!(logger, "Shutdown requested during startup, exiting before control loop");
        return Ok(());
    }

    let session = Session::new(
        Arc::clone(&client), Arc::clone(&config), Arc::clone(&emitter), flags.clone(), logger.clone(),
        Arc::clone(&table),
    );
    session.watch_state();

    let watcher = Watcher::new(Arc::clone(&client), config.service_path(), flags.clone(), logger.clone());
    watcher.install();

    let probe = Probe::new(
        config.local_check.clone(), Duration::from_millis(config.probe_timeout_ms), logger.clone(),
    );

    info!(logger, "Startup complete, entering control loop");
    let mut control_loop = ControlLoop::new(
        Arc::clone(&config), emitter, flags, logger, probe, session, client, table,
    );
    control_loop.run()
}

/// Spin until the full membership znode path has disappeared (§4.6), guarding against a
/// same-hostname restart while the previous session's ephemeral is still being reaped. Bounded by
/// `should_stop` so a shutdown signal during the spin is still honored.
fn wait_for_stale_node(client: &Client, config: &Config, flags: &Flags, logger: &Logger) {
    let path = config.membership_path();
    loop {
        if flags.should_stop() {
            return;
        }
        let keeper = client.handle();
        match self::zk::Client::exists(&keeper, &path, false) {
            Ok(None) => return,
            Ok(Some(_)) => {
                warn!(logger, "Stale membership node found, waiting for it to clear"; "path" => &path);
                ::std::thread::sleep(Duration::from_secs(1));
            }
            Err(error) => {
                error!(logger, "Failed to check for stale membership node"; "path" => &path, "error" => %error);
                ::std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}
