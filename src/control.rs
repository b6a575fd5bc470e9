use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use slog::Logger;

use super::config::Config;
use super::emitter::Emitter;
use super::flags::Flags;
use super::health::Probe;
use super::metrics::ITERATIONS_TOTAL;
use super::metrics::PROBE_FAIL_TOTAL;
use super::metrics::PROBE_RUNS_TOTAL;
use super::metrics::REFRESH_TOTAL;
use super::route::Route;
use super::route::RouteTable;
use super::route::SharedTable;
use super::zk::Client;
use super::zk::Session;
use super::Result;

/// Pure reconciliation arithmetic (§4.5 step 5), independent of any live ZooKeeper connection so
/// it is directly unit-testable per §8.
///
/// Returns the table to install (auth IP last, per the emission-order convention of §4.2) and the
/// withdraws to emit first for any non-auth IP a peer currently owns.
pub fn reconcile(
    auth_ip: &str,
    non_auth_ips: &[String],
    children: &HashSet<String>,
) -> (RouteTable, Vec<Route>) {
    let mut table = RouteTable::new();
    let mut withdraws = Vec::new();
    for ip in non_auth_ips {
        if children.contains(ip) {
            if let Ok(route) = Route::with_self_next_hop(ip.clone(), 200) {
                withdraws.push(route);
            }
        } else if let Ok(route) = Route::with_self_next_hop(ip.clone(), 200) {
            table.add(route);
        }
    }
    if let Ok(route) = Route::with_self_next_hop(auth_ip.to_string(), 100) {
        table.add(route);
    }
    (table, withdraws)
}

/// The top-level reactor described in §4.5: fuses session events, peer-set changes, and health
/// results into route decisions.
pub struct ControlLoop<W: Write + Send + 'static> {
    config: Arc<Config>,
    emitter: Arc<Emitter<W>>,
    flags: Flags,
    logger: Logger,
    probe: Probe,
    session: Session<W>,
    zk_client: Arc<Client>,
    table: SharedTable,
}

impl<W: Write + Send + 'static> ControlLoop<W> {
    pub fn new(
        config: Arc<Config>,
        emitter: Arc<Emitter<W>>,
        flags: Flags,
        logger: Logger,
        probe: Probe,
        session: Session<W>,
        zk_client: Arc<Client>,
        table: SharedTable,
    ) -> ControlLoop<W> {
        ControlLoop {
            config,
            emitter,
            flags,
            logger,
            probe,
            session,
            zk_client,
            table,
        }
    }

    /// Run until `should_stop` is observed. Each pass through the body is one iteration of §4.5.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.wait_for_work();
            if self.flags.should_stop() {
                info!(self.logger, "Shutdown requested, exiting control loop");
                self.session.stop();
                return Ok(());
            }

            PROBE_RUNS_TOTAL.inc();
            if !self.probe.check() {
                PROBE_FAIL_TOTAL.inc();
                error!(self.logger, "Health probe failed, skipping this iteration");
                continue;
            }
            ITERATIONS_TOTAL.inc();

            if self.flags.take_recreate() {
                self.session.create_node()?;
            }

            if self.flags.take_refresh() {
                self.refresh()?;
            }

            let table = self.table.lock().expect("route table lock poisoned").clone();
            self.emitter.announce_table(&table)?;
        }
    }

    /// Block until a flag is raised or the long-sleep deadline expires, polling at the short tick
    /// interval (§4.5 step 1, §5). Neither the tick sleep nor the flag reads hold any lock.
    fn wait_for_work(&self) {
        let tick = Duration::from_millis(self.config.tick_interval_ms);
        let deadline = Duration::from_secs(self.config.long_sleep_secs);
        let start = Instant::now();
        while !self.flags.refresh() && !self.flags.recreate() && !self.flags.should_stop() {
            if start.elapsed() >= deadline {
                break;
            }
            sleep(tick);
        }
    }

    /// Read the current child set and rebuild the route table (§4.5 step 5).
    ///
    /// A failed child-list fetch is not fatal: it is logged and the previous table is kept in
    /// place. The session listener will observe the underlying connection trouble as a
    /// state-transition and re-assert `refresh` once the session reports Connected again (§7).
    fn refresh(&mut self) -> Result<()> {
        REFRESH_TOTAL.inc();
        let path = self.config.service_path();
        let keeper = self.zk_client.handle();
        let children = match Client::get_children(&keeper, &path, false) {
            Ok(children) => children,
            Err(error) => {
                error!(
                    self.logger, "Failed to read membership children, keeping previous table";
                    "error" => %error
                );
                return Ok(());
            }
        };
        let children: HashSet<String> = children.into_iter().collect();

        let (table, withdraws) = reconcile(
            &self.config.srv_auth_ip, &self.config.srv_non_auth_ips, &children,
        );
        if !withdraws.is_empty() {
            self.emitter.withdraw_all(&withdraws)?;
        }
        *self.table.lock().expect("route table lock poisoned") = table;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::reconcile;

    fn ips(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// S1: solo node healthy, no peers own any non-auth IP.
    #[test]
    fn solo_node_announces_everything() {
        let non_auth = ips(&["10.0.0.2", "10.0.0.3"]);
        let children = set(&[]);
        let (table, withdraws) = reconcile("10.0.0.1", &non_auth, &children);
        assert!(withdraws.is_empty());
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].prefix(), "10.0.0.2");
        assert_eq!(snapshot[0].metric(), 200);
        assert_eq!(snapshot[1].prefix(), "10.0.0.3");
        assert_eq!(snapshot[1].metric(), 200);
        assert_eq!(snapshot[2].prefix(), "10.0.0.1");
        assert_eq!(snapshot[2].metric(), 100);
    }

    /// S2: a peer owns 10.0.0.2; it must be withdrawn and not announced.
    #[test]
    fn peer_owned_ip_is_withdrawn_not_announced() {
        let non_auth = ips(&["10.0.0.2", "10.0.0.3"]);
        let children = set(&["10.0.0.2"]);
        let (table, withdraws) = reconcile("10.0.0.1", &non_auth, &children);
        assert_eq!(withdraws.len(), 1);
        assert_eq!(withdraws[0].prefix(), "10.0.0.2");
        assert_eq!(withdraws[0].metric(), 200);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].prefix(), "10.0.0.3");
        assert_eq!(snapshot[1].prefix(), "10.0.0.1");
    }

    /// Invariant 1 & 2: exactly one route per absent non-auth IP, one for the auth IP, and a
    /// withdraw for every present one -- no more, no less.
    #[test]
    fn table_contains_exactly_the_expected_routes() {
        let non_auth = ips(&["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
        let children = set(&["10.0.0.2", "10.0.0.4"]);
        let (table, withdraws) = reconcile("10.0.0.1", &non_auth, &children);
        assert_eq!(withdraws.len(), 2);
        assert_eq!(table.len(), 2);
        // Auth IP always present, and the only non-auth survivor is 10.0.0.3.
        assert!(table.snapshot().iter().any(|r| r.prefix() == "10.0.0.1"));
        assert!(table.snapshot().iter().any(|r| r.prefix() == "10.0.0.3"));
    }

    /// Idempotence (invariant 5): two reconciliations with the same inputs produce identical
    /// batches.
    #[test]
    fn reconcile_is_idempotent_for_unchanged_inputs() {
        let non_auth = ips(&["10.0.0.2", "10.0.0.3"]);
        let children = set(&["10.0.0.2"]);
        let (table_a, withdraws_a) = reconcile("10.0.0.1", &non_auth, &children);
        let (table_b, withdraws_b) = reconcile("10.0.0.1", &non_auth, &children);
        assert_eq!(table_a.snapshot(), table_b.snapshot());
        assert_eq!(withdraws_a, withdraws_b);
    }

    /// No non-auth IPs configured: only the auth route is ever produced.
    #[test]
    fn no_non_auth_ips_yields_only_auth_route() {
        let non_auth: Vec<String> = Vec::new();
        let children = set(&[]);
        let (table, withdraws) = reconcile("10.0.0.1", &non_auth, &children);
        assert!(withdraws.is_empty());
        assert_eq!(table.len(), 1);
        assert_eq!(table.snapshot()[0].prefix(), "10.0.0.1");
    }
}
