use std::sync::Arc;
use std::time::Duration;

use failure::ResultExt;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::Stat;
use zookeeper::Watcher;
use zookeeper::ZkError;
use zookeeper::ZkResult;
use zookeeper::ZooKeeper;

use super::super::ErrorKind;
use super::super::Result;

use super::metrics::ZOO_CONNECTION_COUNT;
use super::metrics::ZOO_OP_DURATION;
use super::metrics::ZOO_OP_ERRORS_COUNT;
use super::metrics::ZOO_TIMEOUTS_COUNT;

/// Thin wrapper around a `zookeeper::ZooKeeper` handle.
///
/// Tracks per-operation Prometheus metrics (latency, error counts, timeouts) the way the teacher
/// crate's own `backend::zookeeper::Client` does. Unlike the teacher, this wrapper does not
/// silently swap in a fresh session on disconnect: the whole point of the Session Supervisor
/// (§4.3) is to surface session-state transitions to the control loop, so reconnection here is
/// left entirely to the `zookeeper` crate's own internal retry behaviour and observed through the
/// state listener instead of papered over.
pub struct Client {
    keeper: Arc<ZooKeeper>,
}

impl Client {
    /// Connect to the ensemble and ensure the root and service directories exist.
    pub fn connect(
        hosts: &[String],
        timeout: Duration,
        logger: &Logger,
    ) -> Result<Client> {
        let connect_string = hosts.join(",");
        ZOO_CONNECTION_COUNT.inc();
        let timer = ZOO_OP_DURATION.with_label_values(&["connect"]).start_timer();
        let keeper = ZooKeeper::connect(&connect_string, timeout, |_| {})
            .map_err(|error| {
                ZOO_OP_ERRORS_COUNT.with_label_values(&["connect"]).inc();
                if error == ZkError::OperationTimeout {
                    ZOO_TIMEOUTS_COUNT.inc();
                }
                error
            })
            .with_context(|_| ErrorKind::BackendConnect)?;
        timer.observe_duration();
        info!(logger, "Connected to zookeeper ensemble"; "hosts" => connect_string);
        Ok(Client { keeper: Arc::new(keeper) })
    }

    pub fn handle(&self) -> Arc<ZooKeeper> {
        Arc::clone(&self.keeper)
    }

    /// Ensure the given path exists as a persistent, open-ACL container, creating every missing
    /// path segment from the root down (the `{zk_path_service}/{srv_name}` directory may need
    /// both segments created on first boot).
    pub fn ensure_persistent(&self, path: &str) -> Result<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = String::new();
        for segment in segments {
            current.push('/');
            current.push_str(segment);
            self.ensure_persistent_segment(&current)?;
        }
        Ok(())
    }

    fn ensure_persistent_segment(&self, path: &str) -> Result<()> {
        let timer = ZOO_OP_DURATION.with_label_values(&["exists"]).start_timer();
        let exists = Client::exists(&self.keeper, path, false)
            .with_context(|_| ErrorKind::Backend("path check"))?
            .is_some();
        timer.observe_duration();
        if exists {
            return Ok(());
        }
        let timer = ZOO_OP_DURATION.with_label_values(&["create"]).start_timer();
        let result = Client::create(
            &self.keeper, path, Vec::new(), Acl::open_unsafe().clone(), CreateMode::Persistent,
        );
        timer.observe_duration();
        match result {
            Ok(_) => Ok(()),
            Err(ZkError::NodeExists) => Ok(()),
            Err(error) => Err(error).with_context(|_| ErrorKind::Backend("path creation"))?,
        }
    }

    /// Wrapper for `ZooKeeper::create` to track metrics.
    pub fn create(
        keeper: &ZooKeeper, path: &str, payload: Vec<u8>, acl: Vec<Acl>, mode: CreateMode,
    ) -> ZkResult<String> {
        let _timer = ZOO_OP_DURATION.with_label_values(&["create"]).start_timer();
        keeper.create(path, payload, acl, mode).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["create"]).inc();
            if error == ZkError::OperationTimeout {
                ZOO_TIMEOUTS_COUNT.inc();
            }
            error
        })
    }

    /// Wrapper for `ZooKeeper::delete` to track metrics.
    pub fn delete(keeper: &ZooKeeper, path: &str, version: Option<i32>) -> ZkResult<()> {
        let _timer = ZOO_OP_DURATION.with_label_values(&["delete"]).start_timer();
        keeper.delete(path, version).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["delete"]).inc();
            if error == ZkError::OperationTimeout {
                ZOO_TIMEOUTS_COUNT.inc();
            }
            error
        })
    }

    /// Wrapper for `ZooKeeper::exists` to track metrics.
    pub fn exists(keeper: &ZooKeeper, path: &str, watch: bool) -> ZkResult<Option<Stat>> {
        let _timer = ZOO_OP_DURATION.with_label_values(&["exists"]).start_timer();
        keeper.exists(path, watch).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["exists"]).inc();
            if error == ZkError::OperationTimeout {
                ZOO_TIMEOUTS_COUNT.inc();
            }
            error
        })
    }

    /// Wrapper for `ZooKeeper::get_children` to track metrics.
    pub fn get_children(keeper: &ZooKeeper, path: &str, watch: bool) -> ZkResult<Vec<String>> {
        let _timer = ZOO_OP_DURATION.with_label_values(&["get_children"]).start_timer();
        keeper.get_children(path, watch).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["get_children"]).inc();
            if error == ZkError::OperationTimeout {
                ZOO_TIMEOUTS_COUNT.inc();
            }
            error
        })
    }

    /// Wrapper for `ZooKeeper::get_children_w` to track metrics.
    pub fn get_children_w<W>(keeper: &ZooKeeper, path: &str, watcher: W) -> ZkResult<Vec<String>>
    where
        W: Watcher + 'static,
    {
        let _timer = ZOO_OP_DURATION.with_label_values(&["get_children_w"]).start_timer();
        keeper.get_children_w(path, watcher).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["get_children_w"]).inc();
            if error == ZkError::OperationTimeout {
                ZOO_TIMEOUTS_COUNT.inc();
            }
            error
        })
    }
}

#[cfg(test)]
mod tests {
    // `ensure_persistent`'s path-splitting is the only pure logic in this module; everything
    // else requires a live ensemble and is exercised by the control loop's reconciliation tests
    // instead (see `control.rs`), which do not depend on a real `zookeeper::ZooKeeper`.
    #[test]
    fn path_segments_split_correctly() {
        let segments: Vec<&str> = "/services/web".split('/').filter(|s| !s.is_empty()).collect();
        assert_eq!(segments, vec!["services", "web"]);
    }
}
