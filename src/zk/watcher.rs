use std::sync::Arc;

use slog::Logger;

use super::super::flags::Flags;
use super::client::Client;

/// Installs a persistent child-watch on the service directory (§4.4).
///
/// The underlying `zookeeper` crate only ever delivers a watch once; `install` re-arms itself on
/// every delivery (the same self-re-arming pattern the teacher crate's election watch uses for
/// its own election node) so the watch is effectively persistent. It never reads the child list
/// itself: reading is deferred to the control loop so an unhealthy node neither announces nor
/// churns routes.
pub struct Watcher {
    client: Arc<Client>,
    flags: Flags,
    logger: Logger,
    path: String,
}

impl Watcher {
    pub fn new(client: Arc<Client>, path: impl Into<String>, flags: Flags, logger: Logger) -> Watcher {
        Watcher {
            client,
            flags,
            logger,
            path: path.into(),
        }
    }

    /// Install (or re-install) the watch. The initial delivery, like every subsequent one, sets
    /// `refresh`.
    pub fn install(&self) {
        Watcher::arm(Arc::clone(&self.client), self.path.clone(), self.flags.clone(), self.logger.clone());
    }

    fn arm(client: Arc<Client>, path: String, flags: Flags, logger: Logger) {
        let keeper = client.handle();
        let closure_client = Arc::clone(&client);
        let closure_path = path.clone();
        let closure_flags = flags.clone();
        let closure_logger = logger.clone();
        let result = Client::get_children_w(&keeper, &path, move |_event| {
            debug!(closure_logger, "Membership directory children changed"; "path" => &closure_path);
            closure_flags.set_refresh();
            Watcher::arm(
                Arc::clone(&closure_client), closure_path.clone(), closure_flags.clone(), closure_logger.clone(),
            );
        });
        match result {
            Ok(_) => {
                debug!(logger, "Installed membership child watch"; "path" => &path);
                flags.set_refresh();
            }
            Err(error) => {
                error!(logger, "Failed to install membership child watch"; "path" => &path, "error" => %error);
            }
        }
    }
}
