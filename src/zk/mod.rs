mod client;
mod metrics;
mod session;
mod watcher;

pub use self::client::Client;
pub use self::metrics::register_metrics;
pub use self::session::Session;
pub use self::session::SessionState;
pub use self::watcher::Watcher;
