use std::sync::Arc;
use std::sync::Mutex;

use super::ErrorKind;
use super::Result;

/// A single BGP host route this node may advertise or withdraw.
///
/// Immutable once constructed; a /32 prefix is implied by the emitted protocol (§4.2), so only
/// the address itself is carried.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Route {
    prefix: String,
    next_hop_tag: String,
    metric: u32,
}

impl Route {
    /// Build a route, rejecting a record missing a prefix or next-hop tag.
    pub fn new(prefix: impl Into<String>, next_hop_tag: impl Into<String>, metric: u32) -> Result<Route> {
        let prefix = prefix.into();
        let next_hop_tag = next_hop_tag.into();
        if prefix.is_empty() {
            return Err(ErrorKind::InvalidRoute("prefix").into());
        }
        if next_hop_tag.is_empty() {
            return Err(ErrorKind::InvalidRoute("next_hop_tag").into());
        }
        Ok(Route { prefix, next_hop_tag, metric })
    }

    /// Convenience constructor for the `next-hop self` case that is the only one this controller
    /// ever produces; `next_hop_tag` is carried for symmetry with the wire format (§4.2).
    pub fn with_self_next_hop(prefix: impl Into<String>, metric: u32) -> Result<Route> {
        Route::new(prefix, "self", metric)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_hop_tag(&self) -> &str {
        &self.next_hop_tag
    }

    pub fn metric(&self) -> u32 {
        self.metric
    }
}

/// Ordered sequence of routes, replaced wholesale on each reconciliation.
///
/// Duplicates by prefix are permitted by the type but never produced by the reconciler.
#[derive(Clone, Default, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> RouteTable {
        RouteTable { routes: Vec::new() }
    }

    /// Append a route, preserving insertion order.
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Return a copy of the table's current contents, in insertion order.
    pub fn snapshot(&self) -> Vec<Route> {
        self.routes.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Discard every route, leaving the table empty. Used to clear the advertised table on a
    /// Suspended transition (§4.3) without waiting for the next refresh to rebuild it.
    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

/// The live table shared between the control loop (which rebuilds and re-emits it every
/// iteration) and the session listener's Suspended branch (which clears it, so a subsequent
/// wake-up does not re-announce routes just withdrawn -- §4.3, §5).
pub type SharedTable = Arc<Mutex<RouteTable>>;
