//! Bookkeeping for what the agent currently has running, so a stop or a
//! reload can be unwound in the exact reverse of the order §4.11 starts
//! things in: dashboard, probe and control-plane participation carry no
//! kernel state and are dropped in place; the router, network plane and
//! tunnels are reversed explicitly here.

use uvn_05_tunnel::TunnelHandle;
use uvn_07_router::RouterHandle;

/// Everything a running agent holds that must be torn down (or survive a
/// reload) in a fixed order. The PID file is deliberately not a field
/// here: it is claimed once at process startup and released once at
/// shutdown, never across a hot reload.
#[derive(Debug, Default)]
pub struct ServiceHandles {
    pub tunnels: Vec<TunnelHandle>,
    pub plane_started: bool,
    pub router: Option<RouterHandle>,
}

impl ServiceHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty() && !self.plane_started && self.router.is_none()
    }
}
