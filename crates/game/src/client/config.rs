use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::net::StreamLimits;

use super::reconcile::DEFAULT_SMOOTHING;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address a hosting client uses to reach its own server.
    pub host_address: IpAddr,
    pub connect_timeout: Duration,
    pub server_timeout: Duration,
    /// Delay after a failed or lost connection before returning to the menu.
    pub failure_grace: Duration,
    pub position_update_rate: u32,
    pub smoothing: f32,
    pub broadcast_display: Duration,
    pub stream_limits: StreamLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            connect_timeout: Duration::from_secs(5),
            server_timeout: Duration::from_secs(2),
            failure_grace: Duration::from_secs(5),
            position_update_rate: 20,
            smoothing: DEFAULT_SMOOTHING,
            broadcast_display: Duration::from_millis(2500),
            stream_limits: StreamLimits::default(),
        }
    }
}
