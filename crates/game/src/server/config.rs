use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use glam::Vec2;

use crate::net::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, DEFAULT_SEND_BUFFER_LIMIT, StreamLimits};

use super::spawn::DEFAULT_SPAWN_POINTS;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub max_peers: usize,
    pub client_timeout: Duration,
    /// World step rate (scroll), in Hz.
    pub step_rate: u32,
    /// Snapshot broadcast rate, in Hz.
    pub tick_rate: u32,
    pub idle_sleep: Duration,
    pub world_height: f32,
    pub battlefield_size: Vec2,
    pub scroll_speed: f32,
    /// Mission succeeds once every entity has reached this `y` or above it.
    pub finish_line_y: f32,
    /// One in `pickup_drop_odds` enemy explosions drops a pickup.
    pub pickup_drop_odds: u32,
    pub spawn_hitpoints: i32,
    pub spawn_points: Vec<Vec2>,
    pub score_path: Option<PathBuf>,
    pub max_frame_size: usize,
    pub send_buffer_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_peers: 10,
            client_timeout: Duration::from_secs(3),
            step_rate: 60,
            tick_rate: 20,
            idle_sleep: Duration::from_millis(1),
            world_height: 768.0,
            battlefield_size: Vec2::new(1024.0, 768.0),
            scroll_speed: 0.0,
            finish_line_y: 0.0,
            pickup_drop_odds: 3,
            spawn_hitpoints: 100,
            spawn_points: DEFAULT_SPAWN_POINTS
                .iter()
                .map(|&(x, y)| Vec2::new(x, y))
                .collect(),
            score_path: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            send_buffer_limit: DEFAULT_SEND_BUFFER_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("spawn table needs at least two points, got {0}")]
    SpawnTable(usize),
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn stream_limits(&self) -> StreamLimits {
        StreamLimits {
            max_frame_size: self.max_frame_size,
            send_buffer_limit: self.send_buffer_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_peers == 0 {
            return Err(ConfigError::Zero("max_peers"));
        }
        if self.step_rate == 0 {
            return Err(ConfigError::Zero("step_rate"));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Zero("tick_rate"));
        }
        if self.pickup_drop_odds == 0 {
            return Err(ConfigError::Zero("pickup_drop_odds"));
        }
        if self.client_timeout.is_zero() {
            return Err(ConfigError::Zero("client_timeout"));
        }
        // Index 0 is reserved, so a usable table needs at least one more point.
        if self.spawn_points.len() < 2 {
            return Err(ConfigError::SpawnTable(self.spawn_points.len()));
        }
        Ok(())
    }
}
