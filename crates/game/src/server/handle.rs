use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use super::config::ServerConfig;
use super::game_server::GameServer;

/// Owns a server loop running on its own thread. Dropping the handle stops the
/// loop and waits for it to finish.
pub struct ServerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn spawn(config: ServerConfig) -> io::Result<Self> {
        Self::start(GameServer::bind(config)?)
    }

    pub fn start(mut server: GameServer) -> io::Result<Self> {
        let local_addr = server.local_addr();
        let running = server.running();

        let thread = thread::Builder::new()
            .name("tankfront-server".to_string())
            .spawn(move || server.run())?;

        Ok(Self {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Server thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
