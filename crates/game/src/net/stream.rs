use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use super::codec::ProtocolError;
use super::framing::{DEFAULT_MAX_FRAME_SIZE, FrameBuffer, FrameError, encode_frame};
use super::protocol::WireMessage;
use super::stats::NetworkStats;

pub const DEFAULT_SEND_BUFFER_LIMIT: usize = 64 * 1024;

const READ_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct StreamLimits {
    pub max_frame_size: usize,
    pub send_buffer_limit: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            send_buffer_limit: DEFAULT_SEND_BUFFER_LIMIT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send buffer full ({queued} bytes queued)")]
    BufferFull { queued: usize },
    #[error("stream closed")]
    Closed,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Non-blocking, framed message connection over one TCP stream.
///
/// Outbound frames are queued and written as the socket accepts them; once the
/// queue holds `send_buffer_limit` bytes further messages are dropped. A stream
/// that hits EOF or a hard I/O error is marked closed and goes silent.
#[derive(Debug)]
pub struct MessageStream {
    stream: TcpStream,
    peer_addr: SocketAddr,
    frames: FrameBuffer,
    outbound: Vec<u8>,
    limits: StreamLimits,
    closed: bool,
    stats: NetworkStats,
}

impl MessageStream {
    pub fn new(stream: TcpStream, limits: StreamLimits) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;

        Ok(Self {
            stream,
            peer_addr,
            frames: FrameBuffer::new(limits.max_frame_size),
            outbound: Vec::new(),
            limits,
            closed: false,
            stats: NetworkStats::default(),
        })
    }

    pub fn connect(addr: SocketAddr, timeout: Duration, limits: StreamLimits) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Self::new(stream, limits)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn queued_bytes(&self) -> usize {
        self.outbound.len()
    }

    pub fn send<M: WireMessage>(&mut self, message: &M) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::Closed);
        }

        let frame = encode_frame(&message.to_bytes(), self.limits.max_frame_size)?;
        if self.outbound.len() + frame.len() > self.limits.send_buffer_limit {
            self.stats.messages_dropped += 1;
            return Err(SendError::BufferFull {
                queued: self.outbound.len(),
            });
        }

        self.outbound.extend_from_slice(&frame);
        self.stats.messages_sent += 1;
        self.flush();
        Ok(())
    }

    /// Writes as much of the outbound queue as the socket takes without blocking.
    pub fn flush(&mut self) {
        while !self.closed && !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => self.close("write returned zero"),
                Ok(written) => {
                    self.outbound.drain(..written);
                    self.stats.bytes_sent += written as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => self.close(&e.to_string()),
            }
        }
    }

    /// Returns the next complete message, or `None` when nothing is available.
    ///
    /// A frame that fails to decode is returned as an error and consumed, so the
    /// caller can drop it and keep reading.
    pub fn receive<M: WireMessage>(&mut self) -> Option<Result<M, MessageError>> {
        self.fill();

        let frame = match self.frames.next_frame()? {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.malformed_received += 1;
                return Some(Err(e.into()));
            }
        };

        match M::from_bytes(&frame) {
            Ok(message) => {
                self.stats.messages_received += 1;
                Some(Ok(message))
            }
            Err(e) => {
                self.stats.malformed_received += 1;
                Some(Err(e.into()))
            }
        }
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while !self.closed {
            match self.stream.read(&mut chunk) {
                Ok(0) => self.close("connection closed by peer"),
                Ok(read) => {
                    self.frames.extend(&chunk[..read]);
                    self.stats.bytes_received += read as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => self.close(&e.to_string()),
            }
        }
    }

    fn close(&mut self, reason: &str) {
        if !self.closed {
            log::debug!("Stream to {} closed: {}", self.peer_addr, reason);
            self.closed = true;
            self.outbound.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Instant;

    use super::*;
    use crate::action::PlayerAction;
    use crate::net::{ClientMessage, ServerMessage};

    fn pair() -> (MessageStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client =
            MessageStream::connect(addr, Duration::from_secs(1), StreamLimits::default()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn wait_for<M: WireMessage>(stream: &mut MessageStream) -> Option<Result<M, MessageError>> {
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if let Some(result) = stream.receive::<M>() {
                return Some(result);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn receives_framed_message() {
        let (mut client, mut raw) = pair();
        let bytes = ServerMessage::PlayerDisconnect { id: 4 }.to_bytes();
        raw.write_all(&encode_frame(&bytes, 1024).unwrap()).unwrap();

        let message = wait_for::<ServerMessage>(&mut client).unwrap().unwrap();
        assert_eq!(message, ServerMessage::PlayerDisconnect { id: 4 });
        assert!(client.receive::<ServerMessage>().is_none());
    }

    #[test]
    fn malformed_message_is_dropped_and_stream_survives() {
        let (mut client, mut raw) = pair();
        raw.write_all(&encode_frame(&99i32.to_be_bytes(), 1024).unwrap())
            .unwrap();
        let valid = ServerMessage::MissionSuccess.to_bytes();
        raw.write_all(&encode_frame(&valid, 1024).unwrap()).unwrap();

        let first = wait_for::<ServerMessage>(&mut client).unwrap();
        assert_eq!(
            first,
            Err(MessageError::Protocol(ProtocolError::UnknownOpcode(99)))
        );
        let second = wait_for::<ServerMessage>(&mut client).unwrap();
        assert_eq!(second, Ok(ServerMessage::MissionSuccess));
        assert!(!client.is_closed());
        assert_eq!(client.stats().malformed_received, 1);
    }

    #[test]
    fn sent_message_arrives_with_length_prefix() {
        let (mut client, mut raw) = pair();
        client
            .send(&ClientMessage::PlayerEvent {
                id: 2,
                action: PlayerAction::LaunchMissile,
            })
            .unwrap();

        raw.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let mut buf = [0u8; 16];
        raw.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[0..4], &12u32.to_be_bytes());
        assert_eq!(&buf[4..8], &0i32.to_be_bytes());
        assert_eq!(&buf[8..12], &2i32.to_be_bytes());
        assert_eq!(&buf[12..16], &5i32.to_be_bytes());
    }

    #[test]
    fn peer_shutdown_closes_stream() {
        let (mut client, raw) = pair();
        drop(raw);

        let deadline = Instant::now() + Duration::from_millis(500);
        while !client.is_closed() && Instant::now() < deadline {
            assert!(client.receive::<ServerMessage>().is_none());
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(client.is_closed());
        assert!(matches!(
            client.send(&ClientMessage::Quit),
            Err(SendError::Closed)
        ));
    }
}
