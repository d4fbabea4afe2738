mod codec;
mod framing;
mod protocol;
mod stats;
mod stream;

pub use codec::{PacketReader, PacketWriter, ProtocolError};
pub use framing::{
    DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, FrameBuffer, FrameError, encode_frame,
};
pub use protocol::{
    ClientMessage, DEFAULT_PORT, EntityState, EntityTransform, ServerMessage, WireMessage,
};
pub use stats::NetworkStats;
pub use stream::{
    DEFAULT_SEND_BUFFER_LIMIT, MessageError, MessageStream, SendError, StreamLimits,
};
