pub mod net;
pub mod time;
pub mod validate;

pub use net::envelope::{ErrorCode, ServerEnvelope};
pub use net::protocol::{MAX_FRAME_SIZE, ProtocolError, decode_server_envelope, encode_server_envelope};
