use serde::{Deserialize, Serialize};

/// A hub-originated envelope, always plaintext JSON.
///
/// Peer-originated frames are never modeled here — the hub treats them as
/// opaque bytes and forwards them verbatim (see `sigrelay_server::router`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    PeerJoined {
        #[serde(rename = "senderId")]
        sender_id: ServerSender,
        #[serde(rename = "targetId")]
        target_id: Target,
        payload: PeerPayload,
    },
    PeerLeft {
        #[serde(rename = "senderId")]
        sender_id: ServerSender,
        #[serde(rename = "targetId")]
        target_id: Target,
        payload: PeerPayload,
    },
    Error {
        #[serde(rename = "senderId")]
        sender_id: ServerSender,
        #[serde(rename = "targetId")]
        target_id: Target,
        payload: ErrorPayload,
    },
}

impl ServerEnvelope {
    pub fn peer_joined(peer_id: &str, ts: String) -> Self {
        Self::PeerJoined {
            sender_id: ServerSender,
            target_id: Target::All,
            payload: PeerPayload {
                peer_id: peer_id.to_string(),
                ts,
            },
        }
    }

    pub fn peer_left(peer_id: &str, ts: String) -> Self {
        Self::PeerLeft {
            sender_id: ServerSender,
            target_id: Target::All,
            payload: PeerPayload {
                peer_id: peer_id.to_string(),
                ts,
            },
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            sender_id: ServerSender,
            target_id: Target::All,
            payload: ErrorPayload {
                code,
                message: message.into(),
            },
        }
    }
}

/// `senderId` is always the literal string `"server"` for hub-originated
/// envelopes. Modeled as a unit type so serde emits the constant without a
/// caller ever being able to construct an envelope with the wrong sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSender;

impl Serialize for ServerSender {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("server")
    }
}

impl<'de> Deserialize<'de> for ServerSender {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "server" {
            Ok(ServerSender)
        } else {
            Err(serde::de::Error::custom("senderId must be \"server\""))
        }
    }
}

/// `targetId` is advisory only (see router): the hub always broadcasts to
/// every other room member regardless of what a client encodes here. Kept
/// as an enum so the on-wire value is either the literal `"*"` or a specific
/// client id, and forward-compatible decoders can still read either shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Client(String),
}

impl Serialize for Target {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Target::All => serializer.serialize_str("*"),
            Target::Client(id) => serializer.serialize_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(if s == "*" { Target::All } else { Target::Client(s) })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerPayload {
    #[serde(rename = "peerId")]
    pub peer_id: String,
    pub ts: String,
    /// Forward-compatibility: decoders tolerate fields a future hub version
    /// might add without failing to parse.
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Error codes the hub may emit, per the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    AuthFailed,
    RoomFull,
    RateLimited,
    SlowConsumer,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::AuthFailed => "auth_failed",
            ErrorCode::RoomFull => "room_full",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::SlowConsumer => "slow_consumer",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
