use serde::{Deserialize, Serialize};

/// Stable integer wire codes (spec §6.1). Additions must append; existing
/// codes are never renumbered once a deployment has shipped them.
///
/// Serializes as its bare integer code, not as a variant name, so that
/// `{"msg_type": <int>, ...}` matches the canonical wire shape exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    RequestFullList = 1,
    RequestFullListAck = 2,
    RequestFullListNack = 3,
    SentFullList = 4,
    SentFullListAck = 5,
    SentFullListNack = 6,
    ListUpdate = 7,
    Gossip = 8,
    GossipIntroduction = 9,
    Replica = 10,
    ReplicaAck = 11,
    HintedHandoff = 12,
    HintedHandoffAck = 13,
    RemoveServer = 16,
    RemoveServerAck = 17,
}

impl MessageType {
    fn from_code(code: u8) -> Option<Self> {
        use MessageType::*;
        Some(match code {
            1 => RequestFullList,
            2 => RequestFullListAck,
            3 => RequestFullListNack,
            4 => SentFullList,
            5 => SentFullListAck,
            6 => SentFullListNack,
            7 => ListUpdate,
            8 => Gossip,
            9 => GossipIntroduction,
            10 => Replica,
            11 => ReplicaAck,
            12 => HintedHandoff,
            13 => HintedHandoffAck,
            16 => RemoveServer,
            17 => RemoveServerAck,
            _ => return None,
        })
    }
}

impl Serialize for MessageType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        MessageType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown msg_type code {code}")))
    }
}

/// Every frame on every socket is `{msg_type, payload}` (spec §6.1). The
/// payload is kept as a raw `serde_json::Value` here; each handler
/// deserializes it into the concrete struct it expects, so a message this
/// node doesn't recognize can still be framed and forwarded without
/// crashing the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub msg_type: MessageType,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected payload shape for {msg_type:?}: {reason}")]
    BadPayload {
        msg_type: MessageType,
        reason: String,
    },
}

pub type ProtoResult<T> = Result<T, ProtoError>;

impl Frame {
    pub fn new(msg_type: MessageType, payload: impl Serialize) -> ProtoResult<Self> {
        Ok(Self {
            msg_type,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn to_bytes(&self) -> ProtoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProtoResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> ProtoResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| ProtoError::BadPayload {
            msg_type: self.msg_type,
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFullListPayload {
    pub list_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListPayload {
    pub shopping_list: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipPayload {
    pub servers: Vec<u16>,
    pub proxies: Vec<u16>,
    pub hash_ring_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaPayload {
    pub replica_list: String,
    #[serde(rename = "replicaID")]
    pub replica_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintedHandoffPayload {
    pub main_lists: Vec<String>,
    pub replica_lists: Vec<(String, u8)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_bytes() {
        let frame = Frame::new(
            MessageType::RequestFullList,
            RequestFullListPayload {
                list_id: "L1".into(),
            },
        )
        .unwrap();

        let bytes = frame.to_bytes().unwrap();
        let back = Frame::from_bytes(&bytes).unwrap();

        assert_eq!(back.msg_type, MessageType::RequestFullList);
        let payload: RequestFullListPayload = back.payload_as().unwrap();
        assert_eq!(payload.list_id, "L1");
    }

    #[test]
    fn payload_as_rejects_a_shape_mismatch_without_panicking() {
        let frame = Frame::new(MessageType::RequestFullList, EmptyPayload {}).unwrap();
        let result: ProtoResult<RequestFullListPayload> = frame.payload_as();
        assert!(result.is_err());
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(Frame::from_bytes(b"not json").is_err());
    }

    #[test]
    fn message_type_codes_are_stable() {
        assert_eq!(MessageType::RequestFullList as u8, 1);
        assert_eq!(MessageType::SentFullListAck as u8, 5);
        assert_eq!(MessageType::RemoveServer as u8, 16);
        assert_eq!(MessageType::RemoveServerAck as u8, 17);
    }

    #[test]
    fn frame_serializes_msg_type_as_a_bare_integer() {
        let frame = Frame::new(MessageType::Gossip, EmptyPayload {}).unwrap();
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["msg_type"], serde_json::json!(8));
    }

    #[test]
    fn unknown_msg_type_code_is_rejected_not_panicked() {
        let raw = serde_json::json!({"msg_type": 99, "payload": {}});
        let result: Result<Frame, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
