/// A message handed to a [`MessageSink`](super::MessageSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
        }
    }
}

/// A message returned by a [`MessageSource`](super::MessageSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl InboundMessage {
    pub fn payload_lossy(&self) -> String {
        lossy(self.payload.as_deref())
    }

    pub fn key_lossy(&self) -> Option<String> {
        self.key.as_deref().map(|k| lossy(Some(k)))
    }
}

fn lossy(bytes: Option<&[u8]>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}
