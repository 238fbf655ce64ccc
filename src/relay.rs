use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag carried by every extraction broadcast. The channel is the
/// window-global one, so receivers key on this to ignore unrelated traffic.
pub const SOURCE_MESSAGE_TYPE: &str = "HoverTex_MathJaxSource";

/// Identity of an execution context (a window). Messages posted from a
/// different context are foreign and must be dropped by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// A message posted to the window's wildcard broadcast channel.
/// The payload is arbitrary JSON: the channel is shared with whatever else
/// the page posts, so the receiving side validates shape, never assumes it.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub source: ContextId,
    pub data: Value,
}

/// The window's broadcast primitive: fire-and-forget, no acknowledgment,
/// no backpressure. The host pumps posted messages to its listeners.
#[derive(Debug, Default)]
pub struct Channel {
    posted: Vec<PostedMessage>,
}

impl Channel {
    pub fn new() -> Channel {
        Channel::default()
    }

    pub fn post(&mut self, source: ContextId, data: Value) {
        self.posted.push(PostedMessage { source, data });
    }

    /// Takes every message posted since the last pump.
    pub fn drain(&mut self) -> Vec<PostedMessage> {
        std::mem::take(&mut self.posted)
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }
}

/// Wire form of an extraction broadcast: `{ type, latex, mjxId }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub latex: String,
    #[serde(rename = "mjxId")]
    pub mjx_id: Option<String>,
}

impl SourceMessage {
    pub fn new(latex: impl Into<String>, mjx_id: Option<String>) -> SourceMessage {
        SourceMessage {
            kind: SOURCE_MESSAGE_TYPE.to_string(),
            latex: latex.into(),
            mjx_id,
        }
    }
}

/// A recovered LaTeX source string, trimmed, with a best-effort identifier
/// correlating it to the container it came from. Extraction validity does
/// not depend on the identifier being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub latex: String,
    pub mjx_id: Option<String>,
}

/// Single-slot, last-write-wins store of the most recent extraction relayed
/// from the page context. Overwritten on every accepted message, read and
/// never cleared by the router, absent until the first message arrives.
#[derive(Debug)]
pub struct RelaySlot {
    window: ContextId,
    latest: Option<ExtractionResult>,
}

impl RelaySlot {
    pub fn new(window: ContextId) -> RelaySlot {
        RelaySlot {
            window,
            latest: None,
        }
    }

    /// Accepts `msg` into the slot if it is self-originated and carries the
    /// expected type tag; everything else is ignored without error.
    /// Returns whether the slot was updated.
    pub fn deliver(&mut self, msg: &PostedMessage) -> bool {
        if msg.source != self.window {
            trace!("relay: dropping message from foreign context {:?}", msg.source);
            return false;
        }

        let parsed: SourceMessage = match serde_json::from_value(msg.data.clone()) {
            Ok(parsed) => parsed,
            Err(_) => {
                trace!("relay: dropping message with unrecognized payload");
                return false;
            }
        };

        if parsed.kind != SOURCE_MESSAGE_TYPE {
            return false;
        }

        debug!(
            "relay: received source ({} chars, mjx_id={:?})",
            parsed.latex.len(),
            parsed.mjx_id
        );
        self.latest = Some(ExtractionResult {
            latex: parsed.latex,
            mjx_id: parsed.mjx_id,
        });
        true
    }

    /// Drains the channel through [`RelaySlot::deliver`].
    pub fn pump(&mut self, channel: &mut Channel) {
        for msg in channel.drain() {
            self.deliver(&msg);
        }
    }

    pub fn latest(&self) -> Option<&ExtractionResult> {
        self.latest.as_ref()
    }
}
