use thiserror::Error;

/// Identifies one asynchronous clipboard write, so its completion can be
/// matched back to the click that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// The write was refused, typically by a permissions policy.
    #[error("clipboard write rejected: {0}")]
    Rejected(String),
    /// No clipboard exists in this context at all.
    #[error("clipboard unavailable")]
    Unavailable,
}

/// The system clipboard as the router sees it: a non-blocking write whose
/// outcome arrives later as a separate event
/// ([`Router::on_clipboard_result`](crate::router::Router::on_clipboard_result)),
/// never by suspending the event loop.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> WriteTicket;
}

/// Recording clipboard for tests and headless hosts. Writes are stored in
/// order; the host decides when and with what outcome to complete them.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    next_ticket: u64,
    writes: Vec<(WriteTicket, String)>,
}

impl MemoryClipboard {
    pub fn new() -> MemoryClipboard {
        MemoryClipboard::default()
    }

    pub fn writes(&self) -> &[(WriteTicket, String)] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<&str> {
        self.writes.last().map(|(_, text)| text.as_str())
    }

    pub fn last_ticket(&self) -> Option<WriteTicket> {
        self.writes.last().map(|(ticket, _)| *ticket)
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> WriteTicket {
        let ticket = WriteTicket(self.next_ticket);
        self.next_ticket += 1;
        self.writes.push((ticket, text.to_string()));
        ticket
    }
}
