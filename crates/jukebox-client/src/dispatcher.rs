//! RequestDispatcher: numbers and encodes outgoing requests.
//!
//! Replies are routed by opcode alone.  The per-opcode "last sent" record
//! only feeds log lines; with two requests of one opcode in flight there is
//! no telling which one a reply answers.

use std::collections::HashMap;

use jukebox_proto::protocol::{Opcode, Request};
use tracing::debug;

use crate::error::ClientError;
use crate::transport::FrameSink;

#[derive(Debug, Default)]
pub struct RequestDispatcher {
    next_id: u64,
    last_sent: HashMap<Opcode, u64>,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `{i, o, d?}` and hand it to `sink`.  The id is consumed even
    /// when the sink refuses the frame.
    pub fn send(
        &mut self,
        sink: &mut impl FrameSink,
        opcode: Opcode,
        payload: Option<String>,
    ) -> Result<u64, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let text = Request::new(id, opcode, payload).encode()?;
        sink.send_text(text)?;
        self.last_sent.insert(opcode, id);
        debug!("dispatch: #{} {}", id, opcode);
        Ok(id)
    }

    /// Id of the most recent request of `opcode` that reached the transport.
    pub fn last_request(&self, opcode: Opcode) -> Option<u64> {
        self.last_sent.get(&opcode).copied()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}
