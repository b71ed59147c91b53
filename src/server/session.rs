//! Per-connection state (§3 Data Model — Session).

use crate::protocol::http::server_codec::HttpServerCodec;
use crate::protocol::pairing::{PairVerify, Permissions};
use crate::protocol::transport::{FrameReader, FrameWriter};

use super::events::EventQueue;

/// Dispatch-legality state machine for one session (§4.5 state table).
/// The finer-grained `M1/M3/M5` distinction within Pair-Setup/Pair-Verify
/// lives inside [`crate::protocol::pairing::PairSetup`] and
/// [`crate::protocol::pairing::PairVerify`] themselves; duplicating it here
/// would just be state that could drift out of sync, so this enum only
/// tracks what the dispatcher needs to decide which paths are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    None,
    PairSetupInProgress,
    PairVerifyInProgress,
    Established,
    Closed,
}

pub type SessionId = u64;

/// Everything the dispatcher and server loop need to know about one
/// connected client.
pub struct Session {
    pub id: SessionId,
    pub step: SessionStep,
    pub pair_verify: Option<PairVerify>,
    pub frame_reader: Option<FrameReader>,
    pub frame_writer: Option<FrameWriter>,
    pub pairing_id: Option<String>,
    pub permissions: Permissions,
    pub event_queue: EventQueue,
    pub disconnect: bool,
    pub(crate) http_codec: HttpServerCodec,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            step: SessionStep::None,
            pair_verify: None,
            frame_reader: None,
            frame_writer: None,
            pairing_id: None,
            permissions: Permissions::USER,
            event_queue: EventQueue::default(),
            disconnect: false,
            http_codec: HttpServerCodec::new(),
        }
    }

    #[must_use]
    pub fn is_established(&self) -> bool {
        self.step == SessionStep::Established
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.permissions.contains(Permissions::ADMIN)
    }

    /// Install fresh control keys after a successful Pair-Verify `M4`
    /// (§4.3) — atomically rekeys on re-verify too.
    pub fn establish(&mut self, read_key: &[u8; 32], write_key: &[u8; 32], pairing_id: String, permissions: Permissions) {
        self.frame_reader = crate::protocol::transport::FrameReader::new(read_key).ok();
        self.frame_writer = crate::protocol::transport::FrameWriter::new(write_key).ok();
        self.pairing_id = Some(pairing_id);
        self.permissions = permissions;
        self.step = SessionStep::Established;
        self.pair_verify = None;
    }
}
