use crate::capture::TcpFlags;

use super::key::FlowDirection;

/// Connection state as seen from one endpoint of a TCP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    #[default]
    Start,
    Syn,
    SynAck,
    Established,
    Fin,
    Closed,
}

impl ConnState {
    /// `side` is the endpoint this machine belongs to, `sender` the direction
    /// of the packet carrying `flags`.
    pub fn next(self, flags: TcpFlags, side: FlowDirection, sender: FlowDirection) -> Self {
        let own = side == sender;
        if flags.rst() {
            return ConnState::Closed;
        }
        if flags.fin() && own {
            return ConnState::Fin;
        }
        match self {
            ConnState::Start if flags.syn() && own => ConnState::Syn,
            ConnState::Syn if flags.syn() && flags.ack() && !own => ConnState::SynAck,
            ConnState::SynAck if flags.ack() && own => ConnState::Established,
            ConnState::Fin if flags.ack() && !own => ConnState::Closed,
            s => s,
        }
    }
}

/// Handshake tracking for both endpoints plus the payload bookkeeping that
/// decides whether a TCP flow counts as a real connection.
#[derive(Debug, Clone, Default)]
pub struct TcpTracker {
    client: ConnState,
    server: ConnState,
    valid: bool,
}

impl TcpTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, flags: TcpFlags, sender: FlowDirection, has_payload: bool) {
        // Payload after the client reached Established marks the flow valid
        if self.client == ConnState::Established && has_payload {
            self.valid = true;
        }
        self.client = self.client.next(flags, FlowDirection::Forward, sender);
        self.server = self.server.next(flags, FlowDirection::Backward, sender);
    }

    pub fn client(&self) -> ConnState { self.client }

    pub fn server(&self) -> ConnState { self.server }

    pub fn is_valid(&self) -> bool { self.valid }

    pub fn both_closed(&self) -> bool {
        self.client == ConnState::Closed && self.server == ConnState::Closed
    }
}
