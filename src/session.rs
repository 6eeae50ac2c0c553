// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Session records and the registry mapping link identifiers to them.
//!
//! A session is one logical wireless link context: a client's connection to
//! an AP, an AP's own broadcast context, or a P2P link. The registry is
//! read-mostly; the dispatcher resolves received frames against it by BSSID,
//! peer address, station index, or slot id.

use {
    crate::error::Error,
    crate::mac::MacAddr,
    log::info,
};

pub type SessionId = u8;

/// Matches the session table depth of the reference driver.
pub const MAX_SESSIONS: usize = 5;

/// The persona a session operates as on the shared radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Ap,
    P2pClient,
    P2pGo,
    P2pDevice,
    Bridge,
    Unknown,
}

impl Role {
    /// Personas whose administrative request handlers manage deferral
    /// internally; the deferral gate lets start/stop/switch-channel requests
    /// through for them.
    pub fn manages_own_deferral(&self) -> bool {
        matches!(self, Role::Ap | Role::Bridge | Role::Unknown)
    }

    /// Personas that accept (re)association requests from peers.
    pub fn accepts_associations(&self) -> bool {
        matches!(self, Role::Ap | Role::Bridge)
    }
}

/// Coarse connection progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Joining,
    Authenticated,
    Associating,
    Associated,
    LinkEstablished,
    Disassociating,
    Deauthenticating,
}

/// Fine-grained link-management sub-protocol progress, independent of the
/// coarse connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMgmtState {
    Idle,
    JoinPending,
    AuthPending,
    AssocPending,
    ReassocPending,
    KeySettingPending,
    BlockAckPending,
}

/// Notice-of-absence attributes cached for a P2P GO session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoaAttributes {
    pub interval_count: u8,
    pub duration: u32,
    pub interval: u32,
    pub start_time: u32,
    pub ct_window: u8,
    pub opp_ps: bool,
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub sme_session_id: u16,
    pub bssid: MacAddr,
    pub peer_addr: MacAddr,
    pub self_sta_index: u16,
    pub role: Role,
    connection_state: ConnectionState,
    prev_connection_state: ConnectionState,
    link_state: LinkMgmtState,
    prev_link_state: LinkMgmtState,
    pub heartbeat_misses: u32,
    pub cached_noa: Option<NoaAttributes>,
}

impl Session {
    fn new(id: SessionId, bssid: MacAddr, peer_addr: MacAddr, role: Role) -> Self {
        Self {
            id,
            sme_session_id: id as u16,
            bssid,
            peer_addr,
            self_sta_index: 0,
            role,
            connection_state: ConnectionState::Idle,
            prev_connection_state: ConnectionState::Idle,
            link_state: LinkMgmtState::Idle,
            prev_link_state: LinkMgmtState::Idle,
            heartbeat_misses: 0,
            cached_noa: None,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn link_state(&self) -> LinkMgmtState {
        self.link_state
    }

    /// Transitions the coarse connection state, retaining the previous value
    /// for the diagnostic dump.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.prev_connection_state = self.connection_state;
        self.connection_state = state;
    }

    pub fn set_link_state(&mut self, state: LinkMgmtState) {
        self.prev_link_state = self.link_state;
        self.link_state = state;
    }

    pub fn is_link_established(&self) -> bool {
        self.connection_state == ConnectionState::LinkEstablished
    }
}

/// Snapshot of the registry-derived state the deferral decision consumes.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
    pub system_role: Role,
}

pub struct SessionRegistry {
    slots: Vec<Option<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { slots: (0..MAX_SESSIONS).map(|_| None).collect() }
    }

    /// Creates a session in the first free slot.
    pub fn create(
        &mut self,
        bssid: MacAddr,
        peer_addr: MacAddr,
        role: Role,
    ) -> Result<SessionId, Error> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                let id = idx as SessionId;
                slot.replace(Session::new(id, bssid, peer_addr, role));
                return Ok(id);
            }
        }
        Err(Error::TooManySessions)
    }

    pub fn destroy(&mut self, id: SessionId) -> Result<(), Error> {
        match self.slots.get_mut(id as usize) {
            Some(slot) if slot.is_some() => {
                slot.take();
                Ok(())
            }
            _ => Err(Error::NoSuchSession(id)),
        }
    }

    pub fn by_session_id(&self, id: SessionId) -> Option<&Session> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn by_session_id_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub fn by_bssid(&self, bssid: &MacAddr) -> Option<&Session> {
        self.iter().find(|s| &s.bssid == bssid)
    }

    pub fn by_peer_addr(&self, peer_addr: &MacAddr) -> Option<&Session> {
        self.iter().find(|s| &s.peer_addr == peer_addr)
    }

    pub fn by_sta_index(&self, sta_index: u16) -> Option<&Session> {
        self.iter().find(|s| s.self_sta_index == sta_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    /// The role the system as a whole operates in: the first live session's
    /// persona, `Unknown` when no session exists yet.
    pub fn system_role(&self) -> Role {
        self.iter().next().map(|s| s.role).unwrap_or(Role::Unknown)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot { system_role: self.system_role() }
    }

    /// Diagnostic dump of every live session's state, emitted when deferral
    /// fails to aid postmortem analysis.
    pub fn log_states(&self) {
        for session in self.iter() {
            info!(
                "session[{}] role {:?} connection {:?} (prev {:?}) link {:?} (prev {:?})",
                session.id,
                session.role,
                session.connection_state,
                session.prev_connection_state,
                session.link_state,
                session.prev_link_state,
            );
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
