// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Collaborator traits the dispatcher delegates to.
//!
//! Domain logic — scan progress, power-save transitions, key management,
//! station/BSS bookkeeping, frame-level protocol handling — lives behind
//! these traits. The engine only routes; implementations receive the shared
//! `Context` so they can consult sessions and counters under the same
//! serialization the dispatcher runs with.

use {
    crate::dispatcher::Context,
    crate::event::{FwStatus, KeyScope, PsTransition, SmeRequest, TimeoutKind},
    crate::mac::MgmtFrame,
    crate::session::SessionId,
};

#[cfg(test)]
pub use test_utils::*;

/// Handlers for received 802.11 management frames, invoked by the frame
/// classifier after session resolution. Session-less variants exist for the
/// subtypes that are legitimately processable with no owning session.
pub trait FrameHandler {
    fn on_beacon(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    fn on_beacon_no_session(&mut self, ctx: &mut Context, frame: &MgmtFrame<&[u8]>);
    fn on_probe_req(
        &mut self,
        ctx: &mut Context,
        session_id: Option<SessionId>,
        frame: &MgmtFrame<&[u8]>,
    );
    fn on_probe_resp(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    fn on_probe_resp_no_session(&mut self, ctx: &mut Context, frame: &MgmtFrame<&[u8]>);
    fn on_auth(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    /// Session-less authentication attempt (fast-transition). Returns true
    /// when the frame was consumed.
    fn on_auth_no_session(&mut self, ctx: &mut Context, frame: &MgmtFrame<&[u8]>) -> bool;
    fn on_assoc_req(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        reassoc: bool,
        frame: &MgmtFrame<&[u8]>,
    );
    fn on_assoc_resp(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        reassoc: bool,
        frame: &MgmtFrame<&[u8]>,
    );
    fn on_disassoc(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    fn on_deauth(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    fn on_action(&mut self, ctx: &mut Context, session_id: SessionId, frame: &MgmtFrame<&[u8]>);
    fn on_action_no_session(&mut self, ctx: &mut Context, frame: &MgmtFrame<&[u8]>);
}

/// Upper-layer connection-management requests.
pub trait SmeHandler {
    fn on_sme_request(&mut self, ctx: &mut Context, req: SmeRequest);
    /// Checks a received frame against upper-layer registrations. Returns
    /// true when the frame matched and was forwarded.
    fn on_registered_frame(&mut self, ctx: &mut Context, frame: &MgmtFrame<&[u8]>) -> bool;
}

/// Scan-phase responses from the firmware abstraction layer.
pub trait ScanHandler {
    fn on_init_scan_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_start_scan_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_end_scan_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_finish_scan_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_switch_channel_response(&mut self, ctx: &mut Context, channel: u8, status: FwStatus);
    fn on_rx_scan_event(&mut self, ctx: &mut Context, event: u32);
    /// Deactivate background-scan state ahead of an abort being posted to
    /// the firmware.
    fn on_abort_scan(&mut self, ctx: &mut Context, session_id: SessionId);
}

pub trait PowerSaveHandler {
    fn on_ps_request(&mut self, ctx: &mut Context, transition: PsTransition);
    fn on_ps_response(&mut self, ctx: &mut Context, transition: PsTransition, status: FwStatus);
}

pub trait KeyHandler {
    fn on_set_key_response(
        &mut self,
        ctx: &mut Context,
        scope: KeyScope,
        session_id: SessionId,
        status: FwStatus,
    );
    fn on_remove_key_response(
        &mut self,
        ctx: &mut Context,
        scope: KeyScope,
        session_id: SessionId,
        status: FwStatus,
    );
}

/// Link-management completions and timer expirations.
pub trait MlmHandler {
    fn on_add_bss_response(&mut self, ctx: &mut Context, session_id: SessionId, status: FwStatus);
    fn on_delete_bss_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        status: FwStatus,
    );
    fn on_add_station_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        sta_index: u16,
        status: FwStatus,
    );
    fn on_delete_station_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        sta_index: u16,
        status: FwStatus,
    );
    fn on_add_self_station_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_delete_self_station_response(&mut self, ctx: &mut Context, status: FwStatus);
    fn on_block_ack_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        sta_index: u16,
        status: FwStatus,
    );
    fn on_add_traffic_stream_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        status: FwStatus,
    );
    fn on_aggregate_qos_response(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        status: FwStatus,
    );
    fn on_link_state_response(&mut self, ctx: &mut Context, session_id: SessionId, status: FwStatus);
    fn on_delete_station_context(
        &mut self,
        ctx: &mut Context,
        session_id: SessionId,
        sta_index: u16,
    );
    fn on_missed_beacon(&mut self, ctx: &mut Context, session_id: SessionId);
    /// Link-liveness check; per-session when a session reference is carried,
    /// global otherwise.
    fn on_heartbeat_timeout(&mut self, ctx: &mut Context, session_id: Option<SessionId>);
    fn on_timeout(&mut self, ctx: &mut Context, kind: TimeoutKind, session_id: Option<SessionId>);
    fn on_refresh_beacon(&mut self, ctx: &mut Context);
    fn on_cfg_update(&mut self, ctx: &mut Context, param: u32);
}

/// The full collaborator surface the dispatcher requires.
pub trait Handlers:
    FrameHandler + SmeHandler + ScanHandler + PowerSaveHandler + KeyHandler + MlmHandler
{
}

impl<T> Handlers for T where
    T: FrameHandler + SmeHandler + ScanHandler + PowerSaveHandler + KeyHandler + MlmHandler
{
}
