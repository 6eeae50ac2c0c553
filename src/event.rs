// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The event model: every asynchronous input the engine routes.
//!
//! `Event` is a closed tagged union grouped into upper-layer requests,
//! firmware-abstraction responses, received-frame indications, timer
//! expirations, and internal control signals. Exhaustive matching in the
//! dispatcher guarantees a new variant cannot be added without a routing
//! (and buffer-ownership) decision being made for it.

use {
    crate::buffer::FrameBuffer,
    crate::session::{NoaAttributes, SessionId},
};

/// Completion status reported by the firmware abstraction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwStatus {
    Success,
    Failure,
}

impl FwStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FwStatus::Success)
    }
}

/// Which key table a key operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    Bss,
    Pairwise,
    Group,
}

/// Power-save modes the firmware can be asked to enter or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsMode {
    Sleep,
    DeepSleep,
    Uapsd,
    WakeOnWireless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsTransition {
    Enter(PsMode),
    Exit(PsMode),
}

/// Timer expirations delivered by the external timer collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    JoinFailure,
    AuthFailure,
    AuthResponse,
    AuthRetry,
    AssocFailure,
    ReassocFailure,
    MinChannel,
    MaxChannel,
    PeriodicProbeRequest,
    DisassocAck,
    DeauthAck,
    RemainOnChannel,
    ChannelSwitch,
    AddTsResponse,
    HeartbeatProbeFailure,
}

/// Interrupt-source notifications whose sole purpose is delivery; they are
/// logged and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSource {
    RetryLimit,
    InvalidSessionKey,
    InvalidKeyId,
    ReplayThreshold,
    Addr2Miss,
}

/// Requests from the upper connection-management layer.
#[derive(Debug)]
pub enum SmeRequest {
    Start,
    SystemReady,
    Join { session_id: SessionId },
    Reassociate { session_id: SessionId },
    StartBss { session_id: SessionId },
    StopBss { session_id: SessionId },
    SwitchChannel { session_id: SessionId, channel: u8 },
    SetContext { session_id: SessionId },
    RemoveKeys { session_id: SessionId },
    Disassociate { session_id: SessionId, reason: u16 },
    DisassocConfirm { session_id: SessionId },
    Deauthenticate { session_id: SessionId, reason: u16 },
    DeauthConfirm { session_id: SessionId },
    Scan { scan_id: u32 },
    AbortScan { session_id: SessionId },
    AddTrafficStream { session_id: SessionId },
    DeleteTrafficStream { session_id: SessionId },
    AddSelfStation,
    DeleteSelfStation,
    RegisterMgmtFrame { frame_type: u16 },
    HideSsid { session_id: SessionId },
    SetTxPower { dbm: i8 },
}

impl SmeRequest {
    /// Whether the upper layer expects a response message for this request.
    pub fn response_required(&self) -> bool {
        matches!(
            self,
            SmeRequest::Scan { .. }
                | SmeRequest::Disassociate { .. }
                | SmeRequest::Deauthenticate { .. }
        )
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SmeRequest::Start => "start",
            SmeRequest::SystemReady => "system-ready",
            SmeRequest::Join { .. } => "join",
            SmeRequest::Reassociate { .. } => "reassociate",
            SmeRequest::StartBss { .. } => "start-bss",
            SmeRequest::StopBss { .. } => "stop-bss",
            SmeRequest::SwitchChannel { .. } => "switch-channel",
            SmeRequest::SetContext { .. } => "set-context",
            SmeRequest::RemoveKeys { .. } => "remove-keys",
            SmeRequest::Disassociate { .. } => "disassociate",
            SmeRequest::DisassocConfirm { .. } => "disassoc-confirm",
            SmeRequest::Deauthenticate { .. } => "deauthenticate",
            SmeRequest::DeauthConfirm { .. } => "deauth-confirm",
            SmeRequest::Scan { .. } => "scan",
            SmeRequest::AbortScan { .. } => "abort-scan",
            SmeRequest::AddTrafficStream { .. } => "add-traffic-stream",
            SmeRequest::DeleteTrafficStream { .. } => "delete-traffic-stream",
            SmeRequest::AddSelfStation => "add-self-station",
            SmeRequest::DeleteSelfStation => "delete-self-station",
            SmeRequest::RegisterMgmtFrame { .. } => "register-mgmt-frame",
            SmeRequest::HideSsid { .. } => "hide-ssid",
            SmeRequest::SetTxPower { .. } => "set-tx-power",
        }
    }

    /// Administrative requests whose handlers manage deferral internally
    /// when operating as an access point or bridge.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            SmeRequest::StartBss { .. }
                | SmeRequest::StopBss { .. }
                | SmeRequest::SwitchChannel { .. }
        )
    }
}

/// Asynchronous completions and indications from the firmware abstraction
/// layer.
#[derive(Debug)]
pub enum FirmwareResponse {
    AddBss { session_id: SessionId, status: FwStatus },
    DeleteBss { session_id: SessionId, status: FwStatus },
    AddStation { session_id: SessionId, sta_index: u16, status: FwStatus },
    DeleteStation { session_id: SessionId, sta_index: u16, status: FwStatus },
    AddSelfStation { status: FwStatus },
    DeleteSelfStation { status: FwStatus },
    SetKey { scope: KeyScope, session_id: SessionId, status: FwStatus },
    RemoveKey { scope: KeyScope, session_id: SessionId, status: FwStatus },
    AddBlockAck { session_id: SessionId, sta_index: u16, status: FwStatus },
    AddTrafficStream { session_id: SessionId, status: FwStatus },
    AggregateQos { session_id: SessionId, status: FwStatus },
    SwitchChannel { channel: u8, status: FwStatus },
    SetMimoPowerSave { status: FwStatus },
    SetLinkState { session_id: SessionId, status: FwStatus },
    MissedBeacon { session_id: SessionId },
    DeleteStationContext { session_id: SessionId, sta_index: u16 },
    NoaStart { status: FwStatus },
    NoaAttr { attrs: NoaAttributes },
    InitScan { status: FwStatus },
    StartScan { status: FwStatus },
    EndScan { status: FwStatus },
    FinishScan { status: FwStatus },
    RxScanEvent { event: u32 },
}

impl FirmwareResponse {
    /// True for completions of an outstanding firmware round-trip. These
    /// restore the deferred-processing gate when dispatched. Unsolicited
    /// indications and scan-phase responses do not.
    pub fn completes_round_trip(&self) -> bool {
        match self {
            FirmwareResponse::AddBss { .. }
            | FirmwareResponse::DeleteBss { .. }
            | FirmwareResponse::AddStation { .. }
            | FirmwareResponse::DeleteStation { .. }
            | FirmwareResponse::AddSelfStation { .. }
            | FirmwareResponse::DeleteSelfStation { .. }
            | FirmwareResponse::SetKey { .. }
            | FirmwareResponse::RemoveKey { .. }
            | FirmwareResponse::AddBlockAck { .. }
            | FirmwareResponse::AddTrafficStream { .. }
            | FirmwareResponse::AggregateQos { .. }
            | FirmwareResponse::SwitchChannel { .. }
            | FirmwareResponse::SetMimoPowerSave { .. }
            | FirmwareResponse::SetLinkState { .. } => true,
            FirmwareResponse::MissedBeacon { .. }
            | FirmwareResponse::DeleteStationContext { .. }
            | FirmwareResponse::NoaStart { .. }
            | FirmwareResponse::NoaAttr { .. }
            | FirmwareResponse::InitScan { .. }
            | FirmwareResponse::StartScan { .. }
            | FirmwareResponse::EndScan { .. }
            | FirmwareResponse::FinishScan { .. }
            | FirmwareResponse::RxScanEvent { .. } => false,
        }
    }

    /// True for responses that bypass the deferral gate so an outstanding
    /// round-trip can always complete. NOA indications ride along so a GO's
    /// power-save bookkeeping stays current during scans.
    pub fn bypasses_deferral(&self) -> bool {
        self.completes_round_trip()
            || matches!(
                self,
                FirmwareResponse::NoaStart { .. } | FirmwareResponse::NoaAttr { .. }
            )
    }

    /// Responses that drive the scan state machine itself. Deferring these
    /// while scanning would leave the system stuck in the scanning mode they
    /// are meant to conclude.
    pub fn is_scan_phase(&self) -> bool {
        matches!(
            self,
            FirmwareResponse::InitScan { .. }
                | FirmwareResponse::StartScan { .. }
                | FirmwareResponse::EndScan { .. }
                | FirmwareResponse::FinishScan { .. }
                | FirmwareResponse::RxScanEvent { .. }
        )
    }
}

/// Every input the engine serializes and routes. See the module docs for the
/// grouping; `Shutdown` stops the main loop and is consumed before the
/// deferral gate.
#[derive(Debug)]
pub enum Event {
    Sme(SmeRequest),
    PsRequest(PsTransition),
    PsResponse { transition: PsTransition, status: FwStatus },
    Fw(FirmwareResponse),
    FrameInd { frame: FrameBuffer },
    Timeout { kind: TimeoutKind, session_id: Option<SessionId> },
    HeartbeatTimeout { session_id: Option<SessionId> },
    RefreshBeacon,
    CfgUpdate { param: u32 },
    Interrupt(InterruptSource),
    Shutdown,
}
