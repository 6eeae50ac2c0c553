// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The central routing table.
//!
//! Every event that passed the deferral gate flows through
//! [`Dispatcher::dispatch`]: a total mapping from event kind to an inline
//! state mutation, a delegation to a domain collaborator, or a logged drop.
//! After each successfully processed event the deferred queue is drained
//! opportunistically, one entry at a time, stopping as soon as the state the
//! drain itself may have changed no longer permits replay.

use {
    crate::classifier::{self, FrameDisposition},
    crate::defer::{should_defer, DeferralVerdict, DeferredQueue, GlobalMode, QueueFull},
    crate::device::{DeviceOps, FirmwareRequest},
    crate::error::Error,
    crate::event::{Event, FirmwareResponse, SmeRequest, TimeoutKind},
    crate::handlers::Handlers,
    crate::session::{Role, SessionId, SessionRegistry},
    log::{debug, error, info, warn},
    parking_lot::Mutex,
    std::sync::Arc,
};

#[cfg(test)]
pub use test_utils::*;

/// Dispatch-path diagnostic counters, shared with observers outside the
/// event loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounters {
    pub processed: u64,
    pub deferred: u64,
    pub defer_failures: u64,
    pub dropped: u64,
    pub protocol_errors: u64,
    pub invariant_violations: u64,
    pub sme_requests: u64,
    pub frames: u64,
}

pub type SharedCounters = Arc<Mutex<DispatchCounters>>;

/// Whether an event is on its first pass through dispatch or replayed from
/// the deferred queue. Replayed events were already screened and bypass the
/// deferral gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Fresh,
    Replayed,
}

/// Shared mutable state of the engine: global mode, the deferred-processing
/// gate, the session table and the deferred queue. Passed explicitly to
/// every operation; owned by the long-lived controller.
pub struct Context {
    mode: GlobalMode,
    deferred_processing_allowed: bool,
    addts_pending: bool,
    response_expected: bool,
    /// Whether scans run offloaded in the firmware or host-driven.
    pub scan_offload_enabled: bool,
    pub sessions: SessionRegistry,
    pub device: Box<dyn DeviceOps + Send>,
    pub counters: SharedCounters,
    deferred: DeferredQueue,
}

impl Context {
    pub fn new(device: Box<dyn DeviceOps + Send>) -> Self {
        Self {
            mode: GlobalMode::Normal,
            deferred_processing_allowed: true,
            addts_pending: false,
            response_expected: false,
            scan_offload_enabled: true,
            sessions: SessionRegistry::new(),
            device,
            counters: Arc::new(Mutex::new(DispatchCounters::default())),
            deferred: DeferredQueue::new(),
        }
    }

    pub fn mode(&self) -> GlobalMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GlobalMode) {
        if self.mode != mode {
            info!("global mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    pub fn deferred_processing_allowed(&self) -> bool {
        self.deferred_processing_allowed
    }

    /// Marks a firmware round-trip as outstanding: deferred events stop
    /// flowing until the matching response is dispatched.
    pub fn note_firmware_request(&mut self) {
        self.deferred_processing_allowed = false;
    }

    fn allow_deferred_processing(&mut self) {
        self.deferred_processing_allowed = true;
    }

    pub fn addts_pending(&self) -> bool {
        self.addts_pending
    }

    /// An add-traffic-stream exchange over the air begins or concludes.
    pub fn set_addts_pending(&mut self, pending: bool) {
        self.addts_pending = pending;
    }

    pub fn response_expected(&self) -> bool {
        self.response_expected
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

pub struct Dispatcher {
    pub ctx: Context,
}

impl Dispatcher {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Screens `event` through the deferral gate, then processes it and
    /// drains the deferred queue. Discarded and deferred events never reach
    /// a handler; their buffers are released when the event drops.
    pub fn dispatch<H: Handlers>(&mut self, handlers: &mut H, event: Event) {
        let snapshot = self.ctx.sessions.snapshot();
        let verdict = should_defer(
            self.ctx.mode,
            &snapshot,
            self.ctx.deferred_processing_allowed,
            self.ctx.addts_pending,
            &event,
        );
        match verdict {
            DeferralVerdict::Drop => {
                debug!("discarding event while offline: {:?}", event);
                self.ctx.counters.lock().dropped += 1;
            }
            DeferralVerdict::Defer => self.defer(event),
            DeferralVerdict::Process => {
                self.process(handlers, event, Provenance::Fresh);
                self.drain_deferred(handlers);
            }
        }
    }

    /// Queues an event for replay. On failure the event is dropped, the
    /// failure counted and a session-state dump emitted for postmortem
    /// analysis.
    fn defer(&mut self, event: Event) {
        match self.ctx.deferred.enqueue(event) {
            Ok(()) => {
                self.ctx.counters.lock().deferred += 1;
                debug!(
                    "deferred event; queue depth {} mode {:?}",
                    self.ctx.deferred.len(),
                    self.ctx.mode
                );
            }
            Err(QueueFull(event)) => {
                self.ctx.counters.lock().defer_failures += 1;
                warn!("unable to defer event, dropping: {:?}", event);
                self.ctx.sessions.log_states();
            }
        }
    }

    /// Replays deferred events one at a time, stopping the moment the mode
    /// re-enters scanning, a firmware round-trip becomes outstanding, or an
    /// add-traffic-stream exchange appears — the replayed events themselves
    /// may trigger any of these.
    fn drain_deferred<H: Handlers>(&mut self, handlers: &mut H) {
        loop {
            if self.ctx.mode == GlobalMode::Scanning
                || !self.ctx.deferred_processing_allowed
                || self.ctx.addts_pending
            {
                break;
            }
            match self.ctx.deferred.dequeue_one() {
                Some(event) => self.process(handlers, event, Provenance::Replayed),
                None => break,
            }
        }
    }

    fn process<H: Handlers>(&mut self, handlers: &mut H, event: Event, provenance: Provenance) {
        self.ctx.counters.lock().processed += 1;
        if provenance == Provenance::Replayed {
            debug!("replaying deferred event: {:?}", event);
        }
        match event {
            Event::Sme(req) => self.handle_sme_request(handlers, req),
            Event::PsRequest(transition) => handlers.on_ps_request(&mut self.ctx, transition),
            Event::PsResponse { transition, status } => {
                // A power-save round-trip completed; open the gate before
                // delegating so re-entrant submissions see consistent state.
                self.ctx.allow_deferred_processing();
                handlers.on_ps_response(&mut self.ctx, transition, status);
            }
            Event::Fw(resp) => self.handle_fw_response(handlers, resp),
            Event::FrameInd { frame } => {
                self.ctx.counters.lock().frames += 1;
                match classifier::classify_and_route(&mut self.ctx, handlers, frame) {
                    FrameDisposition::Deferred(event) => self.defer(event),
                    FrameDisposition::Handled | FrameDisposition::Dropped => {}
                }
            }
            Event::Timeout { kind, session_id } => {
                if kind == TimeoutKind::AddTsResponse {
                    // The peer never answered; stop holding frames for it.
                    self.ctx.set_addts_pending(false);
                }
                handlers.on_timeout(&mut self.ctx, kind, session_id)
            }
            Event::HeartbeatTimeout { session_id } => {
                if let Some(id) = session_id {
                    match self.ctx.sessions.by_session_id_mut(id) {
                        Some(session) => session.heartbeat_misses += 1,
                        None => {
                            // The session went away after the timer fired.
                            error!("heartbeat timeout for unknown session {}", id);
                            self.ctx.counters.lock().invariant_violations += 1;
                            return;
                        }
                    }
                }
                handlers.on_heartbeat_timeout(&mut self.ctx, session_id)
            }
            Event::RefreshBeacon => handlers.on_refresh_beacon(&mut self.ctx),
            Event::CfgUpdate { param } => handlers.on_cfg_update(&mut self.ctx, param),
            Event::Interrupt(source) => {
                debug!("interrupt-source notification discarded: {:?}", source);
                self.ctx.counters.lock().dropped += 1;
            }
            Event::Shutdown => debug!("shutdown event reached dispatcher; ignored"),
        }
    }

    fn handle_sme_request<H: Handlers>(&mut self, handlers: &mut H, req: SmeRequest) {
        self.ctx.counters.lock().sme_requests += 1;
        if req.response_required() {
            // The request may also be generated internally; the flag lets
            // the handler distinguish and answer the upper layer.
            self.ctx.response_expected = true;
        }
        match req {
            SmeRequest::AbortScan { session_id } => {
                if let Err(e) = self.abort_scan(handlers, session_id) {
                    error!("failed to abort scan for session {}: {}", session_id, e);
                }
            }
            req => {
                if let SmeRequest::AddTrafficStream { .. } = req {
                    self.ctx.set_addts_pending(true);
                }
                handlers.on_sme_request(&mut self.ctx, req);
            }
        }
    }

    /// Deactivates background-scan state, then tells the firmware to stop
    /// scanning: a stop request for offloaded scans, a finish-scan request
    /// (restoring the previous channel) for a host-driven scan still in
    /// progress. A rejected post is reported to the caller; no retry happens
    /// at this layer.
    pub fn abort_scan<H: Handlers>(
        &mut self,
        handlers: &mut H,
        session_id: SessionId,
    ) -> Result<(), Error> {
        handlers.on_abort_scan(&mut self.ctx, session_id);
        if self.ctx.scan_offload_enabled {
            self.ctx.device.post_request(FirmwareRequest::StopOffloadScan { session_id })?;
            info!("aborting ongoing offload scan for session {}", session_id);
        } else if self.ctx.mode == GlobalMode::Scanning {
            self.ctx.device.post_request(FirmwareRequest::FinishScan { resume_channel: 0 })?;
            info!("force-aborting host-driven scan for session {}", session_id);
        }
        Ok(())
    }

    fn handle_fw_response<H: Handlers>(&mut self, handlers: &mut H, resp: FirmwareResponse) {
        if resp.completes_round_trip() {
            // Restored before delegation, success or failure, so deferred
            // events can resume flowing.
            self.ctx.allow_deferred_processing();
        }
        match resp {
            FirmwareResponse::AddBss { session_id, status } => {
                handlers.on_add_bss_response(&mut self.ctx, session_id, status)
            }
            FirmwareResponse::DeleteBss { session_id, status } => {
                handlers.on_delete_bss_response(&mut self.ctx, session_id, status)
            }
            FirmwareResponse::AddStation { session_id, sta_index, status } => {
                handlers.on_add_station_response(&mut self.ctx, session_id, sta_index, status)
            }
            FirmwareResponse::DeleteStation { session_id, sta_index, status } => {
                handlers.on_delete_station_response(&mut self.ctx, session_id, sta_index, status)
            }
            FirmwareResponse::AddSelfStation { status } => {
                handlers.on_add_self_station_response(&mut self.ctx, status)
            }
            FirmwareResponse::DeleteSelfStation { status } => {
                handlers.on_delete_self_station_response(&mut self.ctx, status)
            }
            FirmwareResponse::SetKey { scope, session_id, status } => {
                handlers.on_set_key_response(&mut self.ctx, scope, session_id, status)
            }
            FirmwareResponse::RemoveKey { scope, session_id, status } => {
                handlers.on_remove_key_response(&mut self.ctx, scope, session_id, status)
            }
            FirmwareResponse::AddBlockAck { session_id, sta_index, status } => {
                handlers.on_block_ack_response(&mut self.ctx, session_id, sta_index, status)
            }
            FirmwareResponse::AddTrafficStream { session_id, status } => {
                handlers.on_add_traffic_stream_response(&mut self.ctx, session_id, status)
            }
            FirmwareResponse::AggregateQos { session_id, status } => {
                handlers.on_aggregate_qos_response(&mut self.ctx, session_id, status)
            }
            FirmwareResponse::SwitchChannel { channel, status } => {
                handlers.on_switch_channel_response(&mut self.ctx, channel, status)
            }
            FirmwareResponse::SetMimoPowerSave { status } => {
                // Delivery-only completion; nothing owns it downstream.
                debug!("MIMO power-save response ({:?}) discarded", status);
            }
            FirmwareResponse::SetLinkState { session_id, status } => {
                handlers.on_link_state_response(&mut self.ctx, session_id, status)
            }
            FirmwareResponse::MissedBeacon { session_id } => {
                handlers.on_missed_beacon(&mut self.ctx, session_id)
            }
            FirmwareResponse::DeleteStationContext { session_id, sta_index } => {
                handlers.on_delete_station_context(&mut self.ctx, session_id, sta_index)
            }
            FirmwareResponse::NoaStart { status } => {
                if !status.is_success() {
                    warn!(
                        "GO notice-of-absence start failed ({:?}); \
                         continuing with deferred requests anyway",
                        status
                    );
                }
                if self.ctx.sessions.iter().find(|s| s.role == Role::P2pGo).is_none() {
                    warn!("NOA start received but GO is already removed");
                }
            }
            FirmwareResponse::NoaAttr { attrs } => {
                match self.ctx.sessions.iter_mut().find(|s| s.role == Role::P2pGo) {
                    Some(session) => {
                        session.cached_noa = Some(attrs);
                        debug!("cached NOA attributes for session {}", session.id);
                    }
                    None => warn!("NOA attribute indication with no GO session"),
                }
            }
            FirmwareResponse::InitScan { status } => {
                handlers.on_init_scan_response(&mut self.ctx, status)
            }
            FirmwareResponse::StartScan { status } => {
                handlers.on_start_scan_response(&mut self.ctx, status)
            }
            FirmwareResponse::EndScan { status } => {
                handlers.on_end_scan_response(&mut self.ctx, status)
            }
            FirmwareResponse::FinishScan { status } => {
                handlers.on_finish_scan_response(&mut self.ctx, status)
            }
            FirmwareResponse::RxScanEvent { event } => {
                handlers.on_rx_scan_event(&mut self.ctx, event)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::buffer::BufferProvider,
        crate::event::{FwStatus, InterruptSource, KeyScope},
        crate::handlers::{HandlerCall, MockHandlers},
        crate::mac::MacAddr,
        crate::session::NoaAttributes,
    };

    const BSSID: MacAddr = [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f];
    const PEER: MacAddr = [0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f];

    fn beacon_frame(bssid: MacAddr) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&[0b1000_0000, 0]); // beacon
        bytes.extend_from_slice(&[0, 0]); // duration
        bytes.extend_from_slice(&[0xff; 6]); // addr1
        bytes.extend_from_slice(&PEER); // addr2
        bytes.extend_from_slice(&bssid); // addr3
        bytes.extend_from_slice(&[0, 0]); // seq_ctrl
        bytes
    }

    fn delete_sta_resp() -> Event {
        Event::Fw(FirmwareResponse::DeleteStation {
            session_id: 0,
            sta_index: 7,
            status: FwStatus::Success,
        })
    }

    fn make() -> (Dispatcher, MockHandlers, crate::device::FakeDevice) {
        let (ctx, device) = fake_context();
        (Dispatcher::new(ctx), MockHandlers::new(), device)
    }

    #[test]
    fn offline_drops_event_and_releases_buffer() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.set_mode(GlobalMode::Offline);

        let provider = BufferProvider::new();
        let frame = provider.take(beacon_frame(BSSID));
        dispatcher.dispatch(&mut handlers, Event::FrameInd { frame });

        assert!(handlers.drain_calls().is_empty());
        assert_eq!(provider.outstanding(), 0);
        assert_eq!(dispatcher.ctx.counters.lock().dropped, 1);
        assert_eq!(dispatcher.ctx.counters.lock().processed, 0);
    }

    #[test]
    fn beacon_without_session_routed_sessionless() {
        // Scenario: mode Normal, no session matches the BSSID.
        let (mut dispatcher, mut handlers, _) = make();
        let provider = BufferProvider::new();
        let frame = provider.take(beacon_frame(BSSID));

        dispatcher.dispatch(&mut handlers, Event::FrameInd { frame });

        assert_eq!(handlers.drain_calls(), vec![HandlerCall::BeaconNoSession]);
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn join_deferred_while_scanning_replays_in_order() {
        // Scenario: join request arrives mid-scan, a later event follows.
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.set_mode(GlobalMode::Scanning);

        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::Join { session_id: 0 }));
        dispatcher.dispatch(&mut handlers, Event::RefreshBeacon);
        assert_eq!(dispatcher.ctx.deferred_len(), 2);
        assert!(handlers.drain_calls().is_empty());

        // Scan concludes: the finish-scan response flows (scan machinery is
        // never deferred) and the handler leaves scanning mode.
        dispatcher.ctx.set_mode(GlobalMode::Normal);
        dispatcher
            .dispatch(&mut handlers, Event::Fw(FirmwareResponse::FinishScan { status: FwStatus::Success }));

        assert_eq!(
            handlers.drain_calls(),
            vec![
                HandlerCall::ScanResponse { phase: "finish", status: FwStatus::Success },
                HandlerCall::SmeRequest { name: "join" },
                HandlerCall::RefreshBeacon,
            ]
        );
        assert_eq!(dispatcher.ctx.deferred_len(), 0);
    }

    #[test]
    fn allow_listed_response_processed_while_gated_then_queue_drains() {
        // Scenario: busy gate closed with three generic events queued.
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.note_firmware_request();

        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::Join { session_id: 0 }));
        dispatcher.dispatch(&mut handlers, Event::RefreshBeacon);
        dispatcher.dispatch(&mut handlers, Event::CfgUpdate { param: 4 });
        assert_eq!(dispatcher.ctx.deferred_len(), 3);

        dispatcher.dispatch(&mut handlers, delete_sta_resp());

        assert!(dispatcher.ctx.deferred_processing_allowed());
        assert_eq!(
            handlers.drain_calls(),
            vec![
                HandlerCall::DeleteStationResponse { session_id: 0, sta_index: 7 },
                HandlerCall::SmeRequest { name: "join" },
                HandlerCall::RefreshBeacon,
                HandlerCall::CfgUpdate { param: 4 },
            ]
        );
        // The gate was already open when the response handler ran.
        assert_eq!(handlers.gate_seen_at_fw_response, vec![true]);
    }

    #[test]
    fn gate_restored_before_delegation_even_on_failure() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.note_firmware_request();

        dispatcher.dispatch(
            &mut handlers,
            Event::Fw(FirmwareResponse::AddBss { session_id: 1, status: FwStatus::Failure }),
        );

        assert!(dispatcher.ctx.deferred_processing_allowed());
        assert_eq!(handlers.gate_seen_at_fw_response, vec![true]);
        assert_eq!(
            handlers.drain_calls(),
            vec![HandlerCall::AddBssResponse { session_id: 1, status: FwStatus::Failure }]
        );
    }

    #[test]
    fn drain_stops_when_replayed_event_begins_round_trip() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.note_firmware_request();

        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::Join { session_id: 0 }));
        dispatcher.dispatch(&mut handlers, Event::RefreshBeacon);
        assert_eq!(dispatcher.ctx.deferred_len(), 2);

        // The replayed join immediately starts another firmware round-trip;
        // the second queued event must stay queued.
        handlers.sme_request_begins_round_trip = true;
        dispatcher.dispatch(&mut handlers, delete_sta_resp());

        assert_eq!(dispatcher.ctx.deferred_len(), 1);
        assert_eq!(
            handlers.drain_calls(),
            vec![
                HandlerCall::DeleteStationResponse { session_id: 0, sta_index: 7 },
                HandlerCall::SmeRequest { name: "join" },
            ]
        );
    }

    #[test]
    fn defer_failure_drops_event_and_reports() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.deferred = DeferredQueue::with_capacity(1);
        dispatcher.ctx.set_mode(GlobalMode::Scanning);

        let provider = BufferProvider::new();
        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::Join { session_id: 0 }));
        // Queue is now full; a deferred frame indication is dropped and its
        // buffer released.
        dispatcher.ctx.set_mode(GlobalMode::Normal);
        dispatcher.ctx.note_firmware_request();
        let frame = provider.take(beacon_frame(BSSID));
        dispatcher.dispatch(&mut handlers, Event::FrameInd { frame });

        assert_eq!(provider.outstanding(), 0);
        assert_eq!(dispatcher.ctx.counters.lock().defer_failures, 1);
        assert!(handlers.drain_calls().is_empty());
    }

    #[test]
    fn malformed_frame_aborts_only_that_event() {
        // Scenario: frame indication whose buffer cannot hold a header.
        let (mut dispatcher, mut handlers, _) = make();
        let provider = BufferProvider::new();
        let frame = provider.take(vec![0xde, 0xad]);

        dispatcher.dispatch(&mut handlers, Event::FrameInd { frame });
        assert_eq!(provider.outstanding(), 0);
        assert_eq!(dispatcher.ctx.counters.lock().invariant_violations, 1);

        // The loop keeps going: the next event processes normally.
        dispatcher.dispatch(&mut handlers, Event::RefreshBeacon);
        assert_eq!(
            handlers.drain_calls(),
            vec![HandlerCall::RefreshBeacon]
        );
    }

    #[test]
    fn heartbeat_routed_per_session_or_globally() {
        let (mut dispatcher, mut handlers, _) = make();
        let id = dispatcher.ctx.sessions.create(BSSID, PEER, Role::Client).expect("create");

        dispatcher.dispatch(&mut handlers, Event::HeartbeatTimeout { session_id: Some(id) });
        dispatcher.dispatch(&mut handlers, Event::HeartbeatTimeout { session_id: None });

        assert_eq!(
            handlers.drain_calls(),
            vec![
                HandlerCall::HeartbeatTimeout { session_id: Some(id) },
                HandlerCall::HeartbeatTimeout { session_id: None },
            ]
        );
        let misses = dispatcher.ctx.sessions.by_session_id(id).map(|s| s.heartbeat_misses);
        assert_eq!(misses, Some(1));
    }

    #[test]
    fn heartbeat_for_vanished_session_is_invariant_violation() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.dispatch(&mut handlers, Event::HeartbeatTimeout { session_id: Some(3) });

        assert!(handlers.drain_calls().is_empty());
        assert_eq!(dispatcher.ctx.counters.lock().invariant_violations, 1);
    }

    #[test]
    fn heartbeat_deferred_while_scanning() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.set_mode(GlobalMode::Scanning);
        dispatcher.dispatch(&mut handlers, Event::HeartbeatTimeout { session_id: None });
        assert_eq!(dispatcher.ctx.deferred_len(), 1);
        assert!(handlers.drain_calls().is_empty());
    }

    #[test]
    fn addts_pending_holds_deferred_queue_but_admits_frames() {
        let (mut dispatcher, mut handlers, _) = make();

        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::AddTrafficStream { session_id: 0 }));
        assert!(dispatcher.ctx.addts_pending());

        // Frames still flow while the gate is otherwise closed.
        dispatcher.ctx.note_firmware_request();
        let provider = BufferProvider::new();
        let frame = provider.take(beacon_frame(BSSID));
        dispatcher.dispatch(&mut handlers, Event::FrameInd { frame });
        handlers.calls.clear();

        // The response timeout concludes the exchange.
        dispatcher.ctx.allow_deferred_processing();
        dispatcher.dispatch(
            &mut handlers,
            Event::Timeout { kind: TimeoutKind::AddTsResponse, session_id: Some(0) },
        );
        assert!(!dispatcher.ctx.addts_pending());
    }

    #[test]
    fn abort_scan_posts_stop_request() {
        let (mut dispatcher, mut handlers, device) = make();
        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::AbortScan { session_id: 2 }));

        assert_eq!(handlers.drain_calls(), vec![HandlerCall::AbortScan { session_id: 2 }]);
        assert_eq!(device.requests(), vec![FirmwareRequest::StopOffloadScan { session_id: 2 }]);
    }

    #[test]
    fn host_driven_abort_posts_finish_scan() {
        let (mut dispatcher, mut handlers, device) = make();
        dispatcher.ctx.scan_offload_enabled = false;
        dispatcher.ctx.set_mode(GlobalMode::Scanning);

        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::AbortScan { session_id: 1 }));

        assert_eq!(handlers.drain_calls(), vec![HandlerCall::AbortScan { session_id: 1 }]);
        assert_eq!(device.requests(), vec![FirmwareRequest::FinishScan { resume_channel: 0 }]);
    }

    #[test]
    fn abort_scan_post_failure_is_contained() {
        let (mut dispatcher, mut handlers, device) = make();
        device.fail_next_request();
        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::AbortScan { session_id: 2 }));

        // The handler still ran; the post failure was logged, not retried.
        assert_eq!(handlers.drain_calls(), vec![HandlerCall::AbortScan { session_id: 2 }]);
        assert!(device.requests().is_empty());
    }

    #[test]
    fn interrupt_notifications_logged_and_discarded() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.dispatch(&mut handlers, Event::Interrupt(InterruptSource::ReplayThreshold));
        assert!(handlers.drain_calls().is_empty());
        assert_eq!(dispatcher.ctx.counters.lock().dropped, 1);
    }

    #[test]
    fn noa_attributes_cached_on_go_session() {
        let (mut dispatcher, mut handlers, _) = make();
        let id = dispatcher.ctx.sessions.create(BSSID, PEER, Role::P2pGo).expect("create");

        let attrs = NoaAttributes { interval_count: 2, duration: 100, ..Default::default() };
        dispatcher.dispatch(&mut handlers, Event::Fw(FirmwareResponse::NoaAttr { attrs }));

        assert_eq!(dispatcher.ctx.sessions.by_session_id(id).and_then(|s| s.cached_noa), Some(attrs));
        assert!(handlers.drain_calls().is_empty());
    }

    #[test]
    fn key_responses_reach_key_handler() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.ctx.note_firmware_request();
        dispatcher.dispatch(
            &mut handlers,
            Event::Fw(FirmwareResponse::SetKey {
                scope: KeyScope::Pairwise,
                session_id: 1,
                status: FwStatus::Success,
            }),
        );
        assert!(dispatcher.ctx.deferred_processing_allowed());
        assert_eq!(
            handlers.drain_calls(),
            vec![HandlerCall::SetKeyResponse { scope: KeyScope::Pairwise, session_id: 1 }]
        );
    }

    #[test]
    fn response_required_flag_tracked() {
        let (mut dispatcher, mut handlers, _) = make();
        dispatcher.dispatch(&mut handlers, Event::Sme(SmeRequest::Join { session_id: 0 }));
        assert!(!dispatcher.ctx.response_expected());
        dispatcher.dispatch(
            &mut handlers,
            Event::Sme(SmeRequest::Disassociate { session_id: 0, reason: 1 }),
        );
        assert!(dispatcher.ctx.response_expected());
    }
}
