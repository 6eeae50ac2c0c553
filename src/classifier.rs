// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Classification and routing of received 802.11 frames.
//!
//! For every frame indication the classifier extracts the header, resolves
//! the owning session (BSSID first, then peer address, then — for action
//! frames — the destination address) and hands the frame to exactly one
//! domain handler. "No session" is a legitimate result: beacons, probe
//! frames, authentication and public action frames are processable without
//! one. While the system is scanning, only beacon, probe and action
//! subtypes are routed; every other subtype is handed back for deferral so
//! normal-mode management processing stays suppressed until the scan ends.

use {
    crate::buffer::FrameBuffer,
    crate::defer::GlobalMode,
    crate::dispatcher::Context,
    crate::error::Error,
    crate::event::Event,
    crate::handlers::Handlers,
    crate::mac::{FrameType, MgmtFrame, MgmtHdr, MgmtSubtype},
    crate::session::{SessionId, SessionRegistry},
    log::{debug, error},
};

/// What became of a classified frame. The buffer travels with the verdict:
/// a handled or dropped frame is released when `frame` goes out of scope, a
/// deferred frame moves back into the returned event.
#[derive(Debug)]
pub enum FrameDisposition {
    Handled,
    Deferred(Event),
    Dropped,
}

/// Subtypes that cannot be processed without an owning session and are
/// therefore resolved against the peer address as a fallback.
fn requires_session(subtype: MgmtSubtype) -> bool {
    !matches!(
        subtype,
        MgmtSubtype::BEACON
            | MgmtSubtype::PROBE_REQ
            | MgmtSubtype::PROBE_RESP
            | MgmtSubtype::ACTION
            | MgmtSubtype::AUTH
    )
}

fn resolve_session(
    sessions: &SessionRegistry,
    hdr: &MgmtHdr,
    subtype: MgmtSubtype,
) -> Option<SessionId> {
    let bssid = hdr.addr3;
    if let Some(session) = sessions.by_bssid(&bssid) {
        return Some(session.id);
    }
    if subtype == MgmtSubtype::ACTION {
        // P2P response frames carry the peer in the BSSID slot; the owning
        // session is keyed by the destination address instead.
        let da = hdr.addr1;
        return sessions.by_bssid(&da).map(|s| s.id);
    }
    if requires_session(subtype) {
        let sa = hdr.addr2;
        return sessions.by_peer_addr(&sa).map(|s| s.id);
    }
    None
}

/// Classifies `frame` and routes it to the correct handler. The transport
/// buffer is released exactly once on every path: consumed here when the
/// frame is handled or dropped, or carried by the returned event when the
/// frame must be deferred.
pub fn classify_and_route<H: Handlers>(
    ctx: &mut Context,
    handlers: &mut H,
    frame: FrameBuffer,
) -> FrameDisposition {
    let must_defer = {
        let view = match MgmtFrame::parse(frame.as_slice()) {
            Some(view) => view,
            None => {
                error!("dropping frame indication: {}", Error::FrameTooShort(frame.len()));
                ctx.counters.lock().invariant_violations += 1;
                return FrameDisposition::Dropped;
            }
        };
        let fc = view.hdr.frame_ctrl();
        if fc.protocol_version() != 0 {
            error!(
                "dropping frame indication: {}",
                Error::UnsupportedProtocolVersion(fc.protocol_version())
            );
            ctx.counters.lock().protocol_errors += 1;
            return FrameDisposition::Dropped;
        }
        match fc.frame_type() {
            FrameType::MGMT => {}
            other => {
                debug!("ignoring received frame of type {:?}", other);
                return FrameDisposition::Dropped;
            }
        }
        let subtype = fc.mgmt_subtype();
        let session_id = resolve_session(&ctx.sessions, &view.hdr, subtype);

        // The upper layer may have registered for this frame; a match
        // forwards it there instead of the normal handlers.
        if handlers.on_registered_frame(ctx, &view) {
            debug!("received frame matched an upper-layer registration");
            return FrameDisposition::Handled;
        }

        if ctx.mode() == GlobalMode::Scanning {
            match subtype {
                MgmtSubtype::BEACON => {
                    match session_id {
                        Some(id) => handlers.on_beacon(ctx, id, &view),
                        None => handlers.on_beacon_no_session(ctx, &view),
                    }
                    false
                }
                MgmtSubtype::PROBE_RESP => {
                    match session_id {
                        Some(id) => handlers.on_probe_resp(ctx, id, &view),
                        None => handlers.on_probe_resp_no_session(ctx, &view),
                    }
                    false
                }
                MgmtSubtype::PROBE_REQ => {
                    handlers.on_probe_req(ctx, session_id, &view);
                    false
                }
                MgmtSubtype::ACTION => {
                    handlers.on_action_no_session(ctx, &view);
                    false
                }
                // Scanning suppresses normal-mode management processing.
                _ => true,
            }
        } else {
            route_normal(ctx, handlers, subtype, session_id, &view);
            false
        }
    };

    if must_defer {
        FrameDisposition::Deferred(Event::FrameInd { frame })
    } else {
        FrameDisposition::Handled
    }
}

fn route_normal<H: Handlers>(
    ctx: &mut Context,
    handlers: &mut H,
    subtype: MgmtSubtype,
    session_id: Option<SessionId>,
    view: &MgmtFrame<&[u8]>,
) {
    match subtype {
        MgmtSubtype::ASSOC_REQ | MgmtSubtype::REASSOC_REQ => {
            let reassoc = subtype == MgmtSubtype::REASSOC_REQ;
            let owner = session_id
                .and_then(|id| ctx.sessions.by_session_id(id).map(|s| (id, s.role)));
            match owner {
                Some((id, role)) if role.accepts_associations() => {
                    handlers.on_assoc_req(ctx, id, reassoc, view)
                }
                _ => error!("unexpected association request for current role"),
            }
        }
        MgmtSubtype::ASSOC_RESP | MgmtSubtype::REASSOC_RESP => {
            let reassoc = subtype == MgmtSubtype::REASSOC_RESP;
            match session_id {
                Some(id) => handlers.on_assoc_resp(ctx, id, reassoc, view),
                None => debug!("no session for association response"),
            }
        }
        MgmtSubtype::PROBE_REQ => handlers.on_probe_req(ctx, session_id, view),
        MgmtSubtype::PROBE_RESP => match session_id {
            Some(id) => handlers.on_probe_resp(ctx, id, view),
            None => handlers.on_probe_resp_no_session(ctx, view),
        },
        MgmtSubtype::BEACON => match session_id {
            Some(id) => handlers.on_beacon(ctx, id, view),
            None => handlers.on_beacon_no_session(ctx, view),
        },
        MgmtSubtype::AUTH => match session_id {
            Some(id) => handlers.on_auth(ctx, id, view),
            None => {
                // Fast-transition authentication may complete without a
                // session; otherwise fall back to the peer address.
                if !handlers.on_auth_no_session(ctx, view) {
                    let sa = view.hdr.addr2;
                    match ctx.sessions.by_peer_addr(&sa).map(|s| s.id) {
                        Some(id) => handlers.on_auth(ctx, id, view),
                        None => debug!("no session for authentication frame"),
                    }
                }
            }
        },
        MgmtSubtype::DISASSOC => match session_id {
            Some(id) => handlers.on_disassoc(ctx, id, view),
            None => debug!("no session for disassociation frame"),
        },
        MgmtSubtype::DEAUTH => match session_id {
            Some(id) => handlers.on_deauth(ctx, id, view),
            None => debug!("no session for deauthentication frame"),
        },
        MgmtSubtype::ACTION => match session_id {
            Some(id) => handlers.on_action(ctx, id, view),
            None => handlers.on_action_no_session(ctx, view),
        },
        other => debug!("management frame of reserved subtype {:?} ignored", other),
    }
}
