// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The deferral decision and the deferred event queue.
//!
//! Protocol correctness depends on replaying deferred events in arrival
//! order: an association response must reach its handler before the
//! disassociation request that depends on it. The decision itself is a pure
//! predicate so it can be tested against synthetic state.

use {
    crate::event::{Event, SmeRequest},
    crate::session::StateSnapshot,
    std::collections::VecDeque,
};

/// Process-wide operational phase, independent of any session's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalMode {
    Normal,
    /// Scanning or learning: the radio is off its home channel(s); only a
    /// small allow-list of events may be processed.
    Scanning,
    /// All events are discarded without processing.
    Offline,
}

/// Outcome of screening one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferralVerdict {
    Process,
    Defer,
    /// Intentional discard, distinct from a deferral.
    Drop,
}

fn bypasses_gate(event: &Event) -> bool {
    match event {
        Event::Fw(resp) => resp.bypasses_deferral(),
        Event::PsResponse { .. } => true,
        Event::Sme(SmeRequest::Start) => true,
        _ => false,
    }
}

/// Decides whether `event` may be processed now, must be queued for replay,
/// or is dropped outright. Rules are evaluated in order:
///
/// 1. Offline discards everything.
/// 2. While scanning, only firmware round-trip completions, power-save
///    responses, NOA indications, the start request, received-frame
///    indications (the classifier screens subtypes), and administrative
///    requests under a persona that manages its own deferral get through.
/// 3. While a firmware round-trip is outstanding (deferred processing not
///    allowed), only the same completions get through — plus frame
///    indications while an add-traffic-stream exchange is pending, so an
///    over-the-air ADDTS response can still arrive.
/// 4. Otherwise process.
pub fn should_defer(
    mode: GlobalMode,
    snapshot: &StateSnapshot,
    deferred_processing_allowed: bool,
    addts_pending: bool,
    event: &Event,
) -> DeferralVerdict {
    match mode {
        GlobalMode::Offline => DeferralVerdict::Drop,
        GlobalMode::Scanning => {
            let admin_exception = match event {
                Event::Sme(req) => {
                    req.is_administrative() && snapshot.system_role.manages_own_deferral()
                }
                _ => false,
            };
            let scan_phase = matches!(event, Event::Fw(resp) if resp.is_scan_phase());
            // Deferring the abort would leave the scan it is meant to end
            // running forever.
            let abort = matches!(event, Event::Sme(SmeRequest::AbortScan { .. }));
            if bypasses_gate(event)
                || scan_phase
                || abort
                || matches!(event, Event::FrameInd { .. })
                || admin_exception
            {
                DeferralVerdict::Process
            } else {
                DeferralVerdict::Defer
            }
        }
        GlobalMode::Normal => {
            if deferred_processing_allowed {
                return DeferralVerdict::Process;
            }
            let frame_during_addts =
                matches!(event, Event::FrameInd { .. }) && addts_pending;
            if bypasses_gate(event) || frame_during_addts {
                DeferralVerdict::Process
            } else {
                DeferralVerdict::Defer
            }
        }
    }
}

/// Matches the deferred queue depth of the reference driver.
pub const DEFERRED_QUEUE_CAPACITY: usize = 80;

/// Returned when the queue is at capacity; carries the event back so the
/// caller can release any owned buffer and report the drop.
#[derive(Debug)]
pub struct QueueFull(pub Event);

/// Bounded FIFO of events awaiting replay.
pub struct DeferredQueue {
    queue: VecDeque<Event>,
    capacity: usize,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFERRED_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { queue: VecDeque::new(), capacity }
    }

    pub fn enqueue(&mut self, event: Event) -> Result<(), QueueFull> {
        if self.queue.len() >= self.capacity {
            return Err(QueueFull(event));
        }
        self.queue.push_back(event);
        Ok(())
    }

    pub fn dequeue_one(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}
