// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This crate implements the Link Management Entity (LME) event engine of an
//! IEEE Std 802.11-2016 MAC sublayer: the control-plane core that receives
//! every asynchronous link-management event — received management frames,
//! upper-layer requests, timer expirations and firmware command completions
//! — and routes each to the correct domain handler while preserving strict
//! ordering across the sessions sharing one radio.
//!
//! The heart of the crate is the dispatch and deferral engine: a global mode
//! (normal / scanning / offline), a per-round-trip busy gate and a FIFO
//! deferral queue together decide, for every incoming event, whether it is
//! processed immediately or replayed later. See the [`dispatcher`],
//! [`defer`] and [`classifier`] modules.
//!
//! Domain logic lives behind the traits in [`handlers`]; this crate routes
//! and never parses frame bodies, derives keys or talks to hardware.

pub mod buffer;
pub mod classifier;
pub mod defer;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handlers;
pub mod mac;
pub mod remutex;
pub mod session;

use {
    anyhow::bail,
    futures::{channel::mpsc, StreamExt},
    log::{error, info},
};

pub use {
    crate::dispatcher::{Context, Dispatcher, SharedCounters},
    crate::event::Event,
    crate::handlers::Handlers,
};

use crate::{device::DeviceOps, remutex::ReentrantMutex};

/// Submission handle for the single serialization point. Clones may be
/// handed to the firmware-callback, upper-layer and timer contexts; sends
/// never block and failures are only logged.
#[derive(Clone)]
pub struct EventSink(mpsc::UnboundedSender<Event>);

impl EventSink {
    pub fn send(&self, event: Event) {
        if let Err(e) = self.0.unbounded_send(event) {
            error!("failed to submit event to the LME loop: {}", e);
        }
    }
}

/// Creates the submission channel feeding [`lme_main_loop`].
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<Event>) {
    let (sender, receiver) = mpsc::unbounded();
    (EventSink(sender), receiver)
}

/// Owns the engine state and serializes event processing: one event runs to
/// completion under the state lock before the next is admitted.
pub struct LinkManager<H: Handlers> {
    dispatcher: Dispatcher,
    handlers: H,
    state_lock: ReentrantMutex,
}

impl<H: Handlers> LinkManager<H> {
    pub fn new(device: Box<dyn DeviceOps + Send>, handlers: H) -> Self {
        Self {
            dispatcher: Dispatcher::new(Context::new(device)),
            handlers,
            state_lock: ReentrantMutex::new(),
        }
    }

    /// Handle to the dispatch counters, observable from outside the loop.
    pub fn counters(&self) -> SharedCounters {
        std::sync::Arc::clone(&self.dispatcher.ctx.counters)
    }

    pub fn context(&self) -> &Context {
        &self.dispatcher.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.dispatcher.ctx
    }

    /// Processes one event to completion. Shared state is touched only
    /// under the reentrant state lock; a handler that re-enters the lock on
    /// the same thread will not deadlock.
    pub fn handle_event(&mut self, event: Event) {
        if let Err(e) = self.state_lock.acquire() {
            error!("dropping event, state lock unavailable: {}", e);
            return;
        }
        self.dispatcher.dispatch(&mut self.handlers, event);
        if let Err(e) = self.state_lock.release() {
            error!("state lock release failed: {}", e);
        }
    }

    fn shutdown(self) {
        if let Err(e) = self.state_lock.destroy() {
            error!("state lock teardown failed: {}", e);
        }
    }
}

/// Drives the engine until a [`Event::Shutdown`] arrives or the submission
/// channel closes. This is the only place events are consumed, which makes
/// it the serialization point required by the run-to-completion model.
pub async fn lme_main_loop<H: Handlers>(
    manager: LinkManager<H>,
    events: mpsc::UnboundedReceiver<Event>,
) {
    match main_loop_impl(manager, events).await {
        Ok(()) => info!("LME event loop exited gracefully."),
        Err(e) => error!("LME event loop exited with error: {:?}", e),
    }
}

async fn main_loop_impl<H: Handlers>(
    mut manager: LinkManager<H>,
    mut events: mpsc::UnboundedReceiver<Event>,
) -> Result<(), anyhow::Error> {
    loop {
        match events.next().await {
            Some(Event::Shutdown) => {
                manager.shutdown();
                return Ok(());
            }
            Some(event) => manager.handle_event(event),
            None => bail!("LME event stream terminated unexpectedly."),
        }
    }
}
