// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Outbound interface to the firmware abstraction layer.
//!
//! The engine only ever posts logical request messages; command transport,
//! retries and timeout handling live on the other side of this trait.

use crate::{error::Error, session::SessionId};

#[cfg(test)]
pub use test_utils::*;

/// Logical requests the engine posts down to the firmware abstraction
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareRequest {
    /// Stop a scan that was offloaded to the firmware.
    StopOffloadScan { session_id: SessionId },
    /// Conclude a host-driven scan sequence and resume the previous channel.
    /// Channel 0 asks the firmware to restore whichever channel was valid
    /// before.
    FinishScan { resume_channel: u8 },
}

/// Post-message primitive toward the firmware. A failure means the message
/// was not accepted; the caller releases the request and logs — retries are
/// the collaborator's responsibility.
pub trait DeviceOps {
    fn post_request(&mut self, request: FirmwareRequest) -> Result<(), Error>;
}

#[cfg(test)]
mod test_utils {
    use {
        super::*,
        parking_lot::Mutex,
        std::sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    };

    /// Captures posted requests for inspection, optionally rejecting the
    /// next one. Clones share state so a test can keep a handle after the
    /// device has been boxed into a `Context`.
    #[derive(Clone)]
    pub struct FakeDevice {
        requests: Arc<Mutex<Vec<FirmwareRequest>>>,
        fail_next: Arc<AtomicBool>,
    }

    impl FakeDevice {
        pub fn new() -> Self {
            Self { requests: Arc::new(Mutex::new(vec![])), fail_next: Arc::new(AtomicBool::new(false)) }
        }

        pub fn requests(&self) -> Vec<FirmwareRequest> {
            self.requests.lock().clone()
        }

        pub fn fail_next_request(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }
    }

    impl DeviceOps for FakeDevice {
        fn post_request(&mut self, request: FirmwareRequest) -> Result<(), Error> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(Error::FirmwareRequestRejected(format!("{:?}", request)));
            }
            self.requests.lock().push(request);
            Ok(())
        }
    }
}
