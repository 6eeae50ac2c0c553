// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Minimal zero-copy view of IEEE Std 802.11-2016 management frame headers.
//!
//! Only the fields the classifier needs are modeled here: frame control and
//! the three address fields. Frame body parsing belongs to the frame-parsing
//! collaborator and is intentionally absent.

use zerocopy::{
    byteorder::{LittleEndian, U16},
    ByteSlice, FromBytes, LayoutVerified, Unaligned,
};

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xff; 6];

/// IEEE Std 802.11-2016, 9.2.4.1
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct FrameControl(pub u16);

impl FrameControl {
    pub fn protocol_version(&self) -> u8 {
        (self.0 & 0b11) as u8
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType(((self.0 >> 2) & 0b11) as u8)
    }

    pub fn mgmt_subtype(&self) -> MgmtSubtype {
        MgmtSubtype(((self.0 >> 4) & 0b1111) as u8)
    }
}

/// IEEE Std 802.11-2016, 9.2.4.1.3
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct FrameType(pub u8);

impl FrameType {
    pub const MGMT: Self = Self(0);
    pub const CTRL: Self = Self(1);
    pub const DATA: Self = Self(2);
    pub const EXT: Self = Self(3);
}

/// IEEE Std 802.11-2016, 9.2.4.1.3, Table 9-1
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct MgmtSubtype(pub u8);

impl MgmtSubtype {
    pub const ASSOC_REQ: Self = Self(0b0000);
    pub const ASSOC_RESP: Self = Self(0b0001);
    pub const REASSOC_REQ: Self = Self(0b0010);
    pub const REASSOC_RESP: Self = Self(0b0011);
    pub const PROBE_REQ: Self = Self(0b0100);
    pub const PROBE_RESP: Self = Self(0b0101);
    pub const TIMING_AD: Self = Self(0b0110);
    pub const BEACON: Self = Self(0b1000);
    pub const ATIM: Self = Self(0b1001);
    pub const DISASSOC: Self = Self(0b1010);
    pub const AUTH: Self = Self(0b1011);
    pub const DEAUTH: Self = Self(0b1100);
    pub const ACTION: Self = Self(0b1101);
    pub const ACTION_NO_ACK: Self = Self(0b1110);
}

// IEEE Std 802.11-2016, 9.3.3.2
#[derive(FromBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct MgmtHdr {
    pub frame_ctrl: U16<LittleEndian>,
    pub duration: U16<LittleEndian>,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: U16<LittleEndian>,
}

impl MgmtHdr {
    pub fn frame_ctrl(&self) -> FrameControl {
        FrameControl(self.frame_ctrl.get())
    }
}

pub struct MgmtFrame<B: ByteSlice> {
    pub hdr: LayoutVerified<B, MgmtHdr>,
    pub body: B,
}

impl<B: ByteSlice> MgmtFrame<B> {
    pub fn parse(bytes: B) -> Option<Self> {
        let (hdr, body) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
        Some(Self { hdr, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(frame_ctrl: [u8; 2]) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&frame_ctrl);
        bytes.extend_from_slice(&[0, 0]); // duration
        bytes.extend_from_slice(&[1, 1, 1, 1, 1, 1]); // addr1
        bytes.extend_from_slice(&[2, 2, 2, 2, 2, 2]); // addr2
        bytes.extend_from_slice(&[3, 3, 3, 3, 3, 3]); // addr3
        bytes.extend_from_slice(&[0x10, 0]); // seq_ctrl
        bytes.extend_from_slice(&[9, 9]); // body
        bytes
    }

    #[test]
    fn parse_mgmt_hdr() {
        // Beacon: type 0, subtype 8.
        let bytes = test_frame([0b1000_0000, 0]);
        let frame = MgmtFrame::parse(&bytes[..]).expect("expected valid frame");
        let fc = frame.hdr.frame_ctrl();
        assert_eq!(fc.protocol_version(), 0);
        assert_eq!(fc.frame_type(), FrameType::MGMT);
        assert_eq!(fc.mgmt_subtype(), MgmtSubtype::BEACON);
        assert_eq!(frame.hdr.addr1, [1; 6]);
        assert_eq!(frame.hdr.addr2, [2; 6]);
        assert_eq!(frame.hdr.addr3, [3; 6]);
        assert_eq!(&frame.body[..], &[9, 9]);
    }

    #[test]
    fn parse_too_short() {
        let bytes = test_frame([0b1000_0000, 0]);
        assert!(MgmtFrame::parse(&bytes[..10]).is_none());
    }

    #[test]
    fn frame_ctrl_fields() {
        // Action frame (subtype 13), protocol version 1.
        let fc = FrameControl(0b1101_00_01);
        assert_eq!(fc.protocol_version(), 1);
        assert_eq!(fc.frame_type(), FrameType::MGMT);
        assert_eq!(fc.mgmt_subtype(), MgmtSubtype::ACTION);

        let fc = FrameControl(0b0000_10_00);
        assert_eq!(fc.frame_type(), FrameType::DATA);
    }
}
