//! MultiWii Serial Protocol (v1) request framing.
//!
//! `'$' 'M' '<' size cmd payload[size] checksum`, where checksum is the XOR of
//! size, cmd and every payload byte. Requests are fire-and-forget: nothing is
//! read back, the flight controller relies on a steady stream instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const HEADER: [u8; 3] = *b"$M<";
pub const MSP_SET_RAW_RC: u8 = 200;
/// Channels carried by MSP_SET_RAW_RC.
pub const RC_CHANNELS: usize = 8;
pub const RC_PAYLOAD_LEN: usize = RC_CHANNELS * 2;
/// Bytes on the wire for one MSP_SET_RAW_RC request.
pub const RC_FRAME_LEN: usize = HEADER.len() + 2 + RC_PAYLOAD_LEN + 1;
/// Value of the three trailing channels the controller expects but we don't use.
pub const FILLER_CHANNEL: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MspError {
    #[error("frame is {got} bytes, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("bad header {0:02x?}")]
    Header([u8; 3]),
    #[error("unexpected command {0}")]
    Command(u8),
    #[error("size byte {0} does not match MSP_SET_RAW_RC")]
    Size(u8),
    #[error("checksum mismatch: computed {computed:#04x}, frame says {received:#04x}")]
    Checksum { computed: u8, received: u8 },
}

/// One RC setpoint request in AETR order plus the arm switch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcCommand {
    pub roll: u16,
    pub pitch: u16,
    pub throttle: u16,
    pub yaw: u16,
    pub aux1: u16,
}

impl RcCommand {
    pub fn channels(&self) -> [u16; RC_CHANNELS] {
        [
            self.roll,
            self.pitch,
            self.throttle,
            self.yaw,
            self.aux1,
            FILLER_CHANNEL,
            FILLER_CHANNEL,
            FILLER_CHANNEL,
        ]
    }
}

pub fn checksum(size: u8, cmd: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(size ^ cmd, |acc, b| acc ^ b)
}

// Payloads we send are fixed-size and fit the size byte.
fn frame(cmd: u8, payload: &[u8]) -> BytesMut {
    debug_assert!(payload.len() <= usize::from(u8::MAX));
    let size = payload.len() as u8;
    let mut buf = BytesMut::with_capacity(HEADER.len() + 3 + payload.len());
    buf.put_slice(&HEADER);
    buf.put_u8(size);
    buf.put_u8(cmd);
    buf.put_slice(payload);
    buf.put_u8(checksum(size, cmd, payload));
    buf
}

/// Encodes an MSP_SET_RAW_RC request, channels little-endian.
pub fn encode_rc(rc: &RcCommand) -> Bytes {
    let mut payload = [0u8; RC_PAYLOAD_LEN];
    let mut w = &mut payload[..];
    for ch in rc.channels() {
        w.put_u16_le(ch);
    }
    frame(MSP_SET_RAW_RC, &payload).freeze()
}

/// Parses an MSP_SET_RAW_RC request back into its five meaningful channels.
pub fn decode_rc(frame: &[u8]) -> Result<RcCommand, MspError> {
    if frame.len() != RC_FRAME_LEN {
        return Err(MspError::Length { expected: RC_FRAME_LEN, got: frame.len() });
    }
    let mut buf = frame;
    let mut header = [0u8; 3];
    buf.copy_to_slice(&mut header);
    if header != HEADER {
        return Err(MspError::Header(header));
    }
    let size = buf.get_u8();
    if size as usize != RC_PAYLOAD_LEN {
        return Err(MspError::Size(size));
    }
    let cmd = buf.get_u8();
    if cmd != MSP_SET_RAW_RC {
        return Err(MspError::Command(cmd));
    }
    let payload = &buf[..RC_PAYLOAD_LEN];
    let received = buf[RC_PAYLOAD_LEN];
    let computed = checksum(size, cmd, payload);
    if computed != received {
        return Err(MspError::Checksum { computed, received });
    }

    let mut p = payload;
    Ok(RcCommand {
        roll: p.get_u16_le(),
        pitch: p.get_u16_le(),
        throttle: p.get_u16_le(),
        yaw: p.get_u16_le(),
        aux1: p.get_u16_le(),
    })
}
