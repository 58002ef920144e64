//! Fixed, versioned, little-endian wire types for cross-process frames.
//!
//! A frame is a [`WireHdr`] followed by a bincode-encoded list of
//! [`Envelope`]s. The frame's byte length travels ahead of it as a
//! [`WireCount`].

use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Frame kind for reduce rounds.
pub const KIND_REDUCE: u16 = 1;
/// Frame kind for neighbor exchanges.
pub const KIND_EXCHANGE: u16 = 2;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub round_le: u32,
}

impl WireHdr {
    pub fn new(kind: u16, round: u32) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            round_le: round.to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn round(&self) -> u32 {
        u32::from_le(self.round_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 8);

/// All queued payloads from one block to one block for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Gid,
    pub to: Gid,
    pub payloads: Vec<Vec<u8>>,
}

pub fn encode_frame(kind: u16, round: usize, envelopes: &[Envelope]) -> Result<Vec<u8>, ReduceError> {
    let hdr = WireHdr::new(kind, round as u32);
    let body = bincode::serialize(envelopes).map_err(ReduceError::Encode)?;
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + body.len());
    out.extend_from_slice(cast_slice(std::slice::from_ref(&hdr)));
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a frame from `peer`, checking version, kind and round.
pub fn decode_frame(
    peer: usize,
    kind: u16,
    round: usize,
    bytes: &[u8],
) -> Result<Vec<Envelope>, ReduceError> {
    if bytes.len() < size_of::<WireHdr>() {
        return Err(ReduceError::comm(
            peer,
            format!("frame of {} bytes is shorter than its header", bytes.len()),
        ));
    }
    let (head, body) = bytes.split_at(size_of::<WireHdr>());
    let hdr: WireHdr = bytemuck::pod_read_unaligned(head);
    if hdr.version() != WIRE_VERSION {
        return Err(ReduceError::comm(
            peer,
            format!("wire version {} (expected {WIRE_VERSION})", hdr.version()),
        ));
    }
    if hdr.kind() != kind || hdr.round() as usize != round {
        return Err(ReduceError::comm(
            peer,
            format!(
                "frame kind {} round {} does not match kind {kind} round {round}",
                hdr.kind(),
                hdr.round()
            ),
        ));
    }
    bincode::deserialize(body).map_err(ReduceError::Decode)
}
