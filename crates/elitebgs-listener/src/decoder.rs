//! Relay frame decoding: zlib inflate, then JSON into an [`Envelope`].

use std::io::Read;

use elitebgs_types::Envelope;
use flate2::read::ZlibDecoder;

/// Why a frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame was not a valid zlib stream.
    #[error("inflate failed: {0}")]
    Inflate(#[from] std::io::Error),

    /// The inflated bytes were not an envelope.
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inflate a compressed frame into raw JSON bytes.
pub fn inflate(frame: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(frame.len().saturating_mul(4));
    ZlibDecoder::new(frame).read_to_end(&mut out)?;
    Ok(out)
}

/// Decode one relay frame.
pub fn decode(frame: &[u8]) -> Result<Envelope, DecodeError> {
    let raw = inflate(frame)?;
    Ok(serde_json::from_slice(&raw)?)
}
