//! Self-describing container for a single share.
//!
//! ```text
//! "SHAM" | version | threshold | share_count | share_index | field_id | payload | crc32 [| mac]
//! ```
//!
//! The CRC32 (IEEE, big-endian) covers every byte before it and guards against accidental
//! corruption. When a MAC key is supplied, an HMAC-SHA256 over everything before it is appended
//! and checked on decode.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::EncodingError;
use crate::sss::Share;

type HmacSha256 = Hmac<Sha256>;

pub const MAGIC: &[u8; 4] = b"SHAM";
pub const VERSION: u8 = 0x01;

/// Field identifier for GF(2^8).
pub const FIELD_GF256: u8 = 0x01;

const HEADER_LEN: usize = 9;
const CRC_LEN: usize = 4;
const MAC_LEN: usize = 32;

/// Parameters carried alongside every container payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareHeader {
    pub threshold: u8,
    pub share_count: u8,
    pub share_index: u8,
    pub field_id: u8,
}

impl ShareHeader {
    pub fn new(threshold: u8, share_count: u8, share_index: u8) -> Self {
        ShareHeader {
            threshold,
            share_count,
            share_index,
            field_id: FIELD_GF256,
        }
    }

    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.threshold == 0 || self.threshold > self.share_count {
            return Err(EncodingError::InvalidHeader("threshold out of range"));
        }
        if self.share_index == 0 || self.share_index > self.share_count {
            return Err(EncodingError::InvalidHeader("share index out of range"));
        }
        if self.field_id != FIELD_GF256 {
            return Err(EncodingError::InvalidHeader("unsupported field identifier"));
        }
        Ok(())
    }
}

/// Encodes a header and payload into a container.
pub fn encode(
    header: &ShareHeader,
    payload: &[u8],
    mac_key: Option<&[u8]>,
) -> Result<Vec<u8>, EncodingError> {
    if payload.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }
    header.validate()?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN + MAC_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[
        VERSION,
        header.threshold,
        header.share_count,
        header.share_index,
        header.field_id,
    ]);
    buf.extend_from_slice(payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());

    if let Some(key) = mac_key {
        let tag = mac(key, &buf)?.finalize().into_bytes();
        buf.extend_from_slice(&tag);
    }

    Ok(buf)
}

/// Decodes and validates a container, returning its header and payload.
///
/// Checks run in order: magic, version, header fields, payload presence, CRC, then the MAC when a
/// key is given. The first failure is returned.
pub fn decode(data: &[u8], mac_key: Option<&[u8]>) -> Result<(ShareHeader, Vec<u8>), EncodingError> {
    if data.len() < MAGIC.len() {
        return Err(EncodingError::UnexpectedEnd);
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(EncodingError::InvalidMagic);
    }
    if data.len() < HEADER_LEN {
        return Err(EncodingError::UnexpectedEnd);
    }
    if data[4] != VERSION {
        return Err(EncodingError::UnsupportedVersion(data[4]));
    }

    let header = ShareHeader {
        threshold: data[5],
        share_count: data[6],
        share_index: data[7],
        field_id: data[8],
    };
    header.validate()?;

    let trailer = CRC_LEN + if mac_key.is_some() { MAC_LEN } else { 0 };
    let payload_end = match data.len().checked_sub(trailer) {
        Some(end) if end > HEADER_LEN => end,
        _ => return Err(EncodingError::EmptyPayload),
    };

    let mut crc_bytes = [0u8; CRC_LEN];
    crc_bytes.copy_from_slice(&data[payload_end..payload_end + CRC_LEN]);
    let expected = u32::from_be_bytes(crc_bytes);
    let actual = crc32fast::hash(&data[..payload_end]);
    if actual != expected {
        return Err(EncodingError::CrcMismatch { expected, actual });
    }

    if let Some(key) = mac_key {
        let signed_end = payload_end + CRC_LEN;
        mac(key, &data[..signed_end])?
            .verify_slice(&data[signed_end..])
            .map_err(|_| EncodingError::MacMismatch)?;
    }

    Ok((header, data[HEADER_LEN..payload_end].to_vec()))
}

/// Wraps a share produced by a `threshold`-of-`share_count` split.
pub fn encode_share(
    share: &Share,
    threshold: u8,
    share_count: u8,
    mac_key: Option<&[u8]>,
) -> Result<Vec<u8>, EncodingError> {
    encode(
        &ShareHeader::new(threshold, share_count, share.x),
        &share.y,
        mac_key,
    )
}

/// Unwraps a container into its header and the share it carries.
pub fn decode_share(
    data: &[u8],
    mac_key: Option<&[u8]>,
) -> Result<(ShareHeader, Share), EncodingError> {
    let (header, payload) = decode(data, mac_key)?;
    Ok((header, Share::new(header.share_index, payload)))
}

fn mac(key: &[u8], data: &[u8]) -> Result<HmacSha256, EncodingError> {
    // HMAC itself takes keys of any length, including none at all.
    if key.is_empty() {
        return Err(EncodingError::InvalidMacKey);
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| EncodingError::InvalidMacKey)?;
    mac.update(data);
    Ok(mac)
}
