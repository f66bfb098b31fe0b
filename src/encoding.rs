//! Binary (TLV) and text encodings of a single [`Share`].
//!
//! The binary form is a sequence of tag-length-value records:
//!
//! ```text
//! 0x01 X            share identifier
//! 0x02 LEN (u16 BE) length of Y
//! 0x03 Y[LEN]       share values
//! ```
//!
//! The text form is `shamir1:` followed by the unpadded URL-safe base64 of the binary form.

use std::str::FromStr;

use crate::error::EncodingError;
use crate::sss::Share;

const TAG_X: u8 = 0x01;
const TAG_LEN: u8 = 0x02;
const TAG_Y: u8 = 0x03;

/// Prefix identifying version 1 of the text encoding.
pub const TEXT_PREFIX: &str = "shamir1:";

/// Encodes a share into its TLV form.
pub fn encode_share(share: &Share) -> Result<Vec<u8>, EncodingError> {
    if share.x == 0 {
        return Err(EncodingError::InvalidShareX);
    }
    if share.y.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }
    let len = u16::try_from(share.y.len()).map_err(|_| EncodingError::PayloadTooLong(share.y.len()))?;

    let mut buf = Vec::with_capacity(share.y.len() + 6);
    buf.extend_from_slice(&[TAG_X, share.x]);
    buf.push(TAG_LEN);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.push(TAG_Y);
    buf.extend_from_slice(&share.y);

    Ok(buf)
}

/// Decodes a share from its TLV form.
///
/// The length record must precede the payload record. Unknown tags, truncated records, and
/// buffers that never deliver both an identifier and a payload are rejected.
pub fn decode_share(data: &[u8]) -> Result<Share, EncodingError> {
    let mut reader = Reader { data, pos: 0 };
    let mut x = 0u8;
    let mut len: Option<usize> = None;
    let mut y: Vec<u8> = Vec::new();

    while let Some(tag) = reader.next_byte() {
        match tag {
            TAG_X => {
                x = reader.take(1)?[0];
            }
            TAG_LEN => {
                let raw = reader.take(2)?;
                len = Some(u16::from_be_bytes([raw[0], raw[1]]) as usize);
            }
            TAG_Y => {
                let n = match len {
                    Some(n) if n > 0 => n,
                    _ => return Err(EncodingError::MissingLength),
                };
                y = reader.take(n)?.to_vec();
            }
            other => return Err(EncodingError::UnknownTag(other)),
        }
    }

    if x == 0 || y.is_empty() {
        return Err(EncodingError::Incomplete);
    }

    Ok(Share { x, y })
}

/// Encodes a share into its versioned text form.
pub fn marshal_text(share: &Share) -> Result<String, EncodingError> {
    let bin = encode_share(share)?;
    Ok(format!(
        "{}{}",
        TEXT_PREFIX,
        base64::encode_config(bin, base64::URL_SAFE_NO_PAD)
    ))
}

/// Decodes a share from its versioned text form.
pub fn unmarshal_text(text: &str) -> Result<Share, EncodingError> {
    let raw = text
        .strip_prefix(TEXT_PREFIX)
        .ok_or(EncodingError::InvalidPrefix)?;
    let bin = base64::decode_config(raw, base64::URL_SAFE_NO_PAD)?;
    decode_share(&bin)
}

impl FromStr for Share {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        unmarshal_text(s)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn next_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodingError> {
        let end = self.pos.checked_add(n).ok_or(EncodingError::UnexpectedEnd)?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(EncodingError::UnexpectedEnd)?;
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Share {
        Share::new(3, b"correct horse".to_vec())
    }

    #[test]
    fn test_tlv_layout() {
        let encoded = encode_share(&Share::new(7, vec![0xaa, 0xbb])).unwrap();
        assert_eq!(encoded, vec![0x01, 0x07, 0x02, 0x00, 0x02, 0x03, 0xaa, 0xbb]);
    }

    #[test]
    fn test_tlv_round_trip() {
        let share = sample();
        assert_eq!(decode_share(&encode_share(&share).unwrap()).unwrap(), share);
    }

    #[test]
    fn test_text_round_trip() {
        let share = sample();
        let text = marshal_text(&share).unwrap();

        assert!(text.starts_with(TEXT_PREFIX));
        assert!(!text.contains('='));
        assert_eq!(unmarshal_text(&text).unwrap(), share);
        assert_eq!(text.parse::<Share>().unwrap(), share);
    }

    #[test]
    fn test_encode_rejects_invalid_share() {
        assert_eq!(
            encode_share(&Share::new(0, vec![1])),
            Err(EncodingError::InvalidShareX)
        );
        assert_eq!(
            encode_share(&Share::new(1, vec![])),
            Err(EncodingError::EmptyPayload)
        );
        assert_eq!(
            encode_share(&Share::new(1, vec![0; 70_000])),
            Err(EncodingError::PayloadTooLong(70_000))
        );
    }

    #[test]
    fn test_every_truncation_fails() {
        let encoded = encode_share(&sample()).unwrap();
        for cut in 0..encoded.len() {
            assert!(
                decode_share(&encoded[..cut]).is_err(),
                "truncation at {cut} decoded"
            );
        }
    }

    #[test]
    fn test_unknown_tag() {
        let mut encoded = encode_share(&sample()).unwrap();
        encoded[0] = 0x07;
        assert_eq!(decode_share(&encoded), Err(EncodingError::UnknownTag(0x07)));
    }

    #[test]
    fn test_payload_before_length() {
        let data = [0x01, 0x05, 0x03, 0xaa, 0x02, 0x00, 0x01];
        assert_eq!(decode_share(&data), Err(EncodingError::MissingLength));
    }

    #[test]
    fn test_zero_length_payload() {
        let data = [0x01, 0x05, 0x02, 0x00, 0x00, 0x03];
        assert_eq!(decode_share(&data), Err(EncodingError::MissingLength));
    }

    #[test]
    fn test_missing_x() {
        let data = [0x02, 0x00, 0x01, 0x03, 0xaa];
        assert_eq!(decode_share(&data), Err(EncodingError::Incomplete));
    }

    #[test]
    fn test_bad_text_prefix() {
        assert_eq!(
            unmarshal_text("shamir2:AQcCAAIDqrs"),
            Err(EncodingError::InvalidPrefix)
        );
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(
            unmarshal_text("shamir1:!!!"),
            Err(EncodingError::Base64(_))
        ));
    }

    #[test]
    fn test_known_text_vector() {
        // 01 07 02 00 02 03 aa bb
        let share = unmarshal_text("shamir1:AQcCAAIDqrs").unwrap();
        assert_eq!(share, Share::new(7, vec![0xaa, 0xbb]));
    }
}
