// Cross-chain address encoding used in vault messages and packets.

use crate::error::{HarnessError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_PAYLOAD_LEN: usize = 64;
pub const ENCODED_ADDRESS_LEN: usize = ADDRESS_PAYLOAD_LEN + 1;

/// Base64 of `[len][zero padding][address bytes]`, always 65 bytes before
/// encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedAddress(String);

impl EncodedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<String> {
        decode_address(&self.0)
    }
}

impl fmt::Display for EncodedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode_address(address: &str) -> Result<EncodedAddress> {
    let bytes = address.as_bytes();
    if bytes.len() > ADDRESS_PAYLOAD_LEN {
        return Err(HarnessError::AddressTooLong { len: bytes.len() });
    }

    let mut buffer = Vec::with_capacity(ENCODED_ADDRESS_LEN);
    buffer.push(bytes.len() as u8);
    buffer.resize(ENCODED_ADDRESS_LEN - bytes.len(), 0);
    buffer.extend_from_slice(bytes);

    let encoded = STANDARD.encode(&buffer);
    log::debug!("encoded address {} as {}", address, encoded);
    Ok(EncodedAddress(encoded))
}

pub fn decode_address(encoded: &str) -> Result<String> {
    let buffer = STANDARD
        .decode(encoded)
        .map_err(|e| HarnessError::MalformedAddress(format!("{encoded}: {e}")))?;
    if buffer.len() != ENCODED_ADDRESS_LEN {
        return Err(HarnessError::MalformedAddress(format!(
            "expected {} bytes, got {}",
            ENCODED_ADDRESS_LEN,
            buffer.len()
        )));
    }

    let len = buffer[0] as usize;
    if len > ADDRESS_PAYLOAD_LEN {
        return Err(HarnessError::MalformedAddress(format!("length prefix {len} exceeds 64")));
    }
    let payload_start = ENCODED_ADDRESS_LEN - len;
    if buffer[1..payload_start].iter().any(|b| *b != 0) {
        return Err(HarnessError::MalformedAddress("non-zero padding".to_string()));
    }

    String::from_utf8(buffer[payload_start..].to_vec())
        .map_err(|e| HarnessError::MalformedAddress(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNO_USER: &str = "juno1hj5fveer5cjtn4wd6wstzugjfdxzl0xps73ftl";

    #[test]
    fn encodes_with_length_prefix_and_left_padding() {
        let encoded = encode_address(JUNO_USER).unwrap();
        let raw = STANDARD.decode(encoded.as_str()).unwrap();
        assert_eq!(raw.len(), ENCODED_ADDRESS_LEN);
        assert_eq!(raw[0] as usize, JUNO_USER.len());
        assert!(raw[1..ENCODED_ADDRESS_LEN - JUNO_USER.len()].iter().all(|b| *b == 0));
        assert!(raw.ends_with(JUNO_USER.as_bytes()));
    }

    #[test]
    fn round_trips_every_length_up_to_64() {
        for len in 0..=ADDRESS_PAYLOAD_LEN {
            let address: String = "x".repeat(len);
            let encoded = encode_address(&address).unwrap();
            assert_eq!(encoded.decode().unwrap(), address, "length {len}");
        }
    }

    #[test]
    fn rejects_addresses_longer_than_64_bytes() {
        let address = "a".repeat(65);
        match encode_address(&address) {
            Err(HarnessError::AddressTooLong { len }) => assert_eq!(len, 65),
            other => panic!("expected AddressTooLong, got {:?}", other),
        }
    }

    #[test]
    fn counts_bytes_not_chars() {
        // 22 three-byte chars: 66 bytes
        let address = "€".repeat(22);
        assert!(matches!(encode_address(&address), Err(HarnessError::AddressTooLong { len: 66 })));
    }

    #[test]
    fn decode_rejects_short_buffers_and_dirty_padding() {
        let short = STANDARD.encode([3u8, b'a', b'b', b'c']);
        assert!(matches!(decode_address(&short), Err(HarnessError::MalformedAddress(_))));

        let mut dirty = vec![1u8];
        dirty.resize(ENCODED_ADDRESS_LEN - 1, 0);
        dirty[10] = 7;
        dirty.push(b'z');
        assert!(matches!(decode_address(&STANDARD.encode(dirty)), Err(HarnessError::MalformedAddress(_))));

        assert!(matches!(decode_address("not base64!"), Err(HarnessError::MalformedAddress(_))));
    }
}
