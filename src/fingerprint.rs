//! Opaque per-dive identity used to stop a download once it reaches
//! already-seen dives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LibError;

const MAX_LEN: usize = 16;

/// A small inline byte buffer (4-16 bytes depending on family) identifying
/// a dive. Two dives are the same dive iff their fingerprints compare
/// equal; the crate never interprets the bytes beyond that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    bytes: [u8; MAX_LEN],
    len: u8,
}

impl Fingerprint {
    pub fn empty() -> Self {
        Self {
            bytes: [0; MAX_LEN],
            len: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_slice() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = LibError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() > MAX_LEN {
            return Err(LibError::InvalidArguments(format!(
                "fingerprint too long: {} > {MAX_LEN}",
                value.len()
            )));
        }

        let mut bytes = [0u8; MAX_LEN];
        bytes[..value.len()].copy_from_slice(value);

        Ok(Self {
            bytes,
            len: value.len() as u8,
        })
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = LibError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() % 2 != 0 {
            return Err(LibError::InvalidArguments(
                "fingerprint hex string must have an even length".to_string(),
            ));
        }

        let bytes = (0..value.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&value[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()?;

        Fingerprint::try_from(bytes.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex_display() {
        let fp = Fingerprint::try_from([0xDE, 0xAD, 0xBE, 0xEF].as_slice()).unwrap();
        assert_eq!(fp.to_string(), "DEADBEEF");

        let parsed = Fingerprint::try_from("DEADBEEF".to_string()).unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn rejects_oversized_input() {
        let too_long = vec![0u8; 17];
        assert!(Fingerprint::try_from(too_long.as_slice()).is_err());
    }

    #[test]
    fn empty_fingerprint_has_zero_length() {
        assert!(Fingerprint::empty().is_empty());
        assert_eq!(Fingerprint::empty().as_slice(), &[] as &[u8]);
    }
}
