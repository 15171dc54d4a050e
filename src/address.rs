//! Account address parsing and formatting.
//!
//! Addresses identify an account by workchain and a 32-byte account id.
//! Two textual forms are accepted: the raw `workchain:hex` form and the
//! 36-byte friendly form (tag, workchain, id, CRC-16/XMODEM checksum)
//! carried as url-safe base64. Display always uses the bounceable
//! friendly form.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Serialize, Serializer};

/// Friendly-form tag for bounceable addresses.
const TAG_BOUNCEABLE: u8 = 0x11;
/// Friendly-form tag for non-bounceable addresses.
const TAG_NON_BOUNCEABLE: u8 = 0x51;
/// Tag bit marking a test-network address; accepted and ignored.
const TAG_TEST_FLAG: u8 = 0x80;

/// Errors raised while parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// Neither the raw nor the friendly form matched.
    #[error("unrecognized address format: {0:?}")]
    Format(String),

    /// The hex account id of a raw-form address was malformed.
    #[error("invalid account id hex: {0:?}")]
    AccountHex(String),

    /// The workchain number was not a valid signed byte.
    #[error("invalid workchain: {0:?}")]
    Workchain(String),

    /// The friendly form failed its checksum.
    #[error("address checksum mismatch")]
    Checksum,

    /// The friendly form carried an unknown tag byte.
    #[error("unknown address tag {0:#04x}")]
    Tag(u8),
}

/// A chain account address: workchain plus 32-byte account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i8,
    account_id: [u8; 32],
}

impl Address {
    pub fn new(workchain: i8, account_id: [u8; 32]) -> Self {
        Address {
            workchain,
            account_id,
        }
    }

    /// The 32-byte account id within the workchain.
    pub fn account_id(&self) -> &[u8; 32] {
        &self.account_id
    }

    /// Formats the bounceable friendly form.
    pub fn to_friendly(&self) -> String {
        let mut bytes = [0u8; 36];
        bytes[0] = TAG_BOUNCEABLE;
        bytes[1] = self.workchain as u8;
        bytes[2..34].copy_from_slice(&self.account_id);
        let crc = crc16_xmodem(&bytes[..34]);
        bytes[34..36].copy_from_slice(&crc.to_be_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Formats the raw `workchain:hex` form.
    pub fn to_raw(&self) -> String {
        let mut hex = String::with_capacity(64);
        for byte in self.account_id {
            use fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        format!("{}:{hex}", self.workchain)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((wc, hex)) = s.split_once(':') {
            return parse_raw(wc, hex);
        }
        parse_friendly(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_friendly())
    }
}

fn parse_raw(wc: &str, hex: &str) -> Result<Address, AddressParseError> {
    let workchain: i8 = wc
        .parse()
        .map_err(|_| AddressParseError::Workchain(wc.to_string()))?;
    if hex.len() != 64 {
        return Err(AddressParseError::AccountHex(hex.to_string()));
    }
    let mut account_id = [0u8; 32];
    for (i, byte) in account_id.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| AddressParseError::AccountHex(hex.to_string()))?;
    }
    Ok(Address::new(workchain, account_id))
}

fn parse_friendly(s: &str) -> Result<Address, AddressParseError> {
    // Tolerate the standard-alphabet variant some wallets emit.
    let normalized: String = s
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.trim_end_matches('='))
        .map_err(|_| AddressParseError::Format(s.to_string()))?;
    if bytes.len() != 36 {
        return Err(AddressParseError::Format(s.to_string()));
    }

    let expected = crc16_xmodem(&bytes[..34]);
    let actual = u16::from_be_bytes([bytes[34], bytes[35]]);
    if expected != actual {
        return Err(AddressParseError::Checksum);
    }

    let tag = bytes[0] & !TAG_TEST_FLAG;
    if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
        return Err(AddressParseError::Tag(bytes[0]));
    }

    let workchain = bytes[1] as i8;
    let mut account_id = [0u8; 32];
    account_id.copy_from_slice(&bytes[2..34]);
    Ok(Address::new(workchain, account_id))
}

/// CRC-16/XMODEM: polynomial 0x1021, zero initial value.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
