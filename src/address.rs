//! Bech32 account addresses.
//!
//! MultiversX accounts are 32-byte ed25519 public keys rendered as Bech32 text
//! with the `erd` human-readable prefix, e.g.
//! `erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx`.
//!
//! The decoder is strict about case: the data alphabet is lowercase and no
//! case folding happens before decoding, so an all-uppercase address is
//! rejected with [`Bech32Error::InvalidSymbol`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Human-readable prefix of MultiversX accounts.
pub const ADDRESS_HRP: &str = "erd";

/// Length in bytes of a MultiversX account public key.
pub const ADDRESS_LEN: usize = 32;

/// The Bech32 data alphabet; a symbol's index is its 5-bit value.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// BCH generator taps applied for each of the top five accumulator bits.
const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];

/// Residue of a valid (non-"m") Bech32 checksum.
const CHECKSUM_CONST: u32 = 1;

const CHECKSUM_LEN: usize = 6;
const MIN_LEN: usize = 8;
const MAX_LEN: usize = 90;
const SEPARATOR: char = '1';

/// Failures of the Bech32 codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Bech32Error {
    /// Text is shorter than 8 or longer than 90 characters
    #[error("invalid bech32 string length {0}")]
    InvalidLength(usize),

    /// The `1` separator is absent or leaves no room for prefix or checksum
    #[error("missing or misplaced separator")]
    MissingSeparator,

    /// A data character is outside the Bech32 alphabet
    #[error("invalid character in data part: {0:?}")]
    InvalidSymbol(char),

    /// The polymod checksum does not validate
    #[error("invalid checksum")]
    ChecksumMismatch,

    /// Leftover bits after regrouping are non-zero or too many
    #[error("invalid padding")]
    InvalidPadding,

    /// The prefix is not a valid human-readable part
    #[error("invalid human-readable prefix {0:?}")]
    InvalidPrefix(String),

    /// Decoded payload has the wrong length for an account key
    #[error("expected 32 address bytes, got {0}")]
    InvalidKeyLength(usize),
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &value in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(value);
        for (i, tap) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= tap;
            }
        }
    }
    chk
}

fn expand_hrp(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 31));
    out
}

fn create_checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let residue = polymod(&values) ^ CHECKSUM_CONST;

    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, symbol) in checksum.iter_mut().enumerate() {
        *symbol = ((residue >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

fn verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    polymod(&values) == CHECKSUM_CONST
}

/// Regroups `from`-bit values into `to`-bit values, most significant bit first.
///
/// With `pad` unset, leftover bits must be fewer than `from` and all zero.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, Bech32Error> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let value = u32::from(value);
        if value >> from != 0 {
            return Err(Bech32Error::InvalidPadding);
        }
        acc = ((acc << from) | value) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(Bech32Error::InvalidPadding);
    }

    Ok(out)
}

/// Decodes Bech32 text into its human-readable prefix and raw bytes.
pub fn decode(text: &str) -> Result<(String, Vec<u8>), Bech32Error> {
    if text.len() < MIN_LEN || text.len() > MAX_LEN {
        return Err(Bech32Error::InvalidLength(text.len()));
    }

    let separator = text.rfind(SEPARATOR).ok_or(Bech32Error::MissingSeparator)?;
    if separator < 1 || separator + CHECKSUM_LEN + 1 > text.len() {
        return Err(Bech32Error::MissingSeparator);
    }

    let (hrp, rest) = text.split_at(separator);
    if !hrp.bytes().all(|b| (33..=126).contains(&b)) {
        return Err(Bech32Error::InvalidPrefix(hrp.to_string()));
    }

    let data = rest[1..]
        .chars()
        .map(|c| {
            u8::try_from(c)
                .ok()
                .and_then(|b| CHARSET.iter().position(|&s| s == b))
                .map(|idx| idx as u8)
                .ok_or(Bech32Error::InvalidSymbol(c))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    if !verify_checksum(hrp, &data) {
        return Err(Bech32Error::ChecksumMismatch);
    }

    let payload = &data[..data.len() - CHECKSUM_LEN];
    let bytes = convert_bits(payload, 5, 8, false)?;
    Ok((hrp.to_string(), bytes))
}

/// Encodes raw bytes as Bech32 text under the given prefix.
pub fn encode(hrp: &str, bytes: &[u8]) -> Result<String, Bech32Error> {
    if hrp.is_empty() || !hrp.bytes().all(|b| (33..=126).contains(&b)) {
        return Err(Bech32Error::InvalidPrefix(hrp.to_string()));
    }

    let data = convert_bits(bytes, 8, 5, true)?;
    let checksum = create_checksum(hrp, &data);

    let len = hrp.len() + 1 + data.len() + CHECKSUM_LEN;
    if len > MAX_LEN {
        return Err(Bech32Error::InvalidLength(len));
    }

    let mut out = String::with_capacity(len);
    out.push_str(hrp);
    out.push(SEPARATOR);
    out.extend(
        data.iter()
            .chain(checksum.iter())
            .map(|&v| CHARSET[v as usize] as char),
    );
    Ok(out)
}

/// Returns true iff `text` is a well-formed `erd1…` account address.
pub fn is_valid_address(text: &str) -> bool {
    text.parse::<Address>().is_ok()
}

/// A MultiversX account: the raw 32-byte public key behind an `erd1…` address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wraps raw public-key bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds an address from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Bech32Error> {
        let bytes: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| Bech32Error::InvalidKeyLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Raw public-key bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase hex of the public key, as used in transaction data arguments.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Bech32 text form.
    pub fn to_bech32(&self) -> String {
        // 32 bytes under a three-letter prefix always fit in 90 characters.
        encode(ADDRESS_HRP, &self.0).unwrap_or_default()
    }
}

impl FromStr for Address {
    type Err = Bech32Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, bytes) = decode(s)?;
        if hrp != ADDRESS_HRP {
            return Err(Bech32Error::InvalidPrefix(hrp));
        }
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_bech32())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bech32())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
