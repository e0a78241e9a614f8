//! Domain primitives: LayerId, Epoch, Address.

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw address length in bytes.
pub const ADDRESS_LENGTH: usize = 24;

/// Leading address bytes reserved for future use. Must be zero.
pub const ADDRESS_RESERVED_SPACE: usize = 4;

/// Ledger layer number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u32);

impl LayerId {
    pub fn new(layer: u32) -> Self {
        LayerId(layer)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Epoch this layer belongs to.
    pub fn epoch(&self, layers_per_epoch: u32) -> Epoch {
        Epoch(self.0 / layers_per_epoch.max(1))
    }
}

/// Epoch number (`layer / layers_per_epoch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(pub u32);

impl Epoch {
    pub fn new(epoch: u32) -> Self {
        Epoch(epoch)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// First layer of this epoch.
    pub fn first_layer(&self, layers_per_epoch: u32) -> LayerId {
        LayerId(self.0.saturating_mul(layers_per_epoch))
    }

    /// First and last layer of this epoch, or `None` if the last one does not
    /// fit a layer id.
    pub fn layer_range(&self, layers_per_epoch: u32) -> Option<(LayerId, LayerId)> {
        let first = self.0.checked_mul(layers_per_epoch)?;
        let last = first.checked_add(layers_per_epoch.checked_sub(1)?)?;
        Some((LayerId(first), LayerId(last)))
    }

    /// The epoch before this one, saturating at zero.
    pub fn prev(&self) -> Epoch {
        Epoch(self.0.saturating_sub(1))
    }

    pub fn next(&self) -> Epoch {
        Epoch(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account address in its bech32 text form (e.g. `sm1qqqq...`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("error decoding bech32: {0}")]
    Bech32(String),
    #[error("wrong network id: expected `{expected}`, got `{got}`")]
    UnsupportedNetwork { expected: String, got: String },
    #[error("wrong address length: expected 24 bytes, got {0}")]
    WrongLength(usize),
    #[error("missing reserved space: first 4 bytes must be zero")]
    MissingReservedSpace,
}

impl Address {
    /// Create an Address from an already-encoded string.
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode raw address bytes with the network's human-readable part.
    pub fn from_bytes(
        bytes: &[u8; ADDRESS_LENGTH],
        hrp: &str,
    ) -> Result<Self, AddressParseError> {
        bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
            .map(Address)
            .map_err(|e| AddressParseError::Bech32(e.to_string()))
    }

    /// Parse and validate a bech32 address for the given network.
    pub fn parse(src: &str, hrp: &str) -> Result<Self, AddressParseError> {
        let (got_hrp, data, _variant) =
            bech32::decode(src).map_err(|e| AddressParseError::Bech32(e.to_string()))?;
        let bytes =
            Vec::<u8>::from_base32(&data).map_err(|e| AddressParseError::Bech32(e.to_string()))?;

        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressParseError::WrongLength(bytes.len()));
        }
        if got_hrp != hrp {
            return Err(AddressParseError::UnsupportedNetwork {
                expected: hrp.to_string(),
                got: got_hrp,
            });
        }
        if bytes[..ADDRESS_RESERVED_SPACE].iter().any(|b| *b != 0) {
            return Err(AddressParseError::MissingReservedSpace);
        }

        Ok(Address(src.to_lowercase()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
