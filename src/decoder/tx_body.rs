//! SCALE decoding of binary transaction bodies.
//!
//! Layout: `version` (compact), `principal` (24 bytes), `method` (compact),
//! then method-specific arguments. Anything after the arguments (signatures)
//! is ignored.

use crate::domain::primitives::ADDRESS_LENGTH;
use crate::domain::{Address, DecodedBody};
use parity_scale_codec::{Decode, Encode};

use super::DecodeError;

pub const METHOD_SPAWN: u8 = 0;
pub const METHOD_SPEND: u8 = 16;
pub const METHOD_DRAIN_VAULT: u8 = 17;

// --------------------------------------------------------------------------
// Wire types
// --------------------------------------------------------------------------

#[derive(Decode, Encode, Debug, Clone, PartialEq, Eq)]
struct BodyPrefix {
    #[codec(compact)]
    version: u8,
    principal: [u8; ADDRESS_LENGTH],
    #[codec(compact)]
    method: u8,
}

#[derive(Decode, Encode, Debug, Clone, PartialEq, Eq)]
struct SpawnArgs {
    template: [u8; ADDRESS_LENGTH],
    #[codec(compact)]
    nonce: u64,
    #[codec(compact)]
    gas_price: u64,
}

#[derive(Decode, Encode, Debug, Clone, PartialEq, Eq)]
struct SpendArgs {
    #[codec(compact)]
    nonce: u64,
    #[codec(compact)]
    gas_price: u64,
    destination: [u8; ADDRESS_LENGTH],
    #[codec(compact)]
    amount: u64,
}

#[derive(Decode, Encode, Debug, Clone, PartialEq, Eq)]
struct DrainVaultArgs {
    #[codec(compact)]
    nonce: u64,
    #[codec(compact)]
    gas_price: u64,
    vault: [u8; ADDRESS_LENGTH],
    destination: [u8; ADDRESS_LENGTH],
    #[codec(compact)]
    amount: u64,
}

/// A transaction call, as carried in a binary body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxCall {
    Spawn {
        template: [u8; ADDRESS_LENGTH],
        nonce: u64,
        gas_price: u64,
    },
    Spend {
        nonce: u64,
        gas_price: u64,
        destination: [u8; ADDRESS_LENGTH],
        amount: u64,
    },
    DrainVault {
        nonce: u64,
        gas_price: u64,
        vault: [u8; ADDRESS_LENGTH],
        destination: [u8; ADDRESS_LENGTH],
        amount: u64,
    },
}

impl TxCall {
    pub fn method(&self) -> u8 {
        match self {
            TxCall::Spawn { .. } => METHOD_SPAWN,
            TxCall::Spend { .. } => METHOD_SPEND,
            TxCall::DrainVault { .. } => METHOD_DRAIN_VAULT,
        }
    }

    /// Encode as an unsigned binary body for `principal`.
    pub fn encode_body(&self, principal: [u8; ADDRESS_LENGTH]) -> Vec<u8> {
        let mut out = BodyPrefix {
            version: 0,
            principal,
            method: self.method(),
        }
        .encode();

        match self.clone() {
            TxCall::Spawn {
                template,
                nonce,
                gas_price,
            } => SpawnArgs {
                template,
                nonce,
                gas_price,
            }
            .encode_to(&mut out),
            TxCall::Spend {
                nonce,
                gas_price,
                destination,
                amount,
            } => SpendArgs {
                nonce,
                gas_price,
                destination,
                amount,
            }
            .encode_to(&mut out),
            TxCall::DrainVault {
                nonce,
                gas_price,
                vault,
                destination,
                amount,
            } => DrainVaultArgs {
                nonce,
                gas_price,
                vault,
                destination,
                amount,
            }
            .encode_to(&mut out),
        }
        out
    }
}

fn body_error(msg: impl std::fmt::Display) -> DecodeError {
    DecodeError::TransactionBody(msg.to_string())
}

/// Parse a binary body, checking its method against the header's.
pub fn parse_body(raw: &[u8], header_method: u8, hrp: &str) -> Result<DecodedBody, DecodeError> {
    let mut input = raw;
    let prefix = BodyPrefix::decode(&mut input).map_err(body_error)?;

    if prefix.method != header_method {
        return Err(body_error(format!(
            "body method {} does not match header method {}",
            prefix.method, header_method
        )));
    }

    let receiver = |bytes: &[u8; ADDRESS_LENGTH]| {
        Address::from_bytes(bytes, hrp)
            .map(|a| Some(a.0))
            .map_err(body_error)
    };

    match prefix.method {
        METHOD_SPAWN => {
            let args = SpawnArgs::decode(&mut input).map_err(body_error)?;
            Ok(DecodedBody {
                receiver: None,
                amount: 0,
                counter: args.nonce,
                gas_price: args.gas_price,
            })
        }
        METHOD_SPEND => {
            let args = SpendArgs::decode(&mut input).map_err(body_error)?;
            Ok(DecodedBody {
                receiver: receiver(&args.destination)?,
                amount: args.amount,
                counter: args.nonce,
                gas_price: args.gas_price,
            })
        }
        METHOD_DRAIN_VAULT => {
            let args = DrainVaultArgs::decode(&mut input).map_err(body_error)?;
            Ok(DecodedBody {
                receiver: receiver(&args.destination)?,
                amount: args.amount,
                counter: args.nonce,
                gas_price: args.gas_price,
            })
        }
        other => Err(body_error(format!("unknown method {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tail: u8) -> [u8; ADDRESS_LENGTH] {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = tail;
        bytes
    }

    #[test]
    fn test_parse_spend() {
        let raw = TxCall::Spend {
            nonce: 3,
            gas_price: 2,
            destination: addr(9),
            amount: 100,
        }
        .encode_body(addr(1));

        let body = parse_body(&raw, METHOD_SPEND, "sm").unwrap();
        assert_eq!(body.amount, 100);
        assert_eq!(body.counter, 3);
        assert_eq!(body.gas_price, 2);
        assert_eq!(
            body.receiver,
            Some(Address::from_bytes(&addr(9), "sm").unwrap().0)
        );
    }

    #[test]
    fn test_parse_spawn_has_no_receiver() {
        let raw = TxCall::Spawn {
            template: addr(2),
            nonce: 0,
            gas_price: 1,
        }
        .encode_body(addr(1));

        let body = parse_body(&raw, METHOD_SPAWN, "sm").unwrap();
        assert_eq!(body.receiver, None);
        assert_eq!(body.amount, 0);
        assert_eq!(body.gas_price, 1);
    }

    #[test]
    fn test_parse_drain_vault_credits_destination() {
        let raw = TxCall::DrainVault {
            nonce: 1,
            gas_price: 1,
            vault: addr(5),
            destination: addr(6),
            amount: 42,
        }
        .encode_body(addr(1));

        let body = parse_body(&raw, METHOD_DRAIN_VAULT, "sm").unwrap();
        assert_eq!(body.amount, 42);
        assert_eq!(
            body.receiver,
            Some(Address::from_bytes(&addr(6), "sm").unwrap().0)
        );
    }

    #[test]
    fn test_trailing_signature_ignored() {
        let mut raw = TxCall::Spend {
            nonce: 1,
            gas_price: 1,
            destination: addr(2),
            amount: 7,
        }
        .encode_body(addr(1));
        raw.extend_from_slice(&[0xAB; 64]);

        assert_eq!(parse_body(&raw, METHOD_SPEND, "sm").unwrap().amount, 7);
    }

    #[test]
    fn test_unknown_method_fails() {
        let mut raw = BodyPrefix {
            version: 0,
            principal: addr(1),
            method: 99,
        }
        .encode();
        raw.extend_from_slice(&[0u8; 40]);

        assert!(matches!(
            parse_body(&raw, 99, "sm"),
            Err(DecodeError::TransactionBody(_))
        ));
    }

    #[test]
    fn test_method_mismatch_fails() {
        let raw = TxCall::Spawn {
            template: addr(2),
            nonce: 0,
            gas_price: 1,
        }
        .encode_body(addr(1));

        assert!(matches!(
            parse_body(&raw, METHOD_SPEND, "sm"),
            Err(DecodeError::TransactionBody(_))
        ));
    }

    #[test]
    fn test_truncated_body_fails() {
        let raw = TxCall::Spend {
            nonce: 1,
            gas_price: 1,
            destination: addr(2),
            amount: 7,
        }
        .encode_body(addr(1));

        assert!(matches!(
            parse_body(&raw[..raw.len() - 10], METHOD_SPEND, "sm"),
            Err(DecodeError::TransactionBody(_))
        ));
    }
}
