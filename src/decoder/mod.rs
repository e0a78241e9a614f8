//! Turns raw broker payloads into typed ledger events.

pub mod tx_body;

use crate::domain::{
    ActivationEvent, LayerStatusEvent, LedgerEvent, MalfeasanceEvent, RewardEvent, Subject,
    TransactionCreatedEvent, TransactionHeader, TransactionRecord, TransactionResultEvent,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use tx_body::{parse_body, TxCall};

/// Decoding failures. All of them are retried through redelivery.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("invalid {subject} payload: {source}")]
    Json {
        subject: Subject,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid base64 transaction body: {0}")]
    Base64(String),
    #[error("error decoding transaction body: {0}")]
    TransactionBody(String),
}

/// Event decoder bound to a network's address prefix.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    hrp: String,
}

impl EventDecoder {
    pub fn new(hrp: impl Into<String>) -> Self {
        Self { hrp: hrp.into() }
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    /// Decode a payload received on a subject given by name.
    pub fn decode_named(&self, subject: &str, payload: &[u8]) -> Result<LedgerEvent, DecodeError> {
        let subject =
            Subject::parse(subject).ok_or_else(|| DecodeError::UnknownSubject(subject.into()))?;
        self.decode(subject, payload)
    }

    /// Decode a payload received on `subject`.
    pub fn decode(&self, subject: Subject, payload: &[u8]) -> Result<LedgerEvent, DecodeError> {
        match subject {
            Subject::Layers => json::<LayerStatusEvent>(subject, payload).map(LedgerEvent::LayerStatus),
            Subject::Rewards => json::<RewardEvent>(subject, payload).map(LedgerEvent::Reward),
            Subject::Activations => {
                json::<ActivationEvent>(subject, payload).map(LedgerEvent::Activation)
            }
            Subject::TransactionsCreated => {
                let event = json::<TransactionCreatedEvent>(subject, payload)?;
                let record = self.record(event.tx_id, event.header, event.raw.as_deref())?;
                Ok(LedgerEvent::TransactionCreated(record))
            }
            Subject::TransactionsResult => {
                let event = json::<TransactionResultEvent>(subject, payload)?;
                let record = self.record(event.tx_id, event.header, event.raw.as_deref())?;
                Ok(LedgerEvent::TransactionResult(record))
            }
            Subject::Malfeasance => {
                json::<MalfeasanceEvent>(subject, payload).map(LedgerEvent::Malfeasance)
            }
        }
    }

    fn record(
        &self,
        tx_id: String,
        header: TransactionHeader,
        raw: Option<&str>,
    ) -> Result<TransactionRecord, DecodeError> {
        let body = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| DecodeError::Base64(e.to_string()))?;
                Some(parse_body(&bytes, header.method, &self.hrp)?)
            }
            None => None,
        };

        Ok(TransactionRecord {
            tx_id,
            header,
            body,
        })
    }
}

fn json<T: DeserializeOwned>(subject: Subject, payload: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|source| DecodeError::Json { subject, source })
}

#[cfg(test)]
mod tests {
    use super::tx_body::METHOD_SPEND;
    use super::*;
    use crate::domain::primitives::ADDRESS_LENGTH;
    use crate::domain::Address;
    use serde_json::json;

    fn addr(tail: u8) -> [u8; ADDRESS_LENGTH] {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = tail;
        bytes
    }

    #[test]
    fn test_decode_layer() {
        let decoder = EventDecoder::new("sm");
        let event = decoder
            .decode_named("layers", br#"{"layer": 12, "status": 3}"#)
            .unwrap();
        assert_eq!(
            event,
            LedgerEvent::LayerStatus(LayerStatusEvent {
                layer: 12,
                status: 3
            })
        );
    }

    #[test]
    fn test_decode_reward_with_aliases() {
        let decoder = EventDecoder::new("sm");
        let payload = json!({
            "id": "r1",
            "coinbase": "A",
            "nodeId": "n1",
            "atxId": "x1",
            "layer": 5,
            "layerReward": 900,
            "total": 1000
        });
        let event = decoder
            .decode(Subject::Rewards, payload.to_string().as_bytes())
            .unwrap();
        match event {
            LedgerEvent::Reward(r) => {
                assert_eq!(r.stable_id(), "r1");
                assert_eq!(r.total_reward, 1000);
            }
            other => panic!("Expected reward, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_activation_num_units_alias() {
        let decoder = EventDecoder::new("sm");
        let payload = json!({
            "atxId": "x1",
            "nodeId": "n1",
            "coinbase": "A",
            "publishEpoch": 3,
            "tickCount": 5,
            "numUnits": 10
        });
        let event = decoder
            .decode(Subject::Activations, payload.to_string().as_bytes())
            .unwrap();
        match event {
            LedgerEvent::Activation(a) => {
                assert_eq!(a.effective_num_units, 10);
                assert_eq!(a.base_tick, 0);
            }
            other => panic!("Expected activation, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_transaction_result_with_body() {
        let decoder = EventDecoder::new("sm");
        let raw = TxCall::Spend {
            nonce: 4,
            gas_price: 1,
            destination: addr(2),
            amount: 100,
        }
        .encode_body(addr(1));
        let payload = json!({
            "id": "t1",
            "header": {
                "principal": "P",
                "method": METHOD_SPEND,
                "layer": 7,
                "gas": 5,
                "fee": 5,
                "status": 0,
                "addresses": ["P", "R"]
            },
            "raw": BASE64.encode(raw)
        });

        let event = decoder
            .decode(Subject::TransactionsResult, payload.to_string().as_bytes())
            .unwrap();
        match event {
            LedgerEvent::TransactionResult(t) => {
                assert_eq!(t.amount(), 100);
                assert_eq!(t.counter(), 4);
                let expected = Address::from_bytes(&addr(2), "sm").unwrap();
                assert_eq!(t.receiver(), Some(expected.as_str()));
            }
            other => panic!("Expected transaction result, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_created_without_body() {
        let decoder = EventDecoder::new("sm");
        let payload = json!({
            "txId": "t1",
            "header": {"principal": "P", "method": 16, "layer": 1}
        });
        let event = decoder
            .decode(Subject::TransactionsCreated, payload.to_string().as_bytes())
            .unwrap();
        match event {
            LedgerEvent::TransactionCreated(t) => {
                assert!(t.body.is_none());
                assert_eq!(t.amount(), 0);
            }
            other => panic!("Expected transaction created, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_body_is_transaction_body_error() {
        let decoder = EventDecoder::new("sm");
        let payload = json!({
            "id": "t1",
            "header": {"principal": "P", "method": 16, "layer": 1},
            "raw": BASE64.encode([0u8, 1, 2])
        });
        let err = decoder
            .decode(Subject::TransactionsResult, payload.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, DecodeError::TransactionBody(_)));
    }

    #[test]
    fn test_invalid_json_and_subject() {
        let decoder = EventDecoder::new("sm");
        assert!(matches!(
            decoder.decode(Subject::Malfeasance, b"{not json"),
            Err(DecodeError::Json { .. })
        ));
        assert!(matches!(
            decoder.decode_named("blocks", b"{}"),
            Err(DecodeError::UnknownSubject(_))
        ));
    }
}
