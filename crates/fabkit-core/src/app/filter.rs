//! ResponseConsistencyFilter - reject divergent endorsements
//!
//! Endorsements that disagree mean non-deterministic chaincode or a stale
//! replica; such a transaction must never reach the orderer. The rejection is
//! transient so the retry policy may resubmit and hit a consistent set.

use crate::domain::{ErrorDetail, InvocationError};
use crate::ports::{EndorsementHandler, ProposalResponse};

/// Status an endorser returns for a successful simulation.
pub const STATUS_OK: i32 = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseConsistencyFilter;

impl ResponseConsistencyFilter {
    pub fn new() -> Self {
        Self
    }

    /// Returns `responses` unchanged iff every response has the pivot's status
    /// and payload and that status is 200.
    pub fn check(
        &self,
        tx_id: &str,
        responses: Vec<ProposalResponse>,
    ) -> Result<Vec<ProposalResponse>, InvocationError> {
        let Some(pivot) = responses.first() else {
            return Err(InvocationError::Transient(
                ErrorDetail::new("no endorsement responses").with_tx_id(tx_id),
            ));
        };

        for other in &responses[1..] {
            if other.status != pivot.status {
                return Err(InvocationError::Transient(
                    ErrorDetail::new(format!(
                        "endorsement status mismatch: {} returned {} but {} returned {}",
                        pivot.endorser, pivot.status, other.endorser, other.status
                    ))
                    .with_tx_id(tx_id),
                ));
            }
            if other.payload != pivot.payload {
                return Err(InvocationError::Transient(
                    ErrorDetail::new(format!(
                        "endorsement payload mismatch between {} and {}",
                        pivot.endorser, other.endorser
                    ))
                    .with_tx_id(tx_id),
                ));
            }
        }

        if pivot.status != STATUS_OK {
            let mut message = format!("endorsers returned status {}", pivot.status);
            if !pivot.message.is_empty() {
                message.push_str(&format!(": {}", pivot.message));
            }
            return Err(InvocationError::Transient(
                ErrorDetail::new(message).with_tx_id(tx_id),
            ));
        }

        Ok(responses)
    }
}

impl EndorsementHandler for ResponseConsistencyFilter {
    fn handle(
        &self,
        tx_id: &str,
        responses: Vec<ProposalResponse>,
    ) -> Result<Vec<ProposalResponse>, InvocationError> {
        self.check(tx_id, responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn resp(endorser: &str, status: i32, payload: &[u8]) -> ProposalResponse {
        ProposalResponse {
            endorser: endorser.to_string(),
            status,
            message: String::new(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn consistent_responses_pass_unchanged() {
        let input = vec![
            resp("peer0.org1", 200, b"v"),
            resp("peer0.org2", 200, b"v"),
            resp("peer1.org1", 200, b"v"),
        ];
        let out = ResponseConsistencyFilter.check("tx1", input.clone()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn single_response_passes() {
        let input = vec![resp("peer0.org1", 200, b"")];
        assert!(ResponseConsistencyFilter.check("tx1", input).is_ok());
    }

    #[test]
    fn payload_divergence_names_both_endorsers() {
        let input = vec![resp("peerA", 200, b"value-1"), resp("peerB", 200, b"value-2")];
        let err = ResponseConsistencyFilter.check("tx9", input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.tx_id(), Some("tx9"));
        let msg = err.to_string();
        assert!(msg.contains("peerA"), "{msg}");
        assert!(msg.contains("peerB"), "{msg}");
    }

    #[test]
    fn status_divergence_is_transient() {
        let input = vec![resp("peerA", 200, b"x"), resp("peerB", 500, b"x")];
        let err = ResponseConsistencyFilter.check("tx2", input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.to_string().contains("status mismatch"));
    }

    #[test]
    fn first_mismatch_wins() {
        let input = vec![
            resp("peerA", 200, b"x"),
            resp("peerB", 200, b"y"),
            resp("peerC", 500, b"x"),
        ];
        let err = ResponseConsistencyFilter.check("tx3", input).unwrap_err();
        assert!(err.to_string().contains("peerB"));
        assert!(!err.to_string().contains("peerC"));
    }

    #[test]
    fn agreeing_non_ok_status_is_rejected() {
        let mut a = resp("peerA", 500, b"");
        a.message = "unknown function".to_string();
        let input = vec![a, resp("peerB", 500, b"")];
        let err = ResponseConsistencyFilter.check("tx4", input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("tx4"), "{msg}");
    }

    #[test]
    fn empty_response_set_is_rejected() {
        let err = ResponseConsistencyFilter.check("tx5", Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn filtering_is_idempotent() {
        let input = vec![resp("peerA", 200, b"v"), resp("peerB", 200, b"v")];
        let once = ResponseConsistencyFilter.check("tx6", input).unwrap();
        let twice = ResponseConsistencyFilter.check("tx6", once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
