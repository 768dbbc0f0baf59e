//! Transaction validation codes reported by committing peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation outcome of an ordered transaction.
///
/// Numeric values match the platform's wire enum so codes coming back from a
/// client can be mapped with `from_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxValidationCode {
    Valid,
    NilEnvelope,
    BadPayload,
    BadCommonHeader,
    BadCreatorSignature,
    InvalidEndorserTransaction,
    InvalidConfigTransaction,
    UnsupportedTxPayload,
    BadProposalTxid,
    DuplicateTxid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    UnknownTxType,
    TargetChainNotFound,
    MarshalTxError,
    NilTxaction,
    ExpiredChaincode,
    ChaincodeVersionConflict,
    BadHeaderExtension,
    BadChannelHeader,
    BadResponsePayload,
    BadRwset,
    IllegalWriteset,
    InvalidWriteset,
    InvalidChaincode,
    NotValidated,
    InvalidOtherReason,
    Unknown(i32),
}

impl TxValidationCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Valid,
            1 => Self::NilEnvelope,
            2 => Self::BadPayload,
            3 => Self::BadCommonHeader,
            4 => Self::BadCreatorSignature,
            5 => Self::InvalidEndorserTransaction,
            6 => Self::InvalidConfigTransaction,
            7 => Self::UnsupportedTxPayload,
            8 => Self::BadProposalTxid,
            9 => Self::DuplicateTxid,
            10 => Self::EndorsementPolicyFailure,
            11 => Self::MvccReadConflict,
            12 => Self::PhantomReadConflict,
            13 => Self::UnknownTxType,
            14 => Self::TargetChainNotFound,
            15 => Self::MarshalTxError,
            16 => Self::NilTxaction,
            17 => Self::ExpiredChaincode,
            18 => Self::ChaincodeVersionConflict,
            19 => Self::BadHeaderExtension,
            20 => Self::BadChannelHeader,
            21 => Self::BadResponsePayload,
            22 => Self::BadRwset,
            23 => Self::IllegalWriteset,
            24 => Self::InvalidWriteset,
            25 => Self::InvalidChaincode,
            254 => Self::NotValidated,
            255 => Self::InvalidOtherReason,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Valid => 0,
            Self::NilEnvelope => 1,
            Self::BadPayload => 2,
            Self::BadCommonHeader => 3,
            Self::BadCreatorSignature => 4,
            Self::InvalidEndorserTransaction => 5,
            Self::InvalidConfigTransaction => 6,
            Self::UnsupportedTxPayload => 7,
            Self::BadProposalTxid => 8,
            Self::DuplicateTxid => 9,
            Self::EndorsementPolicyFailure => 10,
            Self::MvccReadConflict => 11,
            Self::PhantomReadConflict => 12,
            Self::UnknownTxType => 13,
            Self::TargetChainNotFound => 14,
            Self::MarshalTxError => 15,
            Self::NilTxaction => 16,
            Self::ExpiredChaincode => 17,
            Self::ChaincodeVersionConflict => 18,
            Self::BadHeaderExtension => 19,
            Self::BadChannelHeader => 20,
            Self::BadResponsePayload => 21,
            Self::BadRwset => 22,
            Self::IllegalWriteset => 23,
            Self::InvalidWriteset => 24,
            Self::InvalidChaincode => 25,
            Self::NotValidated => 254,
            Self::InvalidOtherReason => 255,
            Self::Unknown(code) => *code,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Codes caused by concurrent writers rather than by the transaction itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTxid | Self::MvccReadConflict | Self::PhantomReadConflict
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::NilEnvelope => "NIL_ENVELOPE",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::BadCommonHeader => "BAD_COMMON_HEADER",
            Self::BadCreatorSignature => "BAD_CREATOR_SIGNATURE",
            Self::InvalidEndorserTransaction => "INVALID_ENDORSER_TRANSACTION",
            Self::InvalidConfigTransaction => "INVALID_CONFIG_TRANSACTION",
            Self::UnsupportedTxPayload => "UNSUPPORTED_TX_PAYLOAD",
            Self::BadProposalTxid => "BAD_PROPOSAL_TXID",
            Self::DuplicateTxid => "DUPLICATE_TXID",
            Self::EndorsementPolicyFailure => "ENDORSEMENT_POLICY_FAILURE",
            Self::MvccReadConflict => "MVCC_READ_CONFLICT",
            Self::PhantomReadConflict => "PHANTOM_READ_CONFLICT",
            Self::UnknownTxType => "UNKNOWN_TX_TYPE",
            Self::TargetChainNotFound => "TARGET_CHAIN_NOT_FOUND",
            Self::MarshalTxError => "MARSHAL_TX_ERROR",
            Self::NilTxaction => "NIL_TXACTION",
            Self::ExpiredChaincode => "EXPIRED_CHAINCODE",
            Self::ChaincodeVersionConflict => "CHAINCODE_VERSION_CONFLICT",
            Self::BadHeaderExtension => "BAD_HEADER_EXTENSION",
            Self::BadChannelHeader => "BAD_CHANNEL_HEADER",
            Self::BadResponsePayload => "BAD_RESPONSE_PAYLOAD",
            Self::BadRwset => "BAD_RWSET",
            Self::IllegalWriteset => "ILLEGAL_WRITESET",
            Self::InvalidWriteset => "INVALID_WRITESET",
            Self::InvalidChaincode => "INVALID_CHAINCODE",
            Self::NotValidated => "NOT_VALIDATED",
            Self::InvalidOtherReason => "INVALID_OTHER_REASON",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for TxValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
            other => f.write_str(other.name()),
        }
    }
}
