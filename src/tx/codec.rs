use crate::tx::Transaction;
use thiserror::Error;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode transaction: {0}")]
    EncodeError(String),

    #[error("Failed to decode transaction: {0}")]
    DecodeError(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid base64 string: {0}")]
    InvalidBase64(String),

    #[error("Transaction id does not match its contents")]
    IdMismatch,
}

/// Codec for raw transaction bytes
pub struct TransactionCodec;

impl TransactionCodec {
    /// Encode to compact binary (postcard)
    pub fn encode(tx: &Transaction) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(tx).map_err(|e| CodecError::EncodeError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Transaction, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::DecodeError(e.to_string()))
    }

    /// Decode and check that the id is the content hash
    pub fn decode_verified(bytes: &[u8]) -> Result<Transaction, CodecError> {
        let tx = Self::decode(bytes)?;
        if tx.compute_id() != *tx.id() {
            return Err(CodecError::IdMismatch);
        }
        Ok(tx)
    }

    /// Encode to hex string (the "raw transaction" form)
    pub fn encode_hex(tx: &Transaction) -> Result<String, CodecError> {
        Ok(hex::encode(Self::encode(tx)?))
    }

    pub fn decode_hex(hex_str: &str) -> Result<Transaction, CodecError> {
        let bytes = hex::decode(hex_str).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Encode to base64 string (URL-safe, no padding)
    pub fn encode_base64(tx: &Transaction) -> Result<String, CodecError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        Ok(URL_SAFE_NO_PAD.encode(Self::encode(tx)?))
    }

    pub fn decode_base64(b64_str: &str) -> Result<Transaction, CodecError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let bytes = URL_SAFE_NO_PAD
            .decode(b64_str)
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Self::decode(&bytes)
    }
}
