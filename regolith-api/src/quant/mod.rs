//! Quantification data handling: binary artifact codec, CSV parsing
//! and the multi-quantification combiner.

pub mod combine;
pub mod csv;

use bytes::Bytes;
use regolith_common::models::QuantFile;
use regolith_common::{Error, Result};

/// Serialize a quantification table into its stored binary form
pub fn encode_quant(quant: &QuantFile) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(quant)?))
}

/// Decode a stored quantification binary
pub fn decode_quant(data: &[u8]) -> Result<QuantFile> {
    serde_json::from_slice(data)
        .map_err(|e| Error::Internal(format!("Corrupt quantification data: {}", e)))
}
