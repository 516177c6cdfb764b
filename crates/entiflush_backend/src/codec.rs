//! Row payload encoding.
//!
//! Backends that keep rows as opaque payloads store them as CBOR produced
//! from the row's serde representation.

use crate::error::{BackendError, BackendResult};
use crate::row::Row;

/// Encodes a row to CBOR bytes.
///
/// # Errors
///
/// Returns [`BackendError::Codec`] if serialization fails.
pub fn encode_row(row: &Row) -> BackendResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(row, &mut bytes)
        .map_err(|e| BackendError::codec(format!("encode: {e}")))?;
    Ok(bytes)
}

/// Decodes a row from CBOR bytes.
///
/// # Errors
///
/// Returns [`BackendError::Codec`] if the bytes are not a valid row.
pub fn decode_row(bytes: &[u8]) -> BackendResult<Row> {
    ciborium::de::from_reader(bytes).map_err(|e| BackendError::codec(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiflush_value::Value;

    #[test]
    fn roundtrip_mixed_row() {
        let row = Row::new()
            .with("id", 10i64)
            .with("name", "root")
            .with("parent_id", Value::Null)
            .with("active", true);
        let bytes = encode_row(&row).unwrap();
        assert_eq!(decode_row(&bytes).unwrap(), row);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode_row(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, BackendError::Codec { .. }));
    }
}
