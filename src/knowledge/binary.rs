//! Binary encoding/decoding for f32 embedding vectors.
//!
//! Stores embeddings as flat little-endian f32 bytes instead of JSON text,
//! saving roughly two thirds of the storage with faster serialization. The
//! codec is dimension-agnostic; the store never mixes embedding models, so
//! all blobs in one database share a dimension.

use anyhow::{bail, Result};

/// Encode an f32 embedding vector as flat little-endian bytes.
pub fn encode_embedding(vec: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(vec.len() * 4);
    for &val in vec {
        buf.extend_from_slice(&val.to_le_bytes());
    }
    buf
}

/// Decode an embedding blob. The blob must be a non-empty multiple of 4
/// bytes (flat little-endian f32).
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        bail!(
            "Invalid embedding blob: length {} is not a positive multiple of 4",
            blob.len()
        );
    }
    let mut vec = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        vec.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_binary() {
        let original: Vec<f32> = (0..1536).map(|i| i as f32 * 0.001).collect();
        let encoded = encode_embedding(&original);
        assert_eq!(encoded.len(), 1536 * 4);
        let decoded = decode_embedding(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_unaligned_blob_rejected() {
        let bad_blob = vec![0u8; 7];
        assert!(decode_embedding(&bad_blob).is_err());
    }

    #[test]
    fn test_empty_blob_rejected() {
        assert!(decode_embedding(&[]).is_err());
    }

    #[test]
    fn test_special_float_values() {
        let mut vec: Vec<f32> = (0..8).map(|i| i as f32).collect();
        vec[0] = f32::NEG_INFINITY;
        vec[1] = f32::INFINITY;
        vec[2] = 0.0;
        vec[3] = -0.0;
        let encoded = encode_embedding(&vec);
        let decoded = decode_embedding(&encoded).unwrap();
        assert_eq!(vec.len(), decoded.len());
        assert!(decoded[0].is_infinite() && decoded[0].is_sign_negative());
        assert!(decoded[1].is_infinite() && decoded[1].is_sign_positive());
    }
}
