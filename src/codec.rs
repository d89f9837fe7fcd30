//! The payload encoding contract, supplied by the caller's domain code.
//!
//! The pool treats task payloads and results as opaque bytes; it never constructs or
//! inspects a `PayloadCodec` itself beyond calling `encodable` during admission.

/// An external encoder/decoder the pool uses to validate payloads before admission.
///
/// Implementations are provided by the caller. The pool's only contract with a codec is
/// the pre-submit `encodable` check; `encode`/`decode` are offered for callers who want
/// to build their own submission wrappers on top of `Pool::submit`.
pub trait PayloadCodec: Send + Sync {
    /// The decoded, domain-level request type.
    type Request;
    /// The decoded, domain-level response type.
    type Response;

    /// Returns `true` if `payload` is well-formed enough to admit into the pool.
    ///
    /// This is the only codec method the pool calls itself; a `false` result turns into
    /// `PoolError::InvalidPayload` from `Pool::submit` before any worker is touched.
    fn encodable(&self, payload: &[u8]) -> bool;

    /// Encodes a domain-level request into wire bytes.
    fn encode(&self, request: &Self::Request) -> Result<Vec<u8>, String>;

    /// Decodes wire bytes into a domain-level response.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Response, String>;
}

/// A codec that treats every payload as already-encoded bytes and accepts anything
/// non-empty. Used as the pool's default type parameter when callers don't need a
/// domain-level encoding layer on top of raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCodec;

impl PayloadCodec for PassthroughCodec {
    type Request = Vec<u8>;
    type Response = Vec<u8>;

    fn encodable(&self, payload: &[u8]) -> bool {
        !payload.is_empty()
    }

    fn encode(&self, request: &Vec<u8>) -> Result<Vec<u8>, String> {
        Ok(request.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, String> {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_rejects_empty_payload() {
        let codec = PassthroughCodec;
        assert!(!codec.encodable(&[]));
        assert!(codec.encodable(&[1, 2, 3]));
    }

    #[test]
    fn passthrough_roundtrips() {
        let codec = PassthroughCodec;
        let encoded = codec.encode(&vec![1, 2, 3]).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
