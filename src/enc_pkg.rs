//! The opaque, encrypted unit of transfer the core ferries between the host and the
//! transports: trace/span correlation metadata plus a cipher-text payload.

use crate::ids::PackageType;

/// `u64_le(traceId) ‖ u64_le(spanId) ‖ u8(packageType) ‖ cipherText`.
const HEADER_LEN: usize = 8 + 8 + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncPkg {
    trace_id: u64,
    span_id: u64,
    package_type: PackageType,
    cipher_text: Vec<u8>,
}

impl EncPkg {
    pub fn new(trace_id: u64, span_id: u64, package_type: PackageType, cipher_text: Vec<u8>) -> Self {
        Self {
            trace_id,
            span_id,
            package_type,
            cipher_text,
        }
    }

    /// Construct from raw bytes with trace/span left at zero and type undefined — used
    /// by transports that only ever see the cipher-text (e.g. a freshly accepted
    /// `DirectLink` stream, or a decoded whiteboard post) before the host attaches
    /// real correlation metadata downstream.
    pub fn from_raw(cipher_text: Vec<u8>) -> Self {
        Self::new(0, 0, PackageType::Undefined, cipher_text)
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn cipher_text(&self) -> &[u8] {
        &self.cipher_text
    }

    pub fn cipher_text_mut(&mut self) -> &mut Vec<u8> {
        &mut self.cipher_text
    }

    pub fn into_cipher_text(self) -> Vec<u8> {
        self.cipher_text
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.cipher_text.len());
        buf.extend_from_slice(&self.trace_id.to_le_bytes());
        buf.extend_from_slice(&self.span_id.to_le_bytes());
        buf.push(self.package_type as u8);
        buf.extend_from_slice(&self.cipher_text);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let trace_id = u64::from_le_bytes(bytes[0..8].try_into().ok()?);
        let span_id = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
        let package_type = PackageType::from_u8(bytes[16])?;
        let cipher_text = bytes[HEADER_LEN..].to_vec();
        Some(Self {
            trace_id,
            span_id,
            package_type,
            cipher_text,
        })
    }

    /// Truncated base64 rendering of the cipher-text, for tracing. Mirrors the
    /// duty-cycle scheduler's `trace_corrupt_size_limit` display budget so a corrupted
    /// package's log line never dumps megabytes of garbage.
    pub fn cipher_text_for_display(&self, limit: usize) -> String {
        use base64::Engine;
        let slice = &self.cipher_text[..self.cipher_text.len().min(limit)];
        let encoded = base64::engine::general_purpose::STANDARD.encode(slice);
        if self.cipher_text.len() > limit {
            format!("{encoded}...")
        } else {
            encoded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_bit_exact() {
        let pkg = EncPkg::new(1, 2, PackageType::NetworkManager, vec![0, 1, 2, 3, 255]);
        let encoded = pkg.encode();
        let decoded = EncPkg::decode(&encoded).unwrap();
        assert_eq!(pkg, decoded);
    }

    #[test]
    fn round_trip_empty_cipher_text() {
        let pkg = EncPkg::new(u64::MAX, 0, PackageType::Sdk, vec![]);
        let encoded = pkg.encode();
        assert_eq!(encoded.len(), HEADER_LEN);
        let decoded = EncPkg::decode(&encoded).unwrap();
        assert_eq!(pkg, decoded);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(EncPkg::decode(&[0u8; 5]).is_none());
    }

    #[test]
    fn decode_rejects_unknown_package_type() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[16] = 99;
        assert!(EncPkg::decode(&bytes).is_none());
    }

    #[test]
    fn display_truncates_long_cipher_text() {
        let pkg = EncPkg::new(0, 0, PackageType::Undefined, vec![0xAB; 100]);
        let short = pkg.cipher_text_for_display(4);
        assert!(short.ends_with("..."));
    }
}
