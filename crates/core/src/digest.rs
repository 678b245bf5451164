//! Content digests for end-to-end integrity verification.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
}

impl DigestAlgorithm {
    /// Stable string form used in the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(crate::Error::UnsupportedDigestAlgorithm(other.to_string())),
        }
    }
}

/// A content digest in `<algo>:<hex>` form, e.g. `sha256:ab12...`.
///
/// Hex digits are normalized to lowercase on parse so comparisons are
/// byte-for-byte.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    /// Parse from the `<algo>:<hex>` wire form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let (algo, hex) = s
            .split_once(':')
            .ok_or_else(|| crate::Error::InvalidDigest(format!("missing ':' separator: {s}")))?;
        let algorithm = DigestAlgorithm::parse(algo)
            .map_err(|_| crate::Error::UnsupportedDigestAlgorithm(algo.to_string()))?;

        if hex.len() != 64 {
            return Err(crate::Error::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidDigest(
                "digest contains non-hex characters".to_string(),
            ));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Compute the digest of a byte slice.
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = DigestHasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// The algorithm this digest was computed with.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Lowercase hex form of the digest value.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{}..)", self.algorithm.as_str(), &self.hex[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hex)
    }
}

/// Incremental digest hasher for streamed verification.
pub struct DigestHasher {
    algorithm: DigestAlgorithm,
    inner: Sha256,
}

impl DigestHasher {
    /// Create a hasher for the given algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let DigestAlgorithm::Sha256 = algorithm;
        Self {
            algorithm,
            inner: Sha256::new(),
        }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest {
        let bytes = self.inner.finalize();
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Digest {
            algorithm: self.algorithm,
            hex,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let digest = Digest::compute(DigestAlgorithm::Sha256, b"hello world");
        let parsed = Digest::parse(&digest.to_string()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn parse_normalizes_case() {
        let lower = Digest::compute(DigestAlgorithm::Sha256, b"x");
        let upper = format!("sha256:{}", lower.hex().to_ascii_uppercase());
        assert_eq!(Digest::parse(&upper).unwrap(), lower);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(Digest::parse("sha256").is_err());
        assert!(Digest::parse("md5:abcd").is_err());
        assert!(Digest::parse("sha256:abcd").is_err());
        assert!(Digest::parse(&format!("sha256:{}", "z".repeat(64))).is_err());
    }

    #[test]
    fn incremental_matches_oneshot() {
        let oneshot = Digest::compute(DigestAlgorithm::Sha256, b"hello world");
        let mut hasher = DigestHasher::new(DigestAlgorithm::Sha256);
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), oneshot);
    }

    #[test]
    fn known_vector() {
        // sha256 of the empty string
        let digest = Digest::compute(DigestAlgorithm::Sha256, b"");
        assert_eq!(
            digest.hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
