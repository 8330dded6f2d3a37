/// Hex-encoded BLAKE3 digest of `data`.
#[must_use]
pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Content hash used in artifact names: the first 8 hex characters of the
/// BLAKE3 digest.
#[must_use]
pub fn short_hash(data: &[u8]) -> String {
    blake3_hex(data)[..8].to_string()
}
