//! Content fingerprints for raw memory images.

use crate::io::MemoryView;

/// Read granularity when hashing a view (16 MiB).
const CHUNK: u64 = 16 * 1024 * 1024;

/// BLAKE3 digest of `data` as a hex string.
pub fn blake3_digest(data: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

/// BLAKE3 digest of a whole memory view, read chunk by chunk.
pub fn fingerprint<M: MemoryView + ?Sized>(memory: &M) -> crate::io::error::Result<String> {
    let size = memory.size();
    let mut hasher = blake3::Hasher::new();
    let mut offset = 0;
    while offset < size {
        let len = CHUNK.min(size - offset);
        hasher.update(memory.read_bytes(offset, len)?);
        offset += len;
    }
    Ok(hasher.finalize().to_hex().to_string())
}
