//! Frame checksums: the low 32 bits of a 64-bit XXH3 digest (`spec.md` §4.D).

use xxhash_rust::xxh3::xxh3_64;

/// Compute the 32-bit frame checksum of `data` (low 32 bits of XXH3-64).
pub fn checksum32(data: &[u8]) -> u32 {
    (xxh3_64(data) & 0xffff_ffff) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(checksum32(b"hello world"), checksum32(b"hello world"));
    }

    #[test]
    fn checksum_detects_single_bit_flip() {
        let mut data = b"hello world hello world".to_vec();
        let before = checksum32(&data);
        data[0] ^= 0x01;
        let after = checksum32(&data);
        assert_ne!(before, after);
    }
}
