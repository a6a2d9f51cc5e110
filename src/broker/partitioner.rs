//! Key-hash partitioner
//!
//! Same murmur2 variant and seed as the Java client's default partitioner,
//! so keyed records land on the partition other Kafka producers would pick.

const SEED: u32 = 0x9747_b28c;
const M: u32 = 0x5bd1_e995;
const R: u32 = 24;

/// 32-bit murmur2 hash of `data`
pub fn murmur2(data: &[u8]) -> i32 {
    let len = data.len();
    let mut h: u32 = SEED ^ (len as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() == 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;

    h as i32
}

/// Partition index for `key` among `partitions`
///
/// # Panics
/// Panics if `partitions` is zero.
#[inline]
pub fn partition_for(key: &[u8], partitions: usize) -> usize {
    (murmur2(key) & 0x7fff_ffff) as usize % partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur2_java_compatibility() {
        assert_eq!(murmur2(b"21"), -973_932_308);
        assert_eq!(murmur2(b"foobar"), -790_332_482);
        assert_eq!(murmur2(b"abc"), 479_470_107);
    }

    #[test]
    fn test_partition_in_range() {
        for n in 1..16 {
            for key in [&b"a"[..], b"key-1", b"0123456789abcdef", b""] {
                assert!(partition_for(key, n) < n);
            }
        }
    }

    #[test]
    fn test_same_key_same_partition() {
        let key = b"0123456789abcdef";
        let first = partition_for(key, 12);
        for _ in 0..100 {
            assert_eq!(partition_for(key, 12), first);
        }
    }
}
