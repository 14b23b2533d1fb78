//! Maps an order number to a worker shard.
//!
//! The hash is 32-bit FNV-1a. The `fnv` crate's `Hasher` always produces a 64-bit digest, so the
//! (tiny) 32-bit variant is inlined here rather than pulled in as a dependency.

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// The number of shard buckets order numbers are hashed into. Worker counts must divide this.
pub const DEFAULT_SHARD_COUNT: u32 = 256;

/// 32-bit FNV-1a hash of `number`'s UTF-8 bytes.
pub fn key_hash(number: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in number.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The shard bucket `number` belongs to, in `[0, shard_count)`.
pub fn shard(number: &str, shard_count: u32) -> u32 {
    key_hash(number) % shard_count
}

/// The half-open `[from, to)` ranges owned by `worker_count` workers sharding `shard_count`
/// buckets. `worker_count` must evenly divide `shard_count`.
pub fn worker_ranges(worker_count: u32, shard_count: u32) -> Vec<(u32, u32)> {
    assert!(worker_count > 0 && worker_count <= shard_count);
    assert_eq!(
        shard_count % worker_count,
        0,
        "worker_count must evenly divide shard_count"
    );
    let span = shard_count / worker_count;
    (0..worker_count)
        .map(|i| (i * span, (i + 1) * span))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_hash_is_stable() {
        assert_eq!(key_hash("12345678903"), key_hash("12345678903"));
    }

    #[test]
    fn key_hash_matches_reference_fnv1a_32() {
        // Reference digest for the empty string under FNV-1a 32-bit is the offset basis itself.
        assert_eq!(key_hash(""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn shard_is_within_range() {
        for number in ["12345678903", "4561261212345467", "0", "999999999999"] {
            assert!(shard(number, DEFAULT_SHARD_COUNT) < DEFAULT_SHARD_COUNT);
        }
    }

    #[test]
    fn worker_ranges_cover_the_full_space_disjointly() {
        let ranges = worker_ranges(4, DEFAULT_SHARD_COUNT);
        assert_eq!(ranges.first().unwrap().0, 0);
        assert_eq!(ranges.last().unwrap().1, DEFAULT_SHARD_COUNT);
        let mut covered = HashSet::new();
        for (from, to) in ranges {
            for bucket in from..to {
                assert!(covered.insert(bucket), "bucket {bucket} covered twice");
            }
        }
        assert_eq!(covered.len(), DEFAULT_SHARD_COUNT as usize);
    }

    #[test]
    #[should_panic(expected = "evenly divide")]
    fn worker_count_must_divide_shard_count() {
        worker_ranges(5, DEFAULT_SHARD_COUNT);
    }
}
