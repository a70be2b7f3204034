//! Jump consistent hash
//!
//! A stateless alternative to [`crate::ring::HashRing`] for callers that
//! know the bucket count up front: O(1) memory, O(ln n) time, and no
//! table to maintain. It cannot be reshaped by arbitrary add/remove the
//! way the ring can — growing or shrinking the bucket count remaps keys
//! according to the algorithm's own guarantees, not ours.
//!
//! Reference: Lamping & Veach, "A Fast, Minimal Memory, Consistent Hash
//! Algorithm" (2014).

/// Map a 64-bit key hash to one of `num_buckets` buckets.
///
/// # Panics
/// Panics if `num_buckets` is zero.
#[must_use]
pub fn jump_hash(mut key: u64, num_buckets: i64) -> i64 {
    assert!(num_buckets > 0, "jump_hash requires at least one bucket");

    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < num_buckets {
        b = j;
        key = key.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(1);
        j = ((b.wrapping_add(1)) as f64 * (1i64 << 31) as f64 / (((key >> 33).wrapping_add(1)) as f64)) as i64;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let h = 0xDEAD_BEEF_CAFE_1234;
        let a = jump_hash(h, 10);
        let b = jump_hash(h, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_bucket_range() {
        for i in 0..10_000u64 {
            let b = jump_hash(i, 7);
            assert!((0..7).contains(&b));
        }
    }

    #[test]
    fn test_single_bucket_always_zero() {
        for i in 0..1000u64 {
            assert_eq!(jump_hash(i, 1), 0);
        }
    }

    #[test]
    #[should_panic]
    fn test_zero_buckets_panics() {
        jump_hash(1, 0);
    }
}
