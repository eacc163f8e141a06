//! Deterministic item-to-shard addressing.
//!
//! Every item id is hashed once with BLAKE3. The leading `log2(bucket_count)`
//! bits select the bucket; the rest become the [`ShardPathSeed`], consumed
//! bit by bit as the bucket's shards split. The same id always resolves to
//! the same bucket and, at a fixed depth, the same shard path -- which is
//! what lets reads and deletes locate an item without a separate index.

/// Total bits in a BLAKE3 digest.
const HASH_BITS: usize = 256;

/// Maps item identifiers to bucket indices and shard path seeds.
#[derive(Clone, Debug)]
pub struct AddressResolver {
    bucket_bits: usize,
}

impl AddressResolver {
    /// Resolver for `bucket_count` buckets. The count must be a power of
    /// two; `PackerConfig::validate` enforces this upstream.
    pub fn new(bucket_count: usize) -> Self {
        Self {
            bucket_bits: bucket_count.trailing_zeros() as usize,
        }
    }

    /// Resolve an item id to its bucket and shard path seed. Pure.
    pub fn resolve(&self, item_id: &str) -> ItemAddress {
        let hash = *blake3::hash(item_id.as_bytes()).as_bytes();
        let bucket = (0..self.bucket_bits)
            .fold(0usize, |acc, i| (acc << 1) | usize::from(hash_bit(&hash, i)));
        ItemAddress {
            bucket,
            seed: ShardPathSeed {
                hash,
                offset: self.bucket_bits,
            },
        }
    }

    /// Leading hash bits consumed by bucket selection.
    pub fn bucket_bits(&self) -> usize {
        self.bucket_bits
    }

    /// Seed bits left after bucket selection; the hard ceiling on shard
    /// path length.
    pub fn seed_bits(&self) -> usize {
        HASH_BITS - self.bucket_bits
    }
}

/// A resolved item address: the bucket plus the seed for shard placement.
#[derive(Clone, Debug)]
pub struct ItemAddress {
    /// Top-level bucket index in `[0, bucket_count)`.
    pub bucket: usize,
    /// Remaining hash bits for shard placement within the bucket.
    pub seed: ShardPathSeed,
}

/// The hash bits remaining after bucket selection.
///
/// At depth `d` with `2^s` static shards, an item's active shard path is the
/// first `s + d` seed bits, MSB-first.
#[derive(Clone)]
pub struct ShardPathSeed {
    hash: [u8; 32],
    offset: usize,
}

impl ShardPathSeed {
    /// Seed bit at `index`.
    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < self.available_bits());
        hash_bit(&self.hash, self.offset + index)
    }

    /// The first `len` seed bits rendered as a `0`/`1` bitstring.
    pub fn prefix(&self, len: usize) -> String {
        debug_assert!(len <= self.available_bits());
        (0..len).map(|i| if self.bit(i) { '1' } else { '0' }).collect()
    }

    /// Bits this seed can still supply.
    pub fn available_bits(&self) -> usize {
        HASH_BITS - self.offset
    }
}

impl std::fmt::Debug for ShardPathSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardPathSeed")
            .field("offset", &self.offset)
            .field("hash", &hex::encode(self.hash))
            .finish()
    }
}

/// Bit `index` of the digest, MSB-first within each byte.
fn hash_bit(hash: &[u8; 32], index: usize) -> bool {
    (hash[index / 8] >> (7 - (index % 8))) & 1 == 1
}
