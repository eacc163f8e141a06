use crate::error::{PackerError, PackerResult};

/// Configuration for a [`StoragePacker`](crate::StoragePacker).
///
/// Counts must be powers of two so bucket and shard selection reduce to
/// bit-slicing the address hash; anything else is rejected by [`validate`]
/// rather than rounded up.
///
/// [`validate`]: PackerConfig::validate
#[derive(Clone, Debug)]
pub struct PackerConfig {
    /// Number of top-level buckets. Power of two. Choose this larger than
    /// the expected concurrency level: distinct buckets never contend.
    pub bucket_count: usize,
    /// Static shards per bucket before any dynamic split. Power of two;
    /// 1 means a bucket starts as a single physical entry.
    pub bucket_shard_count: usize,
    /// Encoded-size threshold in bytes above which a shard is split.
    pub bucket_max_size: usize,
    /// Number of locks in the pool; independent of `bucket_count`.
    pub lock_pool_size: usize,
    /// Optional cap on dynamic splits beyond the static partition. `None`
    /// bounds splitting only by the hash bits left after bucket selection.
    pub max_split_depth: Option<usize>,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            bucket_count: 256,
            bucket_shard_count: 1,
            bucket_max_size: 256 * 1024,
            lock_pool_size: 64,
            max_split_depth: None,
        }
    }
}

impl PackerConfig {
    /// Check the configuration; called by `StoragePacker::new`.
    pub fn validate(&self) -> PackerResult<()> {
        if !self.bucket_count.is_power_of_two() {
            return Err(PackerError::Configuration(format!(
                "bucket_count must be a power of two, got {}",
                self.bucket_count
            )));
        }
        if !self.bucket_shard_count.is_power_of_two() {
            return Err(PackerError::Configuration(format!(
                "bucket_shard_count must be a power of two, got {}",
                self.bucket_shard_count
            )));
        }
        if self.bucket_max_size == 0 {
            return Err(PackerError::Configuration(
                "bucket_max_size must be positive".to_string(),
            ));
        }
        if self.lock_pool_size == 0 {
            return Err(PackerError::Configuration(
                "lock_pool_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `log2(bucket_count)`: leading hash bits consumed by bucket selection.
    pub fn bucket_bits(&self) -> usize {
        self.bucket_count.trailing_zeros() as usize
    }

    /// `log2(bucket_shard_count)`: leading seed bits consumed by static
    /// shard placement.
    pub fn static_bits(&self) -> usize {
        self.bucket_shard_count.trailing_zeros() as usize
    }
}
