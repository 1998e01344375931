//! sealgcm 派生密钥缓存
//!
//! 在 TTL 窗口内，相同 (password, salt, iterations) 的重复派生
//! 直接从内存返回，不再重新执行 KDF。
//!
//! 并发模型：
//! - 映射按指纹拆分为 [`KeyCache::SHARDS`] 个独立加锁的分片，
//!   不相关的指纹互不阻塞
//! - KDF 在不持有任何锁的情况下执行；同一指纹的两次并发未命中
//!   可能都会派生，以最后一次写入为准
//! - 所有移除操作（替换、失效、清扫、清空）都在分片写锁内把条目
//!   从槽位中取出，释放锁之后再擦除
//! - 调用方拿到的是条目的 `Arc`；被替换但仍被读者持有的条目，
//!   在该读者释放时才清零，绝不会在读者手中被擦除

mod fingerprint;
mod sweeper;

pub use fingerprint::Fingerprint;
pub use sweeper::Sweeper;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::crypto::kdf::{self, KdfHash};
use crate::crypto::secret::SecretBuffer;
use crate::error::Result;

type Shard = RwLock<HashMap<Fingerprint, Arc<CachedKey>>>;

/// 缓存持有的派生密钥
pub struct CachedKey {
    key: SecretBuffer,
    created_at: Instant,
    ttl: Duration,
}

impl CachedKey {
    pub fn key(&self) -> &[u8] {
        self.key.as_bytes()
    }

    /// 条目过期时刻（溢出时返回 None）
    pub fn expires_at(&self) -> Option<Instant> {
        self.created_at.checked_add(self.ttl)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

impl fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKey")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub replaced: u64,
    pub evicted: u64,
    pub entries: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    replaced: AtomicU64,
    evicted: AtomicU64,
}

pub struct KeyCache {
    shards: Box<[Shard]>,
    ttl: Duration,
    counters: Counters,
}

impl KeyCache {
    pub const SHARDS: usize = 16;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new(ttl: Duration) -> Self {
        let shards = (0..Self::SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            ttl,
            counters: Counters::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 返回 `fingerprint` 对应的未过期条目
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<CachedKey>> {
        let now = Instant::now();
        self.read_shard(fingerprint)
            .get(fingerprint)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    /// 命中则直接返回缓存的密钥；
    /// 否则使用 PBKDF2-HMAC-SHA256 派生并写入缓存。
    pub fn get_or_derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<Arc<CachedKey>> {
        let fingerprint = Fingerprint::compute(password, salt, iterations);

        if let Some(entry) = self.get(&fingerprint) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(?fingerprint, "key cache hit");
            return Ok(entry);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(?fingerprint, iterations, "key cache miss, deriving");

        let key = kdf::derive_key(password, salt, iterations, KdfHash::Sha256)?;
        Ok(self.install(fingerprint, key))
    }

    /// 以 `fingerprint` 为键写入 `key`，替换已有条目
    pub fn install(&self, fingerprint: Fingerprint, key: SecretBuffer) -> Arc<CachedKey> {
        let entry = Arc::new(CachedKey {
            key,
            created_at: Instant::now(),
            ttl: self.ttl,
        });

        let displaced = self
            .write_shard(&fingerprint)
            .insert(fingerprint, Arc::clone(&entry));

        if let Some(old) = displaced {
            self.counters.replaced.fetch_add(1, Ordering::Relaxed);
            trace!(?fingerprint, "replaced cached key");
            retire(old);
        }

        entry
    }

    /// 移除并擦除 `fingerprint` 对应的条目
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let removed = self.write_shard(fingerprint).remove(fingerprint);

        match removed {
            Some(entry) => {
                self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                retire(entry);
                true
            }
            None => false,
        }
    }

    /// 移除并擦除所有过期条目，返回清除数量
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();

        for shard in self.shards.iter() {
            let mut map = shard.write().unwrap_or_else(PoisonError::into_inner);
            let stale: Vec<Fingerprint> = map
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(fingerprint, _)| *fingerprint)
                .collect();

            for fingerprint in stale {
                if let Some(entry) = map.remove(&fingerprint) {
                    expired.push(entry);
                }
            }
        }

        let count = expired.len();
        expired.into_iter().for_each(retire);

        if count > 0 {
            self.counters
                .evicted
                .fetch_add(count as u64, Ordering::Relaxed);
            debug!(evicted = count, "swept expired cached keys");
        }
        count
    }

    /// 移除并擦除全部条目
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            let drained: Vec<_> = shard
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .drain()
                .map(|(_, entry)| entry)
                .collect();
            drained.into_iter().for_each(retire);
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            replaced: self.counters.replaced.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn read_shard(
        &self,
        fingerprint: &Fingerprint,
    ) -> RwLockReadGuard<'_, HashMap<Fingerprint, Arc<CachedKey>>> {
        self.shards[fingerprint.shard(Self::SHARDS)]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_shard(
        &self,
        fingerprint: &Fingerprint,
    ) -> RwLockWriteGuard<'_, HashMap<Fingerprint, Arc<CachedKey>>> {
        self.shards[fingerprint.shard(Self::SHARDS)]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl Drop for KeyCache {
    fn drop(&mut self) {
        self.clear();
    }
}

/// 擦除已经离开映射的条目。
///
/// 若仍有读者持有，则在最后一个引用释放时清零。
fn retire(entry: Arc<CachedKey>) {
    if let Ok(mut owned) = Arc::try_unwrap(entry) {
        owned.key.wipe();
    }
}
