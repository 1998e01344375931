//! [`Sealer`](crate::Sealer) 的运行参数

use std::time::Duration;

use crate::cache::{KeyCache, Sweeper};
use crate::crypto::kdf::{DEFAULT_ITERATIONS, DEFAULT_SALT_LEN, LEGACY_ITERATIONS};
use crate::error::{Result, SealError};
use crate::format::envelope::{MAX_DETECTED_SALT_LEN, MIN_DETECTED_SALT_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealConfig {
    /// 调用方未指定时，密码操作使用的 PBKDF2 迭代次数
    pub iterations: u32,
    /// 独立旧格式解密使用的 PBKDF2 迭代次数
    pub legacy_iterations: u32,
    /// 调用方未提供 salt 时生成的长度
    pub salt_len: usize,
    pub cache_ttl: Duration,
    /// `None` 表示不启动后台清扫线程，仍可手动调用 `sweep()`
    pub sweep_interval: Option<Duration>,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            legacy_iterations: LEGACY_ITERATIONS,
            salt_len: DEFAULT_SALT_LEN,
            cache_ttl: KeyCache::DEFAULT_TTL,
            sweep_interval: Some(Sweeper::DEFAULT_INTERVAL),
        }
    }
}

impl SealConfig {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_legacy_iterations(mut self, iterations: u32) -> Self {
        self.legacy_iterations = iterations;
        self
    }

    pub fn with_salt_len(mut self, salt_len: usize) -> Self {
        self.salt_len = salt_len;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 || self.legacy_iterations == 0 {
            return Err(SealError::invalid("iterations must be greater than zero"));
        }
        if !(MIN_DETECTED_SALT_LEN..=MAX_DETECTED_SALT_LEN).contains(&self.salt_len) {
            return Err(SealError::invalid(format!(
                "generated salt length must be within {MIN_DETECTED_SALT_LEN}..={MAX_DETECTED_SALT_LEN}"
            )));
        }
        if self.cache_ttl.is_zero() {
            return Err(SealError::invalid("cache TTL must be greater than zero"));
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(SealError::invalid("sweep interval must be greater than zero"));
        }
        Ok(())
    }
}
