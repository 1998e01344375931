//! (password, salt, iterations) 三元组的缓存查找键

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256(`len(password) ‖ password ‖ len(salt) ‖ salt ‖ iterations`)
///
/// 长度为 u64 LE，iterations 为 u32 LE。
/// 长度前缀保证 ("ab", "c..") 与 ("a", "bc..") 不会得到同一指纹。
///
/// 仅作为内存中的映射键使用，不落盘，也不会放进 token。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(password: &[u8], salt: &[u8], iterations: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((password.len() as u64).to_le_bytes());
        hasher.update(password);
        hasher.update((salt.len() as u64).to_le_bytes());
        hasher.update(salt);
        hasher.update(iterations.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub(crate) fn shard(&self, shards: usize) -> usize {
        self.0[0] as usize % shards
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}
