//! 敏感数据缓冲区
//!
//! 本 crate 计算或复制的 key、nonce、salt 与 tag，
//! 在所属操作期间都放在 [`SecretBuffer`]（或 `Zeroizing`）中。
//!
//! - 任何退出路径上，缓冲区 drop 时都会清零
//! - 提前用完时可调用 `wipe()` 立即清零
//! - `Debug` 不输出内容

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    /// 接管 `bytes` 的所有权，不复制
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// 将 `bytes` 复制到新缓冲区
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// 长度为 `len` 的全零缓冲区，供原地写入
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 全部字节清零并清空缓冲区
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl AsRef<[u8]> for SecretBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer([REDACTED; {}])", self.bytes.len())
    }
}
