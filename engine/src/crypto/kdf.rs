//! sealgcm 密码派生模块（PBKDF2-HMAC）
//!
//! 将用户密码派生为固定长度的 AES-256 密钥。
//!
//! 安全约束：
//! - 新数据一律使用 HMAC-SHA256
//! - HMAC-SHA1 仅用于读取旧格式信封，严禁用于新输出
//! - 默认迭代次数属于线上格式的一部分，不可更改

use hmac::Hmac;
use rand::{RngCore, rngs::OsRng};
use sha1::Sha1;
use sha2::Sha256;

use crate::crypto::secret::SecretBuffer;
use crate::error::{Result, SealError};

/// 派生密钥长度（256 bit）
pub const KEY_LEN: usize = crate::crypto::aead::KEY_LEN;

/// 调用方未提供 salt 时生成的默认长度
pub const DEFAULT_SALT_LEN: usize = 16;

/// 密码信封操作的默认迭代次数
pub const DEFAULT_ITERATIONS: u32 = 2000;

/// 独立旧格式解密的默认迭代次数
pub const LEGACY_ITERATIONS: u32 = 10_000;

/// PBKDF2 内部使用的 PRF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
    /// 仅用于旧格式信封
    Sha1,
}

/// 从系统随机源生成 `len` 字节的 salt
pub fn generate_salt(len: usize) -> Result<SecretBuffer> {
    let mut salt = SecretBuffer::zeroed(len);
    OsRng
        .try_fill_bytes(salt.as_mut_bytes())
        .map_err(|e| SealError::AlgorithmUnavailable(format!("OS random generator: {e}")))?;
    Ok(salt)
}

/// 派生 [`KEY_LEN`] 字节的密钥
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    hash: KdfHash,
) -> Result<SecretBuffer> {
    derive(password, salt, iterations, KEY_LEN, hash)
}

/// 使用 PBKDF2 从密码派生 `key_len` 字节
///
/// #### 错误
/// - `InvalidArgument`：密码或 salt 为空、迭代次数为 0、输出长度为 0
/// - `AlgorithmUnavailable`：PRF 无法初始化
pub fn derive(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
    hash: KdfHash,
) -> Result<SecretBuffer> {
    if password.is_empty() {
        return Err(SealError::invalid("password cannot be empty"));
    }
    if salt.is_empty() {
        return Err(SealError::invalid("salt cannot be empty"));
    }
    if iterations == 0 {
        return Err(SealError::invalid("iterations must be greater than zero"));
    }
    if key_len == 0 {
        return Err(SealError::invalid("key length must be greater than zero"));
    }

    let mut key = SecretBuffer::zeroed(key_len);

    let derived = match hash {
        KdfHash::Sha256 => {
            pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, key.as_mut_bytes())
        }
        KdfHash::Sha1 => {
            pbkdf2::pbkdf2::<Hmac<Sha1>>(password, salt, iterations, key.as_mut_bytes())
        }
    };

    // 出错时 `key` 随 drop 清零
    derived.map_err(|e| SealError::AlgorithmUnavailable(format!("PBKDF2 ({hash:?}): {e}")))?;

    Ok(key)
}
