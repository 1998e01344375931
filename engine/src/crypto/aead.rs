//! sealgcm AEAD 加解密模块
//!
//! 基于 AES-256-GCM，key 与 nonce 由调用方提供。
//!
//! 参数约束：
//! - key 必须为 32 字节，nonce 12 字节，tag 16 字节
//! - 长度不符一律返回 `InvalidArgument`，不做填充或截断
//! - 组合形式固定为 `ciphertext ‖ tag`
//!
//! 安全约束：
//! - 解密时先校验 tag，通过之前不输出任何明文
//! - 校验失败返回 `AuthenticationFailure`
//! - 同一 key 下 nonce 不得复用，由调用方负责（见 [`generate_nonce`]）
//!
//! cipher 实例（展开后的轮密钥）只在单次调用内存在，离开作用域即清零；
//! 明文、密文与 tag 的工作副本都放在 `Zeroizing` 中。

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::secret::SecretBuffer;
use crate::error::{Result, SealError};

/// AES-256 密钥长度
pub const KEY_LEN: usize = 32;

/// AES-GCM 使用的 nonce 长度（96 bit，标准推荐值）
pub const NONCE_LEN: usize = 12;

/// GCM 认证 tag 长度（128 bit）
pub const TAG_LEN: usize = 16;

/// 单次调用使用的 cipher
struct CipherHandle {
    cipher: Aes256Gcm,
}

impl CipherHandle {
    fn open(key: &[u8], nonce: &[u8]) -> Result<Self> {
        check_key_and_nonce(key, nonce)?;

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| SealError::AlgorithmUnavailable(format!("AES-256-GCM init: {e}")))?;

        Ok(Self { cipher })
    }
}

fn check_key_and_nonce(key: &[u8], nonce: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(SealError::invalid(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    if nonce.len() != NONCE_LEN {
        return Err(SealError::invalid(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    Ok(())
}

/// 从系统随机源生成全新的 nonce
pub fn generate_nonce() -> Result<SecretBuffer> {
    let mut nonce = SecretBuffer::zeroed(NONCE_LEN);
    OsRng
        .try_fill_bytes(nonce.as_mut_bytes())
        .map_err(|e| SealError::AlgorithmUnavailable(format!("OS random generator: {e}")))?;
    Ok(nonce)
}

/// 使用 AES-256-GCM 加密数据
///
/// #### 返回
/// - 密文与分离的 tag（tag 离开作用域时自动清零）
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8],
) -> Result<(Vec<u8>, Zeroizing<[u8; TAG_LEN]>)> {
    let handle = CipherHandle::open(key, nonce)?;

    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let mut tag = handle
        .cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer[..])
        .map_err(|_| SealError::AlgorithmUnavailable("AES-256-GCM encrypt failed".into()))?;

    let mut detached = Zeroizing::new([0u8; TAG_LEN]);
    detached.copy_from_slice(&tag);
    tag.as_mut_slice().zeroize();

    Ok((std::mem::take(&mut *buffer), detached))
}

/// 校验 tag 后解密
pub fn decrypt(ciphertext: &[u8], tag: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if tag.len() != TAG_LEN {
        return Err(SealError::invalid(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }
    let handle = CipherHandle::open(key, nonce)?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    handle
        .cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer[..],
            Tag::from_slice(tag),
        )
        .map_err(|_| {
            debug!(len = ciphertext.len(), "AES-GCM tag verification failed");
            SealError::AuthenticationFailure
        })?;

    Ok(std::mem::take(&mut *buffer))
}

/// 加密为 `ciphertext ‖ tag`
pub fn seal(plaintext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    let (mut combined, tag) = encrypt(plaintext, key, nonce)?;
    combined.extend_from_slice(&tag[..]);
    Ok(combined)
}

/// 解密 `ciphertext ‖ tag`
pub fn open(ciphertext_with_tag: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(SealError::invalid(format!(
            "encrypted data too short: {} bytes, need at least {TAG_LEN}",
            ciphertext_with_tag.len()
        )));
    }
    let (ciphertext, tag) = ciphertext_with_tag.split_at(ciphertext_with_tag.len() - TAG_LEN);
    decrypt(ciphertext, tag, key, nonce)
}
