//! sealgcm 二进制信封编解码
//!
//! 线上存在两种布局，只会写出当前格式。
//!
//! ```text
//! current: salt_len (u32 LE) | salt (salt_len) | nonce (12) | ciphertext | tag (16)
//! legacy:  salt (16)                           | nonce (12) | ciphertext | tag (16)
//! ```
//!
//! 旧格式密钥使用 PBKDF2-HMAC-SHA1 派生；当前格式使用 PBKDF2-HMAC-SHA256。
//!
//! 格式识别是启发式的：
//! - 将前 4 字节按小端读为长度 `L`
//! - 若 `8 <= L <= 64` 且总长度足以容纳该 salt 的当前格式信封，按当前格式处理
//! - 否则按旧格式处理
//!
//! 已知局限：
//! - salt 恰好以上述取值开头的旧格式数据会被误判，并在认证时失败
//! - 该窗口必须保持不变，以保证已有的旧数据仍可读取
//!
//! 解码从不修改输入；取出的每个字段都是新的副本，drop 时自动清零。

use tracing::trace;

use crate::crypto::kdf::KdfHash;
use crate::crypto::secret::SecretBuffer;
use crate::crypto::{NONCE_LEN, TAG_LEN};
use crate::error::{Result, SealError};

/// 小端 salt 长度前缀的字节数
pub const SALT_LEN_FIELD: usize = 4;

/// 旧格式固定的 salt 长度
pub const LEGACY_SALT_LEN: usize = 16;

/// 识别为当前格式的最小 salt 长度
pub const MIN_DETECTED_SALT_LEN: usize = 8;

/// 识别为当前格式的最大 salt 长度
pub const MAX_DETECTED_SALT_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    Current,
    Legacy,
}

impl EnvelopeFormat {
    /// 该格式派生密钥所用的 PRF
    pub fn kdf_hash(self) -> KdfHash {
        match self {
            Self::Current => KdfHash::Sha256,
            Self::Legacy => KdfHash::Sha1,
        }
    }
}

/// 从信封中取出的各字段
#[derive(Debug)]
pub struct DecodedEnvelope {
    pub salt: SecretBuffer,
    pub nonce: SecretBuffer,
    pub ciphertext_with_tag: SecretBuffer,
    pub format: EnvelopeFormat,
}

/// 序列化当前格式信封
pub fn encode_current(salt: &[u8], nonce: &[u8], ciphertext_with_tag: &[u8]) -> Result<Vec<u8>> {
    if salt.is_empty() {
        return Err(SealError::invalid("salt cannot be empty"));
    }
    let salt_len = u32::try_from(salt.len())
        .map_err(|_| SealError::invalid("salt too long for envelope header"))?;
    if nonce.len() != NONCE_LEN {
        return Err(SealError::invalid(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(SealError::invalid("ciphertext is missing its tag"));
    }

    let mut out =
        Vec::with_capacity(SALT_LEN_FIELD + salt.len() + NONCE_LEN + ciphertext_with_tag.len());
    out.extend_from_slice(&salt_len.to_le_bytes());
    out.extend_from_slice(salt);
    out.extend_from_slice(nonce);
    out.extend_from_slice(ciphertext_with_tag);

    Ok(out)
}

/// 判断 `data` 属于当前格式还是旧格式
pub fn detect(data: &[u8]) -> EnvelopeFormat {
    match declared_salt_len(data) {
        Some(len)
            if (MIN_DETECTED_SALT_LEN..=MAX_DETECTED_SALT_LEN).contains(&len)
                && data.len() >= SALT_LEN_FIELD + len + NONCE_LEN + TAG_LEN =>
        {
            EnvelopeFormat::Current
        }
        _ => EnvelopeFormat::Legacy,
    }
}

/// 识别 `data` 的布局并解码
pub fn decode_auto(data: &[u8]) -> Result<DecodedEnvelope> {
    let format = detect(data);
    trace!(?format, len = data.len(), "detected envelope format");

    match format {
        EnvelopeFormat::Current => decode_current(data),
        EnvelopeFormat::Legacy => decode_legacy(data),
    }
}

/// 按当前格式解码 `data`（接受任意非零 salt 长度）
pub fn decode_current(data: &[u8]) -> Result<DecodedEnvelope> {
    if data.len() < SALT_LEN_FIELD + NONCE_LEN + TAG_LEN {
        return Err(SealError::format(format!(
            "encrypted data too short: {} bytes",
            data.len()
        )));
    }

    let salt_len = declared_salt_len(data).unwrap_or(0);
    let salt_end = SALT_LEN_FIELD.checked_add(salt_len).filter(|end| {
        salt_len > 0
            && end
                .checked_add(NONCE_LEN + TAG_LEN)
                .is_some_and(|minimum| data.len() >= minimum)
    });

    let Some(salt_end) = salt_end else {
        return Err(SealError::format(format!(
            "invalid salt length {salt_len} for {} byte envelope",
            data.len()
        )));
    };

    Ok(split_fields(data, SALT_LEN_FIELD, salt_end, EnvelopeFormat::Current))
}

/// 按旧格式（固定 16 字节 salt）解码 `data`
pub fn decode_legacy(data: &[u8]) -> Result<DecodedEnvelope> {
    if data.len() < LEGACY_SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(SealError::format(format!(
            "encrypted data too short for legacy format: {} bytes",
            data.len()
        )));
    }

    Ok(split_fields(data, 0, LEGACY_SALT_LEN, EnvelopeFormat::Legacy))
}

fn declared_salt_len(data: &[u8]) -> Option<usize> {
    let prefix: [u8; SALT_LEN_FIELD] = data.get(..SALT_LEN_FIELD)?.try_into().ok()?;
    usize::try_from(u32::from_le_bytes(prefix)).ok()
}

// 调用方已确认 `data` 足以容纳 salt、nonce 与 tag
fn split_fields(
    data: &[u8],
    salt_start: usize,
    salt_end: usize,
    format: EnvelopeFormat,
) -> DecodedEnvelope {
    let nonce_end = salt_end + NONCE_LEN;

    DecodedEnvelope {
        salt: SecretBuffer::from_slice(&data[salt_start..salt_end]),
        nonce: SecretBuffer::from_slice(&data[salt_end..nonce_end]),
        ciphertext_with_tag: SecretBuffer::from_slice(&data[nonce_end..]),
        format,
    }
}
