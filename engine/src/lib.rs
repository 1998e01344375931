//! sealgcm：基于密码的 AES-256-GCM 加密，带过期密钥缓存
//!
//! 本模块的自由函数都作用于一个惰性创建、使用默认配置的进程级 [`Sealer`]。
//! 需要独立缓存或非默认参数时，请自行创建 [`Sealer`]。

mod decrypt;
mod encrypt;

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod format;
pub mod fs;
pub mod sealer;

pub use cache::{CacheStats, CachedKey, Fingerprint, KeyCache, Sweeper};
pub use config::SealConfig;
pub use crypto::{KdfHash, SecretBuffer};
pub use error::{ErrorKind, Result, SealError};
pub use format::{CachedKeyToken, EnvelopeFormat};
pub use sealer::{
    Sealer, decrypt_bytes, decrypt_text_with_key, encrypt_bytes, encrypt_text_with_key,
};

use std::path::Path;

use once_cell::sync::Lazy;
use tracing::warn;

static DEFAULT_SEALER: Lazy<Sealer> = Lazy::new(|| {
    let config = SealConfig::default();
    match Sealer::new(config.clone()) {
        Ok(sealer) => sealer,
        Err(err) => {
            warn!(error = %err, "starting without background key sweeper");
            Sealer::without_sweeper(config)
        }
    }
});

/// 自由函数背后的进程级 sealer
pub fn default_sealer() -> &'static Sealer {
    &DEFAULT_SEALER
}

pub fn derive_and_cache_key(
    password: &str,
    salt: Option<&[u8]>,
    iterations: Option<u32>,
) -> Result<String> {
    default_sealer().derive_and_cache_key(password, salt, iterations)
}

pub fn encrypt_with_cached_key(plaintext: &[u8], token: &str) -> Result<Vec<u8>> {
    default_sealer().encrypt_with_cached_key(plaintext, token)
}

pub fn decrypt_with_cached_key(data: &[u8], token: &str) -> Result<Vec<u8>> {
    default_sealer().decrypt_with_cached_key(data, token)
}

pub fn encrypt_with_password(
    plaintext: &[u8],
    password: &str,
    salt: Option<&[u8]>,
    iterations: Option<u32>,
) -> Result<Vec<u8>> {
    default_sealer().encrypt_with_password(plaintext, password, salt, iterations)
}

pub fn decrypt_with_password(
    data: &[u8],
    password: &str,
    iterations: Option<u32>,
) -> Result<Vec<u8>> {
    default_sealer().decrypt_with_password(data, password, iterations)
}

pub fn decrypt_legacy(data: &[u8], password: &str, iterations: Option<u32>) -> Result<Vec<u8>> {
    default_sealer().decrypt_legacy(data, password, iterations)
}

pub fn encrypt_text_with_password(
    text: &str,
    password: &str,
    salt: Option<&[u8]>,
    iterations: Option<u32>,
) -> Result<String> {
    default_sealer().encrypt_text_with_password(text, password, salt, iterations)
}

pub fn decrypt_text_with_password(
    encoded: &str,
    password: &str,
    iterations: Option<u32>,
) -> Result<String> {
    default_sealer().decrypt_text_with_password(encoded, password, iterations)
}

/// 将 `input` 文件加密为当前格式信封，写入 `output`
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    encrypt::encrypt_file(default_sealer(), input, output, password, iterations)
}

/// 解密任一格式的信封文件
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    decrypt::decrypt_file(default_sealer(), input, output, password, iterations)
}

/// 按旧格式解密文件
pub fn decrypt_legacy_file(
    input: &Path,
    output: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    decrypt::decrypt_legacy_file(default_sealer(), input, output, password, iterations)
}
