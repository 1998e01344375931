//! sealgcm 密码加解密入口
//!
//! 每个操作都是一条无状态的短流水线，[`Sealer`] 唯一的状态是密钥缓存。
//!
//! 加密流程（严格顺序）：
//! 1. 校验输入
//! 2. 取得或派生密钥
//! 3. 生成全新的 nonce
//! 4. AES-256-GCM 加密
//! 5. 编码为当前格式信封
//!
//! 解密流程（严格顺序）：
//! 1. 校验输入
//! 2. 解析信封并识别格式
//! 3. 取得或派生密钥（当前格式用 SHA-256，旧格式用 SHA-1）
//! 4. AES-256-GCM 解密
//!
//! 注意：
//! - 中间数据（key、nonce、salt、密文副本）离开作用域即清零，提前返回同样如此
//! - 不做任何重试，失败即终止本次调用

use std::path::Path;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::cache::{KeyCache, Sweeper};
use crate::config::SealConfig;
use crate::crypto::aead;
use crate::crypto::kdf::{self, KdfHash};
use crate::crypto::secret::SecretBuffer;
use crate::error::{Result, SealError};
use crate::format::envelope::{self, MAX_DETECTED_SALT_LEN, MIN_DETECTED_SALT_LEN};
use crate::format::token::CachedKeyToken;

#[derive(Debug)]
pub struct Sealer {
    config: SealConfig,
    cache: Arc<KeyCache>,
    sweeper: Option<Sweeper>,
}

impl Sealer {
    /// 创建独立的密钥缓存；按配置启动后台清扫线程
    pub fn new(config: SealConfig) -> Result<Self> {
        config.validate()?;

        let mut sealer = Self::without_sweeper(config);
        if let Some(interval) = sealer.config.sweep_interval {
            sealer.sweeper = Some(Sweeper::spawn(&sealer.cache, interval)?);
        }
        Ok(sealer)
    }

    pub(crate) fn without_sweeper(config: SealConfig) -> Self {
        let cache = Arc::new(KeyCache::new(config.cache_ttl));
        Self {
            config,
            cache,
            sweeper: None,
        }
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    /// 派生（或从缓存取得）密钥，返回携带 salt 与 key 的 token
    pub fn derive_and_cache_key(
        &self,
        password: &str,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<String> {
        check_password(password)?;
        let iterations = self.iterations(iterations)?;
        let salt = self.resolve_salt(salt)?;

        let entry = self
            .cache
            .get_or_derive(password.as_bytes(), salt.as_bytes(), iterations)?;

        let token = CachedKeyToken::new(salt.as_bytes(), entry.key())?;
        Ok(token.encode())
    }

    /// 使用 [`derive_and_cache_key`](Self::derive_and_cache_key) 返回的 token 加密
    pub fn encrypt_with_cached_key(&self, plaintext: &[u8], token: &str) -> Result<Vec<u8>> {
        let token = CachedKeyToken::decode(token)?;
        let nonce = aead::generate_nonce()?;

        let sealed = Zeroizing::new(aead::seal(plaintext, token.key(), nonce.as_bytes())?);
        envelope::encode_current(token.salt(), nonce.as_bytes(), &sealed)
    }

    /// 使用 token 中的密钥解密当前格式信封
    ///
    /// 信封中的 salt 必须与 token 中的 salt 一致，否则返回 `SaltMismatch`。
    pub fn decrypt_with_cached_key(&self, data: &[u8], token: &str) -> Result<Vec<u8>> {
        let token = CachedKeyToken::decode(token)?;
        let decoded = envelope::decode_current(data)?;

        if decoded.salt.as_bytes() != token.salt() {
            debug!("cached key salt does not match envelope salt");
            return Err(SealError::SaltMismatch);
        }

        aead::open(
            decoded.ciphertext_with_tag.as_bytes(),
            token.key(),
            decoded.nonce.as_bytes(),
        )
    }

    /// 使用密码加密数据，返回当前格式信封
    pub fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &str,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<Vec<u8>> {
        check_password(password)?;
        let iterations = self.iterations(iterations)?;
        let salt = self.resolve_salt(salt)?;

        let key = kdf::derive_key(
            password.as_bytes(),
            salt.as_bytes(),
            iterations,
            KdfHash::Sha256,
        )?;
        let nonce = aead::generate_nonce()?;

        let sealed = Zeroizing::new(aead::seal(plaintext, key.as_bytes(), nonce.as_bytes())?);
        envelope::encode_current(salt.as_bytes(), nonce.as_bytes(), &sealed)
    }

    /// 使用密码解密任一格式的信封，KDF 哈希由识别出的格式决定
    pub fn decrypt_with_password(
        &self,
        data: &[u8],
        password: &str,
        iterations: Option<u32>,
    ) -> Result<Vec<u8>> {
        check_password(password)?;
        let iterations = self.iterations(iterations)?;

        let decoded = envelope::decode_auto(data)?;
        let key = kdf::derive_key(
            password.as_bytes(),
            decoded.salt.as_bytes(),
            iterations,
            decoded.format.kdf_hash(),
        )?;

        aead::open(
            decoded.ciphertext_with_tag.as_bytes(),
            key.as_bytes(),
            decoded.nonce.as_bytes(),
        )
    }

    /// 跳过格式识别，按旧格式解密
    ///
    /// 默认使用旧格式的迭代次数。
    pub fn decrypt_legacy(
        &self,
        data: &[u8],
        password: &str,
        iterations: Option<u32>,
    ) -> Result<Vec<u8>> {
        check_password(password)?;
        let iterations = check_iterations(iterations.unwrap_or(self.config.legacy_iterations))?;

        let decoded = envelope::decode_legacy(data)?;
        let key = kdf::derive_key(
            password.as_bytes(),
            decoded.salt.as_bytes(),
            iterations,
            KdfHash::Sha1,
        )?;

        aead::open(
            decoded.ciphertext_with_tag.as_bytes(),
            key.as_bytes(),
            decoded.nonce.as_bytes(),
        )
    }

    /// 输入 UTF-8 文本，输出 base64 信封
    pub fn encrypt_text_with_password(
        &self,
        text: &str,
        password: &str,
        salt: Option<&[u8]>,
        iterations: Option<u32>,
    ) -> Result<String> {
        let envelope = self.encrypt_with_password(text.as_bytes(), password, salt, iterations)?;
        Ok(STANDARD.encode(envelope))
    }

    /// 输入 base64 信封，输出 UTF-8 文本
    pub fn decrypt_text_with_password(
        &self,
        encoded: &str,
        password: &str,
        iterations: Option<u32>,
    ) -> Result<String> {
        if encoded.is_empty() {
            return Err(SealError::invalid("encrypted data cannot be empty"));
        }
        let data = decode_base64(encoded, "encrypted data")?;
        let plaintext = self.decrypt_with_password(&data, password, iterations)?;
        into_utf8(plaintext)
    }

    fn iterations(&self, requested: Option<u32>) -> Result<u32> {
        check_iterations(requested.unwrap_or(self.config.iterations))
    }

    fn resolve_salt(&self, salt: Option<&[u8]>) -> Result<SecretBuffer> {
        match salt {
            Some(salt) => {
                check_salt(salt)?;
                Ok(SecretBuffer::from_slice(salt))
            }
            None => kdf::generate_salt(self.config.salt_len),
        }
    }
}

impl Sealer {
    /// [`Sealer::encrypt_with_password`] 的文件版本
    pub fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        iterations: Option<u32>,
    ) -> Result<()> {
        crate::encrypt::encrypt_file(self, input, output, password, iterations)
    }

    /// [`Sealer::decrypt_with_password`] 的文件版本
    pub fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        iterations: Option<u32>,
    ) -> Result<()> {
        crate::decrypt::decrypt_file(self, input, output, password, iterations)
    }

    /// [`Sealer::decrypt_legacy`] 的文件版本
    pub fn decrypt_legacy_file(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        iterations: Option<u32>,
    ) -> Result<()> {
        crate::decrypt::decrypt_legacy_file(self, input, output, password, iterations)
    }
}

/// 使用调用方提供的 key 与 nonce 做 AES-256-GCM 加密，返回 `ciphertext ‖ tag`
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    aead::seal(plaintext, key, nonce)
}

/// [`encrypt_bytes`] 的逆操作
pub fn decrypt_bytes(ciphertext_with_tag: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    aead::open(ciphertext_with_tag, key, nonce)
}

/// 文本版 [`encrypt_bytes`]：key、nonce 与输出均为 base64
pub fn encrypt_text_with_key(text: &str, key_b64: &str, nonce_b64: &str) -> Result<String> {
    let key = decode_base64(key_b64, "key")?;
    let nonce = decode_base64(nonce_b64, "nonce")?;

    let sealed = aead::seal(text.as_bytes(), &key, &nonce)?;
    Ok(STANDARD.encode(sealed))
}

/// [`encrypt_text_with_key`] 的逆操作
pub fn decrypt_text_with_key(encoded: &str, key_b64: &str, nonce_b64: &str) -> Result<String> {
    if encoded.is_empty() {
        return Err(SealError::invalid("encrypted data cannot be empty"));
    }
    let ciphertext = decode_base64(encoded, "encrypted data")?;
    let key = decode_base64(key_b64, "key")?;
    let nonce = decode_base64(nonce_b64, "nonce")?;

    let plaintext = aead::open(&ciphertext, &key, &nonce)?;
    into_utf8(plaintext)
}

fn check_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(SealError::invalid("password cannot be empty"));
    }
    Ok(())
}

fn check_iterations(iterations: u32) -> Result<u32> {
    if iterations == 0 {
        return Err(SealError::invalid("iterations must be greater than zero"));
    }
    Ok(iterations)
}

// 识别窗口之外的 salt 会产生被误判为旧格式的信封
fn check_salt(salt: &[u8]) -> Result<()> {
    if !(MIN_DETECTED_SALT_LEN..=MAX_DETECTED_SALT_LEN).contains(&salt.len()) {
        return Err(SealError::invalid(format!(
            "salt must be {MIN_DETECTED_SALT_LEN} to {MAX_DETECTED_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }
    Ok(())
}

fn decode_base64(encoded: &str, what: &str) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(encoded.trim())
        .map(Zeroizing::new)
        .map_err(|_| SealError::invalid(format!("{what} is not valid base64")))
}

fn into_utf8(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext).map_err(|e| {
        e.into_bytes().zeroize();
        SealError::format("decrypted data is not valid UTF-8")
    })
}
