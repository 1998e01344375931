//! 缓存密钥 token
//!
//! 由 `derive_and_cache_key` 交给调用方，
//! 之后的加解密调用可以跳过 KDF。
//!
//! token 中的 salt 长度必须落在当前格式的识别窗口 [8, 64] 内。
//!
//! ```text
//! base64( salt_len (u32 LE) | salt (salt_len) | key (32) )
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use zeroize::Zeroizing;

use crate::crypto::KEY_LEN;
use crate::crypto::secret::SecretBuffer;
use crate::error::{Result, SealError};

use super::envelope::{MAX_DETECTED_SALT_LEN, MIN_DETECTED_SALT_LEN, SALT_LEN_FIELD};

pub struct CachedKeyToken {
    salt_len: u32,
    salt: SecretBuffer,
    key: SecretBuffer,
}

impl CachedKeyToken {
    pub fn new(salt: &[u8], key: &[u8]) -> Result<Self> {
        if !(MIN_DETECTED_SALT_LEN..=MAX_DETECTED_SALT_LEN).contains(&salt.len()) {
            return Err(SealError::invalid(format!(
                "token salt must be {MIN_DETECTED_SALT_LEN} to {MAX_DETECTED_SALT_LEN} bytes, got {}",
                salt.len()
            )));
        }
        if key.len() != KEY_LEN {
            return Err(SealError::invalid(format!(
                "token key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let salt_len = u32::try_from(salt.len())
            .map_err(|_| SealError::invalid("token salt too long"))?;

        Ok(Self {
            salt_len,
            salt: SecretBuffer::from_slice(salt),
            key: SecretBuffer::from_slice(key),
        })
    }

    pub fn salt(&self) -> &[u8] {
        self.salt.as_bytes()
    }

    pub fn key(&self) -> &[u8] {
        self.key.as_bytes()
    }

    pub fn encode(&self) -> String {
        let mut raw = Zeroizing::new(Vec::with_capacity(
            SALT_LEN_FIELD + self.salt.len() + self.key.len(),
        ));
        raw.extend_from_slice(&self.salt_len.to_le_bytes());
        raw.extend_from_slice(self.salt.as_bytes());
        raw.extend_from_slice(self.key.as_bytes());

        STANDARD.encode(raw.as_slice())
    }

    pub fn decode(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(SealError::invalid("cached key token cannot be empty"));
        }

        let raw = Zeroizing::new(
            STANDARD
                .decode(token.trim())
                .map_err(|_| SealError::invalid("cached key token is not valid base64"))?,
        );

        let prefix: [u8; SALT_LEN_FIELD] = raw
            .get(..SALT_LEN_FIELD)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| SealError::invalid("invalid cached key format"))?;
        let salt_len = u32::from_le_bytes(prefix) as usize;

        let expected = SALT_LEN_FIELD
            .checked_add(salt_len)
            .and_then(|len| len.checked_add(KEY_LEN));
        if salt_len == 0 || expected != Some(raw.len()) {
            return Err(SealError::invalid("invalid cached key format"));
        }

        let (salt, key) = raw[SALT_LEN_FIELD..].split_at(salt_len);
        Self::new(salt, key)
    }
}

impl fmt::Debug for CachedKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKeyToken")
            .field("salt_len", &self.salt.len())
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn token_layout() {
        let token = CachedKeyToken::new(&[1u8; 16], &[2u8; KEY_LEN]).unwrap();
        let raw = STANDARD.decode(token.encode()).unwrap();

        assert_eq!(raw.len(), 4 + 16 + KEY_LEN);
        assert_eq!(&raw[..4], &16u32.to_le_bytes());

        let parsed = CachedKeyToken::decode(&token.encode()).unwrap();
        assert_eq!(parsed.salt(), &[1u8; 16]);
        assert_eq!(parsed.key(), &[2u8; KEY_LEN]);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let mut zero_salt = 0u32.to_le_bytes().to_vec();
        zero_salt.extend_from_slice(&[0u8; KEY_LEN]);

        let mut short_key = 16u32.to_le_bytes().to_vec();
        short_key.extend_from_slice(&[0u8; 16 + KEY_LEN - 1]);

        let mut trailing = 16u32.to_le_bytes().to_vec();
        trailing.extend_from_slice(&[0u8; 16 + KEY_LEN + 1]);

        let cases = [
            String::new(),
            "not base64!".to_string(),
            STANDARD.encode([1u8, 2]),
            STANDARD.encode(&zero_salt),
            STANDARD.encode(&short_key),
            STANDARD.encode(&trailing),
        ];

        for case in cases {
            let err = CachedKeyToken::decode(&case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{case:?}");
        }
    }

    #[test]
    fn salt_outside_current_window_is_rejected() {
        for len in [4, 7, 65] {
            let err = CachedKeyToken::new(&vec![9u8; len], &[0u8; KEY_LEN]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "salt len {len}");

            let mut raw = (len as u32).to_le_bytes().to_vec();
            raw.extend_from_slice(&vec![9u8; len]);
            raw.extend_from_slice(&[0u8; KEY_LEN]);
            let err = CachedKeyToken::decode(&STANDARD.encode(&raw)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "decoded salt len {len}");
        }

        assert!(CachedKeyToken::new(&[9u8; 8], &[0u8; KEY_LEN]).is_ok());
        assert!(CachedKeyToken::new(&[9u8; 64], &[0u8; KEY_LEN]).is_ok());
    }

    #[test]
    fn debug_hides_key() {
        let token = CachedKeyToken::new(&[1u8; 16], &[0xAB; KEY_LEN]).unwrap();
        let shown = format!("{token:?}");

        assert!(!shown.contains("171"));
        assert!(shown.contains("REDACTED"));
    }
}
