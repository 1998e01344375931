//! sealgcm 密码学原语
//!
//! 包含敏感数据缓冲区、PBKDF2 密钥派生以及 AES-256-GCM 引擎。

pub mod aead;
pub mod kdf;
pub mod secret;

pub use aead::{NONCE_LEN, TAG_LEN};
pub use kdf::{KEY_LEN, KdfHash};
pub use secret::SecretBuffer;
