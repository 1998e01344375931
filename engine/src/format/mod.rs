//! 线上格式：密文信封与缓存密钥 token

pub mod envelope;
pub mod token;

pub use envelope::{DecodedEnvelope, EnvelopeFormat, decode_auto, encode_current};
pub use token::CachedKeyToken;
