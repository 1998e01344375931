//! sealgcm 文件加密流程
//!
//! 加密流程（严格顺序）：
//! 1. 将整个输入读入会自动清零的缓冲区
//! 2. 使用密码派生的密钥加密
//! 3. 原子写出信封
//!
//! 注意：
//! - 信封完整生成之后才会替换输出文件

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::Result;
use crate::fs::atomic::write_atomic;
use crate::sealer::Sealer;

pub(crate) fn encrypt_file(
    sealer: &Sealer,
    input_path: &Path,
    output_path: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    let plaintext = Zeroizing::new(fs::read(input_path)?);

    let envelope = sealer.encrypt_with_password(&plaintext, password, None, iterations)?;
    write_atomic(output_path, |file| file.write_all(&envelope))?;

    debug!(
        plaintext_len = plaintext.len(),
        envelope_len = envelope.len(),
        "encrypted file"
    );
    Ok(())
}
