//! sealgcm 文件解密流程
//!
//! 解密流程（严格顺序）：
//! 1. 读取整个输入文件
//! 2. 解析信封并完成认证解密
//! 3. 原子写出明文
//!
//! 注意：
//! - 认证通过之前不会写任何数据
//! - 密码错误或数据被篡改时，输出路径保持原样

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::Result;
use crate::fs::atomic::write_atomic;
use crate::sealer::Sealer;

pub(crate) fn decrypt_file(
    sealer: &Sealer,
    input_path: &Path,
    output_path: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    let data = fs::read(input_path)?;
    let plaintext = Zeroizing::new(sealer.decrypt_with_password(&data, password, iterations)?);

    write_plaintext(output_path, &plaintext)
}

pub(crate) fn decrypt_legacy_file(
    sealer: &Sealer,
    input_path: &Path,
    output_path: &Path,
    password: &str,
    iterations: Option<u32>,
) -> Result<()> {
    let data = fs::read(input_path)?;
    let plaintext = Zeroizing::new(sealer.decrypt_legacy(&data, password, iterations)?);

    write_plaintext(output_path, &plaintext)
}

fn write_plaintext(output_path: &Path, plaintext: &[u8]) -> Result<()> {
    write_atomic(output_path, |file| file.write_all(plaintext))?;
    debug!(plaintext_len = plaintext.len(), "decrypted file");
    Ok(())
}
