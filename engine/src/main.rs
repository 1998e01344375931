//! sealgcm 命令行入口
//!
//! 用法：
//!   sealgcm encrypt -i <input> -o <output>
//!   sealgcm decrypt -i <input> -o <output> [--legacy]
//!   sealgcm derive-key [--salt <base64>]
//!
//! 密码来源依次为 `-p`、环境变量 `SEALGCM_PASSWORD`、交互式输入。
//! 所有实际逻辑都委托给库中的 [`Sealer`]。

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use sealgcm::{SealConfig, Sealer};

#[derive(Debug, Parser)]
#[command(name = "sealgcm")]
#[command(version, about = "Password-based AES-256-GCM file encryption.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct KeyArgs {
    /// Password (prompted for when absent)
    #[arg(short, long, env = "SEALGCM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PBKDF2 iteration count
    #[arg(long, env = "SEALGCM_ITERATIONS")]
    iterations: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file
    #[command(arg_required_else_help = true)]
    Encrypt {
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Decrypts a file of either envelope format
    #[command(arg_required_else_help = true)]
    Decrypt {
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Skip format detection and read the legacy fixed-salt layout
        #[arg(long, default_value_t = false)]
        legacy: bool,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Derives a key and prints its cached-key token
    DeriveKey {
        /// Salt as standard base64 (random when absent)
        #[arg(long, value_name = "BASE64")]
        salt: Option<String>,

        #[command(flatten)]
        key: KeyArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 一次性进程，不启动后台清扫线程
    let sealer = Sealer::new(SealConfig::default().with_sweep_interval(None))?;

    match cli.command {
        Commands::Encrypt { input, output, key } => {
            let password = resolve_password(key.password, true)?;
            sealer
                .encrypt_file(&input, &output, &password, key.iterations)
                .with_context(|| format!("failed to encrypt {}", input.display()))?;
        }
        Commands::Decrypt {
            input,
            output,
            legacy,
            key,
        } => {
            let password = resolve_password(key.password, false)?;
            let result = if legacy {
                sealer.decrypt_legacy_file(&input, &output, &password, key.iterations)
            } else {
                sealer.decrypt_file(&input, &output, &password, key.iterations)
            };
            result.with_context(|| format!("failed to decrypt {}", input.display()))?;
        }
        Commands::DeriveKey { salt, key } => {
            let password = resolve_password(key.password, false)?;
            let salt = salt
                .map(|s| STANDARD.decode(s.trim()).map(Zeroizing::new))
                .transpose()
                .context("salt is not valid base64")?;

            let token = Zeroizing::new(sealer.derive_and_cache_key(
                &password,
                salt.as_deref().map(Vec::as_slice),
                key.iterations,
            )?);
            println!("{}", token.as_str());
        }
    }

    Ok(())
}

fn resolve_password(given: Option<String>, confirm: bool) -> Result<Zeroizing<String>> {
    if let Some(password) = given.filter(|p| !p.is_empty()) {
        return Ok(Zeroizing::new(password));
    }

    let password = Zeroizing::new(rpassword::prompt_password("Password: ")?);
    if password.is_empty() {
        bail!("No password provided");
    }

    if confirm {
        let again = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);
        if *again != *password {
            bail!("Passwords do not match");
        }
    }

    Ok(password)
}
