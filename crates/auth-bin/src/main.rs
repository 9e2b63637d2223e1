//! Offline migration tooling for `Authgate` user records.
//!
//! `authgate backup` snapshots user records before a bulk credential
//! migration; `authgate restore` reverses it. Backups are encrypted
//! and password digests are excluded unless explicitly requested.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use authgate_common::UserRecord;
use authgate_lib::backup::{
    create_backup, decode_key, load_backup, restore_backup, save_backup, BackupOptions,
};

#[derive(Parser)]
#[command(name = "authgate", about = "Authgate credential migration tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a backup of user records
    Backup {
        /// JSON file containing an array of user records
        #[arg(long)]
        input: PathBuf,
        /// Where to write the backup
        #[arg(long)]
        output: PathBuf,
        /// Skip encryption (not recommended)
        #[arg(long)]
        plaintext: bool,
        /// Keep password digests in the backup
        #[arg(long)]
        include_secrets: bool,
        /// Base64 encryption key; generated when absent
        #[arg(long)]
        key: Option<String>,
    },
    /// Restore user snapshots from a backup
    Restore {
        /// Backup file to read
        #[arg(long)]
        input: PathBuf,
        /// Where to write the decoded snapshots as JSON
        #[arg(long)]
        output: PathBuf,
        /// Base64 decryption key for encrypted backups
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Backup {
            input,
            output,
            plaintext,
            include_secrets,
            key,
        } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let records: Vec<UserRecord> =
                serde_json::from_slice(&bytes).context("input is not a user record array")?;

            let options = BackupOptions {
                encrypt: !plaintext,
                include_secrets,
                key: key.as_deref().map(decode_key).transpose()?,
            };

            let handle = create_backup(&records, &options)?;
            save_backup(&output, &handle.backup)?;

            println!(
                "backed up {} records to {}",
                handle.backup.metadata.record_count,
                output.display()
            );
            if let Some(generated) = handle.generated_key {
                println!("encryption key (shown once, not retained; store it safely):");
                println!("{generated}");
            }
        },
        Command::Restore { input, output, key } => {
            let backup = load_backup(&input)?;

            if backup.metadata.encrypted && key.is_none() {
                bail!("this backup is encrypted; pass --key");
            }
            let key = key.as_deref().map(decode_key).transpose()?;

            let snapshots = restore_backup(&backup, key.as_ref())?;
            std::fs::write(&output, serde_json::to_vec_pretty(&snapshots)?)
                .with_context(|| format!("failed to write {}", output.display()))?;

            println!("restored {} records to {}", snapshots.len(), output.display());
        },
    }

    Ok(())
}
