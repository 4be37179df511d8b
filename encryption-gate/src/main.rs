use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use encryption_gate::mock::MemoryStorage;
use encryption_gate::storage::S3Storage;
use encryption_gate::{EncryptionGate, GateConfig, Notification};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enforce SSE-KMS on a raw bucket notification and promote objects to staging
#[derive(Parser, Debug)]
#[command(name = "encryption-gate")]
#[command(version, about, long_about = None)]
struct Args {
    /// S3 notification JSON; read from stdin when omitted
    event_file: Option<PathBuf>,

    /// Run against an in-memory store seeded with compliant objects
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    // 설정 누락은 이벤트를 읽기 전에 종료
    let config = GateConfig::from_env().context("invalid gate configuration")?;
    info!(
        raw = %config.raw_bucket,
        staging = %config.staging_bucket,
        curated = %config.curated_bucket,
        "encryption gate configured"
    );

    let raw = read_event(args.event_file.as_deref()).await?;
    let event: serde_json::Value =
        serde_json::from_str(&raw).context("event is not valid JSON")?;

    let gate = if args.mock {
        let store = Arc::new(MemoryStorage::new());
        if let Ok(notification) = Notification::from_value(&event) {
            store.seed_compliant(&notification, config.policy.key_arn());
        }
        EncryptionGate::new(config, store.clone(), store)
    } else {
        let storage = Arc::new(S3Storage::new(&config).await);
        EncryptionGate::new(config, storage.clone(), storage)
    };

    match gate.handle(&event).await {
        Ok(resp) => {
            println!("{}", serde_json::to_string(&resp)?);
            Ok(())
        }
        Err(e) => {
            error!(kind = ?e.kind(), "invocation failed: {e:#}");
            Err(e.into())
        }
    }
}

async fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("failed to read event file {}", p.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read event from stdin")?;
            Ok(buf)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_args_default_to_stdin() {
        let args = Args::try_parse_from(["encryption-gate"]).unwrap();
        assert!(args.event_file.is_none());
        assert!(!args.mock);
    }

    #[test]
    fn test_args_file_and_mock() {
        let args = Args::try_parse_from(["encryption-gate", "event.json", "--mock"]).unwrap();
        assert_eq!(args.event_file.as_deref(), Some(Path::new("event.json")));
        assert!(args.mock);
    }

    #[test]
    fn test_help_flags_print_usage() {
        for flag in ["-h", "--help"] {
            let err = Args::try_parse_from(["encryption-gate", flag]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn test_args_reject_unknown() {
        assert!(Args::try_parse_from(["encryption-gate", "--verbose"]).is_err());
        assert!(Args::try_parse_from(["encryption-gate", "a.json", "b.json"]).is_err());
    }
}
