use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use cowfs_journal::JournalError;
use cowfs_store::StoreError;
use cowfs_types::ErrorKind;
use tracing::Level;

mod cli;
mod commands;
mod config;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match commands::run_command(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            exit_code(error_kind(&err))
        }
    }
}

/// Find the first typed store/journal error in the chain.
fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<StoreError>()
            .map(StoreError::kind)
            .or_else(|| cause.downcast_ref::<JournalError>().map(JournalError::kind))
    })
}

fn exit_code(kind: Option<ErrorKind>) -> ExitCode {
    let code = match kind {
        Some(ErrorKind::InvalidArgument) => 2,
        Some(ErrorKind::IoFailure) => 3,
        Some(ErrorKind::ShortWrite) => 4,
        Some(ErrorKind::NotFound) => 5,
        Some(ErrorKind::Corruption) => 6,
        None => 1,
    };
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cowfs_types::BlockAddress;

    #[test]
    fn store_errors_are_classified_through_context() {
        let err = anyhow::Error::new(StoreError::NotFound(BlockAddress::from_digest(1)))
            .context("reading block");
        assert_eq!(error_kind(&err), Some(ErrorKind::NotFound));
    }

    #[test]
    fn journal_errors_are_classified() {
        let err = anyhow::Error::new(JournalError::TooManyParams { count: 9, max: 7 });
        assert_eq!(error_kind(&err), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn untyped_errors_have_no_kind() {
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(error_kind(&err), None);
    }
}
