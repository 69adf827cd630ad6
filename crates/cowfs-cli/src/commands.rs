use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use colored::Colorize;
use cowfs_journal::{JournalLog, LogEntry, LOG_ENTRY_SIZE, LOG_NEW_FILE};
use cowfs_store::{AttributeRecord, BlockRepository, BlockStore, WriteDisposition, WriteOutcome};
use cowfs_types::{BlockAddress, SyncMode};
use serde::Serialize;
use tracing::info;

use crate::cli::*;
use crate::config::{LayerConfig, CONFIG_FILE};

/// Journal action: a layer was created. Params: `[block_size]`.
pub const ACTION_MKFS: u64 = 1;
/// Journal action: a file was stored. Params: `[written, deduplicated, elided]`.
pub const ACTION_PUT: u64 = 2;
/// Journal action: the journal was truncated. Params: `[cutoff_secs, discarded]`.
pub const ACTION_TRUNCATE: u64 = 3;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let format = cli.format;
    match cli.command {
        Command::Mkfs(args) => cmd_mkfs(args).map(|_| ExitCode::SUCCESS),
        Command::Fsck(args) => cmd_fsck(args, format),
        Command::Put(args) => cmd_put(args, format).map(|_| ExitCode::SUCCESS),
        Command::Attr(args) => match args.action {
            AttrAction::Get { root, address } => cmd_attr_get(&root, address, format),
            AttrAction::Set(args) => cmd_attr_set(args),
        }
        .map(|_| ExitCode::SUCCESS),
        Command::Log(args) => match args.action {
            LogAction::Recent { root, limit } => cmd_log_recent(&root, limit, format),
            LogAction::Append { root, action, params } => cmd_log_append(&root, action, &params),
            LogAction::Truncate { root, before } => cmd_log_truncate(&root, before),
        }
        .map(|_| ExitCode::SUCCESS),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_mkfs(args: MkfsArgs) -> anyhow::Result<()> {
    if args.root.join(CONFIG_FILE).exists() {
        bail!("{} is already a cowfs layer", args.root.display());
    }
    fs::create_dir_all(&args.root)
        .with_context(|| format!("creating {}", args.root.display()))?;

    let config = LayerConfig {
        block_size: args.block_size,
        sync_mode: if args.sync { SyncMode::EveryWrite } else { SyncMode::OsDefault },
        ..LayerConfig::default()
    };
    let store = config.open_store(&args.root)?;
    let journal = config.open_journal(&args.root)?;
    config.save(&args.root)?;
    journal.append(ACTION_MKFS, &[config.block_size])?;

    info!(root = %args.root.display(), block_size = config.block_size, "layer created");
    println!("{} Created layer in {}", "✓".green().bold(), args.root.display().to_string().bold());
    println!("  Block size: {}", config.block_size);
    println!("  Zero pointer: {}", store.zero_pointer().to_string().cyan());
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct FsckReport {
    blocks_checked: usize,
    attributes_checked: usize,
    journal_entries: u64,
    findings: Vec<String>,
}

fn check_layer(root: &Path) -> anyhow::Result<FsckReport> {
    let config = LayerConfig::load(root)?;
    let store = config.open_store(root)?;
    let journal = config.open_journal(root)?;
    let mut report = FsckReport::default();

    let blocks = store.addresses()?;
    for address in &blocks {
        if let Err(e) = store.verify(address) {
            report.findings.push(e.to_string());
        }
    }
    report.blocks_checked = blocks.len();

    let attributes = store.attribute_addresses()?;
    for address in &attributes {
        if let Err(e) = store.get_attribute(address) {
            report.findings.push(e.to_string());
        }
        if blocks.binary_search(address).is_err() && *address != store.zero_pointer() {
            report.findings.push(format!("attribute record {address} has no block"));
        }
    }
    report.attributes_checked = attributes.len();

    if journal.log_dir().join(LOG_NEW_FILE).exists() {
        report
            .findings
            .push(format!("interrupted truncation left {LOG_NEW_FILE} behind"));
    }
    let log_path = journal.log_path();
    if log_path.exists() {
        let len = fs::metadata(&log_path)?.len();
        if len % LOG_ENTRY_SIZE as u64 != 0 {
            report.findings.push(format!(
                "journal ends with a partial record ({} stray bytes)",
                len % LOG_ENTRY_SIZE as u64
            ));
        }
    }
    report.journal_entries = journal.len()?;

    Ok(report)
}

fn cmd_fsck(args: FsckArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let report = check_layer(&args.root)?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            for finding in &report.findings {
                println!("  {} {finding}", "✗".red());
            }
            println!(
                "Checked {} blocks, {} attribute records, {} journal entries",
                report.blocks_checked, report.attributes_checked, report.journal_entries
            );
            if report.findings.is_empty() {
                println!("{} No issues.", "✓".green().bold());
            } else {
                println!("{} {} issue(s) found.", "✗".red().bold(), report.findings.len());
            }
        }
    }
    Ok(if report.findings.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Split `data` into block-sized chunks, zero-padding the last one.
fn store_chunks(store: &impl BlockRepository, data: &[u8]) -> anyhow::Result<Vec<WriteOutcome>> {
    let block_size = usize::try_from(store.block_size()).context("block size exceeds address space")?;
    let mut outcomes = Vec::with_capacity(data.len().div_ceil(block_size));
    for chunk in data.chunks(block_size) {
        let outcome = if chunk.len() == block_size {
            store.write(chunk)?
        } else {
            let mut padded = chunk.to_vec();
            padded.resize(block_size, 0);
            store.write(&padded)?
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn cmd_put(args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = LayerConfig::load(&args.root)?;
    let store = config.open_store(&args.root)?;
    let journal = config.open_journal(&args.root)?;

    let data = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let outcomes = store_chunks(&store, &data)?;

    let count = |d: WriteDisposition| outcomes.iter().filter(|o| o.disposition == d).count() as u64;
    let (written, deduplicated, elided) = (
        count(WriteDisposition::Written),
        count(WriteDisposition::Deduplicated),
        count(WriteDisposition::ZeroElided),
    );
    journal.append(ACTION_PUT, &[written, deduplicated, elided])?;

    match format {
        OutputFormat::Json => print_json(&outcomes)?,
        OutputFormat::Text => {
            for outcome in &outcomes {
                let tag = match outcome.disposition {
                    WriteDisposition::Written => "new".green(),
                    WriteDisposition::Deduplicated => "dup".yellow(),
                    WriteDisposition::ZeroElided => "zero".dimmed(),
                };
                println!("{} {}", outcome.address, tag);
            }
            println!(
                "{} {} blocks: {written} written, {deduplicated} deduplicated, {elided} elided",
                "✓".green().bold(),
                outcomes.len()
            );
        }
    }
    Ok(())
}

fn open_store(root: &Path) -> anyhow::Result<BlockStore> {
    LayerConfig::load(root)?.open_store(root)
}

fn cmd_attr_get(root: &Path, address: BlockAddress, format: OutputFormat) -> anyhow::Result<()> {
    let record = open_store(root)?.get_attribute(&address)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!("Block {}", address.to_string().yellow().bold());
            println!("  Type: {}", record.block_type.to_string().cyan());
            println!("  Compressed: {}", record.is_compressed);
            println!("  Frozen: {}", record.is_frozen);
            println!("  Newly allocated (no COW): {}", record.newly_allocated_no_cow);
            println!("  Refresh count: {}", record.refresh_count);
            println!("  Inode links: {}", record.inode_link_count);
        }
    }
    Ok(())
}

fn cmd_attr_set(args: AttrSetArgs) -> anyhow::Result<()> {
    let record = AttributeRecord {
        is_compressed: args.compressed,
        is_frozen: args.frozen,
        newly_allocated_no_cow: args.no_cow,
        block_type: args.block_type.into(),
        refresh_count: args.refresh_count,
        inode_link_count: args.link_count,
    };
    open_store(&args.root)?.set_attribute(&args.address, &record)?;
    println!("{} Updated attributes of {}", "✓".green(), args.address.to_string().yellow());
    Ok(())
}

fn open_journal(root: &Path) -> anyhow::Result<JournalLog> {
    LayerConfig::load(root)?.open_journal(root)
}

fn print_entry(entry: &LogEntry) {
    let params: Vec<String> = entry.params.iter().map(u64::to_string).collect();
    println!(
        "{}  action {}  [{}]",
        entry.timestamp.to_string().dimmed(),
        entry.action.to_string().bold(),
        params.join(", ")
    );
}

fn cmd_log_recent(root: &Path, limit: i64, format: OutputFormat) -> anyhow::Result<()> {
    let entries = open_journal(root)?.recent(limit)?;
    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Text if entries.is_empty() => println!("Journal is empty."),
        OutputFormat::Text => entries.iter().for_each(print_entry),
    }
    Ok(())
}

fn cmd_log_append(root: &Path, action: u64, params: &[u64]) -> anyhow::Result<()> {
    let entry = open_journal(root)?.append(action, params)?;
    print_entry(&entry);
    Ok(())
}

fn cmd_log_truncate(root: &Path, before: u64) -> anyhow::Result<()> {
    let journal = open_journal(root)?;
    let report = journal.truncate(before)?;
    journal.append(ACTION_TRUNCATE, &[before, report.discarded])?;
    println!(
        "{} Journal truncated: {} discarded, {} retained",
        "✓".green().bold(),
        report.discarded,
        report.retained
    );
    Ok(())
}
