//! `source-info-import` - inspect and remap `.swiftsourceinfo` files.

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use regex::Regex;
use swiftsourceinfo::{
    sourceinfo::{rewrite_source_info, FilePathRemapper},
    FileBuffer, SourceInfo,
};

/// The utility to inspect and remap .swiftsourceinfo files.
///
/// Without `--remap` the decoded content is dumped to standard output. With one
/// or more `--remap` rules the file paths are rewritten and the result is
/// written to `<dst>`.
#[derive(Debug, Parser)]
#[command(name = "source-info-import", version, about, long_about = None)]
struct Cli {
    /// Input .swiftsourceinfo file, or "-" for standard input.
    #[arg(value_name = "src", default_value = "-")]
    src: String,

    /// Output file; required when --remap is given.
    #[arg(value_name = "dst", default_value = "-")]
    dst: String,

    /// Path remapping substitution, applied in order.
    #[arg(long, value_name = "regex=replacement")]
    remap: Vec<String>,

    /// Suppress the per-path remap report.
    #[arg(long)]
    quiet: bool,

    /// Enable debug output.
    #[arg(long)]
    debug: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("source-info-import: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Bitstream tracing on stderr with --debug; RUST_LOG overrides.
    let level = if cli.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_module("swiftsourceinfo", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let remapper = build_remapper(&cli.remap)?;
    if !remapper.is_empty() && cli.dst == "-" {
        bail!("The destination file is required when --remap is specified.");
    }

    let buffer = if cli.src == "-" {
        FileBuffer::from_stdin().context("failed to read standard input")?
    } else {
        FileBuffer::from_file(Path::new(&cli.src))
            .with_context(|| format!("failed to read '{}'", cli.src))?
    };

    let mut info = SourceInfo::parse(buffer.data())?;

    if remapper.is_empty() {
        // Without --remap, dump the original file content.
        return print_content(&info);
    }

    let report = info.remap_file_paths(&remapper)?;
    if !cli.quiet {
        for (old, new) in &report {
            println!("{} -> {}", display_path(old), display_path(new));
        }
    }

    let output = rewrite_source_info(&info, buffer.data())?;
    std::fs::write(&cli.dst, output).with_context(|| format!("failed to write '{}'", cli.dst))?;

    Ok(())
}

/// Parse the `--remap` arguments into an ordered rule list.
fn build_remapper(remaps: &[String]) -> anyhow::Result<FilePathRemapper> {
    let mut remapper = FilePathRemapper::new();
    for remap in remaps {
        let Some((pattern, replacement)) = remap.split_once('=') else {
            bail!("invalid --remap '{remap}', expected regex=replacement");
        };
        let pattern =
            Regex::new(pattern).with_context(|| format!("invalid --remap pattern '{pattern}'"))?;
        remapper.add_remap(pattern, replacement);
    }
    Ok(remapper)
}

fn print_content(info: &SourceInfo<'_>) -> anyhow::Result<()> {
    println!("Source Files:");
    for record in info.source_files()? {
        println!(
            "  {} ({}, {} bytes)",
            info.file_path(record.file_id)?,
            format_timestamp(record.timestamp_nanos),
            record.file_size
        );
    }

    println!("USRs:");
    if let Some(table) = info.usr_table()? {
        for entry in table.iter() {
            let (usr, index) = entry?;
            let record = info.decl_loc(index)?;
            let path = info.file_path(record.file_id)?;
            let file_name = Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!(
                "  {} ({}:{}:{})",
                usr, file_name, record.locs[0].line, record.locs[0].column
            );
        }
    }

    Ok(())
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(Empty)"
    } else {
        path
    }
}

fn format_timestamp(nanos: u64) -> String {
    let secs = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;
    match chrono::DateTime::from_timestamp(secs, subsec) {
        Some(timestamp) => timestamp.format("%Y-%m-%d %H:%M:%S%.9f UTC").to_string(),
        None => nanos.to_string(),
    }
}
