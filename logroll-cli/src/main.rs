//! CLI for the logroll rotating log sink.
//!
//! Provides commands for piping stdin into a sink and for inspecting,
//! reading and pruning the segments a sink leaves on disk.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use logroll::namer::SegmentNamer;
use logroll::{
    CompressionMode, LogSink, NamingScheme, PendingArchives, RetentionManager, SinkConfig,
    open_segment,
};
use tracing_subscriber::EnvFilter;

/// logroll — Size-rotating log sink with compression and retention.
#[derive(Parser)]
#[command(name = "logroll", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Copy stdin into a rotating sink, one line per write.
    Pipe {
        /// Path of the active log file.
        base_path: PathBuf,

        /// Maximum active file size before rotation (e.g., "512K", "10M").
        #[arg(long, default_value = "10M")]
        max_size: String,

        /// Number of retired segments to keep (0 keeps all).
        #[arg(long, default_value = "0")]
        max_backups: usize,

        /// How retired segments are compressed.
        #[arg(long, default_value = "disabled")]
        compress: CompressArg,

        /// Naming scheme for retired segments.
        #[arg(long, default_value = "sequence")]
        naming: NamingArg,

        /// Fsync the active file after every line.
        #[arg(long)]
        sync: bool,

        /// JSON sink configuration. Overrides the other options when given.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List retired segments and the active file.
    List {
        /// Path of the active log file.
        base_path: PathBuf,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Write segment contents to stdout, oldest first, decompressing as needed.
    Cat {
        /// Path of the active log file.
        base_path: PathBuf,

        /// Only print the segment with this sequence number.
        #[arg(long)]
        seq: Option<u64>,
    },

    /// Delete all but the most recent retired segments.
    Prune {
        /// Path of the active log file.
        base_path: PathBuf,

        /// Number of retired segments to keep.
        #[arg(long)]
        max_backups: usize,
    },
}

/// Output format for segment listings.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable table.
    Text,
    /// JSON document.
    Json,
}

/// Compression mode argument.
#[derive(Clone, Copy, ValueEnum)]
enum CompressArg {
    /// Keep segments uncompressed.
    Disabled,
    /// Compress on the rotation path.
    Inline,
    /// Compress on a background thread.
    Background,
}

impl From<CompressArg> for CompressionMode {
    fn from(arg: CompressArg) -> Self {
        match arg {
            CompressArg::Disabled => Self::Disabled,
            CompressArg::Inline => Self::Inline,
            CompressArg::Background => Self::Background,
        }
    }
}

/// Naming scheme argument.
#[derive(Clone, Copy, ValueEnum)]
enum NamingArg {
    /// `{base}.{seq}`
    Sequence,
    /// `{base}.{seq}-{unix_seconds}`
    SequenceTimestamp,
}

impl From<NamingArg> for NamingScheme {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Sequence => Self::Sequence,
            NamingArg::SequenceTimestamp => Self::SequenceTimestamp,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pipe {
            base_path,
            max_size,
            max_backups,
            compress,
            naming,
            sync,
            config,
        } => {
            let config = match config {
                Some(path) => SinkConfig::load(path).map_err(Into::into),
                None => parse_size(&max_size).map(|max_size| {
                    SinkConfig::new(base_path, max_size)
                        .with_max_backups(max_backups)
                        .with_compression(compress.into())
                        .with_naming(naming.into())
                        .with_sync_on_write(sync)
                }),
            };
            config.and_then(cmd_pipe)
        }
        Commands::List { base_path, format } => cmd_list(&base_path, &format),
        Commands::Cat { base_path, seq } => cmd_cat(&base_path, seq),
        Commands::Prune {
            base_path,
            max_backups,
        } => cmd_prune(&base_path, max_backups),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `logroll pipe`.
fn cmd_pipe(config: SinkConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sink = LogSink::open(config)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = Vec::new();

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        sink.write(&line)?;
    }

    sink.close()?;
    let stats = sink.stats();
    tracing::info!(
        rotations = stats.rotations,
        bytes = stats.bytes_written,
        pruned = stats.pruned,
        "stdin drained"
    );
    Ok(())
}

/// Implements `logroll list`.
fn cmd_list(base_path: &PathBuf, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let namer = SegmentNamer::new(base_path, NamingScheme::default());
    let segments = namer.scan(&PendingArchives::new())?;
    let active_size = match std::fs::metadata(base_path) {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Text => {
            println!("Active: {}", base_path.display());
            match active_size {
                Some(size) => println!("  Size: {}", format_bytes(size)),
                None => println!("  Size: (missing)"),
            }
            println!();
            println!("Segments: {}", segments.len());
            for segment in &segments {
                let name = segment
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!(
                    "  {:>6}  {:>10}  {:<15}  {name}",
                    segment.seq,
                    format_bytes(segment.size),
                    format!("{:?}", segment.state),
                );
            }
            let total: u64 = segments.iter().map(|s| s.size).sum();
            println!();
            println!("Total segment size: {}", format_bytes(total));
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "active": {
                    "path": base_path,
                    "size": active_size,
                },
                "segments": segments,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `logroll cat`.
fn cmd_cat(base_path: &PathBuf, seq: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let namer = SegmentNamer::new(base_path, NamingScheme::default());
    let segments = namer.scan(&PendingArchives::new())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(seq) = seq {
        let segment = segments
            .iter()
            .find(|s| s.seq == seq)
            .ok_or_else(|| format!("Segment {seq} not found"))?;
        io::copy(&mut open_segment(segment)?, &mut out)?;
        out.flush()?;
        return Ok(());
    }

    for segment in &segments {
        io::copy(&mut open_segment(segment)?, &mut out)?;
    }
    match std::fs::File::open(base_path) {
        Ok(mut active) => {
            io::copy(&mut active, &mut out)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    out.flush()?;
    Ok(())
}

/// Implements `logroll prune`.
fn cmd_prune(base_path: &PathBuf, max_backups: usize) -> Result<(), Box<dyn std::error::Error>> {
    if max_backups == 0 {
        return Err("--max-backups must be at least 1".into());
    }

    let namer = SegmentNamer::new(base_path, NamingScheme::default());
    let retention = RetentionManager::new(namer, max_backups, PendingArchives::new());
    let report = retention.enforce();

    for segment in &report.pruned {
        println!("Deleted {}", segment.path.display());
    }
    println!(
        "Pruned {} segment(s), {} retained",
        report.pruned_count(),
        report.retained
    );

    if report.errors.len() > 1 {
        eprintln!("{} failures, reporting the first", report.errors.len());
    }
    report.into_result()?;
    Ok(())
}

/// Parses a human-readable size string (e.g., "4096", "512K", "10M", "1G") to bytes.
fn parse_size(s: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty size string".into());
    }

    let (num_str, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'K' | b'k' => (&s[..s.len() - 1], 1024),
        b'M' | b'm' => (&s[..s.len() - 1], 1024 * 1024),
        b'G' | b'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'0'..=b'9' => (s, 1),
        _ => return Err(format!("Unknown size unit in '{s}'. Use K, M, or G.").into()),
    };

    let num: u64 = num_str.trim().parse()?;
    let bytes = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Size '{s}' overflows"))?;
    if bytes == 0 {
        return Err("Size must be greater than zero".into());
    }
    Ok(bytes)
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
