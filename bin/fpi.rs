use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fpindex::{FsDirectory, Posting, SegmentConfig, SegmentId, SegmentStore, DEFAULT_BLOCK_SIZE};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "fpi")]
#[command(about = "Fingerprint index segment tool", long_about = None)]
struct Args {
    /// Index directory
    #[arg(short, long, env = "FPI_DIR", default_value = ".")]
    directory: PathBuf,

    /// Postings per block for newly written segments
    #[arg(long, env = "FPI_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read `id|{hash,hash,...}` lines from stdin into a new segment
    Import {
        /// Segment to create (defaults to the next free id)
        #[arg(long)]
        segment: Option<u64>,
    },

    /// Merge segments into a new one
    Merge {
        /// Destination segment
        #[arg(long)]
        into: u64,

        /// Source segments
        #[arg(required = true)]
        sources: Vec<u64>,

        /// Delete the sources once the merged segment is written
        #[arg(long)]
        delete_sources: bool,
    },

    /// Print the postings of a segment
    Dump {
        #[arg(long)]
        segment: u64,

        /// Start at the first posting with a key at or above this one
        #[arg(long)]
        seek: Option<u32>,

        /// Maximum number of postings to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print a segment's block layout as JSON
    Info {
        #[arg(long)]
        segment: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = SegmentConfig::new(args.block_size)?;
    let directory = FsDirectory::new(&args.directory)
        .with_context(|| format!("cannot open index directory {:?}", args.directory))?;
    let store = SegmentStore::new(Arc::new(directory), config)?;

    debug!("fpi v{} using {:?}", fpindex::VERSION, args.directory);

    match args.command {
        Command::Import { segment } => {
            let id = match segment {
                Some(id) => SegmentId::new(id),
                None => next_segment_id(&store)?,
            };
            import(&store, id, io::stdin().lock())
        }
        Command::Merge {
            into,
            sources,
            delete_sources,
        } => {
            let sources: Vec<SegmentId> = sources.into_iter().map(SegmentId::new).collect();
            let stats = store.compact(&sources, SegmentId::new(into))?;
            if delete_sources {
                for id in &sources {
                    store.delete_segment(*id)?;
                }
                info!("Deleted {} source segments", sources.len());
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Dump {
            segment,
            seek,
            limit,
        } => dump(&store, SegmentId::new(segment), seek, limit),
        Command::Info { segment } => {
            let info = store.segment_info(SegmentId::new(segment))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}

fn next_segment_id(store: &SegmentStore) -> Result<SegmentId> {
    Ok(store
        .list_segments()?
        .last()
        .map(SegmentId::next)
        .unwrap_or(SegmentId::new(0)))
}

fn import(store: &SegmentStore, id: SegmentId, input: impl BufRead) -> Result<()> {
    if store.segment_exists(id) {
        bail!("{} already exists", id);
    }

    let mut postings = Vec::new();
    let mut lines = 0usize;
    for (number, line) in input.lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        match parse_line(&line) {
            Some((track, hashes)) => {
                postings.extend(hashes.into_iter().map(|hash| Posting::new(hash, track)));
                lines += 1;
                if lines % 1000 == 0 {
                    debug!("Imported {} lines", lines);
                }
            }
            None => warn!(line = number + 1, "Invalid line, skipping"),
        }
    }

    postings.sort_unstable();
    postings.dedup();

    let info = store.write_segment(id, postings)?;
    info!(
        segment = %id,
        lines,
        blocks = info.blocks,
        data_bytes = info.data_bytes,
        "Import finished"
    );
    Ok(())
}

/// Parse `id|{h1,h2,...}`. Hashes may be written signed; they are stored
/// by their 32-bit pattern.
fn parse_line(line: &str) -> Option<(u32, Vec<u32>)> {
    let (id, rest) = line.trim().split_once('|')?;
    let id = id.trim().parse::<u32>().ok()?;
    let body = rest.trim().strip_prefix('{')?.strip_suffix('}')?;
    if body.trim().is_empty() {
        return Some((id, Vec::new()));
    }

    let hashes = body
        .split(',')
        .map(|field| {
            let value = field.trim().parse::<i64>().ok()?;
            u32::try_from(value)
                .ok()
                .or_else(|| i32::try_from(value).ok().map(|v| v as u32))
        })
        .collect::<Option<Vec<u32>>>()?;
    Some((id, hashes))
}

fn dump(
    store: &SegmentStore,
    id: SegmentId,
    seek: Option<u32>,
    limit: Option<usize>,
) -> Result<()> {
    let mut cursor = store.open_segment(id)?;
    if let Some(key) = seek {
        if !cursor.seek(key)? {
            return Ok(());
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0usize;
    while limit.map_or(true, |limit| printed < limit) && cursor.next()? {
        writeln!(out, "{}\t{}", cursor.key(), cursor.value())?;
        printed += 1;
    }
    out.flush()?;
    Ok(())
}
