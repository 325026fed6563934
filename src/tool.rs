// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and querying hopscotch table images

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use hopscotch_image::remote::{MemoryTransport, RemoteTable, Transport, WindowCache};
use hopscotch_image::trace::{pad_key, parse_trace};
use hopscotch_image::{Config, Error, Image, ImageFile, Slice, TableDescriptor};
use humansize::{format_size, BINARY};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    if tracing_log::LogTracer::init().is_err() {
        die!("INTERNAL ERROR: setting log tracer failed");
    }

    let registry = Registry::default();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("HOPIMG_LOG")
        .from_env_lossy();

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));

    (is_verbose, level_filter)
}

fn parse_size_as_u32(s: &str) -> Result<u32, String> {
    let cfg = parse_size::Config::new().with_binary();
    cfg.parse_size(s)
        .map_err(|e| e.to_string())
        .and_then(|size| u32::try_from(size).map_err(|e| e.to_string()))
}

fn parse_size_as_u64(s: &str) -> Result<u64, String> {
    let cfg = parse_size::Config::new().with_binary();
    cfg.parse_size(s).map_err(|e| e.to_string())
}

/// CLI tool for building and querying hopscotch table images
#[derive(Parser, Debug)]
#[command(name = "hopimg")]
#[command(about = "CLI tool for building and querying hopscotch table images")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Build an image file from the keys of a workload trace
    ///
    /// Every key is stored with itself as value, zero-padded to the key length.
    Build {
        /// Trace file, one `<COMMAND> <key>` per line
        trace: PathBuf,

        /// Image file to write
        image: PathBuf,

        /// Fixed key length in bytes
        #[arg(short = 'k', long, default_value_t = 24)]
        key_length: u32,

        /// Size of the value field (defaults to the key length)
        #[arg(long)]
        value_length: Option<u32>,

        /// The table starts with 2^EXPONENT buckets
        #[arg(short, long, default_value_t = 16)]
        exponent: u8,

        /// Neighborhood size (1..=32)
        #[arg(short = 'H', long, default_value_t = 32)]
        neighborhood: u8,

        /// Record alignment (e.g., "64", "4KiB")
        #[arg(short, long, default_value = "1", value_parser = parse_size_as_u32)]
        alignment: u32,

        /// Grow the table when an insert cannot find room
        #[arg(short, long, default_value_t = false)]
        grow: bool,
    },
    /// Look up a key in an image file through the remote lookup protocol
    Get {
        /// Image file
        image: PathBuf,

        /// The key to look up (zero-padded to the key length)
        key: String,
    },
    /// Show image metadata
    Info {
        /// Image file
        image: PathBuf,
    },
    /// Check the image checksum
    Verify {
        /// Image file
        image: PathBuf,
    },
    /// Look up all keys of a trace in parallel
    Bench {
        /// Image file
        image: PathBuf,

        /// Trace file, one `<COMMAND> <key>` per line
        trace: PathBuf,

        /// Number of worker threads
        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        /// Window cache capacity (e.g., "64MiB"), disabled if omitted
        #[arg(short, long, value_parser = parse_size_as_u64)]
        cache: Option<u64>,

        /// Load the image into memory instead of reading the file for every lookup
        #[arg(short = 'm', long, default_value_t = false)]
        in_memory: bool,
    },
}

fn load_keys(path: &Path, key_length: usize) -> hopscotch_image::Result<Vec<(Slice, Slice)>> {
    let file = File::open(path)?;
    let keys = parse_trace(BufReader::new(file))?;

    keys.into_iter()
        .map(|key| Ok((pad_key(&key, key_length)?, key)))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build(
    trace_path: &Path,
    image_path: &Path,
    key_length: u32,
    value_length: Option<u32>,
    exponent: u8,
    neighborhood: u8,
    alignment: u32,
    grow: bool,
) -> hopscotch_image::Result<()> {
    let entries = load_keys(trace_path, key_length as usize)?;

    let mut table = Config::new(key_length, value_length.unwrap_or(key_length))
        .exponent(exponent)
        .neighborhood(neighborhood)
        .record_alignment(alignment)
        .build()?;

    let start = Instant::now();
    let mut duplicates = 0;
    let mut rejected = 0;

    for (key, value) in entries {
        let result = if grow {
            table.insert_or_grow(key, value)
        } else {
            table.insert(key, value)
        };

        match result {
            Ok(()) => {}
            Err(Error::DuplicateKey) => duplicates += 1,
            Err(Error::CapacityExhausted | Error::ResizeFailed) => rejected += 1,
            Err(e) => return Err(e),
        }
    }

    info!("Inserted {} entries in {:?}", table.len(), start.elapsed());

    if duplicates > 0 {
        warn!("Skipped {duplicates} duplicate keys");
    }
    if rejected > 0 {
        warn!("{rejected} keys did not fit, use --grow or a larger exponent");
    }

    let image = Image::from_table(&table)?;
    image.persist(image_path)?;

    println!(
        "Wrote {} entries into 2^{} buckets (load factor {:.3}), image size {}",
        table.len(),
        table.exponent(),
        table.load_factor(),
        format_size(image.len(), BINARY),
    );

    Ok(())
}

fn print_info(file: &ImageFile) {
    let TableDescriptor {
        version,
        exponent,
        neighborhood,
        key_length,
        value_length,
        record_alignment,
        record_size,
        entry_count,
        checksum,
    } = *file.descriptor();

    println!("Path: {}", file.path().display());
    println!("Format version: {version}");
    println!("Buckets: 2^{exponent} ({})", file.descriptor().capacity());
    println!("Entries: {entry_count}");
    println!("Neighborhood: {neighborhood}");
    println!("Key length: {key_length}");
    println!("Value length: {value_length}");
    println!("Record size: {record_size} (aligned to {record_alignment})");
    println!(
        "Image size: {}",
        format_size(file.descriptor().image_len(), BINARY)
    );
    println!("Checksum: {checksum}");
}

fn get(file: &ImageFile, key: &str) -> hopscotch_image::Result<()> {
    let client = RemoteTable::connect(file, &file.handshake())?;
    let key = pad_key(key.as_bytes(), file.descriptor().key_length as usize)?;

    match client.get(&key)? {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => println!("(not found)"),
    }

    Ok(())
}

fn bench_with<T: Transport + Sync>(
    client: RemoteTable<T>,
    keys: &[Slice],
    workers: usize,
) -> hopscotch_image::Result<()> {
    let start = Instant::now();
    let stats = client.lookup_batch(keys, workers)?;
    let elapsed = start.elapsed();

    #[allow(clippy::cast_precision_loss)]
    let ops = stats.total() as f64 / elapsed.as_secs_f64();

    println!(
        "{} lookups ({} found, {} missing) with {workers} workers in {elapsed:?}, {ops:.0} ops/s",
        stats.total(),
        stats.found,
        stats.missing,
    );

    Ok(())
}

fn bench(
    file: &ImageFile,
    trace_path: &Path,
    workers: usize,
    cache: Option<u64>,
    in_memory: bool,
) -> hopscotch_image::Result<()> {
    let keys = load_keys(trace_path, file.descriptor().key_length as usize)?
        .into_iter()
        .map(|(key, _)| key)
        .collect::<Vec<_>>();

    let cache = cache.map(|bytes| Arc::new(WindowCache::with_capacity_bytes(bytes)));

    if in_memory {
        let transport = MemoryTransport::new();
        let handshake = transport.publish(&file.load()?);

        let mut client = RemoteTable::connect(&transport, &handshake)?;
        if let Some(cache) = cache {
            client = client.use_cache(cache);
        }
        bench_with(client, &keys, workers)
    } else {
        let mut client = RemoteTable::connect(file, &file.handshake())?;
        if let Some(cache) = cache {
            client = client.use_cache(cache);
        }
        bench_with(client, &keys, workers)
    }
}

fn execute_command(cmd: ToolCommand) -> hopscotch_image::Result<()> {
    match cmd {
        ToolCommand::Build {
            trace,
            image,
            key_length,
            value_length,
            exponent,
            neighborhood,
            alignment,
            grow,
        } => build(
            &trace,
            &image,
            key_length,
            value_length,
            exponent,
            neighborhood,
            alignment,
            grow,
        ),
        ToolCommand::Get { image, key } => get(&ImageFile::open(image)?, &key),
        ToolCommand::Info { image } => {
            print_info(&ImageFile::open(image)?);
            Ok(())
        }
        ToolCommand::Verify { image } => {
            ImageFile::open(image)?.verify()?;
            println!("OK");
            Ok(())
        }
        ToolCommand::Bench {
            image,
            trace,
            workers,
            cache,
            in_memory,
        } => bench(&ImageFile::open(image)?, &trace, workers, cache, in_memory),
    }
}

fn main() {
    let args = ToolArgs::parse();
    let (verbose, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = execute_command(args.command) {
        let note = if verbose {
            ""
        } else {
            ". Note: Use -v (one or multiple times) for more information"
        };
        die!("Error: {}{}", e, note);
    }
}
