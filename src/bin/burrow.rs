//! # burrow Driver
//!
//! Binary entry point exercising the index end to end against a scratch
//! file.
//!
//! ## Usage
//!
//! ```bash
//! # Run the correctness suite (exit code 0 iff every check passes)
//! burrow
//!
//! # Run the performance suite instead
//! burrow --benchmark
//! ```

use std::path::PathBuf;
use std::time::Instant;

use burrow::{BPlusTree, DATA_SIZE, SENTINEL_KEY};
use eyre::{bail, Result, WrapErr};
use rand::Rng;
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let args: Vec<String> = std::env::args().collect();

    let mut benchmark = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(true);
            }
            "--version" | "-v" => {
                println!("burrow {}", env!("CARGO_PKG_VERSION"));
                return Ok(true);
            }
            "--benchmark" => {
                benchmark = true;
            }
            other => bail!("unknown option: {}", other),
        }
    }

    info!("burrow index driver");
    info!(
        "page size: 4096 bytes, leaf capacity: 39 entries, interior capacity: 509 keys"
    );

    if benchmark {
        run_benchmark()?;
        Ok(true)
    } else {
        run_correctness()
    }
}

fn print_usage() {
    println!("Usage: burrow [--benchmark]");
    println!();
    println!("  (no flags)    run the correctness suite; exit 0 iff all checks pass");
    println!("  --benchmark   run the performance suite against a scratch index");
    println!("  --version     print version");
    println!("  --help        print this help");
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(name)
}

/// Canonical payload for `key`: bytes 0..4 hold the key little-endian, byte
/// i >= 4 holds (key + i) mod 256.
fn canonical(key: i32) -> [u8; DATA_SIZE] {
    let mut buf = [0u8; DATA_SIZE];
    buf[..4].copy_from_slice(&key.to_le_bytes());
    for (i, byte) in buf.iter_mut().enumerate().skip(4) {
        *byte = (key as i64 + i as i64).rem_euclid(256) as u8;
    }
    buf
}

fn verify(payload: &[u8], key: i32) -> bool {
    payload == canonical(key)
}

struct Outcome {
    all_passed: bool,
}

impl Outcome {
    fn new() -> Self {
        Self { all_passed: true }
    }

    fn check(&mut self, passed: bool, what: &str) {
        if passed {
            info!("PASS: {what}");
        } else {
            error!("FAIL: {what}");
            self.all_passed = false;
        }
    }
}

fn run_correctness() -> Result<bool> {
    let path = scratch_path("burrow-test.idx");
    let _ = std::fs::remove_file(&path);

    let mut outcome = Outcome::new();

    {
        let mut tree = BPlusTree::open(&path).wrap_err("could not open scratch index")?;
        test_basic_operations(&mut tree, &mut outcome)?;
        test_sentinel_key(&tree, &mut outcome)?;
        tree.close()?;
    }

    // fresh file for the bulk phases
    std::fs::remove_file(&path).wrap_err("could not remove scratch index")?;
    {
        let mut tree = BPlusTree::open(&path)?;
        test_bulk_insert(&mut tree, &mut outcome, 10_000)?;
        test_random_reads(&tree, &mut outcome, 1_000, 10_000)?;
        test_range_query(&tree, &mut outcome)?;
        tree.close()?;
    }

    test_persistence(&path, &mut outcome)?;

    let _ = std::fs::remove_file(&path);

    if outcome.all_passed {
        info!("all tests PASSED");
    } else {
        error!("some tests FAILED");
    }
    Ok(outcome.all_passed)
}

fn test_basic_operations(tree: &mut BPlusTree, outcome: &mut Outcome) -> Result<()> {
    info!("--- basic operations ---");

    let data = canonical(42);
    outcome.check(tree.write_data(42, &data).is_ok(), "insert key 42");

    let read = tree.read_data(42)?;
    outcome.check(
        read.is_some_and(|p| verify(p, 42)),
        "read back key 42",
    );

    let mut updated = data;
    updated[50] = 0xFF;
    outcome.check(tree.write_data(42, &updated).is_ok(), "update key 42");
    outcome.check(
        tree.read_data(42)?.is_some_and(|p| p[50] == 0xFF),
        "verify update of key 42",
    );
    outcome.check(
        tree.record_count()? == 1,
        "update did not change record count",
    );

    outcome.check(tree.delete_data(42)?, "delete key 42");
    outcome.check(
        tree.read_data(42)?.is_none(),
        "key 42 absent after delete",
    );

    Ok(())
}

fn test_sentinel_key(tree: &BPlusTree, outcome: &mut Outcome) -> Result<()> {
    info!("--- reserved key ({SENTINEL_KEY}) ---");

    match tree.read_data(SENTINEL_KEY)? {
        Some(payload) => outcome.check(
            payload[0] == 42,
            "read_data(-5432) returns a payload with byte 0 == 42",
        ),
        None => outcome.check(false, "read_data(-5432) returned a payload"),
    }

    Ok(())
}

fn test_bulk_insert(tree: &mut BPlusTree, outcome: &mut Outcome, count: i32) -> Result<()> {
    info!("--- bulk insert ({count} records) ---");

    let start = Instant::now();
    for key in 0..count {
        tree.write_data(key, &canonical(key))
            .wrap_err_with(|| format!("insert failed at key {key}"))?;
    }
    let elapsed = start.elapsed();

    let ops_per_sec = count as f64 / elapsed.as_secs_f64();
    info!(
        "inserted {count} records in {}ms ({ops_per_sec:.0} ops/sec)",
        elapsed.as_millis()
    );

    outcome.check(tree.record_count()? == count as u32, "record count matches");
    Ok(())
}

fn test_random_reads(tree: &BPlusTree, outcome: &mut Outcome, count: u32, max_key: i32) -> Result<()> {
    info!("--- random reads ({count} reads) ---");

    let mut rng = rand::thread_rng();
    let start = Instant::now();

    let mut found = 0u32;
    for _ in 0..count {
        let key = rng.gen_range(0..max_key);
        if tree.read_data(key)?.is_some_and(|p| verify(p, key)) {
            found += 1;
        }
    }

    let elapsed = start.elapsed();
    let ops_per_sec = count as f64 / elapsed.as_secs_f64();
    info!(
        "{found}/{count} reads verified in {}ms ({ops_per_sec:.0} ops/sec)",
        elapsed.as_millis()
    );

    outcome.check(found == count, "every sampled read returned its payload");
    Ok(())
}

fn test_range_query(tree: &BPlusTree, outcome: &mut Outcome) -> Result<()> {
    info!("--- range query [100, 500] ---");

    let start = Instant::now();
    let results = tree.read_range_data(100, 500)?;
    let elapsed = start.elapsed();

    info!(
        "range query returned {} results in {}us",
        results.len(),
        elapsed.as_micros()
    );

    outcome.check(results.len() == 401, "range [100, 500] holds 401 records");

    let ordered = results
        .iter()
        .enumerate()
        .all(|(i, payload)| verify(payload, 100 + i as i32));
    outcome.check(ordered, "range results ascend in key order");

    Ok(())
}

fn test_persistence(path: &PathBuf, outcome: &mut Outcome) -> Result<()> {
    info!("--- persistence across reopen ---");

    {
        let mut tree = BPlusTree::open(path)?;
        tree.write_data(999, &canonical(999))?;
        tree.close()?;
    }

    let tree = BPlusTree::open(path)?;
    outcome.check(
        tree.read_data(999)?.is_some_and(|p| verify(p, 999)),
        "record survives close and reopen",
    );
    tree.close()?;

    Ok(())
}

fn run_benchmark() -> Result<()> {
    info!("=== performance benchmark ===");

    let path = scratch_path("burrow-bench.idx");

    for &size in &[1_000i32, 10_000, 100_000] {
        info!("--- benchmark: {size} records ---");

        let _ = std::fs::remove_file(&path);
        let mut tree = BPlusTree::open(&path)?;

        let start = Instant::now();
        for key in 0..size {
            tree.write_data(key, &canonical(key))?;
        }
        let insert = start.elapsed();

        let start = Instant::now();
        for key in 0..size {
            tree.read_data(key)?;
        }
        let read = start.elapsed();

        let start = Instant::now();
        let n = tree.read_range_data(0, size / 10)?.len();
        let range = start.elapsed();

        info!(
            "insert: {}ms ({:.0} ops/sec)",
            insert.as_millis(),
            size as f64 / insert.as_secs_f64()
        );
        info!(
            "read:   {}ms ({:.0} ops/sec)",
            read.as_millis(),
            size as f64 / read.as_secs_f64()
        );
        info!("range:  {}us ({n} results)", range.as_micros());

        tree.close()?;
    }

    let _ = std::fs::remove_file(&path);
    Ok(())
}
