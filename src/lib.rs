//! # burrow: a disk-resident ordered index
//!
//! burrow maps 32-bit signed integer keys to fixed 100-byte record payloads
//! through a persistent B+ tree. The whole index lives in a single file,
//! accessed through a shared memory mapping; nothing assumes the working
//! set fits in memory, and the contents survive process restart.
//!
//! ## Quick Start
//!
//! ```ignore
//! use burrow::{BPlusTree, DATA_SIZE};
//!
//! let mut tree = BPlusTree::open("./index.bur")?;
//!
//! let payload = [7u8; DATA_SIZE];
//! tree.write_data(42, &payload)?;
//!
//! assert_eq!(tree.read_data(42)?, Some(&payload[..]));
//! assert_eq!(tree.read_range_data(0, 100)?.len(), 1);
//!
//! tree.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (BPlusTree)       │
//! ├─────────────────────────────────────┤
//! │  Tree Engine (descent/split/scan)   │
//! ├─────────────────────────────────────┤
//! │  Page Views (leaf / interior nodes) │
//! ├─────────────────────────────────────┤
//! │   Pager (alloc, free list, growth)  │
//! ├─────────────────────────────────────┤
//! │     Memory-Mapped File (4KB pages)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! Every page is exactly 4096 bytes with a compile-time-fixed layout; page
//! views read and write in place through `zerocopy` headers, so reads are
//! zero-copy end to end; `read_data` hands back a slice of the mapping.
//!
//! ## Durability and Concurrency
//!
//! Writes reach disk at `sync`/`close` (or when the OS writes the dirty
//! mapping back); there is no write-ahead log, so a crash can lose recent
//! modifications. The structure assumes exactly one accessor and has no
//! internal locking. Both are deliberate scope decisions, not oversights.

pub mod btree;
pub mod config;
pub mod storage;

pub use btree::BPlusTree;
pub use config::{DATA_SIZE, PAGE_SIZE, SENTINEL_KEY};
