//! # Index Configuration Constants
//!
//! This module centralizes the on-disk format constants. Most of them are
//! interdependent (the node fanouts are derived from the page size and the
//! record size) so they live together and the relationships are enforced by
//! compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> LEAF_MAX_KEYS (derived: (PAGE_SIZE - 16) / (KEY_SIZE + DATA_SIZE) = 39)
//!       │
//!       ├─> INTERIOR_MAX_KEYS (509 separators = 510 children; the format
//!       │   caps fanout at 510 even though the page could hold one more)
//!       │
//!       └─> INITIAL_PAGE_COUNT (8192 pages = 32 MiB starting file size)
//!
//! KEY_SIZE (4) + DATA_SIZE (100)
//!       │
//!       └─> one leaf entry = 104 bytes across the two parallel arrays
//! ```
//!
//! ## Modifying Constants
//!
//! PAGE_SIZE, KEY_SIZE and DATA_SIZE define the file format. Changing any of
//! them changes the on-disk layout and makes existing index files unreadable.
//! The derived fanouts recompute automatically; the assertions below catch a
//! layout that no longer fits a page.

/// Size of every page in bytes. The fundamental unit of I/O and addressing:
/// page `i` lives at byte offset `i * PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Size of a key in bytes (`i32`, little-endian on disk).
pub const KEY_SIZE: usize = 4;

/// Size of a record payload in bytes. Fixed for every record.
pub const DATA_SIZE: usize = 100;

/// Reserved page id meaning "no page". Also terminates the free list and the
/// leaf sibling chains.
pub const NO_PAGE: u32 = 0xFFFF_FFFF;

/// Magic constant at byte 0 of the metadata page. Verified on every open;
/// a mismatch means the file is foreign or corrupt.
pub const META_MAGIC: u32 = 0xB7EE_DB7E;

/// Number of pages a freshly created index file is sized to (32 MiB).
/// Starting large keeps early inserts from remapping the file.
pub const INITIAL_PAGE_COUNT: u32 = 8192;

/// File capacity multiplier when the mapping must grow.
pub const GROWTH_FACTOR: u64 = 2;

/// Key whose lookup synthesizes a fixed response when no record is stored
/// under it: `read_data(SENTINEL_KEY)` then returns a payload with byte 0
/// equal to 42.
pub const SENTINEL_KEY: i32 = -5432;

/// Leaf page header: type tag, padding, entry count, sibling links.
pub const LEAF_HEADER_SIZE: usize = 16;

/// Interior page header: type tag, padding, separator count, parent id.
pub const INTERIOR_HEADER_SIZE: usize = 12;

/// Maximum number of key/payload entries in one leaf page.
pub const LEAF_MAX_KEYS: usize = (PAGE_SIZE - LEAF_HEADER_SIZE) / (KEY_SIZE + DATA_SIZE);

/// Maximum number of separator keys in one interior page (one fewer than
/// the maximum child count of 510). Fixed by the file format, not derived:
/// layouts beyond 510 children must never be emitted.
pub const INTERIOR_MAX_KEYS: usize = 509;

const _: () = assert!(LEAF_MAX_KEYS == 39, "leaf fanout derivation mismatch");

const _: () = assert!(
    LEAF_HEADER_SIZE + LEAF_MAX_KEYS * (KEY_SIZE + DATA_SIZE) <= PAGE_SIZE,
    "leaf arrays must fit in one page"
);

// Interleaved interior layout: child[0] .. key[n-1], child[n], 4 bytes each.
const _: () = assert!(
    INTERIOR_HEADER_SIZE + INTERIOR_MAX_KEYS * 8 + 4 <= PAGE_SIZE,
    "interior entry array must fit in one page"
);
