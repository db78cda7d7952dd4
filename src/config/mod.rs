//! Configuration constants for the on-disk format and growth policy.
//!
//! Import format constants from here rather than redefining them locally:
//!
//! ```ignore
//! use burrow::config::{PAGE_SIZE, DATA_SIZE};
//! ```

mod constants;

pub use constants::{
    DATA_SIZE, GROWTH_FACTOR, INITIAL_PAGE_COUNT, INTERIOR_HEADER_SIZE, INTERIOR_MAX_KEYS,
    KEY_SIZE, LEAF_HEADER_SIZE, LEAF_MAX_KEYS, META_MAGIC, NO_PAGE, PAGE_SIZE, SENTINEL_KEY,
};
