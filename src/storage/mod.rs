//! # Storage Layer
//!
//! The storage layer maintains a mutable, byte-addressable window over the
//! whole backing file and manages the lifecycle of page ids. It is built on
//! memory-mapped I/O: instead of copying pages between kernel and user
//! space, the file is mapped directly into the address space and all page
//! access is zero-copy slices into the mapping.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------+
//! |           Pager             |  allocate/free, metadata, growth policy
//! +-----------------------------+
//! |         MmapStorage         |  map/remap/sync, bounds-checked pages
//! +-----------------------------+
//! |        index file           |  flat array of 4096-byte pages
//! +-----------------------------+
//! ```
//!
//! ## Safety Model
//!
//! A mapping becomes invalid when the file grows and is remapped. Rather
//! than runtime guards, the layer leans on the borrow checker: reading a
//! page borrows the storage immutably, and anything that can remap requires
//! `&mut self`, so the compiler rejects any code path that could hold a
//! page reference across a grow.
//!
//! ## Module Organization
//!
//! - `mmap`: low-level mapped storage (`MmapStorage`)
//! - `meta`: the page-0 metadata header (`MetaHeader`)
//! - `pager`: allocation, free list, and growth (`Pager`)

mod meta;
mod mmap;
mod pager;

pub use meta::{MetaHeader, META_HEADER_SIZE};
pub use mmap::MmapStorage;
pub use pager::Pager;
