//! # Memory-Mapped File Storage
//!
//! This module implements `MmapStorage`, the byte-addressable window over the
//! backing index file. It provides zero-copy page access with compile-time
//! safety guarantees through Rust's borrow checker.
//!
//! ## Design Philosophy
//!
//! Traditional storage engines copy page data between kernel buffers and a
//! user-space page cache. Memory-mapped I/O eliminates this copy by mapping
//! the file directly into the process address space: the OS handles paging
//! transparently, and the only visible blocking point is a page fault on
//! first touch.
//!
//! ## Safety Considerations
//!
//! A mapped region becomes invalid when the file grows and is remapped. The
//! classic mitigations all carry runtime overhead (hazard pointers, epochs,
//! reference counting). Here the borrow checker does the work instead:
//!
//! ```text
//! page(&self) -> &[u8]               // immutable borrow of self
//! page_mut(&mut self) -> &mut [u8]   // mutable borrow of self
//! grow(&mut self)                    // exclusive borrow
//! ```
//!
//! Since `grow()` requires `&mut self`, the compiler guarantees no page
//! reference survives a remap. Zero runtime cost, no discipline required of
//! callers beyond ordinary borrow rules.
//!
//! ## File Format
//!
//! The file is a flat array of 4096-byte pages; page `i` starts at byte
//! offset `i * 4096`. Page 0 holds the metadata header (see
//! `storage::meta`). The file is kept sized to the current *capacity*, which
//! may exceed the logical page count tracked by the metadata. Capacity only
//! ever grows, geometrically, so remaps stay rare.
//!
//! ## Access Hints
//!
//! Index descents touch pages in an effectively random order, so on unix the
//! whole mapping is advised `MADV_RANDOM` at open, and the first few pages
//! (metadata plus the likely root) are advised `MADV_WILLNEED`. Hints are
//! performance-only and never semantic.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;
use tracing::debug;

use crate::config::PAGE_SIZE;

#[derive(Debug)]
pub struct MmapStorage {
    file: File,
    mmap: MmapMut,
    page_count: u32,
}

impl MmapStorage {
    /// Maps an existing, non-empty index file read-write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?;

        let file_size = metadata.len();

        ensure!(
            file_size > 0,
            "cannot open empty index file '{}'",
            path.display()
        );

        ensure!(
            file_size % PAGE_SIZE as u64 == 0,
            "index file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            PAGE_SIZE
        );

        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        // SAFETY: MmapMut::map_mut is unsafe because mapped files can be
        // modified externally. This is safe because:
        // 1. The index assumes a single accessor; the file is not shared
        //    with concurrent writers.
        // 2. The mmap lifetime is tied to MmapStorage, preventing
        //    use-after-unmap.
        // 3. All access goes through page()/page_mut() which bounds-check
        //    the page number.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        let storage = Self {
            file,
            mmap,
            page_count,
        };
        storage.advise_access_pattern();
        Ok(storage)
    }

    /// Creates (or truncates) an index file sized to `initial_page_count`
    /// pages and maps it read-write. Page contents start zeroed.
    pub fn create<P: AsRef<Path>>(path: P, initial_page_count: u32) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            initial_page_count > 0,
            "initial page count must be at least 1"
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create index file '{}'", path.display()))?;

        let file_size = initial_page_count as u64 * PAGE_SIZE as u64;

        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: see open(); additionally the file was just created with
        // truncate=true and sized to a PAGE_SIZE multiple.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        let storage = Self {
            file,
            mmap,
            page_count: initial_page_count,
        };
        storage.advise_access_pattern();
        Ok(storage)
    }

    pub fn page(&self, page_no: u32) -> Result<&[u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * PAGE_SIZE;
        Ok(&self.mmap[offset..offset + PAGE_SIZE])
    }

    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut [u8]> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );

        let offset = page_no as usize * PAGE_SIZE;
        Ok(&mut self.mmap[offset..offset + PAGE_SIZE])
    }

    /// Extends the file to `new_page_count` pages and remaps. A no-op when
    /// the file is already large enough. Invalidates every outstanding page
    /// reference, which the borrow checker enforces via `&mut self`.
    pub fn grow(&mut self, new_page_count: u32) -> Result<()> {
        if new_page_count <= self.page_count {
            return Ok(());
        }

        self.mmap
            .flush_async()
            .wrap_err("failed to flush mmap before grow")?;

        let new_size = new_page_count as u64 * PAGE_SIZE as u64;

        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend file to {} bytes", new_size))?;

        // SAFETY: grow() holds &mut self, so no page references exist; the
        // old mapping was flushed above and is dropped on reassignment; the
        // file was extended to new_size before remapping.
        self.mmap =
            unsafe { MmapMut::map_mut(&self.file).wrap_err("failed to remap file after grow")? };

        debug!(
            old_pages = self.page_count,
            new_pages = new_page_count,
            "grew index file"
        );

        self.page_count = new_page_count;
        self.advise_access_pattern();

        Ok(())
    }

    /// Flushes the mapped region to disk (msync).
    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync mmap to disk")
    }

    /// Current capacity of the mapping in pages (file size / PAGE_SIZE).
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn file_size(&self) -> u64 {
        self.page_count as u64 * PAGE_SIZE as u64
    }

    /// Tells the kernel descents touch pages randomly, and that the metadata
    /// page and the likely root are hot.
    fn advise_access_pattern(&self) {
        #[cfg(unix)]
        // SAFETY: madvise is a hint and cannot cause undefined behavior for
        // a valid region; the range below is exactly the live mapping.
        unsafe {
            libc::madvise(
                self.mmap.as_ptr() as *mut libc::c_void,
                self.page_count as usize * PAGE_SIZE,
                libc::MADV_RANDOM,
            );
            let hot_pages = (self.page_count as usize).min(4);
            libc::madvise(
                self.mmap.as_ptr() as *mut libc::c_void,
                hot_pages * PAGE_SIZE,
                libc::MADV_WILLNEED,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_sizes_file_to_page_multiple() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let storage = MmapStorage::create(&path, 8).unwrap();

        assert_eq!(storage.page_count(), 8);
        assert_eq!(storage.file_size(), 8 * PAGE_SIZE as u64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * PAGE_SIZE as u64);
    }

    #[test]
    fn create_rejects_zero_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let result = MmapStorage::create(&path, 0);
        assert!(result.is_err());
    }

    #[test]
    fn open_rejects_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.idx");

        let result = MmapStorage::open(&path);
        assert!(result.is_err());
    }

    #[test]
    fn open_rejects_unaligned_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.idx");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 100]).unwrap();

        let result = MmapStorage::open(&path);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a multiple of page size"));
    }

    #[test]
    fn page_access_is_bounds_checked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut storage = MmapStorage::create(&path, 4).unwrap();

        assert!(storage.page(3).is_ok());
        assert!(storage.page(4).is_err());
        assert!(storage.page_mut(4).is_err());
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut storage = MmapStorage::create(&path, 2).unwrap();
            storage.page_mut(1).unwrap()[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
            storage.sync().unwrap();
        }

        let storage = MmapStorage::open(&path).unwrap();
        assert_eq!(&storage.page(1).unwrap()[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn grow_extends_and_preserves_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut storage = MmapStorage::create(&path, 2).unwrap();

        storage.page_mut(1).unwrap()[0] = 0x7F;
        storage.grow(16).unwrap();

        assert_eq!(storage.page_count(), 16);
        assert_eq!(storage.page(1).unwrap()[0], 0x7F);
        assert_eq!(storage.page(15).unwrap()[0], 0);
    }

    #[test]
    fn grow_to_smaller_count_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut storage = MmapStorage::create(&path, 8).unwrap();

        storage.grow(4).unwrap();

        assert_eq!(storage.page_count(), 8);
    }
}
