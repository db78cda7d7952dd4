//! # Page Manager
//!
//! The `Pager` owns the mapped index file and hands out 4096-byte pages by
//! id. It is responsible for the lifecycle of page ids:
//!
//! - **Birth**: `allocate_page` pops the free list, or extends the logical
//!   page count (growing the file when the count passes the mapped
//!   capacity).
//! - **Death**: `free_page` pushes a page onto the intrusive free list,
//!   from which the allocator may resurrect it.
//!
//! ## Free List
//!
//! Freed pages form a singly-linked list threaded through the pages
//! themselves: the first 4 bytes of a free page hold the id of the next
//! free page (or the no-page sentinel). The list head lives in the metadata
//! header. Allocation is LIFO: the most recently freed page is reused
//! first, which keeps the hot end of the file compact.
//!
//! ## Growth Policy
//!
//! The file starts at `INITIAL_PAGE_COUNT` pages (32 MiB). When an
//! allocation needs a page beyond the mapped capacity, the capacity is
//! doubled until it fits and the file is extended and remapped in one step.
//! Growth happens *before* the metadata is updated, so a failed extension
//! leaves the logical page count untouched.
//!
//! ## Metadata Access
//!
//! The metadata header lives inside page 0 of the same mapping, so
//! `meta_mut()` borrows the pager mutably. Callers read the fields they
//! need, drop the borrow, operate on other pages, then write back; the
//! borrow checker makes the discipline mandatory rather than conventional.

use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use super::meta::MetaHeader;
use super::mmap::MmapStorage;
use crate::config::{GROWTH_FACTOR, INITIAL_PAGE_COUNT, NO_PAGE};

#[derive(Debug)]
pub struct Pager {
    storage: MmapStorage,
}

impl Pager {
    /// Opens the index file at `path`, creating and initializing it when it
    /// does not exist or is empty. An existing file must carry the metadata
    /// magic; a foreign or corrupt file fails the open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_capacity(path, INITIAL_PAGE_COUNT)
    }

    /// As `open`, with an explicit initial capacity for new files. Mostly
    /// useful in tests that want to exercise growth without a 32 MiB file.
    pub fn open_with_capacity<P: AsRef<Path>>(path: P, initial_page_count: u32) -> Result<Self> {
        let path = path.as_ref();

        let is_new = match std::fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        if is_new {
            let mut storage = MmapStorage::create(path, initial_page_count)
                .wrap_err_with(|| format!("failed to initialize index at '{}'", path.display()))?;
            let page0 = storage.page_mut(0)?;
            page0.fill(0);
            page0[..super::meta::META_HEADER_SIZE].copy_from_slice(
                zerocopy::IntoBytes::as_bytes(&MetaHeader::new()),
            );
            return Ok(Self { storage });
        }

        let storage = MmapStorage::open(path)?;
        // Verify the magic up front so a foreign file fails the open, not
        // the first operation.
        MetaHeader::from_bytes(storage.page(0)?)?;
        Ok(Self { storage })
    }

    pub fn page(&self, page_id: u32) -> Result<&[u8]> {
        self.storage.page(page_id)
    }

    pub fn page_mut(&mut self, page_id: u32) -> Result<&mut [u8]> {
        self.storage.page_mut(page_id)
    }

    pub fn meta(&self) -> Result<&MetaHeader> {
        MetaHeader::from_bytes(self.storage.page(0)?)
    }

    pub fn meta_mut(&mut self) -> Result<&mut MetaHeader> {
        MetaHeader::from_bytes_mut(self.storage.page_mut(0)?)
    }

    /// Returns a page id ready for reuse: the head of the free list when one
    /// exists, otherwise a brand-new id at the logical end of the file.
    /// Growing the file invalidates outstanding page borrows, so callers
    /// re-fetch pages after every allocation (enforced by `&mut self`).
    pub fn allocate_page(&mut self) -> Result<u32> {
        let head = self.meta()?.free_list_head();

        if head != NO_PAGE {
            let next = read_free_link(self.page(head)?);
            self.meta_mut()?.set_free_list_head(next);
            return Ok(head);
        }

        let page_id = self.meta()?.num_pages();
        if page_id == NO_PAGE {
            eyre::bail!("page id space exhausted");
        }

        if page_id + 1 > self.storage.page_count() {
            self.grow_to_fit(page_id + 1)?;
        }

        self.meta_mut()?.set_num_pages(page_id + 1);
        Ok(page_id)
    }

    /// Prepends `page_id` to the free list. Freeing the metadata page is
    /// silently ignored.
    pub fn free_page(&mut self, page_id: u32) -> Result<()> {
        if page_id == 0 || page_id == NO_PAGE {
            return Ok(());
        }

        let old_head = self.meta()?.free_list_head();
        write_free_link(self.page_mut(page_id)?, old_head);
        self.meta_mut()?.set_free_list_head(page_id);
        Ok(())
    }

    /// Flushes the mapped region to disk.
    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    /// Syncs and drops the mapping and file handle.
    pub fn close(self) -> Result<()> {
        self.storage.sync()
    }

    /// Capacity of the mapping in pages. Always >= the metadata's logical
    /// page count.
    pub fn capacity(&self) -> u32 {
        self.storage.page_count()
    }

    fn grow_to_fit(&mut self, required_pages: u32) -> Result<()> {
        let mut capacity = self.storage.page_count() as u64;
        while capacity < required_pages as u64 {
            capacity *= GROWTH_FACTOR;
        }
        let capacity = capacity.min(NO_PAGE as u64) as u32;
        ensure!(
            capacity >= required_pages,
            "index cannot grow past {} pages",
            NO_PAGE
        );
        self.storage.grow(capacity)
    }
}

fn read_free_link(page: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&page[..4]);
    u32::from_le_bytes(buf)
}

fn write_free_link(page: &mut [u8], next: u32) {
    page[..4].copy_from_slice(&next.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_small(dir: &tempfile::TempDir) -> Pager {
        Pager::open_with_capacity(dir.path().join("test.idx"), 4).unwrap()
    }

    #[test]
    fn open_creates_and_initializes_metadata() {
        let dir = tempdir().unwrap();
        let pager = open_small(&dir);

        let meta = pager.meta().unwrap();
        assert_eq!(meta.root_page(), NO_PAGE);
        assert_eq!(meta.num_pages(), 1);
        assert_eq!(meta.free_list_head(), NO_PAGE);
        assert_eq!(meta.num_records(), 0);
    }

    #[test]
    fn reopen_preserves_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut pager = Pager::open_with_capacity(&path, 4).unwrap();
            pager.meta_mut().unwrap().set_num_records(123);
            pager.close().unwrap();
        }

        let pager = Pager::open_with_capacity(&path, 4).unwrap();
        assert_eq!(pager.meta().unwrap().num_records(), 123);
    }

    #[test]
    fn open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foreign.idx");
        std::fs::write(&path, vec![0xAAu8; crate::config::PAGE_SIZE]).unwrap();

        let result = Pager::open(&path);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid magic"));
    }

    #[test]
    fn allocate_hands_out_sequential_ids() {
        let dir = tempdir().unwrap();
        let mut pager = open_small(&dir);

        assert_eq!(pager.allocate_page().unwrap(), 1);
        assert_eq!(pager.allocate_page().unwrap(), 2);
        assert_eq!(pager.allocate_page().unwrap(), 3);
        assert_eq!(pager.meta().unwrap().num_pages(), 4);
    }

    #[test]
    fn freed_pages_are_reused_lifo() {
        let dir = tempdir().unwrap();
        let mut pager = open_small(&dir);

        let a = pager.allocate_page().unwrap();
        let b = pager.allocate_page().unwrap();
        pager.free_page(a).unwrap();
        pager.free_page(b).unwrap();

        assert_eq!(pager.allocate_page().unwrap(), b);
        assert_eq!(pager.allocate_page().unwrap(), a);
        assert_eq!(pager.meta().unwrap().free_list_head(), NO_PAGE);
    }

    #[test]
    fn free_metadata_page_is_ignored() {
        let dir = tempdir().unwrap();
        let mut pager = open_small(&dir);

        pager.free_page(0).unwrap();

        assert_eq!(pager.meta().unwrap().free_list_head(), NO_PAGE);
        assert_eq!(pager.allocate_page().unwrap(), 1);
    }

    #[test]
    fn allocation_past_capacity_grows_the_file() {
        let dir = tempdir().unwrap();
        let mut pager = open_small(&dir);

        for expected in 1..10 {
            assert_eq!(pager.allocate_page().unwrap(), expected);
        }

        assert!(pager.capacity() >= 10);
        assert_eq!(pager.meta().unwrap().num_pages(), 10);
    }

    #[test]
    fn free_list_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut pager = Pager::open_with_capacity(&path, 4).unwrap();
            let a = pager.allocate_page().unwrap();
            pager.allocate_page().unwrap();
            pager.free_page(a).unwrap();
            pager.close().unwrap();
        }

        let mut pager = Pager::open_with_capacity(&path, 4).unwrap();
        assert_eq!(pager.allocate_page().unwrap(), 1);
    }
}
