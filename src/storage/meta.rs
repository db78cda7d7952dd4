//! # Metadata Page Header
//!
//! Page 0 of every index file begins with a 20-byte header that roots the
//! whole structure: the magic constant, the current tree root, the logical
//! page count, the free-list head, and the live record count. The remaining
//! 4076 bytes of page 0 are reserved and zero-filled at creation.
//!
//! ## Layout (little-endian)
//!
//! ```text
//! Offset  Size  Field           Description
//! ------  ----  --------------  -----------------------------------------
//! 0       4     magic           0xB7EEDB7E, verified on every parse
//! 4       4     root_page       current tree root, NO_PAGE if empty
//! 8       4     num_pages       one past the largest allocated page id
//! 12      4     free_list_head  head of the free-page list, NO_PAGE if none
//! 16      4     num_records     live key/payload pairs
//! ```
//!
//! ## Zerocopy Safety
//!
//! The header derives the zerocopy traits so it can be read in place from
//! the mapped page without copying. All multi-byte fields use
//! `U32<LittleEndian>`, which also makes the struct `Unaligned`, required
//! because mmap offsets carry no alignment guarantee for the wrapper type.
//!
//! Both `from_bytes` and `from_bytes_mut` verify the magic, so every
//! metadata access re-checks that the file is actually one of ours.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{META_MAGIC, NO_PAGE};

pub const META_HEADER_SIZE: usize = 20;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaHeader {
    magic: U32,
    root_page: U32,
    num_pages: U32,
    free_list_head: U32,
    num_records: U32,
}

const _: () = assert!(std::mem::size_of::<MetaHeader>() == META_HEADER_SIZE);

impl MetaHeader {
    /// Header for a freshly created index: empty tree, one page (the
    /// metadata page itself), empty free list.
    pub fn new() -> Self {
        Self {
            magic: U32::new(META_MAGIC),
            root_page: U32::new(NO_PAGE),
            num_pages: U32::new(1),
            free_list_head: U32::new(NO_PAGE),
            num_records: U32::new(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= META_HEADER_SIZE,
            "buffer too small for MetaHeader: {} < {}",
            bytes.len(),
            META_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..META_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse MetaHeader: {:?}", e))?;

        ensure!(
            header.magic.get() == META_MAGIC,
            "invalid magic {:#010x} in metadata page (expected {:#010x})",
            header.magic.get(),
            META_MAGIC
        );

        Ok(header)
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= META_HEADER_SIZE,
            "buffer too small for MetaHeader: {} < {}",
            bytes.len(),
            META_HEADER_SIZE
        );

        let header = Self::mut_from_bytes(&mut bytes[..META_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse MetaHeader: {:?}", e))?;

        ensure!(
            header.magic.get() == META_MAGIC,
            "invalid magic {:#010x} in metadata page (expected {:#010x})",
            header.magic.get(),
            META_MAGIC
        );

        Ok(header)
    }

    pub fn root_page(&self) -> u32 {
        self.root_page.get()
    }

    pub fn set_root_page(&mut self, page: u32) {
        self.root_page = U32::new(page);
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.get()
    }

    pub fn set_num_pages(&mut self, count: u32) {
        self.num_pages = U32::new(count);
    }

    pub fn free_list_head(&self) -> u32 {
        self.free_list_head.get()
    }

    pub fn set_free_list_head(&mut self, page: u32) {
        self.free_list_head = U32::new(page);
    }

    pub fn num_records(&self) -> u32 {
        self.num_records.get()
    }

    pub fn set_num_records(&mut self, count: u32) {
        self.num_records = U32::new(count);
    }
}

impl Default for MetaHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_header_size_is_20() {
        assert_eq!(std::mem::size_of::<MetaHeader>(), 20);
    }

    #[test]
    fn new_header_describes_empty_index() {
        let header = MetaHeader::new();

        assert_eq!(header.root_page(), NO_PAGE);
        assert_eq!(header.num_pages(), 1);
        assert_eq!(header.free_list_head(), NO_PAGE);
        assert_eq!(header.num_records(), 0);
    }

    #[test]
    fn header_roundtrip() {
        let mut header = MetaHeader::new();
        header.set_root_page(7);
        header.set_num_pages(42);
        header.set_free_list_head(13);
        header.set_num_records(1000);

        let bytes = header.as_bytes();
        let parsed = MetaHeader::from_bytes(bytes).unwrap();

        assert_eq!(parsed.root_page(), 7);
        assert_eq!(parsed.num_pages(), 42);
        assert_eq!(parsed.free_list_head(), 13);
        assert_eq!(parsed.num_records(), 1000);
    }

    #[test]
    fn rejects_invalid_magic() {
        let bytes = [0u8; META_HEADER_SIZE];

        let result = MetaHeader::from_bytes(&bytes);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid magic"));
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = [0u8; 8];

        assert!(MetaHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn mutable_access_writes_through() {
        let mut bytes = [0u8; META_HEADER_SIZE];
        bytes.copy_from_slice(MetaHeader::new().as_bytes());

        MetaHeader::from_bytes_mut(&mut bytes)
            .unwrap()
            .set_num_records(5);

        assert_eq!(MetaHeader::from_bytes(&bytes).unwrap().num_records(), 5);
    }

    #[test]
    fn magic_is_little_endian_on_disk() {
        let header = MetaHeader::new();
        let bytes = header.as_bytes();

        assert_eq!(&bytes[..4], &[0x7E, 0xDB, 0xEE, 0xB7]);
    }
}
