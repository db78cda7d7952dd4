//! # B+ Tree Leaf Pages
//!
//! A leaf page stores up to 39 key/payload pairs in two parallel arrays and
//! links to its siblings for range scans. The layout is fixed (every field
//! has a compile-time offset) so all access is plain slice arithmetic into
//! the mapped page.
//!
//! ## Page Layout (4096 bytes)
//!
//! ```text
//! Offset  Size   Field       Description
//! ------  -----  ----------  ---------------------------------------
//! 0       1      type tag    2 (leaf)
//! 1       3      padding     zero
//! 4       4      num_keys    live entries in both arrays
//! 8       4      prev_leaf   left sibling page id, NO_PAGE at the edge
//! 12      4      next_leaf   right sibling page id, NO_PAGE at the edge
//! 16      156    keys        39 x i32, little-endian, strictly ascending
//! 172     3900   payloads    39 x 100 bytes, parallel to keys
//! 4072    24     unused
//! ```
//!
//! Only the first `num_keys` slots of each array are live; the tail is
//! whatever earlier shifts left behind.
//!
//! ## Zero-Copy Views
//!
//! `LeafNode` borrows the page immutably and hands out `&'a [u8]` payload
//! slices pointing straight into the mapping; `LeafNodeMut` adds the
//! shifting insert/remove primitives. Both verify the type tag and the
//! entry-count bound on construction, so the plain accessors can index
//! without re-checking.
//!
//! ## Search
//!
//! `find_position` is a linear lower-bound scan. At 39 contiguous 4-byte
//! keys the whole array is a handful of cache lines, and the scan avoids
//! the branch mispredictions a binary search pays at this size.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{read_i32_le, write_i32_le, PageType};
use crate::config::{DATA_SIZE, KEY_SIZE, LEAF_HEADER_SIZE, LEAF_MAX_KEYS, NO_PAGE, PAGE_SIZE};

const KEYS_START: usize = LEAF_HEADER_SIZE;
const VALUES_START: usize = KEYS_START + LEAF_MAX_KEYS * KEY_SIZE;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafHeader {
    page_type: u8,
    padding: [u8; 3],
    num_keys: U32,
    prev_leaf: U32,
    next_leaf: U32,
}

const _: () = assert!(std::mem::size_of::<LeafHeader>() == LEAF_HEADER_SIZE);

impl LeafHeader {
    fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(&data[..LEAF_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read leaf header: {:?}", e))
    }

    fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::mut_from_bytes(&mut data[..LEAF_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read leaf header: {:?}", e))
    }
}

fn validate(data: &[u8]) -> Result<()> {
    ensure!(
        data.len() == PAGE_SIZE,
        "invalid page size: {} != {}",
        data.len(),
        PAGE_SIZE
    );
    ensure!(
        data[0] == PageType::Leaf as u8,
        "expected leaf page, got type tag {:#04x}",
        data[0]
    );
    let header = LeafHeader::from_bytes(data)?;
    ensure!(
        header.num_keys.get() as usize <= LEAF_MAX_KEYS,
        "leaf entry count {} exceeds capacity {}",
        header.num_keys.get(),
        LEAF_MAX_KEYS
    );
    Ok(())
}

/// Immutable view of a leaf page.
#[derive(Debug)]
pub struct LeafNode<'a> {
    data: &'a [u8],
}

/// Mutable view of a leaf page.
pub struct LeafNodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> LeafNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    pub fn num_keys(&self) -> usize {
        // INVARIANT: header parsed successfully in from_page
        LeafHeader::from_bytes(self.data).unwrap().num_keys.get() as usize
    }

    pub fn prev_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().prev_leaf.get()
    }

    pub fn next_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().next_leaf.get()
    }

    pub fn key_at(&self, index: usize) -> i32 {
        debug_assert!(index < self.num_keys());
        read_i32_le(self.data, KEYS_START + index * KEY_SIZE)
    }

    /// The 100-byte payload at `index`, borrowed from the mapped page.
    pub fn value_at(&self, index: usize) -> &'a [u8] {
        debug_assert!(index < self.num_keys());
        let offset = VALUES_START + index * DATA_SIZE;
        &self.data[offset..offset + DATA_SIZE]
    }

    /// Lower-bound search: index of the first key >= `key`, or `num_keys()`
    /// when every key is smaller.
    pub fn find_position(&self, key: i32) -> usize {
        let n = self.num_keys();
        for i in 0..n {
            if self.key_at(i) >= key {
                return i;
            }
        }
        n
    }
}

impl<'a> LeafNodeMut<'a> {
    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    /// Formats `data` as an empty leaf: tag set, no entries, both sibling
    /// links at the sentinel.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = LeafHeader {
            page_type: PageType::Leaf as u8,
            padding: [0; 3],
            num_keys: U32::new(0),
            prev_leaf: U32::new(NO_PAGE),
            next_leaf: U32::new(NO_PAGE),
        };
        data[..LEAF_HEADER_SIZE].copy_from_slice(header.as_bytes());

        Ok(Self { data })
    }

    pub fn num_keys(&self) -> usize {
        LeafHeader::from_bytes(self.data).unwrap().num_keys.get() as usize
    }

    pub fn prev_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().prev_leaf.get()
    }

    pub fn next_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().next_leaf.get()
    }

    pub fn set_prev_leaf(&mut self, page_id: u32) {
        LeafHeader::from_bytes_mut(self.data).unwrap().prev_leaf = U32::new(page_id);
    }

    pub fn set_next_leaf(&mut self, page_id: u32) {
        LeafHeader::from_bytes_mut(self.data).unwrap().next_leaf = U32::new(page_id);
    }

    pub fn key_at(&self, index: usize) -> i32 {
        debug_assert!(index < self.num_keys());
        read_i32_le(self.data, KEYS_START + index * KEY_SIZE)
    }

    pub fn value_at(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.num_keys());
        let offset = VALUES_START + index * DATA_SIZE;
        &self.data[offset..offset + DATA_SIZE]
    }

    /// Mutable payload slice, for in-place overwrite of an existing key.
    pub fn value_at_mut(&mut self, index: usize) -> &mut [u8] {
        debug_assert!(index < self.num_keys());
        let offset = VALUES_START + index * DATA_SIZE;
        &mut self.data[offset..offset + DATA_SIZE]
    }

    pub fn find_position(&self, key: i32) -> usize {
        let n = self.num_keys();
        for i in 0..n {
            if self.key_at(i) >= key {
                return i;
            }
        }
        n
    }

    /// Shifts entries [pos..) one slot right and writes (`key`, `value`) at
    /// `pos`. The caller keeps keys strictly ascending by passing the
    /// lower-bound position of a key not yet present.
    pub fn insert_at(&mut self, pos: usize, key: i32, value: &[u8; DATA_SIZE]) -> Result<()> {
        let n = self.num_keys();
        ensure!(n < LEAF_MAX_KEYS, "leaf is full ({} entries)", n);
        ensure!(pos <= n, "insert position {} out of bounds ({})", pos, n);

        if pos < n {
            let key_src = KEYS_START + pos * KEY_SIZE;
            self.data
                .copy_within(key_src..KEYS_START + n * KEY_SIZE, key_src + KEY_SIZE);

            let val_src = VALUES_START + pos * DATA_SIZE;
            self.data
                .copy_within(val_src..VALUES_START + n * DATA_SIZE, val_src + DATA_SIZE);
        }

        write_i32_le(self.data, KEYS_START + pos * KEY_SIZE, key);
        let val_offset = VALUES_START + pos * DATA_SIZE;
        self.data[val_offset..val_offset + DATA_SIZE].copy_from_slice(value);

        self.set_num_keys(n + 1);
        Ok(())
    }

    /// Shifts entries [pos+1..) one slot left over `pos`.
    pub fn remove_at(&mut self, pos: usize) -> Result<()> {
        let n = self.num_keys();
        ensure!(pos < n, "remove position {} out of bounds ({})", pos, n);

        if pos + 1 < n {
            let key_dst = KEYS_START + pos * KEY_SIZE;
            self.data
                .copy_within(key_dst + KEY_SIZE..KEYS_START + n * KEY_SIZE, key_dst);

            let val_dst = VALUES_START + pos * DATA_SIZE;
            self.data
                .copy_within(val_dst + DATA_SIZE..VALUES_START + n * DATA_SIZE, val_dst);
        }

        self.set_num_keys(n - 1);
        Ok(())
    }

    /// Keeps the first `count` entries and drops the rest. Used when a
    /// split rewrites a leaf from a merged snapshot.
    pub fn truncate(&mut self, count: usize) -> Result<()> {
        ensure!(
            count <= self.num_keys(),
            "truncate to {} exceeds entry count {}",
            count,
            self.num_keys()
        );
        self.set_num_keys(count);
        Ok(())
    }

    fn set_num_keys(&mut self, count: usize) {
        LeafHeader::from_bytes_mut(self.data).unwrap().num_keys = U32::new(count as u32);
    }

    pub fn as_ref(&self) -> LeafNode<'_> {
        LeafNode { data: self.data }
    }
}
