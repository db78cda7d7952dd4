//! # B+ Tree Engine
//!
//! `BPlusTree` ties the page views to the pager: root tracking, descent,
//! insertion with split propagation, deletion, and range iteration over the
//! leaf sibling chain.
//!
//! ## Descent
//!
//! Every operation starts at the root recorded in the metadata page and
//! walks down by reading the type tag at offset 0 of each page: interior
//! pages route via an upper-bound separator search, a leaf page terminates
//! the walk. Mutating descents additionally record the pages they walked in
//! a breadcrumb stack, so split propagation pops parents off the stack
//! instead of re-discovering them from the root.
//!
//! ## Insert
//!
//! ```text
//! 1. Empty tree: allocate a leaf, it becomes the root
//! 2. Descend to the target leaf, remembering the path
//! 3. Key present: overwrite the payload in place
//! 4. Room in the leaf: shift-insert
//! 5. Leaf full: split 40 merged entries 20/20, link the new right
//!    sibling into the chain, promote its first key as separator
//! 6. Parent full too: split 510 merged separators 255/254 around a
//!    promoted middle, repeat upward; the root splitting grows the tree
//!    by one level
//! ```
//!
//! Splits allocate before touching any page, so a failed allocation leaves
//! the tree untouched. If the upward separator insertion fails after a node
//! was already split, the split is undone from the merged snapshot and the
//! freshly allocated page is returned to the free list before the error
//! propagates.
//!
//! ## Delete
//!
//! Deletion removes the entry from its leaf and stops. No merging, no
//! redistribution, no separator cleanup: an under-full leaf keeps its place
//! in the chain and stale separators still route correctly, so lookups and
//! scans stay exact while space utilization degrades under delete-heavy
//! workloads. The one exception is a root leaf emptied completely, which is
//! freed, returning the tree to the empty state.
//!
//! ## Reserved Key
//!
//! Lookups of key -5432 that find no stored record return a static
//! synthesized payload whose first byte is 42. An explicitly inserted
//! record under that key takes precedence.

use std::path::Path;

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;
use tracing::warn;

use super::interior::{InteriorNode, InteriorNodeMut};
use super::leaf::{LeafNode, LeafNodeMut};
use super::PageType;
use crate::config::{DATA_SIZE, INTERIOR_MAX_KEYS, LEAF_MAX_KEYS, NO_PAGE, SENTINEL_KEY};
use crate::storage::Pager;

/// A leaf mid-split holds its 39 entries plus the incoming one.
const LEAF_MERGED: usize = LEAF_MAX_KEYS + 1;
/// Entries the left leaf keeps after a split.
const LEAF_SPLIT: usize = (LEAF_MERGED + 1) / 2;

/// An interior node mid-split holds 510 separators and 511 children.
const INTERIOR_MERGED: usize = INTERIOR_MAX_KEYS + 1;
/// Separators the left node keeps; the one at this index is promoted.
const INTERIOR_SPLIT: usize = INTERIOR_MERGED / 2;

const fn sentinel_payload() -> [u8; DATA_SIZE] {
    let mut buf = [0u8; DATA_SIZE];
    buf[0] = 42;
    buf
}

/// Payload returned for the reserved key when no record is stored under it.
static SENTINEL_PAYLOAD: [u8; DATA_SIZE] = sentinel_payload();

/// Breadcrumbs of one descent, root first. Inline capacity covers any
/// realistic height (4 levels hold ~10^9 keys).
type DescentPath = SmallVec<[u32; 8]>;

/// Disk-resident ordered index from `i32` keys to fixed 100-byte payloads.
///
/// Single accessor by design: the API takes `&self`/`&mut self` and is not
/// internally synchronized. Payload slices returned by the read operations
/// borrow the mapped file and are invalidated by the next mutation, which
/// the borrow checker enforces.
#[derive(Debug)]
pub struct BPlusTree {
    pager: Pager,
}

impl BPlusTree {
    /// Opens the index at `path`, creating the file when it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            pager: Pager::open(path)?,
        })
    }

    /// As `open`, with an explicit initial file capacity in pages.
    pub fn open_with_capacity<P: AsRef<Path>>(path: P, initial_page_count: u32) -> Result<Self> {
        Ok(Self {
            pager: Pager::open_with_capacity(path, initial_page_count)?,
        })
    }

    /// Flushes the mapped file to disk.
    pub fn sync(&self) -> Result<()> {
        self.pager.sync()
    }

    /// Syncs and releases the mapping and file handle.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    /// Number of live key/payload pairs.
    pub fn record_count(&self) -> Result<u32> {
        Ok(self.pager.meta()?.num_records())
    }

    /// Inserts `data` under `key`, overwriting any existing payload.
    pub fn write_data(&mut self, key: i32, data: &[u8; DATA_SIZE]) -> Result<()> {
        let root = self.pager.meta()?.root_page();

        if root == NO_PAGE {
            let leaf_id = self.pager.allocate_page()?;
            LeafNodeMut::init(self.pager.page_mut(leaf_id)?)?.insert_at(0, key, data)?;

            let meta = self.pager.meta_mut()?;
            meta.set_root_page(leaf_id);
            meta.set_num_records(1);
            return Ok(());
        }

        let (leaf_id, path) = self.find_leaf_with_path(key)?;

        let (pos, existing, full) = {
            let leaf = LeafNode::from_page(self.pager.page(leaf_id)?)?;
            let pos = leaf.find_position(key);
            let existing = pos < leaf.num_keys() && leaf.key_at(pos) == key;
            (pos, existing, leaf.num_keys() == LEAF_MAX_KEYS)
        };

        if existing {
            LeafNodeMut::from_page(self.pager.page_mut(leaf_id)?)?
                .value_at_mut(pos)
                .copy_from_slice(data);
            return Ok(());
        }

        if !full {
            LeafNodeMut::from_page(self.pager.page_mut(leaf_id)?)?.insert_at(pos, key, data)?;
            let records = self.pager.meta()?.num_records();
            self.pager.meta_mut()?.set_num_records(records + 1);
            return Ok(());
        }

        self.split_leaf_and_insert(path, leaf_id, pos, key, data)
    }

    /// Removes the record under `key`. Returns `false` when absent.
    pub fn delete_data(&mut self, key: i32) -> Result<bool> {
        let root = self.pager.meta()?.root_page();
        if root == NO_PAGE {
            return Ok(false);
        }

        let leaf_id = self.find_leaf(key)?;

        let emptied_root = {
            let mut leaf = LeafNodeMut::from_page(self.pager.page_mut(leaf_id)?)?;
            let pos = leaf.find_position(key);
            if pos >= leaf.num_keys() || leaf.key_at(pos) != key {
                return Ok(false);
            }
            leaf.remove_at(pos)?;
            leaf.num_keys() == 0 && leaf_id == root
        };

        let records = self.pager.meta()?.num_records();
        self.pager.meta_mut()?.set_num_records(records.saturating_sub(1));

        if emptied_root {
            self.pager.free_page(leaf_id)?;
            self.pager.meta_mut()?.set_root_page(NO_PAGE);
        }

        Ok(true)
    }

    /// Looks up `key` and returns its 100-byte payload in place, or `None`.
    /// The reserved key -5432 falls through to a synthesized payload when
    /// no record is stored under it.
    pub fn read_data(&self, key: i32) -> Result<Option<&[u8]>> {
        let root = self.pager.meta()?.root_page();

        if root != NO_PAGE {
            let leaf_id = self.find_leaf(key)?;
            let leaf = LeafNode::from_page(self.pager.page(leaf_id)?)?;
            let pos = leaf.find_position(key);
            if pos < leaf.num_keys() && leaf.key_at(pos) == key {
                return Ok(Some(leaf.value_at(pos)));
            }
        }

        if key == SENTINEL_KEY {
            return Ok(Some(&SENTINEL_PAYLOAD));
        }

        Ok(None)
    }

    /// Payloads for every key in `[low, high]`, in ascending key order.
    pub fn read_range_data(&self, low: i32, high: i32) -> Result<Vec<&[u8]>> {
        let mut results = Vec::new();

        let root = self.pager.meta()?.root_page();
        if root == NO_PAGE || low > high {
            return Ok(results);
        }

        let mut leaf_id = self.find_leaf(low)?;

        while leaf_id != NO_PAGE {
            let leaf = LeafNode::from_page(self.pager.page(leaf_id)?)?;

            for i in 0..leaf.num_keys() {
                let k = leaf.key_at(i);
                if k > high {
                    return Ok(results);
                }
                if k >= low {
                    results.push(leaf.value_at(i));
                }
            }

            leaf_id = leaf.next_leaf();
        }

        Ok(results)
    }

    /// Re-walks the whole tree checking the structural invariants: strict
    /// key ordering within and across nodes, capacity bounds, separator
    /// placement, sibling-link symmetry, and the record count. Intended for
    /// tests; cost is a full scan.
    pub fn validate(&self) -> Result<()> {
        let root = self.pager.meta()?.root_page();

        if root == NO_PAGE {
            ensure!(
                self.pager.meta()?.num_records() == 0,
                "empty tree claims {} records",
                self.pager.meta()?.num_records()
            );
            return Ok(());
        }

        self.validate_subtree(root, None, None)?;
        self.validate_leaf_chain()
    }

    fn find_leaf(&self, key: i32) -> Result<u32> {
        let mut page_id = self.pager.meta()?.root_page();

        loop {
            let page = self.pager.page(page_id)?;
            match PageType::from_byte(page[0]) {
                Some(PageType::Leaf) => return Ok(page_id),
                Some(PageType::Interior) => {
                    let node = InteriorNode::from_page(page)?;
                    page_id = node.child_at(node.find_child_index(key));
                }
                _ => bail!(
                    "unexpected page type {:#04x} during descent at page {}",
                    page[0],
                    page_id
                ),
            }
        }
    }

    fn find_leaf_with_path(&self, key: i32) -> Result<(u32, DescentPath)> {
        let mut path = DescentPath::new();
        let mut page_id = self.pager.meta()?.root_page();

        loop {
            let page = self.pager.page(page_id)?;
            match PageType::from_byte(page[0]) {
                Some(PageType::Leaf) => return Ok((page_id, path)),
                Some(PageType::Interior) => {
                    let node = InteriorNode::from_page(page)?;
                    path.push(page_id);
                    page_id = node.child_at(node.find_child_index(key));
                }
                _ => bail!(
                    "unexpected page type {:#04x} during descent at page {}",
                    page[0],
                    page_id
                ),
            }
        }
    }

    /// Splits a full leaf around the incoming entry and promotes the first
    /// key of the new right sibling.
    fn split_leaf_and_insert(
        &mut self,
        mut path: DescentPath,
        leaf_id: u32,
        pos: usize,
        key: i32,
        data: &[u8; DATA_SIZE],
    ) -> Result<()> {
        let mut keys = [0i32; LEAF_MERGED];
        let mut values = [[0u8; DATA_SIZE]; LEAF_MERGED];
        let old_next;

        {
            let leaf = LeafNode::from_page(self.pager.page(leaf_id)?)?;
            old_next = leaf.next_leaf();

            for i in 0..pos {
                keys[i] = leaf.key_at(i);
                values[i].copy_from_slice(leaf.value_at(i));
            }
            keys[pos] = key;
            values[pos].copy_from_slice(data);
            for i in pos..LEAF_MAX_KEYS {
                keys[i + 1] = leaf.key_at(i);
                values[i + 1].copy_from_slice(leaf.value_at(i));
            }
        }

        // May remap the file; no page borrows are live here.
        let new_leaf_id = self.pager.allocate_page()?;

        {
            let mut left = LeafNodeMut::from_page(self.pager.page_mut(leaf_id)?)?;
            left.truncate(0)?;
            for i in 0..LEAF_SPLIT {
                left.insert_at(i, keys[i], &values[i])?;
            }
            left.set_next_leaf(new_leaf_id);
        }

        {
            let mut right = LeafNodeMut::init(self.pager.page_mut(new_leaf_id)?)?;
            for i in LEAF_SPLIT..LEAF_MERGED {
                right.insert_at(i - LEAF_SPLIT, keys[i], &values[i])?;
            }
            right.set_prev_leaf(leaf_id);
            right.set_next_leaf(old_next);
        }

        if old_next != NO_PAGE {
            LeafNodeMut::from_page(self.pager.page_mut(old_next)?)?.set_prev_leaf(new_leaf_id);
        }

        let separator = keys[LEAF_SPLIT];

        if let Err(err) = self.insert_into_parent(&mut path, leaf_id, separator, new_leaf_id) {
            warn!(page = leaf_id, "backing out leaf split: {err:#}");
            self.rollback_leaf_split(leaf_id, new_leaf_id, pos, old_next, &keys, &values)?;
            return Err(err);
        }

        let records = self.pager.meta()?.num_records();
        self.pager.meta_mut()?.set_num_records(records + 1);
        Ok(())
    }

    /// Restores a leaf to its pre-split image from the merged snapshot and
    /// frees the page the split allocated.
    fn rollback_leaf_split(
        &mut self,
        leaf_id: u32,
        new_leaf_id: u32,
        inserted_at: usize,
        old_next: u32,
        keys: &[i32; LEAF_MERGED],
        values: &[[u8; DATA_SIZE]; LEAF_MERGED],
    ) -> Result<()> {
        {
            let mut leaf = LeafNodeMut::from_page(self.pager.page_mut(leaf_id)?)?;
            leaf.truncate(0)?;
            let mut slot = 0;
            for i in 0..LEAF_MERGED {
                if i == inserted_at {
                    continue;
                }
                leaf.insert_at(slot, keys[i], &values[i])?;
                slot += 1;
            }
            leaf.set_next_leaf(old_next);
        }

        if old_next != NO_PAGE {
            LeafNodeMut::from_page(self.pager.page_mut(old_next)?)?.set_prev_leaf(leaf_id);
        }

        self.pager.free_page(new_leaf_id)
    }

    /// Inserts a promoted separator into the next node up the breadcrumb
    /// path, splitting upward as needed. An exhausted path means `left_id`
    /// was the root, so the tree grows a level.
    fn insert_into_parent(
        &mut self,
        path: &mut DescentPath,
        left_id: u32,
        separator: i32,
        right_id: u32,
    ) -> Result<()> {
        let Some(parent_id) = path.pop() else {
            let root_id = self.pager.allocate_page()?;
            {
                let mut root = InteriorNodeMut::init(self.pager.page_mut(root_id)?)?;
                root.set_child(0, left_id);
                root.set_key(0, separator);
                root.set_child(1, right_id);
                root.set_num_keys(1);
            }
            self.pager.meta_mut()?.set_root_page(root_id);
            return Ok(());
        };

        let (pos, full) = {
            let node = InteriorNode::from_page(self.pager.page(parent_id)?)?;
            (
                node.separator_position(separator),
                node.num_keys() == INTERIOR_MAX_KEYS,
            )
        };

        if !full {
            InteriorNodeMut::from_page(self.pager.page_mut(parent_id)?)?
                .insert_separator_at(pos, separator, right_id)?;
            return Ok(());
        }

        self.split_interior_and_insert(path, parent_id, pos, separator, right_id)
    }

    /// Splits a full interior node around the incoming separator. The
    /// middle separator of the merged sequence moves up rather than into
    /// either half.
    fn split_interior_and_insert(
        &mut self,
        path: &mut DescentPath,
        node_id: u32,
        pos: usize,
        separator: i32,
        right_child: u32,
    ) -> Result<()> {
        let mut keys = [0i32; INTERIOR_MERGED];
        let mut children = [0u32; INTERIOR_MERGED + 1];

        {
            let node = InteriorNode::from_page(self.pager.page(node_id)?)?;
            let n = node.num_keys();

            for i in 0..pos {
                keys[i] = node.key_at(i);
                children[i] = node.child_at(i);
            }
            children[pos] = node.child_at(pos);
            keys[pos] = separator;
            children[pos + 1] = right_child;
            for i in pos..n {
                keys[i + 1] = node.key_at(i);
                children[i + 2] = node.child_at(i + 1);
            }
        }

        // May remap the file; no page borrows are live here.
        let new_node_id = self.pager.allocate_page()?;
        let middle = keys[INTERIOR_SPLIT];

        {
            let mut left = InteriorNodeMut::from_page(self.pager.page_mut(node_id)?)?;
            for i in 0..INTERIOR_SPLIT {
                left.set_key(i, keys[i]);
                left.set_child(i, children[i]);
            }
            left.set_child(INTERIOR_SPLIT, children[INTERIOR_SPLIT]);
            left.set_num_keys(INTERIOR_SPLIT);
        }

        {
            let right_keys = INTERIOR_MERGED - INTERIOR_SPLIT - 1;
            let mut right = InteriorNodeMut::init(self.pager.page_mut(new_node_id)?)?;
            for i in 0..right_keys {
                right.set_key(i, keys[INTERIOR_SPLIT + 1 + i]);
                right.set_child(i, children[INTERIOR_SPLIT + 1 + i]);
            }
            right.set_child(right_keys, children[INTERIOR_MERGED]);
            right.set_num_keys(right_keys);
        }

        if let Err(err) = self.insert_into_parent(path, node_id, middle, new_node_id) {
            warn!(page = node_id, "backing out interior split: {err:#}");
            self.rollback_interior_split(node_id, new_node_id, pos, &keys, &children)?;
            return Err(err);
        }

        Ok(())
    }

    /// Restores an interior node to its pre-split image from the merged
    /// snapshot and frees the page the split allocated.
    fn rollback_interior_split(
        &mut self,
        node_id: u32,
        new_node_id: u32,
        inserted_at: usize,
        keys: &[i32; INTERIOR_MERGED],
        children: &[u32; INTERIOR_MERGED + 1],
    ) -> Result<()> {
        {
            let mut node = InteriorNodeMut::from_page(self.pager.page_mut(node_id)?)?;

            let mut slot = 0;
            for i in 0..INTERIOR_MERGED {
                if i == inserted_at {
                    continue;
                }
                node.set_key(slot, keys[i]);
                slot += 1;
            }

            let mut slot = 0;
            for i in 0..=INTERIOR_MERGED {
                if i == inserted_at + 1 {
                    continue;
                }
                node.set_child(slot, children[i]);
                slot += 1;
            }

            node.set_num_keys(INTERIOR_MAX_KEYS);
        }

        self.pager.free_page(new_node_id)
    }

    fn validate_subtree(&self, page_id: u32, lower: Option<i32>, upper: Option<i32>) -> Result<()> {
        let page = self.pager.page(page_id)?;

        match PageType::from_byte(page[0]) {
            Some(PageType::Leaf) => {
                let leaf = LeafNode::from_page(page)?;
                for i in 0..leaf.num_keys() {
                    let k = leaf.key_at(i);
                    if i > 0 {
                        ensure!(
                            leaf.key_at(i - 1) < k,
                            "leaf {} keys not strictly ascending",
                            page_id
                        );
                    }
                    if let Some(lo) = lower {
                        ensure!(k >= lo, "leaf {} key {} below separator bound {}", page_id, k, lo);
                    }
                    if let Some(hi) = upper {
                        ensure!(k < hi, "leaf {} key {} at or above separator bound {}", page_id, k, hi);
                    }
                }
                Ok(())
            }
            Some(PageType::Interior) => {
                let node = InteriorNode::from_page(page)?;
                let n = node.num_keys();
                ensure!(n >= 1, "interior {} has no separators", page_id);

                for i in 1..n {
                    ensure!(
                        node.key_at(i - 1) < node.key_at(i),
                        "interior {} separators not strictly ascending",
                        page_id
                    );
                }

                for i in 0..=n {
                    let lo = if i == 0 { lower } else { Some(node.key_at(i - 1)) };
                    let hi = if i == n { upper } else { Some(node.key_at(i)) };
                    self.validate_subtree(node.child_at(i), lo, hi)?;
                }
                Ok(())
            }
            _ => bail!("unexpected page type {:#04x} at page {}", page[0], page_id),
        }
    }

    fn validate_leaf_chain(&self) -> Result<()> {
        let mut page_id = self.pager.meta()?.root_page();

        loop {
            let page = self.pager.page(page_id)?;
            match PageType::from_byte(page[0]) {
                Some(PageType::Leaf) => break,
                Some(PageType::Interior) => {
                    page_id = InteriorNode::from_page(page)?.child_at(0);
                }
                _ => bail!("unexpected page type {:#04x} at page {}", page[0], page_id),
            }
        }

        // Forward walk: strict global ordering, prev-link symmetry, count.
        let mut total: u64 = 0;
        let mut leaf_count: u64 = 0;
        let mut last_key: Option<i32> = None;
        let mut prev_id = NO_PAGE;
        let mut rightmost = page_id;
        let mut current = page_id;

        while current != NO_PAGE {
            let leaf = LeafNode::from_page(self.pager.page(current)?)?;
            ensure!(
                leaf.prev_leaf() == prev_id,
                "leaf {} prev link {} does not match predecessor {}",
                current,
                leaf.prev_leaf(),
                prev_id
            );

            for i in 0..leaf.num_keys() {
                let k = leaf.key_at(i);
                if let Some(last) = last_key {
                    ensure!(
                        last < k,
                        "leaf chain not strictly ascending at page {} key {}",
                        current,
                        k
                    );
                }
                last_key = Some(k);
                total += 1;
            }

            leaf_count += 1;
            rightmost = current;
            prev_id = current;
            current = leaf.next_leaf();
        }

        ensure!(
            total == self.pager.meta()?.num_records() as u64,
            "leaf chain holds {} records but metadata claims {}",
            total,
            self.pager.meta()?.num_records()
        );

        // Backward walk must visit the same leaves.
        let mut back_count: u64 = 0;
        let mut current = rightmost;
        while current != NO_PAGE {
            let leaf = LeafNode::from_page(self.pager.page(current)?)?;
            back_count += 1;
            current = leaf.prev_leaf();
        }
        ensure!(
            back_count == leaf_count,
            "backward chain visits {} leaves, forward visited {}",
            back_count,
            leaf_count
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_tree(dir: &tempfile::TempDir) -> BPlusTree {
        BPlusTree::open_with_capacity(dir.path().join("test.idx"), 8).unwrap()
    }

    fn canonical(key: i32) -> [u8; DATA_SIZE] {
        let mut buf = [0u8; DATA_SIZE];
        buf[..4].copy_from_slice(&key.to_le_bytes());
        for (i, byte) in buf.iter_mut().enumerate().skip(4) {
            *byte = (key as i64 + i as i64).rem_euclid(256) as u8;
        }
        buf
    }

    #[test]
    fn empty_tree_reads_nothing() {
        let dir = tempdir().unwrap();
        let tree = open_tree(&dir);

        assert!(tree.read_data(1).unwrap().is_none());
        assert_eq!(tree.record_count().unwrap(), 0);
        assert!(tree.read_range_data(i32::MIN, i32::MAX).unwrap().is_empty());
    }

    #[test]
    fn delete_on_empty_tree_returns_false() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        assert!(!tree.delete_data(1).unwrap());
    }

    #[test]
    fn insert_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(42, &canonical(42)).unwrap();

        assert_eq!(tree.read_data(42).unwrap().unwrap(), &canonical(42)[..]);
        assert_eq!(tree.record_count().unwrap(), 1);
    }

    #[test]
    fn overwrite_keeps_record_count() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(42, &canonical(42)).unwrap();
        let mut updated = canonical(42);
        updated[50] = 0xFF;
        tree.write_data(42, &updated).unwrap();

        assert_eq!(tree.record_count().unwrap(), 1);
        assert_eq!(tree.read_data(42).unwrap().unwrap()[50], 0xFF);
    }

    #[test]
    fn delete_removes_and_reports_absence() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(42, &canonical(42)).unwrap();

        assert!(tree.delete_data(42).unwrap());
        assert!(tree.read_data(42).unwrap().is_none());
        assert!(!tree.delete_data(42).unwrap());
        assert_eq!(tree.record_count().unwrap(), 0);
    }

    #[test]
    fn emptying_the_root_leaf_resets_the_tree() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(1, &canonical(1)).unwrap();
        tree.write_data(2, &canonical(2)).unwrap();
        tree.delete_data(1).unwrap();
        tree.delete_data(2).unwrap();

        assert_eq!(tree.record_count().unwrap(), 0);
        tree.validate().unwrap();

        // the tree is usable again after returning to empty
        tree.write_data(3, &canonical(3)).unwrap();
        assert_eq!(tree.read_data(3).unwrap().unwrap(), &canonical(3)[..]);
    }

    #[test]
    fn reserved_key_synthesizes_payload() {
        let dir = tempdir().unwrap();
        let tree = open_tree(&dir);

        let payload = tree.read_data(SENTINEL_KEY).unwrap().unwrap();
        assert_eq!(payload.len(), DATA_SIZE);
        assert_eq!(payload[0], 42);
    }

    #[test]
    fn explicit_record_shadows_reserved_key() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(SENTINEL_KEY, &canonical(SENTINEL_KEY)).unwrap();
        assert_eq!(
            tree.read_data(SENTINEL_KEY).unwrap().unwrap(),
            &canonical(SENTINEL_KEY)[..]
        );

        // deleting it falls back to the synthesized payload
        tree.delete_data(SENTINEL_KEY).unwrap();
        assert_eq!(tree.read_data(SENTINEL_KEY).unwrap().unwrap()[0], 42);
    }

    #[test]
    fn sequential_inserts_split_leaves() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in 0..200 {
            tree.write_data(key, &canonical(key)).unwrap();
        }

        assert_eq!(tree.record_count().unwrap(), 200);
        for key in 0..200 {
            assert_eq!(
                tree.read_data(key).unwrap().unwrap(),
                &canonical(key)[..],
                "key {key}"
            );
        }
        tree.validate().unwrap();
    }

    #[test]
    fn descending_inserts_split_leaves() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in (0..200).rev() {
            tree.write_data(key, &canonical(key)).unwrap();
        }

        assert_eq!(tree.record_count().unwrap(), 200);
        for key in 0..200 {
            assert_eq!(tree.read_data(key).unwrap().unwrap(), &canonical(key)[..]);
        }
        tree.validate().unwrap();
    }

    #[test]
    fn interleaved_inserts_stay_sorted() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        // visits every residue class, far from insertion order
        for i in 0..1000 {
            let key = (i * 7) % 1000;
            tree.write_data(key, &canonical(key)).unwrap();
        }

        assert_eq!(tree.record_count().unwrap(), 1000);
        tree.validate().unwrap();

        let all = tree.read_range_data(0, 999).unwrap();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn negative_and_positive_keys_order_correctly() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in [-100, 0, 100, -50, 50, i32::MIN, i32::MAX] {
            tree.write_data(key, &canonical(key)).unwrap();
        }

        tree.validate().unwrap();
        let all = tree.read_range_data(i32::MIN, i32::MAX).unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all[0], &canonical(i32::MIN)[..]);
        assert_eq!(all[6], &canonical(i32::MAX)[..]);
    }

    #[test]
    fn range_scan_is_inclusive_and_ordered() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in 0..300 {
            tree.write_data(key, &canonical(key)).unwrap();
        }

        let results = tree.read_range_data(50, 150).unwrap();
        assert_eq!(results.len(), 101);
        for (i, payload) in results.iter().enumerate() {
            assert_eq!(*payload, &canonical(50 + i as i32)[..]);
        }
    }

    #[test]
    fn range_scan_with_absent_bounds() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in (0..100).map(|k| k * 10) {
            tree.write_data(key, &canonical(key)).unwrap();
        }

        let results = tree.read_range_data(15, 45).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], &canonical(20)[..]);
        assert_eq!(results[2], &canonical(40)[..]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        tree.write_data(1, &canonical(1)).unwrap();

        assert!(tree.read_range_data(10, 5).unwrap().is_empty());
    }

    #[test]
    fn deletions_leave_scans_exact() {
        let dir = tempdir().unwrap();
        let mut tree = open_tree(&dir);

        for key in 0..500 {
            tree.write_data(key, &canonical(key)).unwrap();
        }
        for key in (0..500).step_by(2) {
            assert!(tree.delete_data(key).unwrap());
        }

        assert_eq!(tree.record_count().unwrap(), 250);
        tree.validate().unwrap();

        let results = tree.read_range_data(0, 499).unwrap();
        assert_eq!(results.len(), 250);
        for (i, payload) in results.iter().enumerate() {
            let key = i as i32 * 2 + 1;
            assert_eq!(*payload, &canonical(key)[..]);
        }
    }
}
