use croaring::bitmap::Bitmap;

use std::fmt;

/// Compact set of u32 row positions, backed by a [roaring bitmap]. The
/// planner's candidate row sets, `IN` predicate pushdown and the tombstone
/// sidecar all carry one of these.
///
/// [roaring bitmap]: https://roaringbitmap.org
#[derive(Clone)]
pub struct RowSet {
    bitmap: Bitmap,
}

impl Default for RowSet {
    fn default() -> RowSet {
        RowSet { bitmap: Bitmap::create() }
    }
}

impl fmt::Debug for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::result::Result<(), fmt::Error> {
        write!(f, "RowSet<{}>", self.len())
    }
}

impl RowSet {
    pub fn new() -> RowSet {
        RowSet::default()
    }

    pub fn from_slice(rows: &[u32]) -> RowSet {
        let mut bitmap = Bitmap::create_with_capacity(rows.len() as u32);
        bitmap.add_many(rows);
        RowSet { bitmap }
    }

    #[inline]
    pub fn add(&mut self, row: u32) {
        self.bitmap.add(row)
    }

    #[inline]
    pub fn remove(&mut self, row: u32) {
        self.bitmap.remove(row)
    }

    #[inline]
    pub fn contains(&self, row: u32) -> bool {
        self.bitmap.contains(row)
    }

    pub fn len(&self) -> usize {
        self.bitmap.cardinality() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    pub fn or(&self, other: &RowSet) -> RowSet {
        RowSet { bitmap: self.bitmap.or(&other.bitmap) }
    }

    pub fn and(&self, other: &RowSet) -> RowSet {
        RowSet { bitmap: self.bitmap.and(&other.bitmap) }
    }

    pub fn andnot(&self, other: &RowSet) -> RowSet {
        RowSet { bitmap: self.bitmap.andnot(&other.bitmap) }
    }

    /// Row positions in ascending order.
    pub fn to_vec(&self) -> Vec<u32> {
        self.bitmap.to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bitmap.iter()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bitmap.serialize()
    }

    pub fn from_bytes(buf: &[u8]) -> RowSet {
        RowSet { bitmap: Bitmap::deserialize(buf) }
    }
}

#[cfg(test)]
#[path = "bitmap_test.rs"]
mod bitmap_test;
