use serde::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

/// Fixed-length bit vector indexed by absolute field number.
///
/// The length is fixed at construction to the total managed field count of a
/// class chain. Indices at or beyond the length are ignored by mutators and
/// read as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldBitSet {
    words: Vec<u64>,
    len: usize,
}

impl FieldBitSet {
    /// A bitset of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// A bitset of `len` bits, all set.
    pub fn full(len: usize) -> Self {
        let mut bits = Self::new(len);
        for index in 0..len {
            bits.insert(index);
        }
        bits
    }

    /// Number of addressable bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bitset addresses no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bit `index`. Returns `true` if the bit was previously clear.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = Self::locate(index);
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Clear bit `index`. Returns `true` if the bit was previously set.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = Self::locate(index);
        let was_set = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        was_set
    }

    /// Returns `true` if bit `index` is set.
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = Self::locate(index);
        self.words[word] & mask != 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if any bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }

    /// Indices of set bits, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |i| self.contains(*i))
    }

    /// Change the length to `len`. New bits are clear; bits at or beyond
    /// `len` are dropped.
    pub fn resize(&mut self, len: usize) {
        self.words.resize(len.div_ceil(WORD_BITS), 0);
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        self.len = len;
    }

    fn locate(index: usize) -> (usize, u64) {
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }
}

impl FromIterator<usize> for FieldBitSet {
    /// Collect set indices; the length is one past the highest index.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let indices: Vec<usize> = iter.into_iter().collect();
        let len = indices.iter().max().map_or(0, |m| m + 1);
        let mut bits = Self::new(len);
        for index in indices {
            bits.insert(index);
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resize_grows_clear_and_truncates() {
        let mut bits: FieldBitSet = [1, 2].into_iter().collect();
        bits.resize(70);
        assert_eq!(bits.len(), 70);
        assert!(bits.insert(69));
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![1, 2, 69]);

        bits.resize(2);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![1]);
        bits.resize(64);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn new_is_clear() {
        let bits = FieldBitSet::new(70);
        assert_eq!(bits.len(), 70);
        assert!(!bits.any());
        assert_eq!(bits.count_ones(), 0);
    }

    #[test]
    fn insert_and_remove_across_words() {
        let mut bits = FieldBitSet::new(130);
        assert!(bits.insert(0));
        assert!(bits.insert(64));
        assert!(bits.insert(129));
        assert!(!bits.insert(64));
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
        assert!(bits.remove(64));
        assert!(!bits.contains(64));
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut bits = FieldBitSet::new(3);
        assert!(!bits.insert(3));
        assert!(!bits.contains(3));
        assert!(!bits.remove(10));
    }

    #[test]
    fn full_sets_every_bit() {
        let bits = FieldBitSet::full(5);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn from_iterator_sizes_to_highest_index() {
        let bits: FieldBitSet = [1, 4].into_iter().collect();
        assert_eq!(bits.len(), 5);
        assert!(bits.contains(4));
    }

    proptest! {
        #[test]
        fn iter_matches_inserted(len in 1usize..200, picks in proptest::collection::vec(0usize..200, 0..40)) {
            let mut bits = FieldBitSet::new(len);
            let mut expected: Vec<usize> = picks.iter().copied().filter(|i| *i < len).collect();
            for i in &picks {
                bits.insert(*i);
            }
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(bits.iter().collect::<Vec<_>>(), expected.clone());
            prop_assert_eq!(bits.count_ones(), expected.len());
        }
    }
}
