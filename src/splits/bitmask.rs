use std::cmp::Ordering;
use std::fmt::Display;
use std::ops::{BitAnd, BitOr, BitOrAssign, BitXor};

const WORD_BITS: usize = 64;

/// A set of taxon bit indices, used as a clade or split mask.
///
/// Bits are stored in `u64` words, so the mask is not limited to 64 or 128
/// taxa. Trailing zero words are always trimmed, which means two masks that
/// hold the same bits are equal and hash identically regardless of how they
/// were built.
///
/// Ordering is numeric: a mask compares as the unsigned integer whose binary
/// digits it holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bitmask {
    words: Vec<u64>,
}

impl Bitmask {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mask holding only `index`; a leaf's clade mask.
    pub fn singleton(index: usize) -> Self {
        let mut mask = Self::new();
        mask.set(index);
        mask
    }

    /// The mask holding bits `0..count`.
    pub fn with_low_bits(count: usize) -> Self {
        let mut words = vec![u64::MAX; count / WORD_BITS];
        let remainder = count % WORD_BITS;
        if remainder > 0 {
            words.push((1u64 << remainder) - 1);
        }
        Self { words }
    }

    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::new();
        for index in indices {
            mask.set(index);
        }
        mask
    }

    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    pub fn unset(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word < self.words.len() {
            self.words[word] &= !(1u64 << (index % WORD_BITS));
            self.trim();
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1u64 << (index % WORD_BITS)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of taxa in the mask.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn lowest_bit(&self) -> Option<usize> {
        self.words.iter().enumerate().find_map(|(i, &word)| {
            if word == 0 {
                None
            } else {
                Some(i * WORD_BITS + word.trailing_zeros() as usize)
            }
        })
    }

    /// Number of binary digits needed to print the mask.
    pub fn bit_len(&self) -> usize {
        match self.words.last() {
            Some(&last) => {
                (self.words.len() - 1) * WORD_BITS
                    + (WORD_BITS - last.leading_zeros() as usize)
            }
            None => 0,
        }
    }

    pub fn union_with(&mut self, other: &Bitmask) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn union(&self, other: &Bitmask) -> Bitmask {
        let mut rv = self.clone();
        rv.union_with(other);
        rv
    }

    pub fn intersection(&self, other: &Bitmask) -> Bitmask {
        let mut rv = Bitmask {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        rv.trim();
        rv
    }

    /// Bits of `self` that are not in `other`.
    pub fn difference(&self, other: &Bitmask) -> Bitmask {
        let mut rv = Bitmask {
            words: self
                .words
                .iter()
                .enumerate()
                .map(|(i, a)| a & !other.words.get(i).copied().unwrap_or(0))
                .collect(),
        };
        rv.trim();
        rv
    }

    pub fn symmetric_difference(&self, other: &Bitmask) -> Bitmask {
        let len = self.words.len().max(other.words.len());
        let mut rv = Bitmask {
            words: (0..len)
                .map(|i| {
                    self.words.get(i).copied().unwrap_or(0)
                        ^ other.words.get(i).copied().unwrap_or(0)
                })
                .collect(),
        };
        rv.trim();
        rv
    }

    /// The other side of the bipartition, relative to `all`.
    pub fn complement(&self, all: &Bitmask) -> Bitmask {
        all.difference(self)
    }

    pub fn is_subset_of(&self, other: &Bitmask) -> bool {
        self.words.len() <= other.words.len()
            && self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    pub fn is_disjoint(&self, other: &Bitmask) -> bool {
        self.words.iter().zip(&other.words).all(|(a, b)| a & b == 0)
    }

    /// Two clade masks can coexist in one tree when they nest or are
    /// disjoint.
    pub fn is_compatible_with(&self, other: &Bitmask) -> bool {
        self.is_disjoint(other)
            || self.is_subset_of(other)
            || other.is_subset_of(self)
    }

    /// Canonical key for the split this mask induces.
    ///
    /// Rooted trees key on the clade mask itself. For unrooted trees a mask
    /// and its complement describe the same bipartition, so the numerically
    /// smaller of the two is used. The full mask has an empty complement and
    /// keys on itself.
    pub fn canonical(&self, all: &Bitmask, is_rooted: bool) -> Bitmask {
        if is_rooted {
            return self.clone();
        }
        let complement = self.complement(all);
        if !complement.is_empty() && complement < *self {
            complement
        } else {
            self.clone()
        }
    }

    /// Whether the split has a single taxon (or all but one) on one side.
    pub fn is_trivial(&self, all: &Bitmask) -> bool {
        let count = self.count_ones();
        let total = all.count_ones();
        count <= 1 || count + 1 >= total
    }

    /// Iterates over the set bit indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| i * WORD_BITS + bit)
        })
    }

    /// Renders the mask as `width` binary digits, bit index 0 rightmost.
    pub fn to_bit_string(&self, width: usize) -> String {
        (0..width.max(self.bit_len()))
            .rev()
            .map(|index| if self.contains(index) { '1' } else { '0' })
            .collect()
    }

    /// The mask as a single integer, if it fits into one.
    pub fn to_u128(&self) -> Option<u128> {
        match self.words.as_slice() {
            [] => Some(0),
            [low] => Some(*low as u128),
            [low, high] => Some((*high as u128) << 64 | *low as u128),
            _ => None,
        }
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            _ = self.words.pop();
        }
    }
}

impl From<u64> for Bitmask {
    fn from(value: u64) -> Self {
        let mut rv = Bitmask { words: vec![value] };
        rv.trim();
        rv
    }
}

impl From<u128> for Bitmask {
    fn from(value: u128) -> Self {
        let mut rv = Bitmask { words: vec![value as u64, (value >> 64) as u64] };
        rv.trim();
        rv
    }
}

impl FromIterator<usize> for Bitmask {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self::from_indices(iter)
    }
}

impl Ord for Bitmask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.words
            .len()
            .cmp(&other.words.len())
            .then_with(|| self.words.iter().rev().cmp(other.words.iter().rev()))
    }
}

impl PartialOrd for Bitmask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl BitOr for &Bitmask {
    type Output = Bitmask;

    fn bitor(self, rhs: Self) -> Bitmask {
        self.union(rhs)
    }
}

impl BitAnd for &Bitmask {
    type Output = Bitmask;

    fn bitand(self, rhs: Self) -> Bitmask {
        self.intersection(rhs)
    }
}

impl BitXor for &Bitmask {
    type Output = Bitmask;

    fn bitxor(self, rhs: Self) -> Bitmask {
        self.symmetric_difference(rhs)
    }
}

impl BitOrAssign<&Bitmask> for Bitmask {
    fn bitor_assign(&mut self, rhs: &Bitmask) {
        self.union_with(rhs);
    }
}

impl Display for Bitmask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", self.to_bit_string(0))
        }
    }
}
