//! # Presence Flags
//!
//! A variable-length bitmap saying which optional fields of a record follow.
//!
//! Field ids start at 1. Id `i` lives in byte `(i - 1) / 7`, bit `(i - 1) % 7`.
//! The high bit of every byte except the last is a continuation marker, so a
//! reader knows where the bitmap ends without a length prefix:
//!
//! ```text
//! ids 1..=7    ids 8..=14   ids 15..=21
//! [1xxxxxxx]   [1xxxxxxx]   [0xxxxxxx]
//! ```
//!
//! Trailing bytes with no set bits are never written. An empty bitmap folds
//! to the single byte `0x00`.
//!
//! ## Example
//!
//! ```rust
//! use flags::Flags;
//!
//! let mut f = Flags::new();
//! f.set(1);
//! f.set(9);
//! assert_eq!(f.fold(), vec![0x81, 0x02]);
//! assert_eq!(Flags::unfold(&f.fold()).unwrap().0, f);
//! ```

use wire::{DecodeError, WireReader, WireWriter};

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u8 = 0x7f;

/// Longest bitmap accepted on decode: enough groups to reach id
/// `u16::MAX`. Bits of the last group past that id name no field and are
/// ignored by [`Flags::ids`].
const MAX_GROUPS: usize = (u16::MAX as usize + 6) / 7;

/// A set of field ids, kept as 7-bit groups.
#[derive(Clone, Default)]
pub struct Flags {
    groups: Vec<u8>,
}

impl Flags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks field `id` present.
    ///
    /// # Panics
    ///
    /// Panics if `id` is 0; field ids start at 1.
    pub fn set(&mut self, id: u16) {
        assert!(id > 0, "field ids start at 1");
        let (group, bit) = Self::locate(id);
        if group >= self.groups.len() {
            self.groups.resize(group + 1, 0);
        }
        self.groups[group] |= 1 << bit;
    }

    #[must_use]
    pub fn is_set(&self, id: u16) -> bool {
        if id == 0 {
            return false;
        }
        let (group, bit) = Self::locate(id);
        self.groups
            .get(group)
            .is_some_and(|g| (g >> bit) & 1 == 1)
    }

    /// Highest id present, or 0 for an empty set.
    #[must_use]
    pub fn max_id(&self) -> u16 {
        self.ids().last().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|&g| g == 0)
    }

    /// Present ids in ascending order. Bits beyond id `u16::MAX` are
    /// skipped.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.groups.iter().enumerate().flat_map(|(g, &bits)| {
            (0..7u32)
                .filter(move |b| (bits >> b) & 1 == 1)
                .filter_map(move |b| u16::try_from(g as u32 * 7 + b + 1).ok())
        })
    }

    /// Number of bytes [`Flags::fold`] produces.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.significant_groups().max(1)
    }

    /// Folds the set into its on-disk bytes.
    #[must_use]
    pub fn fold(&self) -> Vec<u8> {
        let n = self.significant_groups();
        if n == 0 {
            return vec![0];
        }
        let mut out = self.groups[..n].to_vec();
        for b in &mut out[..n - 1] {
            *b |= CONTINUATION;
        }
        out
    }

    pub fn write_to(&self, w: &mut WireWriter) {
        w.put_bytes(&self.fold());
    }

    /// Parses a bitmap from the front of `bytes`, returning the set and the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if the input ends while the continuation
    /// bit is still set.
    pub fn unfold(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let mut r = WireReader::new(bytes);
        let flags = Self::read_from(&mut r)?;
        Ok((flags, r.position()))
    }

    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let mut groups = Vec::new();
        loop {
            let b = r.u8()?;
            groups.push(b & GROUP_MASK);
            if b & CONTINUATION == 0 {
                break;
            }
            if groups.len() >= MAX_GROUPS {
                return Err(DecodeError::Malformed("presence bitmap length"));
            }
        }
        Ok(Flags { groups })
    }

    fn locate(id: u16) -> (usize, u16) {
        let i = id - 1;
        (usize::from(i / 7), i % 7)
    }

    fn significant_groups(&self) -> usize {
        self.groups
            .iter()
            .rposition(|&g| g != 0)
            .map_or(0, |p| p + 1)
    }
}

impl PartialEq for Flags {
    fn eq(&self, other: &Self) -> bool {
        let n = self.significant_groups();
        n == other.significant_groups() && self.groups[..n] == other.groups[..n]
    }
}

impl Eq for Flags {}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

impl FromIterator<u16> for Flags {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut f = Flags::new();
        for id in iter {
            f.set(id);
        }
        f
    }
}

#[cfg(test)]
mod tests;
