use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use wire::DecodeError;

/// Outcome of looking an object up during the size pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// First occurrence; the object will be written literally and later
    /// occurrences will refer to this id.
    New(u32),
    /// Already reserved under this id.
    Existing(u32),
}

/// Outcome of looking an object up during the fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Literal,
    Reference(u32),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: u32,
    emitted: bool,
}

/// Object-to-id table used while encoding.
#[derive(Debug, Clone)]
pub struct WriteTable<K> {
    map: HashMap<K, Slot>,
    next: u32,
}

impl<K: Hash + Eq> Default for WriteTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> WriteTable<K> {
    /// A table whose first id is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(0)
    }

    #[must_use]
    pub fn with_base(base: u32) -> Self {
        Self {
            map: HashMap::new(),
            next: base,
        }
    }

    /// Size-pass lookup. Assigns the next id on first sight.
    pub fn reserve<Q>(&mut self, key: &Q) -> Reservation
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(slot) = self.map.get(key) {
            return Reservation::Existing(slot.id);
        }
        let id = self.next;
        self.next += 1;
        self.map.insert(
            key.to_owned(),
            Slot {
                id,
                emitted: false,
            },
        );
        Reservation::New(id)
    }

    /// Fill-pass lookup. The first emission of a reserved object is literal,
    /// every later one is a reference.
    pub fn emit<Q>(&mut self, key: &Q) -> Emission
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(slot) = self.map.get_mut(key) {
            if slot.emitted {
                return Emission::Reference(slot.id);
            }
            slot.emitted = true;
            return Emission::Literal;
        }
        let id = self.next;
        self.next += 1;
        self.map
            .insert(key.to_owned(), Slot { id, emitted: true });
        Emission::Literal
    }

    /// Registers an object that has been written out, returning its id.
    /// An object already present keeps its id.
    pub fn insert(&mut self, key: K) -> u32 {
        if let Some(slot) = self.map.get(&key) {
            return slot.id;
        }
        let id = self.next;
        self.next += 1;
        self.map.insert(key, Slot { id, emitted: true });
        id
    }

    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|s| s.id)
    }

    /// The id the next new object will receive.
    #[must_use]
    pub fn peek_next(&self) -> u32 {
        self.next
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Id-to-object table used while decoding.
#[derive(Debug, Clone)]
pub struct ReadTable<V> {
    name: &'static str,
    base: u32,
    items: Vec<V>,
}

impl<V> ReadTable<V> {
    /// A table whose first id is 0. `name` appears in lookup errors.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_base(name, 0)
    }

    #[must_use]
    pub fn with_base(name: &'static str, base: u32) -> Self {
        Self {
            name,
            base,
            items: Vec::new(),
        }
    }

    /// Appends `v` and returns the id it was given.
    ///
    /// # Errors
    ///
    /// [`DecodeError::ResourceExhausted`] if the table cannot grow.
    pub fn push(&mut self, v: V) -> Result<u32, DecodeError> {
        let id = self.next_id();
        self.items
            .try_reserve(1)
            .map_err(|_| DecodeError::ResourceExhausted {
                what: self.name,
                count: self.items.len() + 1,
            })?;
        self.items.push(v);
        Ok(id)
    }

    fn index(&self, id: u32) -> Result<usize, DecodeError> {
        id.checked_sub(self.base)
            .map(|i| i as usize)
            .filter(|&i| i < self.items.len())
            .ok_or(DecodeError::UnknownReference {
                table: self.name,
                id,
            })
    }

    /// # Errors
    ///
    /// [`DecodeError::UnknownReference`] if no object was stored under `id`.
    pub fn get(&self, id: u32) -> Result<&V, DecodeError> {
        let i = self.index(id)?;
        Ok(&self.items[i])
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut V, DecodeError> {
        let i = self.index(id)?;
        Ok(&mut self.items[i])
    }

    /// The id the next pushed object will receive.
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.base + self.items.len() as u32
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.items.iter()
    }

    /// Id of the first stored object matching `pred`.
    pub fn find_id<F>(&self, mut pred: F) -> Option<u32>
    where
        F: FnMut(&V) -> bool,
    {
        self.items
            .iter()
            .position(|v| pred(v))
            .map(|i| self.base + i as u32)
    }
}
