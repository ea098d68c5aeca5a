use std::sync::Arc;

use intern::ReadTable;
use wire::{Addr, DecodeError, EncodeError};

use crate::{Cycle, List};

/// File ids of the list and cycle a measurement record belongs to, as
/// assigned by the file writer. Zero means none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefIds {
    pub list: u32,
    pub cycle: u32,
}

impl RefIds {
    /// Checks that every reference the record holds has a file id.
    pub(crate) fn check(
        &self,
        list: Option<&Arc<List>>,
        cycle: Option<&Arc<Cycle>>,
    ) -> Result<(), EncodeError> {
        if list.is_some() && self.list == 0 {
            return Err(EncodeError::DanglingReference("list without a file id"));
        }
        if cycle.is_some() && self.cycle == 0 {
            return Err(EncodeError::DanglingReference("cycle without a file id"));
        }
        Ok(())
    }
}

/// File-scoped tables a reader accumulates as it walks a file. Ids start
/// at 1.
#[derive(Debug, Clone)]
pub struct FileTables {
    pub lists: ReadTable<Arc<List>>,
    pub cycles: ReadTable<Arc<Cycle>>,
    /// Populated only by deprecated address objects in old files.
    pub addrs: ReadTable<Addr>,
}

impl Default for FileTables {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTables {
    #[must_use]
    pub fn new() -> Self {
        FileTables {
            lists: ReadTable::with_base("list", 1),
            cycles: ReadTable::with_base("cycle", 1),
            addrs: ReadTable::with_base("legacy address", 1),
        }
    }

    /// Resolves a list id read from a record; 0 means the record has none.
    pub fn list(&self, id: u32) -> Result<Option<Arc<List>>, DecodeError> {
        if id == 0 {
            return Ok(None);
        }
        self.lists.get(id).map(|l| Some(Arc::clone(l)))
    }

    pub fn cycle(&self, id: u32) -> Result<Option<Arc<Cycle>>, DecodeError> {
        if id == 0 {
            return Ok(None);
        }
        self.cycles.get(id).map(|c| Some(Arc::clone(c)))
    }

    /// File ids of a decoded record's list and cycle, for encoding it again
    /// into the same file. References not held by these tables get 0.
    #[must_use]
    pub fn ref_ids(&self, list: Option<&Arc<List>>, cycle: Option<&Arc<Cycle>>) -> RefIds {
        let list = list.map_or(0, |l| {
            self.lists
                .find_id(|x| Arc::ptr_eq(x, l))
                .or_else(|| self.lists.find_id(|x| x == l))
                .unwrap_or(0)
        });
        // a later cycle stop replaces the table entry, so match on identity
        let cycle = cycle.map_or(0, |c| {
            let key = c.key();
            self.cycles.find_id(|x| x.key() == key).unwrap_or(0)
        });
        RefIds { list, cycle }
    }
}
