/// Encoded width of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSize {
    Fixed(u16),
    Var,
}

/// One entry of a record kind's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    pub id: u16,
    pub size: FieldSize,
    /// Retired ids are never written but are still read from old files.
    pub retired: bool,
}

impl FieldDesc {
    #[must_use]
    pub const fn fixed(id: u16, size: u16) -> Self {
        FieldDesc {
            id,
            size: FieldSize::Fixed(size),
            retired: false,
        }
    }

    #[must_use]
    pub const fn var(id: u16) -> Self {
        FieldDesc {
            id,
            size: FieldSize::Var,
            retired: false,
        }
    }

    #[must_use]
    pub const fn retired(id: u16, size: u16) -> Self {
        FieldDesc {
            id,
            size: FieldSize::Fixed(size),
            retired: true,
        }
    }
}

/// An append-only field table. Ids run densely from 1 in table order.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldDesc],
}

impl Schema {
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldDesc]) -> Self {
        Schema { name, fields }
    }

    /// Highest id this schema knows about.
    #[must_use]
    pub fn max_id(&self) -> u16 {
        self.fields.len() as u16
    }

    #[must_use]
    pub fn get(&self, id: u16) -> Option<&FieldDesc> {
        let i = usize::from(id.checked_sub(1)?);
        self.fields.get(i)
    }

    /// True if entry `i` has id `i + 1` for every entry.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.fields
            .iter()
            .enumerate()
            .all(|(i, f)| usize::from(f.id) == i + 1)
    }
}
