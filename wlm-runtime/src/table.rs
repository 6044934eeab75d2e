//! WebAssembly table implementation
//!
//! Tables hold nullable function references. `externref` tables exist for
//! linking but can only ever hold null, since reference instructions are
//! not supported in function bodies.

use wlm_error::{Error, Result};
use wlm_format::TableType;

use crate::func::FuncRef;
use crate::trap::{Trap, TrapKind};

/// A table instance
#[derive(Debug, Clone)]
pub struct Table {
    ty:       TableType,
    elements: Vec<Option<FuncRef>>,
}

impl Table {
    /// Allocate a table of null entries at its declared initial size.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the initial size exceeds `max_elements`
    /// or cannot be allocated.
    pub fn new(ty: TableType, max_elements: u32) -> Result<Self> {
        let len = ty.limits.min as usize;
        if ty.limits.min > max_elements {
            return Err(Error::resource_limit(format!(
                "table needs {len} elements, at most {max_elements} allowed"
            )));
        }
        let mut elements = Vec::new();
        if elements.try_reserve_exact(len).is_err() {
            return Err(Error::resource_limit(format!("host cannot allocate a table of {len} elements")));
        }
        elements.resize(len, None);
        Ok(Self { ty, elements })
    }

    /// Declared type
    pub fn ty(&self) -> TableType {
        self.ty
    }

    /// Current type: the declared maximum with the current size as minimum
    pub fn current_type(&self) -> TableType {
        let mut ty = self.ty;
        ty.limits.min = self.size();
        ty
    }

    /// Number of entries
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Entry at `index`
    pub fn get(&self, index: u32) -> core::result::Result<Option<FuncRef>, Trap> {
        self.elements
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Trap::with_message(TrapKind::TableOutOfBounds, format!("index {index} of {}", self.size())))
    }

    /// Replace the entry at `index`
    pub fn set(&mut self, index: u32, value: Option<FuncRef>) -> core::result::Result<(), Trap> {
        let size = self.size();
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or_else(|| Trap::with_message(TrapKind::TableOutOfBounds, format!("index {index} of {size}")))?;
        *slot = value;
        Ok(())
    }

    /// Copy `items` into the table starting at `offset`; nothing is written
    /// unless the whole range fits.
    pub fn init(&mut self, offset: u32, items: &[Option<FuncRef>]) -> core::result::Result<(), Trap> {
        let start = offset as usize;
        let end = start
            .checked_add(items.len())
            .filter(|end| *end <= self.elements.len())
            .ok_or_else(|| {
                Trap::with_message(
                    TrapKind::TableOutOfBounds,
                    format!("{} elements at {offset} in table of {}", items.len(), self.size()),
                )
            })?;
        self.elements[start..end].clone_from_slice(items);
        Ok(())
    }
}
