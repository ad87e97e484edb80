//! Success-only memo cell.
//!
//! A `Memo` is either unset or holds a value forever. A failed computation
//! leaves it unset, so the next caller recomputes.

use once_cell::sync::OnceCell;

pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Memo<T> {
    pub const fn new() -> Self {
        Memo {
            cell: OnceCell::new(),
        }
    }

    /// Return the stored value, computing it first if unset.
    ///
    /// Concurrent first callers block until one computation finishes; only
    /// that one runs `init`. An `Err` is returned as-is and not stored.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        self.cell.get_or_try_init(init)
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Memo").field(value).finish(),
            None => f.write_str("Memo(<unset>)"),
        }
    }
}
