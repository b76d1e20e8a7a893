//! Variable binding table.
//!
//! A `VariableTable` maps variable names to the addresses of `f64` values owned by the
//! caller. The table does not own the storage and does not keep it alive.
//!
//! # Safety contract
//! Every address stored in the table must point to a valid, aligned `f64` for as long
//! as any compiled unit built from the table can still be evaluated. Rebinding a name
//! (or dropping the formula) is what ends that requirement for the old address.

use std::collections::HashMap;

use crate::expr::constant;

/// What happened when a name was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The name was not bound before
    Added,
    /// The name was bound to a different address
    Replaced,
    /// The name was already bound to this address
    Unchanged,
}

/// Mapping from variable name to an externally owned `f64`.
#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    entries: HashMap<String, *mut f64>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `address`, replacing any previous binding.
    ///
    /// Returns `None` for input that can never be bound: an empty name, one of the
    /// constant names `pi`/`e`, or a null address.
    pub fn bind(&mut self, name: &str, address: *mut f64) -> Option<Binding> {
        if name.is_empty() || constant(name).is_some() || address.is_null() {
            return None;
        }
        match self.entries.insert(name.to_string(), address) {
            None => Some(Binding::Added),
            Some(previous) if previous == address => Some(Binding::Unchanged),
            Some(_) => Some(Binding::Replaced),
        }
    }

    /// Returns the address bound to `name`.
    pub fn address(&self, name: &str) -> Option<*mut f64> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_rebind() {
        let mut a = 1.0;
        let mut b = 2.0;
        let (pa, pb) = (&mut a as *mut f64, &mut b as *mut f64);

        let mut table = VariableTable::new();
        assert_eq!(table.bind("x", pa), Some(Binding::Added));
        assert_eq!(table.bind("x", pa), Some(Binding::Unchanged));
        assert_eq!(table.bind("x", pb), Some(Binding::Replaced));
        assert_eq!(table.address("x"), Some(pb));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reject_invalid_bindings() {
        let mut a = 1.0;
        let pa = &mut a as *mut f64;

        let mut table = VariableTable::new();
        assert_eq!(table.bind("", pa), None);
        assert_eq!(table.bind("pi", pa), None);
        assert_eq!(table.bind("e", pa), None);
        assert_eq!(table.bind("x", std::ptr::null_mut()), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let mut a = 1.0;
        let pa = &mut a as *mut f64;

        let mut table = VariableTable::new();
        table.bind("z", pa);
        table.bind("alpha", pa);
        table.bind("m", pa);
        assert_eq!(table.names(), vec!["alpha", "m", "z"]);
    }
}
