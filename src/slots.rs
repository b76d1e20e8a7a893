//! Variable slot cache for compiled routines.
//!
//! Generated code never copies a variable's value into the routine. Instead, each
//! distinct external address gets one storage cell: an imported data symbol that the
//! JIT resolves to that exact address. Loads and stores emitted against the cell read
//! and write the caller's `f64` directly, so an assignment is visible to the caller as
//! soon as the routine returns.
//!
//! The cache is keyed by address, not by name. Two names bound to the same address
//! share a cell; a name rebound to a new address gets a new cell. A cache belongs to
//! exactly one compiled unit and is rebuilt from scratch for every compilation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cranelift::prelude::*;
use cranelift_module::{DataId, Linkage, Module};

use crate::errors::BuilderError;

/// Address registry shared with the JIT symbol resolver.
///
/// Holds the symbol name and external address of every cell the cache created. The
/// JIT consults the registry when it links the imported data symbols of a routine.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotRegistry {
    addresses: Arc<Mutex<HashMap<String, usize>>>,
}

impl SlotRegistry {
    fn register(&self, symbol: &str, address: usize) {
        if let Ok(mut addresses) = self.addresses.lock() {
            addresses.insert(symbol.to_string(), address);
        }
    }

    /// Resolves a data symbol to the external address registered for it.
    pub(crate) fn lookup(&self, symbol: &str) -> Option<*const u8> {
        let addresses = self.addresses.lock().ok()?;
        addresses.get(symbol).map(|&address| address as *const u8)
    }
}

/// One storage cell of a compiled routine.
#[derive(Debug, Clone)]
pub struct SlotCell {
    /// Name of the imported data symbol
    pub symbol: String,
    pub data_id: DataId,
    /// Pointer to the external `f64`, materialized once in the entry block
    pub pointer: Value,
}

/// Maps external variable addresses to the storage cells of one routine.
#[derive(Debug, Default)]
pub struct VariableSlotCache {
    cells: HashMap<usize, SlotCell>,
    registry: SlotRegistry,
}

impl VariableSlotCache {
    pub(crate) fn new(registry: SlotRegistry) -> Self {
        Self {
            cells: HashMap::new(),
            registry,
        }
    }

    /// Returns the pointer value of the cell for `address`, creating the cell on first use.
    ///
    /// Creating a cell declares an imported, writable data symbol named after the
    /// address, registers the address under that symbol, and emits a `global_value`
    /// into the current block.
    pub(crate) fn cell_for(
        &mut self,
        address: *mut f64,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
    ) -> Result<Value, BuilderError> {
        let key = address as usize;
        if let Some(cell) = self.cells.get(&key) {
            return Ok(cell.pointer);
        }

        let symbol = format!("formula_slot_{key:x}");
        self.registry.register(&symbol, key);

        let data_id = module
            .declare_data(&symbol, Linkage::Import, true, false)
            .map_err(|e| BuilderError::DeclarationError(e.to_string()))?;
        let global = module.declare_data_in_func(data_id, builder.func);
        let pointer_type = module.target_config().pointer_type();
        let pointer = builder.ins().global_value(pointer_type, global);

        self.cells.insert(
            key,
            SlotCell {
                symbol,
                data_id,
                pointer,
            },
        );
        Ok(pointer)
    }

    /// Number of distinct addresses the routine touches.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns true if the routine has a cell for `address`.
    pub fn contains(&self, address: *const f64) -> bool {
        self.cells.contains_key(&(address as usize))
    }

    pub fn cells(&self) -> impl Iterator<Item = &SlotCell> {
        self.cells.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = SlotRegistry::default();
        let mut value = 4.0_f64;
        let address = &mut value as *mut f64 as usize;

        registry.register("formula_slot_test", address);
        assert_eq!(
            registry.lookup("formula_slot_test"),
            Some(address as *const u8)
        );
        assert_eq!(registry.lookup("missing"), None);
    }

    #[test]
    fn test_registry_is_shared_between_clones() {
        let registry = SlotRegistry::default();
        let resolver = registry.clone();
        registry.register("formula_slot_shared", 64);
        assert_eq!(resolver.lookup("formula_slot_shared"), Some(64 as *const u8));
    }
}
