//! Handle table: host values reachable from the guest by integer index.
//!
//! The guest never sees a host value, only a `u32` into this table. Slots
//! 0..=3 are reserved at construction for the shared constants and never
//! freed. Freed slots go on a free list and are reused before the table
//! grows; growth happens in fixed batches.

use crate::error::BridgeError;
use crate::value::Value;

pub const UNDEFINED: u32 = 0;
pub const NULL: u32 = 1;
pub const TRUE: u32 = 2;
pub const FALSE: u32 = 3;

const RESERVED: u32 = 4;
const GROW_BATCH: usize = 16;

#[derive(Debug)]
enum Slot {
    Live(Value),
    Free,
}

#[derive(Debug)]
pub struct ExternTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Default for ExternTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternTable {
    pub fn new() -> Self {
        Self {
            slots: vec![
                Slot::Live(Value::Undefined),
                Slot::Live(Value::Null),
                Slot::Live(Value::Bool(true)),
                Slot::Live(Value::Bool(false)),
            ],
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, value: Value) -> u32 {
        if self.free.is_empty() {
            self.grow();
        }
        let index = self.free.pop().expect("free list refilled by grow");
        self.slots[index as usize] = Slot::Live(value);
        index
    }

    /// Allocate, or hand back the shared sentinel for an absent value
    /// without consuming a slot.
    pub fn alloc_or_sentinel(&mut self, value: Option<Value>) -> u32 {
        match value {
            Some(value) => self.alloc(value),
            None => UNDEFINED,
        }
    }

    pub fn get(&self, index: u32) -> Result<&Value, BridgeError> {
        match self.slots.get(index as usize) {
            Some(Slot::Live(value)) => Ok(value),
            _ => Err(BridgeError::InvalidHandle(index)),
        }
    }

    /// Guest-requested release. The slot becomes reusable.
    pub fn free(&mut self, index: u32) -> Result<Value, BridgeError> {
        if index < RESERVED {
            return Err(BridgeError::ReservedHandle(index));
        }
        match self.slots.get_mut(index as usize) {
            Some(slot @ Slot::Live(_)) => {
                let Slot::Live(value) = std::mem::replace(slot, Slot::Free) else {
                    unreachable!()
                };
                self.free.push(index);
                Ok(value)
            }
            _ => Err(BridgeError::InvalidHandle(index)),
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self) {
        let start = self.slots.len() as u32;
        for _ in 0..GROW_BATCH {
            self.slots.push(Slot::Free);
        }
        // lowest fresh index pops first
        for index in (start..start + GROW_BATCH as u32).rev() {
            self.free.push(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_slots_hold_shared_constants() {
        let table = ExternTable::new();
        assert_eq!(table.get(UNDEFINED).unwrap(), &Value::Undefined);
        assert_eq!(table.get(NULL).unwrap(), &Value::Null);
        assert_eq!(table.get(TRUE).unwrap(), &Value::Bool(true));
        assert_eq!(table.get(FALSE).unwrap(), &Value::Bool(false));
    }

    #[test]
    fn freed_slot_is_reused_before_growth() {
        let mut table = ExternTable::new();
        let a = table.alloc(Value::Number(1.0));
        let _b = table.alloc(Value::Number(2.0));
        let capacity = table.capacity();
        table.free(a).unwrap();
        assert_eq!(table.alloc(Value::Number(3.0)), a);
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn get_after_free_is_invalid() {
        let mut table = ExternTable::new();
        let idx = table.alloc(Value::Str("x".into()));
        table.free(idx).unwrap();
        assert!(matches!(
            table.get(idx),
            Err(BridgeError::InvalidHandle(i)) if i == idx
        ));
    }

    #[test]
    fn double_free_is_invalid() {
        let mut table = ExternTable::new();
        let idx = table.alloc(Value::Null);
        table.free(idx).unwrap();
        assert!(matches!(table.free(idx), Err(BridgeError::InvalidHandle(_))));
    }

    #[test]
    fn freeing_reserved_slot_is_rejected() {
        let mut table = ExternTable::new();
        for idx in [UNDEFINED, NULL, TRUE, FALSE] {
            assert!(matches!(
                table.free(idx),
                Err(BridgeError::ReservedHandle(i)) if i == idx
            ));
        }
    }

    #[test]
    fn absent_values_share_the_sentinel() {
        let mut table = ExternTable::new();
        let before = table.live_count();
        assert_eq!(table.alloc_or_sentinel(None), UNDEFINED);
        assert_eq!(table.live_count(), before);
        let idx = table.alloc_or_sentinel(Some(Value::Window));
        assert_ne!(idx, UNDEFINED);
    }

    #[test]
    fn growth_happens_in_batches() {
        let mut table = ExternTable::new();
        let base = table.capacity();
        table.alloc(Value::Null);
        assert_eq!(table.capacity(), base + 16);
        for _ in 0..15 {
            table.alloc(Value::Null);
        }
        assert_eq!(table.capacity(), base + 16);
        table.alloc(Value::Null);
        assert_eq!(table.capacity(), base + 32);
    }
}
