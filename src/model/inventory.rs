//! Bounded item containers shared by citizens, buildings and market counters.
//!
//! Capacity is counted in units across all stacks. A reservation marks a
//! soft minimum for one item kind: other kinds may not fill the container so
//! far that the reserved kind could no longer reach its minimum.

use serde::{Deserialize, Serialize};

use super::item::ItemName;

/// Per-unit payload carried alongside a stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemUnitData {
    /// World time at which the unit was gathered or produced.
    pub produced_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: ItemName,
    pub counter: u32,
    /// Either empty or exactly one entry per unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<ItemUnitData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedSpace {
    pub name: ItemName,
    pub counter: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<InventoryItem>,
    pub reserved_space: Vec<ReservedSpace>,
    pub size: u32,
}

impl Inventory {
    pub fn new(size: u32) -> Self {
        Self {
            items: Vec::new(),
            reserved_space: Vec::new(),
            size,
        }
    }

    pub fn with_reserved(size: u32, reserved: &[(ItemName, u32)]) -> Self {
        let mut inv = Self::new(size);
        for &(name, counter) in reserved {
            inv.set_reserved_space(name, counter);
        }
        inv
    }

    pub fn get_amount(&self, name: ItemName) -> u32 {
        self.items
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.counter)
            .unwrap_or(0)
    }

    pub fn used_capacity(&self) -> u32 {
        self.items.iter().map(|i| i.counter).sum()
    }

    pub fn free_capacity(&self) -> u32 {
        self.size.saturating_sub(self.used_capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Space left for `name`, holding back room for every other reserved kind
    /// that is still below its reserved minimum.
    pub fn available_capacity(&self, name: ItemName) -> u32 {
        let held_back: u32 = self
            .reserved_space
            .iter()
            .filter(|r| r.name != name)
            .map(|r| r.counter.saturating_sub(self.get_amount(r.name)))
            .sum();
        self.size
            .saturating_sub(self.used_capacity().saturating_add(held_back))
    }

    /// Set or replace the reservation for `name`. A zero counter removes it.
    pub fn set_reserved_space(&mut self, name: ItemName, counter: u32) {
        self.reserved_space.retain(|r| r.name != name);
        if counter > 0 {
            self.reserved_space.push(ReservedSpace { name, counter });
        }
    }

    /// Insert up to `amount` units, clamped to the available capacity for `name`.
    /// Returns the number of units actually inserted.
    ///
    /// `data` is attached per unit when it holds one entry per requested unit;
    /// otherwise the stack's per-unit data is dropped.
    ///
    /// # Panics
    /// Panics if `amount` is negative. A negative insert is a caller bug.
    pub fn put_item_into(&mut self, name: ItemName, amount: i32, mut data: Vec<ItemUnitData>) -> u32 {
        assert!(
            amount >= 0,
            "put_item_into: negative amount {amount} of {name}"
        );
        let accepted = (amount as u32).min(self.available_capacity(name));
        if accepted == 0 {
            return 0;
        }
        let data_complete = data.len() == amount as usize;
        data.truncate(accepted as usize);

        match self.items.iter_mut().find(|i| i.name == name) {
            Some(stack) => {
                let stack_complete = stack.data.len() == stack.counter as usize;
                stack.counter += accepted;
                if data_complete && stack_complete {
                    stack.data.extend(data);
                } else {
                    stack.data.clear();
                }
            }
            None => self.items.push(InventoryItem {
                name,
                counter: accepted,
                data: if data_complete { data } else { Vec::new() },
            }),
        }
        accepted
    }

    /// Remove up to `amount` units. Returns how many were removed.
    pub fn remove_item(&mut self, name: ItemName, amount: u32) -> u32 {
        self.split_off(name, amount).0
    }

    /// Remove up to `amount` units together with their per-unit data.
    fn split_off(&mut self, name: ItemName, amount: u32) -> (u32, Vec<ItemUnitData>) {
        let Some(index) = self.items.iter().position(|i| i.name == name) else {
            return (0, Vec::new());
        };
        let stack = &mut self.items[index];
        let taken = amount.min(stack.counter);
        let data = if stack.data.is_empty() {
            Vec::new()
        } else {
            let keep = stack.data.len() - taken as usize;
            stack.data.split_off(keep)
        };
        stack.counter -= taken;
        if stack.counter == 0 {
            self.items.remove(index);
        }
        (taken, data)
    }

    /// Total food value of edible stacks.
    pub fn food_value(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.name.food_value() * f64::from(i.counter))
            .sum()
    }

    /// The edible item kind with the most units, if any.
    pub fn most_plentiful_food(&self) -> Option<ItemName> {
        self.items
            .iter()
            .filter(|i| i.name.is_food() && i.counter > 0)
            .max_by_key(|i| i.counter)
            .map(|i| i.name)
    }
}

/// Move up to `amount` units of `name` (all of them when `None`) from one
/// inventory to another. Clamped by what `from` holds and what `to` accepts;
/// returns the amount actually moved.
pub fn move_item_between(
    name: ItemName,
    from: &mut Inventory,
    to: &mut Inventory,
    amount: Option<u32>,
) -> u32 {
    let held = from.get_amount(name);
    let requested = amount.unwrap_or(held);
    let moving = requested.min(held).min(to.available_capacity(name));
    if moving == 0 {
        return 0;
    }
    let (taken, data) = from.split_off(name, moving);
    let put = to.put_item_into(name, taken as i32, data);
    debug_assert_eq!(put, taken, "destination accepted less than its available capacity");
    put
}
