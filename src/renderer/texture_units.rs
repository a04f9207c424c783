// renderer/texture_units.rs
//! Maps textures to hardware texture units.
//!
//! The cache holds at most as many textures as the device has combined
//! texture units. Hits move the texture to the front; when every unit is
//! taken the least recently used texture loses its unit. Materials are used
//! in a roughly repeating per-frame pattern, so plain LRU keeps rebinding
//! rare without any smarter replacement.

use std::collections::VecDeque;

use log::{debug, trace};

use super::device::{GraphicsDevice, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resident {
    texture: TextureId,
    unit: usize,
}

#[derive(Debug, Default)]
pub struct TextureUnitManager {
    capacity: Option<usize>,
    /// Most recently used first.
    resident: VecDeque<Resident>,
    next_unit: usize,
}

impl TextureUnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity is normally queried from the device on first use.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    fn capacity_for(&mut self, device: &dyn GraphicsDevice) -> usize {
        *self.capacity.get_or_insert_with(|| {
            let units = device.max_combined_texture_units().max(1);
            debug!("Texture unit cache sized to {} units", units);
            units
        })
    }

    /// Returns the unit `texture` is bound to, binding it first if needed.
    pub fn bind_texture(&mut self, device: &mut dyn GraphicsDevice, texture: TextureId) -> usize {
        let capacity = self.capacity_for(device);

        if let Some(pos) = self.resident.iter().position(|r| r.texture == texture) {
            if let Some(hit) = self.resident.remove(pos) {
                self.resident.push_front(hit);
                return hit.unit;
            }
        }

        let unit = if self.next_unit < capacity {
            let unit = self.next_unit;
            self.next_unit += 1;
            unit
        } else {
            match self.resident.pop_back() {
                Some(evicted) => {
                    trace!(
                        "Evicting texture {:?} from unit {}",
                        evicted.texture,
                        evicted.unit
                    );
                    evicted.unit
                }
                None => 0,
            }
        };

        device.bind_texture_unit(unit, Some(texture));
        self.resident.push_front(Resident { texture, unit });
        unit
    }

    /// Unbinds every managed unit and forgets all residents.
    pub fn empty_cache(&mut self, device: &mut dyn GraphicsDevice) {
        for unit in 0..self.next_unit {
            device.bind_texture_unit(unit, None);
        }
        self.resident.clear();
        self.next_unit = 0;
    }

    pub fn unit_of(&self, texture: TextureId) -> Option<usize> {
        self.resident
            .iter()
            .find(|r| r.texture == texture)
            .map(|r| r.unit)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
