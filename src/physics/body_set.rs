//! Generational storage for rigid bodies.

use super::rigid_body::RigidBody;

/// Opaque, generation-checked reference to a body owned by a [`BodySet`].
///
/// A handle stays valid until its body is removed. Slots are recycled, but a
/// recycled slot carries a new generation, so stale handles resolve to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    /// Slot index. Only meaningful together with the generation.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Occupied { generation: u32, body: RigidBody },
    Vacant { generation: u32 },
}

/// Arena of rigid bodies addressed by [`BodyHandle`].
///
/// Iteration always follows slot order, which keeps every pass over the
/// bodies reproducible for identical insertion/removal histories.
#[derive(Debug, Clone, Default)]
pub struct BodySet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a body, reusing the most recently freed slot if there is one.
    pub fn insert(&mut self, body: RigidBody) -> BodyHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = match *slot {
                Slot::Vacant { generation } => generation,
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *slot = Slot::Occupied { generation, body };
            return BodyHandle { index, generation };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            generation: 0,
            body,
        });
        BodyHandle {
            index,
            generation: 0,
        }
    }

    /// Remove a body. Returns `None` if the handle is stale.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        let generation = match *slot {
            Slot::Occupied { generation, .. } if generation == handle.generation => generation,
            _ => return None,
        };
        let next = Slot::Vacant {
            generation: generation.wrapping_add(1),
        };
        let Slot::Occupied { body, .. } = std::mem::replace(slot, next) else {
            unreachable!("slot was checked to be occupied")
        };
        self.free.push(handle.index);
        self.len -= 1;
        Some(body)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, body } if *generation == handle.generation => Some(body),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, body } if *generation == handle.generation => Some(body),
            _ => None,
        }
    }

    /// Borrow two distinct bodies mutably at once.
    ///
    /// Returns `None` if the handles are equal or either one is stale.
    pub fn get_pair_mut(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
    ) -> Option<(&mut RigidBody, &mut RigidBody)> {
        if a.index == b.index {
            return None;
        }
        // Validate both before splitting so a stale handle never half-borrows.
        if !self.contains(a) || !self.contains(b) {
            return None;
        }

        let (lo, hi, swapped) = if a.index < b.index {
            (a.index as usize, b.index as usize, false)
        } else {
            (b.index as usize, a.index as usize, true)
        };
        let (head, tail) = self.slots.split_at_mut(hi);
        let first = match &mut head[lo] {
            Slot::Occupied { body, .. } => body,
            Slot::Vacant { .. } => return None,
        };
        let second = match &mut tail[0] {
            Slot::Occupied { body, .. } => body,
            Slot::Vacant { .. } => return None,
        };

        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, body } => Some((
                    BodyHandle {
                        index: index as u32,
                        generation: *generation,
                    },
                    body,
                )),
                Slot::Vacant { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut RigidBody)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, body } => Some((
                    BodyHandle {
                        index: index as u32,
                        generation: *generation,
                    },
                    body,
                )),
                Slot::Vacant { .. } => None,
            })
    }
}
