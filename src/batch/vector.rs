//! Handle-addressed batched storage.
//!
//! A `BatchedVector` packs fixed-width records for many components into one
//! contiguous `Vec<f64>` so kernels can sweep the whole batch as a flat
//! array. Components are addressed through generational `Handle`s that map
//! to the record's current slot; swap-removal rewrites the moved
//! component's slot before the vacated record is released, so a live handle
//! always resolves to its own values.
//!
//! A removed component is returned as a standalone `Record` that owns a
//! private copy of its last values.

use crate::error::BatchError;

/// Stable reference to a component stored in a `BatchedVector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    fn stale(self) -> BatchError {
        BatchError::StaleHandle {
            index: self.index,
            generation: self.generation,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    slot: Option<usize>,
}

/// Capacity growth rule shared by collections and standalone records:
/// start from the current capacity (at least one) and double until the
/// requested size fits.
pub fn grown_capacity(current: usize, needed: usize) -> usize {
    let mut size = current.max(1);
    while size < needed {
        size *= 2;
    }
    size
}

/// Standalone owner of a flat buffer of doubles.
///
/// Detached components come back as records of the collection's width;
/// records can also serve as scratch buffers and be resized freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<f64>,
    capacity: usize,
}

impl Record {
    /// Zero-filled record of `len` doubles.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            capacity: len,
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            capacity: values.len(),
        }
    }

    /// Resize the logical length, growing capacity by doubling when needed.
    /// New entries are zero.
    pub fn resize(&mut self, len: usize) {
        if len > self.capacity {
            let target = grown_capacity(self.capacity, len);
            self.values.reserve_exact(target - self.values.len());
            self.capacity = target;
        }
        self.values.resize(len, 0.0);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Contiguous structure-of-arrays buffer of fixed-width records.
#[derive(Debug, Clone)]
pub struct BatchedVector {
    width: usize,
    data: Vec<f64>,
    /// Capacity in records, following `grown_capacity`.
    capacity: usize,
    /// Handle index -> current slot.
    entries: Vec<Entry>,
    /// Slot -> handle index.
    owners: Vec<u32>,
    free: Vec<u32>,
}

impl BatchedVector {
    /// Create an empty collection of `width`-wide records.
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "record width must be positive");
        Self {
            width,
            data: Vec::new(),
            capacity: 0,
            entries: Vec::new(),
            owners: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of attached components.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Capacity in records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, taking it over as an attached component.
    pub fn add(&mut self, record: Record) -> Result<Handle, BatchError> {
        self.add_values(record.values())
    }

    /// Append a record given by value.
    pub fn add_values(&mut self, values: &[f64]) -> Result<Handle, BatchError> {
        if values.len() != self.width {
            return Err(BatchError::WidthMismatch {
                expected: self.width,
                found: values.len(),
            });
        }

        let slot = self.len();
        self.ensure_capacity(slot + 1);
        self.data.extend_from_slice(values);

        let handle = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.slot = Some(slot);
                Handle {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    slot: Some(slot),
                });
                Handle {
                    index,
                    generation: 0,
                }
            }
        };
        self.owners.push(handle.index);
        Ok(handle)
    }

    /// Detach a component: its values are copied into a fresh `Record`, the
    /// last record is swapped into the vacated slot and the handle retires.
    pub fn remove(&mut self, handle: Handle) -> Result<Record, BatchError> {
        if self.is_empty() {
            return Err(BatchError::Empty);
        }
        let slot = self.slot_of(handle)?;
        let w = self.width;
        let detached = Record::from_values(&self.data[slot * w..(slot + 1) * w]);

        let last = self.len() - 1;
        if slot != last {
            self.data.copy_within(last * w..(last + 1) * w, slot * w);
            let moved = self.owners[last];
            self.entries[moved as usize].slot = Some(slot);
            self.owners[slot] = moved;
        }
        self.data.truncate(last * w);
        self.owners.pop();

        let entry = &mut self.entries[handle.index as usize];
        entry.slot = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);

        Ok(detached)
    }

    /// Current slot of a live component.
    pub fn slot_of(&self, handle: Handle) -> Result<usize, BatchError> {
        match self.entries.get(handle.index as usize) {
            Some(entry) if entry.generation == handle.generation => {
                entry.slot.ok_or_else(|| handle.stale())
            }
            _ => Err(handle.stale()),
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slot_of(handle).is_ok()
    }

    /// Handle of the component currently stored at `slot`.
    pub fn handle_at(&self, slot: usize) -> Option<Handle> {
        let index = *self.owners.get(slot)?;
        Some(Handle {
            index,
            generation: self.entries[index as usize].generation,
        })
    }

    pub fn get(&self, handle: Handle) -> Result<&[f64], BatchError> {
        let slot = self.slot_of(handle)?;
        Ok(self.record(slot))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut [f64], BatchError> {
        let slot = self.slot_of(handle)?;
        Ok(self.record_mut(slot))
    }

    /// Record at a slot. Panics if the slot is out of range.
    #[inline]
    pub fn record(&self, slot: usize) -> &[f64] {
        &self.data[slot * self.width..(slot + 1) * self.width]
    }

    #[inline]
    pub fn record_mut(&mut self, slot: usize) -> &mut [f64] {
        let w = self.width;
        &mut self.data[slot * w..(slot + 1) * w]
    }

    /// Whole batch as one flat array of `len() * width()` doubles.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Handles of all attached components in slot order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        (0..self.len()).filter_map(move |slot| self.handle_at(slot))
    }

    /// Zero every record without detaching anything.
    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed <= self.capacity {
            return;
        }
        let target = grown_capacity(self.capacity, needed);
        self.data.reserve_exact(target * self.width - self.data.len());
        self.capacity = target;
    }
}
