use std::sync::{Mutex, MutexGuard};

use crate::error::{DpuError, Result};

/// Lifecycle tag of a window slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Free,
    Filling,
    Ready,
}

/// Handle to a claimed window slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHandle(usize);

impl ItemHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Head/tail bookkeeping, only touched inside the critical section
#[derive(Debug)]
struct Cursor {
    head: usize,
    tail: usize,
    filling: Option<usize>,
    states: Vec<ItemState>,
}

/// Fixed-capacity ring of fixed-size windows shared by one producer and one consumer.
///
/// Slot state moves FREE -> FILLING -> READY -> FREE. Only the state transitions
/// run under the cursor lock; payload access goes through the per-slot lock so the
/// producer can fill one slot while the consumer reads another.
pub struct RingBuffer {
    items: Vec<Mutex<Box<[u8]>>>,
    item_size: usize,
    cursor: Mutex<Cursor>,
}

impl RingBuffer {
    /// Reserve `capacity` windows of `item_size` bytes each
    pub fn allocate(capacity: usize, item_size: usize) -> Result<Self> {
        let total = capacity.saturating_mul(item_size);
        if capacity == 0 || item_size == 0 {
            return Err(DpuError::InvalidBufferSize { size: total, item_size });
        }

        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| DpuError::OutOfMemory(total))?;
        for _ in 0..capacity {
            let mut data = Vec::new();
            data.try_reserve_exact(item_size)
                .map_err(|_| DpuError::OutOfMemory(total))?;
            data.resize(item_size, 0u8);
            items.push(Mutex::new(data.into_boxed_slice()));
        }

        Ok(Self {
            items,
            item_size,
            cursor: Mutex::new(Cursor {
                head: 0,
                tail: 0,
                filling: None,
                states: vec![ItemState::Free; capacity],
            }),
        })
    }

    /// Mark every slot FREE and rewind head and tail. In-flight windows are discarded.
    pub fn init(&self) {
        let mut cursor = self.lock_cursor();
        cursor.head = 0;
        cursor.tail = 0;
        cursor.filling = None;
        cursor.states.iter_mut().for_each(|s| *s = ItemState::Free);
    }

    /// Claim the slot at head for writing
    pub fn get_free_item_from_head(&self) -> Result<ItemHandle> {
        let mut cursor = self.lock_cursor();
        if cursor.filling.is_some() {
            return Err(DpuError::ItemAlreadyFilling);
        }

        let head = cursor.head;
        if cursor.states[head] != ItemState::Free {
            return Err(DpuError::NoFreeItem);
        }

        cursor.states[head] = ItemState::Filling;
        cursor.filling = Some(head);
        cursor.head = (head + 1) % self.items.len();
        Ok(ItemHandle(head))
    }

    /// FILLING -> READY for the outstanding claim
    pub fn set_item_ready(&self, item: ItemHandle) -> Result<()> {
        let mut cursor = self.lock_cursor();
        if cursor.filling != Some(item.0) || cursor.states[item.0] != ItemState::Filling {
            return Err(DpuError::InvalidItem(item.0));
        }

        cursor.states[item.0] = ItemState::Ready;
        cursor.filling = None;
        Ok(())
    }

    /// Oldest READY slot, left in place until released
    pub fn get_ready_item_from_tail(&self) -> Option<ItemHandle> {
        let cursor = self.lock_cursor();
        (cursor.states[cursor.tail] == ItemState::Ready).then_some(ItemHandle(cursor.tail))
    }

    /// READY -> FREE for the slot at tail
    pub fn release_item(&self, item: ItemHandle) -> Result<()> {
        let mut cursor = self.lock_cursor();
        if cursor.tail != item.0 || cursor.states[item.0] != ItemState::Ready {
            return Err(DpuError::InvalidItem(item.0));
        }

        cursor.states[item.0] = ItemState::Free;
        cursor.tail = (cursor.tail + 1) % self.items.len();
        Ok(())
    }

    /// Payload of a slot. Blocks only while another context holds the same slot.
    pub fn get_item_data(&self, item: ItemHandle) -> MutexGuard<'_, Box<[u8]>> {
        self.items[item.0]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_item_size(&self) -> usize {
        self.item_size
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn item_state(&self, item: ItemHandle) -> ItemState {
        self.lock_cursor().states[item.0]
    }

    /// Slot currently claimed for writing, if any
    pub fn filling_item(&self) -> Option<ItemHandle> {
        self.lock_cursor().filling.map(ItemHandle)
    }

    pub fn ready_count(&self) -> usize {
        self.count(ItemState::Ready)
    }

    pub fn free_count(&self) -> usize {
        self.count(ItemState::Free)
    }

    fn count(&self, state: ItemState) -> usize {
        self.lock_cursor().states.iter().filter(|s| **s == state).count()
    }

    fn lock_cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
