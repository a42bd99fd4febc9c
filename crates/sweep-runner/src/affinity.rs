//! CPU slot allocation for pinned workers
//!
//! Each running job holds at most one slot; a slot is returned to the pool
//! when its [`CpuSlot`] guard drops, so a new job always gets the lowest
//! index nobody is using.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Pool of free CPU indices
#[derive(Debug)]
pub struct CpuSlots {
    free: Mutex<BTreeSet<usize>>,
}

impl CpuSlots {
    /// Pool over CPUs `0..count`
    #[must_use]
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new((0..count).collect()),
        })
    }

    /// Take the lowest free CPU, if any
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Option<CpuSlot> {
        let cpu = self.free.lock().pop_first()?;
        Some(CpuSlot {
            cpu,
            pool: Arc::clone(self),
        })
    }

    /// Number of free CPUs
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

/// A claimed CPU; released on drop
#[derive(Debug)]
pub struct CpuSlot {
    cpu: usize,
    pool: Arc<CpuSlots>,
}

impl CpuSlot {
    /// CPU index
    #[inline]
    #[must_use]
    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

impl Drop for CpuSlot {
    fn drop(&mut self) {
        self.pool.free.lock().insert(self.cpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_free_slot_is_reused() {
        let slots = CpuSlots::new(3);
        let a = slots.acquire().unwrap();
        let b = slots.acquire().unwrap();
        let c = slots.acquire().unwrap();
        assert_eq!((a.cpu(), b.cpu(), c.cpu()), (0, 1, 2));
        assert!(slots.acquire().is_none());

        drop(b);
        assert_eq!(slots.available(), 1);
        let d = slots.acquire().unwrap();
        assert_eq!(d.cpu(), 1);
    }
}
