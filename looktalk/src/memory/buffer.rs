use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use core::ops::{Deref, DerefMut};

use super::{MemoryRegionClass, RegionBudget};

/// Owned, zero-initialized byte buffer charged against a [`RegionBudget`].
///
/// Dereferences to `[u8]`. Dropping the buffer returns its bytes to the
/// budget it was reserved from.
pub struct RegionBuffer {
    data: Box<[u8]>,
    class: MemoryRegionClass,
    budget: Arc<RegionBudget>,
}

impl RegionBuffer {
    /// Only [`RegionBudget::reserve`] creates buffers, after claiming the bytes.
    pub(super) fn new(budget: Arc<RegionBudget>, class: MemoryRegionClass, bytes: usize) -> Self {
        RegionBuffer {
            data: vec![0u8; bytes].into_boxed_slice(),
            class,
            budget,
        }
    }

    pub fn class(&self) -> MemoryRegionClass {
        self.class
    }
}

impl Deref for RegionBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for RegionBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl core::fmt::Debug for RegionBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegionBuffer")
            .field("class", &self.class)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Drop for RegionBuffer {
    fn drop(&mut self) {
        self.budget.release(self.class, self.data.len());
    }
}

/// Bytes of a region held without a backing buffer.
///
/// Used where the memory is allocated piecemeal but its worst case is known
/// up front. Dropping the charge returns the bytes.
pub struct RegionCharge {
    bytes: usize,
    class: MemoryRegionClass,
    budget: Arc<RegionBudget>,
}

impl RegionCharge {
    pub(super) fn new(budget: Arc<RegionBudget>, class: MemoryRegionClass, bytes: usize) -> Self {
        RegionCharge {
            bytes,
            class,
            budget,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn class(&self) -> MemoryRegionClass {
        self.class
    }
}

impl core::fmt::Debug for RegionCharge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegionCharge")
            .field("class", &self.class)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for RegionCharge {
    fn drop(&mut self) {
        self.budget.release(self.class, self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_zeroed_and_writable() {
        let budget = Arc::new(RegionBudget::new(64, None));
        let mut buf = budget
            .reserve(MemoryRegionClass::InterruptReachable, 16)
            .unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        buf[3] = 0xAB;
        assert_eq!(buf[3], 0xAB);
        assert_eq!(buf.class(), MemoryRegionClass::InterruptReachable);
    }

    #[test]
    fn drop_returns_bytes() {
        let budget = Arc::new(RegionBudget::new(64, None));
        {
            let _a = budget.reserve(MemoryRegionClass::InterruptReachable, 40).unwrap();
            let _b = budget.reserve(MemoryRegionClass::Bulk, 4000).unwrap();
            assert_eq!(budget.available(MemoryRegionClass::InterruptReachable), 24);
        }
        assert_eq!(budget.available(MemoryRegionClass::InterruptReachable), 64);
        assert_eq!(budget.usage(MemoryRegionClass::Bulk).used, 0);
    }

    #[test]
    fn charge_holds_bytes_until_dropped() {
        let budget = Arc::new(RegionBudget::new(64, Some(1000)));
        let charge = budget.charge(MemoryRegionClass::Bulk, 600).unwrap();
        assert_eq!(charge.bytes(), 600);
        assert_eq!(budget.usage(MemoryRegionClass::Bulk).used, 600);
        assert!(budget.charge(MemoryRegionClass::Bulk, 500).is_err());
        drop(charge);
        assert_eq!(budget.usage(MemoryRegionClass::Bulk).used, 0);
        assert!(budget.charge(MemoryRegionClass::Bulk, 500).is_ok());
    }

    #[test]
    fn buffer_keeps_budget_alive() {
        let budget = Arc::new(RegionBudget::new(64, None));
        let buf = budget.reserve(MemoryRegionClass::Bulk, 8).unwrap();
        let weak = Arc::downgrade(&budget);
        drop(budget);
        assert!(weak.upgrade().is_some());
        drop(buf);
        assert!(weak.upgrade().is_none());
    }
}
