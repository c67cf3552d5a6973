use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, warn};

use crate::constants::{INTERRUPT_POOL_CRITICAL_BYTES, INTERRUPT_POOL_WARNING_BYTES};

use super::{MemoryError, MemoryRegionClass, RegionBuffer, RegionCharge};

/// Free-space thresholds for the interrupt-reachable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub warning_bytes: usize,
    pub critical_bytes: usize,
}

impl Default for Watermarks {
    fn default() -> Self {
        Watermarks {
            warning_bytes: INTERRUPT_POOL_WARNING_BYTES,
            critical_bytes: INTERRUPT_POOL_CRITICAL_BYTES,
        }
    }
}

/// Health of the interrupt-reachable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetHealth {
    Nominal,
    Warning,
    Critical,
}

/// Snapshot of one region's accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionUsage {
    pub used: usize,
    /// `None` for an unbounded region.
    pub capacity: Option<usize>,
    /// Lowest free byte count ever observed (bounded regions only).
    pub low_water: Option<usize>,
}

/// Lock-free byte accounting for both region classes.
///
/// Reservations use a compare-and-swap loop on the used counter, so any
/// context may reserve or release concurrently.
pub struct RegionBudget {
    interrupt_capacity: usize,
    interrupt_used: AtomicUsize,
    interrupt_low_water: AtomicUsize,
    bulk_capacity: Option<usize>,
    bulk_used: AtomicUsize,
    bulk_low_water: AtomicUsize,
    watermarks: Watermarks,
}

impl RegionBudget {
    /// Create a budget. `bulk_capacity: None` accounts bulk usage without a cap.
    pub fn new(interrupt_capacity: usize, bulk_capacity: Option<usize>) -> Self {
        Self::with_watermarks(interrupt_capacity, bulk_capacity, Watermarks::default())
    }

    pub fn with_watermarks(
        interrupt_capacity: usize,
        bulk_capacity: Option<usize>,
        watermarks: Watermarks,
    ) -> Self {
        RegionBudget {
            interrupt_capacity,
            interrupt_used: AtomicUsize::new(0),
            interrupt_low_water: AtomicUsize::new(interrupt_capacity),
            bulk_capacity,
            bulk_used: AtomicUsize::new(0),
            bulk_low_water: AtomicUsize::new(bulk_capacity.unwrap_or(usize::MAX)),
            watermarks,
        }
    }

    /// Reserve `bytes` of `class` and hand back a zeroed buffer that owns them.
    pub fn reserve(
        self: &Arc<Self>,
        class: MemoryRegionClass,
        bytes: usize,
    ) -> Result<RegionBuffer, MemoryError> {
        self.claim(class, bytes)?;
        debug!(target: "memory", "reserved {} bytes of {:?}", bytes, class);
        Ok(RegionBuffer::new(Arc::clone(self), class, bytes))
    }

    /// Charge `bytes` of `class` for memory allocated elsewhere, such as
    /// items that pass through a bounded queue. The charge holds the bytes
    /// until dropped.
    pub fn charge(
        self: &Arc<Self>,
        class: MemoryRegionClass,
        bytes: usize,
    ) -> Result<RegionCharge, MemoryError> {
        self.claim(class, bytes)?;
        debug!(target: "memory", "charged {} bytes of {:?}", bytes, class);
        Ok(RegionCharge::new(Arc::clone(self), class, bytes))
    }

    /// Bytes still free in `class`; `usize::MAX` for an unbounded region.
    pub fn available(&self, class: MemoryRegionClass) -> usize {
        match self.capacity(class) {
            Some(cap) => cap.saturating_sub(self.used_counter(class).load(Ordering::Acquire)),
            None => usize::MAX,
        }
    }

    pub fn usage(&self, class: MemoryRegionClass) -> RegionUsage {
        let capacity = self.capacity(class);
        RegionUsage {
            used: self.used_counter(class).load(Ordering::Acquire),
            capacity,
            low_water: capacity.map(|_| self.low_water_counter(class).load(Ordering::Acquire)),
        }
    }

    /// Classify the interrupt-reachable free space against the watermarks.
    pub fn health(&self) -> BudgetHealth {
        let free = self.available(MemoryRegionClass::InterruptReachable);
        if free < self.watermarks.critical_bytes {
            BudgetHealth::Critical
        } else if free < self.watermarks.warning_bytes {
            BudgetHealth::Warning
        } else {
            BudgetHealth::Nominal
        }
    }

    fn capacity(&self, class: MemoryRegionClass) -> Option<usize> {
        match class {
            MemoryRegionClass::InterruptReachable => Some(self.interrupt_capacity),
            MemoryRegionClass::Bulk => self.bulk_capacity,
        }
    }

    fn used_counter(&self, class: MemoryRegionClass) -> &AtomicUsize {
        match class {
            MemoryRegionClass::InterruptReachable => &self.interrupt_used,
            MemoryRegionClass::Bulk => &self.bulk_used,
        }
    }

    fn low_water_counter(&self, class: MemoryRegionClass) -> &AtomicUsize {
        match class {
            MemoryRegionClass::InterruptReachable => &self.interrupt_low_water,
            MemoryRegionClass::Bulk => &self.bulk_low_water,
        }
    }

    fn claim(&self, class: MemoryRegionClass, bytes: usize) -> Result<(), MemoryError> {
        let used = self.used_counter(class);
        let capacity = self.capacity(class);
        let mut current = used.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(bytes);
            if let Some(cap) = capacity {
                if next > cap {
                    let available = cap.saturating_sub(current);
                    error!(
                        target: "memory",
                        "{:?} exhausted: requested {} bytes, {} available", class, bytes, available
                    );
                    return Err(MemoryError::Exhausted {
                        class,
                        requested: bytes,
                        available,
                    });
                }
            }
            match used.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => current = actual, // raced another reservation, retry
            }
        }

        if let Some(cap) = capacity {
            let free = cap - (current + bytes);
            self.low_water_counter(class).fetch_min(free, Ordering::AcqRel);
            if class == MemoryRegionClass::InterruptReachable {
                match self.health() {
                    BudgetHealth::Critical => {
                        error!(target: "memory", "interrupt-reachable region critical: {} bytes free", free)
                    }
                    BudgetHealth::Warning => {
                        warn!(target: "memory", "interrupt-reachable region low: {} bytes free", free)
                    }
                    BudgetHealth::Nominal => {}
                }
            }
        }
        Ok(())
    }

    /// Return bytes claimed by a [`RegionBuffer`]. Only called from its `Drop`.
    pub(super) fn release(&self, class: MemoryRegionClass, bytes: usize) {
        let old = self.used_counter(class).fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(old >= bytes, "released more than was reserved");
        debug!(target: "memory", "released {} bytes of {:?}", bytes, class);
    }
}
