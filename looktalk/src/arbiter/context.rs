use alloc::sync::Arc;

use crate::config::{ConfigError, SettleDelays, StartupConfig};
use crate::memory::RegionBudget;
use crate::net::LinkState;
use crate::sync::PeripheralMutex;

use super::{PeripheralLedger, StateHandle, SystemState};

/// Shared state owned by the arbiter for the life of the system.
///
/// Built once at boot from a validated [`StartupConfig`]; there is no
/// other way to obtain the peripheral mutex or the region budget.
pub struct ArbiterContext {
    config: StartupConfig,
    peripheral_mutex: Arc<PeripheralMutex>,
    ledger: Arc<PeripheralLedger>,
    budget: Arc<RegionBudget>,
    link: LinkState,
    state: StateHandle,
}

impl ArbiterContext {
    pub fn new(config: StartupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let budget = Arc::new(RegionBudget::new(
            config.interrupt_pool_bytes,
            config.bulk_pool_bytes,
        ));
        Ok(ArbiterContext {
            config,
            peripheral_mutex: Arc::new(PeripheralMutex::new()),
            ledger: Arc::new(PeripheralLedger::new()),
            budget,
            link: LinkState::new(),
            state: StateHandle::new(SystemState::Init),
        })
    }

    pub fn config(&self) -> &StartupConfig {
        &self.config
    }

    pub fn settle(&self) -> SettleDelays {
        self.config.settle
    }

    pub fn peripheral_mutex(&self) -> &Arc<PeripheralMutex> {
        &self.peripheral_mutex
    }

    pub fn ledger(&self) -> &Arc<PeripheralLedger> {
        &self.ledger
    }

    pub fn budget(&self) -> &Arc<RegionBudget> {
        &self.budget
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    pub fn state(&self) -> SystemState {
        self.state.get()
    }

    pub(super) fn set_state(&self, state: SystemState) {
        self.state.set(state);
    }

    /// Handle other contexts can poll for the current state.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_refused() {
        let cfg = StartupConfig {
            ring_capacity: 0,
            ..StartupConfig::default()
        };
        assert!(ArbiterContext::new(cfg).is_err());
    }

    #[test]
    fn starts_in_init_with_nothing_up() {
        let ctx = ArbiterContext::new(StartupConfig::default()).unwrap();
        assert_eq!(ctx.state_handle().get(), SystemState::Init);
        assert_eq!(ctx.ledger().active(), None);
        assert!(!ctx.peripheral_mutex().is_held());
        assert!(!ctx.link().is_up());
    }
}
