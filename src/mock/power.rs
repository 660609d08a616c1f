//! Simulated bus power domain

use std::sync::{Arc, Mutex};

use super::{lock, SimState};
use crate::power::{BusPowerState, PowerDomain};
use crate::status::{BusStatus, BUS_OK, EALREADY};

/// Power-domain capability backed by a [`super::SimulatedBma400`]
pub struct SimPower {
    state: Arc<Mutex<SimState>>,
}

impl SimPower {
    pub(super) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }
}

impl PowerDomain for SimPower {
    fn resume(&mut self) -> BusStatus {
        let mut state = lock(&self.state);
        if let Some(status) = state.resume_failure.take() {
            return status;
        }
        if state.power == BusPowerState::Active {
            return EALREADY;
        }
        state.power = BusPowerState::Active;
        state.power_history.push(BusPowerState::Active);
        BUS_OK
    }

    fn suspend(&mut self) -> BusStatus {
        let mut state = lock(&self.state);
        if state.power == BusPowerState::Suspended {
            return EALREADY;
        }
        state.power = BusPowerState::Suspended;
        state.power_history.push(BusPowerState::Suspended);
        BUS_OK
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::SimulatedBma400;
    use crate::power::{BusPowerState, PowerDomain};
    use crate::status::{BUS_OK, EALREADY, ETIMEDOUT};

    #[test]
    fn test_transitions_are_recorded() {
        let sim = SimulatedBma400::new();
        let mut power = sim.power();
        assert_eq!(power.resume(), BUS_OK);
        assert_eq!(power.resume(), EALREADY);
        assert_eq!(power.suspend(), BUS_OK);
        assert_eq!(
            sim.power_history(),
            vec![BusPowerState::Active, BusPowerState::Suspended]
        );
    }

    #[test]
    fn test_injected_resume_failure_keeps_domain_suspended() {
        let sim = SimulatedBma400::new();
        sim.fail_next_resume(ETIMEDOUT);
        let mut power = sim.power();
        assert_eq!(power.resume(), ETIMEDOUT);
        assert_eq!(sim.power_state(), BusPowerState::Suspended);
        assert_eq!(power.resume(), BUS_OK);
    }
}
