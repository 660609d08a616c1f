//! Simulated interrupt line

use std::sync::{Arc, Mutex};

use super::{lock, SimState};
use crate::error::{AcquisitionError, Result};
use crate::gpio::{Edge, EdgeHandler, InterruptPin};

/// Interrupt pin capability backed by a [`super::SimulatedBma400`]
pub struct SimPin {
    state: Arc<Mutex<SimState>>,
}

impl SimPin {
    pub(super) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }
}

impl InterruptPin for SimPin {
    fn is_ready(&self) -> bool {
        lock(&self.state).gpio_ready
    }

    fn configure_input(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.gpio_ready {
            return Err(AcquisitionError::DeviceNotReady(
                "GPIO port is not ready".to_string(),
            ));
        }
        state.pin_is_input = true;
        Ok(())
    }

    fn configure_interrupt(&mut self, edge: Edge) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.pin_is_input {
            return Err(AcquisitionError::InvalidParameter(
                "Interrupt requires the pin to be an input".to_string(),
            ));
        }
        state.pin_edge = Some(edge);
        Ok(())
    }

    fn register_callback(&mut self, handler: EdgeHandler) -> Result<()> {
        lock(&self.state).handler = Some(Arc::from(handler));
        Ok(())
    }
}
