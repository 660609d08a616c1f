//! Simulated BMA400 for tests and the demo binary
//!
//! [`SimulatedBma400`] owns a register file, a byte FIFO and the power state
//! of the bus domain. The capability handles it hands out ([`SimSpi`],
//! [`SimPower`], [`SimPin`]) share that state, so a test keeps the simulator
//! and inspects it while the controller and worker own the handles.

mod gpio;
mod power;
mod spi;

pub use gpio::SimPin;
pub use power::SimPower;
pub use spi::{SimSpi, Transfer};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::fifo::encode_frames_8bit;
use crate::gpio::Edge;
use crate::power::BusPowerState;
use crate::registers::*;
use crate::sample::Sample;
use crate::status::BusStatus;

type SharedHandler = Arc<dyn Fn() + Send + Sync + 'static>;

struct SimState {
    registers: [u8; 128],
    fifo: VecDeque<u8>,
    data: Sample,
    chip_id: u8,

    power: BusPowerState,
    power_history: Vec<BusPowerState>,
    resume_failure: Option<BusStatus>,

    bus_ready: bool,
    transfers: Vec<Transfer>,
    transfers_while_suspended: usize,
    // (transfers left before the failure, status)
    pending_failure: Option<(usize, BusStatus)>,

    gpio_ready: bool,
    pin_is_input: bool,
    pin_edge: Option<Edge>,
    handler: Option<SharedHandler>,
    edges_fired: u64,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            registers: [0u8; 128],
            fifo: VecDeque::new(),
            data: Sample::default(),
            chip_id: CHIP_ID_VALUE,
            power: BusPowerState::Suspended,
            power_history: Vec::new(),
            resume_failure: None,
            bus_ready: true,
            transfers: Vec::new(),
            transfers_while_suspended: 0,
            pending_failure: None,
            gpio_ready: true,
            pin_is_input: false,
            pin_edge: None,
            handler: None,
            edges_fired: 0,
        };
        state.soft_reset();
        state
    }

    fn soft_reset(&mut self) {
        self.registers = [0u8; 128];
        self.registers[REG_CHIP_ID as usize] = self.chip_id;
        self.fifo.clear();
    }

    fn power_mode(&self) -> u8 {
        self.registers[REG_ACC_CONFIG0 as usize] & ACC_CONFIG0_POWER_MODE_MASK
    }
}

/// Simulated sensor plus its bus, power domain and interrupt pin
#[derive(Clone)]
pub struct SimulatedBma400 {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBma400 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBma400 {
    /// Sensor after power-on: chip id 0x90, bus suspended, everything ready
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// SPI capability handle
    pub fn spi(&self) -> SimSpi {
        SimSpi::new(self.state.clone())
    }

    /// Power-domain capability handle
    pub fn power(&self) -> SimPower {
        SimPower::new(self.state.clone())
    }

    /// Interrupt pin capability handle
    pub fn pin(&self) -> SimPin {
        SimPin::new(self.state.clone())
    }

    // Sensor model

    pub fn set_chip_id(&self, chip_id: u8) {
        let mut state = self.state();
        state.chip_id = chip_id;
        state.registers[REG_CHIP_ID as usize] = chip_id;
    }

    /// Value the data registers report
    pub fn set_data(&self, sample: Sample) {
        self.state().data = sample;
    }

    /// Append 8-bit XYZ frames to the FIFO
    ///
    /// The FIFO keeps the newest 1024 bytes, like the sensor with
    /// stop-on-full disabled.
    pub fn push_fifo_samples(&self, samples: &[Sample]) {
        let mut state = self.state();
        state.fifo.extend(encode_frames_8bit(samples));
        while state.fifo.len() > FIFO_CAPACITY {
            state.fifo.pop_front();
        }
    }

    /// Append raw bytes to the FIFO
    pub fn push_fifo_bytes(&self, bytes: &[u8]) {
        self.state().fifo.extend(bytes.iter().copied());
    }

    /// FIFO fill level in bytes
    pub fn fifo_len(&self) -> usize {
        self.state().fifo.len()
    }

    pub fn register(&self, address: u8) -> u8 {
        self.state().registers[(address & SPI_ADDRESS_MASK) as usize]
    }

    /// Whether the sensor would drive INT1 for `interrupt_bit`
    pub fn routes_to_int1(&self, interrupt_bit: u8) -> bool {
        let state = self.state();
        state.registers[REG_INT_CONFIG0 as usize] & interrupt_bit != 0
            && state.registers[REG_INT1_MAP as usize] & interrupt_bit != 0
            && state.power_mode() != 0
    }

    // Bus

    pub fn set_bus_ready(&self, ready: bool) {
        self.state().bus_ready = ready;
    }

    /// Let `successful` transfers through, then fail the next one with `status`
    pub fn fail_transfer_after(&self, successful: usize, status: BusStatus) {
        self.state().pending_failure = Some((successful, status));
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state().transfers.clone()
    }

    /// Register writes in order, as `(address, value)`
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state()
            .transfers
            .iter()
            .filter_map(|t| match *t {
                Transfer::Write { address, value } => Some((address, value)),
                _ => None,
            })
            .collect()
    }

    /// Register reads in order, as `(address, length)`
    pub fn reads(&self) -> Vec<(u8, usize)> {
        self.state()
            .transfers
            .iter()
            .filter_map(|t| match *t {
                Transfer::Read { address, length } => Some((address, length)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_transfers(&self) {
        self.state().transfers.clear();
    }

    /// Transfers attempted while the bus domain was suspended
    pub fn transfers_while_suspended(&self) -> usize {
        self.state().transfers_while_suspended
    }

    // Power domain

    pub fn power_state(&self) -> BusPowerState {
        self.state().power
    }

    /// Force the domain state without recording a transition
    pub fn set_power_active(&self, active: bool) {
        self.state().power = if active {
            BusPowerState::Active
        } else {
            BusPowerState::Suspended
        };
    }

    /// Every resume/suspend the domain went through, in order
    pub fn power_history(&self) -> Vec<BusPowerState> {
        self.state().power_history.clone()
    }

    /// Fail the next resume with `status`
    pub fn fail_next_resume(&self, status: BusStatus) {
        self.state().resume_failure = Some(status);
    }

    // Interrupt pin

    pub fn set_gpio_ready(&self, ready: bool) {
        self.state().gpio_ready = ready;
    }

    /// Whether the pin is an input with a rising-edge interrupt and a handler
    pub fn pin_armed(&self) -> bool {
        let state = self.state();
        state.pin_is_input
            && matches!(state.pin_edge, Some(Edge::Rising) | Some(Edge::Both))
            && state.handler.is_some()
    }

    /// Drive a rising edge on the interrupt line
    ///
    /// Runs the registered handler on the calling thread, as an interrupt
    /// would. Returns `false` if the pin is not armed.
    pub fn fire_edge(&self) -> bool {
        let handler = {
            let mut state = self.state();
            let armed = state.pin_is_input
                && matches!(state.pin_edge, Some(Edge::Rising) | Some(Edge::Both));
            match (&state.handler, armed) {
                (Some(handler), true) => {
                    let handler = handler.clone();
                    state.edges_fired += 1;
                    handler
                }
                _ => return false,
            }
        };
        handler();
        true
    }

    pub fn edges_fired(&self) -> u64 {
        self.state().edges_fired
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
