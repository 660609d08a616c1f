//! Simulated SPI device with the BMA400 register map behind it

use std::sync::{Arc, Mutex};

use super::{lock, SimState};
use crate::bus::SpiBus;
use crate::fifo::FIFO_HEADER_EMPTY;
use crate::power::BusPowerState;
use crate::registers::*;
use crate::sample::Sample;
use crate::status::{BusStatus, BUS_OK, EINVAL, EIO};

// Value clocked out while the address byte is on the wire
const DUMMY_BYTE: u8 = 0xFF;

/// SPI transaction type for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Register read; `length` excludes the dummy byte
    Read { address: u8, length: usize },
    /// Register write, address as sent
    Write { address: u8, value: u8 },
}

/// SPI capability backed by a [`super::SimulatedBma400`]
pub struct SimSpi {
    state: Arc<Mutex<SimState>>,
}

impl SimSpi {
    pub(super) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }
}

impl SpiBus for SimSpi {
    fn is_ready(&self) -> bool {
        lock(&self.state).bus_ready
    }

    fn transceive(&mut self, tx: &[u8], rx: &mut [u8]) -> BusStatus {
        let mut state = lock(&self.state);
        if tx.len() != 1 || tx[0] & SPI_READ_FLAG == 0 || rx.is_empty() {
            return EINVAL;
        }

        let address = tx[0] & SPI_ADDRESS_MASK;
        if let Some(status) = state.begin(Transfer::Read {
            address,
            length: rx.len() - 1,
        }) {
            return status;
        }

        rx[0] = DUMMY_BYTE;
        for (i, byte) in rx.iter_mut().enumerate().skip(1) {
            *byte = if address == REG_FIFO_DATA {
                state.fifo.pop_front().unwrap_or(FIFO_HEADER_EMPTY)
            } else {
                state.read_register(address.wrapping_add(i as u8 - 1))
            };
        }
        BUS_OK
    }

    fn write(&mut self, tx: &[u8]) -> BusStatus {
        let mut state = lock(&self.state);
        if tx.len() != 2 {
            return EINVAL;
        }

        if let Some(status) = state.begin(Transfer::Write {
            address: tx[0],
            value: tx[1],
        }) {
            return status;
        }

        state.write_register(tx[0] & SPI_ADDRESS_MASK, tx[1]);
        BUS_OK
    }
}

impl SimState {
    // Log the transfer and decide whether it fails
    fn begin(&mut self, transfer: Transfer) -> Option<BusStatus> {
        self.transfers.push(transfer);

        if self.power == BusPowerState::Suspended {
            self.transfers_while_suspended += 1;
            return Some(EIO);
        }

        match self.pending_failure.take() {
            Some((0, status)) => Some(status),
            Some((remaining, status)) => {
                self.pending_failure = Some((remaining - 1, status));
                None
            }
            None => None,
        }
    }

    fn read_register(&self, address: u8) -> u8 {
        let address = address & SPI_ADDRESS_MASK;
        let data = data_registers(self.data);
        match address {
            a if (REG_ACC_X_LSB..REG_ACC_X_LSB + 6).contains(&a) => {
                data[(a - REG_ACC_X_LSB) as usize]
            }
            a if a == REG_FIFO_LENGTH_0 => (self.fifo.len() & 0xFF) as u8,
            a if a == REG_FIFO_LENGTH_0 + 1 => ((self.fifo.len() >> 8) & 0x07) as u8,
            a => self.registers[a as usize],
        }
    }

    fn write_register(&mut self, address: u8, value: u8) {
        match address {
            REG_CMD => match value {
                CMD_SOFT_RESET => self.soft_reset(),
                CMD_FIFO_FLUSH => self.fifo.clear(),
                _ => {}
            },
            REG_ACC_CONFIG0 => {
                let old_mode = self.power_mode();
                self.registers[address as usize] = value;
                let auto_flush = self.registers[REG_FIFO_CONFIG0 as usize] & FIFO_AUTO_FLUSH != 0;
                if auto_flush && self.power_mode() != old_mode {
                    self.fifo.clear();
                }
            }
            _ => self.registers[address as usize] = value,
        }
    }
}

// 12-bit two's complement, LSB first
fn data_registers(sample: Sample) -> [u8; 6] {
    let mut data = [0u8; 6];
    for (i, axis) in [sample.x, sample.y, sample.z].into_iter().enumerate() {
        let raw = (axis as u16) & 0x0FFF;
        data[2 * i] = (raw & 0xFF) as u8;
        data[2 * i + 1] = (raw >> 8) as u8;
    }
    data
}

#[cfg(test)]
mod tests {
    use crate::bus::SpiBus;
    use crate::mock::{SimulatedBma400, Transfer};
    use crate::registers::*;
    use crate::sample::Sample;
    use crate::status::{BUS_OK, EIO};

    #[test]
    fn test_reads_fail_while_suspended() {
        let sim = SimulatedBma400::new();
        let mut spi = sim.spi();
        let mut rx = [0u8; 2];
        assert_eq!(spi.transceive(&[REG_CHIP_ID | SPI_READ_FLAG], &mut rx), EIO);
        assert_eq!(sim.transfers_while_suspended(), 1);
    }

    #[test]
    fn test_chip_id_follows_dummy_byte() {
        let sim = SimulatedBma400::new();
        sim.set_power_active(true);
        let mut spi = sim.spi();
        let mut rx = [0u8; 2];
        assert_eq!(spi.transceive(&[REG_CHIP_ID | SPI_READ_FLAG], &mut rx), BUS_OK);
        assert_eq!(rx, [0xFF, CHIP_ID_VALUE]);
    }

    #[test]
    fn test_injected_failure_hits_the_requested_transfer() {
        let sim = SimulatedBma400::new();
        sim.set_power_active(true);
        sim.fail_transfer_after(1, EIO);
        let mut spi = sim.spi();

        assert_eq!(spi.write(&[REG_INT_CONFIG0, 0x80]), BUS_OK);
        assert_eq!(spi.write(&[REG_INT_CONFIG0, 0x40]), EIO);
        assert_eq!(spi.write(&[REG_INT_CONFIG0, 0x40]), BUS_OK);
        assert_eq!(sim.register(REG_INT_CONFIG0), 0x40);
    }

    #[test]
    fn test_fifo_reads_pop_bytes_and_report_empty_frames() {
        let sim = SimulatedBma400::new();
        sim.set_power_active(true);
        sim.push_fifo_samples(&[Sample::new(16, 32, 48)]);
        let mut spi = sim.spi();

        let mut rx = [0u8; 7];
        spi.transceive(&[REG_FIFO_DATA | SPI_READ_FLAG], &mut rx);
        assert_eq!(&rx[1..], &[0x9E, 0x01, 0x02, 0x03, 0x80, 0x80]);
        assert_eq!(sim.fifo_len(), 0);
        assert_eq!(
            sim.transfers(),
            vec![Transfer::Read {
                address: REG_FIFO_DATA,
                length: 6
            }]
        );
    }

    #[test]
    fn test_power_mode_change_flushes_fifo_with_auto_flush() {
        let sim = SimulatedBma400::new();
        sim.set_power_active(true);
        let mut spi = sim.spi();
        spi.write(&[REG_FIFO_CONFIG0, FIFO_AUTO_FLUSH]);
        sim.push_fifo_samples(&[Sample::default(); 4]);

        spi.write(&[REG_ACC_CONFIG0, 0x02]);
        assert_eq!(sim.fifo_len(), 0);
    }

    #[test]
    fn test_soft_reset_clears_configuration() {
        let sim = SimulatedBma400::new();
        sim.set_power_active(true);
        let mut spi = sim.spi();
        spi.write(&[REG_INT1_MAP, INT_DRDY]);
        spi.write(&[REG_CMD, CMD_SOFT_RESET]);
        assert_eq!(sim.register(REG_INT1_MAP), 0x00);
        assert_eq!(sim.register(REG_CHIP_ID), CHIP_ID_VALUE);
    }
}
