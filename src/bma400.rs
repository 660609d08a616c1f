//! BMA400 accelerometer driver over the SPI register protocol

use std::time::Duration;

use log::{debug, info};

use crate::bus::{ReadPolicy, RegisterBus, SpiBus, MAX_READ_LEN};
use crate::driver::SensorDriver;
use crate::error::{AcquisitionError, Result};
use crate::fifo::{FifoBuffer, FIFO_BYTES_OVERREAD};
use crate::profile::{
    DeviceConfig, InterruptChannel, InterruptKind, PowerMode, RegWrite, INTERRUPT_RESET,
};
use crate::registers::*;
use crate::sample::Sample;

/// FIFO bytes fetched per SPI transaction
pub const DEFAULT_BURST_LEN: usize = 8;

// Time the sensor needs after a soft reset before it answers again
const SOFT_RESET_DELAY: Duration = Duration::from_millis(2);

// FIFO_LENGTH is 11 bits wide
const FIFO_LENGTH_MASK: u16 = 0x07FF;

/// BMA400 sensor interface
pub struct Bma400<B: SpiBus> {
    regs: RegisterBus<B>,
    burst_len: usize,
    acc_config0: u8,
    active: Option<DeviceConfig>,
}

impl<B: SpiBus> Bma400<B> {
    /// Create a driver on top of an SPI device
    ///
    /// # Arguments
    /// * `bus` - SPI device with the sensor's chip select
    /// * `read_policy` - What register reads do when a transfer fails
    /// * `burst_len` - FIFO bytes per transaction (1..=127)
    ///
    /// # Returns
    /// * `Ok(Bma400)` - Driver; the sensor is untouched until [`SensorDriver::init`]
    /// * `Err(AcquisitionError::InvalidParameter)` - If `burst_len` is out of range
    pub fn new(bus: B, read_policy: ReadPolicy, burst_len: usize) -> Result<Self> {
        if burst_len == 0 || burst_len > MAX_READ_LEN {
            return Err(AcquisitionError::InvalidParameter(format!(
                "FIFO burst length must be between 1-{} bytes, got {}",
                MAX_READ_LEN, burst_len
            )));
        }

        Ok(Self {
            regs: RegisterBus::with_policy(bus, read_policy),
            burst_len,
            acc_config0: 0x00,
            active: None,
        })
    }

    /// Whether the underlying bus device is ready
    pub fn is_ready(&self) -> bool {
        self.regs.is_ready()
    }

    /// Profile applied by the last successful [`SensorDriver::apply_config`]
    pub fn active_profile(&self) -> Option<&DeviceConfig> {
        self.active.as_ref()
    }

    pub fn burst_len(&self) -> usize {
        self.burst_len
    }

    pub fn bus(&self) -> &B {
        self.regs.bus()
    }

    pub fn bus_mut(&mut self) -> &mut B {
        self.regs.bus_mut()
    }

    pub fn into_inner(self) -> B {
        self.regs.into_inner()
    }

    fn write(&mut self, write: RegWrite) -> Result<()> {
        self.regs.write_register(write.reg, write.value)?;
        if write.reg == REG_ACC_CONFIG0 {
            self.acc_config0 = write.value;
        }
        Ok(())
    }

    fn write_table(&mut self, table: &[RegWrite]) -> Result<()> {
        for write in table {
            self.write(*write)?;
        }
        Ok(())
    }

    fn apply_program(&mut self, config: &DeviceConfig) -> Result<()> {
        let program = config.program()?;

        self.disable_interrupts()?;
        self.set_power_mode(PowerMode::Sleep)?;
        self.write_table(&program.writes)?;
        self.enable_interrupt(program.channel, program.interrupt)?;
        self.set_power_mode(program.power_mode)?;

        Ok(())
    }
}

impl<B: SpiBus> SensorDriver for Bma400<B> {
    fn init(&mut self) -> Result<()> {
        // After power-up the sensor listens on I2C; one read switches it to SPI
        self.regs.read_u8(REG_CHIP_ID)?;

        self.regs.write_register(REG_CMD, CMD_SOFT_RESET)?;
        std::thread::sleep(SOFT_RESET_DELAY);
        self.acc_config0 = 0x00;
        self.active = None;

        // The reset drops the interface back to I2C
        self.regs.read_u8(REG_CHIP_ID)?;

        let chip_id = self.regs.read_u8(REG_CHIP_ID)?;
        if chip_id != CHIP_ID_VALUE {
            return Err(AcquisitionError::InvalidDeviceId(chip_id));
        }

        info!("BMA400 found, chip id 0x{:02X}", chip_id);
        Ok(())
    }

    fn apply_config(&mut self, config: &DeviceConfig) -> Result<()> {
        match self.apply_program(config) {
            Ok(()) => {
                info!("Applied {} profile", config.name());
                self.active = Some(*config);
                Ok(())
            }
            Err(AcquisitionError::Configuration(msg)) => {
                self.active = None;
                Err(AcquisitionError::Configuration(msg))
            }
            Err(e) => {
                self.active = None;
                Err(AcquisitionError::Configuration(format!(
                    "{} profile: {}",
                    config.name(),
                    e
                )))
            }
        }
    }

    fn read_sample(&mut self) -> Result<Sample> {
        let mut data = [0u8; 6];
        self.regs.read_into(REG_ACC_X_LSB, &mut data)?;
        Ok(Sample::from_data_registers(&data))
    }

    fn drain_fifo(&mut self, buffer: &mut FifoBuffer) -> Result<Vec<Sample>> {
        buffer.clear();

        let fill = self.fifo_length()?;
        if fill == 0 {
            debug!("FIFO empty");
            return Ok(Vec::new());
        }
        // Overread only when the whole fill level fits; otherwise take what
        // the buffer holds and leave the rest for the next pass
        let frame_space = buffer.capacity() - FIFO_BYTES_OVERREAD;
        let to_read = if fill <= frame_space {
            fill + FIFO_BYTES_OVERREAD
        } else {
            debug!(
                "FIFO holds {} bytes, buffer takes {}; the rest stays queued",
                fill, frame_space
            );
            frame_space
        };

        let burst_len = self.burst_len;
        let spare = buffer.spare_mut();
        let mut offset = 0;
        while offset < to_read {
            let chunk = (to_read - offset).min(burst_len);
            self.regs
                .read_into(REG_FIFO_DATA, &mut spare[offset..offset + chunk])?;
            offset += chunk;
        }
        buffer.set_len(to_read);

        let samples = buffer.decode();
        debug!("Drained {} FIFO bytes into {} samples", fill, samples.len());
        Ok(samples)
    }

    fn fifo_length(&mut self) -> Result<usize> {
        let raw = self.regs.read_u16_le(REG_FIFO_LENGTH_0)?;
        Ok((raw & FIFO_LENGTH_MASK) as usize)
    }

    fn flush_fifo(&mut self) -> Result<()> {
        self.regs.write_register(REG_CMD, CMD_FIFO_FLUSH)
    }

    fn set_power_mode(&mut self, mode: PowerMode) -> Result<()> {
        let value = (self.acc_config0 & !ACC_CONFIG0_POWER_MODE_MASK) | mode as u8;
        self.write(RegWrite::new(REG_ACC_CONFIG0, value))?;
        debug!("Power mode {:?}", mode);
        Ok(())
    }

    fn enable_interrupt(&mut self, channel: InterruptChannel, kind: InterruptKind) -> Result<()> {
        self.write(RegWrite::new(REG_INT_CONFIG0, kind.bit()))?;
        self.write(RegWrite::new(channel.map_register(), kind.bit()))?;
        Ok(())
    }

    fn disable_interrupts(&mut self) -> Result<()> {
        self.write_table(INTERRUPT_RESET)
    }
}
