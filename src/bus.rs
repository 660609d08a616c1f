//! Register transactions over a half-duplex SPI bus
//!
//! A register read transmits one address byte and clocks in `length + 1`
//! bytes. The byte received while the address is on the wire is a dummy and
//! is discarded; callers see only the `length` payload bytes. A register
//! write is a single `{address, value}` frame.
//!
//! Both operations block for the duration of the transfer and must only be
//! called from the acquisition worker, never from interrupt context.

use log::{error, trace};

use crate::error::{AcquisitionError, Result};
use crate::registers::{SPI_ADDRESS_MASK, SPI_READ_FLAG};
use crate::status::{BusStatus, BUS_OK};

/// Receive buffer size for one transaction
pub const RX_BUFFER_SIZE: usize = 128;

/// Bytes received before the payload starts
pub const DUMMY_BYTES: usize = 1;

/// Largest payload a single read can return
pub const MAX_READ_LEN: usize = RX_BUFFER_SIZE - DUMMY_BYTES;

/// Bus capability
///
/// Implementations wrap the platform SPI device with chip select handled by
/// the device itself. Transfers return the raw platform status.
pub trait SpiBus {
    /// Whether the bus device finished its own initialization
    fn is_ready(&self) -> bool;

    /// Transmit `tx`, then keep clocking until `rx` is full
    ///
    /// `rx[0]` is the byte received while `tx[0]` was transmitted.
    fn transceive(&mut self, tx: &[u8], rx: &mut [u8]) -> BusStatus;

    /// Transmit `tx`, discarding anything received
    fn write(&mut self, tx: &[u8]) -> BusStatus;
}

impl<B: SpiBus + ?Sized> SpiBus for Box<B> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn transceive(&mut self, tx: &[u8], rx: &mut [u8]) -> BusStatus {
        (**self).transceive(tx, rx)
    }

    fn write(&mut self, tx: &[u8]) -> BusStatus {
        (**self).write(tx)
    }
}

/// What a register read does when the transfer reports failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Return the transfer error to the caller
    #[default]
    Strict,
    /// Log the failure and return whatever the receive buffer holds
    Permissive,
}

/// Register read/write protocol on top of an [`SpiBus`]
pub struct RegisterBus<B: SpiBus> {
    bus: B,
    rx_buffer: [u8; RX_BUFFER_SIZE],
    read_policy: ReadPolicy,
}

impl<B: SpiBus> RegisterBus<B> {
    pub fn new(bus: B) -> Self {
        Self::with_policy(bus, ReadPolicy::default())
    }

    pub fn with_policy(bus: B, read_policy: ReadPolicy) -> Self {
        Self {
            bus,
            rx_buffer: [0u8; RX_BUFFER_SIZE],
            read_policy,
        }
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    pub fn is_ready(&self) -> bool {
        self.bus.is_ready()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Read `length` bytes starting at `address`
    pub fn read_register(&mut self, address: u8, length: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; length];
        self.read_into(address, &mut data)?;
        Ok(data)
    }

    /// Read `data.len()` bytes starting at `address` into `data`
    pub fn read_into(&mut self, address: u8, data: &mut [u8]) -> Result<()> {
        let length = data.len();
        if length == 0 || length > MAX_READ_LEN {
            return Err(AcquisitionError::InvalidLength {
                requested: length,
                max: MAX_READ_LEN,
            });
        }

        let tx = [address | SPI_READ_FLAG];
        let status = self
            .bus
            .transceive(&tx, &mut self.rx_buffer[..length + DUMMY_BYTES]);

        if status != BUS_OK {
            error!("SPI transceive failed, err: {}, 0x{:02X}", status, tx[0]);
            if self.read_policy == ReadPolicy::Strict {
                return Err(status.into());
            }
        }

        data.copy_from_slice(&self.rx_buffer[DUMMY_BYTES..length + DUMMY_BYTES]);
        trace!("read 0x{:02X} [{}] -> {:02X?}", address, length, data);
        Ok(())
    }

    /// Read a single register
    pub fn read_u8(&mut self, address: u8) -> Result<u8> {
        let mut data = [0u8; 1];
        self.read_into(address, &mut data)?;
        Ok(data[0])
    }

    /// Read a little-endian 16-bit value from two consecutive registers
    pub fn read_u16_le(&mut self, address: u8) -> Result<u16> {
        let mut data = [0u8; 2];
        self.read_into(address, &mut data)?;
        Ok(u16::from_le_bytes(data))
    }

    /// Write a single byte to a register
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        let tx = [address & SPI_ADDRESS_MASK, value];
        let status = self.bus.write(&tx);

        if status != BUS_OK {
            error!("SPI write failed, err: {}", status);
            return Err(status.into());
        }

        trace!("write 0x{:02X} <- 0x{:02X}", address, value);
        Ok(())
    }
}
