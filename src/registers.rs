//! BMA400 register map and bit fields

// Identification
pub const REG_CHIP_ID: u8 = 0x00;

// Acceleration data (12-bit, LSB first)
pub const REG_ACC_X_LSB: u8 = 0x04;

// FIFO
pub const REG_FIFO_LENGTH_0: u8 = 0x12; // FIFO fill level LSB (11 bits total)
pub const REG_FIFO_DATA: u8 = 0x14; // Burst reads stream FIFO bytes

// Accelerometer configuration
pub const REG_ACC_CONFIG0: u8 = 0x19; // Power mode, low-power oversampling, filter-1 bandwidth
pub const REG_ACC_CONFIG1: u8 = 0x1A; // ODR, oversampling, range
pub const REG_ACC_CONFIG2: u8 = 0x1B; // Data source for the data registers

// Interrupt configuration
pub const REG_INT_CONFIG0: u8 = 0x1F;
pub const REG_INT_CONFIG1: u8 = 0x20;
pub const REG_INT1_MAP: u8 = 0x21;
pub const REG_INT2_MAP: u8 = 0x22;
pub const REG_INT12_MAP: u8 = 0x23;
pub const REG_INT12_IO_CTRL: u8 = 0x24;

// FIFO configuration
pub const REG_FIFO_CONFIG0: u8 = 0x26;
pub const REG_FIFO_CONFIG1: u8 = 0x27; // Watermark LSB
pub const REG_FIFO_CONFIG2: u8 = 0x28; // Watermark MSB (3 bits)

// Generic interrupt 1
pub const REG_GEN1INT_CONFIG0: u8 = 0x3F;
pub const REG_GEN1INT_CONFIG1: u8 = 0x40;
pub const REG_GEN1INT_CONFIG2: u8 = 0x41; // Threshold
pub const REG_GEN1INT_CONFIG3: u8 = 0x42; // Duration MSB
pub const REG_GEN1INT_CONFIG31: u8 = 0x43; // Duration LSB

pub const REG_CMD: u8 = 0x7E;

/// Expected CHIP_ID value
pub const CHIP_ID_VALUE: u8 = 0x90;

// Commands (REG_CMD)
pub const CMD_FIFO_FLUSH: u8 = 0xB0;
pub const CMD_SOFT_RESET: u8 = 0xB6;

// SPI address flags
pub const SPI_READ_FLAG: u8 = 0x80;
pub const SPI_ADDRESS_MASK: u8 = 0x7F;

// ACC_CONFIG0 fields
pub const ACC_CONFIG0_POWER_MODE_MASK: u8 = 0x03;
pub const ACC_CONFIG0_OSR_LP_POS: u8 = 5;

// ACC_CONFIG1 fields
pub const ACC_CONFIG1_RANGE_POS: u8 = 6;

// ACC_CONFIG2 fields
pub const ACC_CONFIG2_DATA_SRC_POS: u8 = 2;

// INT_CONFIG0 / INT1_MAP / INT2_MAP bits
pub const INT_DRDY: u8 = 0x80;
pub const INT_FIFO_WM: u8 = 0x40;
pub const INT_GEN1: u8 = 0x04;

// INT12_IO_CTRL: INT1 push-pull, active high
pub const INT1_ACTIVE_HIGH: u8 = 0x02;

// FIFO_CONFIG0 bits
pub const FIFO_Z_EN: u8 = 0x80;
pub const FIFO_Y_EN: u8 = 0x40;
pub const FIFO_X_EN: u8 = 0x20;
pub const FIFO_8_BIT_EN: u8 = 0x10;
pub const FIFO_AUTO_FLUSH: u8 = 0x01;

// GEN1INT_CONFIG0 fields
pub const GEN_INT_AXES_XYZ: u8 = 0xE0;
pub const GEN_INT_DATA_SRC_FILT2: u8 = 0x10;
pub const GEN_INT_REF_UPDATE_POS: u8 = 2;

// GEN1INT_CONFIG1 bits
pub const GEN_INT_CRITERION_ACTIVITY: u8 = 0x02;

/// Hardware FIFO size in bytes
pub const FIFO_CAPACITY: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_bits_are_distinct() {
        let bits = [INT_DRDY, INT_FIFO_WM, INT_GEN1];
        let combined = bits.iter().fold(0u8, |acc, b| {
            assert_eq!(acc & b, 0);
            acc | b
        });
        assert_eq!(combined.count_ones() as usize, bits.len());
    }

    #[test]
    fn test_fifo_axes_fit_in_config0() {
        assert_eq!(FIFO_X_EN | FIFO_Y_EN | FIFO_Z_EN, 0xE0);
    }
}
