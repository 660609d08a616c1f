//! Acquisition profiles
//!
//! Each [`DeviceConfig`] variant compiles to a [`ProfileProgram`]: an ordered
//! table of full-byte register writes plus the single interrupt it enables
//! and the power mode it leaves the sensor in. Applying a profile is a table
//! walk; no register is read back and merged, so a new profile always
//! replaces every field the previous one touched.

use crate::error::{AcquisitionError, Result};
use crate::fifo::FRAME_LEN;
use crate::registers::*;

/// Default number of frames per FIFO batch (one classifier feature window
/// of 25 samples per axis)
pub const DEFAULT_FIFO_SAMPLES: u16 = 75;

/// Sensor power mode (ACC_CONFIG0 bits 1:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerMode {
    /// Standby; interrupts are not serviced
    Sleep = 0b00,
    LowPower = 0b01,
    Normal = 0b10,
}

/// Output data rate (ACC_CONFIG1 bits 3:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataRate {
    Hz12_5 = 0x05,
    Hz25 = 0x06,
    Hz50 = 0x07,
    Hz100 = 0x08,
    Hz200 = 0x09,
    Hz400 = 0x0A,
    Hz800 = 0x0B,
}

/// Measurement range (ACC_CONFIG1 bits 7:6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Range {
    G2 = 0b00,
    #[default]
    G4 = 0b01,
    G8 = 0b10,
    G16 = 0b11,
}

impl Range {
    /// Sensitivity of the 12-bit data registers
    pub fn lsb_per_g(self) -> f32 {
        match self {
            Range::G2 => 1024.0,
            Range::G4 => 512.0,
            Range::G8 => 256.0,
            Range::G16 => 128.0,
        }
    }
}

/// Low-power oversampling setting (ACC_CONFIG0 bits 6:5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LowPowerOversampling {
    Setting0 = 0b00,
    Setting1 = 0b01,
    Setting2 = 0b10,
    Setting3 = 0b11,
}

/// Filter feeding the data registers or the interrupt engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataSource {
    /// Variable ODR filter
    Filter1 = 0b00,
    /// Fixed 100 Hz filter
    Filter2 = 0b01,
}

/// Generic interrupt hysteresis band (GEN1INT_CONFIG0 bits 1:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Hysteresis {
    None = 0b00,
    Mg24 = 0b01,
    Mg48 = 0b10,
    Mg96 = 0b11,
}

/// Generic interrupt reference update mode (GEN1INT_CONFIG0 bits 3:2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReferenceUpdate {
    Manual = 0b00,
    OneTime = 0b01,
    EveryTime = 0b10,
    EveryTimeLowPower = 0b11,
}

/// Physical interrupt output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptChannel {
    Int1,
    Int2,
}

impl InterruptChannel {
    pub fn map_register(self) -> u8 {
        match self {
            InterruptChannel::Int1 => REG_INT1_MAP,
            InterruptChannel::Int2 => REG_INT2_MAP,
        }
    }
}

/// Interrupt source that a profile routes to its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    DataReady,
    FifoWatermark,
    /// Generic interrupt 1 (activity)
    Activity,
}

impl InterruptKind {
    /// Bit in INT_CONFIG0 and in the INTx_MAP registers
    pub fn bit(self) -> u8 {
        match self {
            InterruptKind::DataReady => INT_DRDY,
            InterruptKind::FifoWatermark => INT_FIFO_WM,
            InterruptKind::Activity => INT_GEN1,
        }
    }
}

/// A single full-byte register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    pub reg: u8,
    pub value: u8,
}

impl RegWrite {
    pub const fn new(reg: u8, value: u8) -> Self {
        Self { reg, value }
    }
}

/// Clears every interrupt enable and route. Written before any profile.
pub const INTERRUPT_RESET: &[RegWrite] = &[
    RegWrite::new(REG_INT_CONFIG0, 0x00),
    RegWrite::new(REG_INT_CONFIG1, 0x00),
    RegWrite::new(REG_INT1_MAP, 0x00),
    RegWrite::new(REG_INT2_MAP, 0x00),
    RegWrite::new(REG_INT12_MAP, 0x00),
];

/// Compiled register program for one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProgram {
    pub name: &'static str,
    pub writes: Vec<RegWrite>,
    pub interrupt: InterruptKind,
    pub channel: InterruptChannel,
    /// Written last; interrupts fire only outside standby
    pub power_mode: PowerMode,
}

/// Mutually exclusive acquisition profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceConfig {
    /// Low-rate single samples on the data-ready interrupt
    #[default]
    LowPowerDrdy,
    /// Batched samples on the FIFO watermark interrupt
    FifoWatermark {
        /// Frames per batch; the watermark register holds this times the frame length
        watermark_level: u16,
        /// Frames the worker's drain buffer can hold
        sample_capacity: u16,
    },
    /// Motion-triggered samples on the generic activity interrupt
    ActivityThreshold {
        /// Magnitude threshold, 8 mg per LSB
        threshold: u8,
        /// Minimum duration in data-rate ticks
        duration: u16,
        hysteresis: Hysteresis,
    },
}

impl DeviceConfig {
    /// FIFO watermark profile whose buffer holds exactly one batch
    pub fn fifo_watermark(samples: u16) -> Self {
        DeviceConfig::FifoWatermark {
            watermark_level: samples,
            sample_capacity: samples,
        }
    }

    /// Activity profile with the reference tuning: 128 mg for 15 ticks, 48 mg hysteresis
    pub fn activity() -> Self {
        DeviceConfig::ActivityThreshold {
            threshold: 0x10,
            duration: 15,
            hysteresis: Hysteresis::Mg48,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceConfig::LowPowerDrdy => "low-power-drdy",
            DeviceConfig::FifoWatermark { .. } => "fifo-watermark",
            DeviceConfig::ActivityThreshold { .. } => "activity-threshold",
        }
    }

    pub fn interrupt(&self) -> InterruptKind {
        match self {
            DeviceConfig::LowPowerDrdy => InterruptKind::DataReady,
            DeviceConfig::FifoWatermark { .. } => InterruptKind::FifoWatermark,
            DeviceConfig::ActivityThreshold { .. } => InterruptKind::Activity,
        }
    }

    /// Watermark in FIFO bytes, if this is the FIFO profile
    pub fn watermark_bytes(&self) -> Option<usize> {
        match self {
            DeviceConfig::FifoWatermark {
                watermark_level, ..
            } => Some(*watermark_level as usize * FRAME_LEN),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            DeviceConfig::LowPowerDrdy => Ok(()),
            DeviceConfig::FifoWatermark {
                watermark_level,
                sample_capacity,
            } => {
                if watermark_level == 0 {
                    return Err(AcquisitionError::Configuration(
                        "FIFO watermark level must be at least one frame".to_string(),
                    ));
                }
                if watermark_level > sample_capacity {
                    return Err(AcquisitionError::Configuration(format!(
                        "FIFO watermark of {} frames exceeds buffer capacity of {} frames",
                        watermark_level, sample_capacity
                    )));
                }
                let bytes = watermark_level as usize * FRAME_LEN;
                if bytes > FIFO_CAPACITY {
                    return Err(AcquisitionError::Configuration(format!(
                        "FIFO watermark of {} bytes exceeds the {}-byte hardware FIFO",
                        bytes, FIFO_CAPACITY
                    )));
                }
                Ok(())
            }
            DeviceConfig::ActivityThreshold { duration, .. } => {
                if duration == 0 {
                    return Err(AcquisitionError::Configuration(
                        "Activity duration must be non-zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Compile this profile into its register program
    pub fn program(&self) -> Result<ProfileProgram> {
        self.validate()?;

        let program = match *self {
            DeviceConfig::LowPowerDrdy => ProfileProgram {
                name: self.name(),
                writes: vec![
                    RegWrite::new(
                        REG_ACC_CONFIG0,
                        acc_config0(LowPowerOversampling::Setting0, PowerMode::Sleep),
                    ),
                    RegWrite::new(REG_ACC_CONFIG1, acc_config1(DataRate::Hz25, Range::G4)),
                    RegWrite::new(REG_ACC_CONFIG2, acc_config2(DataSource::Filter1)),
                    RegWrite::new(REG_FIFO_CONFIG0, 0x00),
                    RegWrite::new(REG_GEN1INT_CONFIG0, 0x00),
                    RegWrite::new(REG_INT12_IO_CTRL, INT1_ACTIVE_HIGH),
                ],
                interrupt: InterruptKind::DataReady,
                channel: InterruptChannel::Int1,
                power_mode: PowerMode::LowPower,
            },
            DeviceConfig::FifoWatermark {
                watermark_level, ..
            } => {
                let watermark = watermark_level * FRAME_LEN as u16;
                ProfileProgram {
                    name: self.name(),
                    writes: vec![
                        RegWrite::new(
                            REG_ACC_CONFIG0,
                            acc_config0(LowPowerOversampling::Setting0, PowerMode::Sleep),
                        ),
                        RegWrite::new(REG_ACC_CONFIG1, acc_config1(DataRate::Hz25, Range::G4)),
                        RegWrite::new(REG_ACC_CONFIG2, acc_config2(DataSource::Filter1)),
                        RegWrite::new(
                            REG_FIFO_CONFIG0,
                            FIFO_X_EN | FIFO_Y_EN | FIFO_Z_EN | FIFO_8_BIT_EN | FIFO_AUTO_FLUSH,
                        ),
                        RegWrite::new(REG_FIFO_CONFIG1, (watermark & 0xFF) as u8),
                        RegWrite::new(REG_FIFO_CONFIG2, ((watermark >> 8) & 0x07) as u8),
                        RegWrite::new(REG_GEN1INT_CONFIG0, 0x00),
                        RegWrite::new(REG_INT12_IO_CTRL, INT1_ACTIVE_HIGH),
                    ],
                    interrupt: InterruptKind::FifoWatermark,
                    channel: InterruptChannel::Int1,
                    power_mode: PowerMode::Normal,
                }
            }
            DeviceConfig::ActivityThreshold {
                threshold,
                duration,
                hysteresis,
            } => ProfileProgram {
                name: self.name(),
                writes: vec![
                    RegWrite::new(
                        REG_ACC_CONFIG0,
                        acc_config0(LowPowerOversampling::Setting0, PowerMode::Sleep),
                    ),
                    RegWrite::new(REG_ACC_CONFIG1, acc_config1(DataRate::Hz100, Range::G4)),
                    RegWrite::new(REG_ACC_CONFIG2, acc_config2(DataSource::Filter1)),
                    RegWrite::new(REG_FIFO_CONFIG0, 0x00),
                    RegWrite::new(
                        REG_GEN1INT_CONFIG0,
                        GEN_INT_AXES_XYZ
                            | GEN_INT_DATA_SRC_FILT2
                            | (ReferenceUpdate::EveryTime as u8) << GEN_INT_REF_UPDATE_POS
                            | hysteresis as u8,
                    ),
                    // Activity criterion, OR over axes
                    RegWrite::new(REG_GEN1INT_CONFIG1, GEN_INT_CRITERION_ACTIVITY),
                    RegWrite::new(REG_GEN1INT_CONFIG2, threshold),
                    RegWrite::new(REG_GEN1INT_CONFIG3, (duration >> 8) as u8),
                    RegWrite::new(REG_GEN1INT_CONFIG31, (duration & 0xFF) as u8),
                    RegWrite::new(REG_INT12_IO_CTRL, INT1_ACTIVE_HIGH),
                ],
                interrupt: InterruptKind::Activity,
                channel: InterruptChannel::Int1,
                power_mode: PowerMode::Normal,
            },
        };

        Ok(program)
    }
}

fn acc_config0(osr_lp: LowPowerOversampling, mode: PowerMode) -> u8 {
    (osr_lp as u8) << ACC_CONFIG0_OSR_LP_POS | mode as u8
}

fn acc_config1(odr: DataRate, range: Range) -> u8 {
    (range as u8) << ACC_CONFIG1_RANGE_POS | odr as u8
}

fn acc_config2(source: DataSource) -> u8 {
    (source as u8) << ACC_CONFIG2_DATA_SRC_POS
}
