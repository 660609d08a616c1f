//! Accelerometer sample types

use crate::profile::Range;

/// Size of an encoded sample notification payload
pub const SAMPLE_PAYLOAD_LEN: usize = 6;

/// One accelerometer reading in device-native units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    /// X-axis (raw value)
    pub x: i16,
    /// Y-axis (raw value)
    pub y: i16,
    /// Z-axis (raw value)
    pub z: i16,
}

impl Sample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Build a sample from the six data registers (12-bit, LSB first)
    pub fn from_data_registers(data: &[u8; 6]) -> Self {
        Self {
            x: sign_extend_12(data[0], data[1]),
            y: sign_extend_12(data[2], data[3]),
            z: sign_extend_12(data[4], data[5]),
        }
    }

    /// Build a sample from an 8-bit FIFO frame payload
    ///
    /// 8-bit frames carry the upper eight bits of the 12-bit reading.
    pub fn from_fifo_8bit(data: &[u8; 3]) -> Self {
        Self {
            x: (data[0] as i8 as i16) << 4,
            y: (data[1] as i8 as i16) << 4,
            z: (data[2] as i8 as i16) << 4,
        }
    }

    /// Convert raw values to g for the given measurement range
    pub fn to_g(&self, range: Range) -> (f32, f32, f32) {
        let scale = range.lsb_per_g();
        (
            self.x as f32 / scale,
            self.y as f32 / scale,
            self.z as f32 / scale,
        )
    }

    /// Encode as the notification payload: x, y, z little-endian
    pub fn to_le_bytes(&self) -> [u8; SAMPLE_PAYLOAD_LEN] {
        let [x0, x1] = self.x.to_le_bytes();
        let [y0, y1] = self.y.to_le_bytes();
        let [z0, z1] = self.z.to_le_bytes();
        [x0, x1, y0, y1, z0, z1]
    }

    pub fn from_le_bytes(bytes: [u8; SAMPLE_PAYLOAD_LEN]) -> Self {
        Self {
            x: i16::from_le_bytes([bytes[0], bytes[1]]),
            y: i16::from_le_bytes([bytes[2], bytes[3]]),
            z: i16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// Sample with timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedSample {
    pub timestamp: f64, // Seconds since the worker started
    pub sample: Sample,
}

fn sign_extend_12(lsb: u8, msb: u8) -> i16 {
    let raw = ((msb as u16 & 0x0F) << 8) | lsb as u16;
    ((raw << 4) as i16) >> 4
}
