//! FIFO drain buffer and frame decoding
//!
//! The FIFO profile stores 8-bit XYZ frames: one header byte followed by one
//! byte per axis.

use log::{trace, warn};

use crate::registers::FIFO_CAPACITY;
use crate::sample::Sample;

/// Bytes per 8-bit XYZ frame (header + X + Y + Z)
pub const FRAME_LEN: usize = 4;

/// Extra bytes the sensor may stream past the reported fill level
pub const FIFO_BYTES_OVERREAD: usize = 25;

// Frame headers
pub const FIFO_HEADER_ACCEL_XYZ_8BIT: u8 = 0x9E;
pub const FIFO_HEADER_ACCEL_XYZ_12BIT: u8 = 0x8E;
pub const FIFO_HEADER_SENSOR_TIME: u8 = 0xA0;
pub const FIFO_HEADER_CONTROL: u8 = 0x48;
pub const FIFO_HEADER_EMPTY: u8 = 0x80;

const SENSOR_TIME_PAYLOAD: usize = 3;
const CONTROL_PAYLOAD: usize = 1;
const ACCEL_12BIT_PAYLOAD: usize = 6;

/// Fixed-capacity buffer owned by the worker for one drain
#[derive(Debug, Clone)]
pub struct FifoBuffer {
    data: Vec<u8>,
    len: usize,
    sample_capacity: usize,
}

impl FifoBuffer {
    /// Buffer sized for `sample_capacity` frames plus the overread margin
    pub fn new(sample_capacity: usize) -> Self {
        let size = (sample_capacity * FRAME_LEN).min(FIFO_CAPACITY) + FIFO_BYTES_OVERREAD;
        Self {
            data: vec![0u8; size],
            len: 0,
            sample_capacity,
        }
    }

    /// Total buffer size in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn sample_capacity(&self) -> usize {
        self.sample_capacity
    }

    /// Number of valid bytes from the last drain
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Space for the next drain; call [`FifoBuffer::set_len`] afterwards
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Copy bytes in (used by tests and simulations)
    pub fn fill_from(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.data.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
    }

    /// Decode the drained bytes into samples in frame order
    ///
    /// Stops at an empty frame, an unknown header or a truncated frame.
    pub fn decode(&self) -> Vec<Sample> {
        let bytes = self.as_bytes();
        let mut samples = Vec::with_capacity(self.sample_capacity);
        let mut offset = 0;

        while offset < bytes.len() {
            let header = bytes[offset];
            let payload = &bytes[offset + 1..];

            let consumed = match header {
                FIFO_HEADER_ACCEL_XYZ_8BIT => {
                    if payload.len() < FRAME_LEN - 1 {
                        break;
                    }
                    samples.push(Sample::from_fifo_8bit(&[payload[0], payload[1], payload[2]]));
                    FRAME_LEN - 1
                }
                FIFO_HEADER_ACCEL_XYZ_12BIT => {
                    if payload.len() < ACCEL_12BIT_PAYLOAD {
                        break;
                    }
                    samples.push(Sample::from_data_registers(&[
                        payload[0], payload[1], payload[2], payload[3], payload[4], payload[5],
                    ]));
                    ACCEL_12BIT_PAYLOAD
                }
                FIFO_HEADER_SENSOR_TIME => SENSOR_TIME_PAYLOAD,
                FIFO_HEADER_CONTROL => CONTROL_PAYLOAD,
                FIFO_HEADER_EMPTY => {
                    trace!("FIFO empty frame at offset {}", offset);
                    break;
                }
                other => {
                    warn!(
                        "Unknown FIFO header 0x{:02X} at offset {}, dropping rest of drain",
                        other, offset
                    );
                    break;
                }
            };

            offset += 1 + consumed;
        }

        samples
    }
}

/// Encode samples as 8-bit XYZ frames (upper eight bits of each axis)
pub fn encode_frames_8bit(samples: &[Sample]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * FRAME_LEN);
    for sample in samples {
        bytes.push(FIFO_HEADER_ACCEL_XYZ_8BIT);
        bytes.push((sample.x >> 4) as u8);
        bytes.push((sample.y >> 4) as u8);
        bytes.push((sample.z >> 4) as u8);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_holds_capacity_plus_overread() {
        let buffer = FifoBuffer::new(75);
        assert_eq!(buffer.capacity(), 75 * FRAME_LEN + FIFO_BYTES_OVERREAD);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decodes_frames_in_order() {
        let samples: Vec<Sample> = (0..10)
            .map(|i| Sample::new(i * 16, -i * 16, 1024))
            .collect();
        let mut buffer = FifoBuffer::new(10);
        buffer.fill_from(&encode_frames_8bit(&samples));
        assert_eq!(buffer.decode(), samples);
    }

    #[test]
    fn test_skips_time_and_control_frames() {
        let mut bytes = vec![FIFO_HEADER_CONTROL, 0x01];
        bytes.extend_from_slice(&[FIFO_HEADER_ACCEL_XYZ_8BIT, 0x01, 0x02, 0x03]);
        bytes.extend_from_slice(&[FIFO_HEADER_SENSOR_TIME, 0xAA, 0xBB, 0xCC]);
        bytes.extend_from_slice(&[FIFO_HEADER_ACCEL_XYZ_8BIT, 0x04, 0x05, 0x06]);

        let mut buffer = FifoBuffer::new(4);
        buffer.fill_from(&bytes);
        assert_eq!(
            buffer.decode(),
            vec![Sample::new(16, 32, 48), Sample::new(64, 80, 96)]
        );
    }

    #[test]
    fn test_stops_at_empty_frame_in_overread() {
        let mut bytes = encode_frames_8bit(&[Sample::new(16, 16, 16)]);
        bytes.extend_from_slice(&[FIFO_HEADER_EMPTY, 0x00, 0x80]);
        bytes.extend_from_slice(&encode_frames_8bit(&[Sample::new(32, 32, 32)]));

        let mut buffer = FifoBuffer::new(4);
        buffer.fill_from(&bytes);
        assert_eq!(buffer.decode(), vec![Sample::new(16, 16, 16)]);
    }

    #[test]
    fn test_truncated_frame_is_dropped() {
        let mut bytes = encode_frames_8bit(&[Sample::new(16, 16, 16)]);
        bytes.extend_from_slice(&[FIFO_HEADER_ACCEL_XYZ_8BIT, 0x01]);

        let mut buffer = FifoBuffer::new(4);
        buffer.fill_from(&bytes);
        assert_eq!(buffer.decode().len(), 1);
    }

    #[test]
    fn test_frames_landing_in_the_overread_are_kept() {
        let samples = vec![Sample::new(16, 16, 16); 7];
        let mut buffer = FifoBuffer::new(5);
        buffer.fill_from(&encode_frames_8bit(&samples));
        assert_eq!(buffer.decode().len(), 7);
    }

    #[test]
    fn test_decodes_12bit_frames() {
        let bytes = [FIFO_HEADER_ACCEL_XYZ_12BIT, 0xFF, 0x07, 0x00, 0x08, 0x01, 0x00];
        let mut buffer = FifoBuffer::new(1);
        buffer.fill_from(&bytes);
        assert_eq!(buffer.decode(), vec![Sample::new(2047, -2048, 1)]);
    }
}
