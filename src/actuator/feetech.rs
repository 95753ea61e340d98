// Feetech STS-series half-duplex serial bus
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Only the registers the rig needs are exposed: torque, mode, goal velocity,
// present position and present load.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const HEADER: [u8; 2] = [0xFF, 0xFF];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register addresses (STS3215 memory map)
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,   // 1 byte: 0=position, 1=velocity
    TorqueEnable = 40,    // 1 byte
    Acceleration = 41,    // 1 byte, 100 steps/s^2 per unit
    GoalVelocity = 46,    // 2 bytes, sign bit 15
    Lock = 55,            // 1 byte
    PresentPosition = 56, // 2 bytes, 0..4095
    PresentLoad = 60,     // 2 bytes, sign bit 10, 0.1 % units
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from servo {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for servo {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Servo {id} returned error status: 0x{status:02X}")]
    ServoStatus { id: u8, status: u8 },

    #[error("Timeout waiting for response from servo {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// One serial bus shared by every servo of the rig
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }

    /// Inverted byte sum over everything after the header
    fn checksum(data: &[u8]) -> u8 {
        !data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
    }

    fn encode(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(6 + params.len());
        packet.extend_from_slice(&HEADER);
        packet.extend_from_slice(&[id, (params.len() + 2) as u8, instruction as u8]);
        packet.extend_from_slice(params);
        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);
        packet
    }

    /// Send one instruction and read back the status packet parameters
    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::encode(id, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_status(id)
    }

    fn read_status(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id: expected_id }
            } else {
                FeetechError::Io(e)
            }
        })?;

        if head[..2] != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", &head[..2]),
            });
        }
        let (id, length) = (head[2], head[3] as usize);
        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: got {}", id),
            });
        }
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length {} too short", length),
            });
        }

        // error byte + params + checksum
        let mut body = vec![0u8; length];
        self.port.read_exact(&mut body)?;
        Self::decode_status(id, &body)
    }

    /// Validate a status body (everything after the length byte)
    fn decode_status(id: u8, body: &[u8]) -> Result<Vec<u8>> {
        let (payload, checksum) = body.split_at(body.len() - 1);
        let mut covered = vec![id, body.len() as u8];
        covered.extend_from_slice(payload);
        if Self::checksum(&covered) != checksum[0] {
            return Err(FeetechError::ChecksumMismatch { id });
        }
        if payload[0] != 0 {
            return Err(FeetechError::ServoStatus {
                id,
                status: payload[0],
            });
        }
        Ok(payload[1..].to_vec())
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        match self.transact(id, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("servo {}: write {:?} = {}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, value])?;
        Ok(())
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        debug!("servo {}: write {:?} = {}", id, register, value);
        let [lo, hi] = value.to_le_bytes();
        self.transact(id, Instruction::Write, &[register as u8, lo, hi])?;
        Ok(())
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let response = self.transact(id, Instruction::Read, &[register as u8, 2])?;
        match response.as_slice() {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            }),
        }
    }

    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)
    }

    /// Must be called with torque disabled
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }

    pub fn set_acceleration(&mut self, id: u8, value: u8) -> Result<()> {
        self.write_u8(id, Register::Acceleration, value)
    }

    pub fn set_velocity(&mut self, id: u8, velocity: i16) -> Result<()> {
        self.write_u16(id, Register::GoalVelocity, encode_signed(velocity, 15))
    }

    /// Single-turn position, 0..4095
    pub fn position(&mut self, id: u8) -> Result<u16> {
        Ok(self.read_u16(id, Register::PresentPosition)? & 0x0FFF)
    }

    /// Signed load in 0.1 % of full duty
    pub fn load(&mut self, id: u8) -> Result<i16> {
        Ok(decode_signed(self.read_u16(id, Register::PresentLoad)?, 10))
    }
}

/// Sign-magnitude encoding with the sign at `sign_bit`
fn encode_signed(value: i16, sign_bit: u8) -> u16 {
    let magnitude = value.unsigned_abs() & ((1u16 << sign_bit) - 1);
    if value < 0 {
        (1u16 << sign_bit) | magnitude
    } else {
        magnitude
    }
}

fn decode_signed(raw: u16, sign_bit: u8) -> i16 {
    let magnitude = (raw & ((1u16 << sign_bit) - 1)) as i16;
    if raw & (1u16 << sign_bit) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(FeetechBus::checksum(&[1u8, 4, 0x03, 30, 0, 2]), 215);
    }

    #[test]
    fn test_velocity_sign_bit() {
        assert_eq!(encode_signed(100, 15), 100);
        assert_eq!(encode_signed(-100, 15), 0x8064);
        assert_eq!(decode_signed(0x8064, 15), -100);
    }

    #[test]
    fn test_load_sign_bit() {
        // load direction lives in bit 10
        assert_eq!(decode_signed(0x0400 | 220, 10), -220);
        assert_eq!(decode_signed(180, 10), 180);
    }

    #[test]
    fn test_encode_read_position() {
        let packet = FeetechBus::encode(3, Instruction::Read, &[Register::PresentPosition as u8, 2]);
        assert_eq!(packet, vec![0xFF, 0xFF, 3, 4, 0x02, 56, 2, !(3u8 + 4 + 2 + 56 + 2)]);
    }

    #[test]
    fn test_decode_status() {
        // id 3, no error, position bytes 0x10 0x02
        let id = 3u8;
        let payload = [0u8, 0x10, 0x02];
        let length = (payload.len() + 1) as u8;
        let checksum = !(id + length + 0x10 + 0x02);
        let mut body = payload.to_vec();
        body.push(checksum);
        let params = FeetechBus::decode_status(id, &body).unwrap();
        assert_eq!(params, vec![0x10, 0x02]);
    }

    #[test]
    fn test_decode_status_reports_servo_error() {
        let id = 1u8;
        let body = [0x20u8, !(1u8 + 2 + 0x20)];
        match FeetechBus::decode_status(id, &body) {
            Err(FeetechError::ServoStatus { id: 1, status: 0x20 }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
