//! Programming session state and command frame encoding.

/// Read program memory, low byte of the addressed word.
pub const CMD_FLASH_READ: u8 = 0x20;
/// Write program memory, low byte of the addressed word.
pub const CMD_FLASH_WRITE: u8 = 0x40;
/// Read EEPROM byte.
pub const CMD_EEPROM_READ: u8 = 0xa0;
/// Write EEPROM byte.
pub const CMD_EEPROM_WRITE: u8 = 0xc0;

/// Opcode bit marking EEPROM commands, which are byte addressed.
pub const EEPROM_FLAG: u8 = 0x80;
/// Opcode bit selecting the high byte of a program memory word.
pub const HIGH_BYTE_FLAG: u8 = 0x08;
/// XOR mask that turns a write opcode into the matching read opcode.
pub const WRITE_TO_READ: u8 = 0x60;

/// State shared by all requests, lives as long as the device is powered.
///
/// Only Power-Up and the read/write/poll requests change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    /// Serial clock half-period in calibration units.
    pub sck_period: u8,
    /// First value never accepted as a completed write.
    pub poll1: u8,
    /// Second value never accepted as a completed write.
    pub poll2: u8,
    /// Next location to read or write.
    pub address: u16,
    /// Write polling limit in microseconds.
    pub timeout: u16,
    /// Selected read or write opcode.
    pub opcode: u8,
    /// Outgoing command frame.
    pub cmd: [u8; 4],
    /// Frame shifted in during the last transfer.
    pub res: [u8; 4],
}

impl Session {
    /// Session as it is right after reset.
    pub const fn new() -> Self {
        Self {
            sck_period: 10,
            poll1: 0,
            poll2: 0,
            address: 0,
            timeout: 0,
            opcode: CMD_FLASH_READ,
            cmd: [0; 4],
            res: [0; 4],
        }
    }

    /// `true` when the selected opcode addresses EEPROM.
    pub fn is_eeprom(&self) -> bool {
        self.opcode & EEPROM_FLAG != 0
    }

    /// Fill the first three bytes of the command frame for the current
    /// address and advance the address by one.
    ///
    /// The counter runs in the same unit for both memories: flash is
    /// addressed by byte within 16-bit words, EEPROM by byte, so EEPROM
    /// addresses are doubled before splitting into word address and high
    /// byte flag. Byte 3 is left as is.
    pub fn encode(&mut self) {
        let mut a = self.address;
        self.address = self.address.wrapping_add(1);

        if self.is_eeprom() {
            a <<= 1;
        }

        self.cmd[0] = self.opcode;
        if a & 1 != 0 {
            self.cmd[0] |= HIGH_BYTE_FLAG;
        }
        self.cmd[1] = (a >> 9) as u8;
        self.cmd[2] = (a >> 1) as u8;
    }

    /// Microseconds one 4-byte frame occupies on the wire.
    pub fn frame_time_us(&self) -> u32 {
        32 * crate::engine::half_period_units(self.sck_period)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
