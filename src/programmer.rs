//! Vendor request dispatch and write completion polling.

use crate::engine::SerialEngine;
use crate::port::{self, IspPort};
use crate::session::{
    Session, CMD_EEPROM_READ, CMD_EEPROM_WRITE, CMD_FLASH_READ, CMD_FLASH_WRITE, WRITE_TO_READ,
};

/// Vendor request codes understood by USBtiny host software.
///
/// The numbering is fixed by existing host tools.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IspRequest {
    /// Return the setup packet.
    Echo = 0,
    /// Read the port input register.
    Read = 1,
    /// Write the port output latch (wValue).
    Write = 2,
    /// Clear output latch bit (wValue).
    ClearBit = 3,
    /// Set output latch bit (wValue).
    SetBit = 4,
    /// Apply power (wValue: SCK period, wIndex: reset).
    PowerUp = 5,
    /// Release the target.
    PowerDown = 6,
    /// Issue a 4-byte command (wValue: c1c0, wIndex: c3c2).
    Spi = 7,
    /// Set poll bytes for writes (wValue: p1p2).
    PollBytes = 8,
    /// Read flash (wIndex: address).
    FlashRead = 9,
    /// Write flash (wIndex: address, wValue: timeout).
    FlashWrite = 10,
    /// Read EEPROM (wIndex: address).
    EepromRead = 11,
    /// Write EEPROM (wIndex: address, wValue: timeout).
    EepromWrite = 12,
    /// Write the port direction register (wValue).
    SetDirection = 13,
    /// Issue a single byte command (wValue: c0).
    Spi1 = 14,
}

impl TryFrom<u8> for IspRequest {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        Ok(match code {
            0 => IspRequest::Echo,
            1 => IspRequest::Read,
            2 => IspRequest::Write,
            3 => IspRequest::ClearBit,
            4 => IspRequest::SetBit,
            5 => IspRequest::PowerUp,
            6 => IspRequest::PowerDown,
            7 => IspRequest::Spi,
            8 => IspRequest::PollBytes,
            9 => IspRequest::FlashRead,
            10 => IspRequest::FlashWrite,
            11 => IspRequest::EepromRead,
            12 => IspRequest::EepromWrite,
            13 => IspRequest::SetDirection,
            14 => IspRequest::Spi1,
            _ => return Err(code),
        })
    }
}

impl IspRequest {
    /// Generic requests work whether or not the target is powered.
    pub fn is_generic(self) -> bool {
        matches!(
            self,
            IspRequest::Echo
                | IspRequest::Read
                | IspRequest::Write
                | IspRequest::ClearBit
                | IspRequest::SetBit
                | IspRequest::SetDirection
        )
    }
}

/// What follows a setup packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataPhase {
    /// Status stage only.
    None,
    /// The first `n` bytes of the setup buffer hold the reply.
    Immediate(usize),
    /// The reply is produced by [`Programmer::read_stream`].
    Streamed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Closed,
    Read,
    Write,
}

/// Protocol core: owns the port, the serial engine and the session.
pub struct Programmer<P: IspPort, E: SerialEngine> {
    port: P,
    engine: E,
    session: Session,
    stream: Stream,
}

impl<P: IspPort, E: SerialEngine> Programmer<P, E> {
    /// Creates a programmer with an unpowered target.
    pub fn new(port: P, engine: E) -> Self {
        Self {
            port,
            engine,
            session: Session::new(),
            stream: Stream::Closed,
        }
    }

    /// Current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Port the target is attached to.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Mutable access to the serial engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// `true` while the programming lines are driven.
    pub fn is_powered(&self) -> bool {
        port::is_powered(&self.port)
    }

    /// Handle a vendor setup packet.
    ///
    /// `data` holds the 8 setup bytes on entry; replies are written to its
    /// start. Unknown requests, and programming requests while the target
    /// is unpowered, are accepted without any effect.
    pub fn setup(&mut self, request: u8, value: u16, index: u16, data: &mut [u8; 8]) -> DataPhase {
        let req = match IspRequest::try_from(request) {
            Ok(req) => req,
            Err(code) => {
                log::debug!("ignoring request {}", code);
                return DataPhase::None;
            }
        };
        self.stream = Stream::Closed;

        if req.is_generic() {
            return self.generic(req, value, data);
        }

        match req {
            IspRequest::PowerUp => {
                self.session = Session {
                    sck_period: value as u8,
                    ..Session::new()
                };
                let reset = index as u8 != 0;
                port::power_up(&mut self.port, reset);
                log::debug!("power up, sck period {}, reset {}", value as u8, reset);
                return DataPhase::None;
            }
            IspRequest::PowerDown => {
                port::power_down(&mut self.port);
                self.session = Session::new();
                log::debug!("power down");
                return DataPhase::None;
            }
            _ => {}
        }

        if !self.is_powered() {
            return DataPhase::None;
        }

        match req {
            IspRequest::Spi => {
                let mut tx = [0u8; 4];
                tx.copy_from_slice(&data[2..6]);
                self.engine
                    .transfer(&mut self.port, self.session.sck_period, &tx, &mut data[..4]);
                DataPhase::Immediate(4)
            }
            IspRequest::Spi1 => {
                let tx = [data[2]];
                self.engine
                    .transfer(&mut self.port, self.session.sck_period, &tx, &mut data[..1]);
                DataPhase::Immediate(1)
            }
            IspRequest::PollBytes => {
                self.session.poll1 = value as u8;
                self.session.poll2 = (value >> 8) as u8;
                DataPhase::None
            }
            IspRequest::FlashRead | IspRequest::EepromRead => {
                self.session.address = index;
                self.session.opcode = if req == IspRequest::FlashRead {
                    CMD_FLASH_READ
                } else {
                    CMD_EEPROM_READ
                };
                self.stream = Stream::Read;
                log::debug!("read stream at {:#06x}", index);
                DataPhase::Streamed
            }
            IspRequest::FlashWrite | IspRequest::EepromWrite => {
                self.session.address = index;
                self.session.timeout = value;
                self.session.opcode = if req == IspRequest::FlashWrite {
                    CMD_FLASH_WRITE
                } else {
                    CMD_EEPROM_WRITE
                };
                self.stream = Stream::Write;
                log::debug!("write stream at {:#06x}, timeout {}us", index, value);
                DataPhase::None
            }
            _ => DataPhase::None,
        }
    }

    fn generic(&mut self, req: IspRequest, value: u16, data: &mut [u8; 8]) -> DataPhase {
        let bit = 1u8 << (value & 7);

        match req {
            IspRequest::Echo => return DataPhase::Immediate(8),
            IspRequest::Read => {
                data[0] = self.port.input();
                return DataPhase::Immediate(1);
            }
            IspRequest::Write => self.port.set_output(value as u8),
            IspRequest::ClearBit => {
                let v = self.port.output() & !bit;
                self.port.set_output(v);
            }
            IspRequest::SetBit => {
                let v = self.port.output() | bit;
                self.port.set_output(v);
            }
            IspRequest::SetDirection => self.port.set_direction(value as u8),
            _ => {}
        }
        DataPhase::None
    }

    /// Fill `buf` with consecutive bytes of the open read stream.
    ///
    /// Returns the number of bytes produced, `0` if no read stream is open.
    pub fn read_stream(&mut self, buf: &mut [u8]) -> usize {
        if self.stream != Stream::Read {
            return 0;
        }

        for b in buf.iter_mut() {
            self.exchange();
            *b = self.session.res[3];
        }
        buf.len()
    }

    /// Program consecutive bytes of the open write stream.
    ///
    /// Every byte is confirmed by polling before the next one is sent.
    /// Bytes that do not confirm within the timeout are left as they are,
    /// the host is expected to verify.
    pub fn write_stream(&mut self, data: &[u8]) {
        if self.stream != Stream::Write {
            return;
        }

        for &b in data {
            self.session.cmd[3] = b;
            self.exchange();
            self.poll_write(b);
        }
    }

    fn exchange(&mut self) {
        self.session.encode();
        let cmd = self.session.cmd;
        self.engine.transfer(
            &mut self.port,
            self.session.sck_period,
            &cmd,
            &mut self.session.res,
        );
        log::trace!("frame {:02x?} -> {:02x?}", cmd, self.session.res);
    }

    /// Read the just written location back until it returns `value`.
    ///
    /// A read-back equal to one of the poll bytes means "busy" even if it
    /// matches. Gives up once `timeout` microseconds of frames are spent;
    /// the first read is always made.
    fn poll_write(&mut self, value: u8) -> bool {
        self.session.cmd[0] ^= WRITE_TO_READ;
        let cmd = self.session.cmd;
        let timeout = self.session.timeout as u32;
        let step = self.session.frame_time_us();
        let mut elapsed = 0u32;

        loop {
            self.engine.transfer(
                &mut self.port,
                self.session.sck_period,
                &cmd,
                &mut self.session.res,
            );
            let r = self.session.res[3];
            if r == value && r != self.session.poll1 && r != self.session.poll2 {
                return true;
            }

            elapsed += step;
            if elapsed >= timeout {
                log::debug!(
                    "write of {:#04x} not confirmed at {:#06x}",
                    value,
                    self.session.address.wrapping_sub(1)
                );
                return false;
            }
        }
    }
}
