//! Synchronous serial transfer towards the target.
//!
//! Bits are shifted MSB first. For every bit the data line is set, then
//! after one half-period the clock goes active, after a second half-period
//! the data-in line is sampled and clock and data-out return to idle.
//!
//! The half-period is the host supplied `sck_period` in units of
//! [`SCK_UNIT_NS`]. It sets the clock rate seen by the target, whose serial
//! interface accepts at most a quarter of its own clock frequency. A delay
//! shorter than requested breaks programming, so transfers run with
//! interrupts held off.

use embedded_hal::delay::DelayNs;

use crate::port::IspPort;

/// Calibration unit of `sck_period`, in nanoseconds.
pub const SCK_UNIT_NS: u32 = 500;

/// Number of calibration units in one half-period.
///
/// `0` stands for a full turn of an 8-bit delay counter.
pub fn half_period_units(sck_period: u8) -> u32 {
    match sck_period {
        0 => 256,
        n => n as u32,
    }
}

/// Full-duplex byte exchange with the target.
///
/// Implementations must produce identical framing; which one is used is
/// decided when the firmware is built.
pub trait SerialEngine {
    /// Shift out every byte of `tx` and store the byte shifted in
    /// simultaneously at the same position of `rx`.
    ///
    /// `rx` must be at least as long as `tx`.
    fn transfer<P: IspPort>(&mut self, port: &mut P, sck_period: u8, tx: &[u8], rx: &mut [u8]);
}

/// Software strategy, toggles port lines and waits with a calibrated delay.
pub struct BitBang<D: DelayNs> {
    delay: D,
}

impl<D: DelayNs> BitBang<D> {
    /// Creates a bit-bang engine using `delay` for half-period waits.
    pub fn new(delay: D) -> Self {
        Self { delay }
    }

    /// Give back the delay provider.
    pub fn release(self) -> D {
        self.delay
    }

    fn shift_byte<P: IspPort>(&mut self, port: &mut P, half_period_ns: u32, byte: u8) -> u8 {
        let pins = P::PINS;
        let idle = pins.level(pins.sck | pins.mosi, false);
        let mut r = 0u8;

        for bit in (0..8).rev() {
            let base = port.output() & !(pins.sck | pins.mosi);
            let mosi = pins.level(pins.mosi, byte & (1 << bit) != 0);
            let sck_idle = pins.level(pins.sck, false);
            port.set_output(base | mosi | sck_idle);
            self.delay.delay_ns(half_period_ns);

            port.set_output(base | mosi | pins.level(pins.sck, true));
            self.delay.delay_ns(half_period_ns);

            r <<= 1;
            if port.input() & pins.miso != 0 {
                r |= 1;
            }

            port.set_output(base | idle);
        }
        r
    }
}

impl<D: DelayNs> SerialEngine for BitBang<D> {
    fn transfer<P: IspPort>(&mut self, port: &mut P, sck_period: u8, tx: &[u8], rx: &mut [u8]) {
        let half_period_ns = half_period_units(sck_period) * SCK_UNIT_NS;

        critical_section::with(|_| {
            for (c, r) in tx.iter().zip(rx.iter_mut()) {
                *r = self.shift_byte(port, half_period_ns, *c);
            }
        });
    }
}

/// Synchronous shift hardware clocked independently of the CPU.
///
/// A typical implementation is a universal serial interface whose clock is
/// driven by a timer compare match.
pub trait ShiftUnit {
    /// Configure the shift clock to `units` calibration units per
    /// half-period, see [`half_period_units`].
    fn set_half_period(&mut self, units: u32);

    /// Load `byte` and start shifting it out MSB first.
    fn start(&mut self, byte: u8);

    /// `true` once all eight bits have been shifted.
    fn is_complete(&mut self) -> bool;

    /// Byte shifted in during the last exchange.
    fn read(&mut self) -> u8;
}

/// Hardware-assisted strategy, the CPU only waits for a [`ShiftUnit`].
pub struct HardwareShift<U: ShiftUnit> {
    unit: U,
}

impl<U: ShiftUnit> HardwareShift<U> {
    /// Creates a hardware-assisted engine around `unit`.
    pub fn new(unit: U) -> Self {
        Self { unit }
    }

    /// The shift unit in use.
    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// Give back the shift unit.
    pub fn release(self) -> U {
        self.unit
    }
}

impl<U: ShiftUnit> SerialEngine for HardwareShift<U> {
    fn transfer<P: IspPort>(&mut self, _port: &mut P, sck_period: u8, tx: &[u8], rx: &mut [u8]) {
        critical_section::with(|_| {
            self.unit.set_half_period(half_period_units(sck_period));
            for (c, r) in tx.iter().zip(rx.iter_mut()) {
                self.unit.start(*c);
                while !self.unit.is_complete() {
                    core::hint::spin_loop();
                }
                *r = self.unit.read();
            }
        });
    }
}
