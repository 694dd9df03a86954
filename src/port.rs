//! Programming port capability and power sequencing.

/// Masks of the port lines used to program the target.
///
/// All masks refer to bits of the same 8-bit GPIO port that
/// [`IspPort`] gives access to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinMap {
    /// Activity indicator, driven while the target is powered.
    pub led: u8,
    /// Target reset line.
    pub reset: u8,
    /// Serial clock towards the target.
    pub sck: u8,
    /// Serial data towards the target.
    pub mosi: u8,
    /// Serial data from the target. Always an input.
    pub miso: u8,
    /// Lines that drive the target through an inverting stage.
    ///
    /// For these lines a latch bit of `1` puts the target-side signal low.
    /// Only `sck` and `mosi` are looked at.
    pub inverted: u8,
}

impl PinMap {
    /// Classic USBtinyISP layout, all lines non-inverted.
    pub const USBTINYISP: PinMap = PinMap {
        led: 1 << 0,
        reset: 1 << 4,
        mosi: 1 << 5,
        miso: 1 << 6,
        sck: 1 << 7,
        inverted: 0,
    };

    /// ATtiny24A board: clock and data-out go through transistors and are
    /// inverted.
    pub const ATTINY24A: PinMap = PinMap {
        led: 1 << 2,
        reset: 1 << 3,
        sck: 1 << 4,
        mosi: 1 << 5,
        miso: 1 << 6,
        inverted: (1 << 4) | (1 << 5),
    };

    /// Lines that are driven while the target is powered.
    pub const fn programming_lines(&self) -> u8 {
        self.led | self.reset | self.sck | self.mosi
    }

    /// Latch bits that put `mask` lines to the logic level `high`.
    pub const fn level(&self, mask: u8, high: bool) -> u8 {
        let raw = if high { mask } else { 0 };
        raw ^ (self.inverted & mask)
    }
}

/// Access to the GPIO port the target is attached to.
///
/// Accessors map one to one to the input, output latch and direction
/// registers of an 8-bit port. They are called with the timing-critical
/// section held, so implementations must not block.
pub trait IspPort {
    /// Line assignment of this port.
    const PINS: PinMap;

    /// Input register, the current level of every line.
    fn input(&mut self) -> u8;

    /// Output latch as last written.
    fn output(&self) -> u8;

    /// Write the output latch.
    fn set_output(&mut self, value: u8);

    /// Direction register, `1` bits are driven outputs.
    fn direction(&self) -> u8;

    /// Write the direction register.
    fn set_direction(&mut self, value: u8);
}

/// Drive the programming lines and enter programming mode.
///
/// Indicator is lit, clock and data-out rest at their idle (low) level,
/// reset is asserted only when `reset` is set, and released otherwise.
pub fn power_up<P: IspPort>(port: &mut P, reset: bool) {
    let pins = P::PINS;

    let mut latch = pins.led | pins.level(pins.sck | pins.mosi, false);
    if reset {
        latch |= pins.reset;
    }

    let direction = port.direction() | pins.programming_lines();
    port.set_direction(direction);
    let output = (port.output() & !(pins.sck | pins.mosi | pins.reset)) | latch;
    port.set_output(output);
}

/// Release every programming line to a floating input.
pub fn power_down<P: IspPort>(port: &mut P) {
    let mask = P::PINS.programming_lines();

    let direction = port.direction() & !mask;
    port.set_direction(direction);
    let output = port.output() & !mask;
    port.set_output(output);
}

/// `true` while at least one programming line is set in the output latch.
pub fn is_powered<P: IspPort>(port: &P) -> bool {
    port.output() & P::PINS.programming_lines() != 0
}
