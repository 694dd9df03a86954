#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Implements a USBtiny compatible AVR In-System Programmer for a `usb-device` device.
//!
//! ## About
//!
//! USBtinyISP is a small programmer: a microcontroller attached to USB
//! receives vendor control requests from the host and turns them into
//! the synchronous serial protocol AVR chips use for in-system
//! programming of flash and EEPROM.
//!
//! Host software such as [avrdude](https://github.com/avrdudes/avrdude)
//! (`-c usbtiny`) drives the device with 15 vendor requests, see
//! [`IspRequest`]. Every request is a control transfer, there are no
//! other endpoints.
//!
//! This library is the protocol implementation. Access to the GPIO port
//! the target is wired to is provided by the library user through
//! [`IspPort`]; the way bits are shifted is chosen by picking one of the
//! [`SerialEngine`] implementations:
//!
//! * [`BitBang`] toggles the port lines itself and waits with an
//!   [`embedded_hal::delay::DelayNs`] provider.
//! * [`HardwareShift`] hands every byte to a [`ShiftUnit`] and busy-waits
//!   for completion.
//!
//! ### Supported operations
//!
//! * Power up / down, with or without driving reset
//! * Raw 4-byte and 1-byte commands
//! * Flash and EEPROM streamed reads
//! * Flash and EEPROM byte writes with data polling
//! * Port read, write, bit set/clear and direction control
//!
//! ### Limitations
//!
//! * Maximum USB transfer size is limited to what `usb-device` supports
//!   for control endpoint transfers, which is `128` bytes by default.
//!
//! * Byte writes block `usb_dev.poll()` while the target is polled, up to
//!   the timeout the host passes with the write request.
//!
//! * Transfers run inside [`critical_section::with`], the application must
//!   link a `critical-section` implementation.
//!
//! ## Example
//!
//! ```no_run
//! use embedded_hal::delay::DelayNs;
//! use usb_device::bus::{UsbBus, UsbBusAllocator};
//! use usb_device::prelude::*;
//! use usbd_tinyisp::*;
//!
//! // Port wiring: IspPort gives the library register-level access
//! // to the GPIO port connected to the target.
//!
//! struct MyPort {
//!     output: u8,
//!     direction: u8,
//! }
//!
//! impl IspPort for MyPort {
//!     const PINS: PinMap = PinMap::USBTINYISP;
//!
//!     fn input(&mut self) -> u8 {
//!         // TODO: read the port input register
//!         0
//!     }
//!     fn output(&self) -> u8 {
//!         self.output
//!     }
//!     fn set_output(&mut self, value: u8) {
//!         // TODO: write the port output register
//!         self.output = value;
//!     }
//!     fn direction(&self) -> u8 {
//!         self.direction
//!     }
//!     fn set_direction(&mut self, value: u8) {
//!         // TODO: write the port direction register
//!         self.direction = value;
//!     }
//! }
//!
//! fn run<B: UsbBus, D: DelayNs>(usb_bus_alloc: &UsbBusAllocator<B>, delay: D) -> ! {
//!     let port = MyPort { output: 0, direction: 0 };
//!     let mut isp = IspClass::new(usb_bus_alloc, port, BitBang::new(delay));
//!
//!     let mut usb_dev = UsbDeviceBuilder::new(usb_bus_alloc, USBTINY_VID_PID)
//!         .strings(&[StringDescriptors::new(LangID::EN)
//!             .manufacturer("Example")
//!             .product("USBtiny")])
//!         .unwrap()
//!         .build();
//!
//!     // All requests are served from poll().
//!     loop {
//!         usb_dev.poll(&mut [&mut isp]);
//!     }
//! }
//! ```

use usb_device::prelude::UsbVidPid;

/// USB interface module
pub mod class;
pub mod engine;
pub mod port;
pub mod programmer;
pub mod session;

/// Vendor and product ID host tools look for.
pub const USBTINY_VID_PID: UsbVidPid = UsbVidPid(0x1781, 0x0c9f);

#[doc(inline)]
pub use crate::class::IspClass;
#[doc(inline)]
pub use crate::engine::{BitBang, HardwareShift, SerialEngine, ShiftUnit};
#[doc(inline)]
pub use crate::port::{IspPort, PinMap};
#[doc(inline)]
pub use crate::programmer::{DataPhase, IspRequest, Programmer};
#[doc(inline)]
pub use crate::session::Session;
