use core::cmp::min;
use core::marker::PhantomData;
use usb_device::{class_prelude::*, control::Request};

use crate::engine::SerialEngine;
use crate::port::IspPort;
use crate::programmer::{DataPhase, Programmer};

const USB_CLASS_VENDOR_SPECIFIC: u8 = 0xFF;
const USB_SUBCLASS_NONE: u8 = 0x00;
const USB_PROTOCOL_NONE: u8 = 0x00;

/// USBtiny vendor request interface for usb-device library.
///
/// All requests arrive on the control endpoint as vendor requests to the
/// device. The interface descriptor only announces a vendor-specific
/// interface without endpoints.
pub struct IspClass<B: UsbBus, P: IspPort, E: SerialEngine> {
    if_num: InterfaceNumber,
    _bus: PhantomData<B>,
    isp: Programmer<P, E>,
}

impl<B: UsbBus, P: IspPort, E: SerialEngine> UsbClass<B> for IspClass<B, P, E> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface(
            self.if_num,
            USB_CLASS_VENDOR_SPECIFIC,
            USB_SUBCLASS_NONE,
            USB_PROTOCOL_NONE,
        )?;

        Ok(())
    }

    // Handle control requests to the host.
    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !Self::is_isp_request(&req) {
            return;
        }

        let mut data = setup_packet(&req);

        match self.isp.setup(req.request, req.value, req.index, &mut data) {
            DataPhase::None => {
                xfer.accept_with(&[]).ok();
            }
            DataPhase::Immediate(n) => {
                let len = min(n, req.length as usize);
                xfer.accept_with(&data[..len]).ok();
            }
            DataPhase::Streamed => {
                let isp = &mut self.isp;
                xfer.accept(|buf| {
                    let len = min(buf.len(), req.length as usize);
                    Ok(isp.read_stream(&mut buf[..len]))
                })
                .ok();
            }
        }
    }

    // Handle a control request from the host.
    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !Self::is_isp_request(&req) {
            return;
        }

        let mut data = setup_packet(&req);

        // Replies have no way back on an OUT transfer, only the data stage
        // is of interest here.
        self.isp.setup(req.request, req.value, req.index, &mut data);
        self.isp.write_stream(xfer.data());
        xfer.accept().ok();
    }
}

impl<B: UsbBus, P: IspPort, E: SerialEngine> IspClass<B, P, E> {
    /// Creates a new IspClass with the provided UsbBus, target port
    /// and serial engine.
    pub fn new(alloc: &UsbBusAllocator<B>, port: P, engine: E) -> Self {
        Self {
            if_num: alloc.interface(),
            _bus: PhantomData,
            isp: Programmer::new(port, engine),
        }
    }

    /// Protocol state and the hardware it drives.
    pub fn programmer(&self) -> &Programmer<P, E> {
        &self.isp
    }

    /// Mutable access to the protocol state.
    pub fn programmer_mut(&mut self) -> &mut Programmer<P, E> {
        &mut self.isp
    }

    fn is_isp_request(req: &Request) -> bool {
        req.request_type == control::RequestType::Vendor
            && req.recipient == control::Recipient::Device
    }
}

/// Rebuild the 8 setup bytes, as they were on the wire, from a parsed request.
fn setup_packet(req: &Request) -> [u8; 8] {
    let value = req.value.to_le_bytes();
    let index = req.index.to_le_bytes();
    let length = req.length.to_le_bytes();

    [
        // bmRequestType
        (req.direction as u8) | ((req.request_type as u8) << 5) | (req.recipient as u8),
        // bRequest
        req.request,
        // wValue
        value[0],
        value[1],
        // wIndex
        index[0],
        index[1],
        // wLength
        length[0],
        length[1],
    ]
}
