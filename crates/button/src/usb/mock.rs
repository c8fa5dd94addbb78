//! Scripted USB backend for tests

use crate::usb::backend::{EndpointLayout, InterfaceLayout, UsbBackend};
use protocol::{POLL_COMMAND, POLL_REQUEST, POLL_REQUEST_TYPE};
use rusb::{Direction, TransferType};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// State-changing calls that succeeded, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    DetachKernelDriver(u8),
    AttachKernelDriver(u8),
    ClaimInterface(u8),
    ReleaseInterface(u8),
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    control_transfers: usize,
    reads: usize,
    control_results: VecDeque<rusb::Result<usize>>,
    read_results: VecDeque<rusb::Result<Vec<u8>>>,
}

/// Shared view of what a [`MockBackend`] was asked to do
#[derive(Clone, Default)]
pub struct MockLog {
    state: Arc<Mutex<MockState>>,
}

impl MockLog {
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn control_transfers(&self) -> usize {
        self.state.lock().unwrap().control_transfers
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

pub struct MockBackend {
    interfaces: Vec<InterfaceLayout>,
    kernel_driver: rusb::Result<bool>,
    claim_result: rusb::Result<()>,
    attach_result: rusb::Result<()>,
    log: MockLog,
}

impl MockBackend {
    /// A well-formed button: one interface with one interrupt IN endpoint
    pub fn button() -> Self {
        Self::with_endpoint(EndpointLayout {
            address: 0x81,
            direction: Direction::In,
            transfer_type: TransferType::Interrupt,
        })
    }

    pub fn with_endpoint(endpoint: EndpointLayout) -> Self {
        Self::with_interfaces(vec![InterfaceLayout {
            number: 0,
            endpoints: vec![endpoint],
        }])
    }

    pub fn with_interfaces(interfaces: Vec<InterfaceLayout>) -> Self {
        Self {
            interfaces,
            kernel_driver: Ok(false),
            claim_result: Ok(()),
            attach_result: Ok(()),
            log: MockLog::default(),
        }
    }

    pub fn with_extra_interface(mut self, endpoints: Vec<EndpointLayout>) -> Self {
        let number = self.interfaces.len() as u8;
        self.interfaces.push(InterfaceLayout { number, endpoints });
        self
    }

    pub fn with_extra_endpoint(mut self, endpoint: EndpointLayout) -> Self {
        self.interfaces[0].endpoints.push(endpoint);
        self
    }

    pub fn with_kernel_driver(self) -> Self {
        self.with_kernel_driver_query(Ok(true))
    }

    pub fn with_kernel_driver_query(mut self, result: rusb::Result<bool>) -> Self {
        self.kernel_driver = result;
        self
    }

    pub fn with_claim_result(mut self, result: rusb::Result<()>) -> Self {
        self.claim_result = result;
        self
    }

    pub fn with_attach_result(mut self, result: rusb::Result<()>) -> Self {
        self.attach_result = result;
        self
    }

    /// Queue the outcome of the next control transfer (default: success)
    pub fn push_control(self, result: rusb::Result<usize>) -> Self {
        self.log
            .state
            .lock()
            .unwrap()
            .control_results
            .push_back(result);
        self
    }

    /// Queue the outcome of the next interrupt read
    pub fn push_read(self, result: rusb::Result<Vec<u8>>) -> Self {
        self.log.state.lock().unwrap().read_results.push_back(result);
        self
    }

    /// Queue `count` read timeouts
    pub fn push_timeouts(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.push_read(Err(rusb::Error::Timeout));
        }
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn record(&self, call: MockCall) {
        self.log.state.lock().unwrap().calls.push(call);
    }
}

impl UsbBackend for MockBackend {
    fn interface_layout(&self) -> rusb::Result<Vec<InterfaceLayout>> {
        Ok(self.interfaces.clone())
    }

    fn kernel_driver_active(&self, _interface: u8) -> rusb::Result<bool> {
        self.kernel_driver
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.kernel_driver = Ok(false);
        self.record(MockCall::DetachKernelDriver(interface));
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.attach_result?;
        self.record(MockCall::AttachKernelDriver(interface));
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.claim_result?;
        self.record(MockCall::ClaimInterface(interface));
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(MockCall::ReleaseInterface(interface));
        Ok(())
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        _value: u16,
        _index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        assert_eq!(request_type, POLL_REQUEST_TYPE);
        assert_eq!(request, POLL_REQUEST);
        assert_eq!(data, POLL_COMMAND);

        let mut state = self.log.state.lock().unwrap();
        state.control_transfers += 1;
        state
            .control_results
            .pop_front()
            .unwrap_or(Ok(data.len()))
    }

    fn read_interrupt(
        &self,
        _endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = self.log.state.lock().unwrap();
        state.reads += 1;

        // An exhausted script reads as a timeout, like an idle flaky device
        let report = state
            .read_results
            .pop_front()
            .unwrap_or(Err(rusb::Error::Timeout))?;

        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }
}
