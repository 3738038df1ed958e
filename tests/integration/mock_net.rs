//! Mock adapters for integration tests.
//!
//! [`MockNetwork`] hands out [`MockSocket`]s that replay a scripted
//! server and record every call, so tests can assert on the full
//! socket history without a real TCP stack.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;
use std::time::Duration;

use mfgprov::app::events::AppEvent;
use mfgprov::app::ports::{
    ConfigStore, EventSink, NetError, NetworkPort, SocketPort, StorageError, TimePort,
};
use mfgprov::config::{DeviceConfig, NetworkConfig, bounded};
use mfgprov::identity::{DeviceIdentity, MacAddress};

// ── Socket call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NetCall {
    Resolve(String),
    Open,
    Connect(SocketAddrV4),
    Write(Vec<u8>),
    Flush,
    Read,
    Disconnect,
    Close,
}

/// One scripted answer to `read_timeout`.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Data(Vec<u8>),
    Timeout,
    Eof,
    Fail(NetError),
}

/// What the fake server does.  Reads past the end of the script see EOF.
#[derive(Debug, Default)]
pub struct ServerScript {
    pub connect_results: VecDeque<Result<(), NetError>>,
    pub write_error: Option<NetError>,
    pub reads: VecDeque<ReadStep>,
}

// ── MockNetwork ───────────────────────────────────────────────

pub struct MockNetwork {
    pub link: bool,
    pub resolve_result: Result<Ipv4Addr, NetError>,
    pub open_error: Option<NetError>,
    pub script: Rc<RefCell<ServerScript>>,
    pub calls: Rc<RefCell<Vec<NetCall>>>,
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn new() -> Self {
        Self {
            link: true,
            resolve_result: Ok(Ipv4Addr::new(10, 0, 0, 7)),
            open_error: None,
            script: Rc::new(RefCell::new(ServerScript::default())),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A network whose server answers with `response` in one read.
    pub fn serving(response: &[u8]) -> Self {
        let net = Self::new();
        net.push_read(ReadStep::Data(response.to_vec()));
        net
    }

    pub fn push_read(&self, step: ReadStep) {
        self.script.borrow_mut().reads.push_back(step);
    }

    pub fn push_connect(&self, result: Result<(), NetError>) {
        self.script.borrow_mut().connect_results.push_back(result);
    }

    pub fn calls(&self) -> Vec<NetCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&NetCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(*c)).count()
    }

    /// Everything the client wrote, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                NetCall::Write(data) => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkPort for MockNetwork {
    type Socket = MockSocket;

    fn link_up(&self) -> bool {
        self.link
    }

    fn resolve(&mut self, host: &str) -> Result<Ipv4Addr, NetError> {
        self.calls.borrow_mut().push(NetCall::Resolve(host.to_string()));
        self.resolve_result
    }

    fn open_socket(&mut self) -> Result<MockSocket, NetError> {
        self.calls.borrow_mut().push(NetCall::Open);
        if let Some(e) = self.open_error {
            return Err(e);
        }
        Ok(MockSocket {
            script: Rc::clone(&self.script),
            calls: Rc::clone(&self.calls),
        })
    }
}

// ── MockSocket ────────────────────────────────────────────────

pub struct MockSocket {
    script: Rc<RefCell<ServerScript>>,
    calls: Rc<RefCell<Vec<NetCall>>>,
}

impl SocketPort for MockSocket {
    fn connect(&mut self, addr: SocketAddrV4, _timeout: Duration) -> Result<(), NetError> {
        self.calls.borrow_mut().push(NetCall::Connect(addr));
        self.script
            .borrow_mut()
            .connect_results
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, NetError> {
        if let Some(e) = self.script.borrow().write_error {
            return Err(e);
        }
        self.calls.borrow_mut().push(NetCall::Write(data.to_vec()));
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), NetError> {
        self.calls.borrow_mut().push(NetCall::Flush);
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, NetError> {
        self.calls.borrow_mut().push(NetCall::Read);
        let mut script = self.script.borrow_mut();
        match script.reads.pop_front() {
            Some(ReadStep::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    script.reads.push_front(ReadStep::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(ReadStep::Timeout) => Err(NetError::Timeout),
            Some(ReadStep::Fail(e)) => Err(e),
            Some(ReadStep::Eof) | None => Ok(0),
        }
    }

    fn disconnect(&mut self) {
        self.calls.borrow_mut().push(NetCall::Disconnect);
    }

    fn close(&mut self) {
        self.calls.borrow_mut().push(NetCall::Close);
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// Which store operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    SetMac,
    SetCredentials,
    Commit,
}

pub struct MockStore {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub staged_mac: Option<MacAddress>,
    pub staged_credentials: Option<(String, String)>,
    pub ops: Vec<StoreOp>,
    pub fail_on: Option<StoreOp>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        let mut identity = DeviceIdentity::new([0x0011_2233, 0x4455_6677, 0x8899_AABB], 0x1A2B);
        identity.product_name = bounded("test-board");
        Self {
            device: DeviceConfig {
                identity,
                ..Default::default()
            },
            network: NetworkConfig::default(),
            staged_mac: None,
            staged_credentials: None,
            ops: Vec::new(),
            fail_on: None,
        }
    }

    pub fn failing(op: StoreOp) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::new()
        }
    }

    /// True when no setter or commit was ever called.
    pub fn untouched(&self) -> bool {
        self.ops.is_empty()
    }

    fn record(&mut self, op: StoreOp) -> Result<(), StorageError> {
        self.ops.push(op);
        if self.fail_on == Some(op) {
            Err(StorageError::IoError)
        } else {
            Ok(())
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MockStore {
    fn identity(&self) -> DeviceIdentity {
        self.device.identity.clone()
    }

    fn device_config(&self) -> DeviceConfig {
        self.device.clone()
    }

    fn network_config(&self) -> NetworkConfig {
        self.network
    }

    fn set_mac(&mut self, mac: MacAddress) -> Result<(), StorageError> {
        self.record(StoreOp::SetMac)?;
        self.staged_mac = Some(mac);
        Ok(())
    }

    fn set_credentials(&mut self, serial_number: &str, password: &str) -> Result<(), StorageError> {
        self.record(StoreOp::SetCredentials)?;
        self.staged_credentials = Some((serial_number.to_string(), password.to_string()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.record(StoreOp::Commit)?;
        if let Some(mac) = self.staged_mac.take() {
            self.network.mac = Some(mac);
        }
        if let Some((sn, pw)) = self.staged_credentials.take() {
            self.device.serial_number = bounded(&sn);
            self.device.password = bounded(&pw);
        }
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Clock that advances a fixed step on every query.
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }
}

impl TimePort for StepClock {
    fn uptime_ms(&self) -> u64 {
        let now = self.now.get() + self.step;
        self.now.set(now);
        now
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct VecSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Response builders ─────────────────────────────────────────

/// A `200 OK` response carrying `body` with a matching `Content-Length`.
pub fn ok_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub const EXAMPLE_BODY: &str = r#"{"mac":"aa:bb:cc:dd:ee:ff","sn":"SN123","pw":"secret"}"#;
