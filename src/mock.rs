//! Recording fakes for the hardware traits, shared by the unit tests.
//!
//! Every fake logs into one `Wire`, so tests can assert the exact order of
//! clock changes, chip-select edges, transfers and delays.

use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, ErrorKind, SpiBus};
use fugit::HertzU32;

use crate::bus::SpiFrequency;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Clock programmed, in Hz
    Frequency(u32),
    /// Pin driven; `true` is high
    Pin(&'static str, bool),
    Write(Vec<u8>),
    Read(usize),
    /// Blocking delay, in ns
    Delay(u64),
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    rx: VecDeque<u8>,
    fail_spi: bool,
    fail_frequency: bool,
}

#[derive(Clone, Default)]
pub struct Wire(Rc<RefCell<State>>);

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().events.clear();
    }

    /// Queues bytes to be clocked in by subsequent reads
    pub fn push_rx(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn fail_spi(&self, fail: bool) {
        self.0.borrow_mut().fail_spi = fail;
    }

    pub fn fail_frequency(&self, fail: bool) {
        self.0.borrow_mut().fail_frequency = fail;
    }

    pub fn frequencies(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Frequency(hz) => Some(hz),
                _ => None,
            })
            .collect()
    }

    /// All written bytes, concatenated in order
    pub fn written(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Register writes decoded from the display framing, as `(addr, value)`
    pub fn registers(&self) -> Vec<(u8, u8)> {
        let bytes = self.written();
        let mut out = Vec::new();
        let mut i = 0;
        while i + 3 < bytes.len() {
            if bytes[i] == 0x70 && bytes[i + 2] == 0x72 {
                out.push((bytes[i + 1], bytes[i + 3]));
                i += 4;
            } else {
                i += 1;
            }
        }
        out
    }

    fn log(&self, event: Event) {
        self.0.borrow_mut().events.push(event);
    }
}

pub struct FakeSpi {
    wire: Wire,
}

impl FakeSpi {
    pub fn new(wire: &Wire) -> Self {
        Self { wire: wire.clone() }
    }

    fn check(&self) -> Result<(), ErrorKind> {
        if self.wire.0.borrow().fail_spi {
            Err(ErrorKind::Other)
        } else {
            Ok(())
        }
    }
}

impl spi::ErrorType for FakeSpi {
    type Error = ErrorKind;
}

impl SpiBus<u8> for FakeSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.check()?;
        let mut state = self.wire.0.borrow_mut();
        for word in words.iter_mut() {
            *word = state.rx.pop_front().unwrap_or(0);
        }
        state.events.push(Event::Read(words.len()));
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.check()?;
        self.wire.log(Event::Write(words.to_vec()));
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.write(words)?;
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SpiFrequency for FakeSpi {
    fn set_frequency(&mut self, frequency: HertzU32) -> Result<(), Self::Error> {
        if self.wire.0.borrow().fail_frequency {
            return Err(ErrorKind::Other);
        }
        self.wire.log(Event::Frequency(frequency.to_Hz()));
        Ok(())
    }
}

pub struct FakePin {
    name: &'static str,
    wire: Wire,
}

impl FakePin {
    pub fn new(name: &'static str, wire: &Wire) -> Self {
        Self {
            name,
            wire: wire.clone(),
        }
    }
}

impl digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.wire.log(Event::Pin(self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.wire.log(Event::Pin(self.name, true));
        Ok(())
    }
}

/// Fake clock: delays return immediately and are logged
pub struct FakeDelay {
    wire: Wire,
}

impl FakeDelay {
    pub fn new(wire: &Wire) -> Self {
        Self { wire: wire.clone() }
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wire.log(Event::Delay(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        self.wire.log(Event::Delay(u64::from(us) * 1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wire.log(Event::Delay(u64::from(ms) * 1_000_000));
    }
}
