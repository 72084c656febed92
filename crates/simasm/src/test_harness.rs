//! Test harness for simasm unit and integration tests
//!
//! Provides a recording [`Simulator`] and helpers that run program text
//! through the interpreter or the JIT and collect every host call.
//!
//! # Example
//!
//! ```rust
//! use simasm::test_harness::*;
//!
//! let run = run_interp("MOV R0 2\nCALL SIM_PUT_PIXEL R0 R0 R0\nCALL SIM_FLUSH\n");
//! run.result.unwrap();
//! assert_eq!(pixels(&run.events), [(2, 2, 2)]);
//! assert_eq!(flushes(&run.events), 1);
//! ```

#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::manual_assert
)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::host::{HostStats, Simulator};
use crate::{CompileOptions, Interpreter, Result, parse_source};

/// One host call observed by a [`RecordingSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Init,
    PutPixel { x: i32, y: i32, argb: i32 },
    Rand(i32),
    Flush,
    Exit,
}

/// Simulator that records every call into a shared trace.
///
/// Clones share the trace and the rand queue, so one handle can be boxed for
/// the JIT while another is kept to inspect the result.
#[derive(Debug, Clone, Default)]
pub struct RecordingSimulator {
    events: Rc<RefCell<Vec<HostEvent>>>,
    rand_values: Rc<RefCell<VecDeque<i32>>>,
}

impl RecordingSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `rand` calls with `values` in order, then with 0.
    pub fn with_rand(values: impl IntoIterator<Item = i32>) -> Self {
        let sim = Self::new();
        sim.rand_values.borrow_mut().extend(values);
        sim
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }
}

impl Simulator for RecordingSimulator {
    fn init(&mut self) {
        self.events.borrow_mut().push(HostEvent::Init);
    }

    fn put_pixel(&mut self, x: i32, y: i32, argb: i32) {
        self.events
            .borrow_mut()
            .push(HostEvent::PutPixel { x, y, argb });
    }

    fn rand(&mut self) -> i32 {
        let value = self.rand_values.borrow_mut().pop_front().unwrap_or(0);
        self.events.borrow_mut().push(HostEvent::Rand(value));
        value
    }

    fn flush(&mut self) {
        self.events.borrow_mut().push(HostEvent::Flush);
    }

    fn exit(&mut self) {
        self.events.borrow_mut().push(HostEvent::Exit);
    }
}

/// Result of running a program plus everything the simulator saw.
#[derive(Debug)]
pub struct Run {
    pub result: Result<HostStats>,
    pub events: Vec<HostEvent>,
}

/// Parse and interpret `source` with default options.
pub fn run_interp(source: &str) -> Run {
    run_interp_with(source, &CompileOptions::default(), RecordingSimulator::new())
}

pub fn run_interp_with(source: &str, options: &CompileOptions, sim: RecordingSimulator) -> Run {
    let mut runner = sim.clone();
    let result = parse_source(source).and_then(|program| {
        let mut interp = Interpreter::new(&program, options)?;
        interp.run(&mut runner)
    });
    Run {
        result,
        events: sim.events(),
    }
}

/// Parse, compile and run `source` through the JIT with default options.
#[cfg(feature = "jit")]
pub fn run_jit(source: &str) -> Run {
    run_jit_with(source, &CompileOptions::default(), RecordingSimulator::new())
}

#[cfg(feature = "jit")]
pub fn run_jit_with(source: &str, options: &CompileOptions, sim: RecordingSimulator) -> Run {
    let result = crate::jit::run_source(source, options, Box::new(sim.clone()));
    Run {
        result,
        events: sim.events(),
    }
}

/// Run `source` through both backends and assert they agree on the outcome
/// and on every host call. Returns the JIT run.
#[cfg(feature = "jit")]
pub fn assert_backends_agree(source: &str, rand_values: &[i32]) -> Run {
    let options = CompileOptions::default();
    let jit = run_jit_with(
        source,
        &options,
        RecordingSimulator::with_rand(rand_values.iter().copied()),
    );
    let interp = run_interp_with(
        source,
        &options,
        RecordingSimulator::with_rand(rand_values.iter().copied()),
    );

    let outcome = |run: &Run| run.result.as_ref().copied().map_err(ToString::to_string);
    assert_eq!(
        outcome(&jit),
        outcome(&interp),
        "backends disagree on outcome for:\n{source}"
    );
    assert_eq!(
        jit.events, interp.events,
        "backends disagree on host calls for:\n{source}"
    );
    jit
}

/// `(x, y, argb)` of every pixel write, in order.
pub fn pixels(events: &[HostEvent]) -> Vec<(i32, i32, i32)> {
    events
        .iter()
        .filter_map(|event| match *event {
            HostEvent::PutPixel { x, y, argb } => Some((x, y, argb)),
            _ => None,
        })
        .collect()
}

pub fn flushes(events: &[HostEvent]) -> usize {
    events
        .iter()
        .filter(|event| **event == HostEvent::Flush)
        .count()
}
