//! Host bridge: the fixed set of simulator entry points generated code may call.
//!
//! Compiled programs reach the host through four `extern "C"` trampolines.
//! [`HostFn`] is the registration table the JIT driver binds them from; the
//! trampolines forward to whichever [`Simulator`] is attached to the current
//! thread's [`Session`].

use std::cell::RefCell;

use crate::abi::Fault;
use crate::{Error, Result};

/// Display backend a program draws to.
///
/// Only receives plain values; it never sees the program's registers or stack.
pub trait Simulator {
    /// Called once before the first instruction runs.
    fn init(&mut self) {}

    fn put_pixel(&mut self, x: i32, y: i32, argb: i32);

    fn rand(&mut self) -> i32;

    /// Present the current frame. May block until the frame is shown.
    fn flush(&mut self);

    /// Called once after the program finished or aborted.
    fn exit(&mut self) {}
}

/// Counters gathered while a program runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub pixels: u64,
    pub rand_calls: u64,
    pub flushes: u64,
}

/// Entry point generated code can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFn {
    /// `void sim_put_pixel(i32 x, i32 y, i32 argb)`
    PutPixel,
    /// `i32 sim_rand()`
    Rand,
    /// `void sim_flush()`
    Flush,
    /// `void sim_abort(i32 fault)`
    Abort,
}

impl HostFn {
    pub const ALL: [Self; 4] = [Self::PutPixel, Self::Rand, Self::Flush, Self::Abort];

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::PutPixel => "sim_put_pixel",
            Self::Rand => "sim_rand",
            Self::Flush => "sim_flush",
            Self::Abort => "sim_abort",
        }
    }

    #[must_use]
    pub fn from_symbol(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.symbol() == name)
    }

    /// Address of the trampoline implementing this entry point.
    #[must_use]
    pub fn address(self) -> usize {
        match self {
            Self::PutPixel => sim_put_pixel as *const () as usize,
            Self::Rand => sim_rand as *const () as usize,
            Self::Flush => sim_flush as *const () as usize,
            Self::Abort => sim_abort as *const () as usize,
        }
    }
}

struct Active {
    simulator: Box<dyn Simulator>,
    stats: HostStats,
    fault: Option<Fault>,
}

thread_local! {
    static ACTIVE: RefCell<Option<Active>> = const { RefCell::new(None) };
}

fn with_active<R>(f: impl FnOnce(&mut Active) -> R) -> Option<R> {
    ACTIVE.with_borrow_mut(|slot| slot.as_mut().map(f))
}

/// Attaches a simulator to the current thread for the duration of one run.
///
/// Dropping the session detaches the simulator without calling
/// [`Simulator::exit`]; use [`Session::finish`] for the normal path.
pub struct Session {
    _private: (),
}

impl Session {
    pub fn begin(simulator: Box<dyn Simulator>) -> Result<Self> {
        ACTIVE.with_borrow_mut(|slot| {
            if slot.is_some() {
                return Err(Error::Internal(
                    "a simulator is already attached to this thread".into(),
                ));
            }
            *slot = Some(Active {
                simulator,
                stats: HostStats::default(),
                fault: None,
            });
            Ok(())
        })?;
        Ok(Self { _private: () })
    }

    /// Call [`Simulator::init`] on the attached simulator.
    pub fn init(&self) {
        with_active(|active| active.simulator.init());
    }

    /// First fault reported so far, if any.
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        with_active(|active| active.fault).flatten()
    }

    /// Call [`Simulator::exit`], detach the simulator and return the stats and
    /// the first fault reported through `sim_abort`.
    pub fn finish(self) -> (HostStats, Option<Fault>) {
        let active = ACTIVE.with_borrow_mut(Option::take);
        match active {
            Some(mut active) => {
                active.simulator.exit();
                (active.stats, active.fault)
            }
            None => (HostStats::default(), None),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        ACTIVE.with_borrow_mut(|slot| *slot = None);
    }
}

extern "C" fn sim_put_pixel(x: i32, y: i32, argb: i32) {
    with_active(|active| {
        active.stats.pixels += 1;
        active.simulator.put_pixel(x, y, argb);
    });
}

extern "C" fn sim_rand() -> i32 {
    with_active(|active| {
        active.stats.rand_calls += 1;
        active.simulator.rand()
    })
    .unwrap_or(0)
}

extern "C" fn sim_flush() {
    with_active(|active| {
        active.stats.flushes += 1;
        active.simulator.flush();
    });
}

extern "C" fn sim_abort(code: u32) {
    let fault = Fault::from_code(code);
    tracing::debug!(code, "program aborted");
    with_active(|active| {
        if active.fault.is_none() {
            active.fault = fault;
        }
    });
}
