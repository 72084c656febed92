//! Headless display: an in-memory ARGB frame buffer standing in for a window.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simasm::Simulator;
use simasm::abi::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// What the program drew, kept after the simulator itself has been consumed.
#[derive(Debug)]
pub struct FrameBuffer {
    pixels: Vec<u32>,
    /// Writes outside the display, dropped.
    pub offscreen: u64,
    /// Completed `flush` calls.
    pub frames: u64,
}

impl FrameBuffer {
    fn new() -> Self {
        Self {
            pixels: vec![0; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
            offscreen: 0,
            frames: 0,
        }
    }

    fn index(x: i32, y: i32) -> Option<usize> {
        if (0..DISPLAY_WIDTH).contains(&x) && (0..DISPLAY_HEIGHT).contains(&y) {
            Some((y * DISPLAY_WIDTH + x) as usize)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        Self::index(x, y).map(|i| self.pixels[i])
    }

    /// Pixels that are not fully transparent black.
    #[must_use]
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != 0).count()
    }
}

pub struct Headless {
    display: Rc<RefCell<FrameBuffer>>,
    rng: StdRng,
}

impl Headless {
    pub fn new(seed: u64) -> Self {
        Self {
            display: Rc::new(RefCell::new(FrameBuffer::new())),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shared handle to the frame buffer.
    pub fn display(&self) -> Rc<RefCell<FrameBuffer>> {
        Rc::clone(&self.display)
    }
}

impl Simulator for Headless {
    fn init(&mut self) {
        let mut display = self.display.borrow_mut();
        display.pixels.fill(0);
        display.offscreen = 0;
        display.frames = 0;
    }

    fn put_pixel(&mut self, x: i32, y: i32, argb: i32) {
        let mut display = self.display.borrow_mut();
        match FrameBuffer::index(x, y) {
            Some(i) => display.pixels[i] = argb as u32,
            None => {
                if display.offscreen == 0 {
                    tracing::warn!(x, y, "pixel outside the display ignored");
                }
                display.offscreen += 1;
            }
        }
    }

    fn rand(&mut self) -> i32 {
        self.rng.gen_range(0..=i32::MAX)
    }

    fn flush(&mut self) {
        let mut display = self.display.borrow_mut();
        display.frames += 1;
        let frame = display.frames;
        tracing::trace!(frame, "flush");
    }
}
