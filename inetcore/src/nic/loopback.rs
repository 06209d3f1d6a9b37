//! A device recording its transmissions.
//!
//! Used for testing and for links that are driven by polling the queue instead of an interrupt.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Device, Frame};
use crate::layer::{Error, Result};

/// A device that keeps every transmitted frame in a queue.
///
/// The queue is shared with any number of [`Tap`]s.
///
/// [`Tap`]: struct.Tap.html
pub struct Loopback {
    queue: Tap,
    budget: Option<usize>,
}

/// Read side of a `Loopback` device.
#[derive(Clone, Default)]
pub struct Tap {
    frames: Arc<Mutex<VecDeque<Frame>>>,
}

impl Loopback {
    pub fn new() -> Self {
        Loopback {
            queue: Tap::default(),
            budget: None,
        }
    }

    /// Accept only `frames` more frames, then fail with `Exhausted`.
    pub fn with_budget(mut self, frames: usize) -> Self {
        self.budget = Some(frames);
        self
    }

    /// A handle to the transmitted frames.
    pub fn tap(&self) -> Tap {
        self.queue.clone()
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Loopback::new()
    }
}

impl Tap {
    /// Remove the oldest frame.
    pub fn pop(&self) -> Option<Frame> {
        self.lock().pop_front()
    }

    /// Remove all frames.
    pub fn drain(&self) -> Vec<Frame> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Frame>> {
        // Frames are plain data, a poisoned queue is still consistent.
        match self.frames.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Device for Loopback {
    fn transmit(&mut self, frame: Frame) -> Result<()> {
        match self.budget {
            Some(0) => return Err(Error::Exhausted),
            Some(ref mut left) => *left -= 1,
            None => (),
        }
        self.queue.lock().push_back(frame);
        Ok(())
    }
}
