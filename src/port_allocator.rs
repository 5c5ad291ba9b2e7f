//! Forward-scanning port allocator over a half-open range, guarded by a single mutex.
//!
//! Grounded on the accept-loop port management the teacher's `TcpSocketTransport`
//! leaves to the caller ([`crate::link::direct`]): the core needs to hand out ports
//! to multiple `DirectLink`s without the caller ever seeing a bind collision.

use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortAllocatorError {
    #[error("no free port in range [{min}, {max})")]
    Exhausted { min: u16, max: u16 },
    #[error("range end {end} must be greater than range start {start}")]
    InvalidRange { start: u16, end: u16 },
}

struct State {
    min: u16,
    max: u16,
    in_use: HashSet<u16>,
    cursor: u16,
}

/// Half-open range `[min, max)` of candidate ports with forward-scanning wraparound.
pub struct PortAllocator {
    state: Mutex<State>,
}

impl PortAllocator {
    pub fn new(min: u16, max: u16) -> Result<Self, PortAllocatorError> {
        if max <= min {
            return Err(PortAllocatorError::InvalidRange { start: min, end: max });
        }
        Ok(Self {
            state: Mutex::new(State {
                min,
                max,
                in_use: HashSet::new(),
                cursor: min,
            }),
        })
    }

    pub fn acquire(&self) -> Result<u16, PortAllocatorError> {
        let mut state = self.state.lock().expect("port allocator mutex poisoned");
        let span = state.max - state.min;
        for offset in 0..span {
            let candidate = state.min + ((state.cursor - state.min + offset) % span);
            if !state.in_use.contains(&candidate) {
                state.in_use.insert(candidate);
                state.cursor = if candidate + 1 < state.max {
                    candidate + 1
                } else {
                    state.min
                };
                return Ok(candidate);
            }
        }
        Err(PortAllocatorError::Exhausted {
            min: state.min,
            max: state.max,
        })
    }

    pub fn mark(&self, port: u16) {
        let mut state = self.state.lock().expect("port allocator mutex poisoned");
        state.in_use.insert(port);
    }

    pub fn release(&self, port: u16) {
        let mut state = self.state.lock().expect("port allocator mutex poisoned");
        state.in_use.remove(&port);
    }

    pub fn set_range_start(&self, start: u16) -> Result<(), PortAllocatorError> {
        let mut state = self.state.lock().expect("port allocator mutex poisoned");
        if state.max <= start {
            return Err(PortAllocatorError::InvalidRange { start, end: state.max });
        }
        state.min = start;
        if state.cursor < start {
            state.cursor = start;
        }
        Ok(())
    }

    pub fn set_range_end(&self, end: u16) -> Result<(), PortAllocatorError> {
        let mut state = self.state.lock().expect("port allocator mutex poisoned");
        if end <= state.min {
            return Err(PortAllocatorError::InvalidRange { start: state.min, end });
        }
        state.max = end;
        Ok(())
    }
}
