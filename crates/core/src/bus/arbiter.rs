// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{BusRequest, Target};

/// Fixed-priority arbiter in front of a single shared target.
///
/// Master index 0 has the highest priority. Once granted, a master keeps
/// the target until its transaction acknowledges or it drops the request.
#[derive(Debug)]
pub struct Arbiter<T> {
    target: T,
    owner: Option<usize>,
}

impl<T: Target> Arbiter<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            owner: None,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    pub fn reset(&mut self) {
        self.owner = None;
        self.target.reset();
    }

    /// Withdraws the grant and aborts the target's pending transaction.
    pub fn release(&mut self) {
        self.owner = None;
        self.target.abort();
    }

    /// Clocks the target once. `requests[m]` is what master `m` presents
    /// this cycle. Returns the acknowledged master and its read data.
    pub fn cycle(&mut self, requests: &[Option<BusRequest>]) -> Option<(usize, u32)> {
        let holding = self
            .owner
            .filter(|&m| requests.get(m).is_some_and(Option::is_some));
        let grant = holding.or_else(|| requests.iter().position(Option::is_some));
        self.owner = grant;

        let request = grant.and_then(|m| requests[m].as_ref());
        let ack = self.target.cycle(request);
        match (grant, ack) {
            (Some(master), Some(data)) => {
                self.owner = None;
                Some((master, data))
            }
            _ => None,
        }
    }
}
