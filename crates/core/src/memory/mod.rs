// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod spi_flash;

pub use spi_flash::{FlashDevice, SpiRom, SpiState};

use crate::bus::decoder::{RAM_BASE, RAM_WINDOW, ROM_BASE, ROM_WINDOW};
use crate::bus::{merge_write, BusRequest, Target, WaitState};
use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

/// Words to preload into boot storage and RAM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootImage {
    pub rom: Vec<u32>,
    pub ram: Vec<u32>,
    /// Informational; the core always starts at address 0.
    pub entry: u32,
}

impl BootImage {
    pub fn from_rom(rom: Vec<u32>) -> Self {
        Self {
            rom,
            ..Default::default()
        }
    }

    /// Packs little-endian bytes into words, zero-padding the last one.
    pub fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect()
    }

    /// Places a segment into `rom` or `ram` by its absolute address.
    ///
    /// `Ok(false)` if the segment starts outside both windows. A segment
    /// that starts inside a window but runs past its end is rejected.
    pub fn place_segment(&mut self, segment: &Segment) -> SimResult<bool> {
        let (words, base, window) = if segment.start_addr < RAM_BASE {
            (&mut self.rom, ROM_BASE, ROM_WINDOW)
        } else if segment.start_addr - RAM_BASE < RAM_WINDOW {
            (&mut self.ram, RAM_BASE, RAM_WINDOW)
        } else {
            return Ok(false);
        };
        let offset = (segment.start_addr - base) as usize;
        let end = offset + segment.data.len();
        if end > window as usize {
            return Err(SimulationError::ImageTooLarge {
                words: end.div_ceil(4),
                capacity: window as usize / 4,
            });
        }
        let needed = end.div_ceil(4);
        if words.len() < needed {
            words.resize(needed, 0);
        }
        for (i, byte) in segment.data.iter().enumerate() {
            let at = offset + i;
            let shift = (at % 4) * 8;
            let word = &mut words[at / 4];
            *word = (*word & !(0xFF << shift)) | (u32::from(*byte) << shift);
        }
        Ok(true)
    }
}

/// Mask ROM with one wait state. Writes acknowledge and are dropped.
#[derive(Debug, Clone, Default)]
pub struct Rom {
    words: Vec<u32>,
    wait: WaitState,
}

impl Rom {
    pub fn new(words: Vec<u32>) -> Self {
        Self {
            words,
            wait: WaitState::default(),
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl Target for Rom {
    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32> {
        if !self.wait.ready(request) {
            return None;
        }
        let req = request?;
        if req.write {
            debug!("ROM write at {:#x} ignored", req.addr);
            return Some(0);
        }
        let word = self.words.get((req.addr >> 2) as usize).copied().unwrap_or(0);
        Some(word >> (req.byte_offset() * 8))
    }

    fn reset(&mut self) {
        self.wait.clear();
    }

    fn abort(&mut self) {
        self.wait.clear();
    }
}

/// Word-organised RAM with byte lanes and one wait state.
#[derive(Debug, Clone)]
pub struct Ram {
    words: Vec<u32>,
    initial: Vec<u32>,
    wait: WaitState,
}

impl Ram {
    pub fn new(size_words: usize) -> Self {
        Self {
            words: vec![0; size_words],
            initial: Vec::new(),
            wait: WaitState::default(),
        }
    }

    /// RAM preloaded with `image`, which is restored on every reset.
    pub fn with_image(size_words: usize, image: Vec<u32>) -> SimResult<Self> {
        if image.len() > size_words {
            return Err(SimulationError::ImageTooLarge {
                words: image.len(),
                capacity: size_words,
            });
        }
        let mut ram = Self::new(size_words);
        ram.initial = image;
        ram.reload();
        Ok(ram)
    }

    fn reload(&mut self) {
        self.words.fill(0);
        self.words[..self.initial.len()].copy_from_slice(&self.initial);
    }

    pub fn size_words(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Word containing byte `offset`.
    pub fn peek(&self, offset: u32) -> Option<u32> {
        self.words.get((offset >> 2) as usize).copied()
    }

    pub fn poke(&mut self, offset: u32, value: u32) -> bool {
        match self.words.get_mut((offset >> 2) as usize) {
            Some(word) => {
                *word = value;
                true
            }
            None => false,
        }
    }
}

impl Target for Ram {
    fn cycle(&mut self, request: Option<&BusRequest>) -> Option<u32> {
        if !self.wait.ready(request) {
            return None;
        }
        let req = request?;
        let index = (req.addr >> 2) as usize;

        if !req.write {
            let word = self.words.get(index).copied().unwrap_or(0);
            return Some(word >> (req.byte_offset() * 8));
        }

        match self.words.get_mut(index) {
            Some(word) => match merge_write(*word, req) {
                Some(merged) => *word = merged,
                None => warn!(
                    "RAM {:?} write at +{:#x} crosses a word boundary, dropped",
                    req.width, req.addr
                ),
            },
            None => warn!("RAM write at +{:#x} out of range, dropped", req.addr),
        }
        Some(0)
    }

    fn reset(&mut self) {
        self.wait.clear();
        self.reload();
    }

    fn abort(&mut self) {
        self.wait.clear();
    }
}
