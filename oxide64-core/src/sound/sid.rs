// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![cfg_attr(feature = "cargo-clippy", allow(clippy::cast_lossless))]

use std::rc::Rc;
use std::sync::Arc;

use log::LogLevel;
use resid;

use crate::factory::{Chip, SidModel, SoundOutput};
use crate::util::Clock;

// Design:
//   The engine owns only the SID register face and cycle accounting; sample
//   synthesis is delegated to the resid DSP. The chip is normally clocked
//   in one batch at the end of a frame, but a register access between frame
//   boundaries forces a sync so reads and writes land on the right cycle.

#[derive(Clone, Copy, PartialEq)]
pub enum SamplingMethod {
    Fast,
    Interpolate,
    Resample,
    ResampleFast,
}

pub struct Sid {
    // Dependencies
    system_clock: Rc<Clock>,
    sound_buffer: Arc<dyn SoundOutput>,
    // Functional Units
    resid: resid::Sid,
    // Runtime State
    buffer: [i16; 8192],
    cycles: u64,
}

impl Sid {
    pub fn new(
        chip_model: SidModel,
        system_clock: Rc<Clock>,
        sound_buffer: Arc<dyn SoundOutput>,
    ) -> Self {
        info!(target: "sound", "Initializing SID");
        let resid_model = match chip_model {
            SidModel::Mos6581 => resid::ChipModel::Mos6581,
            SidModel::Mos8580 => resid::ChipModel::Mos8580,
        };
        Sid {
            system_clock,
            sound_buffer,
            resid: resid::Sid::new(resid_model),
            buffer: [0i16; 8192],
            cycles: 0,
        }
    }

    pub fn enable_filter(&mut self, enabled: bool) {
        self.resid.enable_filter(enabled);
    }

    pub fn set_sampling_parameters(
        &mut self,
        sampling_method: SamplingMethod,
        clock_freq: u32,
        sample_freq: u32,
    ) {
        let resid_sampling_method = match sampling_method {
            SamplingMethod::Fast => resid::SamplingMethod::Fast,
            SamplingMethod::Interpolate => resid::SamplingMethod::Interpolate,
            SamplingMethod::Resample => resid::SamplingMethod::Resample,
            SamplingMethod::ResampleFast => resid::SamplingMethod::ResampleFast,
        };
        self.resid
            .set_sampling_parameters(resid_sampling_method, clock_freq, sample_freq);
    }

    fn sync(&mut self) {
        if self.cycles != self.system_clock.get() {
            let delta = (self.system_clock.get() - self.cycles) as u32;
            self.clock_delta(delta);
        }
    }
}

impl Chip for Sid {
    fn clock(&mut self) {
        self.resid.clock();
        self.cycles = self.cycles.wrapping_add(1);
    }

    fn clock_delta(&mut self, delta: u32) {
        if delta > 0 {
            let mut delta = delta;
            while delta > 0 {
                let (samples, next_delta) = self.resid.sample(delta, &mut self.buffer[..], 1);
                self.sound_buffer.write(&self.buffer[0..samples]);
                delta = next_delta;
            }
        }
        self.cycles = self.cycles.wrapping_add(u64::from(delta));
    }

    fn process_vsync(&mut self) {
        self.sync();
    }

    fn reset(&mut self) {
        self.resid.reset();
        self.cycles = self.system_clock.get();
    }

    // I/O

    fn read(&mut self, reg: u8) -> u8 {
        self.sync();
        self.resid.read(reg)
    }

    fn write(&mut self, reg: u8, value: u8) {
        if log_enabled!(LogLevel::Trace) {
            trace!(target: "sid::reg", "Write 0x{:02x} = 0x{:02x}", reg, value);
        }
        self.sync();
        self.resid.write(reg, value)
    }
}
