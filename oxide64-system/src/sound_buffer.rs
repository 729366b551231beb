// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::sync::Mutex;

use oxide64_core::factory::SoundOutput;
use oxide64_core::util::CircularBuffer;

/// Single producer, single consumer sample ring between the emulator
/// thread and the host audio callback. Overruns drop the oldest samples,
/// underruns duplicate silence; both are logged.
pub struct SoundBuffer {
    buffer: Mutex<CircularBuffer>,
}

impl SoundBuffer {
    pub fn new(length: usize) -> Self {
        SoundBuffer {
            buffer: Mutex::new(CircularBuffer::new(length)),
        }
    }

    /// Host audio callback side: fills `out` from the ring.
    pub fn copy(&self, out: &mut [i16], volume_scaler: i32, scaler_shift: usize) {
        let mut input = self.buffer.lock().unwrap();
        if input.len() < out.len() {
            debug!(target: "sound", "audio callback underflow {}/{}", out.len(), input.len());
        }
        for x in out.iter_mut() {
            *x = ((i32::from(input.pop()) * volume_scaler) >> scaler_shift) as i16;
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().unwrap().is_empty()
    }
}

impl SoundOutput for SoundBuffer {
    fn reset(&self) {
        let mut output = self.buffer.lock().unwrap();
        output.reset();
    }

    fn write(&self, samples: &[i16]) {
        let mut output = self.buffer.lock().unwrap();
        let mut overrun = false;
        for sample in samples {
            overrun |= !output.push(*sample);
        }
        if overrun {
            debug!(target: "sound", "sound buffer overflow, dropped oldest samples");
        }
    }
}
