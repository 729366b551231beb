// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::factory::Tape;
use crate::util::{IoPort, Pin, Shared};

// Design:
//   TAP playback is a pulse scheduler: when a pulse of n cycles starts, a
//   rising edge on the CIA 1 FLAG pin is scheduled after n/2 cycles and a
//   falling edge after n cycles, at which point the head advances to the
//   next pulse. The motor line (processor port bit 5, active low) and the
//   play key both gate playback; the cassette sense switch is processor
//   port bit 4.

const SENSE_BIT: usize = 4;
const MOTOR_BIT: usize = 5;

pub struct Datassette {
    // Dependencies
    cia_flag_pin: Shared<Pin>,
    cpu_io_port: Shared<IoPort>,
    // Runtime State
    tape: Option<Box<dyn Tape>>,
    play_key: bool,
    next_rising_edge: u64,
    next_falling_edge: u64,
    head_position: usize,
    head_cycles: u64,
    duration_cycles: u64,
}

impl Datassette {
    pub fn new(cia_flag_pin: Shared<Pin>, cpu_io_port: Shared<IoPort>) -> Self {
        Self {
            cia_flag_pin,
            cpu_io_port,
            tape: None,
            play_key: false,
            next_rising_edge: 0,
            next_falling_edge: 0,
            head_position: 0,
            head_cycles: 0,
            duration_cycles: 0,
        }
    }

    pub fn attach(&mut self, mut tape: Box<dyn Tape>) {
        // Silent fast forward to compute the total tape duration.
        let mut duration = 0u64;
        while let Some(pulse) = tape.read_pulse() {
            duration += u64::from(pulse);
        }
        tape.seek(0);
        info!(target: "device", "Inserted tape, {} cycles", duration);
        self.tape = Some(tape);
        self.duration_cycles = duration;
        self.rewind();
    }

    pub fn detach(&mut self) {
        self.stop();
        self.tape = None;
        self.duration_cycles = 0;
        self.rewind();
    }

    pub fn has_tape(&self) -> bool {
        self.tape.is_some()
    }

    pub fn is_playing(&self) -> bool {
        // motor control is active low
        self.play_key && self.cpu_io_port.borrow().get_value() & (1 << MOTOR_BIT) == 0
    }

    /// Tape counter position in emulated seconds (at PAL clock).
    pub fn counter(&self) -> u64 {
        self.head_cycles / 985_248
    }

    pub fn duration(&self) -> u64 {
        self.duration_cycles / 985_248
    }

    #[inline(always)]
    pub fn clock(&mut self) {
        if !self.play_key || self.tape.is_none() {
            return;
        }
        if self.cpu_io_port.borrow().get_value() & (1 << MOTOR_BIT) != 0 {
            return;
        }
        self.head_cycles += 1;
        if self.next_rising_edge > 0 {
            self.next_rising_edge -= 1;
            if self.next_rising_edge == 0 {
                self.cia_flag_pin.borrow_mut().set_active(true);
            }
        }
        if self.next_falling_edge > 0 {
            self.next_falling_edge -= 1;
            if self.next_falling_edge == 0 {
                self.cia_flag_pin.borrow_mut().set_active(false);
                self.schedule_pulse();
            }
        }
    }

    pub fn play(&mut self) {
        if self.tape.is_some() && !self.play_key {
            info!(target: "device", "Starting datassette");
            self.play_key = true;
            self.cpu_io_port.borrow_mut().set_input_bit(SENSE_BIT, false);
            self.schedule_pulse();
        }
    }

    pub fn stop(&mut self) {
        info!(target: "device", "Stopping datassette");
        self.play_key = false;
        self.cpu_io_port.borrow_mut().set_input_bit(SENSE_BIT, true);
    }

    pub fn reset(&mut self) {
        self.play_key = false;
        self.cpu_io_port.borrow_mut().set_input_bit(SENSE_BIT, true);
        self.rewind();
    }

    fn rewind(&mut self) {
        self.head_position = 0;
        self.head_cycles = 0;
        self.next_rising_edge = 0;
        self.next_falling_edge = 0;
        if let Some(ref mut tape) = self.tape {
            tape.seek(0);
        }
    }

    fn schedule_pulse(&mut self) {
        let pulse = match self.tape {
            Some(ref mut tape) => tape.read_pulse(),
            None => None,
        };
        match pulse {
            Some(length) => {
                self.next_rising_edge = u64::from(length / 2);
                self.next_falling_edge = u64::from(length);
                self.head_position += 1;
            }
            None => {
                // end of tape
                self.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    struct PulseTape {
        pulses: Vec<u32>,
        pos: usize,
    }

    impl Tape for PulseTape {
        fn read_pulse(&mut self) -> Option<u32> {
            if self.pos < self.pulses.len() {
                let pulse = self.pulses[self.pos];
                self.pos += 1;
                Some(pulse)
            } else {
                None
            }
        }

        fn seek(&mut self, pos: usize) -> bool {
            self.pos = pos;
            true
        }
    }

    fn setup_datassette() -> Datassette {
        let flag_pin = new_shared(Pin::new_low());
        let port = new_shared(IoPort::new(0x2f, 0x1f));
        let mut datassette = Datassette::new(flag_pin, port);
        datassette.attach(Box::new(PulseTape {
            pulses: vec![8, 16],
            pos: 0,
        }));
        datassette
    }

    #[test]
    fn pulse_produces_rising_and_falling_edge() {
        let datassette = &mut setup_datassette();
        // motor on
        datassette.cpu_io_port.borrow_mut().set_value(0x00);
        datassette.play();
        for _ in 0..3 {
            datassette.clock();
        }
        assert_eq!(false, datassette.cia_flag_pin.borrow().is_high());
        datassette.clock();
        assert_eq!(true, datassette.cia_flag_pin.borrow().is_high());
        for _ in 0..4 {
            datassette.clock();
        }
        assert_eq!(true, datassette.cia_flag_pin.borrow().is_falling());
    }

    #[test]
    fn stops_at_end_of_tape() {
        let datassette = &mut setup_datassette();
        datassette.cpu_io_port.borrow_mut().set_value(0x00);
        datassette.play();
        for _ in 0..32 {
            datassette.clock();
        }
        assert_eq!(false, datassette.play_key);
    }

    #[test]
    fn sense_switch_follows_play_key() {
        let datassette = &mut setup_datassette();
        assert_eq!(
            true,
            datassette.cpu_io_port.borrow().get_value() & (1 << SENSE_BIT) != 0
        );
        datassette.play();
        assert_eq!(
            false,
            datassette.cpu_io_port.borrow().get_value() & (1 << SENSE_BIT) != 0
        );
    }
}
