// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::util::{CycleCounter, Pin, Shared};

// Spec: 6526 COMPLEX INTERFACE ADAPTER (CIA) Datasheet
// Design:
//   The interval timer is built around a shift-register event queue that
//   reproduces the chip's internal pipeline: starting a timer takes effect
//   two cycles later, a counter reload consumes one count slot, and a write
//   to the high latch byte of a stopped timer schedules a delayed load.

// The count and load chains live in separate bit groups so that the last
// stage of each chain shifts out of the mask instead of into the other one.
pub mod delay {
    pub const COUNT0: u16 = 1;
    pub const COUNT1: u16 = 1 << 1;
    pub const COUNT2: u16 = 1 << 2;
    pub const COUNT3: u16 = 1 << 3;
    pub const LOAD0: u16 = 1 << 8;
    pub const LOAD1: u16 = 1 << 9;
    pub const MASK: u16 = 0x030f;
}

#[derive(Copy, Clone, PartialEq)]
pub enum Mode {
    TimerA,
    TimerB,
}

#[derive(Copy, Clone, PartialEq)]
enum Input {
    SystemClock,
    External,
    TimerA,
    TimerAWithCnt,
}

#[derive(Copy, Clone, PartialEq)]
enum Output {
    Pulse,
    Toggle,
}

pub struct Timer {
    // Configuration
    mode: Mode,
    enabled: bool,
    pb_on: bool,
    output: Output,
    one_shot: bool,
    input: Input,
    // Runtime State
    latch: u16,
    counter: u16,
    delay: CycleCounter,
    pb_toggle: bool,
    pb_pulse: bool,
    // I/O
    cnt_pin: Shared<Pin>,
}

impl Timer {
    pub fn new(mode: Mode, cnt_pin: Shared<Pin>) -> Self {
        Self {
            mode,
            enabled: false,
            pb_on: false,
            output: Output::Pulse,
            one_shot: true,
            input: Input::SystemClock,
            latch: 0xffff,
            counter: 0,
            delay: CycleCounter::new(delay::MASK),
            pb_toggle: false,
            pb_pulse: false,
            cnt_pin,
        }
    }

    pub fn get_config(&self) -> u8 {
        let mut config = 0u8;
        if self.enabled {
            config |= 0x01;
        }
        if self.pb_on {
            config |= 0x02;
        }
        if self.output == Output::Toggle {
            config |= 0x04;
        }
        if self.one_shot {
            config |= 0x08;
        }
        match self.mode {
            Mode::TimerA => {
                if self.input == Input::External {
                    config |= 0x20;
                }
            }
            Mode::TimerB => match self.input {
                Input::SystemClock => {}
                Input::External => config |= 0x20,
                Input::TimerA => config |= 0x40,
                Input::TimerAWithCnt => config |= 0x60,
            },
        }
        config
    }

    pub fn get_counter(&self) -> u16 {
        self.counter
    }

    pub fn get_counter_lo(&self) -> u8 {
        (self.counter & 0xff) as u8
    }

    pub fn get_counter_hi(&self) -> u8 {
        (self.counter >> 8) as u8
    }

    pub fn get_latch(&self) -> u16 {
        self.latch
    }

    pub fn get_pb_output(&self) -> bool {
        match self.output {
            Output::Toggle => self.pb_toggle,
            Output::Pulse => self.pb_pulse,
        }
    }

    pub fn is_pb_on(&self) -> bool {
        self.pb_on
    }

    pub fn is_running(&self) -> bool {
        self.enabled
    }

    pub fn set_config(&mut self, value: u8) {
        let was_enabled = self.enabled;
        self.enabled = value & 0x01 != 0;
        self.pb_on = value & 0x02 != 0;
        self.output = if value & 0x04 != 0 {
            Output::Toggle
        } else {
            Output::Pulse
        };
        self.one_shot = value & 0x08 != 0;
        if value & 0x10 != 0 {
            self.delay.feed(delay::LOAD0);
        }
        self.input = match self.mode {
            Mode::TimerA => {
                if value & 0x20 != 0 {
                    Input::External
                } else {
                    Input::SystemClock
                }
            }
            Mode::TimerB => match (value >> 5) & 0x03 {
                0 => Input::SystemClock,
                1 => Input::External,
                2 => Input::TimerA,
                _ => Input::TimerAWithCnt,
            },
        };
        if self.enabled && !was_enabled {
            self.pb_toggle = true;
            if self.input == Input::SystemClock {
                self.delay.feed(delay::COUNT0 | delay::COUNT1);
            }
        }
        self.delay
            .autofeed(delay::COUNT0, self.enabled && self.input == Input::SystemClock);
    }

    pub fn set_latch_lo(&mut self, value: u8) {
        self.latch = (self.latch & 0xff00) | u16::from(value);
    }

    pub fn set_latch_hi(&mut self, value: u8) {
        self.latch = (u16::from(value) << 8) | (self.latch & 0x00ff);
        // Writing the high byte of a stopped timer loads the counter.
        if !self.enabled {
            self.delay.feed(delay::LOAD0);
        }
    }

    /// Feeds the external count source for this cycle. Timer B is chained
    /// to timer A underflows; both timers may count CNT pin edges.
    pub fn feed_source(&mut self, timer_a_output: bool) {
        let event = match self.input {
            Input::SystemClock => false,
            Input::External => self.cnt_pin.borrow().is_rising(),
            Input::TimerA => timer_a_output,
            Input::TimerAWithCnt => timer_a_output && self.cnt_pin.borrow().is_high(),
        };
        if event && self.enabled {
            self.delay.feed(delay::COUNT0 | delay::COUNT1);
        }
    }

    pub fn clock(&mut self) -> bool {
        let mut underflow = false;
        if self.delay.has_cycle(delay::LOAD1) {
            self.counter = self.latch;
            // a reload consumes the count slot of this cycle
            self.delay.remove(delay::COUNT3);
        }
        if self.delay.has_cycle(delay::COUNT3) {
            if self.counter == 0 {
                underflow = true;
            } else {
                self.counter -= 1;
                underflow = self.counter == 0;
            }
            if underflow {
                self.counter = self.latch;
                self.delay.remove(delay::COUNT2);
                if self.one_shot {
                    self.enabled = false;
                    self.delay.autofeed(delay::COUNT0, false);
                    self.delay.remove(delay::COUNT1 | delay::COUNT2);
                }
                if self.output == Output::Toggle {
                    self.pb_toggle = !self.pb_toggle;
                }
            }
        }
        self.pb_pulse = underflow;
        self.delay.clock();
        underflow
    }

    pub fn reset(&mut self) {
        self.enabled = false;
        self.pb_on = false;
        self.output = Output::Pulse;
        self.one_shot = true;
        self.input = Input::SystemClock;
        self.latch = 0xffff;
        self.counter = 0x0000;
        self.delay.reset();
        self.pb_toggle = false;
        self.pb_pulse = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    fn setup_timer(mode: Mode) -> Timer {
        Timer::new(mode, new_shared(Pin::new_high()))
    }

    #[test]
    fn latch_hi_write_loads_stopped_timer() {
        let mut timer = setup_timer(Mode::TimerA);
        timer.set_latch_lo(0xab);
        timer.set_latch_hi(0xcd);
        assert_eq!(0x0000, timer.get_counter());
        timer.clock();
        assert_eq!(0x0000, timer.get_counter());
        timer.clock();
        assert_eq!(0xcdab, timer.get_counter());
    }

    #[test]
    fn count_starts_after_two_cycle_delay() {
        let mut timer = setup_timer(Mode::TimerA);
        timer.set_latch_lo(0x02);
        timer.set_latch_hi(0x00);
        timer.clock();
        timer.clock();
        timer.set_config(0x01);
        timer.clock();
        assert_eq!(0x02, timer.get_counter());
        timer.clock();
        assert_eq!(0x02, timer.get_counter());
        timer.clock();
        assert_eq!(0x01, timer.get_counter());
    }

    #[test]
    fn underflow_reloads_latch_and_pauses_one_cycle() {
        let mut timer = setup_timer(Mode::TimerA);
        timer.set_latch_lo(0x02);
        timer.set_latch_hi(0x00);
        timer.clock();
        timer.clock();
        timer.set_config(0x01);
        timer.clock(); // count0|count1
        timer.clock(); // count2
        assert_eq!(false, timer.clock()); // 2 -> 1
        assert_eq!(true, timer.clock()); // 1 -> 0, reload
        assert_eq!(0x02, timer.get_counter());
        assert_eq!(false, timer.clock()); // reload pause
        assert_eq!(0x02, timer.get_counter());
        assert_eq!(false, timer.clock()); // 2 -> 1
        assert_eq!(true, timer.clock()); // underflow again
    }

    #[test]
    fn one_shot_stops_after_underflow() {
        let mut timer = setup_timer(Mode::TimerA);
        timer.set_latch_lo(0x01);
        timer.set_latch_hi(0x00);
        timer.clock();
        timer.clock();
        timer.set_config(0x09);
        timer.clock();
        timer.clock();
        assert_eq!(true, timer.clock());
        assert!(!timer.is_running());
        for _ in 0..4 {
            assert_eq!(false, timer.clock());
        }
        assert_eq!(0x01, timer.get_counter());
    }
}
