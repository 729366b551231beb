// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::util::{IrqLine, Shared};

// Spec: R6522 VERSATILE INTERFACE ADAPTER datasheet (Rockwell)
// Design:
//   The chip's one cycle pipeline is modeled with a 64-bit event queue:
//   events are fed in as single bits and travel one stage per clock, and
//   the feed word makes events persistent. Timer loads and counts go
//   through this queue, which is what makes nibble-timed copy protection
//   loaders work.

pub mod delay {
    pub const COUNT_A0: u64 = 1;
    pub const COUNT_A1: u64 = 1 << 1;
    pub const COUNT_B0: u64 = 1 << 4;
    pub const COUNT_B1: u64 = 1 << 5;
    pub const LOAD_A0: u64 = 1 << 8;
    pub const LOAD_A1: u64 = 1 << 9;
    pub const LOAD_B0: u64 = 1 << 11;
    pub const LOAD_B1: u64 = 1 << 12;
    /// One-shot stage-0 bits are stripped by the per-cycle shift; only the
    /// feed word carries long lived state.
    pub const MASK: u64 = COUNT_A0 | COUNT_A1 | COUNT_B0 | COUNT_B1
        | LOAD_A0 | LOAD_A1 | LOAD_B0 | LOAD_B1;
}

mod int {
    pub const CA2: u8 = 1;
    pub const CA1: u8 = 1 << 1;
    pub const SR: u8 = 1 << 2;
    pub const CB2: u8 = 1 << 3;
    pub const CB1: u8 = 1 << 4;
    pub const T2: u8 = 1 << 5;
    pub const T1: u8 = 1 << 6;
}

pub mod reg {
    pub const ORB: u16 = 0x0;
    pub const ORA: u16 = 0x1;
    pub const DDRB: u16 = 0x2;
    pub const DDRA: u16 = 0x3;
    pub const T1C_L: u16 = 0x4;
    pub const T1C_H: u16 = 0x5;
    pub const T1L_L: u16 = 0x6;
    pub const T1L_H: u16 = 0x7;
    pub const T2C_L: u16 = 0x8;
    pub const T2C_H: u16 = 0x9;
    pub const SR: u16 = 0xa;
    pub const ACR: u16 = 0xb;
    pub const PCR: u16 = 0xc;
    pub const IFR: u16 = 0xd;
    pub const IER: u16 = 0xe;
    pub const ORA_NH: u16 = 0xf;
}

pub struct Via {
    // Ports
    ora: u8,
    orb: u8,
    ira: u8,
    irb: u8,
    ddra: u8,
    ddrb: u8,
    // Timers
    t1: u16,
    t1_latch_lo: u8,
    t1_latch_hi: u8,
    t1_armed: bool,
    t1_pb7: bool,
    t2: u16,
    t2_latch_lo: u8,
    t2_armed: bool,
    last_pb6: bool,
    // Control
    sr: u8,
    sr_bits: u8,
    acr: u8,
    pcr: u8,
    ier: u8,
    ifr: u8,
    // Event queue
    event_delay: u64,
    event_feed: u64,
    // Control lines
    ca1: bool,
    ca2: bool,
    cb1: bool,
    cb2: bool,
    // I/O
    irq_line: Shared<IrqLine>,
    irq_source: usize,
}

impl Via {
    pub fn new(irq_line: Shared<IrqLine>, irq_source: usize) -> Self {
        Self {
            ora: 0,
            orb: 0,
            ira: 0xff,
            irb: 0xff,
            ddra: 0,
            ddrb: 0,
            t1: 0,
            t1_latch_lo: 0,
            t1_latch_hi: 0,
            t1_armed: false,
            t1_pb7: false,
            t2: 0,
            t2_latch_lo: 0,
            t2_armed: false,
            last_pb6: true,
            sr: 0,
            sr_bits: 0,
            acr: 0,
            pcr: 0,
            ier: 0,
            ifr: 0,
            event_delay: 0,
            event_feed: delay::COUNT_A0 | delay::COUNT_B0,
            ca1: true,
            ca2: true,
            cb1: true,
            cb2: true,
            irq_line,
            irq_source,
        }
    }

    pub fn reset(&mut self) {
        self.ora = 0;
        self.orb = 0;
        self.ira = 0xff;
        self.irb = 0xff;
        self.ddra = 0;
        self.ddrb = 0;
        self.t1 = 0;
        self.t1_latch_lo = 0;
        self.t1_latch_hi = 0;
        self.t1_armed = false;
        self.t1_pb7 = false;
        self.t2 = 0;
        self.t2_latch_lo = 0;
        self.t2_armed = false;
        self.last_pb6 = true;
        self.sr = 0;
        self.sr_bits = 0;
        self.acr = 0;
        self.pcr = 0;
        self.ier = 0;
        self.ifr = 0;
        self.event_delay = 0;
        self.event_feed = delay::COUNT_A0 | delay::COUNT_B0;
        self.ca1 = true;
        self.ca2 = true;
        self.cb1 = true;
        self.cb2 = true;
        self.update_irq();
    }

    // -- Configuration queries

    pub fn free_run_t1(&self) -> bool {
        self.acr & 0x40 != 0
    }

    fn t2_counts_pb6(&self) -> bool {
        self.acr & 0x20 != 0
    }

    fn input_latching_a(&self) -> bool {
        self.acr & 0x01 != 0
    }

    /// CA2 output level as configured by the PCR; the drive uses it as the
    /// byte-ready enable (SOE).
    pub fn ca2_out(&self) -> bool {
        match (self.pcr >> 1) & 0x07 {
            6 => false,
            7 => true,
            _ => true,
        }
    }

    /// CB2 output level; the drive uses it as the read/write mode line.
    pub fn cb2_out(&self) -> bool {
        match (self.pcr >> 5) & 0x07 {
            6 => false,
            7 => true,
            _ => true,
        }
    }

    // -- Port plumbing

    pub fn port_a_out(&self) -> u8 {
        (self.ora & self.ddra) | !self.ddra
    }

    pub fn port_b_out(&self) -> u8 {
        (self.orb & self.ddrb) | !self.ddrb
    }

    pub fn set_port_a_input(&mut self, value: u8) {
        if !self.input_latching_a() {
            self.ira = value;
        }
    }

    pub fn set_port_b_input_bits(&mut self, mask: u8, value: u8) {
        self.irb = (self.irb & !mask) | (value & mask);
    }

    /// A CA1 active edge latches port A (when input latching is on) and
    /// raises the CA1 interrupt. The active edge polarity is PCR bit 0.
    pub fn set_ca1(&mut self, level: bool, latch_value: u8) {
        if self.ca1 != level {
            let active_high = self.pcr & 0x01 != 0;
            if level == active_high {
                self.ifr |= int::CA1;
                if self.input_latching_a() {
                    self.ira = latch_value;
                }
                self.update_irq();
            }
            self.ca1 = level;
        }
    }

    pub fn set_cb1(&mut self, level: bool) {
        if self.cb1 != level {
            let active_high = self.pcr & 0x10 != 0;
            if level == active_high {
                self.ifr |= int::CB1;
                self.update_irq();
            }
            self.cb1 = level;
        }
    }

    // -- Interrupt handling

    fn irq_asserted(&self) -> bool {
        (self.ifr & self.ier & 0x7f) != 0
    }

    fn update_irq(&mut self) {
        let asserted = self.irq_asserted();
        self.irq_line
            .borrow_mut()
            .set_low(self.irq_source, asserted);
    }

    fn set_interrupt(&mut self, flag: u8) {
        self.ifr |= flag;
        self.update_irq();
    }

    fn clear_interrupt(&mut self, flag: u8) {
        self.ifr &= !flag;
        self.update_irq();
    }

    // -- Execution

    pub fn clock(&mut self) {
        self.execute_timer_1();
        self.execute_timer_2();
        self.event_delay = ((self.event_delay << 1) & delay::MASK) | self.event_feed;
    }

    fn execute_timer_1(&mut self) {
        if self.event_delay & delay::LOAD_A1 != 0 {
            self.t1 = (u16::from(self.t1_latch_hi) << 8) | u16::from(self.t1_latch_lo);
            return;
        }
        if self.event_delay & delay::COUNT_A1 != 0 {
            if self.t1 == 0 {
                if self.t1_armed {
                    self.set_interrupt(int::T1);
                    if self.acr & 0x80 != 0 {
                        self.t1_pb7 = !self.t1_pb7;
                    }
                    if self.free_run_t1() {
                        self.event_delay |= delay::LOAD_A0;
                    } else {
                        self.t1_armed = false;
                    }
                }
            } else {
                self.t1 = self.t1.wrapping_sub(1);
            }
        }
    }

    fn execute_timer_2(&mut self) {
        let count = if self.t2_counts_pb6() {
            // count high-to-low transitions on PB6
            let pb6 = self.irb & 0x40 != 0;
            let edge = self.last_pb6 && !pb6;
            self.last_pb6 = pb6;
            edge
        } else {
            self.event_delay & delay::COUNT_B1 != 0
        };
        if count {
            if self.t2 == 0 {
                if self.t2_armed {
                    self.set_interrupt(int::T2);
                    self.t2_armed = false;
                    self.shift_under_t2();
                }
            } else {
                self.t2 = self.t2.wrapping_sub(1);
            }
        }
    }

    fn shift_under_t2(&mut self) {
        // shift register modes clocked by T2 (ACR bits 2-4 = 001/101)
        let mode = (self.acr >> 2) & 0x07;
        if (mode == 0x01 || mode == 0x05) && self.sr_bits > 0 {
            self.sr = self.sr.rotate_left(1);
            self.sr_bits -= 1;
            if self.sr_bits == 0 {
                self.set_interrupt(int::SR);
            }
        }
    }

    // -- I/O

    pub fn peek(&mut self, addr: u16) -> u8 {
        match addr & 0x0f {
            reg::ORB => {
                self.clear_interrupt(int::CB1 | int::CB2);
                self.read_port_b()
            }
            reg::ORA => {
                self.clear_interrupt(int::CA1 | int::CA2);
                self.read_port_a()
            }
            reg::DDRB => self.ddrb,
            reg::DDRA => self.ddra,
            reg::T1C_L => {
                self.clear_interrupt(int::T1);
                (self.t1 & 0xff) as u8
            }
            reg::T1C_H => (self.t1 >> 8) as u8,
            reg::T1L_L => self.t1_latch_lo,
            reg::T1L_H => self.t1_latch_hi,
            reg::T2C_L => {
                self.clear_interrupt(int::T2);
                (self.t2 & 0xff) as u8
            }
            reg::T2C_H => (self.t2 >> 8) as u8,
            reg::SR => {
                self.clear_interrupt(int::SR);
                self.sr
            }
            reg::ACR => self.acr,
            reg::PCR => self.pcr,
            reg::IFR => self.read_ifr(),
            reg::IER => self.ier | 0x80,
            reg::ORA_NH => self.read_port_a(),
            _ => unreachable!(),
        }
    }

    /// Same as peek but without side effects.
    pub fn read(&self, addr: u16) -> u8 {
        match addr & 0x0f {
            reg::ORB => self.read_port_b(),
            reg::ORA | reg::ORA_NH => self.read_port_a(),
            reg::DDRB => self.ddrb,
            reg::DDRA => self.ddra,
            reg::T1C_L => (self.t1 & 0xff) as u8,
            reg::T1C_H => (self.t1 >> 8) as u8,
            reg::T1L_L => self.t1_latch_lo,
            reg::T1L_H => self.t1_latch_hi,
            reg::T2C_L => (self.t2 & 0xff) as u8,
            reg::T2C_H => (self.t2 >> 8) as u8,
            reg::SR => self.sr,
            reg::ACR => self.acr,
            reg::PCR => self.pcr,
            reg::IFR => self.read_ifr(),
            reg::IER => self.ier | 0x80,
            _ => unreachable!(),
        }
    }

    pub fn poke(&mut self, addr: u16, value: u8) {
        match addr & 0x0f {
            reg::ORB => {
                self.orb = value;
                self.clear_interrupt(int::CB1 | int::CB2);
            }
            reg::ORA => {
                self.ora = value;
                self.clear_interrupt(int::CA1 | int::CA2);
            }
            reg::DDRB => self.ddrb = value,
            reg::DDRA => self.ddra = value,
            reg::T1C_L | reg::T1L_L => self.t1_latch_lo = value,
            reg::T1C_H => {
                self.t1_latch_hi = value;
                self.t1_armed = true;
                self.clear_interrupt(int::T1);
                if self.acr & 0x80 != 0 {
                    self.t1_pb7 = false;
                }
                self.event_delay |= delay::LOAD_A0;
            }
            reg::T1L_H => {
                self.t1_latch_hi = value;
                self.clear_interrupt(int::T1);
            }
            reg::T2C_L => self.t2_latch_lo = value,
            reg::T2C_H => {
                self.t2 = (u16::from(value) << 8) | u16::from(self.t2_latch_lo);
                self.t2_armed = true;
                self.clear_interrupt(int::T2);
            }
            reg::SR => {
                self.sr = value;
                self.sr_bits = 8;
                self.clear_interrupt(int::SR);
            }
            reg::ACR => self.acr = value,
            reg::PCR => self.pcr = value,
            reg::IFR => {
                self.ifr &= !(value & 0x7f);
                self.update_irq();
            }
            reg::IER => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7f;
                } else {
                    self.ier &= !(value & 0x7f);
                }
                self.update_irq();
            }
            reg::ORA_NH => self.ora = value,
            _ => unreachable!(),
        }
    }

    fn read_ifr(&self) -> u8 {
        let mut value = self.ifr & 0x7f;
        if self.irq_asserted() {
            value |= 0x80;
        }
        value
    }

    fn read_port_a(&self) -> u8 {
        (self.ora & self.ddra) | (self.ira & !self.ddra)
    }

    fn read_port_b(&self) -> u8 {
        let mut value = (self.orb & self.ddrb) | (self.irb & !self.ddrb);
        if self.acr & 0x80 != 0 {
            // T1 controls PB7
            value = (value & 0x7f) | if self.t1_pb7 { 0x80 } else { 0x00 };
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    fn setup_via() -> Via {
        let irq_line = new_shared(IrqLine::new("drive irq"));
        let mut via = Via::new(irq_line, 0);
        via.reset();
        via
    }

    #[test]
    fn t1_counts_down_and_interrupts() {
        let mut via = setup_via();
        via.poke(reg::IER, 0x80 | 0x40); // enable t1
        via.poke(reg::T1C_L, 0x03);
        via.poke(reg::T1C_H, 0x00);
        via.clock(); // load pipeline
        via.clock();
        for _ in 0..3 {
            assert_eq!(false, via.irq_line.borrow().is_low());
            via.clock();
        }
        via.clock();
        assert_eq!(true, via.irq_line.borrow().is_low());
    }

    #[test]
    fn t1_one_shot_fires_once() {
        let mut via = setup_via();
        via.poke(reg::IER, 0x80 | 0x40);
        via.poke(reg::T1C_L, 0x01);
        via.poke(reg::T1C_H, 0x00);
        for _ in 0..8 {
            via.clock();
        }
        assert_eq!(true, via.irq_line.borrow().is_low());
        via.peek(reg::T1C_L); // acknowledge
        assert_eq!(false, via.irq_line.borrow().is_low());
        for _ in 0..8 {
            via.clock();
        }
        assert_eq!(false, via.irq_line.borrow().is_low());
    }

    #[test]
    fn t1_free_run_reloads_from_latch() {
        let mut via = setup_via();
        via.poke(reg::ACR, 0x40);
        via.poke(reg::IER, 0x80 | 0x40);
        via.poke(reg::T1C_L, 0x02);
        via.poke(reg::T1C_H, 0x00);
        for _ in 0..8 {
            via.clock();
        }
        assert_eq!(true, via.irq_line.borrow().is_low());
        via.peek(reg::T1C_L);
        for _ in 0..8 {
            via.clock();
        }
        assert_eq!(true, via.irq_line.borrow().is_low());
    }

    #[test]
    fn ca1_edge_sets_interrupt_flag() {
        let mut via = setup_via();
        via.poke(reg::IER, 0x80 | 0x02);
        via.set_ca1(false, 0xff); // falling edge is the default active edge
        assert_eq!(true, via.irq_line.borrow().is_low());
        via.peek(reg::ORA);
        assert_eq!(false, via.irq_line.borrow().is_low());
    }

    #[test]
    fn ier_set_and_clear() {
        let mut via = setup_via();
        via.poke(reg::IER, 0x82);
        assert_eq!(0x82, via.read(reg::IER) & 0x82);
        via.poke(reg::IER, 0x02);
        assert_eq!(0x00, via.read(reg::IER) & 0x02);
    }
}
