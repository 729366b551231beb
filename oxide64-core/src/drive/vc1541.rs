// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use log::LogLevel;

use crate::cpu::Cpu6510;
use crate::factory::{Addressable, Cpu};
use crate::util::{new_shared, IrqLine, Pin, Ram, Rom, Shared};

use super::disk::Disk;
use super::via::Via;

// Design:
//   The VC1541 is a second computer on the same clock: a 6502 (the same
//   micro-op core as the host CPU) with 2 KiB RAM, the 16 KiB DOS ROM and
//   two VIA6522s. VIA1 talks to the IEC bus, VIA2 runs the drive
//   mechanics: stepper on PB0/PB1, spindle motor on PB2, LED on PB3,
//   write protect sense on PB4, density on PB5/PB6 and sync detect on PB7.
//   The read head shifts one bit at a time out of the GCR stream; after a
//   sync mark every eighth bit completes a byte which is latched into VIA2
//   port A and, when CA2 (SOE) allows it, pulses byte-ready into VIA2 CA1
//   and the processor's SO pin.

const DRIVE_RAM: usize = 0x0800;

/// Cycles per bit cell in 1/16 cycle units, by speed zone.
const BIT_PERIOD: [u32; 4] = [64, 60, 56, 52];

struct DriveMemory {
    ram: Shared<Ram>,
    rom: Shared<Rom>,
    via1: Shared<Via>,
    via2: Shared<Via>,
}

impl Addressable for DriveMemory {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x17ff => self.ram.borrow().read(address & 0x07ff),
            0x1800..=0x1bff => self.via1.borrow_mut().peek(address),
            0x1c00..=0x1fff => self.via2.borrow_mut().peek(address),
            0x8000..=0xffff => self.rom.borrow().read(address & 0x3fff),
            _ => 0,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x17ff => self.ram.borrow_mut().write(address & 0x07ff, value),
            0x1800..=0x1bff => self.via1.borrow_mut().poke(address, value),
            0x1c00..=0x1fff => self.via2.borrow_mut().poke(address, value),
            _ => {}
        }
    }
}

pub struct Drive {
    // Chipset
    cpu: Cpu6510,
    via1: Shared<Via>,
    via2: Shared<Via>,
    ram: Shared<Ram>,
    // Mechanics
    disk: Option<Disk>,
    halftrack: usize,
    head_offset: u32,
    bit_accumulator: u32,
    read_shift: u16,
    bit_counter: u8,
    byte_latch: u8,
    sync: bool,
    last_stepper: u8,
    // Configuration
    device_number: u8,
}

impl Drive {
    pub fn new(device_number: u8, rom_data: &[u8]) -> Self {
        let irq_line = new_shared(IrqLine::new("drive irq"));
        let nmi_line = new_shared(IrqLine::new("drive nmi"));
        let ba_line = new_shared(Pin::new_high());
        let via1 = new_shared(Via::new(irq_line.clone(), 0));
        let via2 = new_shared(Via::new(irq_line.clone(), 1));
        let ram = new_shared(Ram::new(DRIVE_RAM));
        let rom = new_shared(Rom::new_with_data(rom_data, 0));
        let mem = new_shared(DriveMemory {
            ram: ram.clone(),
            rom,
            via1: via1.clone(),
            via2: via2.clone(),
        });
        let cpu = Cpu6510::new(mem, ba_line, irq_line, nmi_line);
        let mut drive = Self {
            cpu,
            via1,
            via2,
            ram,
            disk: None,
            halftrack: 35,
            head_offset: 0,
            bit_accumulator: 0,
            read_shift: 0,
            bit_counter: 0,
            byte_latch: 0,
            sync: false,
            last_stepper: 0,
            device_number,
        };
        drive.reset();
        drive
    }

    pub fn get_device_number(&self) -> u8 {
        self.device_number
    }

    pub fn get_halftrack(&self) -> usize {
        self.halftrack
    }

    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    pub fn get_disk(&self) -> Option<&Disk> {
        self.disk.as_ref()
    }

    pub fn insert_disk(&mut self, disk: Disk) {
        let write_protected = disk.is_write_protected();
        self.disk = Some(disk);
        self.head_offset = 0;
        // write protect sense is active low
        self.via2
            .borrow_mut()
            .set_port_b_input_bits(0x10, if write_protected { 0x00 } else { 0x10 });
    }

    pub fn eject_disk(&mut self) -> Option<Disk> {
        self.via2.borrow_mut().set_port_b_input_bits(0x10, 0x10);
        self.disk.take()
    }

    pub fn is_motor_on(&self) -> bool {
        self.via2.borrow().port_b_out() & 0x04 != 0
    }

    pub fn reset(&mut self) {
        self.via1.borrow_mut().reset();
        self.via2.borrow_mut().reset();
        // device address jumpers on VIA1 PB5/PB6
        let jumpers = (self.device_number.wrapping_sub(8) & 0x03) << 5;
        self.via1.borrow_mut().set_port_b_input_bits(0x60, jumpers);
        self.cpu.reset();
        self.head_offset = 0;
        self.bit_accumulator = 0;
        self.read_shift = 0;
        self.bit_counter = 0;
        self.byte_latch = 0;
        self.sync = false;
        self.last_stepper = 0;
    }

    // -- IEC interface

    /// VIA1 port B output as seen by the bus drivers.
    pub fn iec_output(&self) -> u8 {
        self.via1.borrow().port_b_out()
    }

    /// Pushes the current bus line levels into VIA1. The receivers invert,
    /// so an asserted (low) line reads as a set bit.
    pub fn set_iec_inputs(&mut self, data_level: bool, clk_level: bool, atn_level: bool) {
        let mut via1 = self.via1.borrow_mut();
        let mut bits = 0u8;
        if !data_level {
            bits |= 0x01;
        }
        if !clk_level {
            bits |= 0x04;
        }
        if !atn_level {
            bits |= 0x80;
        }
        via1.set_port_b_input_bits(0x85, bits);
        via1.set_ca1(!atn_level, 0xff);
    }

    // -- Execution

    pub fn clock(&mut self) {
        self.cpu.clock();
        self.via1.borrow_mut().clock();
        self.via2.borrow_mut().clock();
        self.update_mechanics();
    }

    pub fn reset_ram(&mut self) {
        self.ram.borrow_mut().fill(0);
    }

    fn update_mechanics(&mut self) {
        let orb = self.via2.borrow().port_b_out();
        // Stepper motor: two phase field in PB0/PB1, one step per quarter
        // phase, two halftracks per track.
        let stepper = orb & 0x03;
        if stepper != self.last_stepper {
            if stepper == (self.last_stepper + 1) & 0x03 {
                if self.halftrack < super::disk::NUM_HALFTRACKS {
                    self.halftrack += 1;
                }
                if log_enabled!(LogLevel::Trace) {
                    trace!(target: "drive", "Head moved to halftrack {}", self.halftrack);
                }
            } else if stepper == self.last_stepper.wrapping_sub(1) & 0x03 {
                if self.halftrack > 1 {
                    self.halftrack -= 1;
                }
            }
            self.last_stepper = stepper;
        }
        // Spindle motor on PB2
        if orb & 0x04 == 0 || self.disk.is_none() {
            return;
        }
        let zone = (orb >> 5) & 0x03;
        self.bit_accumulator += 16;
        while self.bit_accumulator >= BIT_PERIOD[zone as usize] {
            self.bit_accumulator -= BIT_PERIOD[zone as usize];
            self.advance_head();
        }
    }

    fn advance_head(&mut self) {
        let (bit, next_offset) = {
            let disk = self.disk.as_ref().unwrap();
            let bit = disk.read_bit(self.halftrack, self.head_offset);
            (bit, disk.wrap(self.halftrack, self.head_offset + 1))
        };
        let writing = !self.via2.borrow().cb2_out();
        self.head_offset = next_offset;
        self.read_shift = (self.read_shift << 1) | if bit { 1 } else { 0 };
        if !writing && self.read_shift & 0x03ff == 0x03ff {
            // 10 or more consecutive one bits form a sync mark
            self.sync = true;
            self.bit_counter = 0;
            self.via2.borrow_mut().set_port_b_input_bits(0x80, 0x00);
            return;
        }
        if self.sync {
            self.via2.borrow_mut().set_port_b_input_bits(0x80, 0x80);
            self.sync = false;
        }
        self.bit_counter += 1;
        if self.bit_counter == 8 {
            self.bit_counter = 0;
            if writing {
                let value = self.via2.borrow().port_a_out();
                let halftrack = self.halftrack;
                let offset = self.head_offset;
                if let Some(ref mut disk) = self.disk {
                    if !disk.is_write_protected() {
                        let length = disk.length_of_halftrack(halftrack);
                        let start = (offset + length - 8) % length;
                        disk.write_byte(halftrack, start, value);
                    }
                }
            } else {
                self.byte_latch = (self.read_shift & 0xff) as u8;
                let byte_ready = {
                    let mut via2 = self.via2.borrow_mut();
                    via2.set_port_a_input(self.byte_latch);
                    if via2.ca2_out() {
                        // byte-ready pulses CA1
                        via2.set_ca1(false, self.byte_latch);
                        via2.set_ca1(true, self.byte_latch);
                        true
                    } else {
                        false
                    }
                };
                if byte_ready {
                    // the line is also wired to the processor's SO pin
                    self.cpu.set_overflow();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::disk::Disk;
    use super::*;
    use crate::drive::via::reg;

    fn setup_drive() -> Drive {
        // DOS ROM stub: reset vector points at a busy loop at $c000
        let mut rom = vec![0xea; 0x4000];
        rom[0x0000] = 0x4c; // JMP $c000
        rom[0x0001] = 0x00;
        rom[0x0002] = 0xc0;
        rom[0x3ffc] = 0x00;
        rom[0x3ffd] = 0xc0;
        Drive::new(8, &rom)
    }

    fn setup_disk() -> Disk {
        let mut disk = Disk::new();
        let sectors = |_: usize, _: usize| [0x33u8; 256];
        disk.encode(35, &sectors, (0x41, 0x42));
        disk
    }

    #[test]
    fn drive_cpu_runs_from_rom() {
        let mut drive = setup_drive();
        for _ in 0..32 {
            drive.clock();
        }
        let pc = drive.cpu.get_pc();
        assert!(pc >= 0xc000, "pc = {:04x}", pc);
    }

    #[test]
    fn motor_on_produces_sync_and_bytes() {
        let mut drive = setup_drive();
        drive.insert_disk(setup_disk());
        // motor on, density zone 3, read mode, byte ready enabled
        {
            let mut via2 = drive.via2.borrow_mut();
            via2.poke(reg::DDRB, 0x6f);
            via2.poke(reg::ORB, 0x64);
            via2.poke(reg::PCR, 0xee);
        }
        let mut seen_sync = false;
        let mut seen_byte = false;
        for _ in 0..60_000 {
            drive.clock();
            let pb = drive.via2.borrow().read(reg::ORB);
            if pb & 0x80 == 0 {
                seen_sync = true;
            }
            if drive.via2.borrow().read(reg::ORA) != 0 {
                seen_byte = true;
            }
        }
        assert!(seen_sync, "no sync mark seen");
        assert!(seen_byte, "no byte latched");
    }

    #[test]
    fn stepper_moves_head() {
        let mut drive = setup_drive();
        let start = drive.get_halftrack();
        {
            let mut via2 = drive.via2.borrow_mut();
            via2.poke(reg::DDRB, 0x03);
            via2.poke(reg::ORB, 0x01);
        }
        drive.clock();
        assert_eq!(start + 1, drive.get_halftrack());
        {
            let mut via2 = drive.via2.borrow_mut();
            via2.poke(reg::ORB, 0x00);
        }
        drive.clock();
        assert_eq!(start, drive.get_halftrack());
    }
}
