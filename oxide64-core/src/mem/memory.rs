// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::factory::{Addressable, AddressableFaded, Bank, Mmu};
use crate::util::{IoPort, Ram, Rom, Shared, SharedCell};

use super::{BaseAddr, Mmio};

// Spec: COMMODORE 64 MEMORY MAPS p. 263
// Design:
//   Inspired by UAE memory address64k/bank concepts. The MMU resolves each
//   access to a bank; cartridge windows fade through to RAM when the mapped
//   chip does not cover the address, and disabled zones (ultimax) read the
//   byte left on the VIC data bus. The processor port shows up at
//   0x0000/0x0001 in every configuration. When the Kernal window is mapped
//   but no Kernal image is installed, the interrupt vectors read as
//   hardcoded stubs so the processor lands on defined addresses.

/// Vector stubs used when the Kernal ROM is not installed.
mod fallback_vector {
    pub const NMI: u16 = 0xfe43;
    pub const RESET: u16 = 0xfce2;
    pub const IRQ: u16 = 0xff48;
}

pub struct Memory {
    // Dependencies
    mmu: Shared<dyn Mmu>,
    // Addressable
    basic: Shared<Rom>,
    charset: Shared<Rom>,
    cpu_io_port: Shared<IoPort>,
    expansion_port: Shared<dyn AddressableFaded>,
    io: Mmio,
    kernal: Shared<Rom>,
    kernal_loaded: bool,
    ram: Shared<Ram>,
    phi1_data: SharedCell<u8>,
}

impl Memory {
    pub fn new(
        mmu: Shared<dyn Mmu>,
        cpu_io_port: Shared<IoPort>,
        expansion_port: Shared<dyn AddressableFaded>,
        io: Mmio,
        ram: Shared<Ram>,
        rom_basic: Shared<Rom>,
        rom_charset: Shared<Rom>,
        rom_kernal: Shared<Rom>,
        kernal_loaded: bool,
        phi1_data: SharedCell<u8>,
    ) -> Self {
        Memory {
            mmu,
            basic: rom_basic,
            charset: rom_charset,
            cpu_io_port,
            expansion_port,
            io,
            kernal: rom_kernal,
            kernal_loaded,
            ram,
            phi1_data,
        }
    }

    /// Synthesized vector byte for reads of $FFFA-$FFFF while the Kernal
    /// window is mapped without an installed image. Any other source
    /// (RAM, cartridge ROMH in ultimax) supplies the vectors itself.
    fn vector_fallback(&self, address: u16) -> Option<u8> {
        if self.kernal_loaded {
            return None;
        }
        match self.mmu.borrow().map(address) {
            Bank::Kernal => {
                let stub = match address {
                    0xfffa | 0xfffb => fallback_vector::NMI,
                    0xfffc | 0xfffd => fallback_vector::RESET,
                    _ => fallback_vector::IRQ,
                };
                if address & 0x01 == 0 {
                    Some(stub as u8)
                } else {
                    Some((stub >> 8) as u8)
                }
            }
            _ => None,
        }
    }
}

impl Addressable for Memory {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000 => return self.cpu_io_port.borrow().get_direction(),
            0x0001 => return self.cpu_io_port.borrow().get_value(),
            0xfffa..=0xffff => {
                if let Some(value) = self.vector_fallback(address) {
                    return value;
                }
            }
            _ => {}
        }
        let bank = self.mmu.borrow().map(address);
        match bank {
            Bank::Ram => self.ram.borrow().read(address),
            Bank::Basic => self.basic.borrow().read(address),
            Bank::Charset => self
                .charset
                .borrow()
                .read(address - BaseAddr::Charset.addr()),
            Bank::Kernal => self.kernal.borrow().read(address),
            Bank::RomL | Bank::RomH => self
                .expansion_port
                .borrow_mut()
                .read(address)
                .unwrap_or_else(|| self.ram.borrow().read(address)),
            Bank::Io => self.io.read(address),
            Bank::Disabled => self.phi1_data.get(),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000 => {
                self.cpu_io_port.borrow_mut().set_direction(value);
                return;
            }
            0x0001 => {
                self.cpu_io_port.borrow_mut().set_value(value);
                return;
            }
            _ => {}
        }
        let bank = self.mmu.borrow().map(address);
        match bank {
            Bank::Ram | Bank::Basic | Bank::Charset | Bank::Kernal => {
                self.ram.borrow_mut().write(address, value)
            }
            Bank::RomL | Bank::RomH => {
                // cartridge RAM if mapped; the underlying system RAM sees
                // the write either way
                self.expansion_port.borrow_mut().write(address, value);
                self.ram.borrow_mut().write(address, value);
            }
            Bank::Io => self.io.write(address, value),
            Bank::Disabled => {}
        }
    }
}
