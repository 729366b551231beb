// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use bit_field::BitField;

use crate::device::cartridge::{Button, Cartridge};
use crate::factory::AddressableFaded;
use crate::util::{Clock, IoPort, IrqLine, Shared};

#[derive(Copy, Clone)]
enum IoLine {
    Game = 3,
    Exrom = 4,
}

impl IoLine {
    pub fn value(self) -> usize {
        self as usize
    }
}

/// The expansion port routes ROML/ROMH and I/O1/I/O2 accesses to the
/// currently installed cartridge and mirrors its GAME/EXROM outputs onto
/// the shared I/O line that feeds bank map recomputation.
pub struct ExpansionPort {
    cartridge: Option<Cartridge>,
    // Dependencies
    clock: Rc<Clock>,
    // I/O
    io_line: Shared<IoPort>,
    nmi_line: Shared<IrqLine>,
}

impl ExpansionPort {
    pub fn new(clock: Rc<Clock>, io_line: Shared<IoPort>, nmi_line: Shared<IrqLine>) -> Self {
        Self {
            cartridge: None,
            clock,
            io_line,
            nmi_line,
        }
    }

    pub fn attach(&mut self, mut cartridge: Cartridge) {
        let io_line_clone = self.io_line.clone();
        cartridge.set_io_observer(Some(Box::new(move |config| {
            let mut io_value = 0u8;
            io_value.set_bit(IoLine::Game.value(), config.game);
            io_value.set_bit(IoLine::Exrom.value(), config.exrom);
            io_line_clone.borrow_mut().set_value(io_value);
        })));
        cartridge.connect(self.nmi_line.clone(), self.clock.clone());
        self.cartridge = Some(cartridge);
    }

    pub fn detach(&mut self) {
        if let Some(mut cartridge) = self.cartridge.take() {
            cartridge.disconnect();
        }
        let mut io_value = 0u8;
        io_value.set_bit(IoLine::Game.value(), true);
        io_value.set_bit(IoLine::Exrom.value(), true);
        self.io_line.borrow_mut().set_value(io_value);
    }

    pub fn has_cartridge(&self) -> bool {
        self.cartridge.is_some()
    }

    /// Advances time dependent cartridge hardware by one cycle.
    pub fn clock(&mut self) {
        if let Some(ref mut cartridge) = self.cartridge {
            cartridge.clock();
        }
    }

    pub fn press_button(&mut self, button: Button) {
        if let Some(ref mut cartridge) = self.cartridge {
            cartridge.press_button(button);
        }
    }

    pub fn release_button(&mut self, button: Button) {
        if let Some(ref mut cartridge) = self.cartridge {
            cartridge.release_button(button);
        }
    }

    pub fn reset(&mut self) {
        if let Some(ref mut cartridge) = self.cartridge {
            cartridge.reset();
        } else {
            let mut io_value = 0u8;
            io_value.set_bit(IoLine::Game.value(), true);
            io_value.set_bit(IoLine::Exrom.value(), true);
            self.io_line.borrow_mut().set_value(io_value);
        }
    }
}

impl AddressableFaded for ExpansionPort {
    fn read(&mut self, address: u16) -> Option<u8> {
        match self.cartridge {
            Some(ref mut cartridge) => match address {
                0x8000..=0x9fff => cartridge.read_rom_l(address & 0x1fff),
                0xa000..=0xbfff => cartridge.read_rom_h(address & 0x1fff),
                0xe000..=0xffff => cartridge.read_rom_h(address & 0x1fff),
                0xde00..=0xdeff => cartridge.read_io1(address),
                0xdf00..=0xdfff => cartridge.read_io2(address),
                _ => panic!("invalid address {:04x}", address),
            },
            None => None,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if let Some(ref mut cartridge) = self.cartridge {
            match address {
                0x8000..=0x9fff => cartridge.write_rom_l(address & 0x1fff, value),
                0xa000..=0xbfff => cartridge.write_rom_h(address & 0x1fff, value),
                0xe000..=0xffff => cartridge.write_rom_h(address & 0x1fff, value),
                0xde00..=0xdeff => cartridge.write_io1(address, value),
                0xdf00..=0xdfff => cartridge.write_io2(address, value),
                _ => panic!("invalid address {:04x}", address),
            }
        }
    }
}
