// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![cfg_attr(feature = "cargo-clippy", allow(clippy::too_many_arguments))]

use std::rc::Rc;
use std::sync::Arc;

use crate::factory::system_model::{SidModel, VicModel};
use crate::factory::types::*;
use crate::util::{Clock, IoPort, IrqLine, Pin, Ram, Rom, Shared, SharedCell};

/// ChipFactory constructs each chip/component within the system and allows
/// implementations to be swapped out. Interactions between chips are modeled
/// through separate I/O state provided as input to each of the chip
/// constructors (`IrqLine`, `Pin`), so the chips themselves stay decoupled.
///
/// The four core traits used to model system operation are `Chip`, `Cpu`,
/// `Mmu` and `Addressable`.
pub trait ChipFactory {
    /// Constructs CPU.
    ///
    /// The processor port at 0x0000/0x0001 is memory mapped and handled by
    /// the memory controller, which keeps the core reusable for the plain
    /// 6502 in the disk drive.
    ///
    /// # Dependencies
    /// `mem` - memory management unit
    /// # Signals
    /// `ba_line` - ba input, `irq_line` - interrupt request input,
    /// `nmi_line` - non-maskable interrupt request input
    fn new_cpu(
        &self,
        mem: Shared<dyn Addressable>,
        ba_line: Shared<Pin>,
        irq_line: Shared<IrqLine>,
        nmi_line: Shared<IrqLine>,
    ) -> Box<dyn Cpu>;

    // -- Chipset

    /// Constructs CIA 1 chip, connected to the two control ports and the
    /// keyboard matrix. Asserts the CPU IRQ line.
    fn new_cia_1(
        &self,
        joystick_1: SharedCell<u8>,
        joystick_2: SharedCell<u8>,
        keyboard_matrix: Shared<[u8; 16]>,
        port_a: Shared<IoPort>,
        port_b: Shared<IoPort>,
        flag_pin: Shared<Pin>,
        irq_line: Shared<IrqLine>,
    ) -> Shared<dyn Chip>;

    /// Constructs CIA 2 chip (serial bus, VIC bank select). Asserts the CPU
    /// NMI line.
    fn new_cia_2(
        &self,
        port_a: Shared<IoPort>,
        port_b: Shared<IoPort>,
        flag_pin: Shared<Pin>,
        nmi_line: Shared<IrqLine>,
    ) -> Shared<dyn Chip>;

    /// Constructs SID chip. The system clock allows SID to sync sound
    /// generation up to the current cycle when a register access happens
    /// between frame boundaries.
    fn new_sid(
        &self,
        chip_model: SidModel,
        system_clock: Rc<Clock>,
        sound_buffer: Arc<dyn SoundOutput>,
    ) -> Shared<dyn Chip>;

    /// Constructs VIC chip.
    ///
    /// VIC address generation is based on CIA 2 port A (bits 0-1); the
    /// resolved base address is passed through `vic_base_address`. VIC
    /// output goes into `frame_buffer`; `vsync_flag` is raised at frame
    /// end; `phi1_data` carries the last byte VIC read on its bus (open-bus
    /// reads observe it).
    fn new_vic(
        &self,
        chip_model: VicModel,
        color_ram: Shared<Ram>,
        ram: Shared<Ram>,
        rom_charset: Shared<Rom>,
        vic_base_address: SharedCell<u16>,
        frame_buffer: Shared<dyn VideoOutput>,
        vsync_flag: SharedCell<bool>,
        phi1_data: SharedCell<u8>,
        ba_line: Shared<Pin>,
        irq_line: Shared<IrqLine>,
        lp_pin: Shared<Pin>,
    ) -> Shared<dyn Chip>;

    // -- Memory

    /// Constructs the memory controller. Bank switching is controlled
    /// through the 5 latch bits (LORAM, HIRAM, CHAREN, GAME, EXROM) that
    /// feed the MMU's address translation.
    fn new_memory(
        &self,
        mmu: Shared<dyn Mmu>,
        cia_1: Shared<dyn Chip>,
        cia_2: Shared<dyn Chip>,
        color_ram: Shared<Ram>,
        cpu_io_port: Shared<IoPort>,
        expansion_port: Shared<dyn AddressableFaded>,
        ram: Shared<Ram>,
        rom_basic: Shared<Rom>,
        rom_charset: Shared<Rom>,
        rom_kernal: Shared<Rom>,
        sid: Shared<dyn Chip>,
        vic: Shared<dyn Chip>,
        phi1_data: SharedCell<u8>,
    ) -> Shared<dyn Addressable>;

    /// Constructs RAM with the specified `capacity`.
    fn new_ram(&self, capacity: usize) -> Shared<Ram>;

    /// Constructs ROM based on the specified image.
    fn new_rom(&self, data: &[u8], offset: u16) -> Shared<Rom>;
}
