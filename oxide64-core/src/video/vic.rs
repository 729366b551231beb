// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;
use log::LogLevel;

use crate::factory::{Chip, VicModel, VideoOutput};
use crate::util::{IrqControl, IrqLine, Pin, Ram, Shared, SharedCell};

use super::border_unit::BorderUnit;
use super::gfx_sequencer::{GfxSequencer, Mode};
use super::mux_unit::MuxUnit;
use super::spec::Spec;
use super::sprite_sequencer::{self, SpriteSequencer};
use super::vic_memory::VicMemory;

// Spec: The MOS 6567/6569 video controller (VIC-II) and its application
//       in the Commodore 64
// Design:
//   The rasterline is divided into numbered cycles and each cycle performs
//   the bus accesses of the real chip: sprite pointer/data fetches at the
//   line edges, 5 DRAM refresh cycles, c-accesses while BA is low on a bad
//   line and g-accesses feeding the graphics sequencer. Pixels move through
//   the graphics/sprite sequencers and the priority mux into the frame
//   buffer, eight per cycle.

enum IntSource {
    Raster = 0,
    MbCollision = 1,
    MmCollision = 2,
    LightPen = 3,
}

pub mod reg {
    pub const CR1: u8 = 0x11;
    pub const RASTER: u8 = 0x12;
    pub const LPX: u8 = 0x13;
    pub const LPY: u8 = 0x14;
    pub const ME: u8 = 0x15;
    pub const CR2: u8 = 0x16;
    pub const MYE: u8 = 0x17;
    pub const MEMPTR: u8 = 0x18;
    pub const IRR: u8 = 0x19;
    pub const IMR: u8 = 0x1a;
    pub const MDP: u8 = 0x1b;
    pub const MMC: u8 = 0x1c;
    pub const MXE: u8 = 0x1d;
    pub const MM: u8 = 0x1e;
    pub const MD: u8 = 0x1f;
    pub const EC: u8 = 0x20;
    pub const B0C: u8 = 0x21;
    pub const MM0: u8 = 0x25;
    pub const MM1: u8 = 0x26;
    pub const M0C: u8 = 0x27;
}

pub struct Vic {
    // Configuration
    spec: Spec,
    // Dependencies
    color_ram: Shared<Ram>,
    mem: VicMemory,
    // Functional Units
    border_unit: BorderUnit,
    gfx_seq: GfxSequencer,
    mux_unit: MuxUnit,
    sprites: [SpriteSequencer; 8],
    // Registers
    den: bool,
    x_scroll: u8,
    y_scroll: u8,
    mem_ptr_vm: u16,
    mem_ptr_cb: u16,
    raster_compare: u16,
    irq_control: IrqControl,
    light_pen_pos: [u8; 2],
    // Counters
    raster_line: u16,
    raster_cycle: u16,
    vc_base: u16,
    vc: u16,
    rc: u8,
    vmli: usize,
    mc: [u8; 8],
    mc_base: [u8; 8],
    refresh_counter: u8,
    // Runtime State
    display_state: bool,
    bad_line: bool,
    allow_bad_lines: bool,
    gfx_pending: bool,
    lp_triggered: bool,
    // I/O
    ba_line: Shared<Pin>,
    irq_line: Shared<IrqLine>,
    lp_pin: Shared<Pin>,
    frame_buffer: Shared<dyn VideoOutput>,
    vsync_flag: SharedCell<bool>,
    phi1_data: SharedCell<u8>,
    // Buffers
    vm_data: [u8; 40],
    vm_color: [u8; 40],
}

impl Vic {
    #![cfg_attr(feature = "cargo-clippy", allow(clippy::too_many_arguments))]
    pub fn new(
        chip_model: VicModel,
        color_ram: Shared<Ram>,
        mem: VicMemory,
        frame_buffer: Shared<dyn VideoOutput>,
        vsync_flag: SharedCell<bool>,
        phi1_data: SharedCell<u8>,
        ba_line: Shared<Pin>,
        irq_line: Shared<IrqLine>,
        lp_pin: Shared<Pin>,
    ) -> Self {
        info!(target: "video", "Initializing VIC");
        Self {
            spec: Spec::new(chip_model),
            color_ram,
            mem,
            border_unit: BorderUnit::new(),
            gfx_seq: GfxSequencer::new(),
            mux_unit: MuxUnit::new(),
            sprites: [
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
                SpriteSequencer::new(),
            ],
            den: false,
            x_scroll: 0,
            y_scroll: 0,
            mem_ptr_vm: 0,
            mem_ptr_cb: 0,
            raster_compare: 0,
            irq_control: IrqControl::default(),
            light_pen_pos: [0; 2],
            raster_line: 0,
            raster_cycle: 1,
            vc_base: 0,
            vc: 0,
            rc: 0,
            vmli: 0,
            mc: [0; 8],
            mc_base: [0; 8],
            refresh_counter: 0,
            display_state: false,
            bad_line: false,
            allow_bad_lines: false,
            gfx_pending: false,
            lp_triggered: false,
            ba_line,
            irq_line,
            lp_pin,
            frame_buffer,
            vsync_flag,
            phi1_data,
            vm_data: [0; 40],
            vm_color: [0; 40],
        }
    }

    pub fn get_raster_line(&self) -> u16 {
        self.raster_line
    }

    pub fn get_raster_cycle(&self) -> u16 {
        self.raster_cycle
    }

    /// Rasterline cycle on which the pointer fetch for the given sprite
    /// happens. Sprites 0-2 are fetched at the end of the line, 3-7 at
    /// the beginning of the next one.
    fn sprite_fetch_cycle(&self, n: usize) -> u16 {
        if n < 3 {
            self.spec.cycles_per_raster - 5 + 2 * n as u16
        } else {
            2 * n as u16 - 5
        }
    }

    fn sprite_fetch_slot(&self, cycle: u16) -> Option<usize> {
        for n in 0..8 {
            if self.sprite_fetch_cycle(n) == cycle {
                return Some(n);
            }
        }
        None
    }

    fn trigger_irq(&mut self, source: usize) {
        self.irq_control.set_event(source);
        if self.irq_control.is_triggered() {
            if log_enabled!(LogLevel::Trace) {
                trace!(target: "vic::int", "Irq source {} at ({}, {})",
                       source, self.raster_line, self.raster_cycle);
            }
            self.irq_line.borrow_mut().set_low(1, true);
        }
    }

    fn update_irq_line(&mut self) {
        self.irq_line
            .borrow_mut()
            .set_low(1, self.irq_control.is_triggered());
    }

    // -- Bus accesses

    fn read_vic_mem(&self, address: u16) -> u8 {
        let value = self.mem.read(address);
        self.phi1_data.set(value);
        value
    }

    fn refresh_access(&mut self) {
        let address = 0x3f00 | u16::from(self.refresh_counter);
        let _ = self.read_vic_mem(address);
        self.refresh_counter = self.refresh_counter.wrapping_sub(1);
    }

    fn c_access(&mut self, index: usize) {
        let position = (self.vc_base + index as u16) & 0x03ff;
        self.vm_data[index] = self.read_vic_mem(self.mem_ptr_vm | position);
        self.vm_color[index] = self.color_ram.borrow().read(position) & 0x0f;
    }

    fn g_access(&mut self) {
        if self.display_state {
            let index = self.vmli % 40;
            let address = match self.gfx_seq.config.mode {
                Mode::Text | Mode::McText => {
                    self.mem_ptr_cb
                        | (u16::from(self.vm_data[index]) << 3)
                        | u16::from(self.rc)
                }
                Mode::EcmText | Mode::InvalidText => {
                    self.mem_ptr_cb
                        | (u16::from(self.vm_data[index] & 0x3f) << 3)
                        | u16::from(self.rc)
                }
                Mode::Bitmap | Mode::McBitmap | Mode::InvalidBitmap1 | Mode::InvalidBitmap2 => {
                    (self.mem_ptr_cb & 0x2000) | (self.vc << 3) | u16::from(self.rc)
                }
            };
            let g_data = self.read_vic_mem(address);
            self.gfx_seq
                .set_data(self.vm_data[index], self.vm_color[index], g_data);
            self.gfx_pending = true;
            self.vc = (self.vc + 1) & 0x03ff;
            self.vmli = (self.vmli + 1) % 64;
        } else {
            // idle access
            let g_data = self.read_vic_mem(0x3fff);
            self.gfx_seq.set_data(0, 0, g_data);
            self.gfx_pending = true;
        }
    }

    fn sprite_fetch(&mut self, n: usize) {
        let pointer = self.read_vic_mem(self.mem_ptr_vm | 0x03f8 | n as u16);
        if self.sprites[n].dma {
            for byte in 0..3 {
                let address = (u16::from(pointer) << 6) | u16::from(self.mc[n]);
                let data = self.read_vic_mem(address);
                self.sprites[n].set_data(byte, data);
                self.mc[n] = (self.mc[n] + 1) & 0x3f;
            }
        }
    }

    // -- Sprite state machine

    fn sprite_dma_check(&mut self) {
        let line = (self.raster_line & 0xff) as u8;
        for n in 0..8 {
            let sprite = &mut self.sprites[n];
            if sprite.config.enabled && sprite.config.y == line && !sprite.dma {
                sprite.dma = true;
                self.mc_base[n] = 0;
                if sprite.config.expand_y {
                    sprite.expansion_ff = false;
                }
            }
        }
    }

    fn sprite_display_check(&mut self) {
        let line = (self.raster_line & 0xff) as u8;
        for (n, sprite) in self.sprites.iter_mut().enumerate() {
            self.mc[n] = self.mc_base[n];
            if sprite.dma {
                if sprite.config.y == line {
                    sprite.display = true;
                }
            } else {
                sprite.display = false;
            }
        }
    }

    fn sprite_mcbase_advance(&mut self) {
        for (n, sprite) in self.sprites.iter_mut().enumerate() {
            if sprite.dma && sprite.expansion_ff {
                self.mc_base[n] = (self.mc_base[n] + 3) & 0x3f;
                if self.mc_base[n] == 63 {
                    sprite.dma = false;
                }
            }
        }
    }

    fn update_ba_line(&mut self) {
        let cycle = self.raster_cycle;
        let mut ba_low = self.bad_line && cycle >= 12 && cycle <= 54;
        if !ba_low {
            for n in 0..8 {
                if self.sprites[n].dma {
                    let fetch = self.sprite_fetch_cycle(n);
                    for offset in 0..5 {
                        let mut target = fetch as i32 - 3 + offset;
                        if target < 1 {
                            target += i32::from(self.spec.cycles_per_raster);
                        }
                        if target == i32::from(cycle) {
                            ba_low = true;
                        }
                    }
                }
            }
        }
        self.ba_line.borrow_mut().set_active(!ba_low);
    }

    // -- Pixel pipeline

    fn draw_cycle(&mut self) {
        let y = self.raster_line;
        let x_start = (self.raster_cycle - 1) << 3;
        for i in 0..8u16 {
            let x = x_start + i;
            if self.gfx_pending && i == u16::from(self.x_scroll) {
                self.gfx_seq.load_data();
                self.gfx_pending = false;
            }
            self.gfx_seq.clock();
            if self.display_state {
                let output = self.gfx_seq.output();
                self.mux_unit.feed_graphics(output);
            } else {
                self.mux_unit
                    .feed_graphics((self.gfx_seq.config.bg_color[0], false));
            }
            let mut sprite_output: [Option<u8>; 8] = [None; 8];
            for (n, sprite) in self.sprites.iter_mut().enumerate() {
                sprite.clock(x);
                sprite_output[n] = sprite.output();
            }
            self.mux_unit.compute_collisions(&sprite_output);
            self.mux_unit.feed_sprites(&sprite_output);
            self.border_unit.update_main_ff(x, y, self.den);
            if self.border_unit.is_enabled() {
                self.mux_unit
                    .feed_border(self.border_unit.config.border_color);
            }
            if self.mux_unit.mb_interrupt {
                self.mux_unit.mb_interrupt = false;
                self.trigger_irq(IntSource::MbCollision as usize);
            }
            if self.mux_unit.mm_interrupt {
                self.mux_unit.mm_interrupt = false;
                self.trigger_irq(IntSource::MmCollision as usize);
            }
            self.write_pixel(x, y, self.mux_unit.output());
        }
    }

    fn write_pixel(&mut self, x: u16, y: u16, color: u8) {
        if x >= self.spec.first_visible_x
            && x < self.spec.first_visible_x + self.spec.visible_size.0
            && y >= self.spec.first_visible_line
            && y < self.spec.first_visible_line + self.spec.visible_size.1
        {
            let index = (y - self.spec.first_visible_line) as usize
                * self.spec.visible_size.0 as usize
                + (x - self.spec.first_visible_x) as usize;
            self.frame_buffer.borrow_mut().write(index, color);
        }
    }
}

impl Chip for Vic {
    fn clock(&mut self) {
        // Bad line condition: the DEN bit must have been set in line 0x30
        // for bad lines to occur at all during the frame.
        if self.raster_line == 0x30 && self.raster_cycle == 1 {
            self.allow_bad_lines = self.den;
        }
        self.bad_line = self.allow_bad_lines
            && self.raster_line >= 0x30
            && self.raster_line <= 0xf7
            && (self.raster_line & 0x07) as u8 == self.y_scroll;
        if self.bad_line {
            self.display_state = true;
        }

        let cycle = self.raster_cycle;
        if cycle == 1 && self.raster_line == self.raster_compare {
            self.trigger_irq(IntSource::Raster as usize);
        }
        if let Some(n) = self.sprite_fetch_slot(cycle) {
            self.sprite_fetch(n);
        }
        match cycle {
            11..=13 => self.refresh_access(),
            14 => {
                self.refresh_access();
                self.vc = self.vc_base;
                self.vmli = 0;
                if self.bad_line {
                    self.rc = 0;
                }
            }
            15 => {
                self.refresh_access();
                if self.bad_line {
                    self.c_access(0);
                }
            }
            16 => {
                self.sprite_mcbase_advance();
                self.g_access();
                if self.bad_line {
                    self.c_access(1);
                }
            }
            17..=54 => {
                self.g_access();
                if self.bad_line {
                    self.c_access((cycle - 15) as usize);
                }
            }
            55 => {
                self.g_access();
                for sprite in self.sprites.iter_mut() {
                    if sprite.config.expand_y {
                        sprite.expansion_ff = !sprite.expansion_ff;
                    }
                }
                self.sprite_dma_check();
            }
            56 => {
                self.sprite_dma_check();
            }
            58 => {
                if self.rc == 7 {
                    self.vc_base = self.vc;
                    if !self.bad_line {
                        self.display_state = false;
                    }
                }
                if self.display_state {
                    self.rc = (self.rc + 1) & 0x07;
                }
                self.sprite_display_check();
            }
            _ => {}
        }
        if cycle == self.spec.cycles_per_raster {
            self.border_unit.update_vertical_ff(self.raster_line, self.den);
        }

        // Light pen latches once per frame on the falling edge.
        if self.lp_pin.borrow().is_falling() && !self.lp_triggered {
            self.lp_triggered = true;
            self.light_pen_pos[0] = ((self.raster_cycle - 1) * 4) as u8;
            self.light_pen_pos[1] = self.raster_line as u8;
            self.trigger_irq(IntSource::LightPen as usize);
        }

        self.draw_cycle();
        self.update_ba_line();

        // Advance raster position
        self.raster_cycle += 1;
        if self.raster_cycle > self.spec.cycles_per_raster {
            self.raster_cycle = 1;
            self.raster_line += 1;
            if self.raster_line == self.spec.raster_lines {
                self.raster_line = 0;
                self.vc_base = 0;
                self.lp_triggered = false;
                self.vsync_flag.set(true);
            }
        }
    }

    fn clock_delta(&mut self, delta: u32) {
        for _i in 0..delta {
            self.clock();
        }
    }

    fn process_vsync(&mut self) {}

    fn reset(&mut self) {
        self.border_unit.reset();
        self.gfx_seq.reset();
        self.mux_unit.reset();
        for sprite in self.sprites.iter_mut() {
            sprite.reset();
        }
        self.den = true;
        self.x_scroll = 0;
        self.y_scroll = 3;
        self.mem_ptr_vm = 0x0400;
        self.mem_ptr_cb = 0x1000;
        self.raster_compare = 0;
        self.irq_control.reset();
        self.light_pen_pos = [0; 2];
        self.raster_line = 0;
        self.raster_cycle = 1;
        self.vc_base = 0;
        self.vc = 0;
        self.rc = 0;
        self.vmli = 0;
        self.mc = [0; 8];
        self.mc_base = [0; 8];
        self.refresh_counter = 0xff;
        self.display_state = false;
        self.bad_line = false;
        self.allow_bad_lines = false;
        self.gfx_pending = false;
        self.lp_triggered = false;
        self.vm_data = [0; 40];
        self.vm_color = [0; 40];
        self.update_irq_line();
    }

    // I/O

    fn read(&mut self, reg: u8) -> u8 {
        let value = match reg {
            0x00..=0x0f => {
                let sprite = &self.sprites[(reg >> 1) as usize];
                if reg & 0x01 == 0 {
                    (sprite.config.x & 0x00ff) as u8
                } else {
                    sprite.config.y
                }
            }
            0x10 => {
                let mut result = 0u8;
                for (n, sprite) in self.sprites.iter().enumerate() {
                    result.set_bit(n, sprite.config.x.get_bit(8));
                }
                result
            }
            reg::CR1 => {
                let mut result = 0u8;
                result.set_bit(7, self.raster_line.get_bit(8));
                result.set_bit(6, self.gfx_seq.config.mode.value().get_bit(2));
                result.set_bit(5, self.gfx_seq.config.mode.value().get_bit(1));
                result.set_bit(4, self.den);
                result.set_bit(3, self.border_unit.config.rsel);
                result | (self.y_scroll & 0x07)
            }
            reg::RASTER => (self.raster_line & 0x00ff) as u8,
            reg::LPX => self.light_pen_pos[0],
            reg::LPY => self.light_pen_pos[1],
            reg::ME => {
                let mut result = 0u8;
                for (n, sprite) in self.sprites.iter().enumerate() {
                    result.set_bit(n, sprite.config.enabled);
                }
                result
            }
            reg::CR2 => {
                let mut result = 0xc0u8;
                result.set_bit(5, true);
                result.set_bit(4, self.gfx_seq.config.mode.value().get_bit(0));
                result.set_bit(3, self.border_unit.config.csel);
                result | (self.x_scroll & 0x07)
            }
            reg::MYE => {
                let mut result = 0u8;
                for (n, sprite) in self.sprites.iter().enumerate() {
                    result.set_bit(n, sprite.config.expand_y);
                }
                result
            }
            reg::MEMPTR => {
                let vm = ((self.mem_ptr_vm >> 10) as u8) << 4;
                let cb = ((self.mem_ptr_cb >> 10) as u8) & 0x0e;
                vm | cb | 0x01
            }
            reg::IRR => self.irq_control.get_data() | 0x70,
            reg::IMR => self.irq_control.get_mask() | 0xf0,
            reg::MDP => {
                let mut result = 0u8;
                for (n, value) in self.mux_unit.config.data_priority.iter().enumerate() {
                    result.set_bit(n, *value);
                }
                result
            }
            reg::MMC => {
                let mut result = 0u8;
                for (n, sprite) in self.sprites.iter().enumerate() {
                    result.set_bit(n, sprite.config.mode == sprite_sequencer::Mode::Multicolor);
                }
                result
            }
            reg::MXE => {
                let mut result = 0u8;
                for (n, sprite) in self.sprites.iter().enumerate() {
                    result.set_bit(n, sprite.config.expand_x);
                }
                result
            }
            reg::MM => {
                // cleared on read
                let result = self.mux_unit.mm_collision;
                self.mux_unit.mm_collision = 0;
                result
            }
            reg::MD => {
                let result = self.mux_unit.mb_collision;
                self.mux_unit.mb_collision = 0;
                result
            }
            reg::EC => self.border_unit.config.border_color | 0xf0,
            0x21..=0x24 => self.gfx_seq.config.bg_color[(reg - 0x21) as usize] | 0xf0,
            reg::MM0 => self.sprites[0].config.multicolor[0] | 0xf0,
            reg::MM1 => self.sprites[0].config.multicolor[1] | 0xf0,
            0x27..=0x2e => self.sprites[(reg - 0x27) as usize].config.color | 0xf0,
            0x2f..=0x3f => 0xff,
            _ => panic!("invalid reg {}", reg),
        };
        if log_enabled!(LogLevel::Trace) {
            trace!(target: "vic::reg", "Read 0x{:02x} = 0x{:02x}", reg, value);
        }
        value
    }

    fn write(&mut self, reg: u8, value: u8) {
        if log_enabled!(LogLevel::Trace) {
            trace!(target: "vic::reg", "Write 0x{:02x} = 0x{:02x}", reg, value);
        }
        match reg {
            0x00..=0x0f => {
                let sprite = &mut self.sprites[(reg >> 1) as usize];
                if reg & 0x01 == 0 {
                    sprite.config.x = (sprite.config.x & 0xff00) | u16::from(value);
                    sprite.config.x_screen = BorderUnit::map_sprite_to_screen(sprite.config.x);
                } else {
                    sprite.config.y = value;
                }
            }
            0x10 => {
                for (n, sprite) in self.sprites.iter_mut().enumerate() {
                    sprite.config.x.set_bit(8, value.get_bit(n));
                    sprite.config.x_screen = BorderUnit::map_sprite_to_screen(sprite.config.x);
                }
            }
            reg::CR1 => {
                self.raster_compare.set_bit(8, value.get_bit(7));
                let mut mode = self.gfx_seq.config.mode.value();
                mode.set_bit(2, value.get_bit(6));
                mode.set_bit(1, value.get_bit(5));
                self.gfx_seq.config.mode = Mode::from(mode);
                self.den = value.get_bit(4);
                self.border_unit.config.rsel = value.get_bit(3);
                self.y_scroll = value & 0x07;
            }
            reg::RASTER => {
                self.raster_compare = (self.raster_compare & 0xff00) | u16::from(value);
            }
            reg::LPX => self.light_pen_pos[0] = value,
            reg::LPY => self.light_pen_pos[1] = value,
            reg::ME => {
                for (n, sprite) in self.sprites.iter_mut().enumerate() {
                    sprite.config.enabled = value.get_bit(n);
                }
            }
            reg::CR2 => {
                let mut mode = self.gfx_seq.config.mode.value();
                mode.set_bit(0, value.get_bit(4));
                self.gfx_seq.config.mode = Mode::from(mode);
                self.border_unit.config.csel = value.get_bit(3);
                self.x_scroll = value & 0x07;
            }
            reg::MYE => {
                for (n, sprite) in self.sprites.iter_mut().enumerate() {
                    sprite.config.expand_y = value.get_bit(n);
                    if !sprite.config.expand_y {
                        sprite.expansion_ff = true;
                    }
                }
            }
            reg::MEMPTR => {
                self.mem_ptr_vm = u16::from(value & 0xf0) << 6;
                self.mem_ptr_cb = u16::from(value & 0x0e) << 10;
            }
            reg::IRR => {
                // writing a 1 acknowledges the interrupt condition
                self.irq_control.clear_events(value & 0x0f);
                self.update_irq_line();
            }
            reg::IMR => {
                self.irq_control.set_mask(value & 0x0f);
                self.update_irq_line();
            }
            reg::MDP => {
                for n in 0..8 {
                    self.mux_unit.config.data_priority[n] = value.get_bit(n);
                    self.sprites[n].config.data_priority = value.get_bit(n);
                }
            }
            reg::MMC => {
                for (n, sprite) in self.sprites.iter_mut().enumerate() {
                    sprite.config.mode = if value.get_bit(n) {
                        sprite_sequencer::Mode::Multicolor
                    } else {
                        sprite_sequencer::Mode::Standard
                    };
                }
            }
            reg::MXE => {
                for (n, sprite) in self.sprites.iter_mut().enumerate() {
                    sprite.config.expand_x = value.get_bit(n);
                }
            }
            reg::MM => {}
            reg::MD => {}
            reg::EC => self.border_unit.config.border_color = value & 0x0f,
            0x21..=0x24 => {
                self.gfx_seq.config.bg_color[(reg - 0x21) as usize] = value & 0x0f;
            }
            reg::MM0 => {
                for sprite in self.sprites.iter_mut() {
                    sprite.config.multicolor[0] = value & 0x0f;
                }
            }
            reg::MM1 => {
                for sprite in self.sprites.iter_mut() {
                    sprite.config.multicolor[1] = value & 0x0f;
                }
            }
            0x27..=0x2e => {
                self.sprites[(reg - 0x27) as usize].config.color = value & 0x0f;
            }
            0x2f..=0x3f => {}
            _ => panic!("invalid reg {}", reg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::VicModel;
    use crate::util::{new_shared, new_shared_cell, IrqLine, Rom};

    struct NullVideo;

    impl VideoOutput for NullVideo {
        fn get_dimension(&self) -> (usize, usize) {
            (0, 0)
        }
        fn reset(&mut self) {}
        fn write(&mut self, _index: usize, _color: u8) {}
    }

    fn setup_vic() -> Vic {
        let ba_line = new_shared(Pin::new_high());
        let irq_line = new_shared(IrqLine::new("irq"));
        let lp_pin = new_shared(Pin::new_high());
        let charset = new_shared(Rom::new(0x1000, 0x1000, 0x00));
        let ram = new_shared(Ram::new(0x10000));
        let color_ram = new_shared(Ram::new(1024));
        let base_address = new_shared_cell(0u16);
        let mem = VicMemory::new(base_address, charset, ram);
        let frame_buffer = new_shared(NullVideo {});
        let vsync_flag = new_shared_cell(false);
        let phi1_data = new_shared_cell(0u8);
        let mut vic = Vic::new(
            VicModel::Mos6569,
            color_ram,
            mem,
            frame_buffer,
            vsync_flag,
            phi1_data,
            ba_line,
            irq_line,
            lp_pin,
        );
        vic.reset();
        vic
    }

    fn clock_line(vic: &mut Vic) {
        for _ in 0..63 {
            vic.clock();
        }
    }

    #[test]
    fn raster_reg_reflects_current_line() {
        let mut vic = setup_vic();
        assert_eq!(0x00, vic.read(reg::RASTER));
        clock_line(&mut vic);
        assert_eq!(0x01, vic.read(reg::RASTER));
        for _ in 0..255 {
            clock_line(&mut vic);
        }
        assert_eq!(0x00, vic.read(reg::RASTER));
        assert_eq!(true, vic.read(reg::CR1).get_bit(7));
    }

    #[test]
    fn raster_irq_fires_at_cycle_1_of_compare_line() {
        let mut vic = setup_vic();
        vic.write(reg::IMR, 0x01);
        vic.write(reg::RASTER, 0x02);
        clock_line(&mut vic);
        clock_line(&mut vic);
        assert_eq!(false, vic.irq_line.borrow().is_low());
        vic.clock(); // cycle 1 of line 2
        assert_eq!(true, vic.irq_line.borrow().is_low());
        assert_eq!(0x81, vic.read(reg::IRR) & 0x81);
    }

    #[test]
    fn raster_irq_ack_releases_line() {
        let mut vic = setup_vic();
        vic.write(reg::IMR, 0x01);
        vic.write(reg::RASTER, 0x01);
        clock_line(&mut vic);
        vic.clock();
        assert_eq!(true, vic.irq_line.borrow().is_low());
        vic.write(reg::IRR, 0x01);
        assert_eq!(false, vic.irq_line.borrow().is_low());
    }

    #[test]
    fn bad_line_pulls_ba_low_for_display_fetch() {
        let mut vic = setup_vic();
        // den set at raster 0x30, yscroll 3 => bad line at 0x33
        for _ in 0..0x33 {
            clock_line(&mut vic);
        }
        // advance into the display fetch window
        for _ in 0..13 {
            vic.clock();
        }
        assert_eq!(true, vic.ba_line.borrow().is_low());
        for _ in 13..55 {
            vic.clock();
        }
        assert_eq!(false, vic.ba_line.borrow().is_low());
    }

    #[test]
    fn vsync_flag_raised_at_frame_end() {
        let mut vic = setup_vic();
        for _ in 0..312 {
            clock_line(&mut vic);
        }
        assert_eq!(true, vic.vsync_flag.get());
    }
}
