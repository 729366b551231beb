// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![cfg_attr(feature = "cargo-clippy", allow(clippy::cast_lossless))]

use std::rc::Rc;
use std::sync::Arc;

use oxide64_core::device::cartridge::Button;
use oxide64_core::device::joystick;
use oxide64_core::device::{Cartridge, Datassette, Joystick, Keyboard};
use oxide64_core::drive::{Disk, Drive, IecBus};
use oxide64_core::factory::*;
use oxide64_core::mem::{ExpansionPort, Pla};
use oxide64_core::util::*;

use super::breakpoint::BreakpointManager;
use super::{Autostart, Config};

// Design:
//   C64 represents the machine itself and all of its components.
//   Connections between components are managed as component dependencies
//   fed into the chip constructors; the per-cycle tick closure drives every
//   chip once for each CPU clock cycle, in a fixed order: VIC first (it may
//   pull BA for the next CPU cycle), then the CIAs, the datassette, the
//   expansion port, the drives and finally the IEC bus resolution.

/// Interrupt source assignments on the shared CPU lines.
pub mod int_source {
    /// IRQ line
    pub const CIA1: usize = 0;
    pub const VIC: usize = 1;
    /// NMI line
    pub const CIA2: usize = 1;
    pub const RESTORE: usize = 2;
}

#[allow(dead_code)]
#[derive(Copy, Clone)]
enum BaseAddr {
    Basic = 0xa000,
    BootComplete = 0xa65c,
    Charset = 0xd000,
    Kernal = 0xe000,
}

impl BaseAddr {
    pub fn addr(self) -> u16 {
        self as u16
    }
}

pub struct C64 {
    // Dependencies
    config: Rc<Config>,
    // Chipset
    cpu: Box<dyn Cpu>,
    cia_1: Shared<dyn Chip>,
    cia_2: Shared<dyn Chip>,
    sid: Shared<dyn Chip>,
    vic: Shared<dyn Chip>,
    // Memory
    color_ram: Shared<Ram>,
    expansion_port: Shared<ExpansionPort>,
    ram: Shared<Ram>,
    // Peripherals
    datassette: Shared<Datassette>,
    drives: Vec<Shared<Drive>>,
    iec_bus: Shared<IecBus>,
    joystick_1: Option<Joystick>,
    joystick_2: Option<Joystick>,
    keyboard: Shared<Keyboard>,
    // I/O
    cpu_io_port: Shared<IoPort>,
    nmi_line: Shared<IrqLine>,
    // Buffers
    frame_buffer: Shared<dyn VideoOutput>,
    sound_buffer: Arc<dyn SoundOutput>,
    // Runtime State
    autostart: Option<Autostart>,
    breakpoints: BreakpointManager,
    clock: Rc<Clock>,
    frame_count: u32,
    tick_fn: TickFn,
    vsync_flag: SharedCell<bool>,
}

impl C64 {
    pub fn build(
        config: Rc<Config>,
        factory: &dyn ChipFactory,
        frame_buffer: Shared<dyn VideoOutput>,
        sound_buffer: Arc<dyn SoundOutput>,
    ) -> C64 {
        info!(target: "c64", "Initializing system");
        // Buffers
        let clock = Rc::new(Clock::default());
        let joystick_1_state = new_shared_cell(0u8);
        let joystick_2_state = new_shared_cell(0u8);
        let keyboard_matrix = new_shared([0xff; 16]);
        let vsync_flag = new_shared_cell(false);
        let vic_base_address = new_shared_cell(0u16);
        let phi1_data = new_shared_cell(0u8);

        // I/O Lines
        let ba_line = new_shared(Pin::new_high());
        let lp_pin = new_shared(Pin::new_high());
        let cpu_io_port = new_shared(IoPort::new(0x00, 0xff));
        let cia_1_flag_pin = new_shared(Pin::new_low());
        let cia_1_port_a = new_shared(IoPort::new(0x00, 0xff));
        let cia_1_port_b = new_shared(IoPort::new(0x00, 0xff));
        let cia_2_flag_pin = new_shared(Pin::new_low());
        let cia_2_port_a = new_shared(IoPort::new(0x00, 0xff));
        let cia_2_port_b = new_shared(IoPort::new(0x00, 0xff));
        let exp_io_line = new_shared(IoPort::new(0xff, 0xff));
        let irq_line = new_shared(IrqLine::new("irq"));
        let nmi_line = new_shared(IrqLine::new("nmi"));

        // Memory
        let color_ram = factory.new_ram(config.model.color_ram);
        let ram = factory.new_ram(config.model.memory_size);
        let rom_basic = factory.new_rom(config.roms.basic.as_slice(), BaseAddr::Basic.addr());
        let rom_charset = factory.new_rom(config.roms.charset.as_slice(), 0);
        let rom_kernal = factory.new_rom(config.roms.kernal.as_slice(), BaseAddr::Kernal.addr());

        // Chipset
        let cia_1 = factory.new_cia_1(
            joystick_1_state.clone(),
            joystick_2_state.clone(),
            keyboard_matrix.clone(),
            cia_1_port_a.clone(),
            cia_1_port_b.clone(),
            cia_1_flag_pin.clone(),
            irq_line.clone(),
        );
        let cia_2 = factory.new_cia_2(
            cia_2_port_a.clone(),
            cia_2_port_b.clone(),
            cia_2_flag_pin.clone(),
            nmi_line.clone(),
        );
        let sid = factory.new_sid(config.model.sid_model, clock.clone(), sound_buffer.clone());
        let vic = factory.new_vic(
            config.model.vic_model,
            color_ram.clone(),
            ram.clone(),
            rom_charset.clone(),
            vic_base_address.clone(),
            frame_buffer.clone(),
            vsync_flag.clone(),
            phi1_data.clone(),
            ba_line.clone(),
            irq_line.clone(),
            lp_pin.clone(),
        );

        // Memory Controller and Processor
        let expansion_port = new_shared(ExpansionPort::new(
            clock.clone(),
            exp_io_line.clone(),
            nmi_line.clone(),
        ));
        let mmu = new_shared(Pla::new());
        let mem = factory.new_memory(
            mmu.clone(),
            cia_1.clone(),
            cia_2.clone(),
            color_ram.clone(),
            cpu_io_port.clone(),
            expansion_port.clone(),
            ram.clone(),
            rom_basic.clone(),
            rom_charset.clone(),
            rom_kernal.clone(),
            sid.clone(),
            vic.clone(),
            phi1_data.clone(),
        );
        let cpu = factory.new_cpu(
            mem.clone(),
            ba_line.clone(),
            irq_line.clone(),
            nmi_line.clone(),
        );

        // Peripherals
        let datassette = new_shared(Datassette::new(cia_1_flag_pin.clone(), cpu_io_port.clone()));
        let mut drives: Vec<Shared<Drive>> = Vec::new();
        if let Some(ref rom) = config.roms.d1541 {
            for unit in 0..config.drive_count.min(2) {
                drives.push(new_shared(Drive::new(8 + unit as u8, rom.as_slice())));
            }
        }
        let iec_bus = new_shared(IecBus::new(cia_2_port_a.clone()));
        for drive in drives.iter() {
            iec_bus.borrow_mut().attach_drive(drive.clone());
        }
        let joystick1 = if config.joystick.joystick_1 != joystick::Mode::None {
            Some(Joystick::new(
                config.joystick.joystick_1,
                config.joystick.axis_motion_threshold,
                joystick_1_state.clone(),
            ))
        } else {
            None
        };
        let joystick2 = if config.joystick.joystick_2 != joystick::Mode::None {
            Some(Joystick::new(
                config.joystick.joystick_2,
                config.joystick.axis_motion_threshold,
                joystick_2_state.clone(),
            ))
        } else {
            None
        };
        let keyboard = new_shared(Keyboard::new(keyboard_matrix.clone()));

        // Observers
        let exp_io_line_clone_1 = exp_io_line.clone();
        let mmu_clone_1 = mmu.clone();
        cpu_io_port
            .borrow_mut()
            .set_observer(Box::new(move |cpu_port| {
                let expansion_port_io = exp_io_line_clone_1.borrow().get_value();
                let mode = cpu_port & 0x07 | expansion_port_io & 0x18;
                mmu_clone_1.borrow_mut().switch_banks(mode);
            }));

        let cpu_io_port_clone_2 = cpu_io_port.clone();
        let mmu_clone_2 = mmu.clone();
        exp_io_line
            .borrow_mut()
            .set_observer(Box::new(move |expansion_port_io| {
                let cpu_port_io = cpu_io_port_clone_2.borrow().get_value();
                let mode = cpu_port_io & 0x07 | expansion_port_io & 0x18;
                mmu_clone_2.borrow_mut().switch_banks(mode);
            }));
        let vic_base_address_clone = vic_base_address.clone();
        cia_2_port_a
            .borrow_mut()
            .set_observer(Box::new(move |value| {
                let base_address = ((!value & 0x03) as u16) << 14;
                vic_base_address_clone.set(base_address);
            }));

        let tick_fn: TickFn = {
            let cia_1_clone = cia_1.clone();
            let cia_2_clone = cia_2.clone();
            let clock_clone = clock.clone();
            let datassette_clone = datassette.clone();
            let expansion_port_clone = expansion_port.clone();
            let vic_clone = vic.clone();
            let drives_clone = drives.clone();
            let iec_bus_clone = iec_bus.clone();
            Rc::new(move || {
                vic_clone.borrow_mut().clock();
                cia_1_clone.borrow_mut().clock();
                cia_2_clone.borrow_mut().clock();
                datassette_clone.borrow_mut().clock();
                expansion_port_clone.borrow_mut().clock();
                for drive in drives_clone.iter() {
                    drive.borrow_mut().clock();
                }
                if !drives_clone.is_empty() {
                    iec_bus_clone.borrow().update();
                }
                clock_clone.tick();
            })
        };
        C64 {
            config,
            cpu,
            cia_1,
            cia_2,
            sid,
            vic,
            color_ram,
            expansion_port,
            ram,
            datassette,
            drives,
            iec_bus,
            joystick_1: joystick1,
            joystick_2: joystick2,
            keyboard,
            cpu_io_port,
            nmi_line,
            frame_buffer,
            sound_buffer,
            autostart: None,
            breakpoints: BreakpointManager::default(),
            clock,
            frame_count: 0,
            tick_fn,
            vsync_flag,
        }
    }

    pub fn get_bpm(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    pub fn get_bpm_mut(&mut self) -> &mut BreakpointManager {
        &mut self.breakpoints
    }

    pub fn get_clock(&self) -> Rc<Clock> {
        self.clock.clone()
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_cpu(&self) -> &dyn Cpu {
        &*self.cpu
    }

    pub fn get_cpu_mut(&mut self) -> &mut dyn Cpu {
        &mut *self.cpu
    }

    pub fn get_cycles(&self) -> u64 {
        self.clock.get()
    }

    pub fn get_cia_1(&self) -> Shared<dyn Chip> {
        self.cia_1.clone()
    }

    pub fn get_cia_2(&self) -> Shared<dyn Chip> {
        self.cia_2.clone()
    }

    pub fn get_datassette(&self) -> Shared<Datassette> {
        self.datassette.clone()
    }

    pub fn get_drive(&self, unit: usize) -> Option<Shared<Drive>> {
        self.drives.get(unit).cloned()
    }

    pub fn get_iec_bus(&self) -> Shared<IecBus> {
        self.iec_bus.clone()
    }

    pub fn get_frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn get_joystick1_mut(&mut self) -> &mut Option<Joystick> {
        &mut self.joystick_1
    }

    pub fn get_joystick2_mut(&mut self) -> &mut Option<Joystick> {
        &mut self.joystick_2
    }

    pub fn get_keyboard(&self) -> Shared<Keyboard> {
        self.keyboard.clone()
    }

    pub fn get_color_ram(&self) -> Shared<Ram> {
        self.color_ram.clone()
    }

    pub fn get_ram(&self) -> Shared<Ram> {
        self.ram.clone()
    }

    pub fn get_sid(&self) -> Shared<dyn Chip> {
        self.sid.clone()
    }

    pub fn get_vic(&self) -> Shared<dyn Chip> {
        self.vic.clone()
    }

    pub fn get_cpu_io_port(&self) -> Shared<IoPort> {
        self.cpu_io_port.clone()
    }

    pub fn get_vsync(&self) -> bool {
        self.vsync_flag.get()
    }

    pub fn is_cpu_jam(&self) -> bool {
        self.cpu.is_jammed()
    }

    pub fn set_autostart(&mut self, autostart: Option<Autostart>) {
        self.autostart = autostart;
    }

    /// The RESTORE key is wired straight to the CPU NMI line.
    pub fn set_restore_key(&mut self, pressed: bool) {
        self.nmi_line
            .borrow_mut()
            .set_low(int_source::RESTORE, pressed);
    }

    pub fn reset_vsync(&self) {
        self.vsync_flag.set(false)
    }

    pub fn check_breakpoints(&mut self) -> bool {
        self.breakpoints.check(&*self.cpu).is_some()
    }

    pub fn load(&mut self, data: &[u8], offset: u16) {
        let mut mem = self.ram.borrow_mut();
        let mut address = offset;
        for byte in data {
            mem.write(address, *byte);
            address = address.wrapping_add(1);
        }
    }

    pub fn reset(&mut self, hard: bool) {
        info!(target: "c64", "Resetting system");
        self.clock.reset();
        // Memory
        if hard {
            for i in 0..self.config.model.memory_size as u32 {
                self.ram.borrow_mut().write(i as u16, 0x00);
            }
            for i in 0..self.config.model.color_ram as u16 {
                self.color_ram.borrow_mut().write(i, 0x00);
            }
        }
        // I/O
        self.cpu_io_port.borrow_mut().reset();
        self.cpu_io_port.borrow_mut().set_direction(0x2f);
        self.cpu_io_port.borrow_mut().set_value(0x1f);
        self.expansion_port.borrow_mut().reset();
        // Chipset
        self.cpu.reset();
        self.cia_1.borrow_mut().reset();
        self.cia_2.borrow_mut().reset();
        self.sid.borrow_mut().reset();
        self.vic.borrow_mut().reset();
        // Peripherals
        self.datassette.borrow_mut().reset();
        for drive in self.drives.iter() {
            let mut drive = drive.borrow_mut();
            drive.reset();
            if hard {
                drive.reset_ram();
            }
        }
        if let Some(ref mut joystick) = self.joystick_1 {
            joystick.reset();
        }
        if let Some(ref mut joystick) = self.joystick_2 {
            joystick.reset();
        }
        self.keyboard.borrow_mut().reset();
        self.frame_buffer.borrow_mut().reset();
        self.sound_buffer.reset();
        // Runtime State
        self.frame_count = 0;
        self.vsync_flag.set(false);
    }

    pub fn run_frame(&mut self) -> bool {
        let tick_fn = self.tick_fn.clone();
        let bp_present = self.breakpoints.is_bp_present();
        while !self.vsync_flag.get() {
            self.step_internal(&tick_fn);
            if self.cpu.is_jammed() {
                break;
            }
            if bp_present && self.check_breakpoints() {
                break;
            }
        }
        if self.vsync_flag.get() {
            self.process_vsync();
        }
        self.vsync_flag.get()
    }

    pub fn step(&mut self) {
        let tick_fn = self.tick_fn.clone();
        self.step_internal(&tick_fn);
        if self.vsync_flag.get() {
            self.process_vsync();
        }
    }

    #[inline]
    pub fn step_internal(&mut self, tick_fn: &TickFn) {
        self.cpu.step(tick_fn);
        if self.autostart.is_some() && self.cpu.get_pc() == BaseAddr::BootComplete.addr() {
            if let Some(mut autostart) = self.autostart.take() {
                autostart.execute(self);
            }
        }
    }

    fn process_vsync(&mut self) {
        self.sid.borrow_mut().process_vsync();
        self.cia_1.borrow_mut().process_vsync();
        self.cia_2.borrow_mut().process_vsync();
        self.keyboard.borrow_mut().drain_event();
        self.frame_count = self.frame_count.wrapping_add(1);
    }

    // -- Peripherals Ops

    pub fn attach_cartridge(&mut self, cartridge: Cartridge) {
        self.expansion_port.borrow_mut().attach(cartridge);
        self.reset(false);
    }

    pub fn detach_cartridge(&mut self) {
        self.expansion_port.borrow_mut().detach();
        self.reset(false);
    }

    pub fn press_cartridge_button(&mut self, button: Button) {
        self.expansion_port.borrow_mut().press_button(button);
    }

    pub fn release_cartridge_button(&mut self, button: Button) {
        self.expansion_port.borrow_mut().release_button(button);
    }

    pub fn attach_tape(&mut self, tape: Box<dyn Tape>) {
        self.datassette.borrow_mut().attach(tape);
    }

    pub fn detach_tape(&mut self) {
        self.datassette.borrow_mut().detach();
    }

    pub fn insert_disk(&mut self, unit: usize, disk: Disk) -> Result<(), String> {
        match self.drives.get(unit) {
            Some(drive) => {
                drive.borrow_mut().insert_disk(disk);
                Ok(())
            }
            None => Err(format!("drive {} is not enabled", unit + 8)),
        }
    }

    pub fn eject_disk(&mut self, unit: usize) -> Result<Option<Disk>, String> {
        match self.drives.get(unit) {
            Some(drive) => Ok(drive.borrow_mut().eject_disk()),
            None => Err(format!("drive {} is not enabled", unit + 8)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::C64Factory;
    use super::*;
    use oxide64_core::factory::SystemModel;

    struct NullSound;
    impl SoundOutput for NullSound {
        fn reset(&self) {}
        fn write(&self, _samples: &[i16]) {}
    }

    struct NullVideo;
    impl VideoOutput for NullVideo {
        fn get_dimension(&self) -> (usize, usize) {
            (0, 0)
        }
        fn reset(&mut self) {}
        fn write(&mut self, _index: usize, _color: u8) {}
    }

    fn build_c64(config: Rc<Config>) -> C64 {
        let factory = Box::new(C64Factory::new(config.clone()));
        let video_output = new_shared(NullVideo {});
        let sound_output = Arc::new(NullSound {});
        C64::build(config, &*factory, video_output, sound_output)
    }

    #[test]
    fn bank_switch_hides_basic_rom() {
        let mut basic = vec![0x00u8; 0x2000];
        basic[0] = 0x94;
        let config = Rc::new(Config::new_with_roms(
            SystemModel::from("pal"),
            &basic,
            &vec![0x01u8; 0x1000],
            &vec![0x02u8; 0x2000],
        ));
        let mut c64 = build_c64(config);
        c64.reset(false);
        assert_eq!(0x94, c64.get_cpu().read(0xa000));
        // clearing LORAM/HIRAM maps RAM under both ROM windows
        c64.get_cpu_mut().write(0x0001, 0x1c);
        assert_eq!(0x00, c64.get_cpu().read(0xa000));
        assert_eq!(0x00, c64.get_cpu().read(0xe000));
        c64.get_cpu_mut().write(0x0001, 0x1f);
        assert_eq!(0x94, c64.get_cpu().read(0xa000));
        assert_eq!(0x02, c64.get_cpu().read(0xe000));
    }

    #[test]
    fn missing_kernal_synthesizes_fallback_vectors() {
        let config = Rc::new(Config::new(SystemModel::from("pal")));
        let mut c64 = build_c64(config);
        c64.reset(false);
        {
            let cpu = c64.get_cpu();
            assert_eq!(0x43, cpu.read(0xfffa));
            assert_eq!(0xfe, cpu.read(0xfffb));
            assert_eq!(0xe2, cpu.read(0xfffc));
            assert_eq!(0xfc, cpu.read(0xfffd));
            assert_eq!(0x48, cpu.read(0xfffe));
            assert_eq!(0xff, cpu.read(0xffff));
        }
        c64.step();
        assert_eq!(0xfce2, c64.get_cpu().get_pc());
    }

    #[test]
    fn fallback_vectors_only_cover_the_kernal_bank() {
        let config = Rc::new(Config::new(SystemModel::from("pal")));
        let mut c64 = build_c64(config);
        c64.reset(false);
        // with HIRAM cleared the vectors come from RAM, not the stubs
        c64.get_cpu_mut().write(0x0001, 0x1d);
        c64.load(&[0x00, 0x80], 0xfffc);
        assert_eq!(0x00, c64.get_cpu().read(0xfffc));
        assert_eq!(0x80, c64.get_cpu().read(0xfffd));
    }

    #[test]
    fn cpu_starts_from_kernal_reset_vector() {
        let mut kernal = vec![0xeau8; 0x2000];
        kernal[0x1ffc] = 0x00;
        kernal[0x1ffd] = 0xe0;
        let config = Rc::new(Config::new_with_roms(
            SystemModel::from("pal"),
            &vec![0x00u8; 0x2000],
            &vec![0x00u8; 0x1000],
            &kernal,
        ));
        let mut c64 = build_c64(config);
        c64.reset(false);
        c64.step();
        let pc = c64.get_cpu().get_pc();
        assert!(pc >= 0xe000, "pc = {:04x}", pc);
    }
}
