// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;

use crate::util::{Clock, IrqLine, Shared};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/CRT.TXT
// Design:
//   The base cartridge owns up to 64 chip packets and a derived ROML/ROMH
//   window mapping (chip_l/chip_h with offset and mapped byte count). Each
//   hardware family contributes a small state machine reacting to I/O
//   accesses; family specific state lives in the HwState variant.

/// NMI source bit used by freezer cartridges.
pub const NMI_SOURCE: usize = 3;

pub enum ChipType {
    Rom,
    Ram,
    FlashRom,
}

impl ChipType {
    pub fn from(chip_type: u16) -> ChipType {
        match chip_type {
            0x00 => ChipType::Rom,
            0x01 => ChipType::Ram,
            0x02 => ChipType::FlashRom,
            _ => panic!("invalid chip type {}", chip_type),
        }
    }
}

pub struct Chip {
    pub chip_type: ChipType,
    pub bank_number: u8,
    pub offset: u16,
    pub size: u16,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HwType {
    Normal,
    ActionReplay,
    KcsPower,
    FinalIII,
    SimonsBasic,
    Ocean,
    Funplay,
    SuperGames,
    AtomicPower,
    EpyxFastload,
    Westermann,
    Rex,
    Zaxxon,
    MagicDesk,
    Comal80,
    StarDos,
    ActionReplay3,
    GeoRam,
}

impl HwType {
    pub fn from(value: u16) -> Result<HwType, String> {
        match value {
            0 => Ok(HwType::Normal),
            1 => Ok(HwType::ActionReplay),
            2 => Ok(HwType::KcsPower),
            3 => Ok(HwType::FinalIII),
            4 => Ok(HwType::SimonsBasic),
            5 => Ok(HwType::Ocean),
            7 => Ok(HwType::Funplay),
            8 => Ok(HwType::SuperGames),
            9 => Ok(HwType::AtomicPower),
            10 => Ok(HwType::EpyxFastload),
            11 => Ok(HwType::Westermann),
            12 => Ok(HwType::Rex),
            18 => Ok(HwType::Zaxxon),
            19 => Ok(HwType::MagicDesk),
            21 => Ok(HwType::Comal80),
            31 => Ok(HwType::StarDos),
            35 => Ok(HwType::ActionReplay3),
            60 => Ok(HwType::GeoRam),
            _ => Err(format!("unsupported cartridge type {}", value)),
        }
    }

    /// 16K configurations where one 8K chip serves both the ROML and ROMH
    /// window.
    fn is_mirrored(self) -> bool {
        match self {
            HwType::Ocean => true,
            _ => false,
        }
    }
}

#[derive(Copy, Clone)]
pub enum Button {
    Freeze,
    Reset,
}

/// GAME/EXROM line levels as seen by the PLA; true means the line is high
/// (inactive).
pub struct IoConfig {
    pub exrom: bool,
    pub game: bool,
}

/// Family specific runtime state.
#[derive(Clone, Copy)]
enum HwState {
    None,
    ActionReplay {
        control: u8,
        ram_enabled: bool,
    },
    EpyxFastload {
        discharge_cycle: u64,
    },
    StarDos {
        voltage: u64,
        voltage_update_cycle: u64,
    },
    GeoRam {
        page: u8,
        block: u8,
    },
    SuperGames {
        latched: bool,
    },
    FinalIII {
        locked: bool,
    },
}

pub struct Cartridge {
    pub hw_type: HwType,
    initial_exrom: bool,
    initial_game: bool,
    chips: Vec<Option<Chip>>,
    ram: Vec<u8>,
    persistent_ram: bool,
    // Derived mapping
    chip_l: Option<usize>,
    chip_h: Option<usize>,
    offset_l: u16,
    offset_h: u16,
    mapped_bytes_l: u16,
    mapped_bytes_h: u16,
    // Runtime State
    hw_state: HwState,
    io_config: IoConfig,
    reg_value: u8,
    // I/O
    io_observer: Option<Box<dyn Fn(&IoConfig)>>,
    nmi_line: Option<Shared<IrqLine>>,
    clock: Option<Rc<Clock>>,
}

impl Cartridge {
    pub fn new(hw_type: HwType, exrom: bool, game: bool) -> Self {
        let mut chips = Vec::with_capacity(64);
        for _ in 0..64 {
            chips.push(None);
        }
        let ram = match hw_type {
            HwType::ActionReplay | HwType::AtomicPower => vec![0u8; 0x2000],
            HwType::KcsPower => vec![0u8; 0x0080],
            HwType::GeoRam => vec![0u8; 512 * 1024],
            _ => Vec::new(),
        };
        Self {
            hw_type,
            initial_exrom: exrom,
            initial_game: game,
            chips,
            ram,
            persistent_ram: false,
            chip_l: None,
            chip_h: None,
            offset_l: 0,
            offset_h: 0,
            mapped_bytes_l: 0,
            mapped_bytes_h: 0,
            hw_state: Self::initial_hw_state(hw_type),
            io_config: IoConfig {
                exrom: true,
                game: true,
            },
            reg_value: 0,
            io_observer: None,
            nmi_line: None,
            clock: None,
        }
    }

    fn initial_hw_state(hw_type: HwType) -> HwState {
        match hw_type {
            HwType::ActionReplay | HwType::AtomicPower | HwType::ActionReplay3 => {
                HwState::ActionReplay {
                    control: 0,
                    ram_enabled: false,
                }
            }
            HwType::EpyxFastload => HwState::EpyxFastload { discharge_cycle: 0 },
            HwType::StarDos => HwState::StarDos {
                voltage: 0,
                voltage_update_cycle: 0,
            },
            HwType::GeoRam => HwState::GeoRam { page: 0, block: 0 },
            HwType::SuperGames => HwState::SuperGames { latched: false },
            HwType::FinalIII => HwState::FinalIII { locked: false },
            _ => HwState::None,
        }
    }

    pub fn add(&mut self, chip: Chip) {
        let bank_num = chip.bank_number as usize;
        assert!(bank_num < 64);
        self.chips[bank_num] = Some(chip);
    }

    pub fn set_io_observer(&mut self, observer: Option<Box<dyn Fn(&IoConfig)>>) {
        self.io_observer = observer;
    }

    pub fn connect(&mut self, nmi_line: Shared<IrqLine>, clock: Rc<Clock>) {
        self.nmi_line = Some(nmi_line);
        self.clock = Some(clock);
    }

    pub fn disconnect(&mut self) {
        if let Some(ref nmi) = self.nmi_line {
            nmi.borrow_mut().set_low(NMI_SOURCE, false);
        }
        self.nmi_line = None;
        self.clock = None;
        self.io_observer = None;
    }

    pub fn reset(&mut self) {
        if !self.persistent_ram {
            for byte in self.ram.iter_mut() {
                *byte = 0;
            }
        }
        self.chip_l = None;
        self.chip_h = None;
        self.offset_l = 0;
        self.offset_h = 0;
        self.mapped_bytes_l = 0;
        self.mapped_bytes_h = 0;
        self.hw_state = Self::initial_hw_state(self.hw_type);
        self.io_config = IoConfig {
            exrom: self.initial_exrom,
            game: self.initial_game,
        };
        self.reg_value = 0;
        match self.hw_type {
            HwType::StarDos => {
                // The capacitor is empty after power on; ROML stays off
                // until the loader hammers IO1.
                self.io_config.exrom = true;
            }
            HwType::EpyxFastload => {
                self.io_config.exrom = false;
                self.io_config.game = true;
                self.recharge_capacitor();
            }
            HwType::Westermann => {
                self.io_config.exrom = false;
                self.io_config.game = false;
            }
            _ => {}
        }
        self.bank_in(0);
        if let Some(ref nmi) = self.nmi_line {
            nmi.borrow_mut().set_low(NMI_SOURCE, false);
        }
        self.notify_io_changed();
    }

    fn notify_io_changed(&self) {
        if let Some(ref observer) = self.io_observer {
            observer(&self.io_config);
        }
    }

    fn set_lines(&mut self, exrom: bool, game: bool) {
        self.io_config.exrom = exrom;
        self.io_config.game = game;
        self.notify_io_changed();
    }

    fn current_cycle(&self) -> u64 {
        self.clock.as_ref().map_or(0, |clock| clock.get())
    }

    fn pull_nmi(&mut self, active: bool) {
        if let Some(ref nmi) = self.nmi_line {
            nmi.borrow_mut().set_low(NMI_SOURCE, active);
        }
    }

    // -- Chip window mapping

    fn maps_to_l(&self, nr: usize) -> bool {
        match self.chips[nr] {
            Some(ref chip) => chip.offset == 0x8000 && chip.size <= 0x2000,
            None => false,
        }
    }

    fn maps_to_lh(&self, nr: usize) -> bool {
        match self.chips[nr] {
            Some(ref chip) => chip.offset == 0x8000 && chip.size > 0x2000,
            None => false,
        }
    }

    fn maps_to_h(&self, nr: usize) -> bool {
        match self.chips[nr] {
            Some(ref chip) => chip.offset == 0xa000 || chip.offset == 0xe000,
            None => false,
        }
    }

    /// Maps chip `nr` into the ROML/ROMH windows.
    pub fn bank_in(&mut self, nr: usize) {
        assert!(nr < 64);
        if self.chips[nr].is_none() {
            return;
        }
        let size = self.chips[nr].as_ref().map_or(0, |chip| chip.size);
        if self.maps_to_lh(nr) {
            // The ROM chip covers ROML and (part of) ROMH
            self.chip_l = Some(nr);
            self.mapped_bytes_l = 0x2000;
            self.offset_l = 0;
            self.chip_h = Some(nr);
            self.mapped_bytes_h = size - 0x2000;
            self.offset_h = 0x2000;
        } else if self.maps_to_l(nr) {
            self.chip_l = Some(nr);
            self.mapped_bytes_l = 0x2000;
            self.offset_l = 0;
            if self.hw_type.is_mirrored() && !self.initial_game {
                self.chip_h = Some(nr);
                self.mapped_bytes_h = 0x2000;
                self.offset_h = 0;
            }
        } else if self.maps_to_h(nr) {
            self.chip_h = Some(nr);
            self.mapped_bytes_h = size;
            self.offset_h = 0;
        } else {
            warn!(target: "cart", "Cannot map chip {}, invalid start address", nr);
        }
    }

    /// Clears the window mapping of chip `nr`.
    pub fn bank_out(&mut self, nr: usize) {
        assert!(nr < 64);
        if self.maps_to_l(nr) || self.maps_to_lh(nr) {
            self.chip_l = None;
            self.mapped_bytes_l = 0;
            self.offset_l = 0;
        }
        if self.maps_to_h(nr) || self.maps_to_lh(nr) {
            self.chip_h = None;
            self.mapped_bytes_h = 0;
            self.offset_h = 0;
        }
    }

    fn chip_read(&self, nr: usize, offset: u16, addr: u16) -> u8 {
        let chip = self.chips[nr].as_ref().unwrap();
        let index = (usize::from(addr) + usize::from(offset)) % chip.data.len();
        chip.data[index]
    }

    // -- ROML/ROMH accesses

    pub fn read_rom_l(&mut self, addr: u16) -> Option<u8> {
        match self.hw_type {
            HwType::Zaxxon => {
                // Reading the low or high half of ROML selects the ROMH
                // bank; this is how the game flips between level banks.
                if addr < 0x1000 {
                    self.bank_in_h(1);
                } else {
                    self.bank_in_h(2);
                }
            }
            HwType::EpyxFastload => {
                self.recharge_capacitor();
            }
            _ => {}
        }
        if let HwState::ActionReplay { ram_enabled, .. } = self.hw_state {
            if ram_enabled && !self.ram.is_empty() {
                return Some(self.ram[usize::from(addr) & 0x1fff]);
            }
        }
        if let Some(nr) = self.chip_l {
            if addr < self.mapped_bytes_l {
                return Some(self.chip_read(nr, self.offset_l, addr));
            }
        }
        None
    }

    pub fn read_rom_h(&mut self, addr: u16) -> Option<u8> {
        if self.hw_type == HwType::AtomicPower && self.atomic_power_ram_at_h() {
            return Some(self.ram[usize::from(addr) & 0x1fff]);
        }
        if let Some(nr) = self.chip_h {
            if addr < self.mapped_bytes_h {
                return Some(self.chip_read(nr, self.offset_h, addr));
            }
        }
        None
    }

    pub fn write_rom_l(&mut self, addr: u16, value: u8) {
        if let HwState::ActionReplay { ram_enabled, .. } = self.hw_state {
            if ram_enabled && !self.ram.is_empty() {
                self.ram[usize::from(addr) & 0x1fff] = value;
            }
        }
    }

    pub fn write_rom_h(&mut self, addr: u16, value: u8) {
        if self.hw_type == HwType::AtomicPower && self.atomic_power_ram_at_h() {
            self.ram[usize::from(addr) & 0x1fff] = value;
        }
    }

    fn bank_in_h(&mut self, nr: usize) {
        if self.chips[nr].is_some() {
            let size = self.chips[nr].as_ref().map_or(0, |chip| chip.size);
            self.chip_h = Some(nr);
            self.mapped_bytes_h = size;
            self.offset_h = 0;
        }
    }

    /* In contrast to the Action Replay cartridge, Atomic Power can map the
     * on-board RAM to the ROMH area at $A000 - $BFFF with control bits
     * 0b00100010. */
    fn atomic_power_ram_at_h(&self) -> bool {
        match self.hw_state {
            HwState::ActionReplay { control, .. } => (control & 0b1110_0111) == 0b0010_0010,
            _ => false,
        }
    }

    // -- I/O window accesses

    pub fn read_io1(&mut self, addr: u16) -> Option<u8> {
        match self.hw_type {
            HwType::EpyxFastload => {
                self.recharge_capacitor();
                None
            }
            HwType::KcsPower => {
                self.set_lines(false, false);
                Some(self.reg_value)
            }
            HwType::SimonsBasic => {
                self.set_lines(self.initial_exrom, true);
                Some(self.reg_value)
            }
            HwType::StarDos => {
                self.stardos_charge();
                Some(0)
            }
            HwType::FinalIII => {
                // IO1 is a window into the last bank quarter at $1E00
                self.chip_l
                    .map(|nr| self.chip_read(nr, self.offset_l, 0x1e00 | (addr & 0xff)))
            }
            HwType::GeoRam => {
                let index = self.geo_ram_index(addr);
                Some(self.ram[index])
            }
            _ => Some(self.reg_value),
        }
    }

    pub fn read_io2(&mut self, addr: u16) -> Option<u8> {
        match self.hw_type {
            HwType::ActionReplay | HwType::AtomicPower => {
                let offset = usize::from(addr & 0xff);
                let ram_enabled = match self.hw_state {
                    HwState::ActionReplay { ram_enabled, .. } => ram_enabled,
                    _ => false,
                };
                if ram_enabled {
                    Some(self.ram[0x1f00 + offset])
                } else {
                    self.chip_l
                        .map(|nr| self.chip_read(nr, self.offset_l, 0x1f00 | (addr & 0xff)))
                }
            }
            HwType::EpyxFastload | HwType::FinalIII => self
                .chip_l
                .map(|nr| self.chip_read(nr, self.offset_l, 0x1f00 | (addr & 0xff))),
            HwType::KcsPower => {
                if !self.ram.is_empty() {
                    Some(self.ram[usize::from(addr & 0x7f)])
                } else {
                    Some(self.reg_value)
                }
            }
            HwType::Westermann => {
                self.set_lines(self.io_config.exrom, true);
                Some(self.reg_value)
            }
            HwType::Rex => {
                if addr & 0xc0 == 0xc0 {
                    self.set_lines(false, self.io_config.game);
                } else {
                    self.set_lines(true, self.io_config.game);
                }
                Some(0)
            }
            HwType::StarDos => {
                self.stardos_discharge();
                Some(0)
            }
            _ => Some(self.reg_value),
        }
    }

    pub fn write_io1(&mut self, addr: u16, value: u8) {
        self.reg_value = value;
        match self.hw_type {
            HwType::Normal => {
                self.bank_in(usize::from(value & 0x3f));
            }
            HwType::ActionReplay | HwType::AtomicPower => {
                self.action_replay_control(value);
            }
            HwType::ActionReplay3 => {
                self.action_replay3_control(value);
            }
            HwType::KcsPower => {
                self.set_lines(true, true);
            }
            HwType::SimonsBasic => {
                // 16K mode with the extension ROM banked in
                self.set_lines(self.initial_exrom, false);
            }
            HwType::Ocean => {
                self.bank_in(usize::from(value & 0x3f));
            }
            HwType::Funplay => {
                if value == 0x86 {
                    self.set_lines(true, self.io_config.game);
                } else {
                    let bank = ((value >> 3) & 0x07) | ((value & 0x01) << 3);
                    self.bank_in(usize::from(bank));
                }
            }
            HwType::MagicDesk => {
                if value & 0x80 != 0 {
                    self.set_lines(true, true);
                } else {
                    self.bank_in(usize::from(value & 0x3f));
                    self.set_lines(false, true);
                }
            }
            HwType::Comal80 => {
                if value & 0x80 != 0 {
                    self.bank_in(usize::from(value & 0x03));
                    self.set_lines(false, false);
                } else {
                    self.set_lines(true, true);
                }
            }
            HwType::StarDos => {
                self.stardos_charge();
            }
            HwType::GeoRam => {
                let index = self.geo_ram_index(addr);
                self.ram[index] = value;
            }
            _ => {}
        }
    }

    pub fn write_io2(&mut self, addr: u16, value: u8) {
        self.reg_value = value;
        match self.hw_type {
            HwType::ActionReplay | HwType::AtomicPower => {
                let ram_enabled = match self.hw_state {
                    HwState::ActionReplay { ram_enabled, .. } => ram_enabled,
                    _ => false,
                };
                if ram_enabled {
                    self.ram[0x1f00 + usize::from(addr & 0xff)] = value;
                }
            }
            HwType::KcsPower => {
                if !self.ram.is_empty() {
                    self.ram[usize::from(addr & 0x7f)] = value;
                }
            }
            HwType::SuperGames => {
                let latched = match self.hw_state {
                    HwState::SuperGames { latched } => latched,
                    _ => false,
                };
                if !latched {
                    self.bank_in(usize::from(value & 0x03));
                    if value & 0x04 == 0 {
                        self.set_lines(false, false);
                    } else {
                        self.set_lines(true, true);
                    }
                    if value & 0x08 != 0 {
                        self.hw_state = HwState::SuperGames { latched: true };
                    }
                }
            }
            HwType::FinalIII => {
                if addr == 0xdfff {
                    self.final3_control(value);
                }
            }
            HwType::StarDos => {
                self.stardos_discharge();
            }
            HwType::GeoRam => match addr {
                0xdffe => {
                    if let HwState::GeoRam { block, .. } = self.hw_state {
                        self.hw_state = HwState::GeoRam {
                            page: value & 0x3f,
                            block,
                        };
                    }
                }
                0xdfff => {
                    if let HwState::GeoRam { page, .. } = self.hw_state {
                        self.hw_state = HwState::GeoRam {
                            page,
                            block: value & 0x1f,
                        };
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    // -- Family state machines

    /* Action Replay control register:
     *   bit 0: GAME line (1 pulls the line low)
     *   bit 1: EXROM line (1 releases the line)
     *   bit 2: disable cartridge
     *   bits 3-4: ROM bank
     *   bit 5: RAM at ROML
     *   bit 6: reset freeze mode
     */
    fn action_replay_control(&mut self, value: u8) {
        let disabled = value & 0x04 != 0;
        let bank = usize::from((value >> 3) & 0x03);
        let ram_enabled = value & 0x20 != 0;
        self.hw_state = HwState::ActionReplay {
            control: value,
            ram_enabled,
        };
        if disabled {
            self.set_lines(true, true);
        } else {
            self.bank_in(bank);
            self.set_lines(value & 0x02 != 0, value & 0x01 == 0);
        }
        if value & 0x40 != 0 {
            self.pull_nmi(false);
        }
    }

    /* Action Replay 3 control register:
     *   bit 0: ROM bank
     *   bit 1: GAME line level
     *   bit 2: disable cartridge
     *   bit 3: EXROM line (1 pulls the line low)
     */
    fn action_replay3_control(&mut self, value: u8) {
        let disabled = value & 0x04 != 0;
        self.hw_state = HwState::ActionReplay {
            control: value,
            ram_enabled: false,
        };
        if disabled {
            self.set_lines(true, true);
            self.pull_nmi(false);
        } else {
            self.bank_in(usize::from(value & 0x01));
            self.set_lines(value & 0x08 == 0, value & 0x02 != 0);
        }
    }

    /* Final Cartridge III control register at $DFFF:
     *   bits 0-1: ROM bank
     *   bit 4: EXROM line level
     *   bit 5: GAME line level
     *   bit 6: NMI line (0 pulls the line low)
     *   bit 7: lock the register
     */
    fn final3_control(&mut self, value: u8) {
        let locked = match self.hw_state {
            HwState::FinalIII { locked } => locked,
            _ => false,
        };
        if locked {
            return;
        }
        self.bank_in(usize::from(value & 0x03));
        self.set_lines(value & 0x10 != 0, value & 0x20 != 0);
        self.pull_nmi(value & 0x40 == 0);
        self.hw_state = HwState::FinalIII {
            locked: value & 0x80 != 0,
        };
    }

    fn geo_ram_index(&self, addr: u16) -> usize {
        match self.hw_state {
            HwState::GeoRam { page, block } => {
                let window = usize::from(block) * 16384 + usize::from(page) * 256;
                (window + usize::from(addr & 0xff)) % self.ram.len()
            }
            _ => 0,
        }
    }

    // -- StarDos capacitor
    //
    // A real capacitor charges on IO1 accesses and discharges on IO2
    // accesses. Voltage is tracked in microvolts; untouched, it drifts
    // toward 2.0V at 2 uV per cycle. ROML switches on above 2.7V and off
    // below 1.4V.

    fn stardos_update_voltage(&mut self) {
        let cycle = self.current_cycle();
        if let HwState::StarDos {
            voltage,
            voltage_update_cycle,
        } = self.hw_state
        {
            let mut voltage = voltage;
            if voltage < 2_000_000 {
                let elapsed = cycle.saturating_sub(voltage_update_cycle);
                voltage += u64::min(2_000_000 - voltage, elapsed * 2);
            }
            self.hw_state = HwState::StarDos {
                voltage,
                voltage_update_cycle: cycle,
            };
        }
    }

    fn stardos_charge(&mut self) {
        self.stardos_update_voltage();
        if let HwState::StarDos {
            voltage,
            voltage_update_cycle,
        } = self.hw_state
        {
            let voltage = voltage + u64::min(5_000_000 - voltage, 78_125);
            self.hw_state = HwState::StarDos {
                voltage,
                voltage_update_cycle,
            };
            if voltage > 2_700_000 {
                self.set_lines(false, self.io_config.game);
            }
        }
    }

    fn stardos_discharge(&mut self) {
        self.stardos_update_voltage();
        if let HwState::StarDos {
            voltage,
            voltage_update_cycle,
        } = self.hw_state
        {
            let voltage = voltage - u64::min(voltage, 78_125);
            self.hw_state = HwState::StarDos {
                voltage,
                voltage_update_cycle,
            };
            if voltage < 1_400_000 {
                self.set_lines(true, self.io_config.game);
            }
        }
    }

    // -- Epyx capacitor

    fn recharge_capacitor(&mut self) {
        let cycle = self.current_cycle();
        if let HwState::EpyxFastload { .. } = self.hw_state {
            self.hw_state = HwState::EpyxFastload {
                discharge_cycle: cycle + 512,
            };
            if self.io_config.exrom {
                self.set_lines(false, true);
            }
        }
    }

    /// Called once per cycle by the expansion port for cartridges with
    /// time dependent hardware.
    pub fn clock(&mut self) {
        if let HwState::EpyxFastload { discharge_cycle } = self.hw_state {
            if !self.io_config.exrom && self.current_cycle() > discharge_cycle {
                self.set_lines(true, true);
            }
        }
    }

    // -- Buttons

    pub fn num_buttons(&self) -> usize {
        match self.hw_type {
            HwType::ActionReplay
            | HwType::ActionReplay3
            | HwType::AtomicPower
            | HwType::KcsPower
            | HwType::FinalIII => 2,
            _ => 0,
        }
    }

    pub fn press_button(&mut self, button: Button) {
        match button {
            Button::Freeze => match self.hw_type {
                HwType::ActionReplay | HwType::AtomicPower => {
                    // Freeze enters ultimax mode with bank 0 at ROMH
                    self.bank_in(0);
                    self.set_lines(true, false);
                    self.pull_nmi(true);
                }
                HwType::ActionReplay3 => {
                    self.bank_in(0);
                    self.set_lines(false, true);
                    self.pull_nmi(true);
                }
                HwType::KcsPower => {
                    self.bank_in(0);
                    self.set_lines(false, false);
                    self.pull_nmi(true);
                }
                HwType::FinalIII => {
                    self.hw_state = HwState::FinalIII { locked: false };
                    self.bank_in(0);
                    self.set_lines(true, false);
                    self.pull_nmi(true);
                }
                _ => {}
            },
            Button::Reset => {
                self.reset();
            }
        }
    }

    pub fn release_button(&mut self, button: Button) {
        if let Button::Freeze = button {
            match self.hw_type {
                HwType::ActionReplay3 | HwType::KcsPower => {
                    self.pull_nmi(false);
                }
                // AR and FC3 release the NMI from software through their
                // control registers
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    fn rom_chip(bank: u8, offset: u16, size: u16, fill: u8) -> Chip {
        Chip {
            chip_type: ChipType::Rom,
            bank_number: bank,
            offset,
            size,
            data: vec![fill; size as usize],
        }
    }

    fn setup_cartridge(hw_type: HwType, exrom: bool, game: bool) -> Cartridge {
        let mut cartridge = Cartridge::new(hw_type, exrom, game);
        cartridge.connect(new_shared(IrqLine::new("nmi")), Rc::new(Clock::new()));
        cartridge
    }

    #[test]
    fn normal_8k_maps_rom_l() {
        let mut cartridge = setup_cartridge(HwType::Normal, false, true);
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0xaa));
        cartridge.reset();
        assert_eq!(Some(0xaa), cartridge.read_rom_l(0x0000));
        assert_eq!(None, cartridge.read_rom_h(0x0000));
    }

    #[test]
    fn sixteen_k_chip_covers_both_windows() {
        let mut cartridge = setup_cartridge(HwType::Normal, false, false);
        cartridge.add(rom_chip(0, 0x8000, 0x4000, 0xbb));
        cartridge.reset();
        assert_eq!(Some(0xbb), cartridge.read_rom_l(0x1fff));
        assert_eq!(Some(0xbb), cartridge.read_rom_h(0x0000));
    }

    #[test]
    fn magic_desk_banks_and_disables() {
        let mut cartridge = setup_cartridge(HwType::MagicDesk, false, true);
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0x11));
        cartridge.add(rom_chip(1, 0x8000, 0x2000, 0x22));
        cartridge.reset();
        assert_eq!(Some(0x11), cartridge.read_rom_l(0x0100));
        cartridge.write_io1(0xde00, 0x01);
        assert_eq!(Some(0x22), cartridge.read_rom_l(0x0100));
        cartridge.write_io1(0xde00, 0x80);
        assert_eq!(true, cartridge.io_config.exrom);
    }

    #[test]
    fn zaxxon_rom_l_read_selects_rom_h_bank() {
        let mut cartridge = setup_cartridge(HwType::Zaxxon, false, false);
        cartridge.add(rom_chip(0, 0x8000, 0x1000, 0x00));
        cartridge.add(rom_chip(1, 0xa000, 0x2000, 0x11));
        cartridge.add(rom_chip(2, 0xa000, 0x2000, 0x22));
        cartridge.reset();
        let _ = cartridge.read_rom_l(0x0000);
        assert_eq!(Some(0x11), cartridge.read_rom_h(0x0000));
        let _ = cartridge.read_rom_l(0x1000);
        assert_eq!(Some(0x22), cartridge.read_rom_h(0x0000));
    }

    #[test]
    fn stardos_io1_charges_capacitor_until_rom_l_enabled() {
        let mut cartridge = setup_cartridge(HwType::StarDos, true, true);
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0x33));
        cartridge.reset();
        assert_eq!(true, cartridge.io_config.exrom);
        for _ in 0..40 {
            cartridge.write_io1(0xde00, 0x00);
        }
        assert_eq!(false, cartridge.io_config.exrom);
    }

    #[test]
    fn stardos_io2_discharges_capacitor() {
        let mut cartridge = setup_cartridge(HwType::StarDos, true, true);
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0x33));
        cartridge.reset();
        for _ in 0..64 {
            cartridge.write_io1(0xde00, 0x00);
        }
        assert_eq!(false, cartridge.io_config.exrom);
        for _ in 0..64 {
            cartridge.write_io2(0xdf00, 0x00);
        }
        assert_eq!(true, cartridge.io_config.exrom);
    }

    #[test]
    fn action_replay_freeze_enters_ultimax_with_nmi() {
        let nmi_line = new_shared(IrqLine::new("nmi"));
        let mut cartridge = Cartridge::new(HwType::ActionReplay, false, true);
        cartridge.connect(nmi_line.clone(), Rc::new(Clock::new()));
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0x44));
        cartridge.reset();
        cartridge.press_button(Button::Freeze);
        assert_eq!(true, nmi_line.borrow().is_low());
        assert_eq!(true, cartridge.io_config.exrom);
        assert_eq!(false, cartridge.io_config.game);
        // software acknowledges freeze mode through the control register
        cartridge.write_io1(0xde00, 0x40);
        assert_eq!(false, nmi_line.borrow().is_low());
    }

    #[test]
    fn geo_ram_pages_through_io2_registers() {
        let mut cartridge = setup_cartridge(HwType::GeoRam, true, true);
        cartridge.reset();
        cartridge.write_io1(0xde00, 0x55);
        cartridge.write_io2(0xdffe, 0x01); // page 1
        cartridge.write_io1(0xde00, 0x66);
        assert_eq!(Some(0x66), cartridge.read_io1(0xde00));
        cartridge.write_io2(0xdffe, 0x00);
        assert_eq!(Some(0x55), cartridge.read_io1(0xde00));
    }

    #[test]
    fn epyx_capacitor_discharges_without_access()  {
        let clock = Rc::new(Clock::new());
        let mut cartridge = Cartridge::new(HwType::EpyxFastload, false, true);
        cartridge.connect(new_shared(IrqLine::new("nmi")), clock.clone());
        cartridge.add(rom_chip(0, 0x8000, 0x2000, 0x77));
        cartridge.reset();
        assert_eq!(false, cartridge.io_config.exrom);
        clock.tick_delta(600);
        cartridge.clock();
        assert_eq!(true, cartridge.io_config.exrom);
    }
}
