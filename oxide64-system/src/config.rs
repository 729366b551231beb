// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use oxide64_core::device::joystick;
use oxide64_core::factory::SystemModel;

pub struct Config {
    pub model: SystemModel,
    pub joystick: JoystickConfig,
    pub sound: SoundConfig,
    pub roms: RomData,
    pub drive_count: usize,
}

impl Config {
    pub fn new(model: SystemModel) -> Config {
        Config {
            model,
            joystick: JoystickConfig::default(),
            sound: SoundConfig::default(),
            roms: RomData::default(),
            drive_count: 1,
        }
    }

    pub fn new_with_roms(
        model: SystemModel,
        basic: &[u8],
        charset: &[u8],
        kernal: &[u8],
    ) -> Config {
        Config {
            model,
            joystick: JoystickConfig::default(),
            sound: SoundConfig::default(),
            roms: RomData::new(basic, charset, kernal),
            drive_count: 1,
        }
    }

    /// Startup is refused when one of the system ROMs is missing.
    pub fn is_ready(&self) -> Result<(), String> {
        if !self.roms.basic_present {
            return Err("Basic ROM is not installed".to_string());
        }
        if !self.roms.charset_present {
            return Err("Character ROM is not installed".to_string());
        }
        if !self.roms.kernal_present {
            return Err("Kernal ROM is not installed".to_string());
        }
        Ok(())
    }
}

pub struct JoystickConfig {
    pub axis_motion_threshold: i16,
    pub joystick_1: joystick::Mode,
    pub joystick_2: joystick::Mode,
}

impl Default for JoystickConfig {
    fn default() -> JoystickConfig {
        JoystickConfig {
            axis_motion_threshold: 3200,
            joystick_1: joystick::Mode::Virtual,
            joystick_2: joystick::Mode::None,
        }
    }
}

pub struct RomData {
    pub basic: Vec<u8>,
    pub charset: Vec<u8>,
    pub kernal: Vec<u8>,
    pub d1541: Option<Vec<u8>>,
    basic_present: bool,
    charset_present: bool,
    kernal_present: bool,
}

impl Default for RomData {
    fn default() -> Self {
        RomData {
            basic: vec![0x00; 0x2000],
            charset: vec![0x00; 0x1000],
            kernal: vec![0x00; 0x2000],
            d1541: None,
            basic_present: false,
            charset_present: false,
            kernal_present: false,
        }
    }
}

impl RomData {
    pub fn new(basic: &[u8], charset: &[u8], kernal: &[u8]) -> Self {
        RomData {
            basic: basic.to_vec(),
            charset: charset.to_vec(),
            kernal: kernal.to_vec(),
            d1541: None,
            basic_present: true,
            charset_present: true,
            kernal_present: true,
        }
    }

    pub fn set_basic(&mut self, data: &[u8]) {
        self.basic = data.to_vec();
        self.basic_present = true;
    }

    pub fn set_charset(&mut self, data: &[u8]) {
        self.charset = data.to_vec();
        self.charset_present = true;
    }

    pub fn set_kernal(&mut self, data: &[u8]) {
        self.kernal = data.to_vec();
        self.kernal_present = true;
    }

    /// The memory unit synthesizes fallback interrupt vectors while no
    /// Kernal image is installed.
    pub fn is_kernal_loaded(&self) -> bool {
        self.kernal_present
    }

    pub fn set_d1541(&mut self, data: &[u8]) {
        self.d1541 = Some(data.to_vec());
    }
}

pub struct SoundConfig {
    pub enable: bool,
    pub buffer_size: usize,
    pub sample_rate: u32,
    pub sid_filters: bool,
}

impl Default for SoundConfig {
    fn default() -> SoundConfig {
        SoundConfig {
            enable: true,
            buffer_size: 2048,
            sample_rate: 44100,
            sid_filters: true,
        }
    }
}
