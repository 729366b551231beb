// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use oxide64_core::device::joystick;
use oxide64_core::factory::SystemModel;
use oxide64_system::Config;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "oxide64", about = "Commodore 64 emulator")]
pub struct Opt {
    /// attach and autostart image
    #[structopt(parse(from_os_str))]
    pub image: Option<PathBuf>,

    /// set NTSC or PAL variant
    #[structopt(long, default_value = "pal")]
    pub model: String,
    /// run without wall-clock synchronization
    #[structopt(long = "warp")]
    pub warp_mode: bool,
    /// stop after the given number of frames
    #[structopt(long)]
    pub frames: Option<u32>,
    /// number of disk drives
    #[structopt(long, default_value = "1")]
    pub drives: usize,

    // -- Devices
    /// set device for joystick 1
    #[structopt(long = "joydev1", default_value = "numpad", parse(try_from_str = parse_joy_mode))]
    pub joydev_1: joystick::Mode,
    /// set device for joystick 2
    #[structopt(long = "joydev2", default_value = "none", parse(try_from_str = parse_joy_mode))]
    pub joydev_2: joystick::Mode,

    // -- Roms
    /// filename of the basic ROM
    #[structopt(long, parse(from_os_str))]
    pub basic: Option<PathBuf>,
    /// filename of the character generator ROM
    #[structopt(long, parse(from_os_str))]
    pub charset: Option<PathBuf>,
    /// filename of the kernal ROM
    #[structopt(long, parse(from_os_str))]
    pub kernal: Option<PathBuf>,
    /// filename of the 1541 DOS ROM
    #[structopt(long, parse(from_os_str))]
    pub d1541: Option<PathBuf>,

    // -- Sound
    /// disable SID filters
    #[structopt(long = "nosidfilters")]
    pub no_sid_filters: bool,
    /// set sound sample rate in Hz
    #[structopt(long = "sound-rate", default_value = "44100")]
    pub sound_rate: u32,
    /// set sound buffer size in samples
    #[structopt(long = "sound-samples", default_value = "2048")]
    pub sound_samples: usize,

    // -- Snapshots
    /// load a snapshot before running
    #[structopt(long = "load-snapshot", parse(from_os_str))]
    pub load_snapshot: Option<PathBuf>,
    /// save a snapshot when the run ends
    #[structopt(long = "save-snapshot", parse(from_os_str))]
    pub save_snapshot: Option<PathBuf>,

    // -- Debug
    /// set breakpoint at this address
    #[structopt(long)]
    pub bp: Vec<u16>,
    /// enable debug mode
    #[structopt(long)]
    pub debug: bool,
    /// set log level (off, error, warn, info, debug, trace)
    #[structopt(long = "loglevel", default_value = "info")]
    pub log_level: String,
    /// set log level for a target, e.g. cpu::ins=trace
    #[structopt(long = "log")]
    pub log_target_level: Vec<String>,
}

fn parse_joy_mode(mode: &str) -> Result<joystick::Mode, String> {
    match mode {
        "none" | "numpad" | "virtual" | "joy0" | "joy1" => Ok(joystick::Mode::from(mode)),
        _ => Err(format!("invalid joystick mode {}", mode)),
    }
}

fn load_rom(path: &Path) -> Result<Vec<u8>, String> {
    let mut data = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut data))
        .map_err(|err| format!("failed to read ROM {}: {}", path.display(), err))?;
    Ok(data)
}

pub fn build_emu_config(opt: &Opt) -> Result<Rc<Config>, String> {
    let model = SystemModel::from(&opt.model);
    let mut config = Config::new(model);
    config.joystick.joystick_1 = opt.joydev_1;
    config.joystick.joystick_2 = opt.joydev_2;
    config.sound.sample_rate = opt.sound_rate;
    config.sound.buffer_size = opt.sound_samples;
    config.sound.sid_filters = !opt.no_sid_filters;
    config.drive_count = opt.drives;
    if let Some(ref path) = opt.basic {
        config.roms.set_basic(&load_rom(path)?);
    }
    if let Some(ref path) = opt.charset {
        config.roms.set_charset(&load_rom(path)?);
    }
    if let Some(ref path) = opt.kernal {
        config.roms.set_kernal(&load_rom(path)?);
    }
    if let Some(ref path) = opt.d1541 {
        config.roms.set_d1541(&load_rom(path)?);
    }
    Ok(Rc::new(config))
}
