// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod cli;
mod logger;

use std::fs::File;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use structopt::StructOpt;

use oxide64_core::util::new_shared;
use oxide64_loader::Loaders;
use oxide64_system::{
    BreakpointKind, C64Factory, ExecutionEngine, FrameBuffer, SoundBuffer, C64, PALETTE,
};

use crate::cli::Opt;
use crate::logger::Logger;

static NAME: &str = "oxide64";

mod exit_code {
    pub const OK: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const ROM_MISSING: i32 = 2;
    pub const MEDIA_FAILURE: i32 = 3;
    pub const SNAPSHOT_MISMATCH: i32 = 4;
}

fn main() {
    let opt = Opt::from_args();
    process::exit(run(&opt));
}

fn load_image(c64: &mut C64, path: &Path) -> Result<(), String> {
    let loader = Loaders::from_path(path)?;
    let mut autostart = loader
        .autostart(path)
        .map_err(|err| format!("{}", err))?;
    autostart.execute(c64);
    Ok(())
}

fn run(opt: &Opt) -> i32 {
    let logger = match Logger::build(opt.log_level.as_str(), &opt.log_target_level) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Error: {}", err);
            return exit_code::FAILURE;
        }
    };
    if let Err(err) = Logger::enable(logger) {
        eprintln!("Error: {}", err);
        return exit_code::FAILURE;
    }
    info!("Starting {}", NAME);
    let config = match cli::build_emu_config(opt) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return exit_code::ROM_MISSING;
        }
    };
    let sound_buffer = Arc::new(SoundBuffer::new(config.sound.buffer_size << 2));
    let video_buffer = new_shared(FrameBuffer::new(
        config.model.frame_buffer_size.0,
        config.model.frame_buffer_size.1,
        PALETTE,
    ));
    let chip_factory = Box::new(C64Factory::new(config.clone()));
    let c64 = C64::build(
        config.clone(),
        &*chip_factory,
        video_buffer.clone(),
        sound_buffer.clone(),
    );
    let mut engine = ExecutionEngine::new(c64, config.clone());
    if let Err(err) = engine.power_on() {
        error!("{}", err);
        return exit_code::ROM_MISSING;
    }
    engine.set_warp(opt.warp_mode);
    engine.set_debug(opt.debug);
    for bp in opt.bp.iter() {
        engine
            .get_c64_mut()
            .get_bpm_mut()
            .set(*bp, BreakpointKind::Hard);
    }
    if let Some(ref path) = opt.image {
        if let Err(err) = load_image(engine.get_c64_mut(), path) {
            error!("{}", err);
            return exit_code::MEDIA_FAILURE;
        }
    }
    if let Some(ref path) = opt.load_snapshot {
        let result = File::open(path)
            .map_err(|err| format!("{}", err))
            .and_then(|mut file| {
                engine
                    .load_snapshot(&mut file)
                    .map_err(|err| format!("{}", err))
            });
        if let Err(err) = result {
            error!("Failed to load snapshot: {}", err);
            return exit_code::SNAPSHOT_MISMATCH;
        }
    }
    run_loop(&mut engine, opt);
    if let Some(ref path) = opt.save_snapshot {
        let result = File::create(path)
            .map_err(|err| format!("{}", err))
            .and_then(|mut file| {
                engine
                    .save_snapshot(&mut file)
                    .map_err(|err| format!("{}", err))
            });
        if let Err(err) = result {
            error!("Failed to save snapshot: {}", err);
            return exit_code::FAILURE;
        }
    }
    exit_code::OK
}

fn run_loop(engine: &mut ExecutionEngine, opt: &Opt) {
    let refresh_rate = engine.get_c64().get_config().model.refresh_rate;
    let frame_duration = Duration::from_nanos((1_000_000_000f64 / refresh_rate) as u64);
    let mut deadline = Instant::now();
    let mut frames = 0u32;
    engine.run();
    loop {
        if !engine.execute_frame() {
            info!("Run loop stopped at cycle {}", engine.get_c64().get_cycles());
            break;
        }
        frames = frames.wrapping_add(1);
        if let Some(limit) = opt.frames {
            if frames >= limit {
                break;
            }
        }
        // synchronize with the wall clock unless warping
        if !engine.in_warp_mode() {
            deadline += frame_duration;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }
    }
}
