// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use oxide64_core::device::cartridge::{Button, Cartridge};
use oxide64_core::drive::Disk;
use oxide64_core::factory::Tape;

use super::breakpoint::BreakpointKind;
use super::disassembler;
use super::message::{Message, MessageQueue};
use super::snapshot::{Snapshot, SnapshotError};
use super::{Config, C64};

// Design:
//   The run loop is host driven: the owner calls execute_frame() in a
//   loop. Control flags are an atomic bitmask that other threads may set;
//   they are evaluated once per frame, and a non-zero mask either services
//   the request (snapshots, inspection) or drops the engine back to the
//   paused state (stop, jam, breakpoint). State changing calls from other
//   threads must be bracketed with suspend()/resume(), a reentrant pair.

/// Run-loop control flags, checked once per frame.
pub mod flags {
    pub const AUTO_SNAPSHOT: u32 = 0x01;
    pub const USER_SNAPSHOT: u32 = 0x02;
    pub const BREAKPOINT_REACHED: u32 = 0x04;
    pub const WATCHPOINT_REACHED: u32 = 0x08;
    pub const INSPECT: u32 = 0x10;
    pub const CPU_JAMMED: u32 = 0x20;
    pub const STOP: u32 = 0x40;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum State {
    Off,
    Paused,
    Running,
}

pub struct ExecutionEngine {
    c64: C64,
    config: Rc<Config>,
    state: State,
    run_loop_ctrl: Arc<AtomicU32>,
    queue: MessageQueue,
    suspend_count: u32,
    resume_state: State,
    warp_mode: bool,
    debug_mode: bool,
    auto_snapshot: Option<Vec<u8>>,
    user_snapshot: Option<Vec<u8>>,
}

impl ExecutionEngine {
    pub fn new(c64: C64, config: Rc<Config>) -> Self {
        Self {
            c64,
            config,
            state: State::Off,
            run_loop_ctrl: Arc::new(AtomicU32::new(0)),
            queue: MessageQueue::new(),
            suspend_count: 0,
            resume_state: State::Paused,
            warp_mode: false,
            debug_mode: false,
            auto_snapshot: None,
            user_snapshot: None,
        }
    }

    pub fn get_c64(&self) -> &C64 {
        &self.c64
    }

    pub fn get_c64_mut(&mut self) -> &mut C64 {
        &mut self.c64
    }

    pub fn get_queue_mut(&mut self) -> &mut MessageQueue {
        &mut self.queue
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    /// Handle other threads use to signal the run loop.
    pub fn get_control_flags(&self) -> Arc<AtomicU32> {
        self.run_loop_ctrl.clone()
    }

    pub fn in_warp_mode(&self) -> bool {
        self.warp_mode
    }

    pub fn set_warp(&mut self, enabled: bool) {
        self.warp_mode = enabled;
    }

    pub fn in_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    // -- Power states

    pub fn power_on(&mut self) -> Result<(), String> {
        if self.state != State::Off {
            return Ok(());
        }
        self.config.is_ready()?;
        self.c64.reset(true);
        self.state = State::Paused;
        self.queue.put(Message::PowerOn, 0);
        Ok(())
    }

    pub fn power_off(&mut self) {
        if self.state == State::Off {
            return;
        }
        self.state = State::Off;
        self.queue.put(Message::PowerOff, 0);
    }

    pub fn run(&mut self) {
        if self.state == State::Paused {
            self.state = State::Running;
            self.queue.put(Message::Run, 0);
        }
    }

    pub fn pause(&mut self) {
        if self.state == State::Running {
            self.state = State::Paused;
            self.queue.put(Message::Pause, 0);
        }
    }

    pub fn reset(&mut self, hard: bool) {
        if self.state != State::Off {
            self.c64.reset(hard);
            self.queue.put(Message::Reset, 0);
        }
    }

    // -- Suspend/resume

    /// Reentrant: the Nth suspend pauses the machine, the matching Nth
    /// resume restarts it.
    pub fn suspend(&mut self) {
        if self.suspend_count == 0 {
            self.resume_state = self.state;
            if self.state == State::Running {
                self.state = State::Paused;
            }
        }
        self.suspend_count += 1;
    }

    pub fn resume(&mut self) {
        assert!(self.suspend_count > 0, "unbalanced resume");
        self.suspend_count -= 1;
        if self.suspend_count == 0 {
            self.state = self.resume_state;
        }
    }

    // -- Signals

    pub fn set_control_flags(&self, value: u32) {
        self.run_loop_ctrl.fetch_or(value, Ordering::SeqCst);
    }

    pub fn clear_control_flags(&self, value: u32) {
        self.run_loop_ctrl.fetch_and(!value, Ordering::SeqCst);
    }

    pub fn signal_stop(&self) {
        self.set_control_flags(flags::STOP);
    }

    pub fn request_auto_snapshot(&self) {
        self.set_control_flags(flags::AUTO_SNAPSHOT);
    }

    pub fn request_user_snapshot(&self) {
        self.set_control_flags(flags::USER_SNAPSHOT);
    }

    pub fn signal_inspect(&self) {
        self.set_control_flags(flags::INSPECT);
    }

    // -- Execution

    /// Emulates one frame. Returns false when the run loop left the
    /// running state (stop request, breakpoint, jam).
    pub fn execute_frame(&mut self) -> bool {
        if self.state != State::Running {
            return false;
        }
        let completed = self.c64.run_frame();
        self.c64.reset_vsync();
        if !completed {
            if self.c64.is_cpu_jam() {
                self.set_control_flags(flags::CPU_JAMMED);
            } else {
                self.set_control_flags(flags::BREAKPOINT_REACHED);
            }
        }
        self.process_control_flags()
    }

    fn process_control_flags(&mut self) -> bool {
        let ctrl = self.run_loop_ctrl.swap(0, Ordering::SeqCst);
        if ctrl == 0 {
            return true;
        }
        let mut keep_running = true;
        if ctrl & flags::AUTO_SNAPSHOT != 0 {
            self.auto_snapshot = self.take_snapshot();
            self.queue.put(Message::SnapshotTaken, 0);
        }
        if ctrl & flags::USER_SNAPSHOT != 0 {
            self.user_snapshot = self.take_snapshot();
            self.queue.put(Message::SnapshotTaken, 1);
        }
        if ctrl & flags::INSPECT != 0 {
            info!(target: "c64", "{}", self.inspect());
        }
        if ctrl & flags::BREAKPOINT_REACHED != 0 {
            self.queue
                .put(Message::BreakpointReached, u64::from(self.c64.get_cpu().get_pc()));
            keep_running = false;
        }
        if ctrl & flags::WATCHPOINT_REACHED != 0 {
            self.queue
                .put(Message::WatchpointReached, u64::from(self.c64.get_cpu().get_pc()));
            keep_running = false;
        }
        if ctrl & flags::CPU_JAMMED != 0 {
            warn!(target: "c64", "CPU jam at 0x{:04x}", self.c64.get_cpu().get_pc());
            self.queue
                .put(Message::CpuJammed, u64::from(self.c64.get_cpu().get_pc()));
            keep_running = false;
        }
        if ctrl & flags::STOP != 0 {
            keep_running = false;
        }
        if !keep_running {
            self.pause();
        }
        keep_running
    }

    // -- Stepping

    pub fn step_into(&mut self) {
        self.c64.step();
        if self.debug_mode {
            let opcode = self.c64.get_cpu().read(self.c64.get_cpu().get_pc());
            if disassembler::is_illegal(opcode) {
                self.queue
                    .put(Message::CpuIllegalInstruction, u64::from(opcode));
            }
        }
    }

    /// Runs until the instruction following the current one is reached;
    /// subroutine calls execute to completion.
    pub fn step_over(&mut self) {
        let pc = self.c64.get_cpu().get_pc();
        let opcode = self.c64.get_cpu().read(pc);
        if opcode == 0x20 {
            // JSR
            let next = pc.wrapping_add(disassembler::instruction_length(opcode));
            self.c64.get_bpm_mut().set(next, BreakpointKind::Soft);
            let was_running = self.state;
            self.state = State::Running;
            // bounded so a runaway subroutine cannot hang the caller
            for _ in 0..100 {
                if !self.c64.run_frame() {
                    break;
                }
                self.c64.reset_vsync();
            }
            self.c64.reset_vsync();
            self.run_loop_ctrl.store(0, Ordering::SeqCst);
            self.state = was_running;
        } else {
            self.step_into();
        }
    }

    /// Completes the current instruction so the machine rests at a fetch
    /// boundary.
    pub fn finish_instruction(&mut self) {
        self.c64.step();
    }

    pub fn inspect(&self) -> String {
        let cpu = self.c64.get_cpu();
        let (instr, _) = disassembler::Disassembler::disassemble(cpu, cpu.get_pc(), 0, true);
        format!(
            "cycle {:10}  frame {:6}  {}",
            self.c64.get_cycles(),
            self.c64.get_frame_count(),
            instr
        )
    }

    // -- Snapshots

    fn take_snapshot(&mut self) -> Option<Vec<u8>> {
        let mut buffer = Vec::new();
        match Snapshot::save(&self.c64, &mut buffer) {
            Ok(()) => Some(buffer),
            Err(err) => {
                warn!(target: "c64", "Failed to take snapshot: {}", err);
                None
            }
        }
    }

    pub fn latest_auto_snapshot(&mut self) -> Option<Vec<u8>> {
        self.auto_snapshot.take()
    }

    pub fn latest_user_snapshot(&mut self) -> Option<Vec<u8>> {
        self.user_snapshot.take()
    }

    pub fn save_snapshot(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        Snapshot::save(&self.c64, writer)
    }

    pub fn load_snapshot(&mut self, reader: &mut dyn Read) -> Result<(), SnapshotError> {
        Snapshot::load(&mut self.c64, reader)
    }

    // -- Media

    pub fn attach_cartridge(&mut self, cartridge: Cartridge) {
        self.suspend();
        self.c64.attach_cartridge(cartridge);
        self.queue.put(Message::CartridgeAttached, 0);
        self.resume();
    }

    pub fn detach_cartridge(&mut self) {
        self.suspend();
        self.c64.detach_cartridge();
        self.queue.put(Message::CartridgeDetached, 0);
        self.resume();
    }

    pub fn press_cartridge_button(&mut self, button: Button) {
        self.c64.press_cartridge_button(button);
    }

    pub fn release_cartridge_button(&mut self, button: Button) {
        self.c64.release_cartridge_button(button);
    }

    pub fn insert_tape(&mut self, tape: Box<dyn Tape>) {
        self.suspend();
        self.c64.attach_tape(tape);
        self.queue.put(Message::TapeInserted, 0);
        self.resume();
    }

    pub fn eject_tape(&mut self) {
        self.suspend();
        self.c64.detach_tape();
        self.queue.put(Message::TapeEjected, 0);
        self.resume();
    }

    pub fn insert_disk(&mut self, unit: usize, disk: Disk) -> Result<(), String> {
        self.suspend();
        let result = self.c64.insert_disk(unit, disk);
        if result.is_ok() {
            self.queue.put(Message::DiskInserted, unit as u64);
        }
        self.resume();
        result
    }

    pub fn eject_disk(&mut self, unit: usize) -> Result<(), String> {
        self.suspend();
        let result = self.c64.eject_disk(unit).map(|_| ());
        if result.is_ok() {
            self.queue.put(Message::DiskEjected, unit as u64);
        }
        self.resume();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::C64Factory;
    use super::*;
    use oxide64_core::factory::{SoundOutput, SystemModel, VideoOutput};
    use oxide64_core::util::new_shared;

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

    fn build_engine() -> ExecutionEngine {
        let mut kernal = vec![0xeau8; 0x2000];
        // reset vector points at a NOP slide inside the Kernal window
        kernal[0x1ffc] = 0x00;
        kernal[0x1ffd] = 0xe0;
        let config = Rc::new(Config::new_with_roms(
            SystemModel::from("pal"),
            &vec![0x00u8; 0x2000],
            &vec![0x00u8; 0x1000],
            &kernal,
        ));
        let factory = Box::new(C64Factory::new(config.clone()));
        let c64 = C64::build(
            config.clone(),
            &*factory,
            new_shared(NullVideo {}),
            Arc::new(NullSound {}),
        );
        ExecutionEngine::new(c64, config)
    }

    #[test]
    fn power_on_requires_roms() {
        let config = Rc::new(Config::new(SystemModel::from("pal")));
        let factory = Box::new(C64Factory::new(config.clone()));
        let c64 = C64::build(
            config.clone(),
            &*factory,
            new_shared(NullVideo {}),
            Arc::new(NullSound {}),
        );
        let mut engine = ExecutionEngine::new(c64, config);
        assert!(engine.power_on().is_err());
        assert_eq!(State::Off, engine.get_state());
    }

    #[test]
    fn state_transitions() {
        let mut engine = build_engine();
        engine.power_on().unwrap();
        assert_eq!(State::Paused, engine.get_state());
        engine.run();
        assert_eq!(State::Running, engine.get_state());
        engine.pause();
        assert_eq!(State::Paused, engine.get_state());
        engine.power_off();
        assert_eq!(State::Off, engine.get_state());
    }

    #[test]
    fn stop_flag_pauses_at_frame_boundary() {
        let mut engine = build_engine();
        engine.power_on().unwrap();
        engine.run();
        assert!(engine.execute_frame());
        engine.signal_stop();
        assert!(!engine.execute_frame());
        assert_eq!(State::Paused, engine.get_state());
    }

    #[test]
    fn suspend_resume_is_reentrant() {
        let mut engine = build_engine();
        engine.power_on().unwrap();
        engine.run();
        engine.suspend();
        engine.suspend();
        assert_eq!(State::Paused, engine.get_state());
        engine.resume();
        assert_eq!(State::Paused, engine.get_state());
        engine.resume();
        assert_eq!(State::Running, engine.get_state());
    }

    #[test]
    fn messages_report_state_changes() {
        let mut engine = build_engine();
        engine.power_on().unwrap();
        engine.run();
        assert_eq!(Some((Message::PowerOn, 0)), engine.get_queue_mut().get());
        assert_eq!(Some((Message::Run, 0)), engine.get_queue_mut().get());
    }
}
