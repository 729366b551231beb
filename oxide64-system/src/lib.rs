// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

pub mod autostart;
mod breakpoint;
pub mod c64;
mod c64_factory;
mod condition;
pub mod config;
mod disassembler;
mod execution;
mod frame_buffer;
mod message;
mod snapshot;
mod sound_buffer;

pub use self::autostart::{Autostart, AutostartMethod, Image};
pub use self::breakpoint::{Breakpoint, BreakpointKind, BreakpointManager};
pub use self::c64::C64;
pub use self::c64_factory::C64Factory;
pub use self::condition::Condition;
pub use self::config::Config;
pub use self::disassembler::Disassembler;
pub use self::execution::{flags, ExecutionEngine, State};
pub use self::frame_buffer::{FrameBuffer, PALETTE};
pub use self::message::{Message, MessageQueue};
pub use self::snapshot::Snapshot;
pub use self::sound_buffer::SoundBuffer;
