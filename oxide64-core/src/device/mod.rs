// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub mod cartridge;
mod datassette;
pub mod joystick;
pub mod keyboard;

pub use self::cartridge::Cartridge;
pub use self::datassette::Datassette;
pub use self::joystick::Joystick;
pub use self::keyboard::{Key, KeyEvent, Keyboard};
