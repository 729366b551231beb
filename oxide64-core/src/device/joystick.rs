// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;

use crate::util::SharedCell;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    None,
    Virtual,
    Joy0,
    Joy1,
}

impl Mode {
    pub fn from(mode: &str) -> Mode {
        match mode {
            "none" => Mode::None,
            "numpad" | "virtual" => Mode::Virtual,
            "joy0" => Mode::Joy0,
            "joy1" => Mode::Joy1,
            _ => panic!("invalid mode {}", mode),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl Button {
    fn bit(self) -> usize {
        match self {
            Button::Up => 0,
            Button::Down => 1,
            Button::Left => 2,
            Button::Right => 3,
            Button::Fire => 4,
        }
    }
}

/// Control port state as seen by CIA 1. The shared cell carries the five
/// switch bits; the CIA inverts them when scanning the port.
pub struct Joystick {
    mode: Mode,
    threshold: i16,
    state: SharedCell<u8>,
}

impl Joystick {
    pub fn new(mode: Mode, threshold: i16, state: SharedCell<u8>) -> Self {
        Self {
            mode,
            threshold,
            state,
        }
    }

    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    pub fn is_virtual(&self) -> bool {
        self.mode == Mode::Virtual
    }

    pub fn reset(&mut self) {
        self.state.set(0);
    }

    // -- Events

    pub fn on_axis_motion(&mut self, axis_idx: u8, value: i16) {
        let mut state = self.state.get();
        match axis_idx {
            0 => {
                state.set_bit(Button::Left.bit(), value < -self.threshold);
                state.set_bit(Button::Right.bit(), value > self.threshold);
            }
            1 => {
                state.set_bit(Button::Up.bit(), value < -self.threshold);
                state.set_bit(Button::Down.bit(), value > self.threshold);
            }
            _ => panic!("invalid axis {}", axis_idx),
        }
        self.state.set(state);
    }

    pub fn on_button_change(&mut self, button: Button, pressed: bool) {
        let mut state = self.state.get();
        state.set_bit(button.bit(), pressed);
        self.state.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared_cell;

    #[test]
    fn button_updates_state_bit() {
        let state = new_shared_cell(0u8);
        let mut joystick = Joystick::new(Mode::Virtual, 3200, state.clone());
        joystick.on_button_change(Button::Fire, true);
        assert_eq!(0x10, state.get());
        joystick.on_button_change(Button::Fire, false);
        assert_eq!(0x00, state.get());
    }

    #[test]
    fn axis_motion_respects_threshold() {
        let state = new_shared_cell(0u8);
        let mut joystick = Joystick::new(Mode::Joy0, 3200, state.clone());
        joystick.on_axis_motion(0, -10000);
        assert_eq!(0x04, state.get());
        joystick.on_axis_motion(0, 0);
        assert_eq!(0x00, state.get());
    }
}
