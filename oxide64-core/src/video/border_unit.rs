// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub struct Config {
    pub border_color: u8,
    pub csel: bool,
    pub rsel: bool,
}

impl Config {
    pub fn new() -> Self {
        Config {
            border_color: 0x0e,
            csel: true,
            rsel: true,
        }
    }

    pub fn reset(&mut self) {
        self.border_color = 0x0e;
        self.csel = true;
        self.rsel = true;
    }
}

pub struct BorderUnit {
    pub config: Config,
    border_mff: bool,
    border_vff: bool,
}

impl BorderUnit {
    pub fn new() -> Self {
        BorderUnit {
            config: Config::new(),
            border_mff: false,
            border_vff: false,
        }
    }

    #[inline]
    pub fn map_sprite_to_screen(x: u16) -> u16 {
        match x {
            0x000..=0x193 => x + 0x64,
            0x194..=0x1ff => x - 0x194,
            _ => panic!("invalid sprite coords {}", x),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.border_mff || self.border_vff
    }

    pub fn reset(&mut self) {
        self.config.reset();
        self.border_mff = false;
        self.border_vff = false;
    }

    /*
           |   CSEL=0   |   CSEL=1
     ------+------------+-----------
     Left  |  31 ($1f)  |  24 ($18)
     Right | 335 ($14f) | 344 ($158)

            |   RSEL=0  |  RSEL=1
     -------+-----------+----------
     Top    |  55 ($37) |  51 ($33)
     Bottom | 247 ($f7) | 251 ($fb)
    */

    #[inline]
    pub fn update_main_ff(&mut self, x: u16, y: u16, den: bool) {
        /*
        1. If the X coordinate reaches the right comparison value, the main
           border flip flop is set.
        4. If the X coordinate reaches the left comparison value and the Y
           coordinate reaches the bottom one, the vertical flip flop is set.
        5. If the X coordinate reaches the left comparison value and the Y
           coordinate reaches the top one and the DEN bit in register $d011
           is set, the vertical border flip flop is reset.
        6. If the X coordinate reaches the left comparison value and the
           vertical border flip flop is not set, the main flip flop is reset.
        */
        let (left, right) = if self.config.csel {
            (0x18, 0x158)
        } else {
            (0x1f, 0x14f)
        };
        if x == Self::map_sprite_to_screen(left - 4) {
            self.update_vertical_ff(y, den);
            if !self.border_vff {
                self.border_mff = false;
            }
        } else if x == Self::map_sprite_to_screen(right - 4) {
            self.border_mff = true;
        }
    }

    #[inline]
    pub fn update_vertical_ff(&mut self, y: u16, den: bool) {
        /*
        2. If the Y coordinate reaches the bottom comparison value in cycle
           63, the vertical border flip flop is set.
        3. If the Y coordinate reaches the top comparison value in cycle 63
           and the DEN bit in register $d011 is set, the flip flop is reset.
        */
        let (top, bottom) = if self.config.rsel { (51, 251) } else { (55, 247) };
        if y == top && den {
            self.border_vff = false;
        } else if y == bottom {
            self.border_vff = true;
        }
    }
}
