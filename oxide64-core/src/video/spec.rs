// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::factory::VicModel;

/*
          | Video  | # of  | Visible | Cycles/ |  Visible
   Type   | system | lines |  lines  |  line   | pixels/line
 ---------+--------+-------+---------+---------+------------
  6567R8  | NTSC-M |  263  |   235   |   65    |    418
   6569   |  PAL-B |  312  |   284   |   63    |    403
*/

#[derive(Clone, Copy)]
pub struct Spec {
    pub raster_lines: u16,
    pub cycles_per_raster: u16,
    pub first_visible_line: u16,
    pub first_visible_x: u16,
    pub visible_size: (u16, u16),
}

impl Spec {
    pub fn new(chip_model: VicModel) -> Spec {
        match chip_model {
            VicModel::Mos6567 => Spec::ntsc(),
            VicModel::Mos6569 => Spec::pal(),
        }
    }

    fn ntsc() -> Spec {
        Spec {
            raster_lines: 263,
            cycles_per_raster: 65,
            first_visible_line: 28,
            first_visible_x: 76,
            visible_size: (403, 250),
        }
    }

    fn pal() -> Spec {
        Spec {
            raster_lines: 312,
            cycles_per_raster: 63,
            first_visible_line: 16,
            first_visible_x: 76,
            visible_size: (403, 284),
        }
    }
}
