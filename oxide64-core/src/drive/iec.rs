// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::util::{IoPort, Shared};

use super::vc1541::Drive;

// Design:
//   The serial bus is three open-collector lines (ATN, CLK, DATA): any
//   participant can pull a line low, and it is high only when nobody does.
//   The C64 drives through inverting buffers on CIA 2 port A (bit 3 ATN
//   out, bit 4 CLK out, bit 5 DATA out; a set bit pulls the line low) and
//   reads the CLK/DATA levels back on bits 6/7. Drives hang off VIA1 port
//   B with inverting receivers, plus the ATNA trap that pulls DATA low
//   while ATN is asserted and not acknowledged.

pub struct IecBus {
    cia_port_a: Shared<IoPort>,
    drives: Vec<Shared<Drive>>,
}

impl IecBus {
    pub fn new(cia_port_a: Shared<IoPort>) -> Self {
        Self {
            cia_port_a,
            drives: Vec::new(),
        }
    }

    pub fn attach_drive(&mut self, drive: Shared<Drive>) {
        self.drives.push(drive);
    }

    pub fn detach_drives(&mut self) {
        self.drives.clear();
        self.update();
    }

    /// Recomputes the line levels from every participant's outputs and
    /// distributes them back to the receivers. Invoked once per cycle.
    pub fn update(&self) {
        let cia = self.cia_port_a.borrow().get_value();
        // only the C64 can assert ATN
        let atn_level = cia & 0x08 == 0;
        let mut clk_level = cia & 0x10 == 0;
        let mut data_level = cia & 0x20 == 0;
        for drive in self.drives.iter() {
            let out = drive.borrow().iec_output();
            // VIA1 PB1 = DATA out, PB3 = CLK out, PB4 = ATNA
            if out & 0x08 != 0 {
                clk_level = false;
            }
            if out & 0x02 != 0 {
                data_level = false;
            }
            if !atn_level && out & 0x10 == 0 {
                // unacknowledged ATN pulls DATA low
                data_level = false;
            }
        }
        {
            let mut port = self.cia_port_a.borrow_mut();
            port.set_input_bit(6, clk_level);
            port.set_input_bit(7, data_level);
        }
        for drive in self.drives.iter() {
            drive
                .borrow_mut()
                .set_iec_inputs(data_level, clk_level, atn_level);
        }
    }
}
