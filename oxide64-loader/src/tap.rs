// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str;

use byteorder::{LittleEndian, ReadBytesExt};
use oxide64_core::factory::Tape;
use oxide64_system::autostart;
use oxide64_system::{Autostart, AutostartMethod, Image, C64};

use super::{invalid_data, Loader};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/TAP.TXT

static HEADER_SIG: &str = "C64-TAPE-RAW";

struct Header {
    signature: [u8; 12],
    version: u8,
    size: u32,
}

struct TapImage {
    tape: Option<Box<dyn Tape>>,
}

impl Image for TapImage {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting TAP image");
        c64.attach_tape(self.tape.take().unwrap());
    }

    fn unmount(&mut self, c64: &mut C64) {
        c64.detach_tape();
    }
}

pub struct TapLoader;

impl TapLoader {
    pub fn new() -> Self {
        Self {}
    }

    fn read_header(&self, rdr: &mut dyn Read) -> io::Result<Header> {
        let mut signature = [0u8; 12];
        let mut reserved = [0u8; 3];
        rdr.read_exact(&mut signature)?;
        let version = rdr.read_u8()?;
        rdr.read_exact(&mut reserved)?;
        let size = rdr.read_u32::<LittleEndian>()?;
        Ok(Header {
            signature,
            version,
            size,
        })
    }

    fn validate_header(&self, header: &Header) -> io::Result<()> {
        let sig = str::from_utf8(&header.signature)
            .map_err(|_| invalid_data("invalid tape signature"))?;
        if sig != HEADER_SIG {
            return Err(invalid_data("invalid tape signature"));
        }
        if header.version > 1 {
            return Err(invalid_data("unsupported tape version"));
        }
        Ok(())
    }
}

impl Loader for TapLoader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        let autostart = Autostart::new(autostart::Mode::Run, image);
        Ok(AutostartMethod::WithAutostart(Some(autostart)))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading TAP {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let header = self.read_header(&mut reader)?;
        info!(target: "loader", "Found tape, version {}, size {}", header.version, header.size);
        self.validate_header(&header)?;
        let mut data = vec![0; header.size as usize];
        reader.read_exact(&mut data)?;
        let tape = TapTape {
            version: header.version,
            data,
            pos: 0,
        };
        Ok(Box::new(TapImage {
            tape: Some(Box::new(tape)),
        }))
    }
}

struct TapTape {
    version: u8,
    data: Vec<u8>,
    pos: usize,
}

impl Tape for TapTape {
    fn read_pulse(&mut self) -> Option<u32> {
        if self.pos < self.data.len() {
            let value = u32::from(self.data[self.pos]);
            self.pos += 1;
            if value != 0 {
                // pulse length is 8 * byte clock cycles
                Some(value << 3)
            } else {
                let pulse = match self.version {
                    0 => 256 << 3,
                    1 => {
                        if self.pos + 3 > self.data.len() {
                            return None;
                        }
                        let byte1 = u32::from(self.data[self.pos]);
                        let byte2 = u32::from(self.data[self.pos + 1]);
                        let byte3 = u32::from(self.data[self.pos + 2]);
                        self.pos += 3;
                        (byte3 << 16) | (byte2 << 8) | byte1
                    }
                    _ => panic!("invalid version {}", self.version),
                };
                Some(pulse)
            }
        } else {
            None
        }
    }

    fn seek(&mut self, pos: usize) -> bool {
        if pos <= self.data.len() {
            self.pos = pos;
            true
        } else {
            false
        }
    }
}
