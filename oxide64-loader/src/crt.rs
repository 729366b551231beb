// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str;

use byteorder::{BigEndian, ReadBytesExt};
use oxide64_core::device::cartridge::{Cartridge, Chip, ChipType, HwType};
use oxide64_system::{AutostartMethod, Image, C64};

use super::{invalid_data, Loader};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/CRT.TXT

static HEADER_SIG: &str = "C64 CARTRIDGE   ";
static CHIP_SIG: &str = "CHIP";

struct Header {
    signature: [u8; 16],
    header_length: u32,
    version: u16,
    hw_type: u16,
    exrom_line: u8,
    game_line: u8,
    name: [u8; 32],
}

struct ChipHeader {
    signature: [u8; 4],
    length: u32,
    chip_type: u16,
    bank_number: u16,
    load_address: u16,
    image_size: u16,
}

struct CrtImage {
    cartridge: Option<Cartridge>,
}

impl Image for CrtImage {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting CRT image");
        c64.attach_cartridge(self.cartridge.take().unwrap());
    }

    fn unmount(&mut self, c64: &mut C64) {
        c64.detach_cartridge();
    }
}

pub struct CrtLoader;

impl CrtLoader {
    pub fn new() -> Self {
        Self {}
    }

    fn build_cartridge(&self, header: &Header) -> io::Result<Cartridge> {
        let hw_type = HwType::from(header.hw_type).map_err(|err| invalid_data(&err))?;
        Ok(Cartridge::new(
            hw_type,
            header.exrom_line != 0,
            header.game_line != 0,
        ))
    }

    fn build_chip(&self, header: &ChipHeader, data: Vec<u8>) -> Chip {
        Chip {
            chip_type: ChipType::from(header.chip_type),
            bank_number: header.bank_number as u8,
            offset: header.load_address,
            size: header.image_size,
            data,
        }
    }

    fn read_chip_header(&self, rdr: &mut dyn Read) -> io::Result<Option<ChipHeader>> {
        let mut signature = [0u8; 4];
        match rdr.read(&mut signature)? {
            0 => Ok(None),
            4 => {
                let header = ChipHeader {
                    signature,
                    length: rdr.read_u32::<BigEndian>()?,
                    chip_type: rdr.read_u16::<BigEndian>()?,
                    bank_number: rdr.read_u16::<BigEndian>()?,
                    load_address: rdr.read_u16::<BigEndian>()?,
                    image_size: rdr.read_u16::<BigEndian>()?,
                };
                Ok(Some(header))
            }
            size => Err(invalid_data(&format!(
                "chip header error, expected 4 got {}",
                size
            ))),
        }
    }

    fn read_data(&self, rdr: &mut dyn Read, length: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0; length];
        rdr.read_exact(&mut data)?;
        Ok(data)
    }

    fn read_header(&self, rdr: &mut dyn Read) -> io::Result<Header> {
        let mut signature = [0u8; 16];
        let mut reserved = [0u8; 6];
        let mut name = [0u8; 32];
        let header = Header {
            signature: {
                rdr.read_exact(&mut signature)?;
                signature
            },
            header_length: rdr.read_u32::<BigEndian>()?,
            version: rdr.read_u16::<BigEndian>()?,
            hw_type: rdr.read_u16::<BigEndian>()?,
            exrom_line: rdr.read_u8()?,
            game_line: rdr.read_u8()?,
            name: {
                rdr.read_exact(&mut reserved)?;
                rdr.read_exact(&mut name)?;
                name
            },
        };
        Ok(header)
    }

    fn validate_chip_header(&self, header: &ChipHeader) -> io::Result<()> {
        let sig = str::from_utf8(&header.signature)
            .map_err(|_| invalid_data("invalid chip signature"))?;
        if sig == CHIP_SIG {
            Ok(())
        } else {
            Err(invalid_data("invalid chip signature"))
        }
    }

    fn validate_header(&self, header: &Header) -> io::Result<()> {
        let sig = str::from_utf8(&header.signature)
            .map_err(|_| invalid_data("invalid cartridge signature"))?;
        if sig == HEADER_SIG {
            Ok(())
        } else {
            Err(invalid_data("invalid cartridge signature"))
        }
    }
}

impl Loader for CrtLoader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        Ok(AutostartMethod::WithImage(image))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading CRT {}", path.display());
        let file = File::open(path)?;
        let mut rdr = BufReader::new(file);
        let header = self.read_header(&mut rdr)?;
        info!(target: "loader", "Found cartridge {}, version {}.{}, type {}",
              str::from_utf8(&header.name).unwrap_or(""),
              header.version >> 8,
              header.version & 0xff,
              header.hw_type);
        self.validate_header(&header)?;
        if header.header_length > 0x40 {
            let mut padding = vec![0u8; (header.header_length - 0x40) as usize];
            rdr.read_exact(&mut padding)?;
        }
        let mut cartridge = self.build_cartridge(&header)?;
        loop {
            match self.read_chip_header(&mut rdr)? {
                Some(chip_header) => {
                    info!(target: "loader", "Found chip {}, offset 0x{:x}, size {}",
                          chip_header.bank_number, chip_header.load_address,
                          chip_header.length - 0x10);
                    self.validate_chip_header(&chip_header)?;
                    if chip_header.bank_number >= 64 {
                        return Err(invalid_data("invalid cartridge chip bank"));
                    }
                    let chip_data =
                        self.read_data(&mut rdr, (chip_header.length - 0x10) as usize)?;
                    let chip = self.build_chip(&chip_header, chip_data);
                    cartridge.add(chip);
                }
                None => {
                    break;
                }
            }
        }
        Ok(Box::new(CrtImage {
            cartridge: Some(cartridge),
        }))
    }
}
