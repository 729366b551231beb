// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use oxide64_core::factory::Register;

use super::C64;

// Design:
//   A snapshot records the durable machine state: memories, the CPU
//   register file, the processor port and the cycle counter. Chip internal
//   pipelines are volatile; restoring resets the chips and replays the
//   durable items on top, which is enough to resume at an instruction
//   boundary.

const MAGIC: &[u8; 4] = b"OX64";
const VERSION: u16 = 1;

#[derive(Debug)]
pub enum SnapshotError {
    BadMagic,
    VersionMismatch(u16),
    SizeMismatch,
    Io(io::Error),
}

impl From<io::Error> for SnapshotError {
    fn from(err: io::Error) -> Self {
        SnapshotError::Io(err)
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::BadMagic => write!(f, "not a snapshot file"),
            SnapshotError::VersionMismatch(version) => {
                write!(f, "unsupported snapshot version {}", version)
            }
            SnapshotError::SizeMismatch => write!(f, "snapshot does not match machine model"),
            SnapshotError::Io(err) => write!(f, "{}", err),
        }
    }
}

pub struct Snapshot;

impl Snapshot {
    pub fn save(c64: &C64, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION)?;
        // Clock and frame state
        writer.write_u64::<LittleEndian>(c64.get_cycles())?;
        writer.write_u32::<LittleEndian>(c64.get_frame_count())?;
        // CPU register file
        let cpu = c64.get_cpu();
        writer.write_u8(cpu.get_register(Register::A))?;
        writer.write_u8(cpu.get_register(Register::X))?;
        writer.write_u8(cpu.get_register(Register::Y))?;
        writer.write_u8(cpu.get_register(Register::SP))?;
        writer.write_u8(cpu.get_register(Register::P))?;
        writer.write_u16::<LittleEndian>(cpu.get_pc())?;
        // Processor port
        let io_port = c64.get_cpu_io_port();
        writer.write_u8(io_port.borrow().get_direction())?;
        writer.write_u8(io_port.borrow().get_value())?;
        // Memories
        let ram = c64.get_ram();
        let ram = ram.borrow();
        writer.write_u32::<LittleEndian>(ram.snapshot().len() as u32)?;
        writer.write_all(ram.snapshot())?;
        let color_ram = c64.get_color_ram();
        let color_ram = color_ram.borrow();
        writer.write_u32::<LittleEndian>(color_ram.snapshot().len() as u32)?;
        writer.write_all(color_ram.snapshot())?;
        Ok(())
    }

    pub fn load(c64: &mut C64, reader: &mut dyn Read) -> Result<(), SnapshotError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = reader.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(SnapshotError::VersionMismatch(version));
        }
        // Chip pipelines are volatile; start from a clean state.
        c64.reset(false);
        let cycles = reader.read_u64::<LittleEndian>()?;
        let _frames = reader.read_u32::<LittleEndian>()?;
        let a = reader.read_u8()?;
        let x = reader.read_u8()?;
        let y = reader.read_u8()?;
        let sp = reader.read_u8()?;
        let p = reader.read_u8()?;
        let pc = reader.read_u16::<LittleEndian>()?;
        let direction = reader.read_u8()?;
        let port = reader.read_u8()?;
        let ram_size = reader.read_u32::<LittleEndian>()? as usize;
        {
            let ram = c64.get_ram();
            let mut ram = ram.borrow_mut();
            if ram.capacity() != ram_size {
                return Err(SnapshotError::SizeMismatch);
            }
            let mut data = vec![0u8; ram_size];
            reader.read_exact(&mut data)?;
            ram.restore(&data);
        }
        let color_size = reader.read_u32::<LittleEndian>()? as usize;
        {
            let color_ram = c64.get_color_ram();
            let mut color_ram = color_ram.borrow_mut();
            if color_ram.capacity() != color_size {
                return Err(SnapshotError::SizeMismatch);
            }
            let mut data = vec![0u8; color_size];
            reader.read_exact(&mut data)?;
            color_ram.restore(&data);
        }
        {
            let io_port = c64.get_cpu_io_port();
            io_port.borrow_mut().set_direction(direction);
            io_port.borrow_mut().set_value(port);
        }
        let clock = c64.get_clock();
        clock.reset();
        clock.tick_delta(cycles);
        let cpu = c64.get_cpu_mut();
        cpu.set_register(Register::A, a);
        cpu.set_register(Register::X, x);
        cpu.set_register(Register::Y, y);
        cpu.set_register(Register::SP, sp);
        cpu.set_register(Register::P, p);
        cpu.set_pc(pc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{C64Factory, Config};
    use super::*;
    use oxide64_core::factory::{SoundOutput, SystemModel, VideoOutput};
    use oxide64_core::util::new_shared;
    use std::io::Cursor;
    use std::rc::Rc;
    use std::sync::Arc;

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

    fn build_c64() -> C64 {
        let config = Rc::new(Config::new_with_roms(
            SystemModel::from("pal"),
            &vec![0x11u8; 0x2000],
            &vec![0x22u8; 0x1000],
            &vec![0xeau8; 0x2000],
        ));
        let factory = Box::new(C64Factory::new(config.clone()));
        C64::build(config, &*factory, new_shared(NullVideo {}), Arc::new(NullSound {}))
    }

    #[test]
    fn save_load_roundtrip_restores_durable_state() {
        let mut c64 = build_c64();
        c64.reset(false);
        c64.load(&[0xde, 0xad, 0xbe, 0xef], 0x2000);
        c64.get_cpu_mut().set_register(Register::A, 0x42);
        c64.get_cpu_mut().set_pc(0x2000);
        let mut buffer = Vec::new();
        Snapshot::save(&c64, &mut buffer).unwrap();

        let mut other = build_c64();
        other.reset(false);
        Snapshot::load(&mut other, &mut Cursor::new(&buffer)).unwrap();
        assert_eq!(0x42, other.get_cpu().get_register(Register::A));
        assert_eq!(0x2000, other.get_cpu().get_pc());
        assert_eq!(0xde, other.get_ram().borrow().read(0x2000));
        assert_eq!(0xef, other.get_ram().borrow().read(0x2003));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(MAGIC);
        buffer.extend_from_slice(&[0xff, 0x00]);
        let mut c64 = build_c64();
        match Snapshot::load(&mut c64, &mut Cursor::new(&buffer)) {
            Err(SnapshotError::VersionMismatch(0xff)) => {}
            other => panic!("unexpected result {:?}", other.err()),
        }
    }
}
