// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fmt;

// Design:
//   A disk is 84 halftracks, each a circular bit stream of GCR encoded
//   data with a per halftrack length and speed zone. D64 images are
//   encoded losslessly into the stream (sync marks, headers, checksums,
//   gaps); decoding scans for sync marks and reassembles sectors, noting
//   an error code per sector. Normal tracks sit on the odd halftracks.

pub const NUM_HALFTRACKS: usize = 84;
pub const MAX_BYTES_ON_TRACK: usize = 7928;
pub const MAX_BITS_ON_TRACK: usize = MAX_BYTES_ON_TRACK * 8;

/* GCR encoding table. Maps 4 data bits to 5 GCR bits so that no valid
 * stream contains more than two consecutive zero bits.
 */
const GCR: [u8; 16] = [
    0x0a, 0x0b, 0x12, 0x13, //  0 -  3
    0x0e, 0x0f, 0x16, 0x17, //  4 -  7
    0x09, 0x19, 0x1a, 0x1b, //  8 - 11
    0x0d, 0x1d, 0x1e, 0x15, // 12 - 15
];

/* Inverse GCR table. Maps 5 GCR bits to 4 data bits; invalid codewords are
 * marked with 255.
 */
const INV_GCR: [u8; 32] = [
    255, 255, 255, 255, // 0x00 - 0x03
    255, 255, 255, 255, // 0x04 - 0x07
    255, 8, 0, 1, // 0x08 - 0x0B
    255, 12, 4, 5, // 0x0C - 0x0F
    255, 255, 2, 3, // 0x10 - 0x13
    255, 15, 6, 7, // 0x14 - 0x17
    255, 9, 10, 11, // 0x18 - 0x1B
    255, 13, 14, 255, // 0x1C - 0x1F
];

/// Track geometry of a standard 5.25" disk: sector count, speed zone and
/// encoded track length in bytes, indexed by track number (1..=42).
pub const TRACK_DEFAULTS: [(u8, u8, u16); 43] = [
    (0, 0, 0), // tracks are numbered from 1
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (21, 3, 7692),
    (19, 2, 7142),
    (19, 2, 7142),
    (19, 2, 7142),
    (19, 2, 7142),
    (19, 2, 7142),
    (19, 2, 7142),
    (19, 2, 7142),
    (18, 1, 6666),
    (18, 1, 6666),
    (18, 1, 6666),
    (18, 1, 6666),
    (18, 1, 6666),
    (18, 1, 6666),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
    (17, 0, 6250),
];

/// Duration of a single bit in tenths of a nanosecond per speed zone.
const BIT_DELAY: [u64; 4] = [40_000, 37_500, 35_000, 32_500];

/// Per sector error codes recorded while decoding a disk, matching the
/// codes stored in extended D64 images.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DiskError {
    Ok = 0x01,
    HeaderBlockNotFound = 0x02,
    NoSyncSequence = 0x03,
    DataBlockNotFound = 0x04,
    DataBlockChecksum = 0x05,
    HeaderBlockChecksum = 0x09,
}

#[derive(Debug)]
pub struct GcrError(pub String);

impl fmt::Display for GcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn bin2gcr(value: u8) -> u8 {
    assert!(value < 16);
    GCR[value as usize]
}

pub fn gcr2bin(value: u8) -> u8 {
    assert!(value < 32);
    INV_GCR[value as usize]
}

pub fn is_gcr(value: u8) -> bool {
    assert!(value < 32);
    INV_GCR[value as usize] != 0xff
}

pub fn num_sectors(track: usize) -> usize {
    if track >= 1 && track <= 42 {
        TRACK_DEFAULTS[track].0 as usize
    } else {
        0
    }
}

pub fn speed_zone(track: usize) -> u8 {
    if track >= 1 && track <= 42 {
        TRACK_DEFAULTS[track].1
    } else {
        0
    }
}

pub struct Disk {
    write_protected: bool,
    modified: bool,
    // Data and length information for each halftrack (1-based)
    data: Vec<Vec<u8>>,
    length: Vec<u32>,
    speed: Vec<u8>,
}

impl Disk {
    pub fn new() -> Self {
        let mut data = Vec::with_capacity(NUM_HALFTRACKS + 1);
        let mut length = Vec::with_capacity(NUM_HALFTRACKS + 1);
        let mut speed = Vec::with_capacity(NUM_HALFTRACKS + 1);
        for ht in 0..=NUM_HALFTRACKS {
            data.push(vec![0u8; MAX_BYTES_ON_TRACK]);
            length.push(MAX_BITS_ON_TRACK as u32);
            speed.push(speed_zone((ht + 1) / 2));
        }
        Self {
            write_protected: false,
            modified: false,
            data,
            length,
            speed,
        }
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protection(&mut self, value: bool) {
        self.write_protected = value;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn length_of_halftrack(&self, ht: usize) -> u32 {
        self.length[ht]
    }

    pub fn set_halftrack(&mut self, ht: usize, bits: &[u8], length: u32, speed: u8) {
        assert!(ht >= 1 && ht <= NUM_HALFTRACKS);
        let count = usize::min(bits.len(), MAX_BYTES_ON_TRACK);
        self.data[ht][..count].copy_from_slice(&bits[..count]);
        self.length[ht] = length;
        self.speed[ht] = speed;
    }

    pub fn speed_of_halftrack(&self, ht: usize) -> u8 {
        self.speed[ht]
    }

    /// Time span the head rests over one bit, in tenths of a nanosecond,
    /// as determined by the density bits the track was written with.
    pub fn bit_delay(&self, ht: usize) -> u64 {
        BIT_DELAY[self.speed[ht] as usize]
    }

    #[inline]
    pub fn wrap(&self, ht: usize, pos: u32) -> u32 {
        let length = self.length[ht];
        if length == 0 {
            0
        } else {
            pos % length
        }
    }

    #[inline]
    pub fn read_bit(&self, ht: usize, pos: u32) -> bool {
        let pos = self.wrap(ht, pos);
        self.data[ht][(pos / 8) as usize] & (0x80 >> (pos % 8)) != 0
    }

    #[inline]
    pub fn write_bit(&mut self, ht: usize, pos: u32, bit: bool) {
        let pos = self.wrap(ht, pos);
        if bit {
            self.data[ht][(pos / 8) as usize] |= 0x80 >> (pos % 8);
        } else {
            self.data[ht][(pos / 8) as usize] &= !(0x80 >> (pos % 8));
        }
        self.modified = true;
    }

    pub fn write_byte(&mut self, ht: usize, pos: u32, byte: u8) {
        for i in 0..8u32 {
            self.write_bit(ht, pos + i, byte & (0x80 >> i) != 0);
        }
    }

    pub fn clear_halftrack(&mut self, ht: usize) {
        for byte in self.data[ht].iter_mut() {
            // 0x55 is the usual gap filler
            *byte = 0x55;
        }
        self.length[ht] = (TRACK_DEFAULTS[(ht + 1) / 2].2 as u32) * 8;
    }

    pub fn clear_disk(&mut self) {
        for ht in 1..=NUM_HALFTRACKS {
            self.clear_halftrack(ht);
        }
        self.modified = false;
    }

    // -- GCR encoding

    /// Encodes four data bytes into five GCR bytes at the given bit
    /// position of a track.
    fn encode_gcr(&mut self, values: [u8; 4], track: usize, pos: u32) -> u32 {
        let ht = 2 * track - 1;
        let mut shift_reg: u64 = 0;
        for value in values.iter() {
            shift_reg = (shift_reg << 5) | u64::from(bin2gcr(value >> 4));
            shift_reg = (shift_reg << 5) | u64::from(bin2gcr(value & 0x0f));
        }
        let mut pos = pos;
        for i in (0..40).rev() {
            self.write_bit(ht, pos, (shift_reg >> i) & 1 != 0);
            pos += 1;
        }
        pos
    }

    fn write_sync(&mut self, track: usize, pos: u32, bytes: u32) -> u32 {
        let ht = 2 * track - 1;
        let mut pos = pos;
        for _ in 0..bytes * 8 {
            self.write_bit(ht, pos, true);
            pos += 1;
        }
        pos
    }

    fn write_gap(&mut self, track: usize, pos: u32, bytes: u32) -> u32 {
        let ht = 2 * track - 1;
        let mut pos = pos;
        for _ in 0..bytes {
            self.write_byte(ht, pos, 0x55);
            pos += 8;
        }
        pos
    }

    /// Encodes a logical disk (sector data per track) into the GCR bit
    /// stream. `id` is the two byte disk id from the BAM sector.
    pub fn encode(&mut self, num_tracks: usize, sectors: &dyn Fn(usize, usize) -> [u8; 256], id: (u8, u8)) {
        self.clear_disk();
        for track in 1..=num_tracks {
            let ht = 2 * track - 1;
            let defaults = TRACK_DEFAULTS[usize::min(track, 42)];
            self.length[ht] = u32::from(defaults.2) * 8;
            self.speed[ht] = defaults.1;
            let mut pos = 0u32;
            for sector in 0..defaults.0 as usize {
                pos = self.encode_sector(track, sector, sectors(track, sector), id, pos);
            }
            // fill the remainder of the track with gap bytes
            while pos + 8 <= self.length[ht] {
                self.write_byte(ht, pos, 0x55);
                pos += 8;
            }
        }
        self.modified = false;
    }

    fn encode_sector(
        &mut self,
        track: usize,
        sector: usize,
        data: [u8; 256],
        id: (u8, u8),
        start: u32,
    ) -> u32 {
        let (id1, id2) = id;
        let mut pos = start;
        // Header block: sync, $08, checksum, sector, track, id2, id1, $0F $0F
        pos = self.write_sync(track, pos, 5);
        let checksum = sector as u8 ^ track as u8 ^ id2 ^ id1;
        pos = self.encode_gcr([0x08, checksum, sector as u8, track as u8], track, pos);
        pos = self.encode_gcr([id2, id1, 0x0f, 0x0f], track, pos);
        pos = self.write_gap(track, pos, 9);
        // Data block: sync, $07, 256 data bytes, checksum, $00 $00
        pos = self.write_sync(track, pos, 5);
        let mut data_checksum = data[0];
        for byte in data.iter().skip(1) {
            data_checksum ^= byte;
        }
        pos = self.encode_gcr([0x07, data[0], data[1], data[2]], track, pos);
        let mut i = 3;
        while i + 4 <= 255 {
            pos = self.encode_gcr([data[i], data[i + 1], data[i + 2], data[i + 3]], track, pos);
            i += 4;
        }
        pos = self.encode_gcr([data[255], data_checksum, 0x00, 0x00], track, pos);
        self.write_gap(track, pos, 8)
    }

    // -- GCR decoding

    fn read_byte(&self, ht: usize, pos: u32) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            byte = (byte << 1) | if self.read_bit(ht, pos + i) { 1 } else { 0 };
        }
        byte
    }

    fn decode_gcr_nibble(&self, ht: usize, pos: u32) -> u8 {
        let mut codeword = 0u8;
        for i in 0..5 {
            codeword = (codeword << 1) | if self.read_bit(ht, pos + i) { 1 } else { 0 };
        }
        INV_GCR[codeword as usize]
    }

    fn decode_gcr_byte(&self, ht: usize, pos: u32) -> u8 {
        (self.decode_gcr_nibble(ht, pos) << 4) | self.decode_gcr_nibble(ht, pos + 5)
    }

    /// Finds the next sync mark (10 or more consecutive set bits) at or
    /// after `pos`, returning the position of the first bit after it.
    fn find_sync(&self, ht: usize, pos: u32, limit: u32) -> Option<u32> {
        let mut ones = 0u32;
        let mut pos = pos;
        let mut scanned = 0u32;
        while scanned < limit {
            if self.read_bit(ht, pos) {
                ones += 1;
            } else {
                if ones >= 10 {
                    return Some(pos);
                }
                ones = 0;
            }
            pos += 1;
            scanned += 1;
        }
        None
    }

    /// Converts a track back into its logical sector contents. The result
    /// holds the sector data in order plus an error code per sector.
    pub fn decode_track(
        &self,
        track: usize,
        out: &mut Vec<u8>,
        errors: &mut Vec<DiskError>,
    ) -> Result<(), GcrError> {
        let ht = 2 * track - 1;
        let length = self.length[ht];
        let count = num_sectors(track);
        let mut sector_data: Vec<Option<[u8; 256]>> = vec![None; count];
        let mut sector_errors = vec![DiskError::HeaderBlockNotFound; count];
        let mut pos = 0u32;
        let mut scanned = 0u32;
        // two revolutions are plenty to see every sector once
        while scanned < 2 * length {
            let sync_end = match self.find_sync(ht, pos, 2 * length - scanned) {
                Some(end) => end,
                None => break,
            };
            scanned += sync_end.wrapping_sub(pos);
            pos = sync_end;
            if self.decode_gcr_byte(ht, pos) == 0x08 {
                // header block
                let checksum = self.decode_gcr_byte(ht, pos + 10);
                let sector = self.decode_gcr_byte(ht, pos + 20) as usize;
                let header_track = self.decode_gcr_byte(ht, pos + 30) as usize;
                let id2 = self.decode_gcr_byte(ht, pos + 40);
                let id1 = self.decode_gcr_byte(ht, pos + 50);
                if header_track != track || sector >= count {
                    pos += 10;
                    continue;
                }
                if checksum != (sector as u8 ^ header_track as u8 ^ id2 ^ id1) {
                    sector_errors[sector] = DiskError::HeaderBlockChecksum;
                    pos += 10;
                    continue;
                }
                // data block follows after its own sync mark
                let data_sync = match self.find_sync(ht, pos + 80, length) {
                    Some(end) => end,
                    None => {
                        sector_errors[sector] = DiskError::NoSyncSequence;
                        continue;
                    }
                };
                if self.decode_gcr_byte(ht, data_sync) != 0x07 {
                    sector_errors[sector] = DiskError::DataBlockNotFound;
                    pos = data_sync;
                    continue;
                }
                let mut data = [0u8; 256];
                let mut checksum = 0u8;
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = self.decode_gcr_byte(ht, data_sync + 10 + 10 * i as u32);
                    checksum ^= *byte;
                }
                let stored_checksum = self.decode_gcr_byte(ht, data_sync + 10 + 10 * 256);
                if checksum != stored_checksum {
                    sector_errors[sector] = DiskError::DataBlockChecksum;
                } else if sector_data[sector].is_none() {
                    sector_data[sector] = Some(data);
                    sector_errors[sector] = DiskError::Ok;
                }
                pos = data_sync + 10 * 260;
            } else {
                pos += 10;
            }
            if sector_data.iter().all(|s| s.is_some()) {
                break;
            }
        }
        for (sector, data) in sector_data.iter().enumerate() {
            match data {
                Some(bytes) => out.extend_from_slice(bytes),
                None => out.extend_from_slice(&[0u8; 256]),
            }
            errors.push(sector_errors[sector]);
        }
        Ok(())
    }

    /// Converts the disk back into a D64 compatible byte stream.
    pub fn decode(&self, num_tracks: usize) -> Result<(Vec<u8>, Vec<DiskError>), GcrError> {
        let mut out = Vec::with_capacity(num_tracks * 21 * 256);
        let mut errors = Vec::new();
        for track in 1..=num_tracks {
            self.decode_track(track, &mut out, &mut errors)?;
        }
        Ok((out, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcr_roundtrip_all_nibbles() {
        for value in 0..16u8 {
            assert_eq!(value, gcr2bin(bin2gcr(value)));
        }
    }

    #[test]
    fn gcr_codewords_are_valid() {
        for value in 0..16u8 {
            assert!(is_gcr(bin2gcr(value)));
        }
        for codeword in 0..32u8 {
            if is_gcr(codeword) {
                assert_eq!(codeword, bin2gcr(gcr2bin(codeword)));
            }
        }
    }

    #[test]
    fn gcr_codewords_never_start_or_end_with_two_zeros() {
        for value in 0..16u8 {
            let codeword = bin2gcr(value);
            assert_ne!(0, codeword & 0b11000, "codeword {:02x}", codeword);
            assert_ne!(0, codeword & 0b00011, "codeword {:02x}", codeword);
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut disk = Disk::new();
        let sectors = |track: usize, sector: usize| {
            let mut data = [0u8; 256];
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = (track as u8)
                    .wrapping_mul(7)
                    .wrapping_add(sector as u8)
                    .wrapping_add(i as u8);
            }
            data
        };
        disk.encode(35, &sectors, (0x4f, 0x58));
        let (decoded, errors) = disk.decode(35).unwrap();
        assert!(errors.iter().all(|e| *e == DiskError::Ok));
        let mut offset = 0;
        for track in 1..=35usize {
            for sector in 0..num_sectors(track) {
                let expected = sectors(track, sector);
                assert_eq!(
                    &expected[..],
                    &decoded[offset..offset + 256],
                    "track {} sector {}",
                    track,
                    sector
                );
                offset += 256;
            }
        }
    }

    #[test]
    fn corrupted_data_block_reports_checksum_error() {
        let mut disk = Disk::new();
        let sectors = |_: usize, _: usize| [0x42u8; 256];
        disk.encode(1, &sectors, (0x30, 0x31));
        // flip a bit inside the first data block
        let sync = disk.find_sync(1, 0, disk.length[1]).unwrap();
        let data_sync = disk.find_sync(1, sync + 80, disk.length[1]).unwrap();
        let bit = disk.read_bit(1, data_sync + 25);
        disk.write_bit(1, data_sync + 25, !bit);
        let mut out = Vec::new();
        let mut errors = Vec::new();
        disk.decode_track(1, &mut out, &mut errors).unwrap();
        assert_eq!(DiskError::DataBlockChecksum, errors[0]);
    }
}
