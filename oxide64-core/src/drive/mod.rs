// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

mod disk;
mod iec;
mod vc1541;
mod via;

pub use self::disk::{Disk, DiskError, GcrError, NUM_HALFTRACKS};
pub use self::iec::IecBus;
pub use self::vc1541::Drive;
pub use self::via::Via;
