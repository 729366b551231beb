// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod bin;
mod crt;
mod d64;
mod g64;
mod loaders;
mod p00;
mod prg;
mod t64;
mod tap;

use std::io;
use std::path::Path;

use oxide64_system::{AutostartMethod, Image};

pub use self::bin::BinLoader;
pub use self::loaders::Loaders;

pub trait Loader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error>;
    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error>;
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
