// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::Path;

use crate::crt;
use crate::d64;
use crate::g64;
use crate::p00;
use crate::prg;
use crate::t64;
use crate::tap;
use crate::Loader;

pub struct Loaders;

impl Loaders {
    pub fn from_ext(ext: Option<&str>) -> Result<Box<dyn Loader>, String> {
        match ext.map(|s| s.to_lowercase()).as_deref() {
            Some("crt") => Ok(Box::new(crt::CrtLoader::new())),
            Some("d64") => Ok(Box::new(d64::D64Loader::new())),
            Some("g64") => Ok(Box::new(g64::G64Loader::new())),
            Some("p00") => Ok(Box::new(p00::P00Loader::new())),
            Some("prg") => Ok(Box::new(prg::PrgLoader::new())),
            Some("t64") => Ok(Box::new(t64::T64Loader::new())),
            Some("tap") => Ok(Box::new(tap::TapLoader::new())),
            _ => Err(format!("unknown image format {}", ext.unwrap_or(""))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Box<dyn Loader>, String> {
        let ext = path.extension().map(|s| s.to_str().unwrap_or(""));
        Loaders::from_ext(ext)
    }
}
