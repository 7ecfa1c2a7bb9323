//! Decoding of the raw module identity reported by a TR device.

use crate::channel::RawModuleInfo;
use crate::{Error, Result};
use strum::Display;

/// MCU fitted in the TR module.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrMcu {
    #[strum(to_string = "PIC16F1938")]
    Pic16f1938,
}

/// TR module series.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrSeries {
    #[strum(to_string = "DCTR-5xD")]
    Dctr5xD,
    #[strum(to_string = "DCTR-7xD")]
    Dctr7xD,
}

/// Decoded module identity, used to gate special-record uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub os_version: u8,
    pub os_build: u16,
    pub mcu: TrMcu,
    pub series: TrSeries,
}

impl ModuleInfo {
    pub fn from_raw(raw: &RawModuleInfo) -> Result<Self> {
        let mcu = match raw.pic_type & 0x7 {
            4 => TrMcu::Pic16f1938,
            other => {
                return Err(Error::protocol(format!(
                    "unknown MCU type reported by TR: {other}"
                )));
            }
        };

        let series = match raw.pic_type >> 4 {
            0 | 1 | 3 | 8..=10 => TrSeries::Dctr5xD,
            2 | 11 => TrSeries::Dctr7xD,
            other => {
                return Err(Error::protocol(format!(
                    "unknown module series reported by TR: {other}"
                )));
            }
        };

        Ok(Self {
            os_version: raw.os_version,
            os_build: u16::from_le_bytes(raw.os_build),
            mcu,
            series,
        })
    }
}
