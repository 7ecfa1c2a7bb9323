//! Whole-file operations composed from the record layer and the session.

use crate::channel::Channel;
use crate::hexfile::{self, HexRecord};
use crate::module_info::ModuleInfo;
use crate::session::TrSession;
use crate::{Error, MemoryKind, Result};
use std::fs;
use std::path::Path;

/// Memory is read back from the device in strides of this many bytes.
const DOWNLOAD_BLOCK_LEN: u32 = 32;

/// Number of raw bytes in a configuration file: 32 HWP configuration bytes
/// followed by the RFPMG byte.
const CONFIG_FILE_LEN: usize = 33;

/// Already-validated configuration to be applied to a module.
///
/// Parsing the configuration file grammar is the front-end's concern; the
/// core only needs the resulting bytes plus a hook to validate the channel
/// settings against the RF band reported by the device.
pub trait ConfigSource {
    /// The 32 HWP configuration bytes, including the leading checksum byte.
    fn data(&self) -> &[u8];

    fn rfpmg(&self) -> u8;

    /// Check the configured channels against the module's RF band.
    fn check_channels(&self, rfband: u8) -> Result<()>;
}

/// Already-parsed stream of 18-byte special records.
///
/// The image file grammar is the front-end's concern; the core asks it
/// whether the connected module is among the types the image supports.
pub trait SpecialImage {
    fn is_compatible(&self, info: &ModuleInfo) -> bool;

    /// The 18-byte records, in upload order.
    fn records(&self) -> &[Vec<u8>];
}

impl<C: Channel> TrSession<'_, C> {
    /// Upload a hex image file into the given memory kind, block by block
    /// in file order.
    pub fn upload_hex(&mut self, kind: MemoryKind, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tracing::info!("uploading {kind} image from {}", path.display());
        let blocks = hexfile::read_hex_file(path, kind)?;
        for block in &blocks {
            match kind {
                MemoryKind::Flash => self.upload_flash(block.addr, &block.data)?,
                MemoryKind::InternalEeprom => {
                    self.upload_internal_eeprom(block.addr, &block.data)?
                }
                MemoryKind::ExternalEeprom => {
                    self.upload_external_eeprom(block.addr, &block.data)?
                }
            }
        }
        Ok(())
    }

    /// Read `len` bytes starting at `addr` from the given memory kind and
    /// serialize them as a hex image file.
    pub fn download_hex(
        &mut self,
        kind: MemoryKind,
        addr: u32,
        len: u32,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        tracing::info!(
            "downloading {len} bytes of {kind} at {addr:#06x} into {}",
            path.display()
        );

        let mut blocks = Vec::new();
        let end = addr + len;
        let mut pos = addr;
        while pos < end {
            let mut data = match kind {
                MemoryKind::Flash => self.download_flash(pos)?,
                MemoryKind::InternalEeprom => self.download_internal_eeprom(pos)?,
                MemoryKind::ExternalEeprom => self.download_external_eeprom(pos)?,
            };
            // The final block covers only the remaining bytes.
            if pos + DOWNLOAD_BLOCK_LEN > end {
                data.truncate((end - pos) as usize);
            }
            blocks.push(HexRecord { addr: pos, data });
            pos += DOWNLOAD_BLOCK_LEN;
        }

        hexfile::write_hex_file(path, &blocks)
    }

    /// Upload a stream of special records, gated on the module identity.
    ///
    /// The identity query is only answered outside programming mode, so the
    /// session drops out of it for the query and re-enters before
    /// uploading.
    pub fn upload_special_image(&mut self, image: &impl SpecialImage) -> Result<()> {
        self.terminate()?;
        let info = self.module_info()?;
        self.enter()?;

        if !image.is_compatible(&info) {
            return Err(Error::protocol(format!(
                "special-record image does not support the connected module \
                 ({} {} with OS {:#04x} build {:#06x})",
                info.series, info.mcu, info.os_version, info.os_build
            )));
        }

        tracing::info!(
            "uploading {} special records to {} {}",
            image.records().len(),
            info.series,
            info.mcu
        );
        for record in image.records() {
            self.upload_special(record)?;
        }
        Ok(())
    }

    /// Apply a parsed configuration: validate its channel settings against
    /// the module's RF band, then upload the HWP block and the RFPMG byte.
    pub fn upload_config(&mut self, source: &impl ConfigSource) -> Result<()> {
        let rfband = self.download_rfband()?;
        source.check_channels(rfband)?;
        self.upload_cfg(source.data())?;
        self.upload_rfpmg(source.rfpmg())
    }

    /// Read the HWP configuration block plus the RFPMG byte and store them
    /// as a 33-byte raw file.
    pub fn download_config(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tracing::info!("downloading configuration into {}", path.display());

        let mut out = self.download_cfg()?;
        out.push(self.download_rfpmg()?);
        debug_assert_eq!(out.len(), CONFIG_FILE_LEN);
        fs::write(path, &out)?;
        Ok(())
    }
}
