//! Programming-mode session and per-target memory operations.
//!
//! Every operation validates its target's address, alignment and length
//! contract before anything is put on the wire, and refuses to run unless
//! the session is in programming mode.

use crate::channel::Channel;
use crate::module_info::ModuleInfo;
use crate::{Error, Result};
use std::ops::RangeInclusive;
use strum::Display;

const CFG_LEN: usize = 32;
const CFG_CHKSUM_INIT: u8 = 0x5F;
const ACCESS_PWD_LEN: usize = 16;
const USER_KEY_LEN: usize = 16;
// Flash writes land on 16-word boundaries, i.e. 32-byte boundaries.
const FLASH_UP_BYTE_MODULO: u32 = 32;
const FLASH_DOWN_MODULO: u32 = 32;
const FLASH_LEN: usize = 32;
const INT_EEPROM_UP_HIGH: u32 = 0x00BF;
const INT_EEPROM_UP_ADDR_LEN_MAX: u32 = 0x00C0;
const INT_EEPROM_UP_LEN_MIN: usize = 1;
const INT_EEPROM_UP_LEN_MAX: usize = 32;
const INT_EEPROM_DOWN_HIGH: u32 = 0x00A0;
const INT_EEPROM_DOWN_LEN: usize = 32;
const EXT_EEPROM_UP_HIGH: u32 = 0x3FE0;
const EXT_EEPROM_DOWN_HIGH: u32 = 0x7FE0;
const EXT_EEPROM_MODULO: u32 = 32;
const EXT_EEPROM_LEN: usize = 32;
const SPECIAL_LEN: usize = 18;

/// Transfer direction bit OR'd into the wire selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Download = 0x00,
    Upload = 0x80,
}

/// Device memory targets addressable by the programming protocol.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProgrammingTarget {
    Cfg = 0x00,
    Rfpmg = 0x01,
    Rfband = 0x02,
    AccessPwd = 0x03,
    UserKey = 0x04,
    Flash = 0x05,
    InternalEeprom = 0x06,
    ExternalEeprom = 0x07,
    Special = 0x08,
}

impl ProgrammingTarget {
    /// Wire selector byte for this target in the given direction.
    pub fn selector(self, direction: Direction) -> u8 {
        self as u8 | direction as u8
    }
}

/// Word-address windows accepted for flash writes and reads.
///
/// The upper limits follow the vendor documentation as currently known and
/// may need adjustment per module revision, so they are carried as session
/// configuration instead of hardened constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashBounds {
    /// Application flash area.
    pub app: RangeInclusive<u32>,
    /// Extended flash area.
    pub ext: RangeInclusive<u32>,
}

impl FlashBounds {
    fn contains(&self, addr: u32) -> bool {
        self.app.contains(&addr) || self.ext.contains(&addr)
    }
}

impl Default for FlashBounds {
    fn default() -> Self {
        Self {
            app: 0x3A00..=0x3FFF,
            ext: 0x2C00..=0x37BF,
        }
    }
}

fn cfg_checksum(data: &[u8]) -> u8 {
    data[1..].iter().fold(CFG_CHKSUM_INIT, |acc, b| acc ^ b)
}

fn addressed_payload(addr: u32, data: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + data.len());
    msg.extend_from_slice(&(addr as u16).to_le_bytes());
    msg.extend_from_slice(data);
    msg
}

/// One programming session over a borrowed channel.
///
/// The session tracks whether the device is in programming mode and gates
/// every transfer on it. Callers must make sure [`TrSession::terminate`]
/// runs on every exit path, or wrap the work in
/// [`TrSession::run_programmed`].
pub struct TrSession<'a, C: Channel> {
    channel: &'a mut C,
    prg_mode: bool,
    flash_bounds: FlashBounds,
}

impl<'a, C: Channel> TrSession<'a, C> {
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            channel,
            prg_mode: false,
            flash_bounds: FlashBounds::default(),
        }
    }

    pub fn with_flash_bounds(channel: &'a mut C, flash_bounds: FlashBounds) -> Self {
        Self {
            channel,
            prg_mode: false,
            flash_bounds,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.prg_mode
    }

    /// Enter programming mode. No-op when already entered.
    pub fn enter(&mut self) -> Result<()> {
        if !self.prg_mode {
            tracing::debug!("entering programming mode");
            self.channel.enter_programming_mode()?;
            self.prg_mode = true;
        }
        Ok(())
    }

    /// Terminate programming mode. No-op when already terminated.
    pub fn terminate(&mut self) -> Result<()> {
        if self.prg_mode {
            tracing::debug!("terminating programming mode");
            self.channel.terminate_programming_mode()?;
            self.prg_mode = false;
        }
        Ok(())
    }

    /// Run `f` inside programming mode, terminating it again on both the
    /// success and the failure path. The first error wins.
    pub fn run_programmed<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        let result = f(self);
        match self.terminate() {
            Ok(()) => result,
            Err(term_err) => result.and(Err(term_err)),
        }
    }

    /// Decode the connected module's identity. The device only answers this
    /// query outside programming mode.
    pub fn module_info(&mut self) -> Result<ModuleInfo> {
        let raw = self.channel.module_info()?;
        ModuleInfo::from_raw(&raw)
    }

    fn require_armed(&self) -> Result<()> {
        if !self.prg_mode {
            return Err(Error::protocol("TR is not in programming mode"));
        }
        Ok(())
    }

    fn upload_to(&mut self, target: ProgrammingTarget, data: &[u8]) -> Result<()> {
        let selector = target.selector(Direction::Upload);
        tracing::debug!(
            "upload {target}: selector {selector:#04x}, {} bytes",
            data.len()
        );
        self.channel.upload(selector, data)
    }

    fn download_from(&mut self, target: ProgrammingTarget, request: &[u8]) -> Result<Vec<u8>> {
        let selector = target.selector(Direction::Download);
        tracing::debug!("download {target}: selector {selector:#04x}");
        self.channel.download(selector, request)
    }

    /// Upload the 32-byte HWP configuration block.
    pub fn upload_cfg(&mut self, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if data.len() != CFG_LEN {
            return Err(Error::protocol(
                "HWP configuration data must be 32 bytes long",
            ));
        }
        if cfg_checksum(data) != data[0] {
            return Err(Error::protocol("invalid HWP configuration checksum"));
        }
        self.upload_to(ProgrammingTarget::Cfg, data)
    }

    /// Download the 32-byte HWP configuration block.
    pub fn download_cfg(&mut self) -> Result<Vec<u8>> {
        self.require_armed()?;
        let data = self.download_from(ProgrammingTarget::Cfg, &[])?;
        if data.len() != CFG_LEN {
            return Err(Error::protocol(
                "invalid length of downloaded HWP configuration data",
            ));
        }
        if cfg_checksum(&data) != data[0] {
            return Err(Error::protocol(
                "invalid checksum in downloaded HWP configuration data",
            ));
        }
        Ok(data)
    }

    pub fn upload_rfpmg(&mut self, rfpmg: u8) -> Result<()> {
        self.require_armed()?;
        self.upload_to(ProgrammingTarget::Rfpmg, &[rfpmg])
    }

    pub fn download_rfpmg(&mut self) -> Result<u8> {
        self.require_armed()?;
        let data = self.download_from(ProgrammingTarget::Rfpmg, &[])?;
        if data.len() != 1 {
            return Err(Error::protocol("malformed RFPMG response length"));
        }
        Ok(data[0])
    }

    pub fn upload_rfband(&mut self, rfband: u8) -> Result<()> {
        self.require_armed()?;
        self.upload_to(ProgrammingTarget::Rfband, &[rfband])
    }

    pub fn download_rfband(&mut self) -> Result<u8> {
        self.require_armed()?;
        let data = self.download_from(ProgrammingTarget::Rfband, &[])?;
        if data.len() != 1 {
            return Err(Error::protocol("malformed RF band response length"));
        }
        Ok(data[0])
    }

    pub fn upload_access_pwd(&mut self, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if data.len() != ACCESS_PWD_LEN {
            return Err(Error::protocol("access password must be 16 bytes long"));
        }
        self.upload_to(ProgrammingTarget::AccessPwd, data)
    }

    pub fn upload_user_key(&mut self, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if data.len() != USER_KEY_LEN {
            return Err(Error::protocol("user key must be 16 bytes long"));
        }
        self.upload_to(ProgrammingTarget::UserKey, data)
    }

    /// Write one 32-byte flash block. `addr` is a byte address; the wire
    /// carries the 16-bit word address.
    pub fn upload_flash(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if addr % FLASH_UP_BYTE_MODULO != 0 {
            return Err(Error::protocol(
                "flash write address must be a multiple of 16 words",
            ));
        }
        let word_addr = addr / 2;
        if !self.flash_bounds.contains(word_addr) {
            return Err(Error::protocol(
                "flash address is outside the application and extended areas",
            ));
        }
        if data.len() != FLASH_LEN {
            return Err(Error::protocol("flash write data must be 32 bytes long"));
        }
        let msg = addressed_payload(word_addr, data);
        self.upload_to(ProgrammingTarget::Flash, &msg)
    }

    /// Read one flash block at a 32-byte-aligned byte address.
    pub fn download_flash(&mut self, addr: u32) -> Result<Vec<u8>> {
        self.require_armed()?;
        if addr % FLASH_DOWN_MODULO != 0 {
            return Err(Error::protocol(
                "flash read address must be a multiple of 32 bytes",
            ));
        }
        if !self.flash_bounds.contains(addr) {
            return Err(Error::protocol(
                "flash address is outside the application and extended areas",
            ));
        }
        let request = addressed_payload(addr, &[]);
        self.download_from(ProgrammingTarget::Flash, &request)
    }

    /// Write 1 to 32 bytes of internal EEPROM.
    pub fn upload_internal_eeprom(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if addr > INT_EEPROM_UP_HIGH {
            return Err(Error::protocol(
                "internal EEPROM address is outside the addressable range",
            ));
        }
        if addr + data.len() as u32 >= INT_EEPROM_UP_ADDR_LEN_MAX {
            return Err(Error::protocol(
                "internal EEPROM write runs past the addressable range",
            ));
        }
        if data.len() < INT_EEPROM_UP_LEN_MIN || data.len() > INT_EEPROM_UP_LEN_MAX {
            return Err(Error::protocol(
                "internal EEPROM write data must be 1 to 32 bytes long",
            ));
        }
        let msg = addressed_payload(addr, data);
        self.upload_to(ProgrammingTarget::InternalEeprom, &msg)
    }

    /// Read one 32-byte internal EEPROM block.
    pub fn download_internal_eeprom(&mut self, addr: u32) -> Result<Vec<u8>> {
        self.require_armed()?;
        if addr > INT_EEPROM_DOWN_HIGH {
            return Err(Error::protocol(
                "internal EEPROM address is outside the addressable range",
            ));
        }
        let request = addressed_payload(addr, &[]);
        let data = self.download_from(ProgrammingTarget::InternalEeprom, &request)?;
        if data.len() != INT_EEPROM_DOWN_LEN {
            return Err(Error::protocol(
                "internal EEPROM read must return 32 bytes",
            ));
        }
        Ok(data)
    }

    /// Write one 32-byte external EEPROM block.
    pub fn upload_external_eeprom(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if addr > EXT_EEPROM_UP_HIGH {
            return Err(Error::protocol(
                "external EEPROM address is outside the addressable range",
            ));
        }
        if addr % EXT_EEPROM_MODULO != 0 {
            return Err(Error::protocol(
                "external EEPROM address must be a multiple of 32 bytes",
            ));
        }
        if data.len() != EXT_EEPROM_LEN {
            return Err(Error::protocol(
                "external EEPROM write data must be 32 bytes long",
            ));
        }
        let msg = addressed_payload(addr, data);
        self.upload_to(ProgrammingTarget::ExternalEeprom, &msg)
    }

    /// Read one 32-byte external EEPROM block.
    pub fn download_external_eeprom(&mut self, addr: u32) -> Result<Vec<u8>> {
        self.require_armed()?;
        if addr > EXT_EEPROM_DOWN_HIGH {
            return Err(Error::protocol(
                "external EEPROM address is outside the addressable range",
            ));
        }
        if addr % EXT_EEPROM_MODULO != 0 {
            return Err(Error::protocol(
                "external EEPROM address must be a multiple of 32 bytes",
            ));
        }
        let request = addressed_payload(addr, &[]);
        let data = self.download_from(ProgrammingTarget::ExternalEeprom, &request)?;
        if data.len() != EXT_EEPROM_LEN {
            return Err(Error::protocol(
                "external EEPROM read must return 32 bytes",
            ));
        }
        Ok(data)
    }

    /// Upload one 18-byte special record.
    pub fn upload_special(&mut self, data: &[u8]) -> Result<()> {
        self.require_armed()?;
        if data.len() != SPECIAL_LEN {
            return Err(Error::protocol("special record must be 18 bytes long"));
        }
        self.upload_to(ProgrammingTarget::Special, data)
    }
}
