//! Transaction seam between the programming core and a physical transport.

use crate::Result;

/// Module identity structure exactly as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawModuleInfo {
    pub os_version: u8,
    /// Little-endian OS build number.
    pub os_build: [u8; 2],
    /// Packed MCU type (low 3 bits) and module series (high nibble).
    pub pic_type: u8,
}

/// Byte-oriented channel to a TR module.
///
/// Implementations (USB-CDC, SPI, test fakes) own transport framing,
/// retries and timing. The core issues exactly one blocking transaction at
/// a time; requests are `[selector, payload...]` with the selector byte
/// combining a programming target and a direction bit.
pub trait Channel {
    fn enter_programming_mode(&mut self) -> Result<()>;

    fn terminate_programming_mode(&mut self) -> Result<()>;

    /// Send `data` to the memory target addressed by `selector`.
    fn upload(&mut self, selector: u8, data: &[u8]) -> Result<()>;

    /// Request a read from the target addressed by `selector`. Returns the
    /// device's response payload.
    fn download(&mut self, selector: u8, request: &[u8]) -> Result<Vec<u8>>;

    /// Read the module identity. Only answered outside programming mode.
    fn module_info(&mut self) -> Result<RawModuleInfo>;
}
