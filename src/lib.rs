pub mod channel;
pub mod error;
pub mod files;
pub mod hexfile;
pub mod module_info;
pub mod session;

pub use channel::{Channel, RawModuleInfo};
pub use error::{Error, Result};
pub use files::{ConfigSource, SpecialImage};
pub use hexfile::HexRecord;
pub use module_info::{ModuleInfo, TrMcu, TrSeries};
pub use session::{Direction, FlashBounds, ProgrammingTarget, TrSession};

use strum::{Display, EnumString};

/// TR memory regions addressable through the hex record file format.
///
/// The kind selects both the grouping policy applied to a parsed file and
/// the address/length rules the session enforces per write.
#[derive(EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum MemoryKind {
    #[cfg_attr(feature = "cli", clap(name = "flash"))]
    Flash,
    #[cfg_attr(feature = "cli", clap(name = "internal_eeprom"))]
    InternalEeprom,
    #[cfg_attr(feature = "cli", clap(name = "external_eeprom"))]
    ExternalEeprom,
}
