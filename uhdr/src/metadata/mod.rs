//! Gain map metadata serialization: XMP, MPF and HEIF rational records.

pub mod iso;
pub mod mpf;
pub mod xmp;

pub use iso::{Fraction, IsoGainMapRecord};
pub use mpf::MpfEntry;
