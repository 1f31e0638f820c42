//! Gain map generation and application.

pub mod apply;
pub mod generate;
mod sample;

pub use apply::{apply_gainmap, OutputFormat};
pub use generate::generate_gainmap;
pub use sample::ShepardsIdw;
