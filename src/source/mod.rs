mod file;

pub use file::FileSource;

use anyhow::Result;

/// Trait for places an encoded photograph can come from
pub trait ImageSource {
    /// Read the encoded image bytes
    fn read_image(&mut self) -> Result<Vec<u8>>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}
