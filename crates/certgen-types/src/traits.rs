//! Core trait definitions for certgen abstractions.

use crate::errors::Result;

/// Sink for generated material.
///
/// The bootstrap core needs exactly one operation from its storage: write a
/// named blob with a permission mode. Paths are logical and `/`-separated
/// (for example `etc/origin/master/ca.crt`). Implementations report failure
/// immediately; there is no staging or commit step, so an error part way
/// through a run can leave a partially-written tree behind.
pub trait Filesystem {
    /// Write `data` to `path` with permission bits `mode`.
    fn write_file(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()>;
}

impl<F: Filesystem + ?Sized> Filesystem for &mut F {
    fn write_file(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        (**self).write_file(path, data, mode)
    }
}

impl<F: Filesystem + ?Sized> Filesystem for Box<F> {
    fn write_file(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        (**self).write_file(path, data, mode)
    }
}
