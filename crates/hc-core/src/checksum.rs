//! Content checksums for change detection.
//!
//! Checksums are hex-encoded MD5 digests, matching the format stored by the
//! metadata store and expected by the server adapter. They identify content,
//! they are not a security boundary.

use std::fs::File;
use std::io;

use camino::Utf8Path;

/// Computes the hex-encoded MD5 digest of a file's content.
///
/// The file is streamed, so large files are not loaded into memory.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
///
/// # Examples
///
/// ```no_run
/// use hc_core::file_checksum;
/// use camino::Utf8Path;
///
/// let digest = file_checksum(Utf8Path::new("/watch/a.txt"))?;
/// assert_eq!(digest.len(), 32);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn file_checksum(path: &Utf8Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    io::copy(&mut file, &mut context)?;
    Ok(format!("{:x}", context.compute()))
}
