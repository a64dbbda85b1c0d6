use std::path::Path;

use crate::description::{AttributeMap, parse_description};
use crate::error::{GdtfError, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::ZipArchive;

/// Name of the fixture description inside a GDTF archive
pub const DESCRIPTION_ENTRY: &str = "description.xml";

/// Extract the flattened attributes of a GDTF file.
///
/// Opens the archive at `path`, reads `description.xml`, and merges the
/// attributes of the root element and its direct children into one map.
/// The file is closed before this function returns, whether it succeeds
/// or not.
///
/// # Errors
///
/// See [`ErrorKind`](crate::ErrorKind) for the four failure categories.
pub fn extract(path: impl AsRef<Path>) -> Result<AttributeMap> {
    let path = path.as_ref();
    let reader = LocalFileReader::new(path).map_err(|source| GdtfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    extract_from_reader(&reader, path)
}

/// Extract from an already opened source.
///
/// `source` is only used to label errors.
pub fn extract_from_reader<R: ReadAt + ?Sized>(reader: &R, source: &Path) -> Result<AttributeMap> {
    let archive =
        ZipArchive::new(reader).map_err(|e| GdtfError::from_zip(source.to_path_buf(), e))?;

    let entry = archive
        .by_name(DESCRIPTION_ENTRY)
        .ok_or_else(|| GdtfError::MissingEntry {
            path: source.to_path_buf(),
            entry: DESCRIPTION_ENTRY.to_string(),
        })?;
    tracing::debug!(
        path = %source.display(),
        compressed = entry.compressed_size,
        uncompressed = entry.uncompressed_size,
        "found {}",
        DESCRIPTION_ENTRY
    );

    let bytes = archive
        .read_entry(entry)
        .map_err(|e| GdtfError::from_zip(source.to_path_buf(), e))?;

    let attributes =
        parse_description(&bytes).map_err(|source_err| GdtfError::MalformedDocument {
            path: source.to_path_buf(),
            entry: DESCRIPTION_ENTRY.to_string(),
            source: source_err,
        })?;

    tracing::debug!(path = %source.display(), attributes = attributes.len(), "extracted");
    Ok(attributes)
}
