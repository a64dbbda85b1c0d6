use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::error::ZipError;
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Upper bound on how far DEFLATE can expand its input
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Read-only view of a ZIP archive with its central directory loaded
pub struct ZipArchive<'a, R: ReadAt + ?Sized> {
    parser: ZipParser<'a, R>,
    entries: Vec<ZipFileEntry>,
}

impl<'a, R: ReadAt + ?Sized> ZipArchive<'a, R> {
    /// Open an archive, reading its central directory
    pub fn new(reader: &'a R) -> Result<Self, ZipError> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files()?;
        Ok(Self { parser, entries })
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Find an entry by its exact name.
    ///
    /// When the name occurs more than once the last occurrence wins.
    pub fn by_name(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.is_directory && e.file_name == name)
    }

    /// Extract file data to memory, verifying size and CRC-32
    pub fn read_entry(&self, entry: &ZipFileEntry) -> Result<Vec<u8>, ZipError> {
        if entry.is_encrypted() {
            return Err(ZipError::Encrypted(entry.file_name.clone()));
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(ZipError::UnsupportedCompression(method));
        }

        let data_offset = self.parser.get_data_offset(entry)?;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut raw)?;

        let data = match entry.compression_method {
            CompressionMethod::Deflate => {
                // The recorded size is untrusted: reserve no more than deflate can
                // expand the input to, and read one byte past it to detect overruns
                let capacity = entry
                    .uncompressed_size
                    .min((raw.len() as u64).saturating_mul(MAX_DEFLATE_RATIO));
                let mut out = Vec::with_capacity(capacity as usize);
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| {
                        ZipError::Corrupt(format!(
                            "invalid deflate stream in '{}': {}",
                            entry.file_name, e
                        ))
                    })?;
                out
            }
            _ => raw,
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(ZipError::Corrupt(format!(
                "'{}' is {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            )));
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(ZipError::ChecksumMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }
}
