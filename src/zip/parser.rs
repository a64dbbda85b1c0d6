//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read the entry's Local File Header to find its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::ZipError;
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Borrows its reader, so whoever owns the reader decides when the
/// underlying file is closed. Typically used through
/// [`ZipArchive`](super::ZipArchive) rather than directly.
pub struct ZipParser<'a, R: ReadAt + ?Sized> {
    /// The underlying data source
    reader: &'a R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<'a, R: ReadAt + ?Sized> ZipParser<'a, R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: &'a R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// [`ZipError::NotZip`] if no valid EOCD can be found.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64), ZipError> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(ZipError::NotZip);
        }

        // Common case first: no archive comment
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf)?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // The EOCD is followed by a comment or trailing data; search backwards for it
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf)?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment must fit in what follows; anything beyond it is ignored
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len <= buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ZipError::NotZip)
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has fields set to 0xFFFF or 0xFFFFFFFF.
    ///
    /// # Returns
    ///
    /// A tuple of (ZIP64 EOCD record, offset it was found at).
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<(Zip64EOCD, u64), ZipError> {
        // The locator sits immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| ZipError::Corrupt("missing ZIP64 locator".to_string()))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut locator_buf)?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        // Usually the record directly precedes the locator. Looking there first
        // also finds it when data was prepended and the recorded offset is stale.
        let adjacent = locator_offset.checked_sub(Zip64EOCD::MIN_SIZE as u64);
        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        for offset in adjacent.into_iter().chain([locator.eocd64_offset]) {
            match self.reader.read_exact_at(offset, &mut eocd64_buf) {
                Ok(()) if &eocd64_buf[0..4] == Zip64EOCD::SIGNATURE => {
                    return Ok((Zip64EOCD::from_bytes(&eocd64_buf)?, offset));
                }
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(ZipError::Io(e)),
            }
        }

        Err(ZipError::Corrupt(
            "invalid ZIP64 end of central directory".to_string(),
        ))
    }

    /// List all entries in the ZIP archive, in central directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>, ZipError> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        if eocd.is_multi_disk() {
            return Err(ZipError::Corrupt(
                "multi-disk archives are not supported".to_string(),
            ));
        }

        // `cd_end` is where the directory must stop: the first end record
        let (cd_offset, cd_size, total_entries, cd_end) = if eocd.is_zip64() {
            let (eocd64, eocd64_offset) = self.read_zip64_eocd(eocd_offset)?;
            (
                eocd64.cd_offset,
                eocd64.cd_size,
                eocd64.total_entries,
                eocd64_offset,
            )
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
                eocd_offset,
            )
        };

        // Refuse to allocate for a directory that cannot fit in the file
        let recorded_end = cd_offset
            .checked_add(cd_size)
            .filter(|&end| end <= cd_end)
            .ok_or_else(|| {
                ZipError::Corrupt("central directory lies outside the archive".to_string())
            })?;
        if total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size {
            return Err(ZipError::Corrupt(format!(
                "central directory of {} bytes cannot hold {} entries",
                cd_size, total_entries
            )));
        }

        // Bytes prepended to the archive (e.g. a self-extractor stub) shift
        // every recorded offset by the same amount
        let prefix = cd_end - recorded_end;

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset + prefix, &mut cd_data)?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            let mut entry = self.parse_cdfh(&mut cursor)?;
            entry.lfh_offset = entry.lfh_offset.checked_add(prefix).ok_or_else(|| {
                ZipError::Corrupt(format!(
                    "local header offset of '{}' overflows",
                    entry.file_name
                ))
            })?;
            entries.push(entry);
        }

        tracing::debug!(
            entries = entries.len(),
            cd_offset,
            cd_size,
            prefix,
            "read central directory"
        );

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry, ZipError> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(ZipError::Corrupt(
                "invalid central directory file header".to_string(),
            ));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Non-UTF8 names can never equal an ASCII entry name, lossy is fine
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        let is_directory = file_name.ends_with('/');

        // ZIP64 extended information lives in extra field 0x0001
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;
            let field_end = cursor.position() + field_size as u64;

            if header_id == 0x0001 {
                // Present only for header fields saturated at 0xFFFFFFFF
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);
        if cursor.position() > cursor.get_ref().len() as u64 {
            return Err(ZipError::Corrupt(format!(
                "central directory entry '{}' is truncated",
                file_name
            )));
        }

        Ok(ZipFileEntry {
            file_name,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header has its own name and extra field lengths,
    /// which may differ from the Central Directory entry.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64, ZipError> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::Corrupt(format!(
                "invalid local file header for '{}'",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset
            .checked_add(entry.compressed_size)
            .is_none_or(|end| end > self.size)
        {
            return Err(ZipError::Corrupt(format!(
                "data for '{}' extends past end of archive",
                entry.file_name
            )));
        }

        Ok(data_offset)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &'a R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One stored entry named `a.txt` holding `hi`, followed by `comment`
    fn tiny_zip(comment: &[u8]) -> Vec<u8> {
        let name = b"a.txt";
        let data = b"hi";
        let crc = {
            let mut c = flate2::Crc::new();
            c.update(data);
            c.sum()
        };

        let mut out = Vec::new();
        out.extend_from_slice(LFH_SIGNATURE);
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(data);

        let cd_offset = out.len() as u32;
        out.extend_from_slice(CDFH_SIGNATURE);
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(name);
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }

    #[test]
    fn test_list_files() {
        let zip = tiny_zip(b"");
        let parser = ZipParser::new(zip.as_slice());
        let entries = parser.list_files().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "a.txt");
        assert_eq!(entries[0].uncompressed_size, 2);
        assert!(!entries[0].is_directory);
        assert_eq!(parser.get_data_offset(&entries[0]).unwrap(), 35);
    }

    #[test]
    fn test_find_eocd_with_comment() {
        let zip = tiny_zip(b"fixture archive comment");
        let parser = ZipParser::new(zip.as_slice());
        let (eocd, offset) = parser.find_eocd().unwrap();
        assert_eq!(eocd.comment_len, 23);
        assert_eq!(offset, zip.len() as u64 - 22 - 23);
        assert_eq!(parser.list_files().unwrap().len(), 1);
    }

    #[test]
    fn test_not_a_zip() {
        let data = b"not a zip".to_vec();
        let parser = ZipParser::new(data.as_slice());
        assert!(matches!(parser.find_eocd(), Err(ZipError::NotZip)));

        let data = vec![0u8; 4096];
        let parser = ZipParser::new(data.as_slice());
        assert!(matches!(parser.list_files(), Err(ZipError::NotZip)));
    }

    #[test]
    fn test_central_directory_out_of_range() {
        let mut zip = tiny_zip(b"");
        let len = zip.len();
        // Point cd_offset far past the end of the file
        zip[len - 6..len - 2].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());
        let parser = ZipParser::new(zip.as_slice());
        assert!(matches!(parser.list_files(), Err(ZipError::Corrupt(_))));
    }

    #[test]
    fn test_bad_local_header() {
        let mut zip = tiny_zip(b"");
        zip[0] = b'X';
        let parser = ZipParser::new(zip.as_slice());
        let entries = parser.list_files().unwrap();
        assert!(matches!(
            parser.get_data_offset(&entries[0]),
            Err(ZipError::Corrupt(_))
        ));
    }

    #[test]
    fn test_trailing_data_after_archive() {
        let mut zip = tiny_zip(b"");
        zip.extend_from_slice(b"padding appended by a download tool");
        let parser = ZipParser::new(zip.as_slice());
        let (_, offset) = parser.find_eocd().unwrap();
        assert_eq!(offset, zip.len() as u64 - 22 - 35);
        assert_eq!(parser.list_files().unwrap()[0].file_name, "a.txt");
    }

    #[test]
    fn test_prepended_stub() {
        let mut data = vec![0x4Du8; 100];
        data.extend_from_slice(&tiny_zip(b""));
        let parser = ZipParser::new(data.as_slice());
        let entries = parser.list_files().unwrap();
        assert_eq!(entries[0].lfh_offset, 100);

        let offset = parser.get_data_offset(&entries[0]).unwrap();
        let mut buf = [0u8; 2];
        data.read_exact_at(offset, &mut buf).unwrap();
        assert_eq!(&buf, b"hi");
    }
}
