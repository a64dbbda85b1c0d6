//! Helpers for building GDTF archives on disk.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy)]
pub enum Method {
    Stored,
    Deflate,
}

struct Written {
    name: String,
    method: u16,
    crc: u32,
    compressed: u64,
    uncompressed: u64,
    offset: u64,
}

/// Minimal zip writer producing what common archivers emit
pub struct ZipBuilder {
    out: Vec<u8>,
    written: Vec<Written>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            written: Vec::new(),
            comment: Vec::new(),
            zip64: false,
        }
    }

    /// Write the central directory with ZIP64 sizes, offsets and end records
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    /// Record a different uncompressed size for the last entry
    pub fn declare_size(mut self, size: u64) -> Self {
        self.written
            .last_mut()
            .expect("declare_size needs an entry")
            .uncompressed = size;
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn entry(mut self, name: &str, data: &[u8], method: Method) -> Self {
        let mut crc = flate2::Crc::new();
        crc.update(data);

        let (method_id, payload) = match method {
            Method::Stored => (0u16, data.to_vec()),
            Method::Deflate => {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data).unwrap();
                (8u16, enc.finish().unwrap())
            }
        };

        let offset = self.out.len() as u64;
        let out = &mut self.out;
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method_id.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&payload);

        self.written.push(Written {
            name: name.to_string(),
            method: method_id,
            crc: crc.sum(),
            compressed: payload.len() as u64,
            uncompressed: data.len() as u64,
            offset,
        });
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Method::Stored)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Method::Deflate)
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.out.len() as u64;
        for w in &self.written {
            let out = &mut self.out;
            let (compressed, uncompressed, offset, extra) = if self.zip64 {
                let mut extra = Vec::new();
                extra.extend_from_slice(&0x0001u16.to_le_bytes());
                extra.extend_from_slice(&24u16.to_le_bytes());
                extra.extend_from_slice(&w.uncompressed.to_le_bytes());
                extra.extend_from_slice(&w.compressed.to_le_bytes());
                extra.extend_from_slice(&w.offset.to_le_bytes());
                (u32::MAX, u32::MAX, u32::MAX, extra)
            } else {
                (
                    w.compressed as u32,
                    w.uncompressed as u32,
                    w.offset as u32,
                    Vec::new(),
                )
            };
            out.extend_from_slice(b"PK\x01\x02");
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&w.method.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&w.crc.to_le_bytes());
            out.extend_from_slice(&compressed.to_le_bytes());
            out.extend_from_slice(&uncompressed.to_le_bytes());
            out.extend_from_slice(&(w.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(w.name.as_bytes());
            out.extend_from_slice(&extra);
        }
        let cd_size = self.out.len() as u64 - cd_offset;
        let count = self.written.len() as u64;

        let out = &mut self.out;
        let (count16, cd_size32, cd_offset32) = if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            out.extend_from_slice(&44u64.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&cd_size.to_le_bytes());
            out.extend_from_slice(&cd_offset.to_le_bytes());

            out.extend_from_slice(b"PK\x06\x07");
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&eocd64_offset.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            (u16::MAX, u32::MAX, u32::MAX)
        } else {
            (count as u16, cd_size as u32, cd_offset as u32)
        };

        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count16.to_le_bytes());
        out.extend_from_slice(&count16.to_le_bytes());
        out.extend_from_slice(&cd_size32.to_le_bytes());
        out.extend_from_slice(&cd_offset32.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        self.out
    }

    pub fn write_to(self, path: &Path) -> PathBuf {
        std::fs::write(path, self.finish()).unwrap();
        path.to_path_buf()
    }
}

/// A GDTF file holding only a stored `description.xml`
pub fn gdtf_with(dir: &Path, file_name: &str, xml: &str) -> PathBuf {
    ZipBuilder::new()
        .stored("description.xml", xml.as_bytes())
        .write_to(&dir.join(file_name))
}
