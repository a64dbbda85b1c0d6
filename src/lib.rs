//! # gdtf-extract
//!
//! Extract fixture attributes from GDTF (General Device Type Format) files.
//!
//! A GDTF file is a ZIP archive whose `description.xml` describes a lighting
//! fixture. [`extract`] opens the archive, parses that document, and flattens
//! the attributes of the root element and its direct children into a single
//! name-to-value map.
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, ZIP64 archives, archive comments
//! - CRC-32 verification of the extracted document
//! - Distinguishable failures via [`GdtfError::kind`]
//!
//! ## Example
//!
//! ```no_run
//! use gdtf_extract::{extract, ErrorKind};
//!
//! match extract("Acme@Spot_700.gdtf") {
//!     Ok(attributes) => {
//!         for (name, value) in &attributes {
//!             println!("{name}={value}");
//!         }
//!     }
//!     Err(e) if e.kind() == ErrorKind::MissingEntry => eprintln!("not a GDTF file: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod description;
pub mod error;
pub mod extractor;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use description::{AttributeMap, flatten_attributes, parse_description};
pub use error::{DocumentError, ErrorKind, GdtfError, Result, TextPosition, ZipError};
pub use extractor::{DESCRIPTION_ENTRY, extract, extract_from_reader};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{ZipArchive, ZipFileEntry};
