//! Single-file page storage.
//!
//! ```text
//! +----------------------------+  offset 0
//! | File header (64B frame)    |  bincode: magic, version, page_size, page_count
//! +----------------------------+  offset 64
//! | Page 0                     |
//! +----------------------------+  offset 64 + page_size
//! | Page 1                     |
//! | ...                        |
//! +----------------------------+
//! ```
use super::{check_buffer, next_page_id, PageId, PageStorage};
use crate::errors::Error;
use bincode::{config, Decode, Encode};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, trace};

pub const FILE_MAGIC: u32 = 0x5054_5245; // "PTRE"
pub const FILE_VERSION: u16 = 1;

/// Bytes reserved at the start of the file for the header.
pub const FILE_HEADER_SIZE: usize = 64;

#[derive(Encode, Decode, Debug, PartialEq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u16,
    /// Size of every page in bytes.
    pub page_size: u32,
    /// Number of pages allocated in the file.
    pub page_count: u32,
}

/// Pages stored back to back in one file, behind a fixed header frame.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: File,
    page_size: usize,
    page_count: usize,
}

impl FileStorage {
    /// Creates (or truncates) the file at `path` and writes an empty header.
    pub fn create(path: impl AsRef<Path>, page_size: usize) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        if u32::try_from(page_size).is_err() || page_size == 0 {
            return Err(err!(Config, "Unsupported page size {}", page_size));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut storage = Self {
            path,
            file,
            page_size,
            page_count: 0,
        };
        storage.write_header(0)?;
        info!(path = %storage.path.display(), page_size, "Created page file");
        Ok(storage)
    }

    /// Opens an existing file; the page size is taken from its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut frame = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut frame)?;
        let header = decode_header(&frame)?;
        if header.magic != FILE_MAGIC {
            return Err(err!(Corrupt, "Bad magic {:#x} in {}", header.magic, path.display()));
        }
        if header.version != FILE_VERSION {
            return Err(err!(
                Corrupt,
                "Unsupported file version {} in {}",
                header.version,
                path.display()
            ));
        }

        let storage = Self {
            path,
            file,
            page_size: header.page_size as usize,
            page_count: header.page_count as usize,
        };
        info!(
            path = %storage.path.display(),
            page_size = storage.page_size,
            pages = storage.page_count,
            "Opened page file"
        );
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes file buffers to the device.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.file.sync_data()?;
        Ok(())
    }

    fn page_offset(&self, id: PageId) -> Result<u64, Error> {
        if id as usize >= self.page_count {
            return Err(err!(
                Storage,
                "File page {} not found ({} pages).",
                id,
                self.page_count
            ));
        }
        Ok(self.offset_of(id))
    }

    fn offset_of(&self, id: PageId) -> u64 {
        (FILE_HEADER_SIZE + id as usize * self.page_size) as u64
    }

    fn write_header(&mut self, page_count: usize) -> Result<(), Error> {
        let frame = encode_header(&FileHeader {
            magic: FILE_MAGIC,
            version: FILE_VERSION,
            page_size: self.page_size as u32,
            page_count: page_count as u32,
        })?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&frame)?;
        Ok(())
    }
}

impl PageStorage for FileStorage {
    fn create_page(&mut self) -> Result<PageId, Error> {
        let id = next_page_id(self.page_count)?;
        self.file.seek(SeekFrom::Start(self.offset_of(id)))?;
        self.file.write_all(&vec![0u8; self.page_size])?;
        self.write_header(self.page_count + 1)?;
        self.page_count += 1;
        trace!(page = id, "Allocated file page");
        Ok(id)
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<(), Error> {
        check_buffer(self.page_size, buf.len())?;
        let offset = self.page_offset(id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<(), Error> {
        check_buffer(self.page_size, buf.len())?;
        let offset = self.page_offset(id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> usize {
        self.page_count
    }
}

fn decode_header(bytes: &[u8]) -> Result<FileHeader, Error> {
    let (decoded, _): (FileHeader, usize) =
        bincode::decode_from_slice(bytes, config::standard())?;
    Ok(decoded)
}

fn encode_header(header: &FileHeader) -> Result<[u8; FILE_HEADER_SIZE], Error> {
    let encoded = bincode::encode_to_vec(header, config::standard())?;

    if encoded.len() > FILE_HEADER_SIZE {
        return Err(Error::Encoding(format!(
            "Header size ({}) does not fit within the frame ({}).",
            encoded.len(),
            FILE_HEADER_SIZE
        )));
    }

    let mut frame = [0u8; FILE_HEADER_SIZE];
    frame[..encoded.len()].copy_from_slice(&encoded);
    Ok(frame)
}
