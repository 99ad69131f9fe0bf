//! Forward-only zip reader.
//!
//! Entries are decoded one at a time straight from the download stream.
//! Deflated entries whose sizes are only written after the data, in a
//! trailing data descriptor, are supported; their size is reported as
//! unknown until the entry has been read.

use crate::error::{AedictError, Result};
use flate2::bufread::DeflateDecoder;
use flate2::Crc;
use std::io::{self, BufRead, Read, Take};
use std::path::{Component, Path, PathBuf};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;
const ZIP64_SIZE_MARKER: u32 = u32::MAX;

const FLAG_ENCRYPTED: u16 = 1;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Reads local file entries until the central directory is reached.
pub struct ZipStreamReader<R> {
    input: R,
}

impl<R: BufRead> ZipStreamReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Returns the next entry, or `None` once the central directory starts.
    ///
    /// Every returned entry must be consumed with [`ZipEntry::finish`]
    /// before asking for the next one.
    pub fn next_entry(&mut self) -> Result<Option<ZipEntry<'_, R>>> {
        if self.input.fill_buf()?.is_empty() {
            return Err(archive_error("archive ends before its central directory"));
        }
        match read_u32(&mut self.input)? {
            LOCAL_FILE_HEADER_SIGNATURE => {}
            CENTRAL_DIRECTORY_SIGNATURE
            | END_OF_CENTRAL_DIRECTORY_SIGNATURE
            | ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE => return Ok(None),
            other => {
                return Err(archive_error(format!(
                    "unexpected record signature {other:#010x}"
                )))
            }
        }

        let header = LocalHeader::read(&mut self.input)?;
        ZipEntry::new(header, &mut self.input).map(Some)
    }
}

struct LocalHeader {
    name: String,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u64,
    size: u64,
    zip64: bool,
}

impl LocalHeader {
    fn read(input: &mut impl Read) -> Result<Self> {
        let mut fixed = [0u8; 26];
        input.read_exact(&mut fixed)?;
        let flags = le_u16(&fixed, 2);
        let method = le_u16(&fixed, 4);
        let crc32 = le_u32(&fixed, 10);
        let compressed_size = le_u32(&fixed, 14);
        let size = le_u32(&fixed, 18);
        let name_len = le_u16(&fixed, 22) as usize;
        let extra_len = le_u16(&fixed, 24) as usize;

        let mut name = vec![0u8; name_len];
        input.read_exact(&mut name)?;
        let mut extra = vec![0u8; extra_len];
        input.read_exact(&mut extra)?;

        let mut header = LocalHeader {
            name: String::from_utf8_lossy(&name).into_owned(),
            flags,
            method,
            crc32,
            compressed_size: compressed_size as u64,
            size: size as u64,
            zip64: false,
        };
        if let Some(zip64) = find_extra_field(&extra, ZIP64_EXTRA_FIELD_ID) {
            header.zip64 = true;
            let mut values = zip64.chunks_exact(8).map(|v| le_u64(v, 0));
            if size == ZIP64_SIZE_MARKER {
                header.size = values.next().ok_or_else(|| truncated_zip64(&header.name))?;
            }
            if compressed_size == ZIP64_SIZE_MARKER {
                header.compressed_size =
                    values.next().ok_or_else(|| truncated_zip64(&header.name))?;
            }
        }
        Ok(header)
    }

    fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

fn truncated_zip64(name: &str) -> AedictError {
    archive_error(format!("truncated zip64 field in entry '{name}'"))
}

fn find_extra_field(mut extra: &[u8], id: u16) -> Option<&[u8]> {
    while extra.len() >= 4 {
        let field_id = le_u16(extra, 0);
        let len = le_u16(extra, 2) as usize;
        let data = extra.get(4..4 + len)?;
        if field_id == id {
            return Some(data);
        }
        extra = &extra[4 + len..];
    }
    None
}

enum Body<'a, R> {
    Stored(Take<&'a mut R>),
    Deflated(DeflateDecoder<Take<&'a mut R>>),
    /// Deflate is self-terminating, so the descriptor is found right
    /// after the compressed stream ends.
    DeflatedWithDescriptor(DeflateDecoder<&'a mut R>),
}

/// One file or directory of the archive, readable as its uncompressed bytes.
pub struct ZipEntry<'a, R> {
    name: String,
    size: Option<u64>,
    expected_crc: u32,
    zip64: bool,
    crc: Crc,
    read: u64,
    body: Body<'a, R>,
}

impl<'a, R: BufRead> ZipEntry<'a, R> {
    fn new(header: LocalHeader, input: &'a mut R) -> Result<Self> {
        if header.flags & FLAG_ENCRYPTED != 0 {
            return Err(archive_error(format!(
                "entry '{}' is encrypted",
                header.name
            )));
        }

        let (size, body) = match (header.method, header.has_data_descriptor()) {
            (METHOD_STORED, false) => (
                Some(header.size),
                Body::Stored(input.take(header.compressed_size)),
            ),
            (METHOD_DEFLATED, false) => (
                Some(header.size),
                Body::Deflated(DeflateDecoder::new(input.take(header.compressed_size))),
            ),
            (METHOD_DEFLATED, true) => (
                None,
                Body::DeflatedWithDescriptor(DeflateDecoder::new(input)),
            ),
            (METHOD_STORED, true) => {
                return Err(archive_error(format!(
                    "stored entry '{}' has no sizes in its local header",
                    header.name
                )))
            }
            (method, _) => {
                return Err(archive_error(format!(
                    "entry '{}' uses unsupported compression method {method}",
                    header.name
                )))
            }
        };

        Ok(Self {
            name: header.name,
            size,
            expected_crc: header.crc32,
            zip64: header.zip64,
            crc: Crc::new(),
            read: 0,
            body,
        })
    }

    /// Raw name as stored in the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size, if the local header declares it.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// The entry path relative to the extraction root, or `None` if it is
    /// absolute or climbs above the root.
    pub fn enclosed_name(&self) -> Option<PathBuf> {
        if self.name.contains('\0') {
            return None;
        }
        let path = Path::new(&self.name);
        let mut depth = 0usize;
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => return None,
                Component::ParentDir => depth = depth.checked_sub(1)?,
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
            }
        }
        Some(path.to_path_buf())
    }

    /// Skips unread data, reads the trailing descriptor if any and checks
    /// the CRC and size of the entry.
    pub fn finish(mut self) -> Result<()> {
        io::copy(&mut self, &mut io::sink())?;

        let (expected_crc, expected_size) = match self.body {
            Body::Stored(mut rest) => {
                io::copy(&mut rest, &mut io::sink())?;
                (self.expected_crc, self.size)
            }
            Body::Deflated(decoder) => {
                io::copy(&mut decoder.into_inner(), &mut io::sink())?;
                (self.expected_crc, self.size)
            }
            Body::DeflatedWithDescriptor(decoder) => {
                let input = decoder.into_inner();
                let (crc, size) = read_data_descriptor(input, self.zip64)?;
                (crc, Some(size))
            }
        };

        if self.crc.sum() != expected_crc {
            return Err(archive_error(format!(
                "CRC mismatch in entry '{}'",
                self.name
            )));
        }
        if expected_size.is_some_and(|size| size != self.read) {
            return Err(archive_error(format!(
                "size mismatch in entry '{}'",
                self.name
            )));
        }
        Ok(())
    }
}

impl<R: BufRead> Read for ZipEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = match &mut self.body {
            Body::Stored(input) => input.read(buf)?,
            Body::Deflated(decoder) => decoder.read(buf)?,
            Body::DeflatedWithDescriptor(decoder) => decoder.read(buf)?,
        };
        self.crc.update(&buf[..len]);
        self.read += len as u64;
        Ok(len)
    }
}

/// Returns the CRC and uncompressed size. The descriptor signature is
/// optional.
fn read_data_descriptor(input: &mut impl Read, zip64: bool) -> Result<(u32, u64)> {
    let mut crc = read_u32(input)?;
    if crc == DATA_DESCRIPTOR_SIGNATURE {
        crc = read_u32(input)?;
    }
    let size = if zip64 {
        let _compressed = read_u64(input)?;
        read_u64(input)?
    } else {
        let _compressed = read_u32(input)?;
        read_u32(input)? as u64
    };
    Ok((crc, size))
}

fn archive_error(message: impl Into<String>) -> AedictError {
    AedictError::Archive {
        message: message.into(),
    }
}

fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(input: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fetch::test_support::{streamed_zip_bytes, zip_bytes};
    use pretty_assertions::assert_eq;
    use std::io::{BufReader, Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn read_all(archive: Vec<u8>) -> Result<Vec<(String, Option<u64>, Vec<u8>)>> {
        let mut reader = ZipStreamReader::new(BufReader::new(Cursor::new(archive)));
        let mut entries = Vec::new();
        while let Some(mut entry) = reader.next_entry()? {
            let name = entry.name().to_string();
            let size = entry.size();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entry.finish()?;
            entries.push((name, size, data));
        }
        Ok(entries)
    }

    #[test]
    fn test_reads_stored_entries() {
        let entries = read_all(zip_bytes(&[("a", &b"alpha"[..]), ("b", &b""[..])])).unwrap();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), Some(5), b"alpha".to_vec()),
                ("b".to_string(), Some(0), Vec::new()),
            ]
        );
    }

    #[test]
    fn test_reads_deflated_entries_with_sizes() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file("dir/_0.cfs", options).unwrap();
        writer.write_all(&vec![9u8; 100_000]).unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let entries = read_all(archive).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "dir/_0.cfs");
        assert_eq!(entries[0].1, Some(100_000));
        assert_eq!(entries[0].2, vec![9u8; 100_000]);
    }

    #[test]
    fn test_reads_entries_sized_by_data_descriptor() {
        let big: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let archive = streamed_zip_bytes(&[("_0.cfs", &big[..]), ("segments.gen", &b"gen"[..])]);

        let entries = read_all(archive).unwrap();
        assert_eq!(
            entries,
            vec![
                ("_0.cfs".to_string(), None, big),
                ("segments.gen".to_string(), None, b"gen".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unread_entries_are_skipped_by_finish() {
        let archive = streamed_zip_bytes(&[("skip", &[1u8; 5000][..]), ("keep", &b"kept"[..])]);
        let mut reader = ZipStreamReader::new(BufReader::new(Cursor::new(archive)));

        reader.next_entry().unwrap().unwrap().finish().unwrap();
        let mut entry = reader.next_entry().unwrap().unwrap();
        let mut data = String::new();
        entry.read_to_string(&mut data).unwrap();
        assert_eq!(entry.name(), "keep");
        assert_eq!(data, "kept");
        entry.finish().unwrap();
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_data_fails_crc_check() {
        let mut archive = zip_bytes(&[("a", &b"alpha"[..])]);
        let at = archive.windows(5).position(|w| w == b"alpha").unwrap();
        archive[at] ^= 0xff;
        let err = read_all(archive).unwrap_err();
        assert!(matches!(err, AedictError::Archive { .. }), "{err}");
    }

    #[test]
    fn test_truncated_archive_is_an_error() {
        let mut archive = zip_bytes(&[("a", &b"alpha"[..])]);
        archive.truncate(36);
        assert!(read_all(archive).is_err());
    }

    #[test]
    fn test_enclosed_name() {
        let archive = streamed_zip_bytes(&[
            ("ok/file", &b"1"[..]),
            ("../escape", &b"2"[..]),
            ("/abs", &b"3"[..]),
            ("a/../b", &b"4"[..]),
        ]);
        let mut reader = ZipStreamReader::new(BufReader::new(Cursor::new(archive)));
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            names.push(entry.enclosed_name());
            entry.finish().unwrap();
        }
        assert_eq!(
            names,
            vec![
                Some(PathBuf::from("ok/file")),
                None,
                None,
                Some(PathBuf::from("a/../b")),
            ]
        );
    }
}
