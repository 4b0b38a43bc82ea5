//! The `.xvec` single-column vector file format.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header  : magic "XVEC" | version u16 | reserved u16 | dimension u32
//! rows    : (row_id u64 | dimension x f64) *
//! footer  : row_count u64 | crc32(rows) u32
//! ```
//!
//! The row region length is derived from the file size, so rows can be
//! streamed without reading the footer first. The checksum and row count are
//! verified once the last row has been read.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::vector::source::{DecodedRow, FileHandle, VectorFileReader, VectorIterator};

/// File extension used for column files.
pub const COLUMN_FILE_EXTENSION: &str = "xvec";

const MAGIC: &[u8; 4] = b"XVEC";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: u64 = 12;
const FOOTER_LEN: u64 = 12;

/// Largest dimension a column file may declare.
pub const MAX_DIMENSION: usize = 1 << 20;

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFileHeader {
    /// Format version.
    pub version: u16,
    /// Number of components per vector.
    pub dimension: usize,
}

impl ColumnFileHeader {
    fn row_len(&self) -> u64 {
        8 + 8 * self.dimension as u64
    }
}

/// Writes a column file row by row.
pub struct ColumnFileWriter<W: Write> {
    writer: W,
    dimension: usize,
    rows: u64,
    hasher: Hasher,
    buffer: Vec<u8>,
}

impl ColumnFileWriter<BufWriter<File>> {
    /// Create (or truncate) a column file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), dimension)
    }
}

impl<W: Write> ColumnFileWriter<W> {
    /// Start a column file on an arbitrary writer.
    pub fn new(mut writer: W, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(XiphosError::invalid_input("column dimension must be positive"));
        }
        if dimension > MAX_DIMENSION {
            return Err(XiphosError::invalid_input(format!(
                "column dimension {dimension} exceeds the limit of {MAX_DIMENSION}"
            )));
        }
        let dim = dimension as u32;

        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(dim)?;

        Ok(Self {
            writer,
            dimension,
            rows: 0,
            hasher: Hasher::new(),
            buffer: Vec::with_capacity(8 + 8 * dimension),
        })
    }

    /// Append one row.
    pub fn append(&mut self, row_id: u64, values: &[f64]) -> Result<()> {
        if values.len() != self.dimension {
            return Err(XiphosError::incompatible_lengths(
                self.dimension,
                values.len(),
            ));
        }

        self.buffer.clear();
        self.buffer.write_u64::<LittleEndian>(row_id)?;
        for value in values {
            self.buffer.write_f64::<LittleEndian>(*value)?;
        }
        self.hasher.update(&self.buffer);
        self.writer.write_all(&self.buffer)?;
        self.rows += 1;
        Ok(())
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Write the footer and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let checksum = self.hasher.finalize();
        self.writer.write_u64::<LittleEndian>(self.rows)?;
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write `rows` to `path` through a sibling temp file renamed into place.
///
/// The previous content of `path`, if any, is untouched unless every row
/// was written and the footer flushed. Returns the number of rows written.
pub fn write_file_atomic<P: AsRef<Path>>(
    path: P,
    dimension: usize,
    rows: &[(u64, Vec<f64>)],
) -> Result<u64> {
    let path = path.as_ref();
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let written = (|| -> Result<u64> {
        let mut writer = ColumnFileWriter::create(&tmp_path, dimension)?;
        for (row_id, values) in rows {
            writer.append(*row_id, values)?;
        }
        let count = writer.rows_written();
        writer.finish()?.get_ref().sync_all()?;
        Ok(count)
    })();

    match written {
        Ok(count) => {
            fs::rename(&tmp_path, path)?;
            Ok(count)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Read and validate a column file header.
pub fn read_header<R: Read>(reader: &mut R) -> Result<ColumnFileHeader> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(XiphosError::source_unavailable("not a column file (bad magic)"));
    }

    let version = reader.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(XiphosError::source_unavailable(format!(
            "unsupported column file version {version}"
        )));
    }
    let _reserved = reader.read_u16::<LittleEndian>()?;
    let dimension = reader.read_u32::<LittleEndian>()? as usize;
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(XiphosError::malformed_vector(format!(
            "header declares dimension {dimension}, expected 1..={MAX_DIMENSION}"
        )));
    }

    Ok(ColumnFileHeader { version, dimension })
}

/// Read just the header of the column file at `path`.
pub fn read_header_from_path<P: AsRef<Path>>(path: P) -> Result<ColumnFileHeader> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        XiphosError::source_unavailable(format!("{}: {e}", path.display()))
    })?;
    read_header(&mut BufReader::new(file)).map_err(|e| match e {
        XiphosError::Io(io) => {
            XiphosError::source_unavailable(format!("{}: {io}", path.display()))
        }
        other => other,
    })
}

/// Opens `.xvec` files named by their file-system path.
#[derive(Debug, Clone, Default)]
pub struct ColumnFileReader {
    base_dir: Option<PathBuf>,
}

impl ColumnFileReader {
    /// Reader resolving handles as paths relative to the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader resolving relative handles against `base_dir`.
    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn path_of(&self, file: &FileHandle) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(file.as_str()),
            None => PathBuf::from(file.as_str()),
        }
    }

    /// Open the file at `path` as a row stream.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<ColumnFileRows> {
        let path = path.as_ref();
        let unavailable =
            |e: std::io::Error| XiphosError::source_unavailable(format!("{}: {e}", path.display()));

        let file = File::open(path).map_err(unavailable)?;
        let file_len = file.metadata().map_err(unavailable)?.len();
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader).map_err(|e| match e {
            XiphosError::Io(io) => unavailable(io),
            other => other,
        })?;

        let label = path.display().to_string();
        let body = file_len
            .checked_sub(HEADER_LEN + FOOTER_LEN)
            .ok_or_else(|| XiphosError::malformed_vector(format!("{label}: file is truncated")))?;
        if body % header.row_len() != 0 {
            return Err(XiphosError::malformed_vector(format!(
                "{label}: row region of {body} bytes is not a whole number of {}-byte rows",
                header.row_len()
            )));
        }
        let expected_rows = body / header.row_len();

        // A row buffer is only needed when at least one row fits in the file.
        let mut buffer = Vec::new();
        if expected_rows > 0 {
            let row_len = header.row_len() as usize;
            buffer.try_reserve_exact(row_len).map_err(|e| {
                XiphosError::malformed_vector(format!("{label}: cannot buffer {row_len}-byte rows: {e}"))
            })?;
            buffer.resize(row_len, 0);
        }

        debug!(
            "opened column file {label}: dimension {}, {expected_rows} rows",
            header.dimension
        );

        Ok(ColumnFileRows {
            reader,
            label,
            header,
            expected_rows,
            rows_read: 0,
            hasher: Hasher::new(),
            buffer,
            verified: false,
        })
    }
}

impl VectorFileReader for ColumnFileReader {
    fn open(&self, file: &FileHandle) -> Result<Box<dyn VectorIterator>> {
        Ok(Box::new(Self::open_path(self.path_of(file))?))
    }
}

/// Streaming row iterator over one column file.
pub struct ColumnFileRows {
    reader: BufReader<File>,
    label: String,
    header: ColumnFileHeader,
    expected_rows: u64,
    rows_read: u64,
    hasher: Hasher,
    buffer: Vec<u8>,
    verified: bool,
}

impl ColumnFileRows {
    /// The file header.
    pub fn header(&self) -> ColumnFileHeader {
        self.header
    }

    /// Number of rows the file holds, derived from its size.
    pub fn expected_rows(&self) -> u64 {
        self.expected_rows
    }

    fn malformed(&self, reason: impl std::fmt::Display) -> XiphosError {
        XiphosError::malformed_vector(format!("{}: {reason}", self.label))
    }

    fn verify_footer(&mut self) -> Result<()> {
        let row_count = self
            .reader
            .read_u64::<LittleEndian>()
            .map_err(|e| self.malformed(e))?;
        let checksum = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|e| self.malformed(e))?;

        if row_count != self.rows_read {
            return Err(self.malformed(format!(
                "footer claims {row_count} rows, found {}",
                self.rows_read
            )));
        }
        let actual = std::mem::take(&mut self.hasher).finalize();
        if checksum != actual {
            return Err(self.malformed(format!(
                "checksum mismatch (stored {checksum:#010x}, computed {actual:#010x})"
            )));
        }
        self.verified = true;
        Ok(())
    }
}

impl VectorIterator for ColumnFileRows {
    fn next(&mut self) -> Result<Option<DecodedRow>> {
        if self.rows_read == self.expected_rows {
            if !self.verified {
                self.verify_footer()?;
            }
            return Ok(None);
        }

        if let Err(e) = self.reader.read_exact(&mut self.buffer) {
            return Err(self.malformed(e));
        }
        self.hasher.update(&self.buffer);
        self.rows_read += 1;

        let mut cursor = self.buffer.as_slice();
        let row_id = cursor.read_u64::<LittleEndian>()?;
        let mut values = Vec::with_capacity(self.header.dimension);
        for _ in 0..self.header.dimension {
            values.push(cursor.read_f64::<LittleEndian>()?);
        }
        Ok(Some(DecodedRow::new(row_id, values)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom};

    use tempfile::TempDir;

    use super::*;

    fn write_sample(path: &Path) -> Result<()> {
        let mut writer = ColumnFileWriter::create(path, 2)?;
        writer.append(10, &[0.0, 0.0])?;
        writer.append(11, &[1.5, -2.0])?;
        writer.append(12, &[3.0, 4.0])?;
        assert_eq!(writer.rows_written(), 3);
        writer.finish()?;
        Ok(())
    }

    fn read_all(path: &Path) -> Result<Vec<DecodedRow>> {
        let mut rows = ColumnFileReader::open_path(path)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row);
        }
        Ok(out)
    }

    #[test]
    fn test_write_then_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.xvec");
        write_sample(&path).unwrap();

        let rows = read_all(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], DecodedRow::new(11, vec![1.5, -2.0]));

        let header = read_header_from_path(&path).unwrap();
        assert_eq!(header.dimension, 2);
        assert_eq!(header.version, FORMAT_VERSION);
    }

    #[test]
    fn test_reader_resolves_relative_handles() {
        let dir = TempDir::new().unwrap();
        write_sample(&dir.path().join("b.xvec")).unwrap();

        let reader = ColumnFileReader::with_base_dir(dir.path());
        let mut rows = reader.open(&FileHandle::new("b.xvec")).unwrap();
        assert_eq!(rows.next().unwrap().unwrap().row_id, 10);
    }

    #[test]
    fn test_empty_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.xvec");
        ColumnFileWriter::create(&path, 4).unwrap().finish().unwrap();
        assert!(read_all(&path).unwrap().is_empty());
    }

    #[test]
    fn test_append_rejects_wrong_length() {
        let mut writer = ColumnFileWriter::new(Vec::new(), 3).unwrap();
        assert!(matches!(
            writer.append(0, &[1.0]),
            Err(XiphosError::IncompatibleLengths { left: 3, right: 1 })
        ));
        assert!(ColumnFileWriter::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn test_atomic_write_keeps_old_file_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.xvec");
        write_sample(&path).unwrap();

        let rows = vec![(0, vec![1.0, 2.0]), (1, vec![1.0])];
        let err = write_file_atomic(&path, 2, &rows).unwrap_err();
        assert!(matches!(err, XiphosError::IncompatibleLengths { left: 2, right: 1 }));

        assert_eq!(read_all(&path).unwrap().len(), 3);
        assert!(!dir.path().join("a.xvec.tmp").exists());

        let rows = vec![(7, vec![5.0, 6.0])];
        assert_eq!(write_file_atomic(&path, 2, &rows).unwrap(), 1);
        assert_eq!(read_all(&path).unwrap(), vec![DecodedRow::new(7, vec![5.0, 6.0])]);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = ColumnFileReader::open_path(dir.path().join("nope.xvec"))
            .err()
            .unwrap();
        assert!(matches!(err, XiphosError::SourceUnavailable(_)));
    }

    #[test]
    fn test_bad_magic_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.xvec");
        std::fs::write(&path, b"JUNKJUNKJUNKJUNKJUNKJUNK").unwrap();
        let err = ColumnFileReader::open_path(&path).err().unwrap();
        assert!(matches!(err, XiphosError::SourceUnavailable(_)));
    }

    fn write_raw_header(path: &Path, dimension: u32, body: &[u8]) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.write_u16::<LittleEndian>(FORMAT_VERSION).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(dimension).unwrap();
        bytes.extend_from_slice(body);
        bytes.write_u64::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(crc32fast::hash(body)).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_huge_declared_dimension_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.xvec");
        write_raw_header(&path, u32::MAX, &[]);

        let err = ColumnFileReader::open_path(&path).err().unwrap();
        assert!(matches!(err, XiphosError::MalformedVector(_)));
        assert!(matches!(
            read_header_from_path(&path),
            Err(XiphosError::MalformedVector(_))
        ));
    }

    #[test]
    fn test_zero_declared_dimension_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.xvec");
        write_raw_header(&path, 0, &[]);

        let err = ColumnFileReader::open_path(&path).err().unwrap();
        assert!(matches!(err, XiphosError::MalformedVector(_)));
    }

    #[test]
    fn test_large_dimension_with_no_rows_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.xvec");
        write_raw_header(&path, MAX_DIMENSION as u32, &[]);

        let mut rows = ColumnFileReader::open_path(&path).unwrap();
        assert_eq!(rows.expected_rows(), 0);
        assert!(rows.next().unwrap().is_none());
    }

    #[test]
    fn test_writer_rejects_oversized_dimension() {
        assert!(ColumnFileWriter::new(Vec::new(), MAX_DIMENSION + 1).is_err());
    }

    #[test]
    fn test_corrupt_row_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.xvec");
        write_sample(&path).unwrap();

        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(HEADER_LEN + 8)).unwrap();
        file.write_all(&9.0f64.to_le_bytes()).unwrap();
        drop(file);

        let err = read_all(&path).unwrap_err();
        assert!(matches!(err, XiphosError::MalformedVector(ref m) if m.contains("checksum")));
    }

    #[test]
    fn test_truncated_row_region() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.xvec");
        write_sample(&path).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 5).unwrap();
        drop(file);

        let err = ColumnFileReader::open_path(&path).err().unwrap();
        assert!(matches!(err, XiphosError::MalformedVector(_)));
    }
}
