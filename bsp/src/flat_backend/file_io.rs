//! Flat file writer and memory-mapped reader

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bsp_core::format::constants::{compression, ALIGNMENT_BOUNDARY};
use bsp_core::validation::format::calculate_padding;
use bsp_core::validation::{validate_extent, validate_magic_bytes, validate_name};
use bsp_core::{BinsparseError, DataType, Result, TypedSlice};
use memmap2::Mmap;
use serde_json::Value;

use super::layout::{DatasetInfo, Directory, FileHeader, FLAT_MAGIC, FLAT_VERSION};
use super::{DatasetSink, DatasetSource};
use crate::io_error;

/// Longest dataset or attribute name, in bytes
pub const MAX_DATASET_NAME_LEN: usize = 255;

const ZEROS: [u8; ALIGNMENT_BOUNDARY] = [0; ALIGNMENT_BOUNDARY];

/// Writes datasets and attributes to a new flat file
///
/// The directory and header are written by [`finish`](Self::finish), or on
/// drop if `finish` was never called.
pub struct FlatFileWriter {
    path: PathBuf,
    location: String,
    file: Option<BufWriter<File>>,
    position: u64,
    directory: Directory,
}

impl std::fmt::Debug for FlatFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatFileWriter")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("datasets", &self.directory.datasets.len())
            .finish()
    }
}

impl FlatFileWriter {
    /// Create or truncate `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let file = File::create(path).map_err(|e| io_error(&location, e))?;
        let mut file = BufWriter::new(file);
        // Placeholder until finish writes the real header
        file.write_all(&[0u8; FileHeader::SIZE])
            .map_err(|e| io_error(&location, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            location,
            file: Some(file),
            position: FileHeader::SIZE as u64,
            directory: Directory::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut BufWriter<File>> {
        let location = &self.location;
        self.file
            .as_mut()
            .ok_or_else(|| BinsparseError::io(location.as_str(), "writer already finished"))
    }

    fn pad_to_alignment(&mut self) -> Result<()> {
        let padding = calculate_padding(self.position as usize, ALIGNMENT_BOUNDARY);
        if padding > 0 {
            let location = self.location.clone();
            self.file()?
                .write_all(&ZEROS[..padding])
                .map_err(|e| io_error(&location, e))?;
            self.position += padding as u64;
        }
        Ok(())
    }

    /// Write the directory and the final header
    pub fn finish(mut self) -> Result<()> {
        self.finalize()
    }

    /// Close without writing a directory and delete the partial file
    pub fn abandon(mut self) -> Result<()> {
        drop(self.file.take());
        tracing::debug!(path = %self.location, "abandoned flat file");
        std::fs::remove_file(&self.path).map_err(|e| io_error(&self.location, e))
    }

    fn finalize(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        self.pad_to_alignment()?;
        let directory_offset = self.position;
        let json = serde_json::to_vec(&self.directory)
            .map_err(|e| BinsparseError::io(self.location.as_str(), e.to_string()))?;
        let header = FileHeader::new(directory_offset, json.len() as u64);

        let location = self.location.clone();
        let mut file = self
            .file
            .take()
            .ok_or_else(|| BinsparseError::io(location.as_str(), "writer already finished"))?;
        let io = |e| io_error(&location, e);
        file.write_all(&json).map_err(io)?;
        file.seek(SeekFrom::Start(0)).map_err(io)?;
        file.write_all(bytemuck::bytes_of(&header)).map_err(io)?;
        file.flush().map_err(io)?;

        tracing::debug!(
            path = %location,
            datasets = self.directory.datasets.len(),
            bytes = directory_offset + json.len() as u64,
            "finished flat file"
        );
        Ok(())
    }
}

impl DatasetSink for FlatFileWriter {
    fn write_dataset(&mut self, name: &str, data: TypedSlice<'_>, compression_level: u8) -> Result<()> {
        if compression_level > compression::MAX {
            return Err(BinsparseError::invalid_argument(format!(
                "compression level {compression_level} is outside 0..={}",
                compression::MAX
            )));
        }
        validate_name(name, MAX_DATASET_NAME_LEN)?;
        if self.directory.dataset(name).is_some() {
            return Err(BinsparseError::invalid_argument(format!(
                "dataset '{name}' already exists in {}",
                self.location
            )));
        }

        self.pad_to_alignment()?;
        let offset = self.position;
        let bytes = data.as_bytes();
        let location = self.location.clone();
        self.file()?
            .write_all(bytes)
            .map_err(|e| io_error(&location, e))?;
        self.position += bytes.len() as u64;

        tracing::trace!(
            dataset = name,
            data_type = %data.data_type(),
            len = data.len(),
            offset,
            "wrote dataset"
        );
        self.directory.datasets.push(DatasetInfo {
            name: name.to_string(),
            data_type: data.data_type().label().to_string(),
            offset,
            len: data.len() as u64,
            compression_level,
        });
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        validate_name(name, MAX_DATASET_NAME_LEN)?;
        if self.file.is_none() {
            return Err(BinsparseError::io(self.location.as_str(), "writer already finished"));
        }
        self.directory.attributes.insert(name.to_string(), value);
        Ok(())
    }
}

impl Drop for FlatFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!(path = %self.location, error = %e, "failed to finish flat file");
        }
    }
}

/// Memory-mapped reader for flat files; dataset reads borrow the mapping
pub struct FlatFileReader {
    path: PathBuf,
    location: String,
    mmap: Mmap,
    directory: Directory,
}

impl std::fmt::Debug for FlatFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatFileReader")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .field("datasets", &self.directory.datasets.len())
            .finish()
    }
}

impl FlatFileReader {
    /// Map `path` and validate its header and directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let file = File::open(path).map_err(|e| io_error(&location, e))?;
        // SAFETY: concurrent modification of the file is a caller error
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(&location, e))?;

        if mmap.len() < FileHeader::SIZE {
            return Err(BinsparseError::length_mismatch(
                location,
                "header",
                FileHeader::SIZE,
                mmap.len(),
            ));
        }
        let header: FileHeader = bytemuck::pod_read_unaligned(&mmap[..FileHeader::SIZE]);
        validate_magic_bytes(&location, &header.magic, &FLAT_MAGIC)?;
        if header.version != FLAT_VERSION {
            return Err(BinsparseError::InconsistentFile {
                location,
                array: "header".into(),
                expected: format!("layout version {FLAT_VERSION}"),
                actual: header.version.to_string(),
            });
        }

        let total = mmap.len() as u64;
        validate_extent(
            &location,
            "directory",
            header.directory_offset,
            header.directory_size,
            total,
        )?;
        let start = header.directory_offset as usize;
        let end = start + header.directory_size as usize;
        let directory: Directory =
            serde_json::from_slice(&mmap[start..end]).map_err(|e| BinsparseError::InconsistentFile {
                location: location.clone(),
                array: "directory".into(),
                expected: "JSON dataset directory".into(),
                actual: e.to_string(),
            })?;

        for info in &directory.datasets {
            DataType::from_label(&info.data_type)?;
            let byte_len = info.byte_len().ok_or_else(|| BinsparseError::InconsistentFile {
                location: location.clone(),
                array: info.name.clone(),
                expected: "addressable length".into(),
                actual: info.len.to_string(),
            })?;
            validate_extent(&location, &info.name, info.offset, byte_len, header.directory_offset)?;
        }

        tracing::debug!(
            path = %location,
            datasets = directory.datasets.len(),
            attributes = directory.attributes.len(),
            "opened flat file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            location,
            mmap,
            directory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory entry for `name`
    pub fn dataset_info(&self, name: &str) -> Option<&DatasetInfo> {
        self.directory.dataset(name)
    }

    /// Every dataset, in write order
    pub fn datasets(&self) -> &[DatasetInfo] {
        &self.directory.datasets
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.directory.attributes.iter()
    }

    fn require(&self, name: &str) -> Result<&DatasetInfo> {
        self.dataset_info(name).ok_or_else(|| BinsparseError::InconsistentFile {
            location: self.location.clone(),
            array: name.to_string(),
            expected: "stored dataset".into(),
            actual: "missing".into(),
        })
    }
}

impl DatasetSource for FlatFileReader {
    fn location(&self) -> &str {
        &self.location
    }

    fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.directory.attributes.get(name)
    }

    fn dataset_len(&self, name: &str) -> Result<usize> {
        let info = self.require(name)?;
        usize::try_from(info.len).map_err(|_| {
            BinsparseError::length_mismatch(self.location.as_str(), name, usize::MAX, usize::MAX)
        })
    }

    fn read_dataset(&self, name: &str) -> Result<TypedSlice<'_>> {
        let info = self.require(name)?;
        let data_type = DataType::from_label(&info.data_type)?;
        // Extents were validated on open
        let start = info.offset as usize;
        let end = start + info.len as usize * data_type.size_bytes();
        TypedSlice::from_bytes(data_type, &self.mmap[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Global;

    #[test]
    fn test_abandon_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bsp");

        let mut writer = FlatFileWriter::create(&path).unwrap();
        writer
            .write_dataset("values", TypedSlice::Int32(&[7, 8]), 0)
            .unwrap();
        writer.abandon().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_write_and_read_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datasets.bsp");

        let mut writer = FlatFileWriter::create(&path).unwrap();
        writer
            .write_dataset("small", TypedSlice::UInt8(&[1, 2, 3]), 0)
            .unwrap();
        writer
            .write_dataset("wide", TypedSlice::Float64(&[0.5, 1.5]), 9)
            .unwrap();
        writer.set_attribute("note", Value::from("hello")).unwrap();
        assert!(matches!(
            writer.write_dataset("small", TypedSlice::UInt8(&[]), 0),
            Err(BinsparseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            writer.write_dataset("loud", TypedSlice::UInt8(&[]), 10),
            Err(BinsparseError::InvalidArgument { .. })
        ));
        writer.finish().unwrap();

        let reader = FlatFileReader::open(&path).unwrap();
        assert_eq!(reader.datasets().len(), 2);
        let wide = reader.dataset_info("wide").unwrap();
        assert_eq!(wide.offset % 8, 0);
        assert_eq!(wide.compression_level, 9);
        assert_eq!(reader.read_dataset("wide").unwrap(), TypedSlice::Float64(&[0.5, 1.5]));
        assert_eq!(reader.dataset_len("small").unwrap(), 3);
        assert_eq!(reader.get_attribute("note"), Some(&Value::from("hello")));

        let small = reader.read_dataset_in::<u8, _>("small", &Global).unwrap();
        assert_eq!(small, vec![1, 2, 3]);
        assert!(matches!(
            reader.read_dataset_in::<i16, _>("small", &Global),
            Err(BinsparseError::InconsistentFile { .. })
        ));
        assert!(matches!(
            reader.dataset_len("absent"),
            Err(BinsparseError::InconsistentFile { .. })
        ));
    }

    #[test]
    fn test_drop_finishes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.bsp");
        {
            let mut writer = FlatFileWriter::create(&path).unwrap();
            writer
                .write_dataset("values", TypedSlice::Int32(&[7]), 1)
                .unwrap();
        }
        let reader = FlatFileReader::open(&path).unwrap();
        assert_eq!(reader.read_dataset("values").unwrap(), TypedSlice::Int32(&[7]));
    }

    #[test]
    fn test_rejects_truncated_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.bsp");
        std::fs::write(&short, b"BSPF").unwrap();
        assert!(matches!(
            FlatFileReader::open(&short),
            Err(BinsparseError::InconsistentFile { .. })
        ));

        let foreign = dir.path().join("foreign.bsp");
        std::fs::write(&foreign, [0u8; 128]).unwrap();
        assert!(matches!(
            FlatFileReader::open(&foreign),
            Err(BinsparseError::InconsistentFile { .. })
        ));
    }
}
