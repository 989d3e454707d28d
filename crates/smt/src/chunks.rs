//! Chunk sources for tree construction and proof rebuilding.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Random access to the chunk at a leaf index. Rebuilding only asks for
/// indices below the tree's leaf count.
pub trait ChunkReader: Sync {
    fn read_chunk(&self, index: u64) -> io::Result<Vec<u8>>;
}

impl<F> ChunkReader for F
where
    F: Fn(u64) -> io::Result<Vec<u8>> + Sync,
{
    fn read_chunk(&self, index: u64) -> io::Result<Vec<u8>> {
        self(index)
    }
}

/// Splits `data` into `chunk_size` pieces, zero-padding the last one.
/// Empty input yields a single zero chunk.
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![vec![0u8; chunk_size]];
    }
    data.chunks(chunk_size)
        .map(|c| {
            let mut chunk = c.to_vec();
            chunk.resize(chunk_size, 0);
            chunk
        })
        .collect()
}

/// Chunks held in memory (for testing and demos)
#[derive(Clone, Debug, Default)]
pub struct InMemoryChunks {
    chunks: Vec<Vec<u8>>,
}

impl InMemoryChunks {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks }
    }

    pub fn from_bytes(data: &[u8], chunk_size: usize) -> Self {
        Self::new(split_into_chunks(data, chunk_size))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn as_slice(&self) -> &[Vec<u8>] {
        &self.chunks
    }
}

impl ChunkReader for InMemoryChunks {
    fn read_chunk(&self, index: u64) -> io::Result<Vec<u8>> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.chunks.get(i))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, format!("no chunk {index}")))
    }
}

/// Reads fixed-size chunks straight from a file, with the same layout as
/// [`split_into_chunks`].
#[derive(Clone, Debug)]
pub struct FileChunks {
    path: PathBuf,
    chunk_size: usize,
    file_len: u64,
}

impl FileChunks {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> io::Result<Self> {
        if chunk_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "chunk size must be positive"));
        }
        let path = path.as_ref().to_path_buf();
        let file_len = std::fs::metadata(&path)?.len();
        Ok(Self {
            path,
            chunk_size,
            file_len,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn num_chunks(&self) -> u64 {
        self.file_len.div_ceil(self.chunk_size as u64).max(1)
    }

    /// Reads the whole file as chunks, for tree construction.
    pub fn read_all(&self) -> io::Result<Vec<Vec<u8>>> {
        let data = std::fs::read(&self.path)?;
        Ok(split_into_chunks(&data, self.chunk_size))
    }
}

impl ChunkReader for FileChunks {
    fn read_chunk(&self, index: u64) -> io::Result<Vec<u8>> {
        if index >= self.num_chunks() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("chunk {index} past end of {}", self.path.display()),
            ));
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let offset = index * self.chunk_size as u64;
        if offset >= self.file_len {
            return Ok(chunk);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let available = (self.file_len - offset).min(self.chunk_size as u64) as usize;
        file.read_exact(&mut chunk[..available])?;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn split_pads_last_chunk() {
        let chunks = split_into_chunks(&[1, 2, 3, 4, 5], 2);
        assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5, 0]]);
        assert_eq!(split_into_chunks(&[], 4), vec![vec![0u8; 4]]);
    }

    #[test]
    fn in_memory_reader_bounds() {
        let chunks = InMemoryChunks::from_bytes(b"abcdef", 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.read_chunk(1).unwrap(), b"ef\0\0".to_vec());
        assert_eq!(chunks.read_chunk(2).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn file_reader_matches_split() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 253) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = FileChunks::open(file.path(), 64).unwrap();
        let expected = split_into_chunks(&data, 64);
        assert_eq!(reader.num_chunks(), expected.len() as u64);
        for (i, chunk) in expected.iter().enumerate() {
            assert_eq!(&reader.read_chunk(i as u64).unwrap(), chunk);
        }
        assert_eq!(reader.read_all().unwrap(), expected);
        assert!(reader.read_chunk(expected.len() as u64).is_err());
    }

    #[test]
    fn empty_file_has_one_zero_chunk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reader = FileChunks::open(file.path(), 8).unwrap();
        assert_eq!(reader.num_chunks(), 1);
        assert_eq!(reader.read_chunk(0).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn closures_are_readers() {
        let reader = |i: u64| -> io::Result<Vec<u8>> { Ok(vec![i as u8]) };
        assert_eq!(reader.read_chunk(7).unwrap(), vec![7]);
    }
}
