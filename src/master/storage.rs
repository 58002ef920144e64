//! External storage for blocks evicted between rounds.
//!
//! The master only sees two capabilities: a [`BlockCodec`] that turns a block
//! into bytes and back, and a [`Storage`] that keeps those bytes by gid.

use crate::reduce_error::ReduceError;
use crate::topology::link::Gid;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Save/load capability for a block type, supplied once when the master is built.
pub trait BlockCodec<B>: Send + Sync {
    fn save(&self, block: &B) -> Result<Vec<u8>, ReduceError>;
    fn load(&self, bytes: &[u8]) -> Result<B, ReduceError>;
}

/// Codec for any serde block.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<B> BlockCodec<B> for BincodeCodec
where
    B: Serialize + DeserializeOwned,
{
    fn save(&self, block: &B) -> Result<Vec<u8>, ReduceError> {
        bincode::serialize(block).map_err(ReduceError::Encode)
    }

    fn load(&self, bytes: &[u8]) -> Result<B, ReduceError> {
        bincode::deserialize(bytes).map_err(ReduceError::Decode)
    }
}

/// Byte storage keyed by gid.
pub trait Storage: Send + Sync {
    fn put(&self, gid: Gid, bytes: &[u8]) -> Result<(), ReduceError>;
    fn get(&self, gid: Gid) -> Result<Vec<u8>, ReduceError>;
    fn remove(&self, gid: Gid) -> Result<(), ReduceError>;
}

/// One file per block, named `<prefix>-<gid>.blk`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    prefix: PathBuf,
}

impl FileStorage {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn path(&self, gid: Gid) -> PathBuf {
        let mut name = self.prefix.as_os_str().to_owned();
        name.push(format!("-{gid}.blk"));
        PathBuf::from(name)
    }
}

impl Storage for FileStorage {
    fn put(&self, gid: Gid, bytes: &[u8]) -> Result<(), ReduceError> {
        let path = self.path(gid);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, bytes)?;
        Ok(())
    }

    fn get(&self, gid: Gid) -> Result<Vec<u8>, ReduceError> {
        Ok(fs::read(self.path(gid))?)
    }

    fn remove(&self, gid: Gid) -> Result<(), ReduceError> {
        match fs::remove_file(self.path(gid)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory storage, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blocks: DashMap<Gid, Bytes>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn put(&self, gid: Gid, bytes: &[u8]) -> Result<(), ReduceError> {
        self.blocks.insert(gid, Bytes::copy_from_slice(bytes));
        Ok(())
    }

    fn get(&self, gid: Gid) -> Result<Vec<u8>, ReduceError> {
        self.blocks
            .get(&gid)
            .map(|b| b.to_vec())
            .ok_or_else(|| {
                ReduceError::Storage(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("block {gid} is not in storage"),
                ))
            })
    }

    fn remove(&self, gid: Gid) -> Result<(), ReduceError> {
        self.blocks.remove(&gid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_roundtrip() {
        let dir = std::env::temp_dir().join(format!("block-reduce-storage-{}", std::process::id()));
        let storage = FileStorage::new(dir.join("blk"));
        storage.put(7, b"payload").unwrap();
        assert_eq!(storage.get(7).unwrap(), b"payload".to_vec());
        storage.remove(7).unwrap();
        assert!(storage.get(7).is_err());
        storage.remove(7).unwrap();
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn codec_roundtrip() {
        let codec = BincodeCodec;
        let bytes = BlockCodec::<Vec<f32>>::save(&codec, &vec![1.0, 2.5]).unwrap();
        let back: Vec<f32> = codec.load(&bytes).unwrap();
        assert_eq!(back, vec![1.0, 2.5]);
    }

    #[test]
    fn missing_block_in_memory_storage() {
        let s = MemoryStorage::new();
        assert!(matches!(s.get(3), Err(ReduceError::Storage(_))));
    }
}
