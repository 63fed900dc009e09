//! Write-once configuration word.
//!
//! Models the single reserved non-volatile word of the board: four bytes,
//! little-endian, all ones when unset. Once a value is committed it never
//! changes; committing the same value again is accepted.

use std::fs;
use std::io;
use std::path::PathBuf;

use sbp_protocol::PersistError;

/// Stored pattern meaning "nothing committed".
pub const UNSET_WORD: u32 = u32::MAX;

#[derive(Debug, Clone)]
enum Backend {
    Memory([u8; 4]),
    File(PathBuf),
}

/// The persisted configuration word.
#[derive(Debug, Clone)]
pub struct NvWord {
    backend: Backend,
}

impl NvWord {
    /// A word living in memory only, initially unset.
    pub fn in_memory() -> Self {
        NvWord {
            backend: Backend::Memory(UNSET_WORD.to_le_bytes()),
        }
    }

    /// A word stored in `path`. A missing file reads as unset.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        NvWord {
            backend: Backend::File(path.into()),
        }
    }

    /// The committed value, if any.
    pub fn load(&self) -> Result<Option<u32>, PersistError> {
        let raw = match &self.backend {
            Backend::Memory(bytes) => *bytes,
            Backend::File(path) => match fs::read(path) {
                Ok(data) => data
                    .get(..4)
                    .and_then(|b| <[u8; 4]>::try_from(b).ok())
                    .ok_or_else(|| {
                        PersistError::Storage(format!("{} is truncated", path.display()))
                    })?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => UNSET_WORD.to_le_bytes(),
                Err(e) => return Err(PersistError::Storage(e.to_string())),
            },
        };

        let word = u32::from_le_bytes(raw);
        Ok((word != UNSET_WORD).then_some(word))
    }

    /// Check whether `value` can be committed, without writing anything.
    ///
    /// Returns whether a write is still needed: `false` when `value` is
    /// already the committed one.
    pub fn check(&self, value: u32) -> Result<bool, PersistError> {
        if value == UNSET_WORD {
            return Err(PersistError::Storage(format!(
                "{value:#010x} is the unset pattern"
            )));
        }
        match self.load()? {
            Some(committed) if committed == value => Ok(false),
            Some(committed) => Err(PersistError::AlreadyCommitted { committed }),
            None => Ok(true),
        }
    }

    /// Commit `value`.
    ///
    /// Fails with [`PersistError::AlreadyCommitted`] when a different value
    /// is already stored.
    pub fn commit(&mut self, value: u32) -> Result<(), PersistError> {
        if !self.check(value)? {
            return Ok(());
        }

        let bytes = value.to_le_bytes();
        match &mut self.backend {
            Backend::Memory(stored) => *stored = bytes,
            Backend::File(path) => {
                fs::write(path, bytes).map_err(|e| PersistError::Storage(e.to_string()))?
            }
        }
        tracing::info!("committed configuration word {value}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_word_write_once() {
        let mut word = NvWord::in_memory();
        assert_eq!(word.load().unwrap(), None);

        word.commit(42).unwrap();
        assert_eq!(word.load().unwrap(), Some(42));
        word.commit(42).unwrap();

        assert!(matches!(
            word.commit(43),
            Err(PersistError::AlreadyCommitted { committed: 42 })
        ));
        assert_eq!(word.load().unwrap(), Some(42));
    }

    #[test]
    fn test_check_does_not_write() {
        let mut word = NvWord::in_memory();
        assert_eq!(word.check(7), Ok(true));
        assert_eq!(word.load().unwrap(), None);

        word.commit(7).unwrap();
        assert_eq!(word.check(7), Ok(false));
        assert_eq!(
            word.check(8),
            Err(PersistError::AlreadyCommitted { committed: 7 })
        );
    }

    #[test]
    fn test_unset_pattern_rejected() {
        let mut word = NvWord::in_memory();
        assert!(word.commit(UNSET_WORD).is_err());
        assert_eq!(word.load().unwrap(), None);
    }

    #[test]
    fn test_file_word() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.word");

        let mut word = NvWord::file(&path);
        assert_eq!(word.load().unwrap(), None);
        word.commit(0x01020304).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![4, 3, 2, 1]);

        let reopened = NvWord::file(&path);
        assert_eq!(reopened.load().unwrap(), Some(0x01020304));
    }

    #[test]
    fn test_file_all_ones_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.word");
        fs::write(&path, [0xFF; 4]).unwrap();
        assert_eq!(NvWord::file(&path).load().unwrap(), None);

        fs::write(&path, [0x01]).unwrap();
        assert!(NvWord::file(&path).load().is_err());
    }
}
