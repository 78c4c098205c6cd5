use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed: {0}")]
    Write(String),
}

/// Durable slot holding the serialized bookmark tree.
pub trait BookmarkStorage {
    /// `Ok(None)` when nothing was stored yet.
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&mut self, serialized: &str) -> Result<(), StorageError>;
}

/// In-memory storage. Clones share the slot, so a test can inspect what a
/// store wrote or seed what the next store reads.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Rc<RefCell<Option<String>>>,
    writes: Rc<RefCell<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(serialized: impl Into<String>) -> Self {
        let storage = Self::default();
        *storage.slot.borrow_mut() = Some(serialized.into());
        storage
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl BookmarkStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&mut self, serialized: &str) -> Result<(), StorageError> {
        *self.slot.borrow_mut() = Some(serialized.to_string());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}
