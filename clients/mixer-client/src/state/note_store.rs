//! Note persistence
//!
//! [`NoteStore`] is the key-value contract: one string value per namespace.
//! [`NoteBook`] keeps the note list under a fixed namespace as a JSON array
//! of `{nullifier, secret, commitment, amount, timestamp}` records.
//!
//! Implementations:
//! - `InMemoryNoteStore` (testing, short-lived sessions)
//! - `FileNoteStore` (one `<namespace>.json` file per namespace)

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::note::{Note, NoteManager};
use crate::crypto::field::FieldElement;
use crate::error::{MixerError, Result};

/// Namespace the web client used for its note list
pub const DEFAULT_NOTE_NAMESPACE: &str = "tornado_notes";

/// Namespaced string storage.
pub trait NoteStore: Send + Sync {
    /// Stored value, or `None` if the namespace was never written.
    fn load(&self, namespace: &str) -> Result<Option<String>>;

    fn save(&self, namespace: &str, value: &str) -> Result<()>;

    /// Remove the namespace. Removing an absent namespace is not an error.
    fn delete(&self, namespace: &str) -> Result<()>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

pub struct InMemoryNoteStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| MixerError::Storage("note store lock poisoned".to_string()))
    }
}

impl Default for InMemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore for InMemoryNoteStore {
    fn load(&self, namespace: &str) -> Result<Option<String>> {
        Ok(self.values()?.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, value: &str) -> Result<()> {
        self.values()?.insert(namespace.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, namespace: &str) -> Result<()> {
        self.values()?.remove(namespace);
        Ok(())
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

/// Stores each namespace as `<dir>/<namespace>.json`.
pub struct FileNoteStore {
    dir: PathBuf,
}

impl FileNoteStore {
    /// Create the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> Result<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(MixerError::Storage(format!("invalid namespace '{namespace}'")));
        }
        Ok(self.dir.join(format!("{namespace}.json")))
    }
}

impl NoteStore for FileNoteStore {
    fn load(&self, namespace: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(namespace)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, namespace: &str, value: &str) -> Result<()> {
        let path = self.path_for(namespace)?;
        // Readers never see a partially written list.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Note list written");
        Ok(())
    }

    fn delete(&self, namespace: &str) -> Result<()> {
        match fs::remove_file(self.path_for(namespace)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// NOTE BOOK
// ============================================================================

/// The user's note list on top of a [`NoteStore`].
pub struct NoteBook<S: NoteStore> {
    store: S,
    namespace: String,
    manager: NoteManager,
}

impl<S: NoteStore> NoteBook<S> {
    pub fn new(store: S, namespace: impl Into<String>, manager: NoteManager) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            manager,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All stored notes, oldest first.
    pub fn list(&self) -> Result<Vec<Note>> {
        match self.store.load(&self.namespace)? {
            Some(value) => Ok(serde_json::from_str(&value)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, notes: &[Note]) -> Result<()> {
        self.store.save(&self.namespace, &serde_json::to_string(notes)?)
    }

    /// Append a note. A note with the same commitment is replaced.
    pub fn persist(&self, note: &Note) -> Result<()> {
        let mut notes = self.list()?;
        notes.retain(|n| n.commitment != note.commitment);
        notes.push(note.clone());
        self.write(&notes)?;

        debug!(commitment = %note.commitment, total = notes.len(), "Note persisted");
        Ok(())
    }

    pub fn find_by_commitment(&self, commitment: &FieldElement) -> Result<Option<Note>> {
        Ok(self.list()?.into_iter().find(|n| n.commitment == *commitment))
    }

    /// Drop a note (e.g. once spent). Returns whether it was present.
    pub fn remove(&self, commitment: &FieldElement) -> Result<bool> {
        let mut notes = self.list()?;
        let before = notes.len();
        notes.retain(|n| n.commitment != *commitment);
        if notes.len() == before {
            return Ok(false);
        }
        self.write(&notes)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.delete(&self.namespace)
    }

    /// Pretty-printed JSON array of all notes.
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.list()?)?)
    }

    /// Replace the note set with an exported list.
    ///
    /// Best-effort: notes whose secrets do not reproduce their commitment are
    /// dropped silently from the imported set and only counted in the log.
    /// Validate beforehand for strict behavior. Malformed JSON is an error.
    /// Returns the number of notes kept.
    pub fn import(&self, json: &str) -> Result<usize> {
        let incoming: Vec<Note> = serde_json::from_str(json)?;
        let total = incoming.len();
        let valid: Vec<Note> = incoming
            .into_iter()
            .filter(|note| self.manager.validate(note))
            .collect();

        if valid.len() < total {
            warn!(dropped = total - valid.len(), "Invalid notes dropped on import");
        }

        self.write(&valid)?;
        info!(imported = valid.len(), namespace = %self.namespace, "Notes imported");
        Ok(valid.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::PoseidonOracle;
    use rand::Rng;
    use std::sync::Arc;

    fn manager() -> NoteManager {
        NoteManager::new(Arc::new(PoseidonOracle::setup().unwrap()))
    }

    fn book() -> NoteBook<InMemoryNoteStore> {
        NoteBook::new(InMemoryNoteStore::new(), DEFAULT_NOTE_NAMESPACE, manager())
    }

    #[test]
    fn test_empty_book() {
        assert!(book().list().unwrap().is_empty());
    }

    #[test]
    fn test_persist_find_remove() {
        let book = book();
        let manager = manager();
        let a = manager.generate(10).unwrap();
        let b = manager.generate(20).unwrap();
        book.persist(&a).unwrap();
        book.persist(&b).unwrap();
        book.persist(&a).unwrap();

        let notes = book.list().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(book.find_by_commitment(&b.commitment).unwrap(), Some(b.clone()));

        assert!(book.remove(&b.commitment).unwrap());
        assert!(!book.remove(&b.commitment).unwrap());
        assert_eq!(book.list().unwrap(), vec![a]);

        book.clear().unwrap();
        assert!(book.list().unwrap().is_empty());
    }

    #[test]
    fn test_import_drops_invalid_notes() {
        let source = book();
        let manager = manager();
        let good = manager.generate(1).unwrap();
        let mut bad = manager.generate(2).unwrap();
        bad.secret = FieldElement::from_u64(1);
        source.persist(&good).unwrap();
        source.persist(&bad).unwrap();
        let exported = source.export().unwrap();

        let target = book();
        target.persist(&manager.generate(3).unwrap()).unwrap();
        assert_eq!(target.import(&exported).unwrap(), 1);
        assert_eq!(target.list().unwrap(), vec![good]);
    }

    #[test]
    fn test_import_rejects_malformed_json() {
        assert!(matches!(book().import("not json"), Err(MixerError::Serialization(_))));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("mixer-notes-{}", rand::thread_rng().gen::<u64>()));
        let store = FileNoteStore::open(&dir).unwrap();
        assert_eq!(store.load("notes").unwrap(), None);

        store.save("notes", "[]").unwrap();
        assert_eq!(store.load("notes").unwrap().as_deref(), Some("[]"));

        store.delete("notes").unwrap();
        store.delete("notes").unwrap();
        assert_eq!(store.load("notes").unwrap(), None);

        assert!(store.save("../escape", "x").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_backed_book() {
        let dir = std::env::temp_dir().join(format!("mixer-book-{}", rand::thread_rng().gen::<u64>()));
        let manager = manager();
        let note = manager.generate(5).unwrap();
        {
            let book = NoteBook::new(FileNoteStore::open(&dir).unwrap(), DEFAULT_NOTE_NAMESPACE, manager.clone());
            book.persist(&note).unwrap();
        }
        let reopened = NoteBook::new(FileNoteStore::open(&dir).unwrap(), DEFAULT_NOTE_NAMESPACE, manager);
        assert_eq!(reopened.list().unwrap(), vec![note]);
        fs::remove_dir_all(&dir).unwrap();
    }
}
