//! Translation memory: a bounded cache of earlier engine results.
//!
//! Keys are `source|targetLanguage`. The store is owned by whoever builds the
//! orchestrator, so separate sessions never share state by accident. Disk
//! persistence is best effort; failures are logged and otherwise ignored.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const MEMORY_FILE_NAME: &str = "translation_memory.json";

#[derive(Debug)]
struct Slot {
    value: String,
    last_used: u64,
}

#[derive(Debug, Default)]
struct MemoryInner {
    slots: HashMap<String, Slot>,
    clock: u64,
    dirty: bool,
}

impl MemoryInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.slots.len() > capacity {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.slots.remove(&oldest);
        }
    }
}

#[derive(Debug)]
pub struct TranslationMemory {
    capacity: usize,
    path: Option<PathBuf>,
    inner: Mutex<MemoryInner>,
}

pub fn memory_key(source: &str, target_lang: &str) -> String {
    format!("{source}|{target_lang}")
}

impl TranslationMemory {
    /// In-memory only.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            path: None,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    /// Backed by a JSON file at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut memory = Self::new(capacity);
        match load_entries(&path) {
            Ok(entries) => {
                let mut inner = memory.lock();
                for (key, value) in entries {
                    let last_used = inner.tick();
                    inner.slots.insert(key, Slot { value, last_used });
                }
                inner.evict_to(memory.capacity);
                inner.dirty = false;
                debug!("loaded {} translation memory entries", inner.slots.len());
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("ignoring translation memory at {}: {err}", path.display()),
        }
        memory.path = Some(path);
        memory
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(crate::APP_DIR_NAME).join(MEMORY_FILE_NAME))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, source: &str, target_lang: &str) -> Option<String> {
        let mut inner = self.lock();
        let now = inner.tick();
        let slot = inner.slots.get_mut(&memory_key(source, target_lang))?;
        slot.last_used = now;
        Some(slot.value.clone())
    }

    pub fn store(&self, source: &str, target_lang: &str, translated: &str) {
        if source.trim().is_empty() || translated.trim().is_empty() {
            return;
        }
        let mut inner = self.lock();
        let last_used = inner.tick();
        inner.slots.insert(
            memory_key(source, target_lang),
            Slot {
                value: translated.to_string(),
                last_used,
            },
        );
        inner.evict_to(self.capacity);
        inner.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.dirty = true;
    }

    /// Write pending changes to disk. Returns whether a file was written.
    pub fn flush(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let snapshot: HashMap<String, String> = {
            let inner = self.lock();
            if !inner.dirty {
                return false;
            }
            inner
                .slots
                .iter()
                .map(|(key, slot)| (key.clone(), slot.value.clone()))
                .collect()
        };

        match save_entries(path, &snapshot) {
            Ok(()) => {
                self.lock().dirty = false;
                true
            }
            Err(err) => {
                warn!("failed to save translation memory to {}: {err}", path.display());
                false
            }
        }
    }
}

fn load_entries(path: &Path) -> std::io::Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

fn save_entries(path: &Path, entries: &HashMap<String, String>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn key_combines_source_and_language() {
        assert_eq!(memory_key("Hello", "vi"), "Hello|vi");
    }

    #[test]
    fn stores_and_looks_up_per_language() {
        let memory = TranslationMemory::new(10);
        memory.store("Hello", "vi", "Xin chào");
        assert_eq!(memory.lookup("Hello", "vi").as_deref(), Some("Xin chào"));
        assert_eq!(memory.lookup("Hello", "fr"), None);
    }

    #[test]
    fn evicts_least_recently_used() {
        let memory = TranslationMemory::new(2);
        memory.store("a", "vi", "A");
        memory.store("b", "vi", "B");
        assert!(memory.lookup("a", "vi").is_some());
        memory.store("c", "vi", "C");

        assert_eq!(memory.len(), 2);
        assert!(memory.lookup("b", "vi").is_none());
        assert!(memory.lookup("a", "vi").is_some());
        assert!(memory.lookup("c", "vi").is_some());
    }

    #[test]
    fn ignores_blank_values() {
        let memory = TranslationMemory::new(4);
        memory.store("a", "vi", "  ");
        memory.store(" ", "vi", "x");
        assert!(memory.is_empty());
    }

    #[test]
    fn persists_between_sessions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tm").join("memory.json");

        let memory = TranslationMemory::open(&path, 10);
        assert!(!memory.flush());
        memory.store("Hello", "vi", "Xin chào");
        assert!(memory.flush());
        assert!(!memory.flush());

        let reopened = TranslationMemory::open(&path, 10);
        assert_eq!(reopened.lookup("Hello", "vi").as_deref(), Some("Xin chào"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        fs::write(&path, "not json").unwrap();

        let memory = TranslationMemory::open(&path, 10);
        assert!(memory.is_empty());
    }

    #[test]
    fn write_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();

        let memory = TranslationMemory::open(&path, 10);
        memory.store("a", "vi", "A");
        assert!(!memory.flush());
        assert_eq!(memory.lookup("a", "vi").as_deref(), Some("A"));
    }
}
