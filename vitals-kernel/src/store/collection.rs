/**
 * COLLECTION - Stockage documentaire générique (cache mémoire + fichier JSON)
 *
 * Deux formats sur disque :
 * - snapshot : tableau JSON réécrit à chaque modification (affectations, utilisateurs)
 * - append   : un document JSON par ligne, ajouté en fin de fichier (relevés, audit)
 */

use super::StoreError;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum Persistence {
    Memory,
    Snapshot(PathBuf),
    Append(PathBuf),
}

pub struct Collection<T> {
    name: &'static str,
    persistence: Persistence,
    cache: Mutex<Vec<T>>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn in_memory(name: &'static str) -> Self {
        Self {
            name,
            persistence: Persistence::Memory,
            cache: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot<P: Into<PathBuf>>(name: &'static str, path: P) -> Result<Self, StoreError> {
        Self::open(name, Persistence::Snapshot(path.into()))
    }

    pub fn append_only<P: Into<PathBuf>>(name: &'static str, path: P) -> Result<Self, StoreError> {
        Self::open(name, Persistence::Append(path.into()))
    }

    fn open(name: &'static str, persistence: Persistence) -> Result<Self, StoreError> {
        let collection = Self {
            name,
            persistence,
            cache: Mutex::new(Vec::new()),
        };
        collection.load_from_disk()?;
        debug!(collection = name, documents = collection.len(), "collection loaded");
        Ok(collection)
    }

    /// Charge les documents depuis le fichier vers le cache mémoire
    fn load_from_disk(&self) -> Result<(), StoreError> {
        let docs = match &self.persistence {
            Persistence::Memory => Vec::new(),
            Persistence::Snapshot(path) => {
                if !path.exists() {
                    // Fichier n'existe pas encore, on crée un tableau vide
                    fs::write(path, "[]")?;
                }
                let content = fs::read_to_string(path)?;
                if content.trim().is_empty() {
                    Vec::new()
                } else {
                    serde_json::from_str(&content)?
                }
            }
            Persistence::Append(path) => {
                if !path.exists() {
                    fs::write(path, "")?;
                }
                let content = fs::read_to_string(path)?;
                let mut docs = Vec::new();
                for (lineno, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str(line) {
                        Ok(doc) => docs.push(doc),
                        // ligne tronquée par un arrêt brutal : on l'ignore
                        Err(e) => warn!(collection = self.name, line = lineno + 1, error = %e, "skipping unreadable document"),
                    }
                }
                docs
            }
        };

        *self.cache.lock() = docs;
        Ok(())
    }

    /// Écrit l'état complet de la collection sur disque
    fn save_to_disk(&self, docs: &[T]) -> Result<(), StoreError> {
        match &self.persistence {
            Persistence::Memory => {}
            Persistence::Snapshot(path) => {
                let json = serde_json::to_string_pretty(docs)?;
                fs::write(path, json)?;
            }
            Persistence::Append(path) => {
                let mut out = String::new();
                for doc in docs {
                    out.push_str(&serde_json::to_string(doc)?);
                    out.push('\n');
                }
                fs::write(path, out)?;
            }
        }
        Ok(())
    }

    /// Lecture sous verrou
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let cache = self.cache.lock();
        f(&cache)
    }

    /// Modification transactionnelle : appliquée sur une copie, persistée,
    /// puis publiée. Une erreur laisse la collection inchangée.
    pub fn write<R>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R, StoreError>) -> Result<R, StoreError> {
        self.modify(|docs| f(docs).map(|result| (result, true)))
    }

    /// Comme `write`, mais `f` indique si la copie a changé ; sinon rien n'est persisté
    pub fn modify<R>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<(R, bool), StoreError>) -> Result<R, StoreError> {
        let mut cache = self.cache.lock();
        let mut next = cache.clone();
        let (result, dirty) = f(&mut next)?;
        if dirty {
            self.save_to_disk(&next)?;
            *cache = next;
        }
        Ok(result)
    }

    /// Ajout d'un document en fin de collection
    pub fn push(&self, doc: T) -> Result<(), StoreError> {
        match &self.persistence {
            Persistence::Append(path) => {
                let mut cache = self.cache.lock();
                let mut line = serde_json::to_string(&doc)?;
                line.push('\n');
                let mut file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
                // fragment laissé par une écriture interrompue : on le referme
                if file.metadata()?.len() > 0 {
                    let mut last = [0u8; 1];
                    file.seek(SeekFrom::End(-1))?;
                    file.read_exact(&mut last)?;
                    if last[0] != b'\n' {
                        line.insert(0, '\n');
                    }
                }
                file.write_all(line.as_bytes())?;
                cache.push(doc);
                Ok(())
            }
            _ => self.write(|docs| {
                docs.push(doc);
                Ok(())
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: u32,
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");

        let docs = Collection::<Doc>::snapshot("docs", &path).unwrap();
        docs.push(Doc { id: 1 }).unwrap();
        docs.write(|all| {
            all.push(Doc { id: 2 });
            Ok(())
        })
        .unwrap();

        let reopened = Collection::<Doc>::snapshot("docs", &path).unwrap();
        assert_eq!(reopened.read(|all| all.to_vec()), vec![Doc { id: 1 }, Doc { id: 2 }]);
    }

    #[test]
    fn test_append_survives_reopen_and_skips_torn_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        let docs = Collection::<Doc>::append_only("docs", &path).unwrap();
        docs.push(Doc { id: 1 }).unwrap();
        docs.push(Doc { id: 2 }).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\": 3").unwrap();

        let reopened = Collection::<Doc>::append_only("docs", &path).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_append_after_torn_line_keeps_new_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        let docs = Collection::<Doc>::append_only("docs", &path).unwrap();
        docs.push(Doc { id: 1 }).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\": 2").unwrap();

        let docs = Collection::<Doc>::append_only("docs", &path).unwrap();
        docs.push(Doc { id: 3 }).unwrap();

        let reopened = Collection::<Doc>::append_only("docs", &path).unwrap();
        assert_eq!(reopened.read(|all| all.to_vec()), vec![Doc { id: 1 }, Doc { id: 3 }]);
    }

    #[test]
    fn test_clean_modify_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        let docs = Collection::<Doc>::snapshot("docs", &path).unwrap();
        docs.push(Doc { id: 1 }).unwrap();
        std::fs::remove_file(&path).unwrap();

        let seen = docs.modify(|all| Ok((all.len(), false))).unwrap();
        assert_eq!(seen, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_leaves_collection_unchanged() {
        let docs = Collection::<Doc>::in_memory("docs");
        docs.push(Doc { id: 1 }).unwrap();

        let result: Result<(), StoreError> = docs.write(|all| {
            all.clear();
            Err(StoreError::NotFound("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(docs.len(), 1);
    }
}
