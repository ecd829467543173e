use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::profile::{ExperienceLevel, FarmerProfile, FarmingType, PreferredLanguage, MAX_AGE, MIN_AGE};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record for '{name}': {detail}")]
    CorruptRecord { name: String, detail: String },
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Single-table store of farmer profiles keyed by name.
///
/// Every operation touches one row while holding the connection lock, so
/// concurrent upserts to the same name resolve as last-writer-wins.
pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS farmers (
                name TEXT PRIMARY KEY,
                district TEXT,
                age INTEGER,
                language TEXT,
                farming_type TEXT,
                experience TEXT
            );
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Insert the profile, or replace every column of the row with the same name.
    pub fn upsert(&self, profile: &FarmerProfile) -> Result<(), StorageError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO farmers (name, district, age, language, farming_type, experience)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.name,
                profile.district,
                profile.age,
                profile.language.as_str(),
                profile.farming_type.as_str(),
                profile.experience.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<FarmerProfile>, StorageError> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT name, district, age, language, farming_type, experience FROM farmers WHERE name = ?1",
                params![name],
                |row| {
                    Ok(StoredRow {
                        name: row.get(0)?,
                        district: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        age: row.get::<_, Option<i64>>(2)?,
                        language: row.get::<_, Option<String>>(3)?,
                        farming_type: row.get::<_, Option<String>>(4)?,
                        experience: row.get::<_, Option<String>>(5)?,
                    })
                },
            )
            .optional()?;

        row.map(StoredRow::into_profile).transpose()
    }
}

// Raw column values; the table has no NOT NULL constraints.
struct StoredRow {
    name: String,
    district: String,
    age: Option<i64>,
    language: Option<String>,
    farming_type: Option<String>,
    experience: Option<String>,
}

impl StoredRow {
    fn into_profile(self) -> Result<FarmerProfile, StorageError> {
        let corrupt = |detail: String| StorageError::CorruptRecord {
            name: self.name.clone(),
            detail,
        };

        let age = match self.age {
            Some(age) if (MIN_AGE..=MAX_AGE).contains(&age) => age,
            other => return Err(corrupt(format!("age {:?} out of range", other))),
        };
        let language = self
            .language
            .as_deref()
            .and_then(PreferredLanguage::from_str)
            .ok_or_else(|| corrupt(format!("unknown language {:?}", self.language)))?;
        let farming_type = self
            .farming_type
            .as_deref()
            .and_then(FarmingType::from_str)
            .ok_or_else(|| corrupt(format!("unknown farming type {:?}", self.farming_type)))?;
        let experience = self
            .experience
            .as_deref()
            .and_then(ExperienceLevel::from_str)
            .ok_or_else(|| corrupt(format!("unknown experience level {:?}", self.experience)))?;

        Ok(FarmerProfile {
            name: self.name,
            district: self.district,
            age,
            language,
            farming_type,
            experience,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> FarmerProfile {
        FarmerProfile::new(
            name,
            "Kottayam",
            35,
            PreferredLanguage::English,
            FarmingType::Coconut,
            ExperienceLevel::Beginner,
        )
        .unwrap()
    }

    #[test]
    fn test_upsert_then_find_returns_same_record() {
        let store = ProfileStore::open_in_memory().unwrap();
        let profile = sample("Anitha");

        store.upsert(&profile).unwrap();

        assert_eq!(store.find_by_name("Anitha").unwrap(), Some(profile));
    }

    #[test]
    fn test_repeat_upsert_replaces_whole_record() {
        let store = ProfileStore::open_in_memory().unwrap();
        store.upsert(&sample("Anitha")).unwrap();

        let replacement = FarmerProfile::new(
            "Anitha",
            "Idukki",
            61,
            PreferredLanguage::Both,
            FarmingType::Spices,
            ExperienceLevel::Expert,
        )
        .unwrap();
        store.upsert(&replacement).unwrap();

        assert_eq!(store.find_by_name("Anitha").unwrap(), Some(replacement));
        let count: i64 = store
            .connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM farmers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_find_unknown_name_is_none() {
        let store = ProfileStore::open_in_memory().unwrap();
        store.upsert(&sample("Anitha")).unwrap();

        assert_eq!(store.find_by_name("Biju").unwrap(), None);
        // exact match only
        assert_eq!(store.find_by_name("anitha").unwrap(), None);
    }

    #[test]
    fn test_unparseable_row_is_corrupt_record() {
        let store = ProfileStore::open_in_memory().unwrap();
        store
            .connection()
            .unwrap()
            .execute(
                "INSERT INTO farmers (name, district, age, language, farming_type, experience)
                 VALUES ('Manoj', 'Kannur', 40, 'Tamil', 'Paddy', 'Expert')",
                [],
            )
            .unwrap();

        match store.find_by_name("Manoj") {
            Err(StorageError::CorruptRecord { name, .. }) => assert_eq!(name, "Manoj"),
            other => panic!("expected CorruptRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("farmers.db");

        {
            let store = ProfileStore::open(&path).unwrap();
            store.upsert(&sample("Suresh")).unwrap();
        }

        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(reopened.find_by_name("Suresh").unwrap(), Some(sample("Suresh")));
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let result = ProfileStore::open(&blocker.join("farmers.db"));
        assert!(result.is_err());
    }
}
