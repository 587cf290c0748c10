//! Persisted trigger state.
//!
//! Maps each trigger URL to the fingerprint that was last successfully
//! committed (triggered, or unchanged at the time). Stored as a JSON document;
//! writes go to a `.tmp` sibling and are renamed into place so a crash never
//! leaves a half-written file behind.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Trigger URL → hex fingerprint of the last committed image-id mapping.
pub type State = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("couldn't read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("couldn't decode state file {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("couldn't encode state for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("couldn't write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Load the persisted state.
///
/// A missing file is an empty state, not an error. Any other read or decode
/// failure is returned as-is; proceeding with an assumed-empty state would
/// re-trigger every target.
pub fn load(path: &Path) -> Result<State, StateError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| StateError::Decode {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) if source.kind() == ErrorKind::NotFound => Ok(State::new()),
        Err(source) => Err(StateError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persist `state` atomically: write and fsync `<path>.tmp`, then rename
/// over `path`. The fsync keeps a power loss right after the rename from
/// surfacing a truncated file.
pub fn save(path: &Path, state: &State) -> Result<(), StateError> {
    let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = tmp_path(path);
    write_synced(&tmp, json.as_bytes()).map_err(|source| StateError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_state_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let state = load(&tmp.path().join("state.json")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let mut state = State::new();
        state.insert("https://ci.example/build/a".into(), "deadbeef".into());
        state.insert("https://ci.example/build/b".into(), "cafebabe".into());

        save(&path, &state).unwrap();
        assert_eq!(load(&path).unwrap(), state);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        save(&path, &State::new()).unwrap();
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn corrupt_file_is_an_error_not_empty_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(StateError::Decode { .. })));
    }

    #[test]
    fn crashed_write_leaves_old_state_readable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let mut old = State::new();
        old.insert("https://ci.example/build/a".into(), "deadbeef".into());
        save(&path, &old).unwrap();

        // A crash between write and rename leaves only the tmp file dirty.
        std::fs::write(tmp_path(&path), "{ truncated").unwrap();
        assert_eq!(load(&path).unwrap(), old);
    }

    #[test]
    fn save_into_missing_directory_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no_such_dir").join("state.json");
        assert!(matches!(
            save(&path, &State::new()),
            Err(StateError::Write { .. })
        ));
    }

    #[test]
    fn save_overwrites_previous_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let mut first = State::new();
        first.insert("https://ci.example/build/a".into(), "deadbeef".into());
        save(&path, &first).unwrap();

        let second = State::new();
        save(&path, &second).unwrap();
        assert!(load(&path).unwrap().is_empty());
    }
}
