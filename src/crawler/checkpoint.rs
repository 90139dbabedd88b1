use std::collections::HashSet;
use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;

/// Stable storage key for a seed: the scheme-stripped network location, so
/// `http://` and `https://` crawls of one host resume from the same record.
pub fn key_for(seed: &Url) -> Option<String> {
    seed.host_str().map(str::to_owned)
}

/// Durable form of the frontier. The triple round-trips exactly; `saved_at`
/// only records when the snapshot was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontierSnapshot {
    pub saved_at: DateTime<Utc>,
    pub queue: Vec<String>,
    pub visited: Vec<String>,
    pub discovered: Vec<String>,
}

impl FrontierSnapshot {
    pub fn new(queue: Vec<String>, mut visited: Vec<String>, mut discovered: Vec<String>) -> Self {
        visited.sort();
        discovered.sort();
        Self {
            saved_at: Utc::now(),
            queue,
            visited,
            discovered,
        }
    }

    /// Checks the frontier invariants: every queued URL is visited and every
    /// discovered URL is visited. A snapshot violating them did not come from
    /// this crawler and must not seed a resume.
    fn validate(&self) -> Result<(), String> {
        let visited: HashSet<&str> = self.visited.iter().map(String::as_str).collect();
        if let Some(url) = self.queue.iter().find(|url| !visited.contains(url.as_str())) {
            return Err(format!("queued URL '{url}' is not in the visited set"));
        }
        if let Some(url) = self
            .discovered
            .iter()
            .find(|url| !visited.contains(url.as_str()))
        {
            return Err(format!("discovered URL '{url}' is not in the visited set"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint '{path}' is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("checkpoint '{path}' is corrupt: {detail}")]
    InvalidState { path: PathBuf, detail: String },
    #[error("failed to write checkpoint '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One JSON record per domain key under a state directory. Saves go through a
/// temp file and a rename, so an interrupted write never clobbers the
/// previous record.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Previously saved state for `key`, or `None` for a fresh crawl. A record
    /// that exists but cannot be trusted is an error, never a fresh start.
    pub fn load(&self, key: &str) -> Result<Option<FrontierSnapshot>, CheckpointError> {
        let path = self.path_for(key);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };
        let snapshot: FrontierSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| CheckpointError::Malformed {
                path: path.clone(),
                source,
            })?;
        snapshot
            .validate()
            .map_err(|detail| CheckpointError::InvalidState { path, detail })?;
        Ok(Some(snapshot))
    }

    /// Atomically replaces the record for `key`.
    pub fn save(&self, key: &str, snapshot: &FrontierSnapshot) -> Result<(), CheckpointError> {
        let path = self.path_for(key);
        let write_err = |source: io::Error| CheckpointError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        serde_json::to_writer(&mut tmp, snapshot).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source: source.into(),
        })?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}
