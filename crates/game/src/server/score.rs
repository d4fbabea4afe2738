use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("score file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("score file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Running score counter, kept out of the hot message path and flushed explicitly.
pub trait ScoreStore: Send {
    fn load(&self) -> i64;
    fn add(&mut self, delta: i64);
    fn persist(&mut self) -> Result<(), ScoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScoreFile {
    score: i64,
}

#[derive(Debug)]
pub struct FileScoreStore {
    path: PathBuf,
    score: i64,
    dirty: bool,
}

impl FileScoreStore {
    /// Opens the store at `path`. A missing file starts the score at zero.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScoreError> {
        let path = path.as_ref().to_path_buf();
        let score = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<ScoreFile>(&contents)?.score,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            score,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for FileScoreStore {
    fn load(&self) -> i64 {
        self.score
    }

    fn add(&mut self, delta: i64) {
        self.score += delta;
        self.dirty = true;
    }

    fn persist(&mut self) -> Result<(), ScoreError> {
        if !self.dirty {
            return Ok(());
        }
        let contents = serde_json::to_string_pretty(&ScoreFile { score: self.score })?;
        fs::write(&self.path, contents)?;
        self.dirty = false;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryScoreStore {
    score: i64,
    persisted: i64,
    persist_count: usize,
}

impl MemoryScoreStore {
    pub fn new(score: i64) -> Self {
        Self {
            score,
            persisted: score,
            persist_count: 0,
        }
    }

    pub fn persisted(&self) -> i64 {
        self.persisted
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self) -> i64 {
        self.score
    }

    fn add(&mut self, delta: i64) {
        self.score += delta;
    }

    fn persist(&mut self) -> Result<(), ScoreError> {
        self.persisted = self.score;
        self.persist_count += 1;
        Ok(())
    }
}
