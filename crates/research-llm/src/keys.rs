//! Credential pool with round-robin rotation
//!
//! Keys come from three places, in this order: a primary key file holding a
//! single key, a pool file with one key per line, and numbered environment
//! variables. The first occurrence of a key wins; malformed entries are
//! skipped with a warning.
//!
//! Rotation is strict round-robin over the loaded order. Failures are logged
//! through [`KeyPool::report_failure`] but never change the schedule.

use crate::{LLMError, Result};
use research_utils::KeySettings;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

const GEMINI_KEY_PREFIX: &str = "AIzaSy";
const GEMINI_KEY_LEN: usize = 39;

/// Whether `key` has the shape of a Gemini API key
pub fn is_valid_gemini_key(key: &str) -> bool {
    key.starts_with(GEMINI_KEY_PREFIX)
        && key.len() == GEMINI_KEY_LEN
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// An API key; `Debug` and `Display` never print it in full
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key without checking its format
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Wrap a key after checking the Gemini key format
    pub fn parse(key: &str) -> Result<Self> {
        let key = key.trim();
        if is_valid_gemini_key(key) {
            Ok(Self(key.to_string()))
        } else {
            Err(LLMError::InvalidCredential(redact(key)))
        }
    }

    /// The raw key, for request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&redact(&self.0)).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// One handed-out credential and where it sits in the rotation
#[derive(Debug, Clone)]
pub struct KeyLease {
    pub credential: Credential,
    /// Position in the pool
    pub index: usize,
    /// Value of the rotation counter when this lease was issued
    pub rotation: u64,
    pub pool_size: usize,
}

impl KeyLease {
    pub fn is_primary(&self) -> bool {
        self.index == 0
    }
}

/// Pool counters exposed over the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyPoolStats {
    pub total_keys: usize,
    pub available_keys: usize,
    /// Always zero; keys are never suspended
    pub suspended_keys: usize,
    pub rotations: u64,
}

/// Thread-safe round-robin credential pool
///
/// Owned explicitly and shared as `Arc<KeyPool>`.
#[derive(Debug)]
pub struct KeyPool {
    keys: RwLock<Vec<Credential>>,
    counter: AtomicU64,
    sources: Option<KeySettings>,
}

impl KeyPool {
    /// Create a pool from already-known credentials; duplicates are dropped
    pub fn new(keys: Vec<Credential>) -> Self {
        Self {
            keys: RwLock::new(dedupe(keys)),
            counter: AtomicU64::new(0),
            sources: None,
        }
    }

    /// Load the pool from the configured files and the process environment
    pub fn load(settings: &KeySettings) -> Result<Self> {
        Self::load_with_env(settings, |name| std::env::var(name).ok())
    }

    /// Load the pool using a custom environment lookup
    pub fn load_with_env<F>(settings: &KeySettings, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys = collect_keys(settings, &lookup)?;
        if keys.is_empty() {
            warn!(
                "No API keys found in {} or {}",
                settings.primary_file.display(),
                settings.pool_file.display()
            );
        } else {
            info!("Loaded {} API key(s)", keys.len());
        }

        Ok(Self {
            keys: RwLock::new(keys),
            counter: AtomicU64::new(0),
            sources: Some(settings.clone()),
        })
    }

    /// Hand out the next credential, or `None` when the pool is empty
    pub fn next_key(&self) -> Option<KeyLease> {
        let keys = self.keys.read().ok()?;
        if keys.is_empty() {
            return None;
        }

        let rotation = self.counter.fetch_add(1, Ordering::Relaxed);
        let index = (rotation % keys.len() as u64) as usize;
        debug!(
            "Using API key {} of {} (rotation {})",
            index + 1,
            keys.len(),
            rotation
        );

        Some(KeyLease {
            credential: keys[index].clone(),
            index,
            rotation,
            pool_size: keys.len(),
        })
    }

    /// Like [`next_key`](Self::next_key) but an empty pool is an error
    pub fn lease(&self) -> Result<KeyLease> {
        self.next_key().ok_or(LLMError::NoCredentials)
    }

    /// Record a failed call; the rotation schedule is not affected
    pub fn report_failure(&self, lease: &KeyLease, error: &LLMError) {
        warn!(
            "API key {} ({}) failed: {}",
            lease.index + 1,
            lease.credential,
            error
        );
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|k| k.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> KeyPoolStats {
        let total = self.len();
        KeyPoolStats {
            total_keys: total,
            available_keys: total,
            suspended_keys: 0,
            rotations: self.counter.load(Ordering::Relaxed),
        }
    }

    /// Re-read the configured sources
    ///
    /// If the new load yields no keys the current keys are kept and an error
    /// is returned. Returns the new pool size.
    pub fn reload(&self) -> Result<usize> {
        self.reload_with_env(|name| std::env::var(name).ok())
    }

    pub fn reload_with_env<F>(&self, lookup: F) -> Result<usize>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = self.sources.as_ref().ok_or_else(|| {
            LLMError::ConfigurationError("key pool was not loaded from files".to_string())
        })?;

        let fresh = collect_keys(settings, &lookup)?;
        if fresh.is_empty() {
            warn!("Reload found no API keys, keeping the current pool");
            return Err(LLMError::NoCredentials);
        }

        let mut keys = self.write_keys()?;
        *keys = fresh;
        info!("Reloaded {} API key(s)", keys.len());
        Ok(keys.len())
    }

    /// Validate and add a key, persisting it to the pool file when one is configured
    pub fn add_key(&self, raw: &str) -> Result<usize> {
        let credential = Credential::parse(raw)?;

        let mut keys = self.write_keys()?;
        if keys.contains(&credential) {
            return Err(LLMError::DuplicateCredential);
        }

        if let Some(settings) = &self.sources {
            append_key(&settings.pool_file, credential.expose())?;
        }
        info!("Added API key {}", credential);
        keys.push(credential);
        Ok(keys.len())
    }

    fn write_keys(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Credential>>> {
        self.keys
            .write()
            .map_err(|e| LLMError::ConfigurationError(format!("key pool lock poisoned: {e}")))
    }
}

fn dedupe(keys: Vec<Credential>) -> Vec<Credential> {
    let mut unique = Vec::with_capacity(keys.len());
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

fn collect_keys<F>(settings: &KeySettings, lookup: &F) -> Result<Vec<Credential>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw = Vec::new();

    if let Some(primary) = read_optional(&settings.primary_file)? {
        let primary = primary.trim();
        if !primary.is_empty() {
            raw.push(primary.to_string());
        }
    }
    if let Some(pool) = read_optional(&settings.pool_file)? {
        raw.extend(parse_key_lines(&pool));
    }
    for slot in 1..=settings.env_slots {
        if let Some(value) = lookup(&format!("{}{slot}", settings.env_prefix)) {
            let value = value.trim();
            if !value.is_empty() {
                raw.push(value.to_string());
            }
        }
    }

    let mut keys = Vec::new();
    for key in raw {
        match Credential::parse(&key) {
            Ok(credential) => keys.push(credential),
            Err(e) => warn!("Skipping key: {e}"),
        }
    }
    Ok(dedupe(keys))
}

/// Non-blank, non-comment lines of a pool file
pub fn parse_key_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Key file {} not found", path.display());
            Ok(None)
        }
        Err(source) => Err(LLMError::KeyFile {
            path: PathBuf::from(path),
            source,
        }),
    }
}

fn append_key(path: &Path, key: &str) -> Result<()> {
    let to_err = |source| LLMError::KeyFile {
        path: path.to_path_buf(),
        source,
    };

    let needs_newline = match std::fs::read(path) {
        Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(to_err(e)),
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    if needs_newline {
        writeln!(file).map_err(to_err)?;
    }
    writeln!(file, "{key}").map_err(to_err)
}
