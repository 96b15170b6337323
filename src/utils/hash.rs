use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, error, info, warn};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::constants::{HASH_CHUNK_SIZE, SUPPORTED_HASH_ALGORITHMS};

/// Digest algorithms the engine can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Parse a lowercase or mixed-case algorithm name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "md5" => Some(HashAlgorithm::Md5),
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha256" => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    fn hasher(&self) -> DigestState {
        match self {
            HashAlgorithm::Md5 => DigestState::Md5(Md5::new()),
            HashAlgorithm::Sha1 => DigestState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Incremental state of one running digest
enum DigestState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl DigestState {
    fn update(&mut self, chunk: &[u8]) {
        match self {
            DigestState::Md5(h) => h.update(chunk),
            DigestState::Sha1(h) => h.update(chunk),
            DigestState::Sha256(h) => h.update(chunk),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            DigestState::Md5(h) => hex::encode(h.finalize()),
            DigestState::Sha1(h) => hex::encode(h.finalize()),
            DigestState::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Resolve algorithm names, dropping unknown ones with a warning.
///
/// Duplicates are removed; the order of first appearance is kept.
pub fn parse_algorithms<S: AsRef<str>>(names: &[S]) -> Vec<HashAlgorithm> {
    let mut algorithms = Vec::new();
    let mut unsupported = Vec::new();

    for name in names {
        match HashAlgorithm::parse(name.as_ref()) {
            Some(alg) if !algorithms.contains(&alg) => algorithms.push(alg),
            Some(_) => {}
            None => unsupported.push(name.as_ref().to_string()),
        }
    }

    if !unsupported.is_empty() {
        warn!(
            "Unsupported hash algorithms {:?} ignored (supported: {})",
            unsupported,
            SUPPORTED_HASH_ALGORITHMS.join(", ")
        );
    }

    algorithms
}

/// Stream a file once and feed every requested digest from the same chunks.
///
/// `progress` receives `(bytes_processed, total_bytes)` after each chunk.
pub fn try_hash_file(
    path: &Path,
    algorithms: &[HashAlgorithm],
    mut progress: Option<&mut dyn FnMut(u64, u64)>,
) -> io::Result<BTreeMap<String, String>> {
    if algorithms.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut file = File::open(path)?;
    let total = file.metadata()?.len();

    let mut states: Vec<(HashAlgorithm, DigestState)> =
        algorithms.iter().map(|alg| (*alg, alg.hasher())).collect();

    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    let mut processed: u64 = 0;

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        for (_, state) in states.iter_mut() {
            state.update(&buffer[..bytes_read]);
        }

        processed += bytes_read as u64;
        if let Some(cb) = progress.as_mut() {
            cb(processed, total);
        }
    }

    Ok(states
        .into_iter()
        .map(|(alg, state)| (alg.name().to_string(), state.finalize_hex()))
        .collect())
}

/// Hash a file with the named algorithms.
///
/// Never fails: unknown algorithms are dropped, and a missing or unreadable
/// file yields an empty map after logging the cause.
pub fn hash_file<S: AsRef<str>>(path: &Path, algorithms: &[S]) -> BTreeMap<String, String> {
    hash_file_with_progress(path, algorithms, None)
}

/// Same as [`hash_file`], reporting `(bytes_processed, total_bytes)` per chunk.
pub fn hash_file_with_progress<S: AsRef<str>>(
    path: &Path,
    algorithms: &[S],
    progress: Option<&mut dyn FnMut(u64, u64)>,
) -> BTreeMap<String, String> {
    let algorithms = parse_algorithms(algorithms);
    if algorithms.is_empty() {
        debug!("No usable hash algorithms for {}", path.display());
        return BTreeMap::new();
    }

    debug!(
        "Calculating {} hashes for {}",
        algorithms.iter().map(|a| a.name()).collect::<Vec<_>>().join(", "),
        path.display()
    );

    match try_hash_file(path, &algorithms, progress) {
        Ok(digests) => digests,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!("File not found: {}", path.display());
            BTreeMap::new()
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            error!("Permission denied reading file: {}", path.display());
            BTreeMap::new()
        }
        Err(e) => {
            error!("Error calculating hashes for {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

/// Recompute one digest and compare it case-insensitively.
pub fn verify_hash(path: &Path, expected: &str, algorithm: &str) -> bool {
    let Some(alg) = HashAlgorithm::parse(algorithm) else {
        error!("Unsupported algorithm: {}", algorithm);
        return false;
    };

    let calculated = hash_file(path, &[alg.name()]);
    let Some(actual) = calculated.get(alg.name()) else {
        return false;
    };

    let matches = actual.eq_ignore_ascii_case(expected.trim());
    if matches {
        info!("Hash verification successful for {}", path.display());
    } else {
        warn!(
            "Hash mismatch for {}! Expected: {}, Got: {}",
            path.display(),
            expected,
            actual
        );
    }
    matches
}

/// Digest an in-memory buffer.
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut state = algorithm.hasher();
    state.update(data);
    state.finalize_hex()
}
