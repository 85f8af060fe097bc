//! On-disk snapshot format for [`FlatIndex`](super::FlatIndex).
//!
//! A snapshot is two files in the store directory:
//!
//! ```text
//! vectors-<generation>.bin   "DSVX" | version u32 | dimension u32 | count u64 | f32 rows
//! records.json               generation, dimension, vector file name, blake3 checksum,
//!                            next id, and the ordered {id, text, metadata, inserted_at} list
//! ```
//!
//! All numbers are little-endian; rows are stored one per record in record order. Both files are written to a temporary file in the same directory, synced,
//! and renamed into place. `records.json` is renamed last and is the commit point: until it
//! names a new vector file, readers keep loading the previous generation.

use super::{IndexedRecord, RecordId};
use crate::error::{Result, RetrieverError};
use chrono::{DateTime, Utc};
use docsearch_context::ChunkMetadata;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RECORDS_FILE: &str = "records.json";
const VECTOR_MAGIC: &[u8; 4] = b"DSVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Name of the vector file written for `generation`.
pub fn vectors_file_name(generation: u64) -> String {
    format!("vectors-{generation}.bin")
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    generation: u64,
    dimension: usize,
    vectors_file: String,
    checksum: String,
    next_id: RecordId,
    records: Vec<ManifestRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestRecord {
    id: RecordId,
    text: String,
    metadata: ChunkMetadata,
    inserted_at: DateTime<Utc>,
}

/// Everything restored from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub next_id: RecordId,
    pub records: Vec<IndexedRecord>,
}

/// Serialized snapshot, ready to be written without touching the in-memory state.
#[derive(Debug)]
pub struct EncodedSnapshot {
    generation: u64,
    vectors_file: String,
    vectors: Vec<u8>,
    manifest: Vec<u8>,
}

/// Serialize `records` as snapshot `generation`.
pub fn encode<'a, I>(
    generation: u64,
    dimension: usize,
    next_id: RecordId,
    records: I,
) -> Result<EncodedSnapshot>
where
    I: IntoIterator<Item = &'a IndexedRecord>,
{
    let records: Vec<&IndexedRecord> = records.into_iter().collect();
    let vectors_file = vectors_file_name(generation);

    let mut vectors = Vec::with_capacity(HEADER_LEN + records.len() * dimension * 4);
    vectors.extend_from_slice(VECTOR_MAGIC);
    vectors.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    vectors.extend_from_slice(&(dimension as u32).to_le_bytes());
    vectors.extend_from_slice(&(records.len() as u64).to_le_bytes());
    for value in records.iter().flat_map(|r| r.embedding.iter()) {
        vectors.extend_from_slice(&value.to_le_bytes());
    }

    let manifest = Manifest {
        generation,
        dimension,
        checksum: hex::encode(blake3::hash(&vectors).as_bytes()),
        vectors_file: vectors_file.clone(),
        next_id,
        records: records
            .iter()
            .map(|r| ManifestRecord {
                id: r.id,
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                inserted_at: r.inserted_at,
            })
            .collect(),
    };
    let manifest = serde_json::to_vec(&manifest)
        .map_err(|e| RetrieverError::persistence(RECORDS_FILE, e))?;

    Ok(EncodedSnapshot {
        generation,
        vectors_file,
        vectors,
        manifest,
    })
}

/// Write an encoded snapshot into `dir` and remove vector files of older generations.
///
/// Blocking; run it on a blocking task.
pub fn write(dir: &Path, snapshot: &EncodedSnapshot) -> Result<()> {
    write_atomic(dir, &snapshot.vectors_file, &snapshot.vectors)?;
    write_atomic(dir, RECORDS_FILE, &snapshot.manifest)?;
    sync_dir(dir);

    remove_stale_vector_files(dir, &snapshot.vectors_file);
    tracing::debug!(
        "Wrote snapshot generation {} to {}",
        snapshot.generation,
        dir.display()
    );
    Ok(())
}

fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let target = dir.join(file_name);
    let fail = |e: &dyn std::fmt::Display| RetrieverError::persistence(&target, e);

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .map_err(|e| fail(&e))?;
    temp.write_all(bytes).map_err(|e| fail(&e))?;
    temp.as_file().sync_all().map_err(|e| fail(&e))?;
    temp.persist(&target).map_err(|e| fail(&e.error))?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn remove_stale_vector_files(dir: &Path, current: &str) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list {} for cleanup: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name != current && name.starts_with("vectors-") && name.ends_with(".bin") {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                tracing::warn!("Could not remove stale vector file {}: {}", name, e);
            }
        }
    }
}

/// Load the committed snapshot from `dir`. Returns `Ok(None)` when nothing was ever saved.
///
/// Blocking; run it on a blocking task.
pub fn load(dir: &Path, dimension: usize) -> Result<Option<Snapshot>> {
    let manifest_path = dir.join(RECORDS_FILE);
    let manifest_bytes = match std::fs::read(&manifest_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RetrieverError::persistence(&manifest_path, e)),
    };
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| RetrieverError::persistence(&manifest_path, e))?;

    if manifest.dimension != dimension {
        return Err(RetrieverError::persistence(
            &manifest_path,
            format!(
                "snapshot has dimension {} but the index expects {}",
                manifest.dimension, dimension
            ),
        ));
    }

    let vectors_path: PathBuf = dir.join(&manifest.vectors_file);
    let vectors = std::fs::read(&vectors_path)
        .map_err(|e| RetrieverError::persistence(&vectors_path, e))?;

    let checksum = hex::encode(blake3::hash(&vectors).as_bytes());
    if checksum != manifest.checksum {
        return Err(RetrieverError::persistence(
            &vectors_path,
            "checksum does not match records.json",
        ));
    }

    let rows = decode_vectors(&vectors, dimension, manifest.records.len())
        .map_err(|message| RetrieverError::persistence(&vectors_path, message))?;

    let mut previous: Option<RecordId> = None;
    for record in &manifest.records {
        if previous.is_some_and(|p| p >= record.id) || record.id >= manifest.next_id {
            return Err(RetrieverError::persistence(
                &manifest_path,
                format!("record id {} is out of order", record.id),
            ));
        }
        previous = Some(record.id);
    }

    let records = manifest
        .records
        .into_iter()
        .zip(rows)
        .map(|(r, embedding)| IndexedRecord {
            id: r.id,
            text: r.text,
            metadata: r.metadata,
            embedding,
            inserted_at: r.inserted_at,
        })
        .collect();

    Ok(Some(Snapshot {
        generation: manifest.generation,
        next_id: manifest.next_id,
        records,
    }))
}

fn decode_vectors(
    bytes: &[u8],
    dimension: usize,
    expected_count: usize,
) -> std::result::Result<Vec<Vec<f32>>, String> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != VECTOR_MAGIC {
        return Err("not a vector file".to_string());
    }

    let read_u32 =
        |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let version = read_u32(4);
    let file_dimension = read_u32(8) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    if version != FORMAT_VERSION {
        return Err(format!("unsupported vector file version {version}"));
    }
    if file_dimension != dimension {
        return Err(format!(
            "vector file has dimension {file_dimension}, expected {dimension}"
        ));
    }
    if count != expected_count {
        return Err(format!(
            "vector file holds {count} rows but records.json lists {expected_count}"
        ));
    }
    if bytes.len() != HEADER_LEN + count * dimension * 4 {
        return Err(format!("vector file is truncated ({} bytes)", bytes.len()));
    }

    if dimension == 0 {
        return Ok(vec![Vec::new(); count]);
    }
    Ok(bytes[HEADER_LEN..]
        .chunks_exact(dimension * 4)
        .map(|row| {
            row.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect())
}
