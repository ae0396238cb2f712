//! redb-backed persistence for screens, elements and embeddings.
//!
//! Two column families plus a quarantine: `screens` holds one header row per
//! screen, `elements` one row per element keyed by `{screenId}/{elementId}`.
//! Every row starts with a version tag; rows with an unknown version or a
//! payload that no longer deserializes are moved to `quarantine` instead of
//! being followed.
//!
//! Element row layout after the version byte: a little-endian u32 JSON
//! length, the JSON element, then the embedding as a little-endian f32
//! array (possibly empty).

use crate::errors::StoreError;
use crate::types::{Element, ScreenHeader};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use tracing::{debug, warn};

const SCREENS: TableDefinition<&str, &[u8]> = TableDefinition::new("screens");
const ELEMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("elements");
const QUARANTINE: TableDefinition<&str, &[u8]> = TableDefinition::new("quarantine");

/// Version tag written in front of every row.
const ROW_VERSION: u8 = 1;

/// Separator between screen id and element id in element keys. Screen ids
/// are uuids and never contain it.
const KEY_SEP: char = '/';

fn element_key(screen_id: &str, element_id: &str) -> String {
    format!("{screen_id}{KEY_SEP}{element_id}")
}

/// Exclusive upper bound for a prefix range over one screen's elements.
/// '0' is the code point after '/'.
fn screen_range(screen_id: &str) -> (String, String) {
    (format!("{screen_id}/"), format!("{screen_id}0"))
}

/// One persisted element with its optional embedding.
#[derive(Debug, Clone)]
pub struct ElementRecord {
    pub screen_id: String,
    pub element: Element,
    pub embedding: Option<Vec<f32>>,
}

/// Aggregate counters returned by [`Store::stats`].
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub screens: u64,
    pub elements: u64,
    pub embedded_elements: u64,
    pub total_bytes: u64,
    pub quarantined_rows: u64,
    pub oldest_timestamp: Option<i64>,
}

pub(crate) fn encode_screen_row(header: &ScreenHeader) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec(header)?;
    let mut row = Vec::with_capacity(1 + json.len());
    row.push(ROW_VERSION);
    row.extend_from_slice(&json);
    Ok(row)
}

pub(crate) fn decode_screen_row(row: &[u8]) -> Result<ScreenHeader, StoreError> {
    let (version, payload) = row
        .split_first()
        .ok_or_else(|| StoreError::Serialization("empty screen row".into()))?;
    if *version != ROW_VERSION {
        return Err(StoreError::UnknownVersion {
            found: *version,
            expected: ROW_VERSION,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

pub(crate) fn encode_element_row(
    element: &Element,
    embedding: Option<&[f32]>,
) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec(element)?;
    let embedding_len = embedding.map_or(0, |e| e.len() * 4);
    let mut row = Vec::with_capacity(1 + 4 + json.len() + embedding_len);
    row.push(ROW_VERSION);
    row.extend_from_slice(&(json.len() as u32).to_le_bytes());
    row.extend_from_slice(&json);
    if let Some(vector) = embedding {
        for value in vector {
            row.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(row)
}

pub(crate) fn decode_element_row(row: &[u8]) -> Result<(Element, Option<Vec<f32>>), StoreError> {
    let (version, rest) = row
        .split_first()
        .ok_or_else(|| StoreError::Serialization("empty element row".into()))?;
    if *version != ROW_VERSION {
        return Err(StoreError::UnknownVersion {
            found: *version,
            expected: ROW_VERSION,
        });
    }
    if rest.len() < 4 {
        return Err(StoreError::Serialization("truncated element row".into()));
    }
    let json_len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
    let rest = &rest[4..];
    if rest.len() < json_len {
        return Err(StoreError::Serialization("truncated element payload".into()));
    }
    let element: Element = serde_json::from_slice(&rest[..json_len])?;
    let vector_bytes = &rest[json_len..];
    if vector_bytes.is_empty() {
        return Ok((element, None));
    }
    if vector_bytes.len() % 4 != 0 {
        return Err(StoreError::Serialization("misaligned embedding block".into()));
    }
    let embedding = vector_bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((element, Some(embedding)))
}

/// Synchronous redb store. All methods take `&self`; redb serializes
/// writers internally and readers see a consistent snapshot.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the database and make sure all tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create data dir: {e}")))?;
        }
        let db = Database::create(path.as_ref())?;
        {
            let w = db.begin_write()?;
            {
                w.open_table(SCREENS)?;
                w.open_table(ELEMENTS)?;
                w.open_table(QUARANTINE)?;
            }
            w.commit()?;
        }
        Ok(Self { db })
    }

    /// Persist a screen header and all of its elements in one transaction.
    /// Re-indexing a screen replaces its previous element rows.
    pub fn put_screen(
        &self,
        header: &ScreenHeader,
        elements: &[(Element, Option<Vec<f32>>)],
    ) -> Result<(), StoreError> {
        let w = self.db.begin_write()?;
        {
            let mut screens = w.open_table(SCREENS)?;
            screens.insert(header.id.as_str(), encode_screen_row(header)?.as_slice())?;

            let mut table = w.open_table(ELEMENTS)?;
            let (start, end) = screen_range(&header.id);
            let stale: Vec<String> = table
                .range(start.as_str()..end.as_str())?
                .filter_map(|r| r.ok())
                .map(|(k, _)| k.value().to_string())
                .collect();
            for key in stale {
                table.remove(key.as_str())?;
            }
            for (element, embedding) in elements {
                let key = element_key(&header.id, &element.id);
                let row = encode_element_row(element, embedding.as_deref())?;
                table.insert(key.as_str(), row.as_slice())?;
            }
        }
        w.commit()?;
        Ok(())
    }

    /// Attach embeddings to already-persisted elements of one screen.
    pub fn put_embeddings(
        &self,
        screen_id: &str,
        vectors: &[(String, Vec<f32>)],
    ) -> Result<(), StoreError> {
        let w = self.db.begin_write()?;
        {
            let mut table = w.open_table(ELEMENTS)?;
            for (element_id, vector) in vectors {
                let key = element_key(screen_id, element_id);
                let existing = table.get(key.as_str())?.map(|v| v.value().to_vec());
                let Some(row) = existing else {
                    debug!(%screen_id, %element_id, "embedding target row missing");
                    continue;
                };
                let (element, _) = decode_element_row(&row)?;
                let updated = encode_element_row(&element, Some(vector))?;
                table.insert(key.as_str(), updated.as_slice())?;
            }
        }
        w.commit()?;
        Ok(())
    }

    pub fn get_screen(&self, screen_id: &str) -> Result<Option<ScreenHeader>, StoreError> {
        let r = self.db.begin_read()?;
        let table = r.open_table(SCREENS)?;
        match table.get(screen_id)? {
            Some(row) => Ok(Some(decode_screen_row(row.value())?)),
            None => Ok(None),
        }
    }

    /// All screen headers. Corrupt rows are reported back for quarantine
    /// rather than failing the scan.
    pub fn all_screens(&self) -> Result<(Vec<ScreenHeader>, Vec<String>), StoreError> {
        let r = self.db.begin_read()?;
        let table = r.open_table(SCREENS)?;
        let mut headers = Vec::new();
        let mut corrupt = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            match decode_screen_row(value.value()) {
                Ok(header) => headers.push(header),
                Err(e) => {
                    warn!(screen_id = key.value(), error = %e, "corrupt screen row");
                    corrupt.push(key.value().to_string());
                }
            }
        }
        Ok((headers, corrupt))
    }

    /// All element records of one screen (or of every screen).
    pub fn elements(
        &self,
        screen_id: Option<&str>,
    ) -> Result<(Vec<ElementRecord>, Vec<String>), StoreError> {
        let r = self.db.begin_read()?;
        let table = r.open_table(ELEMENTS)?;
        let mut records = Vec::new();
        let mut corrupt = Vec::new();

        let mut handle = |key: &str, row: &[u8]| {
            let Some((sid, _)) = key.split_once(KEY_SEP) else {
                corrupt.push(key.to_string());
                return;
            };
            match decode_element_row(row) {
                Ok((element, embedding)) => records.push(ElementRecord {
                    screen_id: sid.to_string(),
                    element,
                    embedding,
                }),
                Err(e) => {
                    warn!(key, error = %e, "corrupt element row");
                    corrupt.push(key.to_string());
                }
            }
        };

        match screen_id {
            Some(id) => {
                let (start, end) = screen_range(id);
                for entry in table.range(start.as_str()..end.as_str())? {
                    let (key, value) = entry?;
                    handle(key.value(), value.value());
                }
            }
            None => {
                for entry in table.iter()? {
                    let (key, value) = entry?;
                    handle(key.value(), value.value());
                }
            }
        }
        Ok((records, corrupt))
    }

    /// Remove screens and all their element rows in one transaction.
    /// Returns (screens removed, elements removed).
    pub fn delete_screens(&self, screen_ids: &[String]) -> Result<(u64, u64), StoreError> {
        let mut screens_removed = 0u64;
        let mut elements_removed = 0u64;
        let w = self.db.begin_write()?;
        {
            let mut screens = w.open_table(SCREENS)?;
            let mut elements = w.open_table(ELEMENTS)?;
            for screen_id in screen_ids {
                if screens.remove(screen_id.as_str())?.is_some() {
                    screens_removed += 1;
                }
                let (start, end) = screen_range(screen_id);
                let keys: Vec<String> = elements
                    .range(start.as_str()..end.as_str())?
                    .filter_map(|r| r.ok())
                    .map(|(k, _)| k.value().to_string())
                    .collect();
                for key in keys {
                    elements.remove(key.as_str())?;
                    elements_removed += 1;
                }
            }
        }
        w.commit()?;
        Ok((screens_removed, elements_removed))
    }

    /// Move corrupt rows out of the live tables so readers stop tripping
    /// over them. The raw bytes stay inspectable in `quarantine`.
    pub fn quarantine_rows(
        &self,
        screen_keys: &[String],
        element_keys: &[String],
    ) -> Result<u64, StoreError> {
        if screen_keys.is_empty() && element_keys.is_empty() {
            return Ok(0);
        }
        let mut moved = 0u64;
        let w = self.db.begin_write()?;
        {
            let mut screens = w.open_table(SCREENS)?;
            let mut elements = w.open_table(ELEMENTS)?;
            let mut quarantine = w.open_table(QUARANTINE)?;
            for key in screen_keys {
                if let Some(row) = screens.remove(key.as_str())? {
                    quarantine.insert(format!("screens/{key}").as_str(), row.value())?;
                    moved += 1;
                }
            }
            for key in element_keys {
                if let Some(row) = elements.remove(key.as_str())? {
                    quarantine.insert(format!("elements/{key}").as_str(), row.value())?;
                    moved += 1;
                }
            }
        }
        w.commit()?;
        Ok(moved)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let r = self.db.begin_read()?;
        let screens = r.open_table(SCREENS)?;
        let elements = r.open_table(ELEMENTS)?;
        let quarantine = r.open_table(QUARANTINE)?;

        let mut stats = StoreStats::default();
        for entry in screens.iter()? {
            let (_, value) = entry?;
            stats.screens += 1;
            stats.total_bytes += value.value().len() as u64;
            if let Ok(header) = decode_screen_row(value.value()) {
                stats.oldest_timestamp = Some(match stats.oldest_timestamp {
                    Some(oldest) => oldest.min(header.timestamp),
                    None => header.timestamp,
                });
            }
        }
        for entry in elements.iter()? {
            let (_, value) = entry?;
            stats.elements += 1;
            stats.total_bytes += value.value().len() as u64;
            if let Ok((_, Some(_))) = decode_element_row(value.value()) {
                stats.embedded_elements += 1;
            }
        }
        for entry in quarantine.iter()? {
            entry?;
            stats.quarantined_rows += 1;
        }
        Ok(stats)
    }
}
