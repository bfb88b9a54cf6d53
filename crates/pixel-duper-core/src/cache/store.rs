use super::CacheEntry;
use crate::error::Error;
use crate::signature::{Color, GridPoint, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridStamp {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractCell {
    pub point: GridPoint,
    pub vals: Color,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<ExtractCell>,
}

/// On-disk layout of the cache: a grid stamp and one record per file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub grid: GridStamp,
    #[serde(default)]
    pub files: BTreeMap<String, CacheRecord>,
}

impl CacheDocument {
    pub fn check_grid(&self, grid_width: u32, grid_height: u32) -> Result<(), Error> {
        if self.grid.x != grid_width || self.grid.y != grid_height {
            return Err(Error::CacheVersionMismatch {
                expected_w: grid_width,
                expected_h: grid_height,
                found_w: self.grid.x,
                found_h: self.grid.y,
            });
        }
        Ok(())
    }
}

impl From<&CacheEntry> for CacheRecord {
    fn from(entry: &CacheEntry) -> Self {
        let extract = entry
            .signature
            .iter()
            .flat_map(|sig| sig.iter())
            .map(|(point, vals)| ExtractCell {
                point: *point,
                vals: *vals,
            })
            .collect();
        Self {
            hash: entry.hash.clone(),
            timestamp: entry.timestamp.clone(),
            extract,
        }
    }
}

impl From<CacheRecord> for CacheEntry {
    fn from(record: CacheRecord) -> Self {
        let signature = if record.extract.is_empty() {
            None
        } else {
            Some(
                record
                    .extract
                    .into_iter()
                    .map(|cell| (cell.point, cell.vals))
                    .collect::<Signature>(),
            )
        };
        Self {
            hash: record.hash,
            timestamp: record.timestamp,
            signature,
        }
    }
}

/// Returns `Ok(None)` when no cache file exists yet.
pub fn read_document(path: &Path) -> Result<Option<CacheDocument>, Error> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let doc = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(doc))
}

/// Write the whole document to a sibling temp file, then rename it into place.
pub fn write_document(path: &Path, doc: &CacheDocument) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    {
        let mut writer = BufWriter::new(fs::File::create(tmp_path)?);
        serde_json::to_writer(&mut writer, doc)?;
        writer.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
