use crate::persist::IndexPaths;
use crate::{DocId, Error, IndexVariant, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

pub const FORMAT_VERSION: u32 = 1;

/// Contents of `meta.json`, written once at the end of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    /// (first doc id, file name) of every registry segment, ascending.
    pub registry_segments: Vec<(DocId, String)>,
    /// (first term, file name) of every index segment, ascending.
    pub index_segments: Vec<(String, String)>,
    pub num_terms: u64,
    pub variant: IndexVariant,
    pub max_index_segment_bytes: u64,
    pub max_registry_segment_bytes: u64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn registry_table(&self) -> BTreeMap<DocId, String> {
        self.registry_segments.iter().cloned().collect()
    }

    pub fn index_table(&self) -> BTreeMap<String, String> {
        self.index_segments.iter().cloned().collect()
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.version > FORMAT_VERSION {
            return Err(format!("format version {} is newer than {}", self.version, FORMAT_VERSION));
        }
        if !self.index_segments.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err("index segment table is not ascending".into());
        }
        if !self.registry_segments.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err("registry segment table is not ascending".into());
        }
        Ok(())
    }
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default()
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let f = File::create(&path).map_err(|e| Error::io(&path, e))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, meta)?;
    w.flush().map_err(|e| Error::io(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let f = File::open(&path).map_err(|e| Error::io(&path, e))?;
    let meta: MetaFile = serde_json::from_reader(BufReader::new(f))?;
    meta.check().map_err(|reason| Error::corrupt(&path, 0, reason))?;
    Ok(meta)
}
