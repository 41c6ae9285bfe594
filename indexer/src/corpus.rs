use serde::Deserialize;
use spimi_core::{Error, Result, SourceDocument};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

impl From<InputDoc> for SourceDocument {
    fn from(doc: InputDoc) -> Self {
        SourceDocument::new(doc.id, vec![doc.title, doc.body])
    }
}

fn is_corpus_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("json" | "jsonl"))
}

/// The `.json` / `.jsonl` files under an input path, in a stable order.
#[derive(Debug)]
pub struct Corpus {
    files: Vec<PathBuf>,
}

impl Corpus {
    pub fn discover(input: &Path) -> Result<Self> {
        let mut files = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && is_corpus_file(p) {
                    files.push(p.to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            return Err(Error::Config(format!("corpus {} not found", input.display())));
        }
        tracing::info!(input = %input.display(), files = files.len(), "found corpus files");
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn documents(self) -> Documents {
        Documents { files: self.files.into(), current: Box::new(std::iter::empty()) }
    }
}

/// Streams documents file by file. A `.json` file holds one object or an
/// array of them, a `.jsonl` file one object per line.
pub struct Documents {
    files: VecDeque<PathBuf>,
    current: Box<dyn Iterator<Item = Result<SourceDocument>>>,
}

impl Documents {
    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.files.pop_front()?;
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(file = %path.display(), "corpus file vanished, skipping");
                return Some(Ok(()));
            }
            Err(e) => return Some(Err(Error::Io { path, source: e })),
        };
        tracing::debug!(file = %path.display(), "reading corpus file");
        if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            self.current = Box::new(jsonl_documents(path, file));
            Some(Ok(()))
        } else {
            match json_documents(&path, file) {
                Ok(docs) => {
                    self.current = Box::new(docs.into_iter().map(Ok));
                    Some(Ok(()))
                }
                Err(e) => Some(Err(e)),
            }
        }
    }
}

impl Iterator for Documents {
    type Item = Result<SourceDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.current.next() {
                return Some(doc);
            }
            if let Err(e) = self.open_next()? {
                self.files.clear();
                return Some(Err(e));
            }
        }
    }
}

fn malformed(path: &Path, line: usize, e: serde_json::Error) -> Error {
    Error::Corrupt { path: path.to_path_buf(), line, reason: e.to_string() }
}

fn jsonl_documents(path: PathBuf, file: File) -> impl Iterator<Item = Result<SourceDocument>> {
    BufReader::new(file).lines().enumerate().filter_map(move |(i, line)| match line {
        Err(e) => Some(Err(Error::Io { path: path.clone(), source: e })),
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str::<InputDoc>(&line).map(Into::into).map_err(|e| malformed(&path, i + 1, e))),
    })
}

fn json_documents(path: &Path, file: File) -> Result<Vec<SourceDocument>> {
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| malformed(path, e.line(), e))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            tracing::warn!(file = %path.display(), "no documents in file");
            Vec::new()
        }
    };
    values
        .into_iter()
        .map(|v| serde_json::from_value::<InputDoc>(v).map(Into::into).map_err(|e| malformed(path, 0, e)))
        .collect()
}
