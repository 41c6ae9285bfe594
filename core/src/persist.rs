use crate::codec::{IndexCodec, SegmentCodec};
use crate::{DocId, Error, Result, TermEntry};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

pub const INDEX_PREFIX: &str = "index";
pub const REGISTRY_PREFIX: &str = "registry";
pub const SPILL_PREFIX: &str = "spill";

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn segment(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Temporary run `n`, as named by a `.temporary()` persister with [`SPILL_PREFIX`].
    pub fn spill_run(&self, n: usize) -> PathBuf {
        self.root.join(format!("{SPILL_PREFIX}-{n:05}.tmp"))
    }
}

struct OpenSegment {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

/// Writes key-sorted entries to size-bounded segment files.
///
/// Files are named `{prefix}-{n:05}.{extension}` and rotate on an entry boundary
/// once one grows past `max_bytes`. The first key of every file is kept for the
/// metadata tables.
pub struct SegmentPersister<C: SegmentCodec> {
    dir: PathBuf,
    prefix: String,
    extension: &'static str,
    max_bytes: u64,
    codec: C,
    current: Option<OpenSegment>,
    segments: Vec<(C::Key, String)>,
    last_key: Option<C::Key>,
    next_file: usize,
    bytes_written: u64,
    line: String,
}

impl<C: SegmentCodec> SegmentPersister<C> {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, max_bytes: u64, codec: C) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: "seg",
            max_bytes: max_bytes.max(1),
            codec,
            current: None,
            segments: Vec::new(),
            last_key: None,
            next_file: 1,
            bytes_written: 0,
            line: String::new(),
        }
    }

    /// A persister writing to `{prefix}-{n:05}.tmp` files.
    pub fn temporary(mut self) -> Self {
        self.extension = "tmp";
        self
    }

    /// Continues numbering from `n`, so several persisters can share a prefix.
    pub fn starting_at(mut self, n: usize) -> Self {
        self.next_file = n;
        self
    }

    /// Appends `entries`, which must continue the key order of everything written so far.
    pub fn persist<I>(&mut self, entries: I, is_last_batch: bool) -> Result<()>
    where
        I: IntoIterator<Item = C::Entry>,
    {
        let written = self.write_all(entries);
        if is_last_batch || written.is_err() {
            let closed = self.close();
            written?;
            return closed;
        }
        written
    }

    fn write_all<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = C::Entry>,
    {
        for entry in entries {
            let key = self.codec.key(&entry);
            if let Some(last) = &self.last_key {
                if *last >= key {
                    return Err(Error::UnsortedKeys {
                        path: self.dir.join(&self.prefix),
                        previous: format!("{last:?}"),
                        next: format!("{key:?}"),
                    });
                }
            }
            if self.current.is_none() {
                self.open(key.clone())?;
            }
            self.line.clear();
            self.codec.encode(&entry, &mut self.line);

            let Some(seg) = self.current.as_mut() else { unreachable!("segment opened above") };
            seg.writer.write_all(self.line.as_bytes()).map_err(|e| Error::io(&seg.path, e))?;
            seg.written += self.line.len() as u64;
            self.bytes_written += self.line.len() as u64;
            self.last_key = Some(key);

            if seg.written >= self.max_bytes {
                self.close()?;
            }
        }
        Ok(())
    }

    fn open(&mut self, first_key: C::Key) -> Result<()> {
        create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let file_name = format!("{}-{:05}.{}", self.prefix, self.next_file, self.extension);
        let path = self.dir.join(&file_name);
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        tracing::debug!(file = file_name.as_str(), first_key = ?first_key, "opened segment");
        self.next_file += 1;
        self.segments.push((first_key, file_name));
        self.current = Some(OpenSegment { path, writer: BufWriter::new(file), written: 0 });
        Ok(())
    }

    /// Flushes and closes the open file, if any.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut seg) = self.current.take() {
            seg.writer.flush().map_err(|e| Error::io(&seg.path, e))?;
            tracing::debug!(path = %seg.path.display(), bytes = seg.written, "closed segment");
        }
        Ok(())
    }

    /// (first key, file name) of every file written, in key order.
    pub fn segments(&self) -> &[(C::Key, String)] {
        &self.segments
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Forward reader over one index segment or spill run.
pub struct SegmentReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    codec: IndexCodec,
    line_no: usize,
}

impl SegmentReader {
    pub fn open(path: impl Into<PathBuf>, codec: IndexCodec) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self { path, lines: BufReader::new(file).lines(), codec, line_no: 0 })
    }
}

impl Iterator for SegmentReader {
    type Item = Result<TermEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(Error::io(&self.path, e))),
        };
        self.line_no += 1;
        Some(self.codec.decode(&line).map_err(|reason| Error::corrupt(&self.path, self.line_no, reason)))
    }
}

/// A decoded index segment.
#[derive(Debug, Default)]
pub struct IndexSegment {
    entries: HashMap<String, TermEntry>,
}

impl IndexSegment {
    pub fn load(path: &Path, codec: IndexCodec) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut previous: Option<String> = None;
        for (i, entry) in SegmentReader::open(path, codec)?.enumerate() {
            let entry = entry?;
            if previous.as_deref().is_some_and(|p| p >= entry.term.as_str()) {
                return Err(Error::corrupt(path, i + 1, format!("term '{}' out of order", entry.term)));
            }
            previous = Some(entry.term.clone());
            entries.insert(entry.term.clone(), entry);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.entries.get(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermEntry> {
        self.entries.values()
    }
}

/// A decoded registry segment: the external ids of `first_id..first_id + len`.
#[derive(Debug)]
pub struct RegistrySegment {
    first_id: DocId,
    external_ids: Vec<String>,
}

impl RegistrySegment {
    pub fn load(path: &Path, first_id: DocId) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let external_ids = BufReader::new(file).lines().collect::<std::io::Result<Vec<_>>>().map_err(|e| Error::io(path, e))?;
        Ok(Self { first_id, external_ids })
    }

    pub fn get(&self, doc_id: DocId) -> Option<&str> {
        let offset = doc_id.checked_sub(self.first_id)? as usize;
        self.external_ids.get(offset).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.external_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_ids.is_empty()
    }
}
