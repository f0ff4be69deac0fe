//! Immutable partial indexes and the stores that hold them.
//!
//! On-storage layout of a segment:
//! `magic "SSEG" | version u32 | crc32 u32 | payload len u64 | bincode payload`
//! (integers little endian). Decoding checks every header field so a
//! truncated or damaged segment is refused instead of merged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::index::InvertedIndex;
use crate::{Error, Result};

const MAGIC: &[u8; 4] = b"SSEG";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// One flushed generation of the in-memory index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Documents processed into this generation
    pub num_docs: u32,
    pub postings: InvertedIndex,
}

pub fn encode_segment(segment: &Segment) -> Result<Vec<u8>> {
    let payload = bincode::serialize(segment)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode and verify a segment that is expected to carry `id`.
pub fn decode_segment(id: SegmentId, bytes: &[u8]) -> Result<Segment> {
    let corrupt = |reason: &str| Error::SegmentCorrupt { id, reason: reason.to_string() };
    if bytes.len() < HEADER_LEN {
        return Err(corrupt("truncated header"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }
    let checksum = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[12..20]);
    let len = u64::from_le_bytes(len_bytes) as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len {
        return Err(corrupt("payload length mismatch"));
    }
    if crc32fast::hash(payload) != checksum {
        return Err(corrupt("checksum mismatch"));
    }
    let segment: Segment = bincode::deserialize(payload)?;
    if segment.id != id {
        return Err(corrupt(&format!("payload carries id {}", segment.id)));
    }
    Ok(segment)
}

/// Write-once, read-many storage keyed by segment id.
pub trait SegmentStore: Send + Sync {
    /// Persist `segment`. Once this returns the segment is durable. Writing an
    /// id that already exists fails with [`Error::SegmentExists`].
    fn write(&self, segment: &Segment) -> Result<()>;

    fn read(&self, id: SegmentId) -> Result<Segment>;

    /// All stored ids in ascending order.
    fn list(&self) -> Result<Vec<SegmentId>>;
}

/// Hands out monotonically increasing segment ids, shareable across shards.
#[derive(Debug, Default)]
pub struct SegmentSequence {
    next: AtomicU64,
}

impl SegmentSequence {
    /// Ids start at 1.
    pub fn new() -> Self { Self::starting_at(1) }

    pub fn starting_at(first: u64) -> Self { Self { next: AtomicU64::new(first) } }

    /// Continue after the highest id already present in `store`.
    pub fn after_existing<S: SegmentStore + ?Sized>(store: &S) -> Result<Self> {
        let last = store.list()?.last().map(|id| id.0).unwrap_or(0);
        Ok(Self::starting_at(last + 1))
    }

    pub fn next_id(&self) -> SegmentId {
        SegmentId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// One file per segment under a directory.
#[derive(Debug, Clone)]
pub struct FsSegmentStore {
    dir: PathBuf,
}

impl FsSegmentStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, id: SegmentId) -> PathBuf {
        self.dir.join(format!("segment_{id}.bin"))
    }

    fn parse_file_name(name: &str) -> Option<SegmentId> {
        let digits = name.strip_prefix("segment_")?.strip_suffix(".bin")?;
        digits.parse().ok().map(SegmentId)
    }
}

impl SegmentStore for FsSegmentStore {
    fn write(&self, segment: &Segment) -> Result<()> {
        let path = self.path_for(segment.id);
        if path.exists() {
            return Err(Error::SegmentExists(segment.id));
        }
        let bytes = encode_segment(segment)?;
        // Readers only ever see the final name once the bytes are synced.
        let tmp = self.dir.join(format!(".segment_{}.tmp", segment.id));
        {
            let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        if path.exists() {
            fs::remove_file(&tmp)?;
            return Err(Error::SegmentExists(segment.id));
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(&self, id: SegmentId) -> Result<Segment> {
        let path = self.path_for(id);
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::SegmentNotFound(id)),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::new();
        BufReader::new(f).read_to_end(&mut buf)?;
        decode_segment(id, &buf)
    }

    fn list(&self) -> Result<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(Self::parse_file_name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Segments kept in a sled tree keyed by the big-endian id.
#[derive(Clone)]
pub struct SledSegmentStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl SledSegmentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree("segments")?;
        Ok(Self { _db: db, tree })
    }
}

impl SegmentStore for SledSegmentStore {
    fn write(&self, segment: &Segment) -> Result<()> {
        let bytes = encode_segment(segment)?;
        let key = segment.id.0.to_be_bytes();
        let swapped = self.tree.compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        if swapped.is_err() {
            return Err(Error::SegmentExists(segment.id));
        }
        self.tree.flush()?;
        Ok(())
    }

    fn read(&self, id: SegmentId) -> Result<Segment> {
        match self.tree.get(id.0.to_be_bytes())? {
            Some(bytes) => decode_segment(id, &bytes),
            None => Err(Error::SegmentNotFound(id)),
        }
    }

    fn list(&self) -> Result<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for key in self.tree.iter().keys() {
            let key = key?;
            if key.len() == 8 {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&key);
                ids.push(SegmentId(u64::from_be_bytes(raw)));
            }
        }
        Ok(ids)
    }
}
