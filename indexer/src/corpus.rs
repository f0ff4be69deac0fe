use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use sieve_core::ingest::SkippedDocument;
use sieve_core::RawDocument;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A crawled page as stored on disk. Other fields (e.g. `encoding`) are ignored.
#[derive(Debug, Deserialize)]
struct PageFile {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

pub type PageResult = std::result::Result<RawDocument, SkippedDocument<anyhow::Error>>;

/// Every `.json` file under `root`, in path order. A file input yields itself.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if root.is_dir() {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(p.to_path_buf());
            }
        }
    } else if root.is_file() {
        files.push(root.to_path_buf());
    }
    files.sort();
    files
}

/// Corpus-relative path with `/` separators.
pub fn doc_id_for(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = if rel.as_os_str().is_empty() { path } else { rel };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_page(path: &Path) -> Result<PageFile> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let page: PageFile = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(page)
}

/// Read one page. Unreadable pages and pages without content are skipped.
pub fn read_page(root: &Path, path: &Path) -> PageResult {
    let doc_id = doc_id_for(root, path);
    match parse_page(path) {
        Ok(page) if page.content.is_empty() => Err(SkippedDocument { doc_id, reason: anyhow!("empty content") }),
        Ok(page) => Ok(RawDocument { doc_id, url: page.url, content: page.content }),
        Err(reason) => Err(SkippedDocument { doc_id, reason }),
    }
}

pub fn pages(root: PathBuf, paths: Vec<PathBuf>) -> impl Iterator<Item = PageResult> + Send {
    paths.into_iter().map(move |p| read_page(&root, &p))
}

/// Deal `paths` round-robin into `shards` groups.
pub fn shard_paths(paths: Vec<PathBuf>, shards: usize) -> Vec<Vec<PathBuf>> {
    let shards = shards.max(1);
    let mut out: Vec<Vec<PathBuf>> = vec![Vec::new(); shards];
    for (i, p) in paths.into_iter().enumerate() {
        out[i % shards].push(p);
    }
    out
}
