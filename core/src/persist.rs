use crate::config::NormalizerConfig;
use crate::index::{DocLengths, InvertedIndex};
use crate::ingest::UrlTable;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub created_at: String,
    pub version: u32,
    pub batch_size: usize,
    pub segments: usize,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

/// Summary written next to the final index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub total_documents: u64,
    pub unique_terms: usize,
    pub index_size_bytes: u64,
    pub index_size_kb: f64,
}

impl IndexReport {
    pub fn to_text(&self) -> String {
        format!(
            "Index Report\nTotal Documents Indexed: {}\nUnique Tokens: {}\nIndex File Size: {:.2} KB\n",
            self.total_documents, self.unique_terms, self.index_size_kb
        )
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn final_index(&self) -> PathBuf { self.root.join("final_index.bin") }
    pub fn urls(&self) -> PathBuf { self.root.join("urls.bin") }
    pub fn doc_lengths(&self) -> PathBuf { self.root.join("doc_lengths.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn report(&self) -> PathBuf { self.root.join("report.json") }
    pub fn report_text(&self) -> PathBuf { self.root.join("report.txt") }
    pub fn segments_dir(&self) -> PathBuf { self.root.join("segments") }
}

fn save_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = BufReader::new(File::open(path)?);
    let value = bincode::deserialize_from(f)?;
    Ok(value)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = File::create(path)?;
    let json = serde_json::to_string_pretty(value)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

pub fn save_final_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    save_bin(&paths.final_index(), index)?;
    tracing::info!(path = %paths.final_index().display(), terms = index.len(), "saved final index");
    Ok(())
}

pub fn load_final_index(paths: &IndexPaths) -> Result<InvertedIndex> { load_bin(&paths.final_index()) }

pub fn save_urls(paths: &IndexPaths, urls: &UrlTable) -> Result<()> { save_bin(&paths.urls(), urls) }

pub fn load_urls(paths: &IndexPaths) -> Result<UrlTable> { load_bin(&paths.urls()) }

pub fn save_doc_lengths(paths: &IndexPaths, lengths: &DocLengths) -> Result<()> { save_bin(&paths.doc_lengths(), lengths) }

pub fn load_doc_lengths(paths: &IndexPaths) -> Result<DocLengths> { load_bin(&paths.doc_lengths()) }

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> { save_json(&paths.meta(), meta) }

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> { load_json(&paths.meta()) }

pub fn load_report(paths: &IndexPaths) -> Result<IndexReport> { load_json(&paths.report()) }

/// Write the report for a saved final index as JSON and text. Only the
/// index file's size is read back; `unique_terms` comes from the caller.
pub fn generate_report(paths: &IndexPaths, num_docs: u64, unique_terms: usize) -> Result<IndexReport> {
    let index_size_bytes = std::fs::metadata(paths.final_index())?.len();
    let report = IndexReport {
        total_documents: num_docs,
        unique_terms,
        index_size_bytes,
        index_size_kb: index_size_bytes as f64 / 1024.0,
    };
    save_json(&paths.report(), &report)?;
    std::fs::write(paths.report_text(), report.to_text())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn report_counts_terms_and_size() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut index = InvertedIndex::new();
        index.accumulate("cat", "d1", 1.0);
        index.accumulate("dog", "d1", 0.75);
        save_final_index(&paths, &index).unwrap();
        let report = generate_report(&paths, 3, index.len()).unwrap();
        assert_eq!(report.total_documents, 3);
        assert_eq!(report.unique_terms, 2);
        assert!(report.index_size_bytes > 0);
        assert_eq!(load_report(&paths).unwrap(), report);
        let text = std::fs::read_to_string(paths.report_text()).unwrap();
        assert!(text.contains("Unique Tokens: 2"));
    }

    #[test]
    fn meta_without_normalizer_field_loads_defaults() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        std::fs::write(
            paths.meta(),
            r#"{"num_docs":1,"created_at":"","version":1,"batch_size":10,"segments":1}"#,
        )
        .unwrap();
        let meta = load_meta(&paths).unwrap();
        assert_eq!(meta.normalizer, NormalizerConfig::default());
    }
}
