mod corpus;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sieve_core::config::{IndexConfig, SearchConfig};
use sieve_core::extract::HtmlExtractor;
use sieve_core::ingest::{ingest_sharded, Ingestor};
use sieve_core::merge::{merge_segments, merge_segments_parallel};
use sieve_core::persist::{
    generate_report, load_final_index, load_meta, save_doc_lengths, save_final_index, save_meta, save_urls,
    IndexPaths, IndexReport, MetaFile, FORMAT_VERSION,
};
use sieve_core::segment::{FsSegmentStore, SegmentSequence, SegmentStore, SledSegmentStore};
use sieve_core::tokenizer::Normalizer;
use sieve_core::Searcher;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect a segmented inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of crawled JSON pages
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// JSON file with IndexConfig settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Documents per flushed segment
        #[arg(long)]
        batch_size: Option<usize>,
        /// Number of concurrent ingestion shards
        #[arg(long)]
        shards: Option<usize>,
        /// Merge segments on the thread pool
        #[arg(long, default_value_t = false)]
        parallel_merge: bool,
        /// Store segments in a sled database instead of one file each
        #[arg(long, default_value_t = false)]
        sled: bool,
        /// Drop English stopwords
        #[arg(long, default_value_t = false)]
        remove_stopwords: bool,
        /// Apply NFKC normalization before case folding
        #[arg(long, default_value_t = false)]
        nfkc: bool,
    },
    /// Regenerate and print the report for a built index
    Report {
        #[arg(long)]
        index: PathBuf,
    },
    /// Run one query against a built index
    Search {
        #[arg(long)]
        index: PathBuf,
        /// Number of results
        #[arg(long)]
        k: Option<usize>,
        query: String,
    },
}

struct BuildArgs {
    input: PathBuf,
    output: PathBuf,
    config: IndexConfig,
    sled: bool,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, batch_size, shards, parallel_merge, sled, remove_stopwords, nfkc } => {
            let mut cfg = match config {
                Some(path) => IndexConfig::from_json_file(&path)
                    .with_context(|| format!("load config {}", path.display()))?,
                None => IndexConfig::default(),
            };
            if let Some(b) = batch_size { cfg.batch_size = b; }
            if let Some(s) = shards { cfg.shards = s; }
            cfg.parallel_merge |= parallel_merge;
            cfg.normalizer.remove_stopwords |= remove_stopwords;
            cfg.normalizer.unicode_nfkc |= nfkc;
            cfg.validate()?;
            let summary = build_index(BuildArgs { input, output, config: cfg, sled })?;
            print!("{}", summary.to_text());
            Ok(())
        }
        Commands::Report { index } => {
            let paths = IndexPaths::new(&index);
            let meta = load_meta(&paths).context("load meta.json")?;
            let terms = load_final_index(&paths).context("load final index")?.len();
            let report = generate_report(&paths, meta.num_docs, terms)?;
            print!("{}", report.to_text());
            Ok(())
        }
        Commands::Search { index, k, query } => {
            let searcher = Searcher::open(&IndexPaths::new(&index), SearchConfig::default())?;
            let results = searcher.search_k(&query, k);
            println!("{} matching documents", results.total_hits);
            for (rank, hit) in results.hits.iter().enumerate() {
                println!("{:>2}. {:.4}  {}  ({})", rank + 1, hit.score, hit.url, hit.doc_id);
            }
            Ok(())
        }
    }
}

fn build_index(args: BuildArgs) -> Result<IndexReport> {
    let out_paths = IndexPaths::new(&args.output);
    fs::create_dir_all(&out_paths.root)?;

    let store: Box<dyn SegmentStore> = if args.sled {
        Box::new(SledSegmentStore::open(out_paths.root.join("segments.db"))?)
    } else {
        Box::new(FsSegmentStore::open(out_paths.segments_dir())?)
    };
    let existing = store.list()?.len();
    if existing > 0 {
        tracing::warn!(existing, "output already holds segments; they are left in place and not merged");
    }
    let sequence = SegmentSequence::after_existing(store.as_ref())?;

    let corpus_root: PathBuf = if args.input.is_file() {
        args.input.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        args.input.clone()
    };
    let files = corpus::discover(&args.input);
    tracing::info!(files = files.len(), input = %args.input.display(), "discovered pages");

    let normalizer = Normalizer::new(args.config.normalizer.clone());
    let extractor = HtmlExtractor;
    let cfg = &args.config;

    let report = if cfg.shards > 1 {
        let sources: Vec<_> = corpus::shard_paths(files, cfg.shards)
            .into_iter()
            .map(|paths| corpus::pages(corpus_root.clone(), paths))
            .collect();
        ingest_sharded(store.as_ref(), &sequence, cfg.batch_size, &normalizer, &extractor, sources)?
    } else {
        let mut ingestor = Ingestor::new(store.as_ref(), &sequence, cfg.batch_size, &normalizer, &extractor)?;
        ingestor.ingest_all(corpus::pages(corpus_root.clone(), files))?;
        ingestor.finish()?
    };
    tracing::info!(
        processed = report.processed,
        skipped = report.skipped,
        segments = report.segments.len(),
        "ingested documents"
    );

    let final_index = if cfg.parallel_merge {
        merge_segments_parallel(store.as_ref(), &report.segments)?
    } else {
        merge_segments(store.as_ref(), &report.segments)?
    };

    save_final_index(&out_paths, &final_index)?;
    save_urls(&out_paths, &report.urls)?;
    save_doc_lengths(&out_paths, &report.doc_lengths)?;
    let meta = MetaFile {
        num_docs: report.processed,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
        batch_size: cfg.batch_size,
        segments: report.segments.len(),
        normalizer: cfg.normalizer.clone(),
    };
    save_meta(&out_paths, &meta)?;

    let summary = generate_report(&out_paths, report.processed, final_index.len())?;
    tracing::info!(output = %args.output.display(), "index build complete");
    Ok(summary)
}
