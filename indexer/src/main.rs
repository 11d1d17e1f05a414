use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use helpdesk_core::capability::TranslatorCache;
use helpdesk_core::faq::{enrich_faq, FaqDraft};
use helpdesk_core::preset::{export_preset, import_preset};
use helpdesk_core::{Article, Capabilities, IndexHandle, PipelineConfig, Preset, Store};
use server::local_ai::local_capabilities;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Manage help-desk articles, FAQs and the BM25 index", long_about = None)]
struct Cli {
    /// Store directory
    #[arg(long, global = true, default_value = "./helpdesk-db")]
    db: String,
    /// Base URL of a local model runtime used for detection fallback, translation and keywords
    #[arg(long, global = true)]
    generator_url: Option<String>,
    /// Model name passed to the runtime
    #[arg(long, global = true, default_value = "llama3.2")]
    model: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the stored articles with JSON/JSONL input and rebuild the index
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Rebuild the index from the articles already stored
    Rebuild,
    /// Author a FAQ entry; question metadata is derived, the answer is stored as given
    AddFaq {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        /// Article the answer is based on
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Load a preset file, replacing FAQs, articles and persona, then rebuild
    ImportPreset {
        #[arg(long)]
        file: String,
    },
    /// Write the current preset as JSON (stdout when no output is given)
    ExportPreset {
        #[arg(long)]
        output: Option<String>,
    },
    /// Run a document search against the stored index
    Search {
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let caps = match &cli.generator_url {
        Some(url) => local_capabilities(url, &cli.model, Duration::from_secs(120))?,
        None => Capabilities::offline(),
    };
    let store = Store::open(&cli.db)?;
    let config = PipelineConfig::default();

    match cli.command {
        Commands::Build { input } => {
            let articles = load_articles(Path::new(&input))?;
            store.save_articles(&articles)?;
            rebuild(&store, &caps, &config).await
        }
        Commands::Rebuild => rebuild(&store, &caps, &config).await,
        Commands::AddFaq { question, answer, doc_id } => {
            let draft = FaqDraft { question, answer, doc_id };
            let mut translators = TranslatorCache::new();
            let item = enrich_faq(draft, &caps, &mut translators).await;
            let mut faqs = store.load_faqs()?;
            faqs.insert(0, item.clone());
            store.save_faqs(&faqs)?;
            store.flush()?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            Ok(())
        }
        Commands::ImportPreset { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            let preset = Preset::from_json(&text)?;
            import_preset(&store, preset)?;
            rebuild(&store, &caps, &config).await
        }
        Commands::ExportPreset { output } => {
            let json = serde_json::to_string_pretty(&export_preset(&store)?)?;
            match output {
                Some(path) => fs::write(&path, json).with_context(|| format!("writing {path}"))?,
                None => println!("{json}"),
            }
            Ok(())
        }
        Commands::Search { query } => {
            let handle = IndexHandle::load(&store, &config)?;
            let mut translators = TranslatorCache::new();
            let hits = handle.snapshot().search(&query, None, &caps, &mut translators, &config).await;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }
    }
}

async fn rebuild(store: &Store, caps: &Capabilities, config: &PipelineConfig) -> Result<()> {
    let handle = IndexHandle::empty(config);
    let report = handle.rebuild(store, caps, config).await?;
    tracing::info!(num_docs = report.num_docs, num_terms = report.num_terms, avgdl = report.avgdl, "index build complete");
    Ok(())
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

/// Articles from every JSON (object or array) and JSONL file under `input`.
/// Later duplicates of an id are skipped.
fn load_articles(input: &Path) -> Result<Vec<Article>> {
    let mut articles = Vec::new();
    for file in input_files(input) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut articles)?;
        } else {
            read_json(&file, &mut articles)?;
        }
    }
    let mut seen = HashSet::new();
    let before = articles.len();
    articles.retain(|a| seen.insert(a.id.clone()));
    if articles.len() < before {
        tracing::warn!(skipped = before - articles.len(), "duplicate article ids skipped");
    }
    tracing::info!(num_articles = articles.len(), "ingested articles");
    Ok(articles)
}

fn read_jsonl(file: &Path, out: &mut Vec<Article>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let article: Article =
            serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        out.push(article);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<Article>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("{}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                out.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => out.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither an object nor an array"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_json_and_jsonl_and_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"[{"id":"a1","title":"Shipping","body":"Orders ship in 3 days."},{"id":"a2","title":"Refunds","body":"Within 7 days."}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            "{\"id\":\"a3\",\"title\":\"교환\",\"body\":\"7일 이내 교환 가능합니다.\"}\n\n{\"id\":\"a1\",\"title\":\"dup\",\"body\":\"x\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let articles = load_articles(dir.path()).unwrap();
        let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
        assert_eq!(articles[0].title, "Shipping");
    }
}
