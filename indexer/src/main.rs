use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use revdex_core::classifier::{labeled_reviews, train, TrainConfig};
use revdex_core::corpus::{load_corpus, DecodePolicy};
use revdex_core::persist::{load_all, load_meta, save_all, save_classifier, save_query_result, save_result, IndexPaths};
use revdex_core::{build, Combinator, Error, FilterKind, FilterSelection, Query, SearchContext};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, train and query a review opinion index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long, env = "REVDEX_INDEX")]
        output: PathBuf,
        /// What to do with records that fail to decode: abort or skip
        #[arg(long, default_value = "abort")]
        on_malformed: DecodePolicy,
    },
    /// Verify that every posting points at a stored review
    Check {
        #[arg(long, env = "REVDEX_INDEX", default_value = "./index")]
        index: PathBuf,
    },
    /// Train the sentiment classifier from the indexed ratings
    Train {
        #[arg(long, env = "REVDEX_INDEX", default_value = "./index")]
        index: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Share of labeled reviews held out for the accuracy report
        #[arg(long, default_value_t = 0.2)]
        validation_fraction: f64,
        #[arg(long, default_value_t = 5000)]
        max_features: usize,
        /// Persist the model fitted on the training split only
        #[arg(long, default_value_t = false)]
        split_only: bool,
    },
    /// Run a boolean aspect/opinion query and persist its result set
    Query {
        #[arg(long, env = "REVDEX_INDEX", default_value = "./index")]
        index: PathBuf,
        /// First aspect word
        #[arg(short = 'a', long)]
        aspect1: String,
        /// Second aspect word
        #[arg(short = 'b', long)]
        aspect2: String,
        /// Opinion word or phrase
        #[arg(short, long)]
        opinion: String,
        /// method1 (OR), method2 (AND) or method3 ((a1 OR a2) AND opinion)
        #[arg(short, long)]
        method: Combinator,
        /// Refinement filter to apply; repeat for several (rating, lexicon, classifier)
        #[arg(long = "filter")]
        filters: Vec<FilterKind>,
        #[arg(long, env = "REVDEX_POSITIVE_LEXICON")]
        positive_lexicon: Option<PathBuf>,
        #[arg(long, env = "REVDEX_NEGATIVE_LEXICON")]
        negative_lexicon: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, on_malformed } => build_index(&input, &output, on_malformed),
        Commands::Check { index } => check_index(&index),
        Commands::Train { index, seed, validation_fraction, max_features, split_only } => {
            let config = TrainConfig {
                seed,
                validation_fraction,
                max_features,
                refit_on_full: !split_only,
                ..TrainConfig::default()
            };
            train_classifier(&index, &config)
        }
        Commands::Query { index, aspect1, aspect2, opinion, method, filters, positive_lexicon, negative_lexicon } => {
            let query = Query::new(&aspect1, &aspect2, &opinion, method)?;
            let filters: FilterSelection = filters.into_iter().collect();
            let lexicon = match (&positive_lexicon, &negative_lexicon) {
                (Some(p), Some(n)) => Some((p.as_path(), n.as_path())),
                (None, None) => None,
                _ => return Err(Error::user_input("--positive-lexicon and --negative-lexicon go together").into()),
            };
            run_query(&index, &query, &filters, lexicon)
        }
    }
}

fn build_index(input: &Path, output: &Path, policy: DecodePolicy) -> Result<()> {
    let corpus = load_corpus(input, policy).with_context(|| format!("loading corpus from {}", input.display()))?;
    let (index, metadata) = build(corpus.reviews)?;
    revdex_core::verify_consistency(&index, &metadata)?;

    let paths = IndexPaths::new(output);
    let meta = save_all(&paths, &index, &metadata)?;
    tracing::info!(output = %output.display(), num_reviews = meta.num_reviews, num_terms = meta.num_terms, skipped = corpus.skipped, "index build complete");
    Ok(())
}

fn check_index(root: &Path) -> Result<()> {
    let paths = IndexPaths::new(root);
    let meta = load_meta(&paths)?;
    let (index, metadata) = load_all(&paths)?;
    println!(
        "index ok: {} reviews, {} terms (built {})",
        metadata.len(),
        index.num_terms(),
        meta.created_at
    );
    Ok(())
}

fn train_classifier(root: &Path, config: &TrainConfig) -> Result<()> {
    let paths = IndexPaths::new(root);
    let (_, metadata) = load_all(&paths)?;
    let labeled = labeled_reviews(&metadata);
    let (artifact, report) = train(&labeled, config)?;
    save_classifier(&paths, &artifact)?;

    match report.accuracy {
        Some(acc) => println!("validation accuracy: {acc:.4} ({} held out)", report.num_validation),
        None => println!("no validation split"),
    }
    for (label, m) in [("positive", &report.positive), ("negative", &report.negative)] {
        println!("{label:>9}: precision {:.3} recall {:.3} support {}", m.precision, m.recall, m.support);
    }
    println!("trained on {} reviews, {} features", report.num_train, report.num_features);
    Ok(())
}

fn refined_name(query: &Query, filters: &FilterSelection) -> String {
    let kinds: Vec<&str> = filters.kinds().map(|k| k.as_str()).collect();
    format!("{}_refined_{}", query.artifact_name(), kinds.join("-"))
}

fn run_query(root: &Path, query: &Query, filters: &FilterSelection, lexicon: Option<(&Path, &Path)>) -> Result<()> {
    if !filters.is_empty() && lexicon.is_none() {
        return Err(Error::user_input("refinement filters need --positive-lexicon and --negative-lexicon").into());
    }
    let paths = IndexPaths::new(root);
    let ctx = SearchContext::open(&paths, lexicon, filters.contains(FilterKind::Classifier))?;
    let outcome = ctx.run(query, filters)?;

    let path = save_query_result(&paths, query, &outcome.hits)?;
    println!("{} matches saved to {}", outcome.hits.len(), path.display());

    if let Some(refinement) = outcome.refinement {
        for (kind, out) in &refinement.outcomes {
            let note = if out.inconclusive { " (inconclusive, unfiltered)" } else { "" };
            println!("  {:<10} {:>6}{note}", kind.as_str(), out.ids.len());
        }
        let path = save_result(&paths, &refined_name(query, filters), &refinement.combined)?;
        println!(
            "{} refined matches ({:?} opinion) saved to {}",
            refinement.combined.len(),
            refinement.polarity,
            path.display()
        );
    }
    Ok(())
}
