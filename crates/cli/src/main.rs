//! Phonoload CLI: functional load, predictability of distribution and
//! string similarity over a JSON corpus document.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use phonoload_core::contrast::{
    all_pairwise_fls, calc_prod, calc_prod_all_envs, deltah_fl, minpair_fl, pointwise_mi, relative_deltah_fl,
    relative_minpair_fl, DeltaHOptions, FunctionalLoadMethod, MinPairOptions, ProdOptions,
};
use phonoload_core::similarity::{
    neighborhood_density, AlignerConfig, Algorithm, DistanceAlgorithm, FeatureCosts, Penalties,
};
use phonoload_core::{BatchControl, ContextOptions, Corpus, CorpusContext, EnvironmentFilter, FeatureSystem, Word};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "phonoload",
    about = "Functional load, predictability of distribution and phonological similarity",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Functional load of one or more segment contrasts
    FunctionalLoad(FunctionalLoadArgs),
    /// Predictability of distribution of two segments
    Prod(ProdArgs),
    /// Pointwise mutual information of a segment bigram
    Mi(MiArgs),
    /// Distance or similarity between two corpus words
    Distance(DistanceArgs),
    /// Corpus words within a threshold of a query word
    Neighbors(NeighborsArgs),
}

// ─── Shared arguments (embedded in each subcommand) ──────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// Corpus document (JSON with "features" and "words")
    corpus: PathBuf,

    /// Sequence to analyse: transcription, spelling or tier:NAME
    #[arg(long, default_value = "transcription")]
    sequence_type: String,

    /// Frequency weighting
    #[arg(long, default_value = "type", value_parser = ["type", "token"])]
    frequency: String,

    /// Pronunciation variant policy
    #[arg(
        long,
        default_value = "canonical",
        value_parser = ["canonical", "most-frequent", "separated", "weighted"]
    )]
    variants: String,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ScoringArgs {
    /// Scoring algorithm
    #[arg(
        long,
        default_value = "edit_distance",
        value_parser = ["edit_distance", "phono_edit_distance", "khorsi"]
    )]
    algorithm: String,

    /// Insertion penalty
    #[arg(long, default_value_t = 1.0)]
    insertion: f64,

    /// Deletion penalty
    #[arg(long, default_value_t = 1.0)]
    deletion: f64,

    /// Substitution penalty
    #[arg(long, default_value_t = 1.0)]
    substitution: f64,

    /// Cost of a feature specified on one side only (phono_edit_distance)
    #[arg(long, default_value_t = 0.25)]
    underspecification: f64,
}

impl ScoringArgs {
    fn build<'a>(&self, context: &CorpusContext<'a>) -> Result<Box<dyn DistanceAlgorithm + 'a>> {
        let algorithm: Algorithm = self.algorithm.parse()?;
        let config = AlignerConfig {
            penalties: Penalties {
                insertion: self.insertion,
                deletion: self.deletion,
                substitution: self.substitution,
            },
            ..AlignerConfig::default()
        };
        let costs = FeatureCosts {
            underspecification: self.underspecification,
            ..FeatureCosts::default()
        };
        Ok(algorithm.build(context, config, costs)?)
    }
}

// ─── Functional load ─────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Compute the functional load of segment contrasts")]
struct FunctionalLoadArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Measure to compute
    #[arg(long, default_value = "minpair", value_parser = ["minpair", "deltah"])]
    algorithm: String,

    /// Segment pair "s1,s2" (repeatable; pairs are neutralized together)
    #[arg(short, long = "pair")]
    pairs: Vec<String>,

    /// Environment filter "LHS_RHS" (repeatable; all must hold)
    #[arg(short, long = "environment")]
    environments: Vec<String>,

    /// Divide minimal pairs by relevant words [use --no-relative-count to disable]
    #[arg(long, default_value_t = true)]
    relative_count: bool,

    /// Report the raw minimal-pair count
    #[arg(long, overrides_with = "relative_count")]
    no_relative_count: bool,

    /// Count homophonous minimal pairs separately
    #[arg(long, default_value_t = false)]
    distinguish_homophones: bool,

    /// Report the raw entropy drop (deltah)
    #[arg(long, default_value_t = false)]
    prevent_normalization: bool,

    /// Score every pair of segments in the inventory
    #[arg(long, default_value_t = false, conflicts_with = "relative_to")]
    all_pairs: bool,

    /// With --all-pairs, average each segment over its pairs
    #[arg(long, default_value_t = false, requires = "all_pairs")]
    per_segment: bool,

    /// Average the load of SEG against every other segment
    #[arg(long, value_name = "SEG")]
    relative_to: Option<String>,
}

// ─── Predictability of distribution ──────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Compute the predictability of distribution of two segments")]
struct ProdArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// First segment
    first: String,

    /// Second segment
    second: String,

    /// Environment filter "LHS_RHS" (repeatable; none = context-free)
    #[arg(short, long = "environment")]
    environments: Vec<String>,

    /// Fail if the environments are not exhaustive and exclusive
    #[arg(long, default_value_t = false)]
    strict: bool,
}

// ─── Mutual information ──────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Compute pointwise mutual information of a bigram")]
struct MiArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// First segment of the bigram
    first: String,

    /// Second segment of the bigram
    second: String,

    /// Count n-grams touching a word edge at half weight
    #[arg(long, default_value_t = false)]
    halve_edges: bool,

    /// Use co-occurrence within words instead of adjacency
    #[arg(long, default_value_t = false)]
    in_word: bool,
}

// ─── Similarity ──────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Score two corpus words against each other")]
struct DistanceArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// First word (corpus spelling)
    word1: String,

    /// Second word (corpus spelling)
    word2: String,

    #[command(flatten)]
    scoring: ScoringArgs,
}

#[derive(Parser, Debug)]
#[command(about = "List corpus words within a threshold of a query word")]
struct NeighborsArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Query word (corpus spelling)
    word: String,

    /// Maximum distance, or minimum similarity for khorsi
    #[arg(long, allow_hyphen_values = true)]
    threshold: f64,

    #[command(flatten)]
    scoring: ScoringArgs,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::FunctionalLoad(a) if a.shared.verbose => "debug",
        Command::Prod(a) if a.shared.verbose => "debug",
        Command::Mi(a) if a.shared.verbose => "debug",
        Command::Distance(a) if a.shared.verbose => "debug",
        Command::Neighbors(a) if a.shared.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = run(cli.command, &mut stdout) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::FunctionalLoad(args) => run_functional_load(args, out),
        Command::Prod(args) => run_prod(args, out),
        Command::Mi(args) => run_mi(args, out),
        Command::Distance(args) => run_distance(args, out),
        Command::Neighbors(args) => run_neighbors(args, out),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

/// On-disk corpus layout.
#[derive(Deserialize)]
struct CorpusDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    features: FeatureSystem,
    words: Vec<Word>,
}

/// Read a corpus document and build the corpus from it.
fn load_corpus(path: &Path) -> Result<Corpus> {
    if !path.exists() {
        bail!("Corpus not found: {}", path.display());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: CorpusDocument =
        serde_json::from_str(&text).with_context(|| format!("Invalid corpus document {}", path.display()))?;

    let name = document.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "corpus".to_string())
    });
    let mut corpus = Corpus::new(&name, document.features);
    for word in document.words {
        let spelling = word.spelling.clone();
        corpus
            .add_word(word)
            .with_context(|| format!("Cannot add word '{}'", spelling))?;
    }

    if !corpus.features.is_empty() {
        let missing = corpus.missing_specifications();
        if !missing.is_empty() {
            log::warn!(
                "{} segment(s) have no feature specification: {}",
                missing.len(),
                missing.join(", ")
            );
        }
    }
    log::info!("Loaded corpus '{}': {} words", corpus.name, corpus.len());
    Ok(corpus)
}

fn context_options(shared: &SharedArgs) -> Result<ContextOptions> {
    Ok(ContextOptions {
        sequence_type: shared.sequence_type.parse()?,
        frequency_kind: shared.frequency.parse()?,
        variants: shared.variants.parse()?,
    })
}

fn parse_environments(context: &CorpusContext<'_>, texts: &[String]) -> Result<Vec<EnvironmentFilter>> {
    let inventory = context.inventory();
    texts
        .iter()
        .map(|t| -> Result<EnvironmentFilter> { Ok(EnvironmentFilter::parse(t, context.features(), &inventory)?) })
        .collect()
}

/// Parse "s1,s2".
fn parse_pair(text: &str) -> Result<(String, String)> {
    let Some((a, b)) = text.split_once(',') else {
        bail!("Segment pair must look like 's1,s2', got '{}'", text);
    };
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        bail!("Segment pair must name two segments, got '{}'", text);
    }
    Ok((a.to_string(), b.to_string()))
}

fn progress_control() -> BatchControl<'static> {
    BatchControl::new().with_progress(|done, total| log::debug!("Progress: {}/{}", done, total))
}

// ─── Functional load runner ──────────────────────────────────────

fn run_functional_load(args: FunctionalLoadArgs, out: &mut impl Write) -> Result<()> {
    let corpus = load_corpus(&args.shared.corpus)?;
    let context = CorpusContext::new(&corpus, context_options(&args.shared)?)?;
    let filters = parse_environments(&context, &args.environments)?;
    let control = progress_control();

    // Apply --no-* overrides
    let minpair = MinPairOptions {
        relative_count: args.relative_count && !args.no_relative_count,
        distinguish_homophones: args.distinguish_homophones,
    };
    let deltah = DeltaHOptions {
        prevent_normalization: args.prevent_normalization,
    };
    let method = match args.algorithm.parse::<FunctionalLoadMethod>()? {
        FunctionalLoadMethod::MinPair(_) => FunctionalLoadMethod::MinPair(minpair),
        FunctionalLoadMethod::DeltaH(_) => FunctionalLoadMethod::DeltaH(deltah),
    };

    if args.all_pairs {
        let scores = all_pairwise_fls(&context, &method, &filters, args.per_segment, &control)?;
        for score in &scores {
            writeln!(out, "{}\t{:.4}", score.target, score.score)?;
        }
        return Ok(());
    }

    if let Some(segment) = &args.relative_to {
        let score = match &method {
            FunctionalLoadMethod::MinPair(options) => {
                relative_minpair_fl(&context, segment, options, &filters, &control)?
            }
            FunctionalLoadMethod::DeltaH(options) => {
                relative_deltah_fl(&context, segment, options, &filters, &control)?
            }
        };
        writeln!(out, "{}\t{:.4}", segment, score)?;
        return Ok(());
    }

    if args.pairs.is_empty() {
        bail!("At least one --pair is required (or use --all-pairs / --relative-to)");
    }
    let pairs = args
        .pairs
        .iter()
        .map(|p| parse_pair(p))
        .collect::<Result<Vec<_>>>()?;
    let label = args.pairs.join(" ");

    match &method {
        FunctionalLoadMethod::MinPair(options) => {
            let result = minpair_fl(&context, &pairs, options, &filters, &control)?;
            writeln!(out, "{}\t{:.4}", label, result.score)?;
            for pair in &result.pairs {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    pair.spelling1,
                    pair.transcription1.join("."),
                    pair.spelling2,
                    pair.transcription2.join(".")
                )?;
            }
        }
        FunctionalLoadMethod::DeltaH(options) => {
            let result = deltah_fl(&context, &pairs, options, &filters, &control)?;
            writeln!(
                out,
                "{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}",
                label, result.value, result.raw, result.pre_entropy, result.post_entropy
            )?;
        }
    }
    Ok(())
}

// ─── Prod runner ─────────────────────────────────────────────────

fn run_prod(args: ProdArgs, out: &mut impl Write) -> Result<()> {
    let corpus = load_corpus(&args.shared.corpus)?;
    let context = CorpusContext::new(&corpus, context_options(&args.shared)?)?;
    let control = progress_control();

    if args.environments.is_empty() {
        let h = calc_prod_all_envs(&context, &args.first, &args.second, &control)?;
        writeln!(out, "{}\t{}\t{:.4}", args.first, args.second, h)?;
        return Ok(());
    }

    let filters = parse_environments(&context, &args.environments)?;
    let options = ProdOptions { strict: args.strict };
    let result = calc_prod(&context, &args.first, &args.second, &filters, &options, &control)?;
    for env in &result.environments {
        writeln!(
            out,
            "{}\t{:.4}\t{:.4}\t{:.4}",
            env.environment, env.first, env.second, env.entropy
        )?;
    }
    writeln!(out, "AVG\t\t\t{:.4}", result.average)?;
    Ok(())
}

// ─── Mutual information runner ───────────────────────────────────

fn run_mi(args: MiArgs, out: &mut impl Write) -> Result<()> {
    let corpus = load_corpus(&args.shared.corpus)?;
    let context = CorpusContext::new(&corpus, context_options(&args.shared)?)?;
    let mi = pointwise_mi(&context, (&args.first, &args.second), args.halve_edges, args.in_word)?;
    writeln!(out, "{}\t{}\t{:.4}", args.first, args.second, mi)?;
    Ok(())
}

// ─── Similarity runners ──────────────────────────────────────────

fn run_distance(args: DistanceArgs, out: &mut impl Write) -> Result<()> {
    let corpus = load_corpus(&args.shared.corpus)?;
    let context = CorpusContext::new(&corpus, context_options(&args.shared)?)?;
    let algorithm = args.scoring.build(&context)?;

    let first = context.find(&args.word1)?;
    let second = context.find(&args.word2)?;
    let score = algorithm.score(&first.sequence, &second.sequence)?;
    writeln!(out, "{}\t{}\t{:.4}", args.word1, args.word2, score)?;
    Ok(())
}

fn run_neighbors(args: NeighborsArgs, out: &mut impl Write) -> Result<()> {
    let corpus = load_corpus(&args.shared.corpus)?;
    let context = CorpusContext::new(&corpus, context_options(&args.shared)?)?;
    let algorithm = args.scoring.build(&context)?;

    let query = context.find(&args.word)?;
    let neighborhood = neighborhood_density(&context, &query, algorithm.as_ref(), args.threshold, &progress_control())?;
    log::info!(
        "{} neighbor(s) of '{}' under {}",
        neighborhood.neighbors.len(),
        args.word,
        algorithm.name()
    );
    if !neighborhood.skipped.is_empty() {
        log::warn!("{} word(s) could not be compared and were left out", neighborhood.skipped.len());
    }

    writeln!(out, "{}\t{:.4}", args.word, neighborhood.density)?;
    for neighbor in &neighborhood.neighbors {
        writeln!(
            out,
            "{}\t{}\t{:.4}",
            neighbor.spelling,
            neighbor.sequence.join("."),
            neighbor.score
        )?;
    }
    Ok(())
}
