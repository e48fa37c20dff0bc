use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use facet_core::CanonicalFilter;
use facet_core::Facet;
use facet_core::FacetCache;
use facet_core::FacetFilterConfig;
use facet_core::FacetOption;
use facet_core::FacetQuery;
use facet_core::FacetRegistry;
use facet_core::MemoryQuery;
use facet_core::RawFilter;
use facet_core::RawValue;
use facet_core::ResolutionContext;
use facet_core::RowCache;
use facet_index::Indexer;
use facet_index::JsonFieldExtractor;
use facet_index::JsonIndexStore;
use facet_index::SubjectId;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "facet", about = "Faceted filtering over a JSON subject collection")]
pub struct FacetCli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH", default_value = "facet-filter.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: FacetCommand,
}

#[derive(Debug, Subcommand)]
pub enum FacetCommand {
    /// Build facet rows for a subject collection
    Index(IndexArgs),

    /// Filter a subject collection and show facet counts
    Filter(FilterArgs),

    /// Remove facet rows for some subjects, or the whole index
    Reset(ResetArgs),

    /// Drop cached rows and id sets
    ForgetCache(ForgetCacheArgs),
}

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// JSON file holding an array of subjects
    #[arg(short, long, value_name = "PATH")]
    pub subjects: PathBuf,

    /// Subject type the collection belongs to
    #[arg(short = 't', long)]
    pub subject_type: Option<String>,

    /// Truncate the index before building
    #[arg(short, long)]
    pub reset: bool,
}

#[derive(Debug, Parser)]
pub struct FilterArgs {
    /// JSON file holding an array of subjects
    #[arg(short, long, value_name = "PATH")]
    pub subjects: PathBuf,

    /// Subject type the collection belongs to
    #[arg(short = 't', long)]
    pub subject_type: Option<String>,

    /// Facet selection as PARAM=VALUE; repeat to select several values
    #[arg(short, long = "filter", value_name = "PARAM=VALUE")]
    pub filters: Vec<String>,

    /// Keep subjects whose FIELD equals VALUE before facets apply
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub conditions: Vec<String>,

    /// Page size
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Subjects to skip before the page starts
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Bypass the id-set cache
    #[arg(long)]
    pub no_cache: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ResetArgs {
    /// Subject type whose rows are removed
    #[arg(short = 't', long)]
    pub subject_type: Option<String>,

    /// Subject ids to remove; the whole index when omitted
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<SubjectId>,
}

#[derive(Debug, Parser)]
pub struct ForgetCacheArgs {
    /// Only forget entries of this subject type
    #[arg(short = 't', long)]
    pub subject_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterReport {
    pub subject_type: String,
    pub ids: Vec<SubjectId>,
    pub total: u64,
    pub filter: CanonicalFilter,
    pub facets: Vec<FacetReport>,
}

#[derive(Debug, Serialize)]
pub struct FacetReport {
    pub title: String,
    pub param_name: String,
    pub slug: String,
    pub options: Vec<FacetOption>,
}

impl From<&Facet> for FacetReport {
    fn from(facet: &Facet) -> Self {
        Self {
            title: facet.title().to_string(),
            param_name: facet.param_name().to_string(),
            slug: facet.slug().to_string(),
            options: facet.options(),
        }
    }
}

/// Everything a command needs, built from one configuration file.
struct Workspace {
    registry: Arc<FacetRegistry>,
    rows: Arc<RowCache>,
    indexer: Indexer,
}

impl Workspace {
    fn open(config_path: &Path) -> Result<Self> {
        let mut config = FacetFilterConfig::load(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        config.apply_env_overrides();

        let registry = Arc::new(FacetRegistry::from_config(&config)?);
        let index = Arc::new(
            JsonIndexStore::open(&config.index.path, config.index.table.clone())
                .with_context(|| format!("Failed to open index {}", config.index.path.display()))?,
        );
        let rows = Arc::new(RowCache::new(
            index.clone(),
            FacetCache::from_config(&config.cache),
        ));
        let indexer = Indexer::new(index)
            .with_chunk_size(config.index.insert_chunk_size)?
            .observe(rows.clone());
        info!(
            "using {} cache store, namespace `{}`",
            config.cache.store.as_str(),
            config.cache.key
        );
        Ok(Self {
            registry,
            rows,
            indexer,
        })
    }

    /// The requested subject type, or the only one configured.
    fn subject_type(&self, requested: Option<String>) -> Result<String> {
        if let Some(subject_type) = requested {
            return Ok(subject_type);
        }
        let mut types = self.registry.subject_types();
        match (types.next(), types.next()) {
            (Some(only), None) => Ok(only.to_string()),
            (None, _) => bail!("No facets configured"),
            (Some(_), Some(_)) => bail!("Several subject types configured; pass --subject-type"),
        }
    }

    fn context(&self) -> ResolutionContext {
        ResolutionContext::new(self.registry.clone(), self.rows.clone())
    }
}

impl FacetCli {
    pub fn run(self) -> Result<()> {
        let workspace = Workspace::open(&self.config)?;
        match self.command {
            FacetCommand::Index(args) => run_index(&workspace, args),
            FacetCommand::Filter(args) => run_filter(&workspace, args),
            FacetCommand::Reset(args) => run_reset(&workspace, args),
            FacetCommand::ForgetCache(args) => run_forget_cache(&workspace, args),
        }
    }
}

fn run_index(workspace: &Workspace, args: IndexArgs) -> Result<()> {
    let subject_type = workspace.subject_type(args.subject_type)?;
    let subjects = load_subjects(&args.subjects)?;
    let fields = workspace.registry.indexed_fields(&subject_type)?;

    if args.reset {
        workspace.indexer.reset_index().context("Failed to reset index")?;
    }

    let stats = workspace
        .indexer
        .build_index(&fields, &subjects, &JsonFieldExtractor::default())
        .context("Failed to build index")?;

    println!(
        "{} Indexed {} {} subjects into {} rows",
        "✓".bright_green(),
        stats.subjects_indexed,
        subject_type,
        stats.rows_inserted
    );
    if stats.subjects_skipped > 0 {
        println!(
            "  {} subjects skipped (no id)",
            stats.subjects_skipped.yellow()
        );
    }
    Ok(())
}

fn run_filter(workspace: &Workspace, args: FilterArgs) -> Result<()> {
    let subject_type = workspace.subject_type(args.subject_type)?;
    let subjects = load_subjects(&args.subjects)?;
    let raw = parse_filter_args(&args.filters)?;

    let mut base = MemoryQuery::new(subject_type.clone(), subjects).offset(args.offset);
    if let Some(limit) = args.limit {
        base = base.limit(limit);
    }
    for condition in &args.conditions {
        let (field, value) = split_pair(condition)?;
        base = base.where_eq(field, value);
    }

    let mut ctx = workspace.context();
    let mut query = FacetQuery::new(base)
        .facet_filter(raw.clone())
        .with_cache(!args.no_cache);
    let ids = query.get(&mut ctx)?;
    let total = query.count_for_pagination(&mut ctx)?;
    let facets = ctx.facets(&subject_type, &raw)?;
    let filter = ctx.normalize(&subject_type, &raw)?;

    let report = FilterReport {
        subject_type,
        ids,
        total,
        filter,
        facets: facets.iter().map(FacetReport::from).collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_reset(workspace: &Workspace, args: ResetArgs) -> Result<()> {
    if args.ids.is_empty() {
        workspace.indexer.reset_index()?;
        println!("{} Index cleared", "✓".bright_green());
        return Ok(());
    }
    let subject_type = workspace.subject_type(args.subject_type)?;
    let fields = workspace.registry.indexed_fields(&subject_type)?;
    let removed = workspace.indexer.reset_rows(&fields, &args.ids)?;
    println!(
        "{} Removed {} rows for {} {} subjects",
        "✓".bright_green(),
        removed,
        args.ids.len(),
        subject_type
    );
    Ok(())
}

fn run_forget_cache(workspace: &Workspace, args: ForgetCacheArgs) -> Result<()> {
    let mut ctx = workspace.context();
    match args.subject_type {
        Some(subject_type) => {
            ctx.forget_cache_for(&subject_type);
            println!("{} Cache cleared for {subject_type}", "✓".bright_green());
        }
        None => {
            ctx.forget_cache();
            println!("{} Cache cleared", "✓".bright_green());
        }
    }
    Ok(())
}

fn print_report(report: &FilterReport) {
    println!(
        "{} {} of {} {} subjects match",
        "▶".bright_blue(),
        report.ids.len(),
        report.total,
        report.subject_type
    );
    let ids: Vec<String> = report.ids.iter().map(ToString::to_string).collect();
    println!("  ids: {}", ids.join(", "));

    for facet in &report.facets {
        println!("\n{} ({})", facet.title.bold(), facet.param_name.dimmed());
        for option in &facet.options {
            let marker = if option.selected { "[x]" } else { "[ ]" };
            if option.total == 0 {
                println!("  {marker} {} {}", option.value.dimmed(), "(0)".dimmed());
            } else {
                println!("  {marker} {} ({})", option.value, option.total.bright_cyan());
            }
        }
    }
}

fn load_subjects(path: &Path) -> Result<Vec<Value>> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read subjects from {}", path.display()))?;
    let value: Value = serde_json::from_slice(&data)
        .with_context(|| format!("Subjects file {} is not valid JSON", path.display()))?;
    match value {
        Value::Array(subjects) => Ok(subjects),
        _ => bail!("Subjects file {} must hold a JSON array", path.display()),
    }
}

/// Groups repeated `PARAM=VALUE` arguments into one selection per parameter.
pub fn parse_filter_args(args: &[String]) -> Result<RawFilter> {
    let mut raw = RawFilter::new();
    for arg in args {
        let (param, value) = split_pair(arg)?;
        let entry = raw
            .entry(param.to_string())
            .or_insert_with(|| RawValue::Many(Vec::new()));
        if let RawValue::Many(values) = entry {
            values.push(Value::String(value.to_string()));
        }
    }
    Ok(raw)
}

fn split_pair(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("Expected KEY=VALUE, got `{arg}`"),
    }
}
