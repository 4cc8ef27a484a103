use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dossier_core::config_file;
use dossier_core::{
    Config, CorpusMatchIndex, MatchNavigator, ProjectSnapshot, ScanController,
    ScanEvent, ScanPage, ScanSummary, ServiceBackend, TypeFilter,
};
use dossier_pdf_mupdf::MupdfPageSource;

mod output;

use output::ColorMode;

/// Dossier - find people, places, organizations and dates across PDF documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan PDFs and list every entity match in navigation order
    Scan {
        /// PDF files, in document order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,

        /// Save the resulting project (matches without geometry) as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Print the cross-document dossier grouped by entity
    Dossier {
        /// PDF files to scan
        #[arg(required_unless_present = "project")]
        files: Vec<PathBuf>,

        /// Load a saved project instead of scanning
        #[arg(long, conflicts_with = "files")]
        project: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// List document pairs that mention the same entities
    Connections {
        /// PDF files to scan
        #[arg(required_unless_present = "project")]
        files: Vec<PathBuf>,

        /// Load a saved project instead of scanning
        #[arg(long, conflicts_with = "files")]
        project: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// List dated sentences across all documents in date order
    Chronology {
        /// PDF files to scan
        #[arg(required_unless_present = "project")]
        files: Vec<PathBuf>,

        /// Load a saved project instead of scanning
        #[arg(long, conflicts_with = "files")]
        project: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Check the tagging service
    Health {
        /// Tagging service base URL
        #[arg(long)]
        service_url: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Comma-separated entity types to search for (default: all)
    #[arg(long)]
    types: Option<String>,

    /// Extra term to search for in every document
    #[arg(long)]
    custom_term: Option<String>,

    /// Treat --custom-term as a regular expression
    #[arg(long)]
    regex: bool,

    /// Match --custom-term with exact case
    #[arg(long)]
    case_sensitive: bool,

    /// Tagging service base URL (e.g. http://localhost:5000/api)
    #[arg(long)]
    service_url: Option<String>,

    /// Tagging service timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pages per bulk tagging request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Render scale applied to match positions
    #[arg(long)]
    scale: Option<f64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let file_config = config_file::load_config();

    match cli.command {
        Command::Scan {
            files,
            search,
            save,
        } => {
            let (config, color) = resolve_config(&file_config, &search);
            scan(files, config, color, save).await
        }
        Command::Dossier {
            files,
            project,
            search,
        } => {
            let (config, color) = resolve_config(&file_config, &search);
            dossier(files, project, config, color).await
        }
        Command::Connections {
            files,
            project,
            search,
        } => {
            let (config, color) = resolve_config(&file_config, &search);
            let corpus = open_corpus(files, project, &config, color).await?;
            let connections = corpus.connections(&config.enabled_types);
            output::print_connections(&mut std::io::stdout(), &corpus, &connections, color)?;
            Ok(())
        }
        Command::Chronology {
            files,
            project,
            search,
        } => {
            let (mut config, color) = resolve_config(&file_config, &search);
            // The timeline is built from date matches only.
            config.enabled_types = TypeFilter::only(["dates"]);
            let corpus = open_corpus(files, project, &config, color).await?;
            output::print_chronology(&mut std::io::stdout(), &corpus.chronology(), color)?;
            Ok(())
        }
        Command::Health { service_url } => {
            let url = service_url
                .or_else(|| std::env::var("DOSSIER_SERVICE_URL").ok())
                .or_else(|| file_config.service.and_then(|s| s.url));
            health(url).await
        }
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(file: &config_file::ConfigFile, args: &SearchArgs) -> (Config, ColorMode) {
    let mut config = Config::from_file(file);

    if let Ok(url) = std::env::var("DOSSIER_SERVICE_URL")
        && !url.trim().is_empty()
    {
        config.service_url = Some(url);
    }
    if let Some(secs) = std::env::var("DOSSIER_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.timeout_secs = secs;
    }

    if let Some(url) = &args.service_url {
        config.service_url = Some(url.clone());
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }
    if let Some(types) = &args.types {
        config.enabled_types = TypeFilter::parse(types);
    }
    if let Some(term) = &args.custom_term {
        config.custom_term = Some(term.clone());
    }
    if args.regex {
        config.custom_term_regex = true;
    }
    if args.case_sensitive {
        config.case_sensitive = true;
    }
    if let Some(size) = args.batch_size {
        config.bulk_batch_size = size.max(1);
    }
    if let Some(scale) = args.scale {
        config.scale = scale;
    }

    let color_from_file = file.display.as_ref().and_then(|d| d.color).unwrap_or(true);
    (config, ColorMode(!args.no_color && color_from_file))
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Open every file and scan it into a fresh corpus.
async fn scan_files(
    files: &[PathBuf],
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<(CorpusMatchIndex, ScanSummary)> {
    let source = MupdfPageSource::new();
    let mut corpus = CorpusMatchIndex::new();
    let mut pages: Vec<ScanPage> = Vec::new();

    for (index, path) in files.iter().enumerate() {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        let doc_pages = dossier_core::load_document(&source, path, index, config.scale)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        tracing::debug!(file = %path.display(), pages = doc_pages.len(), "loaded document");
        corpus.register_document(index, file_title(path));
        pages.extend(doc_pages);
    }

    let extractor = config.build_extractor();
    if extractor.has_remote() && !extractor.check_availability().await {
        let mut err = std::io::stderr();
        output::print_warning(
            &mut err,
            "tagging service not reachable, falling back to pattern matching",
            color,
        )?;
    }

    let mut controller = ScanController::new();
    let cancel = controller.begin();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let bar = ProgressBar::new(pages.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:40.cyan/dim}] {pos}/{len} pages")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("Scanning");

    let progress = {
        let bar = bar.clone();
        move |event: ScanEvent| match event {
            ScanEvent::PageScanned { .. } => bar.inc(1),
            ScanEvent::Degraded { reason } => {
                bar.println(format!("Using pattern matching ({reason})"));
            }
            ScanEvent::Cancelled { pages_scanned } => {
                bar.abandon_with_message(format!("Cancelled after {pages_scanned} pages"));
            }
        }
    };

    let summary = dossier_core::scan_corpus(
        &pages,
        &extractor,
        &config.scan_request(),
        &mut corpus,
        &cancel,
        progress,
    )
    .await;
    if !summary.cancelled {
        bar.finish_and_clear();
    }

    Ok((corpus, summary))
}

async fn scan(
    files: Vec<PathBuf>,
    config: Config,
    color: ColorMode,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (corpus, summary) = scan_files(&files, &config, color).await?;

    let mut writer = std::io::stdout();
    let mut nav = MatchNavigator::new(&corpus);
    nav.set_filter(config.enabled_types.clone(), &corpus);
    output::print_matches(&mut writer, &corpus, &mut nav, color)?;
    output::print_summary(&mut writer, &corpus, &summary, color)?;

    if let Some(path) = save {
        ProjectSnapshot::capture(&corpus).save(&path)?;
        writeln!(writer, "Project saved to {}", path.display())?;
    }
    Ok(())
}

/// Corpus from a saved project, or from scanning `files`.
async fn open_corpus(
    files: Vec<PathBuf>,
    project: Option<PathBuf>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<CorpusMatchIndex> {
    if let Some(path) = project {
        let mut corpus = CorpusMatchIndex::new();
        ProjectSnapshot::load(&path)?.restore_into(&mut corpus);
        Ok(corpus)
    } else {
        Ok(scan_files(&files, config, color).await?.0)
    }
}

async fn dossier(
    files: Vec<PathBuf>,
    project: Option<PathBuf>,
    config: Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let corpus = open_corpus(files, project, &config, color).await?;

    let mut writer = std::io::stdout();
    let dossier = corpus.dossier(&config.enabled_types);
    output::print_dossier(&mut writer, &dossier, color)?;
    Ok(())
}

async fn health(url: Option<String>) -> anyhow::Result<()> {
    let Some(url) = url else {
        anyhow::bail!("No tagging service configured. Pass --service-url or set DOSSIER_SERVICE_URL.");
    };
    let backend = ServiceBackend::new(url.clone());
    let status = match backend.health().await {
        Ok(status) => status,
        Err(e) => anyhow::bail!("Tagging service at {} is not available: {}", url, e),
    };
    println!(
        "{}: {} (model: {})",
        url,
        status.status,
        status.model.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
