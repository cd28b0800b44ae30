//! CLI binary for edgequake-pdfqr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig`, runs one job and prints where the report went.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfqr::{
    run_job, Diagnostic, DiagnosticLevel, ProgressCallback, ScanConfig, ScanProgressCallback,
    ScanSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over documents, one log line per
/// document. Documents may finish out of order when `--concurrency > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    warnings: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            warnings: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, pdf_name: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(pdf_name))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_documents} PDF(s) for QR codes…"))
        ));
    }

    fn on_document_start(&self, pdf_name: &str, _index: usize, _total: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(pdf_name.to_string(), Instant::now());
        }
        self.bar.set_message(pdf_name.to_string());
    }

    fn on_qr_found(&self, pdf_name: &str, page: u32, payload: &str) {
        self.bar.println(format!(
            "    {} {} p.{}  {}",
            dim("·"),
            dim(pdf_name),
            page,
            truncate(payload, 60)
        ));
    }

    fn on_document_complete(&self, pdf_name: &str, qr_count: usize) {
        let secs = self.elapsed_secs(pdf_name);
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            green("✓"),
            truncate(pdf_name, 40),
            dim(&format!("{qr_count:>3} QR")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, pdf_name: &str, error: &str) {
        let secs = self.elapsed_secs(pdf_name);
        // First line only; pdfium errors can be long.
        let first = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            truncate(pdf_name, 40),
            red(&truncate(first, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        if diagnostic.level == DiagnosticLevel::Warning {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_batch_complete(&self, total_documents: usize, failed_documents: usize, qr_total: usize) {
        self.bar.finish_and_clear();

        let warnings = self.warnings.load(Ordering::SeqCst);
        let warn_note = if warnings > 0 {
            format!("  {}", yellow(&format!("({warnings} warning(s), rerun with -v)")))
        } else {
            String::new()
        };

        if failed_documents == 0 {
            eprintln!(
                "{} {} QR code(s) in {} PDF(s){}",
                green("✔"),
                bold(&qr_total.to_string()),
                total_documents,
                warn_note
            );
        } else {
            eprintln!(
                "{} {} QR code(s) in {} PDF(s)  ({} failed){}",
                if failed_documents == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&qr_total.to_string()),
                total_documents,
                red(&failed_documents.to_string()),
                warn_note
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single PDF: images next to the PDF, report in ./out/invoice.csv
  pdfqr invoice.pdf --dest out --name invoice

  # Folder of PDFs: report out/march.csv, images out/march/<stem>/
  pdfqr scans/ --dest out --name march

  # Zip of PDFs (unpacked into out/extracted_pdfs/ first)
  pdfqr scans.zip --dest out --name march

  # Four documents at a time, JSON summary on stdout
  pdfqr scans/ --dest out --name march --concurrency 4 --json

REPORT COLUMNS:
  PDF Name, Page Number, QR Code Data, QR Image Path
  A document without QR codes gets one "NO QR code found" row; a document
  that cannot be read gets one "Error processing PDF" row.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Override the log filter (e.g. edgequake_pdfqr=debug)
  PDFQR_*           Every flag can also be set as PDFQR_<FLAG>
"#;

/// Extract QR codes from PDF files and write a CSV report.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqr",
    version,
    about = "Extract QR codes from PDF files and write a CSV report",
    long_about = "Scan the images embedded in a PDF, a folder of PDFs or a zip of PDFs for QR \
codes. Each image is decoded as-is first, then after contrast enhancement, then after denoising \
and adaptive thresholding. Every decoded QR code is saved as a PNG and listed in a CSV report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF file, a folder of PDFs, or a .zip of PDFs.
    input: PathBuf,

    /// Destination folder for the report and images.
    #[arg(short, long, env = "PDFQR_DEST", default_value = ".")]
    dest: PathBuf,

    /// Report name: writes <DEST>/<NAME>.csv and images under <DEST>/<NAME>/.
    #[arg(short, long, env = "PDFQR_NAME", default_value = "qr_report")]
    name: String,

    /// How to treat INPUT.
    #[arg(long, env = "PDFQR_MODE", value_enum, default_value = "auto")]
    mode: ModeArg,

    /// Number of PDFs scanned at once.
    #[arg(short, long, env = "PDFQR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFQR_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, env = "PDFQR_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Print the BatchReport as JSON on stdout.
    #[arg(long, env = "PDFQR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFQR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFQR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFQR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Auto,
    Pdf,
    Folder,
    Zip,
}

impl ModeArg {
    fn source(self, input: PathBuf) -> ScanSource {
        match self {
            ModeArg::Auto => ScanSource::detect(input),
            ModeArg::Pdf => ScanSource::Pdf(input),
            ModeArg::Folder => ScanSource::Folder(input),
            ModeArg::Zip => ScanSource::Archive(input),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ScanProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run job ──────────────────────────────────────────────────────────
    let source = cli.mode.source(cli.input.clone());
    let report = run_job(&source, &cli.dest, &cli.name, &config)
        .await
        .with_context(|| format!("Failed to process {}", source.path().display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Scanned {} PDF(s): {} QR code(s), {} failed, {}ms",
                report.documents, report.qr_codes_found, report.failed_documents, report.duration_ms
            );
        }
        eprintln!(
            "   report  →  {}",
            bold(&report.report_path.display().to_string())
        );
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder().concurrency(cli.concurrency);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
