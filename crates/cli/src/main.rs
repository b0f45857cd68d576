//! tinta - extract text from PDF files.

mod page_range;

use clap::{Parser, Subcommand};
use page_range::parse_page_range;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tinta_core::{
    ExtractOptions, ExtractOrder, OpenOptions, ParseMode, PdfDocument, PdfError,
};

/// Exit codes per the interface contract.
const EXIT_IO: u8 = 2;
const EXIT_FORMAT: u8 = 3;
const EXIT_USAGE: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "tinta", version, about = "Extract text from PDF files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use debug logging level
    #[arg(short = 'd', long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text from a PDF
    Extract {
        /// Pages to extract: `3`, `2-5`, `7-`, or a comma list (1-indexed)
        #[arg(short = 'p', long = "pages")]
        pages: Option<String>,

        /// Output file; stdout when omitted
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Emit text in structure-tree order
        #[arg(long)]
        tagged: bool,

        /// Emit text in visual reading order
        #[arg(long)]
        reading_order: bool,

        /// Render Markdown with heading/list/code inference
        #[arg(long)]
        markdown: bool,

        /// Worker threads for parallel page extraction
        #[arg(short = 'j', long = "jobs", default_value_t = 1)]
        jobs: usize,

        /// Fail on format violations instead of recovering
        #[arg(long)]
        strict: bool,

        /// Path to the PDF file
        path: PathBuf,
    },
    /// Print document metadata
    Info {
        /// Path to the PDF file
        path: PathBuf,
    },
    /// Time repeated whole-document extraction
    Bench {
        /// Number of extraction passes
        #[arg(short = 'n', long, default_value_t = 5)]
        iterations: usize,

        /// Path to the PDF file
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not usage errors.
            use clap::error::ErrorKind;
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {}", msg);
            ExitCode::from(EXIT_USAGE)
        }
        Err(CliError::Pdf(e)) => {
            eprintln!("error: {}", e);
            let code = match e {
                PdfError::Io(_) => EXIT_IO,
                _ => EXIT_FORMAT,
            };
            ExitCode::from(code)
        }
    }
}

enum CliError {
    Usage(String),
    Pdf(PdfError),
}

impl From<PdfError> for CliError {
    fn from(e: PdfError) -> Self {
        CliError::Pdf(e)
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Extract {
            pages,
            output,
            tagged,
            reading_order,
            markdown,
            jobs,
            strict,
            path,
        } => {
            if jobs == 0 {
                return Err(CliError::Usage("--jobs must be at least 1".into()));
            }

            let mode = if strict {
                ParseMode::Strict
            } else {
                ParseMode::Permissive
            };
            let doc = PdfDocument::open(&path, OpenOptions { mode })?;

            let page_indices = match pages {
                Some(expr) => Some(
                    parse_page_range(&expr, doc.page_count()).map_err(CliError::Usage)?,
                ),
                None => None,
            };

            let options = ExtractOptions {
                order: if tagged {
                    ExtractOrder::Tagged
                } else if reading_order {
                    ExtractOrder::Reading
                } else {
                    ExtractOrder::Stream
                },
                markdown,
                jobs,
                ..ExtractOptions::default()
            };

            let text = doc.extract_text(page_indices.as_deref(), &options)?;
            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(path).map_err(PdfError::Io)?;
                    file.write_all(text.as_bytes()).map_err(PdfError::Io)?;
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    handle.write_all(text.as_bytes()).map_err(PdfError::Io)?;
                }
            }
            Ok(())
        }

        Command::Info { path } => {
            let doc = PdfDocument::open(&path, OpenOptions::default())?;
            let info = doc.info();
            println!("pages: {}", info.page_count);
            if let Some(version) = &info.version {
                println!("pdf version: {}", version);
            }
            for (label, value) in [
                ("title", &info.title),
                ("author", &info.author),
                ("subject", &info.subject),
                ("producer", &info.producer),
                ("creator", &info.creator),
            ] {
                if let Some(value) = value {
                    println!("{}: {}", label, value);
                }
            }
            println!("tagged: {}", if doc.is_tagged() { "yes" } else { "no" });
            Ok(())
        }

        Command::Bench { iterations, path } => {
            if iterations == 0 {
                return Err(CliError::Usage("--iterations must be at least 1".into()));
            }
            let doc = PdfDocument::open(&path, OpenOptions::default())?;
            let options = ExtractOptions::default();

            let mut total_bytes = 0usize;
            let start = Instant::now();
            for _ in 0..iterations {
                total_bytes += doc.extract_text(None, &options)?.len();
            }
            let elapsed = start.elapsed();

            let pages = doc.page_count() * iterations;
            let secs = elapsed.as_secs_f64();
            println!(
                "{} pages in {:.3}s ({:.1} pages/s, {} bytes of text)",
                pages,
                secs,
                pages as f64 / secs.max(1e-9),
                total_bytes / iterations.max(1),
            );
            Ok(())
        }
    }
}
