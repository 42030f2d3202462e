//! Lens CLI - Command-line interface for Sensor Lens
//!
//! Commands:
//! - inspect: List the decoded chunks and print the information tree
//! - decode: Print the ordered record as JSON
//! - fields: Print the ordered record as a tree, one leaf per field

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sensor_lens::catalog::{information_tree, record_tree};
use sensor_lens::check::{RecordCheck, RequiredFields};
use sensor_lens::decoder::{decode_payload, split_chunks};
use sensor_lens::render::{paint, render_information, strip_ansi, TreeRenderer, GREEN};
use sensor_lens::types::RAW;
use sensor_lens::{DecodeError, FieldError, LENS_VERSION};

const PROMPT: &str = "Enter payload: ";
const RULE: &str = "─";
const DEFAULT_WIDTH: usize = 100;

/// Lens - Decoder and annotated viewer for behavioral sensor payloads
#[derive(Parser)]
#[command(name = "lens")]
#[command(version = LENS_VERSION)]
#[command(about = "Decode and annotate obfuscated sensor payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Input file path (use - for stdin)
    #[arg(short, long, global = true, default_value = "-")]
    input: PathBuf,

    /// Width used for rules and wrapping [default: terminal width, then $COLUMNS, then 100]
    #[arg(long, global = true)]
    width: Option<usize>,

    /// Strip color escape sequences from the output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the decoded chunks and print the information tree
    Inspect {
        /// Print the information tree even if required fields are missing
        #[arg(long)]
        skip_check: bool,
    },

    /// Print the ordered record as JSON
    Decode {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Print the ordered record as a tree, one leaf per field
    Fields,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", report);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LensCliError> {
    let payload = read_payload(&cli.input)?;
    let width = resolve_width(
        cli.width,
        crossterm::terminal::size().ok(),
        std::env::var("COLUMNS").ok(),
    );
    log::debug!("rendering at {} columns", width);

    let output = match cli.command {
        Commands::Inspect { skip_check } => cmd_inspect(&payload, width, skip_check)?,
        Commands::Decode { pretty } => cmd_decode(&payload, pretty)?,
        Commands::Fields => cmd_fields(&payload, width)?,
    };

    let output = if cli.no_color { strip_ansi(&output) } else { output };
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// `--width`, then the terminal size, then `COLUMNS`, then the default; zero counts as unknown
fn resolve_width(
    flag: Option<usize>,
    terminal: Option<(u16, u16)>,
    columns: Option<String>,
) -> usize {
    flag.filter(|&w| w > 0)
        .or_else(|| terminal.map(|(cols, _)| usize::from(cols)).filter(|&w| w > 0))
        .or_else(|| columns.and_then(|v| v.trim().parse().ok()).filter(|&w| w > 0))
        .unwrap_or(DEFAULT_WIDTH)
}

/// Read the payload from a file or stdin, prompting only on an interactive terminal
fn read_payload(input: &Path) -> Result<String, LensCliError> {
    let payload = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        if atty::is(atty::Stream::Stdin) {
            print!("{}", PROMPT);
            io::stdout().flush()?;
            io::stdin().lock().read_line(&mut buffer)?;
        } else {
            io::stdin().read_to_string(&mut buffer)?;
        }
        buffer
    } else {
        fs::read_to_string(input)?
    };

    Ok(payload.trim().to_string())
}

fn cmd_inspect(payload: &str, width: usize, skip_check: bool) -> Result<String, LensCliError> {
    let record = decode_payload(payload)?;
    let chunks = split_chunks(record.bytes(RAW)?)?;
    let rule = RULE.repeat(width);

    let mut out = String::new();
    out.push_str(&format!("{}\n", rule));
    out.push_str("sensor_data :\n[\n");
    for chunk in &chunks {
        out.push_str(&format!("  {},\n", paint(GREEN, &format!("'{}'", chunk))));
    }
    out.push_str("]\n");
    out.push_str(&format!("{}\n", rule));

    if skip_check || RequiredFields::default().check(&record) {
        out.push_str(&render_information(&record, &information_tree(), width));
    }

    Ok(out)
}

fn cmd_decode(payload: &str, pretty: bool) -> Result<String, LensCliError> {
    let record = decode_payload(payload)?;
    let json = if pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };
    Ok(format!("{}\n", json))
}

fn cmd_fields(payload: &str, width: usize) -> Result<String, LensCliError> {
    let record = decode_payload(payload)?;
    Ok(TreeRenderer::new(width).render(&record, &record_tree(&record)))
}

// Error types

#[derive(Debug)]
enum LensCliError {
    Io(io::Error),
    Decode(DecodeError),
    Field(FieldError),
    Json(serde_json::Error),
}

impl From<io::Error> for LensCliError {
    fn from(e: io::Error) -> Self {
        LensCliError::Io(e)
    }
}

impl From<DecodeError> for LensCliError {
    fn from(e: DecodeError) -> Self {
        LensCliError::Decode(e)
    }
}

impl From<FieldError> for LensCliError {
    fn from(e: FieldError) -> Self {
        LensCliError::Field(e)
    }
}

impl From<serde_json::Error> for LensCliError {
    fn from(e: serde_json::Error) -> Self {
        LensCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LensCliError> for CliError {
    fn from(e: LensCliError) -> Self {
        match e {
            LensCliError::Io(e) => CliError {
                code: "IO".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LensCliError::Decode(e) => {
                let hint = match &e {
                    DecodeError::MalformedEnvelope(_) => {
                        "Input must be a JSON object with a string 'sensor_data'"
                    }
                    DecodeError::MalformedKeys(_) => {
                        "The sensor blob must start with '<version>;<key1>;<key2>;'"
                    }
                    DecodeError::TransformFailure(_) => {
                        "The payload may come from an unsupported sensor version"
                    }
                    DecodeError::MalformedRecord(_) => {
                        "The decrypted payload has no recognizable field separator"
                    }
                };
                CliError {
                    code: e.stage().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LensCliError::Field(e) => CliError {
                code: "RECORD".to_string(),
                message: e.to_string(),
                hint: None,
            },
            LensCliError::Json(e) => CliError {
                code: "JSON".to_string(),
                message: e.to_string(),
                hint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_flag_wins() {
        assert_eq!(resolve_width(Some(42), Some((200, 50)), Some("90".to_string())), 42);
    }

    #[test]
    fn test_width_prefers_terminal_over_columns() {
        assert_eq!(resolve_width(None, Some((163, 40)), Some("90".to_string())), 163);
    }

    #[test]
    fn test_width_falls_back_to_columns_then_default() {
        assert_eq!(resolve_width(None, None, Some(" 90 ".to_string())), 90);
        assert_eq!(resolve_width(None, Some((0, 0)), Some("wide".to_string())), DEFAULT_WIDTH);
        assert_eq!(resolve_width(Some(0), None, None), DEFAULT_WIDTH);
    }
}
