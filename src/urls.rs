//! Turn a line-delimited JSON dump of games into request paths for load testing

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use indicatif::ProgressBar;
use json::JsonValue;
use tracing::{debug, info};

/// Default location of the game dump (JSON lines despite the extension)
pub const DEFAULT_INPUT: &str = "load-test/games.csv";

/// Default location of the generated path list
pub const DEFAULT_OUTPUT: &str = "load-test/get_games_urls.csv";

/// Field holding the identifier of each game
const ID_FIELD: &str = "id";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to open input {}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("unable to create output {}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("unable to read line {line}")]
    Read { line: usize, source: io::Error },

    #[error("unable to write output")]
    Write { source: io::Error },

    #[error("invalid JSON on line {line}")]
    Parse { line: usize, source: json::Error },

    #[error("line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("line {line} has no `{field}` field")]
    MissingField { line: usize, field: &'static str },
}

/// Counts collected over a single run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub lines: usize,
    pub skipped: usize,
    pub written: usize,
}

#[derive(Args, Debug)]
/// Generate game paths for load testing
pub struct UrlArgs {
    #[clap(short, long, default_value = DEFAULT_INPUT)]
    /// Line-delimited JSON file with one game per line
    pub input: PathBuf,

    #[clap(short, long, default_value = DEFAULT_OUTPUT)]
    /// File to write the paths to (overwritten)
    pub output: PathBuf,
}

/// Build the request path for a single game
pub fn path_for(id: &str) -> String {
    format!("/games/{}", id)
}

/// Find the text of the last top-level `key` value in a line already known to
/// be a valid JSON object
///
/// Only the characters a JSON number can hold are taken, so this is meant for
/// numeric values.
fn raw_number<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let bytes = text.as_bytes();
    let mut depth = 0;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth -= 1,
            b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let end = (i + 1).min(bytes.len());

                // A string directly inside the outer object followed by a colon is a key
                let rest = text[end..].trim_start();
                if depth == 1 && rest.starts_with(':') {
                    let is_key = json::parse(&text[start..end])
                        .map(|k| k.as_str() == Some(key))
                        .unwrap_or(false);
                    if is_key {
                        let value = rest[1..].trim_start();
                        let len = value
                            .find(|c: char| !matches!(c, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'))
                            .unwrap_or(value.len());
                        found = Some(&value[..len]);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    found.filter(|n| !n.is_empty())
}

/// Extract the identifier of a parsed entry as it should appear in a path
fn entry_id(text: &str, value: &JsonValue, line: usize) -> Result<String, Error> {
    let obj = match value {
        JsonValue::Object(obj) => obj,
        _ => return Err(Error::NotAnObject { line }),
    };

    match obj.get(ID_FIELD) {
        // Strings lose their quotes and numbers keep the exact text of the line,
        // since the parsed form rounds anything past u64
        Some(id) if id.is_number() => Ok(match raw_number(text, ID_FIELD) {
            Some(raw) => raw.to_owned(),
            None => id.dump(),
        }),
        Some(id) => Ok(match id.as_str() {
            Some(s) => s.to_owned(),
            None => id.dump(),
        }),
        None => Err(Error::MissingField {
            line,
            field: ID_FIELD,
        }),
    }
}

/// Write one path per non-blank input line, stopping at the first bad line
pub fn transform<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    progress: &ProgressBar,
) -> Result<Summary, Error> {
    let mut summary = Summary::default();

    for (index, line) in input.lines().enumerate() {
        let lineno = index + 1;
        let line = line.map_err(|source| Error::Read {
            line: lineno,
            source,
        })?;
        summary.lines += 1;

        if line.trim().is_empty() {
            debug!(line = lineno, "skipping blank line");
            summary.skipped += 1;
            continue;
        }

        let parsed = json::parse(&line).map_err(|source| Error::Parse {
            line: lineno,
            source,
        })?;
        let id = entry_id(&line, &parsed, lineno)?;

        writeln!(output, "{}", path_for(&id)).map_err(|source| Error::Write { source })?;
        summary.written += 1;
        progress.inc(1);
    }

    Ok(summary)
}

/// Read the games file named in `args` and write the matching paths
pub fn generate(args: &UrlArgs) -> Result<Summary, Error> {
    debug!(input = %args.input.display(), output = %args.output.display(), "generating paths");

    let input = File::open(&args.input).map_err(|source| Error::Open {
        path: args.input.clone(),
        source,
    })?;
    let output = File::create(&args.output).map_err(|source| Error::Create {
        path: args.output.clone(),
        source,
    })?;

    let spinner = ProgressBar::new_spinner().with_message("Writing paths…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let mut writer = BufWriter::new(output);
    let result = transform(BufReader::new(input), &mut writer, &spinner);

    // Whatever was written before a failure stays in the output
    let flushed = writer.flush().map_err(|source| Error::Write { source });

    let summary = match result.and_then(|summary| flushed.map(|_| summary)) {
        Ok(summary) => summary,
        Err(err) => {
            spinner.abandon_with_message("Failed");
            return Err(err);
        }
    };

    let duration = start.elapsed();
    spinner.finish_with_message(format!(
        "Wrote {} paths in {:?}",
        summary.written, duration
    ));
    info!(
        lines = summary.lines,
        skipped = summary.skipped,
        written = summary.written,
        "wrote {}",
        args.output.display()
    );

    Ok(summary)
}
