//! Shared logging setup for Tessera binaries.
//!
//! The MCP server speaks JSON-RPC on stdout, so nothing here ever writes to
//! stdout: events go to a size-rotated file under `$TESSERA_HOME/logs` and to
//! stderr.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "tessera=info,tessera_mcp=info,tessera_semantic=info,tessera_discovery=info";

/// Files kept per application, the live one included.
const KEEP_GENERATIONS: usize = 5;
const GENERATION_BYTES: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    /// Names the log file, `<app_name>.log`.
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only.
    pub verbose: bool,
}

/// Install the global subscriber: rotated file output plus stderr.
///
/// `RUST_LOG` overrides the default filter for both outputs.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = create_log_dir()?;
    let log_file = GenerationalFile::open(&dir, config.app_name, KEEP_GENERATIONS, GENERATION_BYTES)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_filter = if config.verbose { filter.clone() } else { EnvFilter::new("warn") };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .with_filter(filter);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;
    Ok(())
}

/// `$TESSERA_HOME`, falling back to `~/.tessera`.
pub fn tessera_home() -> PathBuf {
    match std::env::var_os("TESSERA_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tessera"),
    }
}

pub fn logs_dir() -> PathBuf {
    tessera_home().join("logs")
}

fn create_log_dir() -> Result<PathBuf> {
    let dir = logs_dir();
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Append-only log file that starts a new generation once it would grow
/// past `limit` bytes.
///
/// The live file is `<stem>.log`; older generations are `<stem>.log.1`
/// (newest) up to `<stem>.log.<keep - 1>` (oldest).
struct GenerationalFile {
    live: PathBuf,
    keep: usize,
    limit: u64,
    file: File,
    written: u64,
}

impl GenerationalFile {
    fn open(dir: &Path, app_name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let live = dir.join(format!("{}.log", file_stem(app_name)));
        let (file, written) = append_to(&live)?;
        let mut log = Self {
            live,
            keep: keep.max(1),
            limit,
            file,
            written,
        };
        if log.written > log.limit {
            log.start_generation()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        let mut name = self.live.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn start_generation(&mut self) -> io::Result<()> {
        self.file.flush()?;

        // Walk from the oldest slot down so every rename targets a free name.
        let oldest = self.keep - 1;
        for n in (1..=oldest).rev() {
            let from = if n == 1 { self.live.clone() } else { self.generation(n - 1) };
            let to = self.generation(n);
            if n == oldest {
                remove_if_present(&to)?;
            }
            if from.exists() {
                fs::rename(&from, &to)?;
            }
        }
        if oldest == 0 {
            remove_if_present(&self.live)?;
        }

        let (file, written) = append_to(&self.live)?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for GenerationalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = buf.len() as u64;
        if self.written > 0 && self.written.saturating_add(incoming) > self.limit {
            self.start_generation()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append_to(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Keep file names portable: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn file_stem(app_name: &str) -> String {
    app_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
