use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

use crate::error::{PipelineError, Result};

const DEFAULT_FILTER: &str = "warn,mc_lang_tts=info";

/// Пишет каждую строку лога одновременно в stderr и в файл запуска
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            // Лог-файл вспомогательный, сбой записи в него не должен ронять запуск
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Открыть (и очистить) файл лога запуска
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

pub fn init_logger(log_file: Option<&Path>) -> Result<()> {
    let file = match log_file {
        Some(path) => Some(open_log_file(path)?),
        None => None,
    };

    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);
    let mut builder = Builder::from_env(env);

    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Error)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })));

    builder
        .try_init()
        .map_err(|e| PipelineError::Other(format!("Failed to initialize logger: {}", e)))
}

/// Заголовок лога запуска
pub fn log_run_banner(label: &str, run_id: &str) {
    let line = "=".repeat(60);
    log::info!("{}", line);
    log::info!("Minecraft audio run started");
    log::info!("Version: {}", label);
    log::info!("Run id: {}", run_id);
    log::info!(
        "Timestamp: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    log::info!("{}", line);
}
