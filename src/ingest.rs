//! Ingestion loop (C5): one tailer per configured log source. Resumes at a
//! saved byte offset, parses new bytes, updates counters at three
//! granularities, and persists the offset.

use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;

use crate::config::{FilterConfig, LogFileFormat, LogSourceConfig};
use crate::counters;
use crate::modules::Registry;
use crate::parser;
use crate::store::Store;

pub struct Tailer {
    index: usize,
    source: LogSourceConfig,
    state_dir: PathBuf,
    read_interval: Duration,
    first_tick_interval: Duration,
}

impl Tailer {
    pub fn new(index: usize, source: LogSourceConfig, state_dir: impl AsRef<Path>, read_interval_secs: u64) -> Self {
        Self {
            index,
            source,
            state_dir: state_dir.as_ref().to_path_buf(),
            read_interval: Duration::from_secs(read_interval_secs),
            first_tick_interval: Duration::from_secs(5),
        }
    }

    fn sidecar_path(&self) -> PathBuf {
        self.state_dir.join(format!("mwa.pos.{}", self.index))
    }

    fn read_offset(&self) -> u64 {
        std::fs::read_to_string(self.sidecar_path())
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    fn write_offset(&self, offset: u64) -> std::io::Result<()> {
        std::fs::write(self.sidecar_path(), offset.to_string())
    }

    fn expand_path(&self) -> String {
        let today = chrono::Local::now();
        match self.source.format {
            LogFileFormat::Date => self
                .source
                .path
                .replace("{date}", &today.format("%Y-%m-%d").to_string()),
            LogFileFormat::Timestamp => {
                let midnight = today.date_naive().and_hms_opt(0, 0, 0).unwrap();
                let local_midnight = chrono::Local
                    .from_local_datetime(&midnight)
                    .single()
                    .unwrap_or(today);
                self.source
                    .path
                    .replace("{date}", &local_midnight.timestamp().to_string())
            }
        }
    }

    /// Runs forever until `running` is cleared by the supervisor.
    pub async fn run(&self, store: Store, filters: FilterConfig, running: Arc<AtomicBool>) {
        tokio::time::sleep(self.first_tick_interval).await;
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.tick(&store, &filters).await {
                tracing::warn!("tailer[{}]: {e}", self.index);
            }
            tokio::time::sleep(self.read_interval).await;
        }
    }

    async fn tick(&self, store: &Store, filters: &FilterConfig) -> anyhow::Result<()> {
        let Some(_guard) = store.try_lock_writer().await else {
            // Contested by compaction or the summariser — skip this tick.
            return Ok(());
        };

        let path = self.expand_path();
        let mut file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("tailer[{}]: cannot open {path}: {e}", self.index);
                return Ok(());
            }
        };

        let len = file.metadata()?.len();
        let mut offset = self.read_offset();
        if len < offset {
            // Log was rotated/truncated underneath us; restart from 0.
            offset = 0;
        }
        if len == offset {
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity((len - offset) as usize);
        file.read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf);

        let mut new_apps: BTreeSet<String> = BTreeSet::new();
        for line in text.split(['\n', '\r']) {
            if line.is_empty() {
                continue;
            }
            if let Some(fact) = parser::parse_line(line, filters) {
                match counters::apply_visit(store, &fact) {
                    Ok(true) => {
                        new_apps.insert(fact.app.clone());
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!("tailer[{}]: counter update failed: {e}", self.index),
                }
            }
        }

        self.write_offset(len)?;

        for app in &new_apps {
            Registry::insert(store, &filters.exclude_mod, app)?;
        }

        Ok(())
    }
}
