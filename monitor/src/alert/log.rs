use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::AlertRecord;

#[derive(Debug, thiserror::Error)]
pub enum AlertLogError {
    #[error("failed to open alert log {0}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("failed to write alert log: {0}")]
    Write(std::io::Error),
    #[error("failed to serialize alert: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("corrupt alert log line {0}: {1}")]
    Corrupt(usize, serde_json::Error),
}

/// JSON-lines file of accepted alerts, newest last, capped at `max_entries`.
pub struct AlertLog {
    path: PathBuf,
    max_entries: usize,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
        }
    }

    /// Append `record`, dropping the oldest entries once the cap is exceeded.
    pub async fn append(&self, record: &AlertRecord) -> Result<(), AlertLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AlertLogError::Open(parent.to_path_buf(), e))?;
        }

        let existing = self.read_content().await?;
        let stored = existing.lines().filter(|l| !l.trim().is_empty()).count();
        if stored < self.max_entries {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| AlertLogError::Open(self.path.clone(), e))?;
            file.write_all(line.as_bytes())
                .await
                .map_err(AlertLogError::Write)?;
            file.flush().await.map_err(AlertLogError::Write)?;
        } else {
            let dropped = stored + 1 - self.max_entries;
            let mut content: String = existing
                .lines()
                .filter(|l| !l.trim().is_empty())
                .skip(dropped)
                .flat_map(|l| [l, "\n"])
                .collect();
            content.push_str(&line);

            let tmp = self.path.with_extension("jsonl.tmp");
            tokio::fs::write(&tmp, content)
                .await
                .map_err(AlertLogError::Write)?;
            tokio::fs::rename(&tmp, &self.path)
                .await
                .map_err(AlertLogError::Write)?;
            debug!(dropped, max_entries = self.max_entries, "alert log trimmed");
        }

        debug!(path = %self.path.display(), kind = ?record.kind, "alert appended");
        Ok(())
    }

    /// All alerts on disk, oldest first. A missing file is an empty log.
    pub async fn read_all(&self) -> Result<Vec<AlertRecord>, AlertLogError> {
        self.read_content()
            .await?
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| AlertLogError::Corrupt(i + 1, e))
            })
            .collect()
    }

    async fn read_content(&self) -> Result<String, AlertLogError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => Ok(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AlertLogError::Open(self.path.clone(), e)),
        }
    }
}
