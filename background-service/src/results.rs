use std::path::{Path, PathBuf};
use tracing::{debug, info};
use trendcaster_core::{CoreError, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Run,
    DryRun,
}

impl ResultKind {
    fn prefix(&self) -> &'static str {
        match self {
            ResultKind::Run => "run_results_",
            ResultKind::DryRun => "test_results_",
        }
    }
}

/// One JSON document per run cycle, named after the cycle's timestamp
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(summary: &RunSummary, kind: ResultKind) -> String {
        format!(
            "{}{}.json",
            kind.prefix(),
            summary.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    pub async fn save(&self, summary: &RunSummary, kind: ResultKind) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name(summary, kind));
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&path, json).await?;

        info!("Results saved to {}", path.display());
        Ok(path)
    }

    /// The newest saved summary of `kind`, if any
    pub async fn latest(&self, kind: ResultKind) -> Result<Option<RunSummary>, CoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut newest: Option<String> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(kind.prefix()) || !name.ends_with(".json") {
                continue;
            }
            if newest.as_ref().map_or(true, |current| name > *current) {
                newest = Some(name);
            }
        }

        let Some(name) = newest else {
            return Ok(None);
        };

        debug!("Loading previous results from {}", name);
        let contents = tokio::fs::read_to_string(self.dir.join(&name)).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}
