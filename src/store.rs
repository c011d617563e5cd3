//! Durable storage for model artifacts.
//!
//! Layout under the model directory:
//!
//! ```text
//! CURRENT               name of the committed generation
//! gen-<timestamp>/      model.json, scaler.json, stats.json
//! ```
//!
//! A save writes a complete new generation and only then repoints
//! `CURRENT` with an atomic rename, so readers see either the previous
//! bundle or the new one.

use crate::error::{EngineError, Result};
use crate::model::{LinearModel, StandardScaler, TrainedModel};
use crate::trainer::{ModelBundle, TrainingStats};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_FILE: &str = "CURRENT";
const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
const GENERATION_PREFIX: &str = "gen-";
const MODEL_FILE: &str = "model.json";
const SCALER_FILE: &str = "scaler.json";
const STATS_FILE: &str = "stats.json";
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Storage for the latest trained bundle.
pub trait ModelRepo: Send + Sync {
    /// Persist all artifacts of `bundle`, or none of them.
    fn save(&self, bundle: &ModelBundle) -> Result<()>;

    /// The last committed bundle, `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<ModelBundle>>;
}

/// Persist model generations on the local filesystem.
pub struct FsModelRepo {
    root: PathBuf,
}

impl FsModelRepo {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn new_generation_dir(&self) -> Result<(String, PathBuf)> {
        fs::create_dir_all(&self.root).map_err(persistence("create model directory"))?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}{}", GENERATION_PREFIX, stamp)
            } else {
                format!("{}{}-{}", GENERATION_PREFIX, stamp, attempt)
            };
            let dir = self.root.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((name, dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(persistence("create generation directory")(e)),
            }
        }
        Err(EngineError::Persistence(format!(
            "no free generation name for {}",
            stamp
        )))
    }

    fn write_generation(&self, dir: &Path, bundle: &ModelBundle) -> Result<()> {
        write_json(&dir.join(MODEL_FILE), &bundle.model.regressor)?;
        write_json(&dir.join(SCALER_FILE), &bundle.model.scaler)?;
        write_json(&dir.join(STATS_FILE), &bundle.stats)?;
        Ok(())
    }

    fn commit(&self, generation: &str) -> Result<()> {
        let tmp = self.root.join(CURRENT_TMP_FILE);
        {
            let mut file = File::create(&tmp).map_err(persistence("write CURRENT.tmp"))?;
            file.write_all(generation.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(persistence("write CURRENT.tmp"))?;
        }
        fs::rename(&tmp, self.root.join(CURRENT_FILE)).map_err(persistence("swap CURRENT"))
    }

    fn current_generation(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(name) => {
                let name = name.trim();
                if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
                    return Err(EngineError::Persistence(format!(
                        "CURRENT points at invalid generation {:?}",
                        name
                    )));
                }
                Ok(Some(name.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence("read CURRENT")(e)),
        }
    }

    // best effort; stale generations are harmless
    fn prune(&self, keep: &str) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not list model directory for pruning");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(GENERATION_PREFIX) && name != keep {
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!(generation = %name, error = %e, "Could not remove old generation");
                }
            }
        }
    }
}

impl ModelRepo for FsModelRepo {
    fn save(&self, bundle: &ModelBundle) -> Result<()> {
        let (name, dir) = self.new_generation_dir()?;

        let written = self
            .write_generation(&dir, bundle)
            .and_then(|_| self.commit(&name));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(generation = %name, error = %cleanup, "Could not remove failed generation");
            }
            return Err(e);
        }

        info!(generation = %name, path = %self.root.display(), "Model artifacts committed");
        self.prune(&name);
        Ok(())
    }

    fn load(&self) -> Result<Option<ModelBundle>> {
        let Some(name) = self.current_generation()? else {
            debug!(path = %self.root.display(), "No committed model generation");
            return Ok(None);
        };
        let dir = self.root.join(&name);

        let regressor: LinearModel = read_json(&dir.join(MODEL_FILE))?;
        let scaler: StandardScaler = read_json(&dir.join(SCALER_FILE))?;
        let stats: TrainingStats = read_json(&dir.join(STATS_FILE))?;

        let model = TrainedModel { scaler, regressor };
        model.validate()?;
        Ok(Some(ModelBundle { model, stats }))
    }
}

fn persistence(action: &'static str) -> impl Fn(std::io::Error) -> EngineError {
    move |e| EngineError::Persistence(format!("{}: {}", action, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(persistence("create artifact"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| EngineError::Persistence(format!("{}: {}", path.display(), e)))?;
    let file = writer
        .into_inner()
        .map_err(|e| persistence("flush artifact")(e.into_error()))?;
    file.sync_all().map_err(persistence("sync artifact"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| EngineError::Persistence(format!("{}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| EngineError::Persistence(format!("{}: {}", path.display(), e)))
}
