//! Camera data export: a timestamped JSON snapshot the user asks for explicitly.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::*, CameraDevice, Result};

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub timestamp: DateTime<Utc>,
    pub cameras: &'a [CameraDevice],
    pub count: usize,
}

impl<'a> ExportDocument<'a> {
    pub fn new(cameras: &'a [CameraDevice], timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            cameras,
            count: cameras.len(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("uvc-cameras-{}.json", self.timestamp.format("%Y%m%d-%H%M%S"))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).during(Action::Serializing)
    }

    /// Writes the document into `dir` and returns the path of the new file.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json()?).during(Action::Exporting)?;
        log::info!("exported {} camera(s) to {}", self.count, path.display());
        Ok(path)
    }
}

/// Exports `cameras` into `dir`, stamped with the current time.
pub fn export_cameras(cameras: &[CameraDevice], dir: &Path) -> Result<PathBuf> {
    ExportDocument::new(cameras, Utc::now()).write_to(dir)
}
