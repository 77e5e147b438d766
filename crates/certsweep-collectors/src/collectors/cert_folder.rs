//! Certificate files in local directories.

use async_trait::async_trait;
use certsweep_core::{CertificateRecord, Collector, CollectorConfig, Harvest, Result, SweepError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::registry::Builtin;
use crate::support::{decoded_input, finished, read_file};

/// Extensions scanned when `extensions` is not configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[".pem", ".crt", ".cer", ".cert", ".der"];

/// Scans directories for PEM or DER certificate files
#[derive(Debug, Default)]
pub struct CertFolderCollector;

impl Builtin for CertFolderCollector {
    const NAME: &'static str = "cert-folder";
    const DESCRIPTION: &'static str = "Parse certificate files from directories";
    const REQUIRED: &'static [&'static str] = &["folders"];
}

impl CertFolderCollector {
    fn extensions(config: &CollectorConfig) -> Vec<String> {
        let configured = config.string_list("extensions");
        let list = if configured.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect()
        } else {
            configured
        };
        list.into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }

    fn candidate_files(folder: &Path, recursive: bool, extensions: &[String]) -> Vec<PathBuf> {
        let walker = WalkDir::new(folder)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .follow_links(true)
            .sort_by_file_name();

        walker
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
            })
            .collect()
    }

    async fn read_record(path: &Path, config: &CollectorConfig) -> Result<CertificateRecord> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = read_file(path).await?;
        Ok(decoded_input(&bytes)?
            .fallback(stem)
            .tag("file_path", path.display().to_string())
            .tag("file_name", file_name)
            .classify(config)
            .finish(Self::NAME))
    }
}

#[async_trait]
impl Collector for CertFolderCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn required_parameters(&self) -> &'static [&'static str] {
        Self::REQUIRED
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        let folders = config.string_list("folders");
        let recursive = config.bool("recursive").unwrap_or(false);
        let extensions = Self::extensions(config);
        let mut harvest = Harvest::new(Self::NAME);
        let mut missing = 0;

        for folder in &folders {
            let root = Path::new(folder);
            if !root.is_dir() {
                missing += 1;
                harvest.skip(folder.as_str(), "folder does not exist");
                continue;
            }

            let files = Self::candidate_files(root, recursive, &extensions);
            debug!(collector = Self::NAME, folder = %folder, files = files.len(), "scanning folder");

            for path in files {
                let result = Self::read_record(&path, config).await;
                harvest.absorb(path.display().to_string(), result);
            }
        }

        if missing == folders.len() {
            return Err(SweepError::source(
                Self::NAME,
                "scanning folders",
                format!("none of the configured folders exist: {}", folders.join(", ")),
            ));
        }

        Ok(finished(harvest))
    }
}
