//! Certificates referenced by nginx configuration.

use async_trait::async_trait;
use certsweep_core::{CertificateRecord, Collector, CollectorConfig, Harvest, Result, SweepError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::registry::Builtin;
use crate::support::{decoded_input, finished, read_file};

/// Follows `ssl_certificate` directives in nginx config files
#[derive(Debug, Default)]
pub struct NginxCollector;

impl Builtin for NginxCollector {
    const NAME: &'static str = "nginx";
    const DESCRIPTION: &'static str = "Extract certificates from nginx configuration files";
    const REQUIRED: &'static [&'static str] = &["config_path"];
}

/// Directives found in one config file
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NginxDirectives {
    /// `ssl_certificate` arguments, in order of appearance
    pub certificates: Vec<String>,
    /// `server_name` arguments, excluding the `_` catch-all
    pub server_names: Vec<String>,
}

/// Extract `ssl_certificate` and `server_name` arguments from config text
pub fn parse_directives(text: &str) -> NginxDirectives {
    let mut found = NginxDirectives::default();
    let stripped: String = text
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in stripped.split([';', '{', '}']) {
        let mut words = statement.split_whitespace();
        let Some(directive) = words.next() else {
            continue;
        };
        let args = words.map(|w| w.trim_matches(['"', '\'']).to_string());
        match directive {
            "ssl_certificate" => found.certificates.extend(args.take(1)),
            "server_name" => found
                .server_names
                .extend(args.filter(|n| !n.is_empty() && n != "_")),
            _ => {}
        }
    }
    found
}

impl NginxCollector {
    fn config_files(root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return vec![root.to_path_buf()];
        }
        WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                let name = e.file_name().to_string_lossy();
                name.ends_with(".conf") || name.contains("nginx")
            })
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    async fn read_certificate(
        cert_path: &Path,
        server_names: &[String],
        config: &CollectorConfig,
    ) -> Result<CertificateRecord> {
        let bytes = read_file(cert_path).await?;
        let fallback = server_names.first().cloned().unwrap_or_else(|| {
            cert_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(decoded_input(&bytes)?
            .fallback(fallback)
            .tag("cert_path", cert_path.display().to_string())
            .tag("server_names", server_names.join(", "))
            .classify(config)
            .finish(Self::NAME))
    }
}

#[async_trait]
impl Collector for NginxCollector {
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

        let config_path = config.string_or("config_path", "");
        let root = Path::new(&config_path);
        if !root.exists() {
            return Err(SweepError::source(
                Self::NAME,
                "reading configuration",
                format!("nginx config path does not exist: {config_path}"),
            ));
        }

        let mut harvest = Harvest::new(Self::NAME);
        let mut seen = HashSet::new();

        for file in Self::config_files(root) {
            let text = match read_file(&file).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    harvest.skip(file.display().to_string(), e);
                    continue;
                }
            };

            let directives = parse_directives(&text);
            debug!(
                collector = Self::NAME,
                file = %file.display(),
                certificates = directives.certificates.len(),
                "parsed config file"
            );

            let base = file.parent().unwrap_or_else(|| Path::new("."));
            for cert in &directives.certificates {
                let cert_path = base.join(cert);
                if !seen.insert(cert_path.clone()) {
                    continue;
                }
                let result = Self::read_certificate(&cert_path, &directives.server_names, config).await;
                harvest.absorb(cert_path.display().to_string(), result);
            }
        }

        Ok(finished(harvest))
    }
}
