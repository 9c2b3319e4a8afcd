//! CLI configuration.

use std::path::{Path, PathBuf};

use aq_protocol_saml::{IdpMetadata, ServiceProvider, ServiceProviderConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration, read from a TOML file.
///
/// ```toml
/// output_format = "table"
///
/// [sp]
/// entity_id = "https://sp.example.com"
/// signature_method = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
/// private_key_pem = "sp-key.pem"
/// certificate_pem = "sp-cert.pem"
///
/// [idp]
/// entity_id = "https://idp.example.com"
/// signing_certificates = ["MIIC..."]
///
/// [[idp.attribute_authority_descriptors]]
/// attribute_services = [
///     { binding = "urn:oasis:names:tc:SAML:2.0:bindings:SOAP", location = "https://idp.example.com/aa" },
/// ]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Service provider settings.
    #[serde(default)]
    pub sp: ServiceProviderConfig,

    /// Identity provider metadata.
    #[serde(default)]
    pub idp: IdpMetadata,

    /// File this configuration was read from. Relative key paths resolve
    /// against its directory.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the default
    /// configuration.
    pub fn load(path: Option<&Path>) -> crate::CliResult<Self> {
        let (config_path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };

        if !explicit && !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            crate::CliError::Config(format!("failed to read {}: {e}", config_path.display()))
        })?;
        let mut config = Self::parse(&content)?;
        config.source = Some(config_path);
        Ok(config)
    }

    /// Parses TOML configuration text.
    pub fn parse(content: &str) -> crate::CliResult<Self> {
        toml::from_str(content)
            .map_err(|e| crate::CliError::Config(format!("failed to parse config: {e}")))
    }

    /// Gets the default configuration file path.
    pub fn config_path() -> crate::CliResult<PathBuf> {
        let home = dirs_next::home_dir().ok_or_else(|| {
            crate::CliError::Config("could not determine home directory".to_string())
        })?;
        Ok(home.join(".aq").join("aq.toml"))
    }

    /// Returns the SP configuration with key and certificate files read in.
    pub fn resolved_sp(&self) -> crate::CliResult<ServiceProviderConfig> {
        let mut sp = self.sp.clone();
        sp.private_key_pem = sp
            .private_key_pem
            .as_deref()
            .map(|value| self.read_pem(value))
            .transpose()?;
        sp.certificate_pem = sp
            .certificate_pem
            .as_deref()
            .map(|value| self.read_pem(value))
            .transpose()?;
        Ok(sp)
    }

    /// Builds the service provider described by this configuration.
    pub fn service_provider(&self) -> crate::CliResult<ServiceProvider> {
        if self.idp.entity_id.is_empty() {
            return Err(crate::CliError::Config(
                "idp.entity_id is not configured".to_string(),
            ));
        }
        Ok(ServiceProvider::new(self.resolved_sp()?, self.idp.clone())?)
    }

    /// Returns `value` if it is inline PEM, otherwise the contents of the
    /// file it names.
    fn read_pem(&self, value: &str) -> crate::CliResult<String> {
        if value.trim_start().starts_with("-----BEGIN") {
            return Ok(value.to_string());
        }
        let path = match self.source.as_deref().and_then(Path::parent) {
            Some(dir) if Path::new(value).is_relative() => dir.join(value),
            _ => PathBuf::from(value),
        };
        std::fs::read_to_string(&path).map_err(|e| {
            crate::CliError::Config(format!("failed to read {}: {e}", path.display()))
        })
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// Values only, one per line.
    Quiet,
}
