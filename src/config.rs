use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

const MIB: u64 = 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root under which each upload gets its own scratch directory.
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_export_bytes: u64,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// `*` or explicit origins.
    pub cors_origins: Vec<String>,
    /// Key whose array of objects becomes CSV rows.
    pub csv_rows_key: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "SOF document upload and export gateway")]
pub struct Args {
    /// Host to bind to (overrides SOF_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SOF_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for per-request upload scratch space (overrides SOF_GATEWAY_SCRATCH_DIR)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Upload size ceiling in MiB (overrides SOF_GATEWAY_UPLOAD_MAX_MB)
    #[arg(long)]
    pub max_upload_mb: Option<u64>,

    /// Export request body ceiling in MiB (overrides SOF_GATEWAY_EXPORT_MAX_MB)
    #[arg(long)]
    pub max_export_mb: Option<u64>,

    /// Comma-separated accepted upload extensions (overrides SOF_GATEWAY_ALLOWED_EXTENSIONS)
    #[arg(long)]
    pub allowed_extensions: Option<String>,

    /// Comma-separated allowed CORS origins, `*` for any (overrides SOF_GATEWAY_CORS_ORIGINS)
    #[arg(long)]
    pub cors_origins: Option<String>,

    /// Record key holding CSV row objects (overrides SOF_GATEWAY_CSV_ROWS_KEY)
    #[arg(long)]
    pub csv_rows_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            scratch_dir: env::temp_dir().join("sof-gateway"),
            max_upload_bytes: 25 * MIB,
            max_export_bytes: 10 * MIB,
            allowed_extensions: parse_extensions("pdf,doc,docx,jpg,jpeg,png"),
            cors_origins: vec!["*".into()],
            csv_rows_key: "events".into(),
        }
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    /// Merge parsed CLI args over environment values over defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let defaults = Self::default();

        // --- Environment fallback ---
        let env_host = env::var("SOF_GATEWAY_HOST").ok();
        let env_port = env_number::<u16>("SOF_GATEWAY_PORT")?;
        let env_scratch = env::var("SOF_GATEWAY_SCRATCH_DIR").ok().map(PathBuf::from);
        let env_upload_mb = env_number::<u64>("SOF_GATEWAY_UPLOAD_MAX_MB")?;
        let env_export_mb = env_number::<u64>("SOF_GATEWAY_EXPORT_MAX_MB")?;
        let env_extensions = env::var("SOF_GATEWAY_ALLOWED_EXTENSIONS").ok();
        let env_origins = env::var("SOF_GATEWAY_CORS_ORIGINS").ok();
        let env_rows_key = env::var("SOF_GATEWAY_CSV_ROWS_KEY").ok();

        // --- Merge ---
        let cfg = Self {
            host: args.host.or(env_host).unwrap_or(defaults.host),
            port: args.port.or(env_port).unwrap_or(defaults.port),
            scratch_dir: args
                .scratch_dir
                .or(env_scratch)
                .unwrap_or(defaults.scratch_dir),
            max_upload_bytes: args
                .max_upload_mb
                .or(env_upload_mb)
                .map(|mb| mib_to_bytes("upload ceiling", mb))
                .transpose()?
                .unwrap_or(defaults.max_upload_bytes),
            max_export_bytes: args
                .max_export_mb
                .or(env_export_mb)
                .map(|mb| mib_to_bytes("export ceiling", mb))
                .transpose()?
                .unwrap_or(defaults.max_export_bytes),
            allowed_extensions: args
                .allowed_extensions
                .or(env_extensions)
                .map(|raw| parse_extensions(&raw))
                .unwrap_or(defaults.allowed_extensions),
            cors_origins: args
                .cors_origins
                .or(env_origins)
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.cors_origins),
            csv_rows_key: args
                .csv_rows_key
                .or(env_rows_key)
                .unwrap_or(defaults.csv_rows_key),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_number<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn mib_to_bytes(what: &str, mb: u64) -> Result<u64> {
    mb.checked_mul(MIB)
        .with_context(|| format!("{} of {} MiB does not fit in bytes", what, mb))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `".PDF, docx"` -> `["pdf", "docx"]`
fn parse_extensions(raw: &str) -> Vec<String> {
    parse_list(raw)
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
