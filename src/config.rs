use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt::Display, str::FromStr, time::Duration};

/// Per-file upload ceiling used when `MAX_FILE_SIZE_BYTES` is not set.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub max_file_size: u64,
    pub backend: BackendConfig,
}

/// Settings for the S3-compatible storage client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub region: String,
    /// Custom endpoint for S3-compatible deployments such as MinIO.
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub connect_timeout: Option<Duration>,
    pub operation_timeout: Option<Duration>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File storage HTTP service over an S3-compatible bucket")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Backend region (overrides S3_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Bucket holding every stored file (overrides S3_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Custom S3-compatible endpoint URL (overrides AWS_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing (overrides AWS_S3_FORCE_PATH_STYLE)
    #[arg(long)]
    pub force_path_style: bool,

    /// Maximum size of a single uploaded file in bytes (overrides MAX_FILE_SIZE_BYTES)
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Backend connect timeout in seconds (overrides S3_CONNECT_TIMEOUT_SECS)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// Backend per-operation timeout in seconds (overrides S3_OPERATION_TIMEOUT_SECS)
    #[arg(long)]
    pub operation_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge `args` over the variables returned by `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = optional_var(&lookup, "HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parsed_var(&lookup, "PORT")?.unwrap_or(8080);
        let env_region = optional_var(&lookup, "S3_REGION")?;
        let env_bucket = optional_var(&lookup, "S3_BUCKET")?;
        let env_endpoint = optional_var(&lookup, "AWS_ENDPOINT")?;
        let env_path_style = optional_var(&lookup, "AWS_S3_FORCE_PATH_STYLE")?
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        let env_max_size = parsed_var(&lookup, "MAX_FILE_SIZE_BYTES")?;
        let env_connect = parsed_var(&lookup, "S3_CONNECT_TIMEOUT_SECS")?;
        let env_operation = parsed_var(&lookup, "S3_OPERATION_TIMEOUT_SECS")?;

        let region = args.region.or(env_region).filter(|v| !v.is_empty());
        let bucket = args.bucket.or(env_bucket).filter(|v| !v.is_empty());
        let (region, bucket) = match (region, bucket) {
            (Some(region), Some(bucket)) => (region, bucket),
            _ => bail!("S3_REGION and S3_BUCKET environment variables must be set"),
        };

        let max_file_size = args
            .max_file_size
            .or(env_max_size)
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size == 0 {
            bail!("MAX_FILE_SIZE_BYTES must be greater than zero");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            bucket,
            max_file_size,
            backend: BackendConfig {
                region,
                endpoint: args.endpoint.or(env_endpoint).filter(|v| !v.is_empty()),
                force_path_style: args.force_path_style || env_path_style,
                connect_timeout: args
                    .connect_timeout_secs
                    .or(env_connect)
                    .map(Duration::from_secs),
                operation_timeout: args
                    .operation_timeout_secs
                    .or(env_operation)
                    .map(Duration::from_secs),
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional_var<F>(lookup: &F, name: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parsed_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: Display,
{
    match optional_var(lookup, name)? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("parsing {} value `{}`: {}", name, value, err)),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}
