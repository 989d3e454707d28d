use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use poi::PoiParams;
use smt::CheckpointScheme;

#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub params: PoiParams,
    /// File to commit to; random data is generated when unset.
    pub input_file: Option<PathBuf>,
    pub random_bytes: usize,
    pub scheme: CheckpointScheme,
    pub work_dir: PathBuf,
    pub seed: Option<u64>,
    pub witness_out: Option<PathBuf>,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self> {
        let params = match std::env::var("POI_PARAMS_FILE") {
            Ok(path) => PoiParams::from_json_file(&path)
                .with_context(|| format!("Failed to load protocol parameters from {path}"))?,
            Err(_) => PoiParams::default(),
        };

        let input_file = std::env::var("POI_INPUT_FILE").ok().map(PathBuf::from);
        let random_bytes = parse_or("POI_RANDOM_BYTES", 200_000usize)?;

        let scheme: CheckpointScheme = std::env::var("POI_CHECKPOINT_SCHEME")
            .unwrap_or_else(|_| "balanced".to_string())
            .parse()
            .context("POI_CHECKPOINT_SCHEME must be a preset name or a level list")?;
        scheme
            .validate(params.depth)
            .with_context(|| format!("scheme {scheme} does not fit depth {}", params.depth))?;

        let work_dir = std::env::var("POI_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("poi-demo"));

        let seed = match std::env::var("POI_SEED") {
            Ok(v) => Some(v.parse().with_context(|| format!("POI_SEED is not a u64: {v}"))?),
            Err(_) => None,
        };
        let witness_out = std::env::var("POI_WITNESS_OUT").ok().map(PathBuf::from);

        if input_file.is_none() && random_bytes == 0 {
            bail!("POI_RANDOM_BYTES must be positive when POI_INPUT_FILE is unset");
        }

        Ok(Self {
            params,
            input_file,
            random_bytes,
            scheme,
            work_dir,
            seed,
            witness_out,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("Invalid value for {key}: {v}")),
        Err(_) => Ok(default),
    }
}
