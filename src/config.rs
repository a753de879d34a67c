use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AcquireError;

pub const DEFAULT_CONFIG_FILE: &str = "enviro-acq.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Endpoints {
    #[serde(default = "default_cru_base")]
    pub cru_base: String,
    #[serde(default = "default_gbif_base")]
    pub gbif_base: String,
    #[serde(default = "default_modis_base")]
    pub modis_base: String,
    #[serde(default = "default_fao_bulk_url")]
    pub fao_bulk_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cru_base: default_cru_base(),
            gbif_base: default_gbif_base(),
            modis_base: default_modis_base(),
            fao_bulk_url: default_fao_bulk_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gbif_page_size")]
    pub gbif_page_size: u32,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            download_dir: None,
            timeout_secs: default_timeout_secs(),
            gbif_page_size: default_gbif_page_size(),
            today: None,
        }
    }
}

impl Settings {
    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Settings, AcquireError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| AcquireError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Settings, AcquireError> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|err| AcquireError::ConfigParse(err.to_string()))?;
        if settings.gbif_page_size == 0 {
            return Err(AcquireError::ConfigParse(
                "gbif_page_size must be positive".to_string(),
            ));
        }
        Ok(settings)
    }
}

fn default_cru_base() -> String {
    "https://crudata.uea.ac.uk/cru/data/hrg".to_string()
}

fn default_gbif_base() -> String {
    "https://api.gbif.org/v1".to_string()
}

fn default_modis_base() -> String {
    "https://modis.ornl.gov/rst/api/v1".to_string()
}

fn default_fao_bulk_url() -> String {
    "https://bulks-faostat.fao.org/production/Forestry_Trade_Flows_E_All_Data_(Normalized).zip"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_gbif_page_size() -> u32 {
    300
}
