use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AcquireError;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Cru,
    Gbif,
    Modis,
    Fao,
    Effis,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Cru,
        Provider::Gbif,
        Provider::Modis,
        Provider::Fao,
        Provider::Effis,
    ];

    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::Cru => &["variable"],
            Provider::Gbif => &["scientificName"],
            Provider::Modis => &["lat", "lon"],
            Provider::Fao => &[],
            Provider::Effis => &["shapefilePath"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Cru => write!(f, "cru"),
            Provider::Gbif => write!(f, "gbif"),
            Provider::Modis => write!(f, "modis"),
            Provider::Fao => write!(f, "fao"),
            Provider::Effis => write!(f, "effis"),
        }
    }
}

impl FromStr for Provider {
    type Err = AcquireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cru" => Ok(Provider::Cru),
            "gbif" => Ok(Provider::Gbif),
            "modis" => Ok(Provider::Modis),
            "fao" => Ok(Provider::Fao),
            "effis" => Ok(Provider::Effis),
            _ => Err(AcquireError::InvalidRequest(format!(
                "unknown provider: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn parse_cli(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "true" => return ParamValue::Flag(true),
            "false" => return ParamValue::Flag(false),
            _ => {}
        }
        if let Ok(value) = raw.parse::<i64>() {
            return ParamValue::Integer(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            return ParamValue::Number(value);
        }
        if raw.contains(',') {
            return ParamValue::List(
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            );
        }
        ParamValue::Text(raw.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Flag(value) => write!(f, "{value}"),
            ParamValue::Integer(value) => write!(f, "{value}"),
            ParamValue::Number(value) => write!(f, "{value}"),
            ParamValue::Text(value) => write!(f, "{value}"),
            ParamValue::List(values) => write!(f, "{}", values.join(",")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::List(value.into_iter().map(str::to_string).collect())
    }
}

pub type Parameters = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionRequest {
    provider: Provider,
    parameters: Parameters,
}

impl AcquisitionRequest {
    pub fn new(provider: Provider, parameters: Parameters) -> Result<Self, AcquireError> {
        for key in provider.required_keys() {
            if !parameters.contains_key(*key) {
                return Err(AcquireError::InvalidRequest(format!(
                    "{provider} requires parameter `{key}`"
                )));
            }
        }
        Ok(Self {
            provider,
            parameters,
        })
    }

    pub fn builder(provider: Provider) -> RequestBuilder {
        RequestBuilder {
            provider,
            parameters: Parameters::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    pub fn with_defaults<I, K>(&self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let mut parameters = self.parameters.clone();
        for (key, value) in defaults {
            parameters.entry(key.into()).or_insert(value);
        }
        Self {
            provider: self.provider,
            parameters,
        }
    }

    pub fn text(&self, key: &str) -> Result<Option<&str>, AcquireError> {
        match self.parameters.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(type_mismatch(key, "text", other)),
        }
    }

    pub fn rendered(&self, key: &str) -> Option<String> {
        self.parameters.get(key).map(ParamValue::to_string)
    }

    pub fn require_text(&self, key: &str) -> Result<&str, AcquireError> {
        self.text(key)?.ok_or_else(|| missing(self.provider, key))
    }

    pub fn integer(&self, key: &str) -> Result<Option<i64>, AcquireError> {
        match self.parameters.get(key) {
            None => Ok(None),
            Some(ParamValue::Integer(value)) => Ok(Some(*value)),
            Some(ParamValue::Number(value)) if value.fract() == 0.0 => Ok(Some(*value as i64)),
            Some(ParamValue::Text(value)) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| type_mismatch(key, "integer", &ParamValue::Text(value.clone()))),
            Some(other) => Err(type_mismatch(key, "integer", other)),
        }
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>, AcquireError> {
        match self.parameters.get(key) {
            None => Ok(None),
            Some(ParamValue::Number(value)) => Ok(Some(*value)),
            Some(ParamValue::Integer(value)) => Ok(Some(*value as f64)),
            Some(ParamValue::Text(value)) => value
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| type_mismatch(key, "number", &ParamValue::Text(value.clone()))),
            Some(other) => Err(type_mismatch(key, "number", other)),
        }
    }

    pub fn require_number(&self, key: &str) -> Result<f64, AcquireError> {
        self.number(key)?.ok_or_else(|| missing(self.provider, key))
    }

    pub fn flag(&self, key: &str) -> Result<Option<bool>, AcquireError> {
        match self.parameters.get(key) {
            None => Ok(None),
            Some(ParamValue::Flag(value)) => Ok(Some(*value)),
            Some(other) => Err(type_mismatch(key, "flag", other)),
        }
    }

    pub fn list(&self, key: &str) -> Result<Option<Vec<String>>, AcquireError> {
        match self.parameters.get(key) {
            None => Ok(None),
            Some(ParamValue::List(values)) => Ok(Some(values.clone())),
            Some(ParamValue::Text(value)) => Ok(Some(
                value
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            )),
            Some(other) => Err(type_mismatch(key, "list", other)),
        }
    }

    pub fn date(&self, key: &str) -> Result<Option<NaiveDate>, AcquireError> {
        match self.text(key)? {
            None => Ok(None),
            Some(raw) => parse_iso_date(key, raw).map(Some),
        }
    }
}

pub struct RequestBuilder {
    provider: Provider,
    parameters: Parameters,
}

impl RequestBuilder {
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<AcquisitionRequest, AcquireError> {
        AcquisitionRequest::new(self.provider, self.parameters)
    }
}

pub fn parse_iso_date(key: &str, raw: &str) -> Result<NaiveDate, AcquireError> {
    let raw = raw.trim();
    if !ISO_DATE.is_match(raw) {
        return Err(AcquireError::InvalidRequest(format!(
            "`{key}` is not an ISO-8601 date (YYYY-MM-DD): {raw}"
        )));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AcquireError::InvalidRequest(format!("`{key}` is not a valid calendar date: {raw}"))
    })
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), AcquireError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(AcquireError::InvalidRequest(format!(
            "latitude {latitude} outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(AcquireError::InvalidRequest(format!(
            "longitude {longitude} outside [-180, 180]"
        )));
    }
    Ok(())
}

fn missing(provider: Provider, key: &str) -> AcquireError {
    AcquireError::InvalidRequest(format!("{provider} requires parameter `{key}`"))
}

fn type_mismatch(key: &str, expected: &str, found: &ParamValue) -> AcquireError {
    AcquireError::InvalidRequest(format!("`{key}` must be {expected}, got `{found}`"))
}
