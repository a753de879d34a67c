use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate};
use reqwest::Url;
use serde::Serialize;

use crate::config::Endpoints;
use crate::domain::{AcquisitionRequest, Provider, parse_iso_date, validate_coordinates};
use crate::error::AcquireError;
use crate::records::format_modis_calendar;

pub const CRU_VARIABLES: [&str; 10] = [
    "cld", "dtr", "frs", "pet", "pre", "tmn", "tmp", "tmx", "vap", "wet",
];

pub const CRU_RELEASES: [(&str, &str, i64); 3] = [
    ("4.08", "cruts.2406270035.v4.08", 2023),
    ("4.07", "cruts.2304141047.v4.07", 2022),
    ("4.06", "cruts.2205201912.v4.06", 2021),
];

pub const CRU_FIRST_YEAR: i64 = 1901;
pub const DEFAULT_CRU_VERSION: &str = "4.08";

pub const DEFAULT_GBIF_LIMIT: i64 = 10_000;
pub const GBIF_MAX_RECORDS: i64 = 100_000;

pub const DEFAULT_MODIS_PRODUCT: &str = "MOD13Q1";
pub const DEFAULT_MODIS_BAND: &str = "250m_16_days_EVI";
pub const MODIS_FIRST_DATE: &str = "2000-02-18";
pub const MODIS_KM_WINDOW: u32 = 1;
// At most ten 16-day composites per call. Composites restart on 1 January.
pub const MODIS_CHUNK_DAYS: i64 = 160;
const MODIS_SITE_PRECISION: f64 = 10_000.0;

pub const FAO_FIRST_YEAR: i64 = 1961;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedQuery {
    Url { url: String },
    GbifSearch(GbifSearch),
    ModisSubset(ModisSubset),
    LocalFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GbifSearch {
    pub endpoint: String,
    pub scientific_name: String,
    pub country: Option<String>,
    pub has_coordinate: bool,
    pub has_geospatial_issue: bool,
    pub limit: u32,
    pub page_size: u32,
}

impl GbifSearch {
    pub fn page_url(&self, offset: u32) -> Result<Option<String>, AcquireError> {
        if offset >= self.limit {
            return Ok(None);
        }
        let page = self.page_size.min(self.limit - offset);
        let mut params = vec![
            ("scientificName", self.scientific_name.clone()),
            ("hasCoordinate", self.has_coordinate.to_string()),
            ("hasGeospatialIssue", self.has_geospatial_issue.to_string()),
            ("limit", page.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("country", country.clone()));
        }
        let url = Url::parse_with_params(&self.endpoint, &params)
            .map_err(|err| AcquireError::InvalidRequest(format!("{}: {err}", self.endpoint)))?;
        Ok(Some(url.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModisSubset {
    pub endpoint: String,
    pub product: String,
    pub band: String,
    pub latitude: f64,
    pub longitude: f64,
    pub site_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub km_above_below: u32,
    pub km_left_right: u32,
}

impl ModisSubset {
    pub fn chunks(&self) -> Vec<(NaiveDate, NaiveDate)> {
        let mut windows = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let year_end = NaiveDate::from_ymd_opt(cursor.year(), 12, 31).unwrap_or(self.end);
            let last = (cursor + Duration::days(MODIS_CHUNK_DAYS - 1))
                .min(year_end)
                .min(self.end);
            windows.push((cursor, last));
            cursor = last + Duration::days(1);
        }
        windows
    }

    pub fn chunk_url(&self, start: NaiveDate, end: NaiveDate) -> Result<String, AcquireError> {
        let params = [
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("band", self.band.clone()),
            ("startDate", format_modis_calendar(start)),
            ("endDate", format_modis_calendar(end)),
            ("kmAboveBelow", self.km_above_below.to_string()),
            ("kmLeftRight", self.km_left_right.to_string()),
        ];
        Url::parse_with_params(&self.endpoint, &params)
            .map(|url| url.to_string())
            .map_err(|err| AcquireError::InvalidRequest(format!("{}: {err}", self.endpoint)))
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    endpoints: Endpoints,
    gbif_page_size: u32,
    today: NaiveDate,
}

impl QueryBuilder {
    pub fn new(endpoints: Endpoints, gbif_page_size: u32, today: NaiveDate) -> Self {
        Self {
            endpoints,
            gbif_page_size: gbif_page_size.max(1),
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn build(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        for key in request.provider().required_keys() {
            if request.get(key).is_none() {
                return Err(AcquireError::InvalidRequest(format!(
                    "{} requires parameter `{key}`",
                    request.provider()
                )));
            }
        }
        match request.provider() {
            Provider::Cru => self.build_cru(request),
            Provider::Gbif => self.build_gbif(request),
            Provider::Modis => self.build_modis(request),
            Provider::Fao => self.build_fao(request),
            Provider::Effis => self.build_effis(request),
        }
    }

    fn build_cru(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        let variable = request.require_text("variable")?;
        if !CRU_VARIABLES.contains(&variable) {
            return Err(AcquireError::InvalidRequest(format!(
                "unknown CRU variable `{variable}` (expected one of {})",
                CRU_VARIABLES.join(", ")
            )));
        }
        let version = request
            .rendered("version")
            .unwrap_or_else(|| DEFAULT_CRU_VERSION.to_string());
        let version = version.as_str();
        let (_, stamp, last_year) = CRU_RELEASES
            .iter()
            .find(|(release, _, _)| *release == version)
            .ok_or_else(|| {
                AcquireError::InvalidRequest(format!("unknown CRU TS version `{version}`"))
            })?;
        let start = request.integer("start_year")?.unwrap_or(CRU_FIRST_YEAR);
        let end = request.integer("end_year")?.unwrap_or(*last_year);
        check_year_span(start, end, CRU_FIRST_YEAR, *last_year)?;

        let base = self.endpoints.cru_base.trim_end_matches('/');
        let url = format!(
            "{base}/cru_ts_{version}/{stamp}/{variable}/cru_ts{version}.{start}.{end}.{variable}.dat.nc.gz"
        );
        Ok(ResolvedQuery::Url { url })
    }

    fn build_gbif(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        let scientific_name = request.require_text("scientificName")?.trim().to_string();
        if scientific_name.is_empty() {
            return Err(AcquireError::InvalidRequest(
                "`scientificName` must not be empty".to_string(),
            ));
        }
        let country = match request.text("country")? {
            Some(code) => Some(normalize_country(code)?),
            None => None,
        };
        let limit = request.integer("limit")?.unwrap_or(DEFAULT_GBIF_LIMIT);
        if !(1..=GBIF_MAX_RECORDS).contains(&limit) {
            return Err(AcquireError::InvalidRequest(format!(
                "`limit` must be within 1..={GBIF_MAX_RECORDS}, got {limit}"
            )));
        }
        Ok(ResolvedQuery::GbifSearch(GbifSearch {
            endpoint: format!(
                "{}/occurrence/search",
                self.endpoints.gbif_base.trim_end_matches('/')
            ),
            scientific_name,
            country,
            has_coordinate: true,
            has_geospatial_issue: false,
            limit: limit as u32,
            page_size: self.gbif_page_size,
        }))
    }

    fn build_modis(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        let latitude = request.require_number("lat")?;
        let longitude = request.require_number("lon")?;
        validate_coordinates(latitude, longitude)?;
        let latitude = round_site(latitude);
        let longitude = round_site(longitude);

        let product = request.text("product")?.unwrap_or(DEFAULT_MODIS_PRODUCT);
        let band = request.text("band")?.unwrap_or(DEFAULT_MODIS_BAND);
        let start = match request.date("start_date")? {
            Some(start) => start,
            None => parse_iso_date("start_date", MODIS_FIRST_DATE)?,
        };
        let end = request.date("end_date")?.unwrap_or(self.today);
        if start > end {
            return Err(AcquireError::InvalidRequest(format!(
                "`start_date` {start} is after `end_date` {end}"
            )));
        }
        let site_id = match request.text("site_name")? {
            Some(name) => name.to_string(),
            None => format!("site_{latitude:.4}_{longitude:.4}"),
        };

        Ok(ResolvedQuery::ModisSubset(ModisSubset {
            endpoint: format!(
                "{}/{product}/subset",
                self.endpoints.modis_base.trim_end_matches('/')
            ),
            product: product.to_string(),
            band: band.to_string(),
            latitude,
            longitude,
            site_id,
            start,
            end,
            km_above_below: MODIS_KM_WINDOW,
            km_left_right: MODIS_KM_WINDOW,
        }))
    }

    fn build_fao(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        let start = request.integer("start_year")?.unwrap_or(FAO_FIRST_YEAR);
        let end = request
            .integer("end_year")?
            .unwrap_or(self.today.year() as i64);
        check_year_span(start, end, FAO_FIRST_YEAR, self.today.year() as i64)?;
        for key in ["reporter", "partner", "item", "element"] {
            request.text(key)?;
        }
        Ok(ResolvedQuery::Url {
            url: self.endpoints.fao_bulk_url.clone(),
        })
    }

    fn build_effis(&self, request: &AcquisitionRequest) -> Result<ResolvedQuery, AcquireError> {
        let path = request.require_text("shapefilePath")?;
        let start = request.date("start_date")?;
        let end = request.date("end_date")?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AcquireError::InvalidRequest(format!(
                    "`start_date` {start} is after `end_date` {end}"
                )));
            }
        }
        if let Some(min_area) = request.number("min_area")? {
            if min_area < 0.0 {
                return Err(AcquireError::InvalidRequest(format!(
                    "`min_area` must not be negative, got {min_area}"
                )));
            }
        }
        if let Some(country) = request.text("country")? {
            normalize_country(country)?;
        }
        Ok(ResolvedQuery::LocalFile {
            path: PathBuf::from(path),
        })
    }
}

pub fn round_site(value: f64) -> f64 {
    (value * MODIS_SITE_PRECISION).round() / MODIS_SITE_PRECISION
}

fn normalize_country(code: &str) -> Result<String, AcquireError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(AcquireError::InvalidRequest(format!(
            "`country` must be an ISO 3166-1 alpha-2 code, got `{code}`"
        )));
    }
    Ok(code)
}

fn check_year_span(start: i64, end: i64, first: i64, last: i64) -> Result<(), AcquireError> {
    if start > end {
        return Err(AcquireError::InvalidRequest(format!(
            "`start_year` {start} is after `end_year` {end}"
        )));
    }
    if start < first || end > last {
        return Err(AcquireError::InvalidRequest(format!(
            "year span {start}..{end} outside available {first}..{last}"
        )));
    }
    Ok(())
}
