use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::Settings;
use crate::domain::{AcquisitionRequest, Parameters, Provider};
use crate::error::AcquireError;
use crate::features::{FeatureReader, ShapefileReader};
use crate::filter::{FilterChain, FilterSpec, StageCount};
use crate::grid::{DefaultGridReader, GridReader};
use crate::normalize::GridHandle;
use crate::providers;
use crate::query::{QueryBuilder, ResolvedQuery};
use crate::records::{Normalized, RecordSet};
use crate::transport::{ExtractionNote, HttpTransport, RawPayload, Transport};

#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub request: AcquisitionRequest,
    pub query: ResolvedQuery,
    pub sources: Vec<String>,
    pub bytes_fetched: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    pub extractions: Vec<ExtractionNote>,
    pub normalized_records: usize,
    pub stages: Vec<StageCount>,
    pub coercion_failures: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Dataset {
    Records(RecordSet),
    Grid(GridHandle),
}

#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionResult {
    pub data: Dataset,
    pub provenance: Provenance,
}

impl AcquisitionResult {
    pub fn records(&self) -> Option<&RecordSet> {
        match &self.data {
            Dataset::Records(records) => Some(records),
            Dataset::Grid(_) => None,
        }
    }

    pub fn grid(&self) -> Option<&GridHandle> {
        match &self.data {
            Dataset::Grid(handle) => Some(handle),
            Dataset::Records(_) => None,
        }
    }

    pub fn into_records(self) -> Option<RecordSet> {
        match self.data {
            Dataset::Records(records) => Some(records),
            Dataset::Grid(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Trace {
    pub sources: Vec<String>,
    pub bytes_fetched: u64,
    pub download_dir: Option<PathBuf>,
    pub extractions: Vec<ExtractionNote>,
}

impl Trace {
    pub fn fetched(&mut self, payload: &RawPayload) {
        self.sources.push(payload.origin.clone());
        self.bytes_fetched += payload.byte_len;
    }

    pub fn read_local(&mut self, origin: String, byte_len: u64) {
        self.sources.push(origin);
        self.bytes_fetched += byte_len;
    }

    pub fn provenance(
        self,
        request: AcquisitionRequest,
        query: ResolvedQuery,
        normalized_records: usize,
    ) -> Provenance {
        Provenance {
            request,
            query,
            sources: self.sources,
            bytes_fetched: self.bytes_fetched,
            download_dir: self.download_dir,
            extractions: self.extractions,
            normalized_records,
            stages: Vec::new(),
            coercion_failures: BTreeMap::new(),
        }
    }

    pub fn finish_records(
        self,
        request: AcquisitionRequest,
        query: ResolvedQuery,
        normalized: Normalized,
        chain: FilterChain,
    ) -> Result<AcquisitionResult, AcquireError> {
        let Normalized {
            records,
            coercion_failures,
        } = normalized;
        let normalized_records = records.len();
        tracing::info!(
            provider = %request.provider(),
            records = normalized_records,
            stages = chain.specs().len(),
            "normalized"
        );
        let filtered = chain.apply(records)?;
        let mut provenance = self.provenance(request, query, normalized_records);
        provenance.stages = filtered.stages;
        provenance.coercion_failures = coercion_failures;
        Ok(AcquisitionResult {
            data: Dataset::Records(filtered.records),
            provenance,
        })
    }
}

pub struct Context<'a> {
    pub transport: &'a dyn Transport,
    pub grids: &'a dyn GridReader,
    pub features: &'a dyn FeatureReader,
    pub settings: &'a Settings,
    pub queries: QueryBuilder,
}

impl Context<'_> {
    // Without a configured directory a fresh one is created and left in place;
    // its path is reported in the provenance.
    pub fn download_dir(&self) -> Result<PathBuf, AcquireError> {
        if let Some(dir) = &self.settings.download_dir {
            std::fs::create_dir_all(dir)
                .map_err(|err| AcquireError::Filesystem(format!("{}: {err}", dir.display())))?;
            return Ok(dir.clone());
        }
        let dir = tempfile::Builder::new()
            .prefix("enviro-acq-")
            .tempdir()
            .map_err(|err| AcquireError::Filesystem(err.to_string()))?;
        Ok(dir.keep())
    }
}

pub struct Acquirer<T: Transport, G: GridReader, F: FeatureReader> {
    transport: T,
    grids: G,
    features: F,
    settings: Settings,
}

impl Acquirer<HttpTransport, DefaultGridReader, ShapefileReader> {
    pub fn http(settings: Settings) -> Result<Self, AcquireError> {
        let transport = HttpTransport::new(Duration::from_secs(settings.timeout_secs))?;
        Ok(Self::new(
            transport,
            DefaultGridReader::default(),
            ShapefileReader,
            settings,
        ))
    }
}

impl<T: Transport, G: GridReader, F: FeatureReader> Acquirer<T, G, F> {
    pub fn new(transport: T, grids: G, features: F, settings: Settings) -> Self {
        Self {
            transport,
            grids,
            features,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(
            self.settings.endpoints.clone(),
            self.settings.gbif_page_size,
            self.settings.today(),
        )
    }

    pub fn acquire(
        &self,
        provider: Provider,
        parameters: Parameters,
    ) -> Result<AcquisitionResult, AcquireError> {
        self.acquire_with_filters(provider, parameters, Vec::new())
    }

    pub fn acquire_with_filters(
        &self,
        provider: Provider,
        parameters: Parameters,
        extra: Vec<FilterSpec>,
    ) -> Result<AcquisitionResult, AcquireError> {
        let request = AcquisitionRequest::new(provider, parameters)?;
        self.acquire_request(&request, extra)
    }

    pub fn acquire_request(
        &self,
        request: &AcquisitionRequest,
        extra: Vec<FilterSpec>,
    ) -> Result<AcquisitionResult, AcquireError> {
        let ctx = Context {
            transport: &self.transport,
            grids: &self.grids,
            features: &self.features,
            settings: &self.settings,
            queries: self.query_builder(),
        };
        tracing::info!(provider = %request.provider(), "acquisition started");
        match request.provider() {
            Provider::Cru => providers::cru::acquire(&ctx, request, extra),
            Provider::Gbif => providers::gbif::acquire(&ctx, request, extra),
            Provider::Modis => providers::modis::acquire(&ctx, request, extra),
            Provider::Fao => providers::fao::acquire(&ctx, request, extra),
            Provider::Effis => providers::effis::acquire(&ctx, request, extra),
        }
    }
}
