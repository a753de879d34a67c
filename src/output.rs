use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::app::{AcquisitionResult, Dataset, Provenance};
use crate::normalize::GridHandle;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary<'a> {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<&'a GridHandle>,
    pub provenance: &'a Provenance,
}

impl<'a> ResultSummary<'a> {
    pub fn new(result: &'a AcquisitionResult, max_rows: usize) -> Self {
        let provider = result.provenance.request.provider().to_string();
        match &result.data {
            Dataset::Records(records) => Self {
                provider,
                records: Some(records.len()),
                columns: records
                    .schema()
                    .columns()
                    .iter()
                    .map(|column| ColumnSummary {
                        name: column.name.clone(),
                        kind: format!("{:?}", column.kind).to_lowercase(),
                    })
                    .collect(),
                rows: records.to_json_rows().into_iter().take(max_rows).collect(),
                grid: None,
                provenance: &result.provenance,
            },
            Dataset::Grid(handle) => Self {
                provider,
                records: None,
                columns: Vec::new(),
                rows: Vec::new(),
                grid: Some(handle),
                provenance: &result.provenance,
            },
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_result(result: &AcquisitionResult, max_rows: usize) -> io::Result<()> {
        Self::print_json(&ResultSummary::new(result, max_rows))
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
