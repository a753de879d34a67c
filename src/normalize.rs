use std::io::Read;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::AcquireError;
use crate::features::{FeatureTable, GEOMETRY_COLUMN};
use crate::grid::GridHeader;
use crate::records::{Column, DateLayout, Normalized, RawCell, RecordSetBuilder, Schema};
use crate::transport::RawPayload;

pub const MODIS_RESCALE_THRESHOLD: f64 = 1000.0;
pub const MODIS_SCALE: f64 = 10_000.0;

pub const EFFIS_LAND_COVER: [&str; 5] = ["BROADLEA", "CONIFER", "MIXED", "SCLEROPH", "TRANSIT"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridHandle {
    pub variable: String,
    pub shape: Vec<(String, u64)>,
    pub time_steps: u64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub units: Option<String>,
    pub header: GridHeader,
}

pub fn normalize_cru(
    header: GridHeader,
    variable: &str,
    start_year: i32,
    end_year: i32,
) -> Result<GridHandle, AcquireError> {
    let var = header.variable(variable).ok_or_else(|| {
        AcquireError::Decode(format!(
            "{} has no variable `{variable}`",
            header.path.display()
        ))
    })?;
    let shape = var
        .dimensions
        .iter()
        .map(|name| {
            let length = header.dimension(name).map(|dim| dim.length).unwrap_or(0);
            (name.clone(), length)
        })
        .collect::<Vec<_>>();
    let time_steps = header.dimension("time").map(|dim| dim.length).unwrap_or(0);
    if time_steps == 0 || shape.iter().any(|(_, length)| *length == 0) {
        return Err(AcquireError::EmptyDataset(header.path.display().to_string()));
    }
    let start = NaiveDate::from_ymd_opt(start_year, 1, 1).ok_or_else(|| {
        AcquireError::InvalidRequest(format!("invalid start year {start_year}"))
    })?;
    let end = NaiveDate::from_ymd_opt(end_year, 12, 31)
        .ok_or_else(|| AcquireError::InvalidRequest(format!("invalid end year {end_year}")))?;
    let units = var.attributes.get("units").cloned();

    Ok(GridHandle {
        variable: variable.to_string(),
        shape,
        time_steps,
        start,
        end,
        units,
        header,
    })
}

pub fn gbif_schema() -> Schema {
    Schema::new(vec![
        Column::categorical("key"),
        Column::categorical("scientificName"),
        Column::numeric("decimalLatitude"),
        Column::numeric("decimalLongitude"),
        Column::categorical("countryCode"),
        Column::categorical("basisOfRecord"),
        Column::categorical("habitat"),
        Column::date("eventDate", DateLayout::Iso),
    ])
}

#[derive(Debug, Clone)]
pub struct GbifPage {
    pub results: Vec<JsonValue>,
    pub end_of_records: bool,
    pub count: Option<u64>,
}

pub fn parse_gbif_page(payload: &RawPayload) -> Result<GbifPage, AcquireError> {
    let bytes = payload.bytes()?;
    let raw: JsonValue = serde_json::from_slice(&bytes)
        .map_err(|err| AcquireError::EmptyDataset(format!("{}: {err}", payload.origin)))?;
    let results = raw
        .get("results")
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| {
            AcquireError::EmptyDataset(format!("{}: response has no `results` array", payload.origin))
        })?;
    let end_of_records = raw
        .get("endOfRecords")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let count = raw.get("count").and_then(|v| v.as_u64());
    Ok(GbifPage {
        results,
        end_of_records,
        count,
    })
}

pub fn normalize_gbif(records: &[JsonValue], source: &str) -> Result<Normalized, AcquireError> {
    let mut builder = RecordSetBuilder::new(gbif_schema());
    for record in records {
        builder.push_with(|column| RawCell::from_json(record.get(&column.name)));
    }
    builder.finish(source)
}

pub fn modis_schema() -> Schema {
    Schema::new(vec![
        Column::categorical("site").synthesized(),
        Column::date("date", DateLayout::ModisCalendar),
        Column::categorical("band").synthesized(),
        Column::numeric("pixel").synthesized(),
        Column::numeric("value"),
    ])
}

pub fn rescale_modis(value: f64) -> f64 {
    if value.abs() > MODIS_RESCALE_THRESHOLD {
        value / MODIS_SCALE
    } else {
        value
    }
}

pub fn normalize_modis(payloads: &[RawPayload], site_id: &str) -> Result<Normalized, AcquireError> {
    let mut builder = RecordSetBuilder::new(modis_schema());
    for payload in payloads {
        let bytes = payload.bytes()?;
        let raw: JsonValue = serde_json::from_slice(&bytes)
            .map_err(|err| AcquireError::EmptyDataset(format!("{}: {err}", payload.origin)))?;
        let subsets = raw
            .get("subset")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AcquireError::EmptyDataset(format!("{}: response has no `subset` array", payload.origin))
            })?;
        let default_band = raw.get("band");
        for entry in subsets {
            let date = entry.get("modis_date").or_else(|| entry.get("calendar_date"));
            let band = entry.get("band").or(default_band);
            let pixels = entry
                .get("data")
                .and_then(|v| v.as_array())
                .map(|values| values.as_slice())
                .unwrap_or(&[]);
            for (index, pixel) in pixels.iter().enumerate() {
                builder.push_with(|column| match column.name.as_str() {
                    "site" => RawCell::Text(site_id.to_string()),
                    "date" => RawCell::from_json(date),
                    "band" => RawCell::from_json(band),
                    "pixel" => RawCell::Number(index as f64),
                    "value" => RawCell::from_json(Some(pixel)),
                    _ => RawCell::Absent,
                });
            }
        }
    }
    builder.map_numeric("value", rescale_modis);
    let source = payloads
        .first()
        .map(|payload| payload.origin.as_str())
        .unwrap_or("modis subset");
    builder.finish(source)
}

pub fn fao_column(name: &str) -> Column {
    if name == "Year" || name == "Value" || name.ends_with(" Code") {
        Column::numeric(name)
    } else {
        Column::categorical(name)
    }
}

pub fn normalize_fao(payload: &RawPayload) -> Result<Normalized, AcquireError> {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true);
    match payload.path() {
        Some(path) => {
            let reader = builder
                .from_path(path)
                .map_err(|err| AcquireError::Filesystem(format!("{}: {err}", path.display())))?;
            read_fao_table(reader, &payload.origin)
        }
        None => read_fao_table(builder.from_reader(payload.bytes()?.as_ref()), &payload.origin),
    }
}

fn read_fao_table<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
) -> Result<Normalized, AcquireError> {
    let unreadable = |err: csv::Error| AcquireError::EmptyDataset(format!("{origin}: {err}"));
    let columns = reader
        .byte_headers()
        .map_err(unreadable)?
        .iter()
        .map(|field| {
            let name = String::from_utf8_lossy(field);
            fao_column(name.trim_start_matches('\u{feff}').trim())
        })
        .collect();
    let mut builder = RecordSetBuilder::new(Schema::new(columns));

    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record).map_err(unreadable)? {
        builder.push_row(
            record
                .iter()
                .map(|field| RawCell::Text(String::from_utf8_lossy(field).into_owned())),
        );
    }
    builder.finish(origin)
}

pub fn effis_schema(table: &FeatureTable) -> Schema {
    let mut columns = vec![
        Column::date("FIREDATE", DateLayout::DateTime),
        Column::date("LASTUPDATE", DateLayout::DateTime),
        Column::categorical("COUNTRY"),
        Column::numeric("AREA_HA"),
    ];
    columns.extend(EFFIS_LAND_COVER.iter().map(|name| Column::numeric(*name)));
    for field in &table.fields {
        if columns.iter().any(|column| column.name == field.name) {
            continue;
        }
        columns.push(if field.numeric {
            Column::numeric(field.name.clone())
        } else {
            Column::categorical(field.name.clone())
        });
    }
    columns.push(Column::geometry(GEOMETRY_COLUMN).synthesized());
    Schema::new(columns)
}

pub fn normalize_effis(table: &FeatureTable, source: &str) -> Result<Normalized, AcquireError> {
    let mut builder = RecordSetBuilder::new(effis_schema(table));
    for row in &table.rows {
        builder.push_map(row);
    }
    builder.finish(source)
}
