use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};

use crate::error::AcquireError;

static MODIS_CALENDAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^A(\d{4})(\d{3})$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Categorical,
    Geometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLayout {
    Iso,
    ModisCalendar,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_layout: Option<DateLayout>,
    #[serde(skip)]
    pub synthesized: bool,
}

impl Column {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Numeric,
            date_layout: None,
            synthesized: false,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Categorical,
            date_layout: None,
            synthesized: false,
        }
    }

    pub fn date(name: impl Into<String>, layout: DateLayout) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Date,
            date_layout: Some(layout),
            synthesized: false,
        }
    }

    // Filled in by the adapter rather than read from the payload; such cells
    // never make a row parseable on their own.
    pub fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }

    pub fn geometry(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Geometry,
            date_layout: None,
            synthesized: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    pub shape_type: String,
    pub bbox: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Numeric(f64),
    Date(NaiveDate),
    Categorical(String),
    Geometry(Geometry),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Categorical(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Absent,
    Text(String),
    Number(f64),
    Geometry(Geometry),
}

impl RawCell {
    pub fn from_json(value: Option<&JsonValue>) -> Self {
        match value {
            None | Some(JsonValue::Null) => RawCell::Absent,
            Some(JsonValue::Number(number)) => number
                .as_f64()
                .map(RawCell::Number)
                .unwrap_or(RawCell::Absent),
            Some(JsonValue::String(text)) => RawCell::Text(text.clone()),
            Some(JsonValue::Bool(flag)) => RawCell::Text(flag.to_string()),
            Some(other) => RawCell::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record(Vec<Value>);

impl Record {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSet {
    schema: Schema,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.schema.index_of(column)?;
        self.records.get(row).map(|record| record.value(index))
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let index = self.schema.index_of(column)?;
        Some(self.records.iter().map(move |record| record.value(index)))
    }

    pub fn retain<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&Record) -> bool,
    {
        let records = self.records.into_iter().filter(|record| keep(record)).collect();
        Self {
            schema: self.schema,
            records,
        }
    }

    pub fn to_json_rows(&self) -> Vec<JsonValue> {
        self.records
            .iter()
            .map(|record| {
                let mut row = Map::new();
                for (column, value) in self.schema.columns().iter().zip(record.values()) {
                    let cell = match value {
                        Value::Missing => JsonValue::Null,
                        Value::Numeric(number) => json!(number),
                        Value::Date(date) => json!(date.format("%Y-%m-%d").to_string()),
                        Value::Categorical(text) => json!(text),
                        Value::Geometry(geometry) => json!(geometry),
                    };
                    row.insert(column.name.clone(), cell);
                }
                JsonValue::Object(row)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct RecordSetBuilder {
    schema: Schema,
    records: Vec<Record>,
    coercion_failures: BTreeMap<String, usize>,
    parseable: usize,
}

impl RecordSetBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            coercion_failures: BTreeMap::new(),
            parseable: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn push_with<F>(&mut self, mut cell: F)
    where
        F: FnMut(&Column) -> RawCell,
    {
        let mut values = Vec::with_capacity(self.schema.len());
        let mut any_present = false;
        for column in self.schema.columns() {
            let raw = cell(column);
            let value = match coerce(column, raw) {
                Ok(value) => value,
                Err(()) => {
                    *self
                        .coercion_failures
                        .entry(column.name.clone())
                        .or_insert(0) += 1;
                    Value::Missing
                }
            };
            any_present |= !column.synthesized && !value.is_missing();
            values.push(value);
        }
        if any_present {
            self.parseable += 1;
        }
        self.records.push(Record(values));
    }

    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = RawCell>,
    {
        let mut cells = cells.into_iter();
        self.push_with(|_| cells.next().unwrap_or(RawCell::Absent));
    }

    pub fn push_map(&mut self, row: &BTreeMap<String, RawCell>) {
        self.push_with(|column| row.get(&column.name).cloned().unwrap_or(RawCell::Absent));
    }

    pub fn map_numeric<F>(&mut self, column: &str, map: F)
    where
        F: Fn(f64) -> f64,
    {
        let Some(index) = self.schema.index_of(column) else {
            return;
        };
        for record in &mut self.records {
            if let Value::Numeric(value) = &mut record.0[index] {
                *value = map(*value);
            }
        }
    }

    pub fn finish(self, source: &str) -> Result<Normalized, AcquireError> {
        if self.parseable == 0 {
            return Err(AcquireError::EmptyDataset(source.to_string()));
        }
        Ok(Normalized {
            records: RecordSet {
                schema: self.schema,
                records: self.records,
            },
            coercion_failures: self.coercion_failures,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub records: RecordSet,
    pub coercion_failures: BTreeMap<String, usize>,
}

fn coerce(column: &Column, raw: RawCell) -> Result<Value, ()> {
    let raw = match raw {
        RawCell::Absent => return Ok(Value::Missing),
        RawCell::Text(text) if is_blank(&text) => return Ok(Value::Missing),
        other => other,
    };
    match column.kind {
        ColumnType::Numeric => match raw {
            RawCell::Number(value) if value.is_finite() => Ok(Value::Numeric(value)),
            RawCell::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Value::Numeric)
                .ok_or(()),
            _ => Err(()),
        },
        ColumnType::Date => match raw {
            RawCell::Text(text) => {
                parse_date(text.trim(), column.date_layout.unwrap_or(DateLayout::Iso))
                    .map(Value::Date)
                    .ok_or(())
            }
            _ => Err(()),
        },
        ColumnType::Categorical => match raw {
            RawCell::Text(text) => Ok(Value::Categorical(text.trim().to_string())),
            RawCell::Number(value) => Ok(Value::Categorical(format_number(value))),
            _ => Err(()),
        },
        ColumnType::Geometry => match raw {
            RawCell::Geometry(geometry) => Ok(Value::Geometry(geometry)),
            _ => Err(()),
        },
    }
}

fn is_blank(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("null")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn parse_date(raw: &str, layout: DateLayout) -> Option<NaiveDate> {
    match layout {
        DateLayout::Iso => {
            let head = raw.split('/').next().unwrap_or(raw);
            let head = head.get(..10).unwrap_or(head);
            NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
        }
        DateLayout::ModisCalendar => parse_modis_calendar(raw)
            .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
        DateLayout::DateTime => {
            let head = raw.split('.').next().unwrap_or(raw);
            NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S")
                .map(|value| value.date())
                .ok()
                .or_else(|| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        }
    }
}

pub fn parse_modis_calendar(raw: &str) -> Option<NaiveDate> {
    let captures = MODIS_CALENDAR.captures(raw)?;
    let year = captures[1].parse::<i32>().ok()?;
    let day = captures[2].parse::<u32>().ok()?;
    NaiveDate::from_yo_opt(year, day)
}

pub fn format_modis_calendar(date: NaiveDate) -> String {
    date.format("A%Y%j").to_string()
}
