use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AcquireError;
use crate::records::{ColumnType, RecordSet, Schema, Value};

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "predicate",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum FilterSpec {
    ByCategory {
        column: String,
        value: String,
    },
    ByDateRange {
        column: String,
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
    ByMinimum {
        column: String,
        threshold: f64,
    },
    ByMaximum {
        column: String,
        threshold: f64,
    },
    ByKeyword {
        column: String,
        keywords: Vec<String>,
        #[serde(default = "enabled")]
        case_insensitive: bool,
        #[serde(default = "enabled")]
        keep_if_null: bool,
    },
}

impl FilterSpec {
    pub fn by_category(column: impl Into<String>, value: impl Into<String>) -> Self {
        FilterSpec::ByCategory {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn by_date_range(
        column: impl Into<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        FilterSpec::ByDateRange {
            column: column.into(),
            start,
            end,
        }
    }

    pub fn by_minimum(column: impl Into<String>, threshold: f64) -> Self {
        FilterSpec::ByMinimum {
            column: column.into(),
            threshold,
        }
    }

    pub fn by_maximum(column: impl Into<String>, threshold: f64) -> Self {
        FilterSpec::ByMaximum {
            column: column.into(),
            threshold,
        }
    }

    pub fn by_keyword<I, S>(column: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterSpec::ByKeyword {
            column: column.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            case_insensitive: true,
            keep_if_null: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::ByCategory { .. } => "byCategory",
            FilterSpec::ByDateRange { .. } => "byDateRange",
            FilterSpec::ByMinimum { .. } => "byMinimum",
            FilterSpec::ByMaximum { .. } => "byMaximum",
            FilterSpec::ByKeyword { .. } => "byKeyword",
        }
    }

    pub fn column(&self) -> &str {
        match self {
            FilterSpec::ByCategory { column, .. }
            | FilterSpec::ByDateRange { column, .. }
            | FilterSpec::ByMinimum { column, .. }
            | FilterSpec::ByMaximum { column, .. }
            | FilterSpec::ByKeyword { column, .. } => column,
        }
    }

    fn expected_type(&self) -> ColumnType {
        match self {
            FilterSpec::ByCategory { .. } | FilterSpec::ByKeyword { .. } => {
                ColumnType::Categorical
            }
            FilterSpec::ByDateRange { .. } => ColumnType::Date,
            FilterSpec::ByMinimum { .. } | FilterSpec::ByMaximum { .. } => ColumnType::Numeric,
        }
    }

    fn validate(&self, schema: &Schema) -> Result<(), AcquireError> {
        let column = schema.column(self.column()).ok_or_else(|| {
            AcquireError::InvalidRequest(format!(
                "{} refers to unknown column `{}`",
                self.name(),
                self.column()
            ))
        })?;
        if column.kind != self.expected_type() {
            return Err(AcquireError::InvalidRequest(format!(
                "{} needs a {:?} column but `{}` is {:?}",
                self.name(),
                self.expected_type(),
                column.name,
                column.kind
            )));
        }
        match self {
            FilterSpec::ByKeyword { keywords, .. } if keywords.is_empty() => Err(
                AcquireError::InvalidRequest("byKeyword needs at least one keyword".to_string()),
            ),
            FilterSpec::ByDateRange {
                start: Some(start),
                end: Some(end),
                ..
            } if start > end => Err(AcquireError::InvalidRequest(format!(
                "byDateRange start {start} is after end {end}"
            ))),
            _ => Ok(()),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FilterSpec::ByCategory { value: wanted, .. } => value.as_str() == Some(wanted.as_str()),
            FilterSpec::ByDateRange { start, end, .. } => match value.as_date() {
                Some(date) => {
                    start.is_none_or(|start| date >= start) && end.is_none_or(|end| date <= end)
                }
                None => false,
            },
            FilterSpec::ByMinimum { threshold, .. } => {
                value.as_f64().is_some_and(|number| number >= *threshold)
            }
            FilterSpec::ByMaximum { threshold, .. } => {
                value.as_f64().is_some_and(|number| number <= *threshold)
            }
            FilterSpec::ByKeyword {
                keywords,
                case_insensitive,
                keep_if_null,
                ..
            } => match value.as_str() {
                None => value.is_missing() && *keep_if_null,
                Some(text) if *case_insensitive => {
                    let text = text.to_lowercase();
                    keywords
                        .iter()
                        .any(|keyword| text.contains(&keyword.to_lowercase()))
                }
                Some(text) => keywords.iter().any(|keyword| text.contains(keyword.as_str())),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub predicate: String,
    pub column: String,
    pub input: usize,
    pub surviving: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub records: RecordSet,
    pub stages: Vec<StageCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterChain {
    specs: Vec<FilterSpec>,
}

impl FilterChain {
    pub fn new(specs: Vec<FilterSpec>) -> Self {
        Self { specs }
    }

    pub fn push(&mut self, spec: FilterSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[FilterSpec] {
        &self.specs
    }

    pub fn validate(&self, schema: &Schema) -> Result<(), AcquireError> {
        self.specs.iter().try_for_each(|spec| spec.validate(schema))
    }

    pub fn apply(&self, records: RecordSet) -> Result<Filtered, AcquireError> {
        self.validate(records.schema())?;
        let mut current = records;
        let mut stages = Vec::with_capacity(self.specs.len());
        for (position, spec) in self.specs.iter().enumerate() {
            let input = current.len();
            let index = current
                .schema()
                .index_of(spec.column())
                .ok_or_else(|| AcquireError::InvalidRequest(spec.column().to_string()))?;
            current = current.retain(|record| spec.matches(record.value(index)));
            tracing::info!(
                stage = position + 1,
                predicate = spec.name(),
                column = spec.column(),
                input,
                surviving = current.len(),
                "filter stage"
            );
            stages.push(StageCount {
                predicate: spec.name().to_string(),
                column: spec.column().to_string(),
                input,
                surviving: current.len(),
            });
        }
        Ok(Filtered {
            records: current,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_matches_substring_case_insensitively() {
        let spec = FilterSpec::by_keyword("habitat", ["wood"]);
        assert!(spec.matches(&Value::Categorical("Mixed Woodland".to_string())));
        assert!(!spec.matches(&Value::Categorical("urban park".to_string())));
        assert!(spec.matches(&Value::Missing));
    }

    #[test]
    fn minimum_excludes_missing() {
        let spec = FilterSpec::by_minimum("AREA_HA", 10.0);
        assert!(spec.matches(&Value::Numeric(10.0)));
        assert!(!spec.matches(&Value::Numeric(9.99)));
        assert!(!spec.matches(&Value::Missing));
    }

    #[test]
    fn filter_spec_json_shape() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"predicate":"byKeyword","column":"habitat","keywords":["forest"],"keepIfNull":false}"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            FilterSpec::ByKeyword {
                column: "habitat".to_string(),
                keywords: vec!["forest".to_string()],
                case_insensitive: true,
                keep_if_null: false,
            }
        );
    }
}
