use chrono::Datelike;

use crate::app::{AcquisitionResult, Context, Trace};
use crate::domain::{AcquisitionRequest, ParamValue};
use crate::error::AcquireError;
use crate::filter::FilterSpec;
use crate::normalize::normalize_fao;
use crate::query::{FAO_FIRST_YEAR, ResolvedQuery};
use crate::transport::{ArchiveKind, FetchRequest, PayloadFormat};

pub const NORMALIZED_MEMBER_SUFFIX: &str = "(Normalized).csv";
pub const YEAR_COLUMN: &str = "Year";

const CATEGORY_KEYS: [(&str, &str); 4] = [
    ("reporter", "Reporter Countries"),
    ("partner", "Partner Countries"),
    ("item", "Item"),
    ("element", "Element"),
];

pub fn acquire(
    ctx: &Context<'_>,
    request: &AcquisitionRequest,
    extra: Vec<FilterSpec>,
) -> Result<AcquisitionResult, AcquireError> {
    let this_year = i64::from(ctx.queries.today().year());
    let request = request.with_defaults([
        ("start_year", ParamValue::Integer(FAO_FIRST_YEAR)),
        ("end_year", ParamValue::Integer(this_year)),
    ]);
    let query = ctx.queries.build(&request)?;
    let ResolvedQuery::Url { url } = &query else {
        return Err(AcquireError::InvalidRequest(
            "FAO query did not resolve to a URL".to_string(),
        ));
    };

    let dir = ctx.download_dir()?;
    let mut trace = Trace {
        download_dir: Some(dir.clone()),
        ..Trace::default()
    };
    let archive = ctx.transport.fetch(&FetchRequest::to_file(
        url.clone(),
        PayloadFormat::Zip,
        dir.join("fao_forestry_trade.zip"),
    ))?;
    trace.fetched(&archive);
    let extracted =
        ctx.transport
            .extract(&archive, ArchiveKind::Zip, NORMALIZED_MEMBER_SUFFIX, &dir)?;
    trace.extractions.push(extracted.note);
    let normalized = normalize_fao(&extracted.payload)?;

    let mut defaults = Vec::new();
    for (key, column) in CATEGORY_KEYS {
        if let Some(value) = super::optional_text(&request, key)? {
            defaults.push(FilterSpec::by_category(column, value));
        }
    }
    if let Some(start) = request.integer("start_year")? {
        defaults.push(FilterSpec::by_minimum(YEAR_COLUMN, start as f64));
    }
    if let Some(end) = request.integer("end_year")? {
        defaults.push(FilterSpec::by_maximum(YEAR_COLUMN, end as f64));
    }
    trace.finish_records(request, query, normalized, super::chain(defaults, extra))
}
