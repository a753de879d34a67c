use crate::app::{AcquisitionResult, Context, Trace};
use crate::domain::AcquisitionRequest;
use crate::error::AcquireError;
use crate::filter::FilterSpec;
use crate::normalize::normalize_effis;
use crate::query::ResolvedQuery;

pub fn acquire(
    ctx: &Context<'_>,
    request: &AcquisitionRequest,
    extra: Vec<FilterSpec>,
) -> Result<AcquisitionResult, AcquireError> {
    let query = ctx.queries.build(request)?;
    let ResolvedQuery::LocalFile { path } = &query else {
        return Err(AcquireError::InvalidRequest(
            "EFFIS query did not resolve to a local file".to_string(),
        ));
    };
    if !path.is_file() {
        return Err(AcquireError::MissingLocalFile(path.clone()));
    }

    let table = ctx.features.read_features(path)?;
    let mut trace = Trace::default();
    trace.read_local(path.display().to_string(), table.byte_len);
    let normalized = normalize_effis(&table, &path.display().to_string())?;

    let mut defaults = Vec::new();
    if let Some(country) = super::optional_text(request, "country")? {
        defaults.push(FilterSpec::by_category("COUNTRY", country.to_ascii_uppercase()));
    }
    let start = request.date("start_date")?;
    let end = request.date("end_date")?;
    if start.is_some() || end.is_some() {
        defaults.push(FilterSpec::by_date_range("FIREDATE", start, end));
    }
    if let Some(min_area) = request.number("min_area")? {
        defaults.push(FilterSpec::by_minimum("AREA_HA", min_area));
    }
    trace.finish_records(
        request.clone(),
        query,
        normalized,
        super::chain(defaults, extra),
    )
}
