use crate::app::{AcquisitionResult, Context, Trace};
use crate::domain::{AcquisitionRequest, ParamValue};
use crate::error::AcquireError;
use crate::filter::FilterSpec;
use crate::normalize::normalize_modis;
use crate::query::{DEFAULT_MODIS_BAND, DEFAULT_MODIS_PRODUCT, MODIS_FIRST_DATE, ResolvedQuery};
use crate::transport::{FetchRequest, PayloadFormat};

pub fn acquire(
    ctx: &Context<'_>,
    request: &AcquisitionRequest,
    extra: Vec<FilterSpec>,
) -> Result<AcquisitionResult, AcquireError> {
    let today = ctx.queries.today().format("%Y-%m-%d").to_string();
    let request = request.with_defaults([
        ("product", ParamValue::from(DEFAULT_MODIS_PRODUCT)),
        ("band", ParamValue::from(DEFAULT_MODIS_BAND)),
        ("start_date", ParamValue::from(MODIS_FIRST_DATE)),
        ("end_date", ParamValue::Text(today)),
    ]);
    let query = ctx.queries.build(&request)?;
    let ResolvedQuery::ModisSubset(subset) = &query else {
        return Err(AcquireError::InvalidRequest(
            "MODIS query did not resolve to a subset request".to_string(),
        ));
    };

    let mut trace = Trace::default();
    let mut payloads = Vec::new();
    for (start, end) in subset.chunks() {
        let url = subset.chunk_url(start, end)?;
        let payload = ctx
            .transport
            .fetch(&FetchRequest::in_memory(url, PayloadFormat::Json))?;
        tracing::debug!(%start, %end, bytes = payload.byte_len, "modis chunk");
        trace.fetched(&payload);
        payloads.push(payload);
    }
    let normalized = normalize_modis(&payloads, &subset.site_id)?;
    trace.finish_records(request, query, normalized, super::chain(Vec::new(), extra))
}
