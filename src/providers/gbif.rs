use crate::app::{AcquisitionResult, Context, Trace};
use crate::domain::{AcquisitionRequest, ParamValue};
use crate::error::AcquireError;
use crate::filter::FilterSpec;
use crate::normalize::{normalize_gbif, parse_gbif_page};
use crate::query::{DEFAULT_GBIF_LIMIT, ResolvedQuery};
use crate::transport::{FetchRequest, PayloadFormat};

pub const DEFAULT_HABITAT_KEYWORDS: [&str; 2] = ["forest", "wood"];

pub fn acquire(
    ctx: &Context<'_>,
    request: &AcquisitionRequest,
    extra: Vec<FilterSpec>,
) -> Result<AcquisitionResult, AcquireError> {
    let request = request.with_defaults([
        ("limit", ParamValue::Integer(DEFAULT_GBIF_LIMIT)),
        ("forestOnly", ParamValue::Flag(true)),
        ("habitatKeywords", ParamValue::from(DEFAULT_HABITAT_KEYWORDS.to_vec())),
    ]);
    let query = ctx.queries.build(&request)?;
    let ResolvedQuery::GbifSearch(search) = &query else {
        return Err(AcquireError::InvalidRequest(
            "GBIF query did not resolve to an occurrence search".to_string(),
        ));
    };

    let mut trace = Trace::default();
    let mut results = Vec::new();
    let mut offset = 0u32;
    while let Some(url) = search.page_url(offset)? {
        let payload = ctx
            .transport
            .fetch(&FetchRequest::in_memory(url, PayloadFormat::Json))?;
        trace.fetched(&payload);
        let page = parse_gbif_page(&payload)?;
        let received = page.results.len() as u32;
        tracing::debug!(offset, received, total = ?page.count, "gbif page");
        results.extend(page.results);
        if page.end_of_records || received == 0 {
            break;
        }
        offset += received;
    }
    results.truncate(search.limit as usize);
    let source = format!("{} ({})", search.endpoint, search.scientific_name);
    let normalized = normalize_gbif(&results, &source)?;

    let mut defaults = Vec::new();
    if request.flag("forestOnly")?.unwrap_or(true) {
        let keywords = request
            .list("habitatKeywords")?
            .unwrap_or_else(|| DEFAULT_HABITAT_KEYWORDS.map(str::to_string).to_vec());
        defaults.push(FilterSpec::by_keyword("habitat", keywords));
    }
    trace.finish_records(request, query, normalized, super::chain(defaults, extra))
}
