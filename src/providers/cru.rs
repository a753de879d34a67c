use crate::app::{AcquisitionResult, Context, Dataset, Trace};
use crate::domain::{AcquisitionRequest, ParamValue};
use crate::error::AcquireError;
use crate::filter::FilterSpec;
use crate::normalize::normalize_cru;
use crate::query::{CRU_FIRST_YEAR, CRU_RELEASES, DEFAULT_CRU_VERSION, ResolvedQuery};
use crate::transport::{ArchiveKind, FetchRequest, PayloadFormat};

pub fn acquire(
    ctx: &Context<'_>,
    request: &AcquisitionRequest,
    extra: Vec<FilterSpec>,
) -> Result<AcquisitionResult, AcquireError> {
    if !extra.is_empty() {
        return Err(AcquireError::InvalidRequest(
            "CRU grids are not tabular; filters are not supported".to_string(),
        ));
    }
    let version = request
        .rendered("version")
        .unwrap_or_else(|| DEFAULT_CRU_VERSION.to_string());
    let last_year = CRU_RELEASES
        .iter()
        .find(|(release, _, _)| *release == version)
        .map(|(_, _, last)| *last)
        .ok_or_else(|| AcquireError::InvalidRequest(format!("unknown CRU TS version `{version}`")))?;
    let request = request.with_defaults([
        ("version", ParamValue::Text(version)),
        ("start_year", ParamValue::Integer(CRU_FIRST_YEAR)),
        ("end_year", ParamValue::Integer(last_year)),
    ]);

    let query = ctx.queries.build(&request)?;
    let ResolvedQuery::Url { url } = &query else {
        return Err(AcquireError::InvalidRequest(
            "CRU query did not resolve to a URL".to_string(),
        ));
    };
    let variable = request.require_text("variable")?.to_string();
    let start_year = year(&request, "start_year")?;
    let end_year = year(&request, "end_year")?;

    let dir = ctx.download_dir()?;
    let archive_name = url.rsplit('/').next().unwrap_or("cru.nc.gz");
    let mut trace = Trace {
        download_dir: Some(dir.clone()),
        ..Trace::default()
    };
    let archive = ctx.transport.fetch(&FetchRequest::to_file(
        url.clone(),
        PayloadFormat::Gzip,
        dir.join(archive_name),
    ))?;
    trace.fetched(&archive);

    let extracted = ctx
        .transport
        .extract(&archive, ArchiveKind::Gzip, ".nc", &dir)?;
    trace.extractions.push(extracted.note);
    let path = extracted.payload.path().ok_or_else(|| {
        AcquireError::Extraction(format!("{} was not extracted to disk", archive.origin))
    })?;
    let header = ctx.grids.read_header(path)?;
    let handle = normalize_cru(header, &variable, start_year, end_year)?;
    tracing::info!(
        variable = %handle.variable,
        time_steps = handle.time_steps,
        "grid opened"
    );

    let provenance = trace.provenance(request, query, handle.time_steps as usize);
    Ok(AcquisitionResult {
        data: Dataset::Grid(handle),
        provenance,
    })
}

fn year(request: &AcquisitionRequest, key: &str) -> Result<i32, AcquireError> {
    let value = request
        .integer(key)?
        .ok_or_else(|| AcquireError::InvalidRequest(format!("missing `{key}`")))?;
    i32::try_from(value).map_err(|_| AcquireError::InvalidRequest(format!("`{key}` out of range")))
}
