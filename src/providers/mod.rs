pub mod cru;
pub mod effis;
pub mod fao;
pub mod gbif;
pub mod modis;

use crate::domain::AcquisitionRequest;
use crate::error::AcquireError;
use crate::filter::{FilterChain, FilterSpec};

pub(crate) fn chain(defaults: Vec<FilterSpec>, extra: Vec<FilterSpec>) -> FilterChain {
    let mut chain = FilterChain::new(defaults);
    for spec in extra {
        chain.push(spec);
    }
    chain
}

pub(crate) fn optional_text(
    request: &AcquisitionRequest,
    key: &str,
) -> Result<Option<String>, AcquireError> {
    Ok(request
        .text(key)?
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}
