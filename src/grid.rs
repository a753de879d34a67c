use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AcquireError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridDimension {
    pub name: String,
    pub length: u64,
    pub unlimited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridVariable {
    pub name: String,
    pub dimensions: Vec<String>,
    pub data_type: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridHeader {
    pub path: PathBuf,
    pub dimensions: Vec<GridDimension>,
    pub variables: Vec<GridVariable>,
    pub global_attributes: BTreeMap<String, String>,
}

impl GridHeader {
    pub fn dimension(&self, name: &str) -> Option<&GridDimension> {
        self.dimensions.iter().find(|dim| dim.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.iter().find(|var| var.name == name)
    }
}

pub trait GridReader: Send + Sync {
    fn read_header(&self, path: &Path) -> Result<GridHeader, AcquireError>;
}

#[cfg(feature = "netcdf")]
pub type DefaultGridReader = NetcdfReader;

#[cfg(not(feature = "netcdf"))]
pub type DefaultGridReader = UnsupportedGridReader;

#[cfg(feature = "netcdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfReader;

#[cfg(feature = "netcdf")]
impl GridReader for NetcdfReader {
    fn read_header(&self, path: &Path) -> Result<GridHeader, AcquireError> {
        let file = netcdf::open(path)
            .map_err(|err| AcquireError::Decode(format!("{}: {err}", path.display())))?;

        let dimensions = file
            .dimensions()
            .map(|dim| GridDimension {
                name: dim.name(),
                length: dim.len() as u64,
                unlimited: dim.is_unlimited(),
            })
            .collect();
        let variables = file
            .variables()
            .map(|var| GridVariable {
                name: var.name(),
                dimensions: var.dimensions().iter().map(|dim| dim.name()).collect(),
                data_type: format!("{:?}", var.vartype()),
                attributes: var.attributes().map(attribute_entry).collect(),
            })
            .collect();
        let global_attributes = file.attributes().map(attribute_entry).collect();

        Ok(GridHeader {
            path: path.to_path_buf(),
            dimensions,
            variables,
            global_attributes,
        })
    }
}

#[cfg(feature = "netcdf")]
fn attribute_entry(attribute: netcdf::Attribute<'_>) -> (String, String) {
    let value = match attribute.value() {
        Ok(netcdf::AttributeValue::Str(text)) => text,
        Ok(other) => format!("{other:?}"),
        Err(err) => format!("<unreadable: {err}>"),
    };
    (attribute.name().to_string(), value)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGridReader;

impl GridReader for UnsupportedGridReader {
    fn read_header(&self, path: &Path) -> Result<GridHeader, AcquireError> {
        Err(AcquireError::Extraction(format!(
            "{} is a NetCDF grid and this build has no `netcdf` feature",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn header_lookups_by_name() {
        let header = GridHeader {
            path: PathBuf::from("cru_ts4.08.1901.2023.tmp.dat.nc"),
            dimensions: vec![GridDimension {
                name: "time".to_string(),
                length: 1476,
                unlimited: true,
            }],
            variables: vec![GridVariable {
                name: "tmp".to_string(),
                dimensions: vec!["time".to_string()],
                data_type: "Float".to_string(),
                attributes: BTreeMap::new(),
            }],
            global_attributes: BTreeMap::new(),
        };
        assert_eq!(header.dimension("time").map(|dim| dim.length), Some(1476));
        assert!(header.variable("pre").is_none());
    }

    #[test]
    fn unsupported_reader_reports_extraction_error() {
        let err = UnsupportedGridReader
            .read_header(Path::new("grid.nc"))
            .unwrap_err();
        assert_matches!(err, AcquireError::Extraction(_));
    }
}
