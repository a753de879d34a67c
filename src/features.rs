use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use shapefile::Shape;
use shapefile::dbase::{FieldType, FieldValue};

use crate::error::AcquireError;
use crate::records::{Geometry, RawCell};

pub const GEOMETRY_COLUMN: &str = "geometry";

const DELETION_FLAG: &str = "DeletionFlag";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureField {
    pub name: String,
    pub numeric: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub fields: Vec<FeatureField>,
    pub rows: Vec<BTreeMap<String, RawCell>>,
    pub byte_len: u64,
}

pub trait FeatureReader: Send + Sync {
    fn read_features(&self, path: &Path) -> Result<FeatureTable, AcquireError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShapefileReader;

impl FeatureReader for ShapefileReader {
    fn read_features(&self, path: &Path) -> Result<FeatureTable, AcquireError> {
        let dbf_path = path.with_extension("dbf");
        let byte_len = file_len(path)? + file_len(&dbf_path)?;

        let fields = shapefile::dbase::Reader::from_path(&dbf_path)
            .map_err(|err| decode_error(&dbf_path, err))?
            .fields()
            .iter()
            .filter(|info| info.name() != DELETION_FLAG)
            .map(|info| FeatureField {
                name: info.name().to_string(),
                numeric: matches!(
                    info.field_type(),
                    FieldType::Numeric
                        | FieldType::Float
                        | FieldType::Double
                        | FieldType::Integer
                        | FieldType::Currency
                ),
            })
            .collect::<Vec<_>>();

        let mut reader =
            shapefile::Reader::from_path(path).map_err(|err| decode_error(path, err))?;
        let mut rows = Vec::new();
        for entry in reader.iter_shapes_and_records() {
            let (shape, record) = entry.map_err(|err| decode_error(path, err))?;
            let mut row = fields
                .iter()
                .map(|field| {
                    let cell = record.get(&field.name).map(raw_cell).unwrap_or(RawCell::Absent);
                    (field.name.clone(), cell)
                })
                .collect::<BTreeMap<_, _>>();
            row.insert(
                GEOMETRY_COLUMN.to_string(),
                geometry(&shape).map(RawCell::Geometry).unwrap_or(RawCell::Absent),
            );
            rows.push(row);
        }

        Ok(FeatureTable {
            fields,
            rows,
            byte_len,
        })
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> AcquireError {
    AcquireError::Decode(format!("{}: {err}", path.display()))
}

fn file_len(path: &Path) -> Result<u64, AcquireError> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|_| AcquireError::MissingLocalFile(PathBuf::from(path)))
}

fn raw_cell(value: &FieldValue) -> RawCell {
    match value {
        FieldValue::Character(Some(text)) => RawCell::Text(text.trim().to_string()),
        FieldValue::Memo(text) => RawCell::Text(text.trim().to_string()),
        FieldValue::Numeric(Some(number)) => RawCell::Number(*number),
        FieldValue::Float(Some(number)) => RawCell::Number(f64::from(*number)),
        FieldValue::Double(number) | FieldValue::Currency(number) => RawCell::Number(*number),
        FieldValue::Integer(number) => RawCell::Number(f64::from(*number)),
        FieldValue::Logical(Some(flag)) => RawCell::Text(flag.to_string()),
        FieldValue::Date(Some(date)) => RawCell::Text(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => RawCell::Absent,
        other => RawCell::Text(format!("{other:?}")),
    }
}

fn geometry(shape: &Shape) -> Option<Geometry> {
    macro_rules! bbox {
        ($shape:expr) => {{
            let bbox = $shape.bbox();
            [bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y]
        }};
    }
    let bbox = match shape {
        Shape::NullShape => return None,
        Shape::Point(point) => [point.x, point.y, point.x, point.y],
        Shape::PointM(point) => [point.x, point.y, point.x, point.y],
        Shape::PointZ(point) => [point.x, point.y, point.x, point.y],
        Shape::Polyline(line) => bbox!(line),
        Shape::PolylineM(line) => bbox!(line),
        Shape::PolylineZ(line) => bbox!(line),
        Shape::Polygon(polygon) => bbox!(polygon),
        Shape::PolygonM(polygon) => bbox!(polygon),
        Shape::PolygonZ(polygon) => bbox!(polygon),
        Shape::Multipoint(points) => bbox!(points),
        Shape::MultipointM(points) => bbox!(points),
        Shape::MultipointZ(points) => bbox!(points),
        Shape::Multipatch(patch) => bbox!(patch),
    };
    Some(Geometry {
        shape_type: format!("{:?}", shape.shapetype()),
        bbox,
    })
}
