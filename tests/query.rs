use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate};

use enviro_acquire::config::Endpoints;
use enviro_acquire::domain::{AcquisitionRequest, ParamValue, Provider};
use enviro_acquire::error::AcquireError;
use enviro_acquire::query::{QueryBuilder, ResolvedQuery};

fn builder() -> QueryBuilder {
    QueryBuilder::new(
        Endpoints::default(),
        300,
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    )
}

fn request(provider: Provider, pairs: &[(&str, ParamValue)]) -> AcquisitionRequest {
    pairs
        .iter()
        .fold(AcquisitionRequest::builder(provider), |builder, (key, value)| {
            builder.param(*key, value.clone())
        })
        .build()
        .unwrap()
}

#[test]
fn same_request_resolves_identically() {
    let req = request(
        Provider::Gbif,
        &[("scientificName", "Quercus robur".into()), ("country", "de".into())],
    );
    assert_eq!(builder().build(&req).unwrap(), builder().build(&req).unwrap());
}

#[test]
fn cru_url_follows_release_layout() {
    let req = request(
        Provider::Cru,
        &[
            ("variable", "pre".into()),
            ("start_year", ParamValue::Integer(1901)),
            ("end_year", ParamValue::Integer(2023)),
        ],
    );
    let query = builder().build(&req).unwrap();
    assert_eq!(
        query,
        ResolvedQuery::Url {
            url: "https://crudata.uea.ac.uk/cru/data/hrg/cru_ts_4.08/cruts.2406270035.v4.08/pre/cru_ts4.08.1901.2023.pre.dat.nc.gz"
                .to_string()
        }
    );
}

#[test]
fn cru_older_release_caps_end_year() {
    let req = request(
        Provider::Cru,
        &[
            ("variable", "tmx".into()),
            ("version", "4.06".into()),
            ("end_year", ParamValue::Integer(2023)),
        ],
    );
    let err = builder().build(&req).unwrap_err();
    assert_matches!(err, AcquireError::InvalidRequest(message) if message.contains("2021"));
}

#[test]
fn cru_reversed_years_are_invalid() {
    let req = request(
        Provider::Cru,
        &[
            ("variable", "tmp".into()),
            ("start_year", ParamValue::Integer(2010)),
            ("end_year", ParamValue::Integer(2000)),
        ],
    );
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

#[test]
fn gbif_page_urls_stop_at_limit() {
    let req = request(
        Provider::Gbif,
        &[
            ("scientificName", "Picea abies".into()),
            ("limit", ParamValue::Integer(450)),
        ],
    );
    let ResolvedQuery::GbifSearch(search) = builder().build(&req).unwrap() else {
        panic!("expected a GBIF search");
    };
    let first = search.page_url(0).unwrap().unwrap();
    assert!(first.starts_with("https://api.gbif.org/v1/occurrence/search?"));
    assert!(first.contains("scientificName=Picea+abies"));
    assert!(first.contains("limit=300"));
    let second = search.page_url(300).unwrap().unwrap();
    assert!(second.contains("limit=150"));
    assert!(second.contains("offset=300"));
    assert_eq!(search.page_url(450).unwrap(), None);
}

#[test]
fn gbif_limit_out_of_range_is_invalid() {
    let req = request(
        Provider::Gbif,
        &[
            ("scientificName", "Picea abies".into()),
            ("limit", ParamValue::Integer(200_000)),
        ],
    );
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

#[test]
fn gbif_country_must_be_alpha2() {
    let req = request(
        Provider::Gbif,
        &[
            ("scientificName", "Picea abies".into()),
            ("country", "Germany".into()),
        ],
    );
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

#[test]
fn modis_defaults_span_to_today() {
    let req = request(
        Provider::Modis,
        &[("lat", 61.123456.into()), ("lon", 24.0.into())],
    );
    let ResolvedQuery::ModisSubset(subset) = builder().build(&req).unwrap() else {
        panic!("expected a MODIS subset");
    };
    assert_eq!(subset.latitude, 61.1235);
    assert_eq!(subset.site_id, "site_61.1235_24.0000");
    assert_eq!(subset.start, NaiveDate::from_ymd_opt(2000, 2, 18).unwrap());
    assert_eq!(subset.end, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(subset.product, "MOD13Q1");
    assert_eq!(subset.band, "250m_16_days_EVI");
}

#[test]
fn modis_chunks_cover_window_without_gaps() {
    let req = request(
        Provider::Modis,
        &[
            ("lat", 10.0.into()),
            ("lon", 10.0.into()),
            ("start_date", "2021-01-01".into()),
            ("end_date", "2021-12-31".into()),
        ],
    );
    let ResolvedQuery::ModisSubset(subset) = builder().build(&req).unwrap() else {
        panic!("expected a MODIS subset");
    };
    let chunks = subset.chunks();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].0, subset.start);
    assert_eq!(chunks.last().unwrap().1, subset.end);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].1.succ_opt().unwrap(), pair[1].0);
    }
    let url = subset.chunk_url(chunks[0].0, chunks[0].1).unwrap();
    assert!(url.contains("startDate=A2021001"));
    assert!(url.contains("endDate=A2021160"));
    assert!(url.contains("kmAboveBelow=1"));
}

#[test]
fn modis_reversed_window_is_invalid() {
    let req = request(
        Provider::Modis,
        &[
            ("lat", 10.0.into()),
            ("lon", 10.0.into()),
            ("start_date", "2022-01-01".into()),
            ("end_date", "2021-01-01".into()),
        ],
    );
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

#[test]
fn fao_years_before_first_release_are_invalid() {
    let req = request(Provider::Fao, &[("start_year", ParamValue::Integer(1950))]);
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

#[test]
fn effis_resolves_to_local_path_without_touching_disk() {
    let req = request(
        Provider::Effis,
        &[("shapefilePath", "/data/effis/modis.ba.poly.shp".into())],
    );
    assert_eq!(
        builder().build(&req).unwrap(),
        ResolvedQuery::LocalFile {
            path: "/data/effis/modis.ba.poly.shp".into()
        }
    );
}

#[test]
fn effis_negative_min_area_is_invalid() {
    let req = request(
        Provider::Effis,
        &[
            ("shapefilePath", "fires.shp".into()),
            ("min_area", (-1.0).into()),
        ],
    );
    assert_matches!(builder().build(&req), Err(AcquireError::InvalidRequest(_)));
}

fn composites_in(start: NaiveDate, end: NaiveDate) -> usize {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| day.ordinal() % 16 == 1)
        .count()
}

#[test]
fn modis_chunks_never_span_a_new_year() {
    let req = request(
        Provider::Modis,
        &[
            ("lat", 10.0.into()),
            ("lon", 10.0.into()),
            ("start_date", "2020-12-01".into()),
            ("end_date", "2021-02-01".into()),
        ],
    );
    let ResolvedQuery::ModisSubset(subset) = builder().build(&req).unwrap() else {
        panic!("expected a MODIS subset");
    };
    assert_eq!(
        subset.chunks(),
        vec![
            (
                NaiveDate::from_ymd_opt(2020, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
            ),
            (
                NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 2, 1).unwrap()
            ),
        ]
    );
}

#[test]
fn modis_default_window_stays_within_ten_composites_per_chunk() {
    let req = request(
        Provider::Modis,
        &[
            ("lat", 10.0.into()),
            ("lon", 10.0.into()),
            ("start_date", "2000-02-18".into()),
        ],
    );
    let ResolvedQuery::ModisSubset(subset) = builder().build(&req).unwrap() else {
        panic!("expected a MODIS subset");
    };
    let chunks = subset.chunks();
    assert_eq!(chunks.first().unwrap().0, subset.start);
    assert_eq!(chunks.last().unwrap().1, subset.end);
    for (start, end) in chunks {
        assert!(composites_in(start, end) <= 10, "{start}..{end}");
    }
}
