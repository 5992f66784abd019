//! Integration tests for the query functions.

use casecount::error::{CaseCountError, QueryError};
use casecount::query::QueryParams;
use casecount::series::{CountryBucket, DailyStat, Location, RegionSeries, Statistics};
use casecount::snapshot::SnapshotInput;
use casecount::{EngineConfig, Store};
use chrono::NaiveDate;

const DATES: [&str; 6] = ["1/22/20", "1/23/20", "1/24/20", "1/25/20", "1/26/20", "1/27/20"];

fn region(lat: f64, long: f64, confirmed: [i64; 6], deaths: [i64; 6]) -> RegionSeries {
    let counts = DATES
        .iter()
        .zip(confirmed.iter().zip(deaths))
        .map(|(date, (&c, d))| DailyStat::new(*date, c, d, 0))
        .collect();
    RegionSeries::new(Some(Location::new(lat, long)), 0, counts)
}

fn fixture() -> SnapshotInput {
    SnapshotInput::new(
        NaiveDate::from_ymd_opt(2020, 1, 22).unwrap(),
        NaiveDate::from_ymd_opt(2020, 1, 27).unwrap(),
    )
    .with_country(
        "China",
        CountryBucket::new("China")
            .with_region(
                "Beijing",
                region(
                    40.1824,
                    116.4142,
                    [50, 200, 800, 1020, 1110, 1235],
                    [10, 87, 125, 142, 145, 152],
                ),
            )
            .with_region(
                "Hubei",
                region(
                    30.9756,
                    112.2707,
                    [100, 1000, 1800, 2020, 2110, 2111],
                    [20, 100, 105, 150, 175, 230],
                ),
            )
            .with_region(
                "Shanghai",
                region(
                    31.202,
                    121.4491,
                    [10, 45, 89, 126, 400, 532],
                    [5, 8, 20, 25, 42, 55],
                ),
            ),
    )
    .with_country(
        "Singapore",
        CountryBucket::new("Singapore").with_region(
            "",
            region(1.2833, 103.8333, [1, 3, 6, 10, 15, 23], [0, 2, 4, 5, 8, 10]),
        ),
    )
    .with_country(
        "United Kingdom",
        CountryBucket::new("United Kingdom").with_region(
            "London",
            region(55.3781, -3.436, [1, 6, 8, 9, 20, 28], [0, 1, 3, 6, 6, 9]),
        ),
    )
}

fn store() -> Store {
    let store = Store::new(EngineConfig::default()).unwrap();
    store.refresh(fixture()).unwrap();
    store
}

fn stats(confirmed: i64, deaths: i64) -> Statistics {
    Statistics::new(confirmed, deaths, 0)
}

#[test]
fn test_state_aggregates_between_dates() {
    let store = store();
    let result = store
        .state_aggregates(&QueryParams::between("1/24/20", "1/26/20"))
        .unwrap();

    assert_eq!(result.len(), 3);
    let china = &result["China"].states;
    assert_eq!(china["Beijing"].statistics, stats(910, 58));
    assert_eq!(china["Hubei"].statistics, stats(1110, 75));
    assert_eq!(china["Shanghai"].statistics, stats(355, 34));
    assert_eq!(result["Singapore"].states[""].statistics, stats(12, 6));
    assert_eq!(result["United Kingdom"].states["London"].statistics, stats(14, 5));

    let beijing = china["Beijing"].location.unwrap();
    assert!((beijing.lat - 40.1824).abs() < 1e-9);
}

#[test]
fn test_country_aggregates_between_dates() {
    let store = store();
    let result = store
        .country_aggregates(&QueryParams::between("1/24/20", "1/26/20"))
        .unwrap();

    let china = &result["China"].aggregate;
    assert_eq!(china.statistics, stats(2375, 167));
    let location = china.location.unwrap();
    assert!((location.lat - (40.1824 + 30.9756 + 31.202) / 3.0).abs() < 1e-9);
    assert!((location.long - (116.4142 + 112.2707 + 121.4491) / 3.0).abs() < 1e-9);

    // a whole-country entry stands for the country itself
    let singapore = result["Singapore"].aggregate.location.unwrap();
    assert!((singapore.lat - 1.2833).abs() < 1e-9);
}

#[test]
fn test_full_range_equals_last_entry() {
    let store = store();
    let result = store.state_aggregates(&QueryParams::all()).unwrap();
    assert_eq!(result["China"].states["Hubei"].statistics, stats(2111, 230));
    assert_eq!(result["Singapore"].states[""].statistics, stats(23, 10));

    let countries = store.country_aggregates(&QueryParams::all()).unwrap();
    assert_eq!(countries["China"].aggregate.statistics, stats(3878, 437));
}

#[test]
fn test_dates_outside_bounds_mean_no_range() {
    let store = store();
    let unbounded = store.country_aggregates(&QueryParams::all()).unwrap();
    let wide = store
        .country_aggregates(&QueryParams::between("1/20/20", "1/30/20"))
        .unwrap();
    assert_eq!(unbounded, wide);

    let series = store
        .world_series(&QueryParams::between("2020-01-01", "2020-02-01"))
        .unwrap();
    assert_eq!(series.len(), 6);
}

#[test]
fn test_window_entirely_outside_bounds_is_invalid() {
    let store = store();
    for (from, to) in [("1/20/20", "1/21/20"), ("1/28/20", "1/29/20")] {
        let err = store
            .state_aggregates(&QueryParams::between(from, to))
            .unwrap_err();
        assert!(
            matches!(err, CaseCountError::Query(QueryError::InvalidRange { .. })),
            "{from}..{to}: {err}"
        );
    }
}

#[test]
fn test_reversed_range() {
    let store = store();
    let err = store
        .country_series(&QueryParams::between("1/24/20", "1/23/20"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "query error: from date 1/24/20 cannot be after to date 1/23/20"
    );
}

#[test]
fn test_misspelled_country_suggestions() {
    let store = store();
    for (query, expected) in [
        ("Siingapore", "Singapore"),
        ("Sngapore", "Singapore"),
        ("chain", "China"),
        ("UnitedKingdom", "United Kingdom"),
    ] {
        let err = store
            .state_aggregates(&QueryParams::all().with_country(query))
            .unwrap_err();
        match err {
            CaseCountError::Query(QueryError::CountryNotFound {
                country,
                suggestion,
            }) => {
                assert_eq!(country, query);
                assert_eq!(suggestion.as_deref(), Some(expected));
            }
            other => panic!("unexpected error for {query}: {other}"),
        }
    }
}

#[test]
fn test_country_filter_variants() {
    let store = store();
    let params = QueryParams::between("1/24/20", "1/26/20");
    for filter in ["United Kingdom", "united kingdom", "gb", "GB"] {
        let result = store
            .state_aggregates(&params.clone().with_country(filter))
            .unwrap();
        assert_eq!(result.len(), 1, "filter {filter}");
        assert_eq!(result["United Kingdom"].states["London"].statistics, stats(14, 5));
    }
}

#[test]
fn test_country_aggregate_is_sum_of_states_for_every_range() {
    let store = store();
    for from in 0..DATES.len() {
        for to in from..DATES.len() {
            let params = QueryParams::between(DATES[from], DATES[to]);
            let states = store.state_aggregates(&params).unwrap();
            let countries = store.country_aggregates(&params).unwrap();
            for (key, country) in &countries {
                let summed: Statistics = states[key].states.values().map(|s| s.statistics).sum();
                assert_eq!(country.aggregate.statistics, summed, "{key} {from}..={to}");
            }

            let world = store.world_aggregate(&params).unwrap();
            let summed: Statistics = countries.values().map(|c| c.aggregate.statistics).sum();
            assert_eq!(world, summed, "world {from}..={to}");
        }
    }
}

#[test]
fn test_series_shapes() {
    let store = store();
    let params = QueryParams::between("1/24/20", "1/26/20");

    let states = store.state_series(&params).unwrap();
    let beijing = &states["China"].states["Beijing"].counts;
    let dates: Vec<&str> = beijing.iter().map(|day| day.date.as_str()).collect();
    assert_eq!(dates, ["1/24/20", "1/25/20", "1/26/20"]);
    assert_eq!(beijing[0].statistics, stats(800, 125));

    let countries = store.country_series(&params).unwrap();
    assert_eq!(countries["China"].series.counts[2].statistics, stats(3620, 362));

    let world = store.world_series(&params).unwrap();
    assert_eq!(world.len(), 3);
    assert_eq!(world[2].statistics, stats(3655, 376));
}

#[test]
fn test_results_serialize_in_key_order() {
    let store = store();
    let result = store.country_aggregates(&QueryParams::all()).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let china = json.find("\"China\"").unwrap();
    let singapore = json.find("\"Singapore\"").unwrap();
    let uk = json.find("\"United Kingdom\"").unwrap();
    assert!(china < singapore && singapore < uk);
    assert!(json.contains("\"Confirmed\":3878"));
}
