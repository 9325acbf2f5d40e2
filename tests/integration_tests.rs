use lsoa_enrich::config::{
    JoinConfig, JoinMode, MissingFilePolicy, OutputFormat, RangeConfig, Retention, SplitConfig,
    TableSource,
};
use lsoa_enrich::geometry::FeatureCollection;
use lsoa_enrich::keys::Year;
use lsoa_enrich::pipeline::{run_join, run_ranges, run_split};
use serde_json::json;
use std::fs;
use std::path::Path;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Two boundaries and two years of tables. 2014 is absent and 2015 has no
/// health file.
fn fixture(root: &Path) {
    let geometry = json!({
        "type": "FeatureCollection",
        "name": "LSOA_WGS84",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] },
                "properties": { "LSOA11CD": "E01000001", "LSOA11NM": "City of London 001A" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]] },
                "properties": { "LSOA11CD": "E01000002", "LSOA11NM": "City of London 001B" }
            }
        ]
    });
    write(
        &root.join("LSOA_WGS84.geojson"),
        &serde_json::to_string(&geometry).unwrap(),
    );

    let data = root.join("ADI_all-domains");
    write(
        &data.join("ADI_2013/ADI_claimant_counts_2013.csv"),
        "area_code,area_name,claimant_count,claimant_rate\nE01000001,City of London 001A,5,1.0\nE01999999,Elsewhere,9,2.0\n",
    );
    write(
        &data.join("ADI_2013/ADI_crime_2013.csv"),
        "area_code,area_name,crime_rate\nE01000001,City of London 001A,2.5\nE01999999,Elsewhere,3.5\n",
    );
    write(
        &data.join("ADI_2013/ADI_health_2013.csv"),
        "area_code,area_name,health_rate\nE01000001,City of London 001A,0.25\nE01999999,Elsewhere,0.75\n",
    );
    write(
        &data.join("ADI_2015/ADI_claimant_counts_2015.csv"),
        "area_code,area_name,claimant_count,claimant_rate\nE01000001,City of London 001A,7,3.456\nE01999999,Elsewhere,1,8.0\n",
    );
    write(
        &data.join("ADI_2015/ADI_crime_2015.csv"),
        "area_code,area_name,crime_rate\nE01000001,City of London 001A,1.0\nE01999999,Elsewhere,\n",
    );
    write(&data.join(".DS_Store/ignored"), "");
}

fn join_config(root: &Path, mode: JoinMode, retention: Retention, on_missing: MissingFilePolicy) -> JoinConfig {
    JoinConfig {
        geometry_path: root.join("LSOA_WGS84.geojson"),
        key_field: "LSOA11CD".to_string(),
        tables: TableSource::new(root.join("ADI_all-domains"), on_missing),
        mode,
        retention,
        output_path: root.join("output/LSOA.geojson"),
        gzip: false,
    }
}

fn read_collection(path: &Path) -> FeatureCollection {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_join_writes_matched_features_only() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = join_config(
        dir.path(),
        JoinMode::AllFields,
        Retention::MatchedOnly,
        MissingFilePolicy::Skip,
    );

    let summary = run_join(&config).unwrap();

    let collection = read_collection(&config.output_path);
    assert_eq!(collection.features.len(), 1);
    assert_eq!(collection.extra["name"], json!("LSOA_WGS84"));

    let props = &collection.features[0].properties;
    assert_eq!(props["LSOA11CD"], json!("E01000001"));
    assert_eq!(props["claimant_rate_2015"], json!("3.46"));
    assert_eq!(props["claimant_count_2013"], json!("5.00"));
    assert_eq!(props["health_rate_2013"], json!("0.25"));
    assert!(!props.contains_key("health_rate_2015"));
    assert!(!props.contains_key("area_name_2013"));

    assert_eq!(summary.rows_read, 10);
    assert_eq!(summary.rows_unmatched, 5);
}

#[test]
fn test_join_fails_on_missing_file_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = join_config(
        dir.path(),
        JoinMode::AllFields,
        Retention::MatchedOnly,
        MissingFilePolicy::Fail,
    );

    let err = run_join(&config).unwrap_err();
    assert!(err.to_string().contains("ADI_health_2015.csv"));
    assert!(!config.output_path.exists());
}

#[test]
fn test_join_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let config = join_config(
        dir.path(),
        JoinMode::RateOnly,
        Retention::All,
        MissingFilePolicy::Skip,
    );

    run_join(&config).unwrap();
    let first = fs::read(&config.output_path).unwrap();
    run_join(&config).unwrap();
    let second = fs::read(&config.output_path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_missing_geometry_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let mut config = join_config(
        dir.path(),
        JoinMode::AllFields,
        Retention::MatchedOnly,
        MissingFilePolicy::Skip,
    );
    config.geometry_path = dir.path().join("absent.geojson");

    assert!(run_join(&config).is_err());
}

#[test]
fn test_split_writes_one_file_per_variable() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let output_dir = dir.path().join("output");
    let config = SplitConfig {
        join: join_config(
            dir.path(),
            JoinMode::RateOnly,
            Retention::All,
            MissingFilePolicy::Skip,
        ),
        output_dir: output_dir.clone(),
    };

    let written = run_split(&config).unwrap();

    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "claimant_rate.geojson",
            "crime_rate.geojson",
            "health_rate.geojson"
        ]
    );

    let claimant = read_collection(&output_dir.join("claimant_rate.geojson"));
    assert_eq!(claimant.features.len(), 2);
    let first = &claimant.features[0].properties;
    assert_eq!(first["claimant_rate_2013"], json!(1.0));
    assert_eq!(first["claimant_rate_2015"], json!(3.46));
    assert_eq!(first.len(), 3);

    let second = &claimant.features[1].properties;
    assert_eq!(second.len(), 1);
    assert_eq!(second["LSOA11CD"], json!("E01000002"));
}

#[test]
fn test_ranges_fold_years_and_write_report() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let output_path = dir.path().join("output/2013-2015_rate_ranges.txt");
    let config = RangeConfig {
        tables: TableSource::new(dir.path().join("ADI_all-domains"), MissingFilePolicy::Skip),
        from_year: Year::new(2013).unwrap(),
        to_year: Year::new(2015).unwrap(),
        output_path: output_path.clone(),
        format: OutputFormat::Text,
    };

    let aggregate = run_ranges(&config).unwrap();

    // 2013 claimant_rate [1, 2]: mean 1.5, sample std √0.5.
    // 2015 claimant_rate [3.456, 8]: a wider spread.
    let claimant = aggregate.get("claimant_rate").unwrap();
    let std_2013 = 0.5f64.sqrt();
    assert!(claimant.min <= 1.5 - 2.0 * std_2013);
    assert!(claimant.max >= 1.5 + 2.0 * std_2013);
    assert_eq!(claimant.earliest_year, Year::new(2013));

    // crime_rate 2015 has a single numeric value and contributes nothing,
    // leaving the 2013 range of [2.5, 3.5].
    let crime = aggregate.get("crime_rate").unwrap();
    assert!((crime.min - (3.0 - 2.0 * 0.5f64.sqrt())).abs() < 1e-12);
    assert!((crime.max - (3.0 + 2.0 * 0.5f64.sqrt())).abs() < 1e-12);

    assert_eq!(
        aggregate.years,
        vec![Year::new(2013).unwrap(), Year::new(2015).unwrap()]
    );

    let report = fs::read_to_string(&output_path).unwrap();
    let claimant_at = report.find("claimant_rate:").unwrap();
    let crime_at = report.find("crime_rate:").unwrap();
    let health_at = report.find("health_rate:").unwrap();
    assert!(claimant_at < crime_at && crime_at < health_at);
    assert!(report.contains("  Earliest year: 2013\n"));
}

#[test]
fn test_ranges_skip_empty_year_dir_under_fail() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    fs::create_dir_all(dir.path().join("ADI_all-domains/ADI_2014")).unwrap();
    let output_path = dir.path().join("output/2013-2014_rate_ranges.txt");
    let config = RangeConfig {
        tables: TableSource::new(dir.path().join("ADI_all-domains"), MissingFilePolicy::Fail),
        from_year: Year::new(2013).unwrap(),
        to_year: Year::new(2014).unwrap(),
        output_path: output_path.clone(),
        format: OutputFormat::Text,
    };

    let aggregate = run_ranges(&config).unwrap();

    assert_eq!(aggregate.years, vec![Year::new(2013).unwrap()]);
    assert!(output_path.exists());
}

#[test]
fn test_join_skips_empty_year_dir_under_fail() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    fs::remove_dir_all(dir.path().join("ADI_all-domains/ADI_2015")).unwrap();
    fs::create_dir_all(dir.path().join("ADI_all-domains/ADI_2016")).unwrap();
    let config = join_config(
        dir.path(),
        JoinMode::AllFields,
        Retention::MatchedOnly,
        MissingFilePolicy::Fail,
    );

    let summary = run_join(&config).unwrap();

    assert_eq!(summary.rows_read, 6);
    let collection = read_collection(&config.output_path);
    assert_eq!(collection.features.len(), 1);
}

#[test]
fn test_split_never_writes_outside_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(
        &dir.path().join("ADI_all-domains/ADI_2013/ADI_claimant_counts_2013.csv"),
        "area_code,../escaped_rate,claimant_rate\nE01000001,1.0,2.0\n",
    );
    let output_dir = dir.path().join("nested/output");
    let mut join = join_config(
        dir.path(),
        JoinMode::RateOnly,
        Retention::All,
        MissingFilePolicy::Skip,
    );
    join.tables = join.tables.with_domains(vec!["claimant_counts".to_string()]);
    let config = SplitConfig {
        join,
        output_dir: output_dir.clone(),
    };

    let written = run_split(&config).unwrap();

    assert!(!dir.path().join("nested/escaped_rate.geojson").exists());
    assert!(written.iter().all(|p| p.parent() == Some(output_dir.as_path())));
    assert!(output_dir.join("claimant_rate.geojson").exists());
}
