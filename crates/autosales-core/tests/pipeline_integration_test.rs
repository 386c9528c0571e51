//! Integration tests for the extract → transform → load pipeline
//!
//! Tests run against the `fixtures/five_sales.csv` dataset (5 valid sales
//! across 3 states, 2 sellers and 2 dates, plus one row from a non-U.S.
//! province) and an in-memory sink:
//! - Extraction from a local CSV and from a ZIP archive
//! - Dimension deduplication and row counts
//! - Referential integrity of every fact row

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use autosales_core::extract::{extract, source_for};
use autosales_core::model::{Dimension, SurrogateKey};
use autosales_core::transform::{RejectReason, transform};
use autosales_core::{Config, Loader, MemorySink, StagedTables};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/five_sales.csv")
}

/// Create a project directory with a config pointing at `dataset`
fn setup_project(dataset: &Path) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("autosales.yaml"),
        format!(
            "name: pipeline-test\ndataset:\n  source: local\n  local_path: {}\n",
            dataset.display()
        ),
    )
    .unwrap();
    let config = Config::load(dir.path()).unwrap();
    (dir, config)
}

async fn run_to_memory(config: &Config) -> MemorySink {
    let source = source_for(config, None).unwrap();
    let raw = extract(
        source.as_ref(),
        &config.raw_dir(),
        &config.project.dataset.file_name,
        false,
    )
    .await
    .unwrap();

    let staged = StagedTables::new(config.staging_dir());
    transform(&raw.csv_path, &staged).unwrap();

    let mut sink = MemorySink::new();
    Loader::new(&mut sink, config.project.database.batch_size)
        .load(&staged)
        .await
        .unwrap();
    sink
}

// =============================================================================
// Complete Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_row_counts_match_distinct_entities() {
    let (_dir, config) = setup_project(&fixture());
    let sink = run_to_memory(&config).await;

    let counts = sink.row_counts();
    assert_eq!(counts["date_dim"], 2);
    assert_eq!(counts["state_dim"], 3);
    assert_eq!(counts["seller_dim"], 2);
    assert_eq!(counts["vehicle_dim"], 4);
    assert_eq!(counts["sales_fact"], 5);
}

#[tokio::test]
async fn test_pipeline_facts_reference_existing_dimensions() {
    let (_dir, config) = setup_project(&fixture());
    let sink = run_to_memory(&config).await;

    assert!(sink.violations().is_empty(), "{:?}", sink.violations());

    let states: HashMap<SurrogateKey, &str> = sink
        .states
        .iter()
        .map(|s| (s.key, s.row.state_code.as_str()))
        .collect();
    let sellers: HashMap<SurrogateKey, &str> = sink
        .sellers
        .iter()
        .map(|s| (s.key, s.row.seller_name.as_str()))
        .collect();

    let mut by_state: HashMap<&str, (u64, i64)> = HashMap::new();
    let mut by_seller: HashMap<&str, (u64, i64)> = HashMap::new();
    for sale in &sink.sales {
        let s = by_state.entry(states[&sale.state_key]).or_default();
        s.0 += 1;
        s.1 += sale.selling_price;
        let s = by_seller.entry(sellers[&sale.seller_key]).or_default();
        s.0 += 1;
        s.1 += sale.selling_price;
    }

    assert_eq!(by_state["CA"], (2, 50_000));
    assert_eq!(by_state["TX"], (2, 39_000));
    assert_eq!(by_state["FL"], (1, 15_000));
    assert_eq!(by_seller["acme auto group"], (3, 59_000));
    assert_eq!(by_seller["globex remarketing"], (2, 45_000));
}

#[tokio::test]
async fn test_pipeline_from_zip_archive() {
    let scratch = TempDir::new().unwrap();
    let archive = scratch.path().join("vehicle-sales-data.zip");
    {
        let file = std::fs::File::create(&archive).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(
            "car_prices.csv",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(&std::fs::read(fixture()).unwrap()).unwrap();
        zip.finish().unwrap();
    }

    let (_dir, config) = setup_project(&archive);
    let sink = run_to_memory(&config).await;
    assert_eq!(sink.sales.len(), 5);
    assert!(sink.violations().is_empty());
}

// =============================================================================
// Transform Report Tests
// =============================================================================

#[test]
fn test_transform_report_for_fixture() {
    let dir = TempDir::new().unwrap();
    let staged = StagedTables::new(dir.path().join("staging"));
    let report = transform(&fixture(), &staged).unwrap();

    assert_eq!(report.rows_read, 6);
    assert_eq!(report.rows_staged, 5);
    assert_eq!(report.rejected.get(&RejectReason::UnknownState), Some(&1));
    assert_eq!(report.distinct(Dimension::Date), 2);
    assert_eq!(report.distinct(Dimension::State), 3);
    assert!(report.near_duplicate_sellers.is_empty());
    assert!(staged.is_complete());
}
