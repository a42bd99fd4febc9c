//! Manifest and index persistence

use pretty_assertions::assert_eq;
use std::path::Path;
use sweep_catalog::prelude::*;
use sweep_catalog::{INDEX_FILE, MANIFEST_FILE};
use sweep_factorial::{Factor, Simulation};

fn manifest_in(dir: &Path) -> SimulationManifest {
    let simulation = Simulation::new(vec![
        Factor::top_level("npatch", "10"),
        Factor::sub_component("TeBE", "sla", "12.5"),
        Factor::composite([Factor::top_level("a", "1"), Factor::Dummy]),
    ]);
    SimulationManifest::new(
        "npatch-10_TeBE.sla-12.5_a-1_Baseline",
        &simulation,
        dir,
        "/models/base.ins",
        dir.join("run.cfg"),
        &["TeBE".to_string(), "C3G".to_string()],
    )
}

#[test]
fn write_simulation_fails_when_directory_missing() {
    let root = tempfile::tempdir().unwrap();
    let manifest = manifest_in(&root.path().join("missing"));
    let err = ResultCatalog::new().write_simulation(&manifest).unwrap_err();
    assert!(matches!(err, CatalogError::DirectoryNotFound { .. }));
    assert!(!root.path().join("missing").exists());
}

#[test]
fn manifest_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let manifest = manifest_in(root.path());
    let catalog = ResultCatalog::new();

    let file = catalog.write_simulation(&manifest).unwrap();
    assert_eq!(file, root.path().join(MANIFEST_FILE));
    assert!(!root.path().join("manifest.toml.tmp").exists());

    let back = catalog.read_manifest(root.path()).unwrap();
    assert_eq!(back, manifest);
    assert_eq!(back.sub_components, vec!["TeBE", "C3G"]);
}

#[tokio::test]
async fn manifest_round_trip_async() {
    let root = tempfile::tempdir().unwrap();
    let manifest = manifest_in(root.path());
    let catalog = ResultCatalog::new();
    catalog.write_simulation(&manifest).unwrap();
    assert_eq!(catalog.read_manifest_async(root.path()).await.unwrap(), manifest);
}

#[test]
fn read_manifest_not_found() {
    let root = tempfile::tempdir().unwrap();
    let err = ResultCatalog::new().read_manifest(root.path()).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[test]
fn index_round_trip_stores_relative_paths() {
    let root = tempfile::tempdir().unwrap();
    let resolver = PathResolver::new(root.path(), NamingStrategy::Manual);
    let catalog = ResultCatalog::new();

    let mut index = SimulationIndex::new();
    index.push(root.path().join("base/a-1"));
    index.push(root.path().join("base/a-2"));
    catalog.write_index(&resolver, &index).unwrap();

    let stored = std::fs::read_to_string(root.path().join(INDEX_FILE)).unwrap();
    assert!(stored.contains("\"base/a-1\""));
    assert!(!stored.contains(&root.path().display().to_string()));

    assert_eq!(catalog.read_index(&resolver).unwrap(), index);
}

#[tokio::test]
async fn read_index_not_found() {
    let root = tempfile::tempdir().unwrap();
    let resolver = PathResolver::new(root.path(), NamingStrategy::Manual);
    let catalog = ResultCatalog::new();
    assert!(matches!(catalog.read_index(&resolver), Err(CatalogError::NotFound { .. })));
    assert!(matches!(
        catalog.read_index_async(&resolver).await,
        Err(CatalogError::NotFound { .. })
    ));
}
