//! Generating simulation configs on disk

use pretty_assertions::assert_eq;
use std::fs;
use sweep_document::ConfigDocument;
use sweep_factorial::prelude::*;

const BASE: &str = "\
title \"base\"
npatch 5

pft \"TeBE\" (
    include 1
    sla 10
)

pft \"C3G\" (
    include 1
    sla 30
)
";

#[test]
fn three_by_two_generates_six_distinct_configs() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ins");
    fs::write(&base, BASE).unwrap();

    let generator = SimulationGenerator::new(
        vec![
            FactorGenerator::top_level("npatch", ValueGenerator::discrete([1_i64, 2, 3])),
            FactorGenerator::block("pft", "C3G", "sla", ValueGenerator::discrete([25.0, 35.5])),
        ],
        true,
    );
    let simulations = generator.simulations().unwrap();
    assert_eq!(simulations.len(), 6);

    let mut rendered = Vec::new();
    for sim in &simulations {
        let target = dir.path().join(format!("{}.ins", sim.name));
        sim.generate(&base, &target, &["C3G"]).unwrap();
        rendered.push(fs::read_to_string(&target).unwrap());
    }
    rendered.sort();
    rendered.dedup();
    assert_eq!(rendered.len(), 6);

    let last = ConfigDocument::read(dir.path().join("npatch-3_C3G.sla-35.5.ins")).unwrap();
    assert_eq!(last.top_level_parameter("npatch").unwrap().as_int().unwrap(), 3);
    assert_eq!(last.block_parameter("pft", "C3G", "sla").unwrap().raw(), "35.5");
    assert_eq!(last.block_parameter("pft", "TeBE", "include").unwrap().raw(), "0");
    assert_eq!(last.block_parameter("pft", "C3G", "include").unwrap().raw(), "1");
}

#[test]
fn empty_allow_list_leaves_sub_components_alone() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ins");
    fs::write(&base, BASE).unwrap();
    let target = dir.path().join("out.ins");

    Simulation::baseline()
        .generate::<&str>(&base, &target, &[])
        .unwrap();
    assert_eq!(fs::read_to_string(target).unwrap(), BASE);
}

#[test]
fn unknown_block_fails_generation() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.ins");
    fs::write(&base, BASE).unwrap();

    let sim = Simulation::new(vec![Factor::sub_component("BoNE", "sla", "1")]);
    let err = sim
        .generate::<&str>(&base, &dir.path().join("x.ins"), &[])
        .unwrap_err();
    assert!(matches!(err, FactorialError::Document(e) if e.is_not_found()));
}
