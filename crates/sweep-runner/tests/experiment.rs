//! Experiment files through generation and execution

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use sweep_catalog::{PathResolver, ResultCatalog};
use sweep_runner::prelude::*;
use sweep_test_utils::{write_sample_config, RecordingObserver, ScriptLauncher};

fn write_experiment(dir: &Path, extra: &str) -> std::path::PathBuf {
    write_sample_config(dir, "global.ins");
    let path = dir.join("experiment.toml");
    let text = format!(
        r#"insfiles = ["global.ins"]
pfts = ["TeBE"]
output_directory = "out"
input_module = "nc"
cpu_count = 1
{extra}"#
    );
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn generation_writes_restricted_configs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_experiment(
        dir.path(),
        "[parameters]\nnpatch = [1, 2]\n[parameters.TeBE]\nsla = [11, 12]\n",
    );
    let experiment = ExperimentDefinition::from_file(&path).unwrap();
    let runner = ExperimentRunner::new(experiment.context());

    let batch = runner.generate(&experiment).unwrap();
    let names: Vec<&str> = batch.jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "global/npatch-1_TeBE.sla-11",
            "global/npatch-1_TeBE.sla-12",
            "global/npatch-2_TeBE.sla-11",
            "global/npatch-2_TeBE.sla-12",
        ]
    );

    let config = std::fs::read_to_string(&batch.jobs[3].config).unwrap();
    assert!(config.contains("npatch 2        ! patches per stand\n"));
    assert!(config.contains("pft \"TeBE\" (\n    common\n    include 1\n    sla 12\n)"));
    assert!(config.contains("pft \"C3G\" (\n    common\n    include 0\n    sla 32.4\n)"));

    let catalog = ResultCatalog::new();
    let resolver = PathResolver::new(dir.path().join("out"), experiment.naming);
    let index = catalog.read_index(&resolver).unwrap();
    assert_eq!(index.len(), 4);
    let manifest = catalog.read_manifest(&index.simulations[3]).unwrap();
    assert_eq!(manifest.name, "npatch-2_TeBE.sla-12");
    assert_eq!(manifest.sub_components, vec!["TeBE".to_string()]);
    assert_eq!(manifest.base_config, dir.path().join("global.ins"));
}

#[test]
fn unknown_sub_component_fails_generation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_experiment(dir.path(), "");
    let mut experiment = ExperimentDefinition::from_file(&path).unwrap();
    experiment.sub_components.push("NoSuchPft".to_string());

    let result = ExperimentRunner::new(experiment.context()).generate(&experiment);
    assert!(matches!(result, Err(RunnerError::Factorial(_))));
}

#[test]
fn missing_experiment_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = ExperimentDefinition::from_file(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, RunnerError::Experiment { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn runs_every_generated_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_experiment(dir.path(), "[parameters]\nnpatch = [1, 2, 3]\n");
    let experiment = ExperimentDefinition::from_file(&path).unwrap();
    let observer = Arc::new(RecordingObserver::new());
    let runner = ExperimentRunner::new(experiment.context())
        .with_launcher(Arc::new(ScriptLauncher::inline(
            r#"grep '^npatch' "$1" | cut -d' ' -f2"#,
        )))
        .with_observer(observer.clone());

    let report = runner.run(&experiment).await.unwrap();
    assert_eq!(report.summary().succeeded, 3);
    for (i, expected) in ["1", "2", "3"].into_iter().enumerate() {
        assert_eq!(observer.stdout(JobId(i)), vec![expected]);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn failing_worker_surfaces_model_exception() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_experiment(dir.path(), "");
    let experiment = ExperimentDefinition::from_file(&path).unwrap();
    let runner = ExperimentRunner::new(experiment.context())
        .with_launcher(Arc::new(ScriptLauncher::inline("echo 'no gridlist' >&2; exit 1")));

    let Err(RunnerError::Model(err)) = runner.run(&experiment).await else {
        panic!("expected a model exception");
    };
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].name, "global/Baseline");
    assert_eq!(err.failures[0].exit_code, Some(1));
    assert_eq!(err.failures[0].stderr, vec!["no gridlist"]);
}
