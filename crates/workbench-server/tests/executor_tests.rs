use std::sync::Arc;
use workbench_core::{
    Algorithm, AlgorithmError, LockedModels, Model, ModelId, Workspace, WorkspaceError, XmlElement,
};
use workbench_server::{ExecutionError, JobExecutor};
use workbench_test_utils::{
    CopyAlgorithm, FailingAlgorithm, ImageModel, OverlapProbe, PanickingAlgorithm, ScaleAlgorithm,
    SleepAlgorithm,
};

/// Names the same model twice and reads both handles
#[derive(Debug)]
struct Twice(ModelId);

impl Algorithm for Twice {
    fn type_name(&self) -> &str {
        "Twice"
    }

    fn model_refs(&self) -> Vec<ModelId> {
        vec![self.0.clone(), self.0.clone()]
    }

    fn run(&mut self, models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError> {
        assert_eq!(models.len(), 1);
        assert!(models.get(&self.0).is_some());
        Ok(Vec::new())
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new("Twice")
    }
}

fn executor_with(images: &[(&str, usize, usize)]) -> JobExecutor {
    let workspace = Arc::new(Workspace::new());
    for &(id, w, h) in images {
        workspace.insert(Box::new(ImageModel::new(id, w, h)));
    }
    JobExecutor::new(workspace)
}

#[test]
fn results_keep_algorithm_order() {
    let executor = executor_with(&[("X", 2, 2)]);
    let results = executor.execute(&mut CopyAlgorithm::new("X", 4)).unwrap();

    let ids: Vec<&str> = results.iter().map(|m| m.id().as_str()).collect();
    assert_eq!(ids, ["X_copy1", "X_copy2", "X_copy3", "X_copy4"]);
}

#[test]
fn in_place_changes_persist() {
    let executor = executor_with(&[("X", 3, 1)]);
    executor.execute(&mut ScaleAlgorithm::new("X", 10.0)).unwrap();

    let stored = executor
        .workspace()
        .with_model(&ModelId::new("X"), |m| {
            m.as_any().downcast_ref::<ImageModel>().map(|i| i.pixels.clone())
        })
        .flatten();
    assert_eq!(stored, Some(vec![0.0, 10.0, 20.0]));
}

#[test]
fn incomplete_parameters_never_run() {
    let executor = executor_with(&[]);
    let err = executor.execute(&mut CopyAlgorithm::new("", 1)).unwrap_err();
    assert!(matches!(err, ExecutionError::ParametersUnavailable));
    assert!(err.is_explainable());
}

#[test]
fn missing_model_is_reported() {
    let executor = executor_with(&[("X", 1, 1)]);
    let err = executor.execute(&mut CopyAlgorithm::new("Y", 1)).unwrap_err();
    match err {
        ExecutionError::Workspace(WorkspaceError::ModelNotFound(id)) => assert_eq!(id.as_str(), "Y"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn algorithm_error_is_explainable() {
    let executor = executor_with(&[]);
    let err = executor.execute(&mut FailingAlgorithm::new("bad kernel")).unwrap_err();
    match &err {
        ExecutionError::Explainable(message) => assert_eq!(message, "bad kernel"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_explainable());
}

#[test]
fn panic_is_contained_and_unlocks() {
    let executor = executor_with(&[("X", 1, 1)]);
    let mut algorithm = PanickingAlgorithm {
        target: Some(ModelId::new("X")),
    };

    let err = executor.execute(&mut algorithm).unwrap_err();
    assert!(matches!(err, ExecutionError::NonExplainable));
    assert!(!err.is_explainable());

    let entry = executor.workspace().get(&ModelId::new("X")).unwrap();
    assert!(!entry.is_locked());
    assert!(executor.execute(&mut CopyAlgorithm::new("X", 1)).is_ok());
}

#[test]
fn duplicate_references_lock_once() {
    let executor = executor_with(&[("X", 1, 1)]);
    assert!(executor.execute(&mut Twice(ModelId::new("X"))).unwrap().is_empty());
}

#[test]
fn jobs_on_one_model_never_overlap() {
    let executor = executor_with(&[("X", 1, 1)]);
    let probe = Arc::new(OverlapProbe::default());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let executor = executor.clone();
            let probe = Arc::clone(&probe);
            scope.spawn(move || {
                let mut job = SleepAlgorithm {
                    target: ModelId::new("X"),
                    millis: 30,
                    probe,
                };
                executor.execute(&mut job).unwrap();
            });
        }
    });

    assert_eq!(probe.max_overlap(), 1);
}

#[test]
fn jobs_on_different_models_run_together() {
    let executor = executor_with(&[("X", 1, 1), ("Y", 1, 1)]);
    let probe = Arc::new(OverlapProbe::default());
    let barrier = std::sync::Barrier::new(2);

    std::thread::scope(|scope| {
        for id in ["X", "Y"] {
            let executor = executor.clone();
            let probe = Arc::clone(&probe);
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                let mut job = SleepAlgorithm {
                    target: ModelId::new(id),
                    millis: 300,
                    probe,
                };
                executor.execute(&mut job).unwrap();
            });
        }
    });

    assert_eq!(probe.max_overlap(), 2);
}
