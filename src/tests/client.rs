use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::mock::*;

use crate::progress::ProgressState;
use crate::simulation::{SimulationInput, SimulationStatus, SimulationType};
use crate::study::ParametricStudy;
use crate::{Additive, ClientConfig, Error};

fn client(conn: &Arc<ScriptedConnection>, user_data_path: &Path) -> Additive {
    let config = ClientConfig {
        poll_interval: 0.0,
        cancel_delay: 0,
        max_poll_failures: 2,
        user_data_path: user_data_path.to_path_buf(),
        ..ClientConfig::default()
    };
    Additive::new(conn.clone(), config)
}

fn without_material(mut input: SimulationInput) -> SimulationInput {
    if let SimulationInput::Porosity(ref mut i) = input {
        i.material.clear();
    }
    input
}

#[test]
fn empty_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();

    assert!(matches!(
        client(&conn, dir.path()).simulate_async(Vec::new()),
        Err(Error::NoInputs)
    ));
}

#[test]
fn duplicate_id_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();
    let inputs = vec![porosity_input("a"), porosity_input("b"), porosity_input("a")];

    let result = client(&conn, dir.path()).simulate_async(inputs);

    assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "a"));
    assert!(conn.submits.lock().is_empty());
}

#[test]
fn missing_material_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();
    let inputs = vec![porosity_input("a"), without_material(porosity_input("b"))];

    let result = client(&conn, dir.path()).simulate_async(inputs);

    assert!(matches!(result, Err(Error::MissingMaterial(id)) if id == "b"));
    assert!(conn.submits.lock().is_empty());
}

#[test]
fn inputs_without_id_are_given_one() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();

    let manager = client(&conn, dir.path())
        .simulate_async(vec![porosity_input(""), porosity_input("")])
        .unwrap();

    let ids = manager.simulation_ids();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn unrepresentable_poll_interval_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();
    let config = ClientConfig {
        poll_interval: 1e20,
        user_data_path: dir.path().to_path_buf(),
        ..ClientConfig::default()
    };
    let client = Additive::new(conn.clone(), config);

    assert!(matches!(
        client.simulate_async(vec![porosity_input("a")]),
        Err(Error::InvalidConfig(_))
    ));
    assert!(conn.submits.lock().is_empty());
}

#[test]
fn rejected_submission_becomes_failed_task() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::rejecting(&["b"]);
    conn.script("a", vec![porosity_done("a", 0.9)]);
    conn.script("c", vec![porosity_done("c", 0.8)]);

    let manager = client(&conn, dir.path())
        .simulate(
            vec![porosity_input("a"), porosity_input("b"), porosity_input("c")],
            None,
        )
        .unwrap();

    assert_eq!(*conn.submits.lock(), vec!["a", "b", "c"]);
    assert_eq!(manager.summaries().len(), 2);
    let errors = manager.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].simulation_id, "b");
    assert_eq!(errors[0].message, "Connection error: server unavailable");
    assert_eq!(manager.tasks()[1].operation_name(), None);
}

#[test]
fn simulate_waits_and_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    let conn = ScriptedConnection::new();
    conn.script("a", vec![running("a", 50, ""), porosity_done("a", 0.9)]);
    conn.script("b", vec![failed("b", "overflow")]);
    let handler = RecordingHandler::default();

    let manager = client(&conn, dir.path())
        .simulate(
            vec![porosity_input("a"), porosity_input("b")],
            Some(&handler),
        )
        .unwrap();

    assert!(manager.done());
    assert_eq!(manager.summaries()[0].simulation_id(), "a");
    assert_eq!(manager.errors()[0].message, "overflow");
    assert!(handler
        .states()
        .contains(&("b".to_string(), ProgressState::Error)));
}

#[test]
fn run_study_updates_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = ParametricStudy::open(dir.path().join("study")).unwrap();
    study
        .add_inputs(
            &[porosity_input("a"), without_material(porosity_input("b"))],
            1,
            0,
            SimulationStatus::Pending,
        )
        .unwrap();
    study
        .add_inputs(&[porosity_input("c")], 2, 0, SimulationStatus::Pending)
        .unwrap();
    study
        .add_inputs(&[single_bead_input("d")], 1, 0, SimulationStatus::Pending)
        .unwrap();
    let study = Arc::new(Mutex::new(study));

    let conn = ScriptedConnection::new();
    conn.script("a", vec![running("a", 30, ""), porosity_done("a", 0.97)]);
    conn.script("c", vec![failed("c", "overflow")]);

    let manager = client(&conn, dir.path())
        .run_study(&study, Some(&[SimulationType::Porosity]), None)
        .unwrap();

    assert_eq!(manager.simulation_ids(), vec!["a", "c"]);

    let study = study.lock();
    let a = study.row("a").unwrap();
    assert_eq!(a.status, SimulationStatus::Completed);
    assert_eq!(a.results.relative_density, Some(0.97));
    let c = study.row("c").unwrap();
    assert_eq!(c.status, SimulationStatus::Error);
    assert_eq!(c.error_message.as_deref(), Some("overflow"));
    // no material, and filtered out by type
    assert_eq!(study.row("b").unwrap().status, SimulationStatus::Pending);
    assert_eq!(study.row("d").unwrap().status, SimulationStatus::Pending);

    let saved = ParametricStudy::load(study.path()).unwrap();
    assert_eq!(saved.row("a").unwrap().status, SimulationStatus::Completed);
}

#[test]
fn run_study_without_pending_rows_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let study = Arc::new(Mutex::new(
        ParametricStudy::open(dir.path().join("empty")).unwrap(),
    ));
    let conn = ScriptedConnection::new();

    let manager = client(&conn, dir.path()).run_study(&study, None, None).unwrap();

    assert!(manager.tasks().is_empty());
    assert!(conn.submits.lock().is_empty());
}
