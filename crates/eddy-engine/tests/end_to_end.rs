//! Full sessions on an in-process rank group: configuration shared from
//! rank 0, analyses built from it, and the stream driven to completion.

use std::fs;
use std::path::Path;

use eddy_comm::LocalGroup;
use eddy_core::{Communicator, MemoryAdaptor, SharedComm, StepData};
use eddy_engine::{build_analyses, ConfigError, Session, SessionConfig, SessionError};
use eddy_test_utils::fixtures::cell_block;

const STEPS: i64 = 4;

fn write_config(dir: &Path, mode: &str) -> std::path::PathBuf {
    let out = dir.join("out");
    let text = format!(
        r#"
        log_level = "debug"

        [[analysis]]
        type = "histogram"
        mesh = "mesh"
        array = "data"
        association = "cell"
        bins = 4

        [[analysis]]
        type = "posthoc"
        output_dir = "{}"
        mode = "{mode}"

        [[analysis.requirements]]
        mesh = "mesh"
        cell_arrays = ["data"]
        "#,
        out.display()
    );
    let path = dir.join("session.toml");
    fs::write(&path, text).unwrap();
    path
}

fn rank_stream(rank: usize) -> MemoryAdaptor {
    MemoryAdaptor::new((0..STEPS).map(|s| {
        let v = (rank as i64 * 100 + s) as f64;
        StepData::new(s, s as f64).with_mesh("mesh", cell_block("data", &[v, v + 1.0]))
    }))
}

#[test]
fn configured_session_runs_on_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "visit");

    let results = LocalGroup::run(3, |comm| {
        let rank = comm.rank();
        let shared: SharedComm = comm;
        let config = SessionConfig::load_collective(shared.as_ref(), &config_path)?;
        config.init_logging();
        let analyses = build_analyses(&config, &shared)?;
        let mut session = Session::new(rank_stream(rank), analyses).with_comm(shared);
        session.run().map_err(|e| ConfigError::Invalid(e.to_string()))
    })
    .unwrap();

    for r in &results {
        let report = r.as_ref().unwrap();
        assert_eq!(report.steps, STEPS as u64);
        assert!(report.metrics.iter().all(|m| m.analysis_us.len() == 2));
    }

    let out = dir.path().join("out");
    let index = fs::read_to_string(out.join("mesh.visit")).unwrap();
    assert!(index.starts_with("!NBLOCKS 3\n"));
    let files: Vec<&str> = index.lines().filter(|l| !l.starts_with('!')).collect();
    assert_eq!(files.len(), 3 * STEPS as usize);
    for f in files {
        assert!(out.join(f).is_file(), "missing {f}");
    }
}

#[test]
fn unreadable_config_fails_on_every_rank_without_hanging() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let results = LocalGroup::run(3, |comm| {
        let shared: SharedComm = comm;
        SessionConfig::load_collective(shared.as_ref(), &missing).map(|_| ())
    })
    .unwrap();
    for r in results {
        assert!(matches!(r, Err(ConfigError::Io { .. })), "{r:?}");
    }
}

#[test]
fn one_failing_rank_stops_the_session_on_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "paraview");

    let results = LocalGroup::run(2, |comm| {
        let rank = comm.rank();
        let shared: SharedComm = comm;
        let config = SessionConfig::load_collective(shared.as_ref(), &config_path).unwrap();
        let analyses = build_analyses(&config, &shared).unwrap();
        // Rank 1 serves a mesh named differently: its histogram fails on
        // the first step after completing its collectives.
        let mesh = if rank == 1 { "other" } else { "mesh" };
        let stream = MemoryAdaptor::new(
            (0..STEPS)
                .map(|s| StepData::new(s, s as f64).with_mesh(mesh, cell_block("data", &[1.0]))),
        );
        Session::new(stream, analyses).with_comm(shared).run().map(|r| r.steps)
    })
    .unwrap();

    match &results[0] {
        Err(SessionError::PeerFailed { analysis, time_step }) => {
            assert_eq!(analysis, "histogram");
            assert_eq!(*time_step, 0);
        }
        other => panic!("expected rank 0 to stop with its peer, got {other:?}"),
    }
    match &results[1] {
        Err(SessionError::Execute { analysis, time_step, .. }) => {
            assert_eq!(analysis, "histogram");
            assert_eq!(*time_step, 0);
        }
        other => panic!("expected execute failure on rank 1, got {other:?}"),
    }
    // The session ended before the writer ran, so nothing was finalized.
    assert!(!dir.path().join("out").join("mesh.pvd").exists());
}
