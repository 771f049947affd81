mod common;

use approx::assert_relative_eq;
use common::{Agent, Fixture};
use mcds_loader::{export, CellTracks, LoadError, LoaderSettings, TimeSeries};

/// Three timesteps, 60 min apart; agent 0 walks along x, agent 5 appears late.
fn write_run(dir: &std::path::Path) {
    for (index, step) in [0.0, 1.0, 2.0].iter().enumerate() {
        let mut agents = vec![Agent { id: 0.0, position: [4.0 * step, 3.0 * step, 0.0], volume: 2494.0 }];
        if *step >= 1.0 {
            agents.push(Agent { id: 5.0, position: [18.0, 18.0, 0.0], volume: 2494.0 });
        }
        let fixture = Fixture { time: 60.0 * step, agents, ..Fixture::default() };
        fixture.write(dir, index as u32);
    }
}

#[test]
fn series_loads_in_manifest_order() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    std::fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

    let settings = LoaderSettings::default();
    let parallel = TimeSeries::load(dir.path(), "output", &settings, true).unwrap();
    let serial = TimeSeries::load(dir.path(), "output", &settings, false).unwrap();

    assert_eq!(parallel.len(), 3);
    assert_eq!(parallel.times(), vec![0.0, 60.0, 120.0]);
    assert_eq!(parallel.times(), serial.times());
    assert_eq!(parallel.get(2).unwrap().cells().len(), 2);
    assert!(parallel.get(3).is_none());
}

#[test]
fn one_broken_timestep_fails_the_series() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    std::fs::remove_file(dir.path().join(common::mesh_file(1))).unwrap();

    let result = TimeSeries::load(dir.path(), "output", &LoaderSettings::default(), true);
    assert!(matches!(result, Err(LoadError::ReferencedFile { .. })));
}

#[test]
fn tracks_follow_each_cell_id() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let series = TimeSeries::load(dir.path(), "output", &LoaderSettings::default(), true).unwrap();

    let tracks = CellTracks::from_series(&series).unwrap();
    assert_eq!(tracks.ids().collect::<Vec<_>>(), vec![0, 5]);

    let walker = tracks.get(0).unwrap();
    assert_eq!(walker.len(), 3);
    assert_eq!(walker.iter().map(|p| p.time).collect::<Vec<_>>(), vec![0.0, 60.0, 120.0]);
    assert_relative_eq!(walker[2].position.x, 8.0);
    assert_relative_eq!(tracks.displacement(0).unwrap(), 10.0);

    assert_eq!(tracks.get(5).unwrap().len(), 2);
    assert_relative_eq!(tracks.displacement(5).unwrap(), 0.0);
}

#[test]
fn export_writes_summary_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let series = TimeSeries::load(dir.path(), "output", &LoaderSettings::default(), false).unwrap();

    let out = tempfile::tempdir().unwrap();
    let base = out.path().join("run");
    let snapshots: Vec<_> = series.iter().map(|t| t.snapshot()).collect();
    let summary = export::save_snapshots(&snapshots, &base, "json").unwrap();
    let text = std::fs::read_to_string(summary).unwrap();
    assert!(text.contains("\"manifest\":\"output00000002.xml\""));

    let tables = export::save_cell_tables(&series, &base).unwrap();
    assert_eq!(tables.len(), 3);
    assert!(tables[0].ends_with("run_output00000000_cells.csv"));
    let first = std::fs::read_to_string(&tables[0]).unwrap();
    assert_eq!(first.lines().next(), Some("ID,position_x,position_y,position_z,total_volume"));

    let tracks = CellTracks::from_series(&series).unwrap();
    let path = export::save_tracks(&tracks, &base).unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1 + 3 + 2);
}
