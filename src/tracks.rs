//! Per-cell trajectories across a time series.

use mcds_common::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{LoadError, Result};
use crate::series::TimeSeries;
use crate::timestep::Timestep;

const POSITION_FIELDS: [&str; 3] = ["position_x", "position_y", "position_z"];

/// Where one cell was at one simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub time: f64,
    pub position: Point3,
}

/// Trajectories keyed by cell `ID`. Each track is ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellTracks {
    tracks: BTreeMap<u64, Vec<TrackPoint>>,
}

impl CellTracks {
    /// Collects the position of every cell in every timestep of `series`.
    pub fn from_series(series: &TimeSeries) -> Result<Self> {
        let mut tracks = CellTracks::default();
        for timestep in series {
            tracks.push_timestep(timestep)?;
        }
        for track in tracks.tracks.values_mut() {
            track.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        Ok(tracks)
    }

    fn push_timestep(&mut self, timestep: &Timestep) -> Result<()> {
        let cells = timestep.cells();
        let field = |name: &str| {
            cells
                .field(name)
                .ok_or_else(|| LoadError::MissingCellField(name.to_string()))
        };
        let ids = field("ID")?;
        let [xs, ys, zs] = [field(POSITION_FIELDS[0])?, field(POSITION_FIELDS[1])?, field(POSITION_FIELDS[2])?];

        let time = timestep.time();
        for (row, &id) in ids.iter().enumerate() {
            if id < 0.0 || id.fract() != 0.0 {
                return Err(LoadError::invalid("cells/ID", &id.to_string(), "cell IDs must be non-negative integers"));
            }
            let position = Point3::from_array([xs[row], ys[row], zs[row]]);
            self.tracks
                .entry(id as u64)
                .or_default()
                .push(TrackPoint { time, position });
        }
        Ok(())
    }

    /// Number of distinct cells seen.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&[TrackPoint]> {
        self.tracks.get(&id).map(Vec::as_slice)
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tracks.keys().copied()
    }

    /// Straight-line distance between a cell's first and last sample.
    pub fn displacement(&self, id: u64) -> Option<f64> {
        let track = self.tracks.get(&id)?;
        let first = track.first()?.position;
        let last = track.last()?.position;
        let d = (last - first).to_array();
        Some(d.iter().map(|c| c * c).sum::<f64>().sqrt())
    }

    /// Writes `ID,time,x,y,z` rows, grouped by cell and ordered by time.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["ID", "time", "x", "y", "z"])?;
        for (id, track) in &self.tracks {
            for point in track {
                let [x, y, z] = point.position.to_array();
                writer.write_record(&[
                    id.to_string(),
                    point.time.to_string(),
                    format!("{:.4}", x),
                    format!("{:.4}", y),
                    format!("{:.4}", z),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}
