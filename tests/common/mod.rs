//! Writes synthetic simulator output (manifest plus matrix files) into a temp directory.

#![allow(dead_code)]

use mcds_loader::matlab::save_matrix;
use ndarray::Array2;
use std::path::Path;

pub const SUBSTRATES: [&str; 2] = ["oxygen", "immunostimulatory factor"];

/// One agent: `ID`, position and total volume.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub id: f64,
    pub position: [f64; 3],
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub time: f64,
    pub agents: Vec<Agent>,
    /// Write voxels in reverse of the simulator's x-fastest order.
    pub reverse_voxels: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            x: vec![0.0, 10.0, 20.0],
            y: vec![0.0, 10.0, 20.0],
            z: vec![0.0],
            time: 120.0,
            agents: vec![
                Agent { id: 0.0, position: [12.0, 9.0, 0.0], volume: 2494.0 },
                Agent { id: 1.0, position: [15.0, 10.0, 0.0], volume: 2500.0 },
                Agent { id: 2.0, position: [-3.0, 21.0, 0.0], volume: 2494.0 },
            ],
            reverse_voxels: false,
        }
    }
}

/// Concentration of substrate `s` in voxel `(i, j, k)`; unique per voxel and substrate.
pub fn concentration(s: usize, i: usize, j: usize, k: usize) -> f64 {
    100.0 * s as f64 + 10.0 * i as f64 + j as f64 + 0.5 * k as f64
}

pub fn manifest_name(index: u32) -> String {
    format!("output{:08}.xml", index)
}

pub fn mesh_file(index: u32) -> String {
    format!("output{:08}_mesh0.mat", index)
}

pub fn microenvironment_file(index: u32) -> String {
    format!("output{:08}_microenvironment0.mat", index)
}

pub fn cells_file(index: u32) -> String {
    format!("output{:08}_cells.mat", index)
}

fn join(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" ")
}

impl Fixture {
    /// Voxel `(i, j, k)` triples in file order.
    pub fn voxel_order(&self) -> Vec<(usize, usize, usize)> {
        let mut order = Vec::new();
        for k in 0..self.z.len() {
            for j in 0..self.y.len() {
                for i in 0..self.x.len() {
                    order.push((i, j, k));
                }
            }
        }
        if self.reverse_voxels {
            order.reverse();
        }
        order
    }

    pub fn manifest_xml(&self, index: u32) -> String {
        let mut variables = String::new();
        for (id, name) in SUBSTRATES.iter().enumerate() {
            variables.push_str(&format!(
                r#"        <variable name="{}" units="dimensionless" ID="{}">
          <physical_parameter_set>
            <conditions />
            <diffusion_coefficient units="micron^2/min">1000.000000</diffusion_coefficient>
            <decay_rate units="1/min">0.100000</decay_rate>
          </physical_parameter_set>
        </variable>
"#,
                name, id
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<MultiCellDS version="2" type="snapshot/simulation">
  <metadata>
    <current_time units="min">{time:.6}</current_time>
    <current_runtime units="sec">1.500000</current_runtime>
  </metadata>
  <microenvironment>
    <domain name="microenvironment">
      <mesh type="Cartesian" uniform="true" regular="true" units="micron">
        <x_coordinates delimiter=" ">{x}</x_coordinates>
        <y_coordinates delimiter=" ">{y}</y_coordinates>
        <z_coordinates delimiter=" ">{z}</z_coordinates>
        <voxels type="matlab">
          <filename>{mesh}</filename>
        </voxels>
      </mesh>
      <variables>
{variables}      </variables>
      <data type="matlab">
        <filename>{micro}</filename>
      </data>
    </domain>
  </microenvironment>
  <cellular_information>
    <cell_populations>
      <cell_population type="individual">
        <custom>
          <simplified_data type="matlab" source="PhysiCell" data_version="2">
            <labels>
              <label index="0" size="1">ID</label>
              <label index="1" size="3">position</label>
              <label index="4" size="1">total volume</label>
            </labels>
            <filename>{cells}</filename>
          </simplified_data>
        </custom>
      </cell_population>
    </cell_populations>
  </cellular_information>
</MultiCellDS>
"#,
            time = self.time,
            x = join(&self.x),
            y = join(&self.y),
            z = join(&self.z),
            mesh = mesh_file(index),
            micro = microenvironment_file(index),
            cells = cells_file(index),
            variables = variables,
        )
    }

    /// Rows 0-3 of the mesh and microenvironment matrices.
    fn voxel_rows(&self, extra_rows: usize) -> Array2<f64> {
        let order = self.voxel_order();
        let volume = 1000.0;
        let mut matrix = Array2::zeros((4 + extra_rows, order.len()));
        for (col, &(i, j, k)) in order.iter().enumerate() {
            matrix[[0, col]] = self.x[i];
            matrix[[1, col]] = self.y[j];
            matrix[[2, col]] = self.z[k];
            matrix[[3, col]] = volume;
            for s in 0..extra_rows {
                matrix[[4 + s, col]] = concentration(s, i, j, k);
            }
        }
        matrix
    }

    pub fn cell_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((5, self.agents.len()));
        for (col, agent) in self.agents.iter().enumerate() {
            matrix[[0, col]] = agent.id;
            matrix[[1, col]] = agent.position[0];
            matrix[[2, col]] = agent.position[1];
            matrix[[3, col]] = agent.position[2];
            matrix[[4, col]] = agent.volume;
        }
        matrix
    }

    /// Writes manifest `index` and its three matrix files into `dir`; returns the manifest name.
    pub fn write(&self, dir: &Path, index: u32) -> String {
        std::fs::write(dir.join(manifest_name(index)), self.manifest_xml(index)).unwrap();
        save_matrix(dir.join(mesh_file(index)), "mesh", &self.voxel_rows(0)).unwrap();
        save_matrix(
            dir.join(microenvironment_file(index)),
            "multiscale_microenvironment",
            &self.voxel_rows(SUBSTRATES.len()),
        )
        .unwrap();
        save_matrix(dir.join(cells_file(index)), "cells", &self.cell_matrix()).unwrap();
        manifest_name(index)
    }
}
