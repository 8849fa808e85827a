// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decomposition tool backends
//!
//! Each backend knows its tool's command line, working-directory layout and
//! object naming. Parameters come in ten detail presets, from `D01` (fewest,
//! coarsest hulls) to `D10` (most detail preserved).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Detail preset, coarse to fine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetailPreset {
    D01,
    D02,
    D03,
    D04,
    #[default]
    D05,
    D06,
    D07,
    D08,
    D09,
    D10,
}

impl DetailPreset {
    pub const ALL: [DetailPreset; 10] = [
        DetailPreset::D01,
        DetailPreset::D02,
        DetailPreset::D03,
        DetailPreset::D04,
        DetailPreset::D05,
        DetailPreset::D06,
        DetailPreset::D07,
        DetailPreset::D08,
        DetailPreset::D09,
        DetailPreset::D10,
    ];

    /// Zero-based position in [`DetailPreset::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Command line and output location for one job
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub expected_output: PathBuf,
}

/// One external decomposition tool
pub trait DecompositionBackend {
    /// Display name, e.g. `V-HACD`
    fn tool_name(&self) -> &str;

    /// Prefix for created object names, e.g. `VHACD`
    fn tool_tag(&self) -> &str;

    /// Prefix of the per-job working directory
    fn temp_prefix(&self) -> &str;

    /// Result file the tool writes inside the working directory
    fn output_file_name(&self) -> &str;

    /// Fail early, before any file is written
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Write auxiliary files into `work_dir` and build the command line
    ///
    /// `input` is the exported mesh inside `work_dir`.
    fn prepare(&self, work_dir: &Path, input: &Path) -> Result<LaunchPlan>;
}

fn require_executable(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::ToolNotFound(path.to_path_buf()))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn flag(value: bool) -> String {
    let text = if value { "true" } else { "false" };
    text.to_string()
}

// ============================================================================
// V-HACD
// ============================================================================

/// Voxel fill strategy for V-HACD
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Flood,
    Surface,
    Raycast,
}

impl FillMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FillMode::Flood => "flood",
            FillMode::Surface => "surface",
            FillMode::Raycast => "raycast",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhacdParams {
    pub max_convex_hulls: u32,
    pub resolution: u32,
    /// Percent volume error at which recursion stops
    pub min_volume_error: f64,
    pub max_recursion_depth: u32,
    pub max_vertices_per_hull: u32,
    pub min_edge_length: u32,
    pub find_best_plane: bool,
    pub shrink_wrap: bool,
    pub fill_mode: FillMode,
}

impl Default for VhacdParams {
    fn default() -> Self {
        Self::preset(DetailPreset::D05)
    }
}

impl VhacdParams {
    pub fn preset(preset: DetailPreset) -> Self {
        let (hulls, resolution, error, depth, verts, edge, best_plane) = match preset {
            DetailPreset::D01 => (2, 50_000, 10.0, 3, 32, 5, false),
            DetailPreset::D02 => (4, 100_000, 7.0, 4, 48, 4, false),
            DetailPreset::D03 => (8, 200_000, 4.0, 6, 64, 4, false),
            DetailPreset::D04 => (16, 400_000, 2.5, 8, 96, 3, false),
            DetailPreset::D05 => (32, 600_000, 1.0, 10, 128, 2, false),
            DetailPreset::D06 => (64, 1_000_000, 0.5, 11, 192, 2, false),
            DetailPreset::D07 => (128, 2_000_000, 0.2, 12, 256, 2, true),
            DetailPreset::D08 => (256, 4_000_000, 0.1, 13, 512, 1, true),
            DetailPreset::D09 => (384, 7_000_000, 0.05, 14, 1024, 1, true),
            DetailPreset::D10 => (512, 10_000_000, 0.01, 15, 2048, 1, true),
        };
        Self {
            max_convex_hulls: hulls,
            resolution,
            min_volume_error: error,
            max_recursion_depth: depth,
            max_vertices_per_hull: verts,
            min_edge_length: edge,
            find_best_plane: best_plane,
            shrink_wrap: true,
            fill_mode: FillMode::Flood,
        }
    }

    /// Apply a preset's detail values, keeping shrink-wrap and fill mode
    pub fn apply_preset(&mut self, preset: DetailPreset) {
        *self = Self {
            shrink_wrap: self.shrink_wrap,
            fill_mode: self.fill_mode,
            ..Self::preset(preset)
        };
    }

    pub fn to_args(&self, input: &Path) -> Vec<String> {
        vec![
            path_arg(input),
            "-h".into(),
            self.max_convex_hulls.to_string(),
            "-r".into(),
            self.resolution.to_string(),
            "-e".into(),
            format!("{:?}", self.min_volume_error),
            "-d".into(),
            self.max_recursion_depth.to_string(),
            "-v".into(),
            self.max_vertices_per_hull.to_string(),
            "-s".into(),
            flag(self.shrink_wrap),
            "-f".into(),
            self.fill_mode.as_str().into(),
            "-l".into(),
            self.min_edge_length.to_string(),
            "-p".into(),
            flag(self.find_best_plane),
            "-g".into(),
            "true".into(),
        ]
    }
}

/// V-HACD command-line tool
#[derive(Clone, Debug)]
pub struct Vhacd {
    pub executable: PathBuf,
    pub params: VhacdParams,
}

impl Vhacd {
    pub fn new(executable: impl Into<PathBuf>, params: VhacdParams) -> Self {
        Self {
            executable: executable.into(),
            params,
        }
    }
}

impl DecompositionBackend for Vhacd {
    fn tool_name(&self) -> &str {
        "V-HACD"
    }

    fn tool_tag(&self) -> &str {
        "VHACD"
    }

    fn temp_prefix(&self) -> &str {
        "vhacd_"
    }

    fn output_file_name(&self) -> &str {
        "decomp.obj"
    }

    fn check(&self) -> Result<()> {
        require_executable(&self.executable)
    }

    fn prepare(&self, work_dir: &Path, input: &Path) -> Result<LaunchPlan> {
        // V-HACD always writes decomp.obj into its current directory
        Ok(LaunchPlan {
            program: self.executable.clone(),
            args: self.params.to_args(input),
            expected_output: work_dir.join(self.output_file_name()),
        })
    }
}

// ============================================================================
// CoACD
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMode {
    #[default]
    Auto,
    On,
    Off,
}

impl PreprocessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PreprocessMode::Auto => "auto",
            PreprocessMode::On => "on",
            PreprocessMode::Off => "off",
        }
    }
}

/// Hull approximation used by CoACD
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproximateMode {
    /// Convex hulls
    #[default]
    Ch,
    /// Oriented boxes
    Box,
}

impl ApproximateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApproximateMode::Ch => "ch",
            ApproximateMode::Box => "box",
        }
    }
}

/// Detail values shared by both CoACD variants
#[derive(Clone, Copy, Debug, PartialEq)]
struct CoacdDetail {
    threshold: f64,
    prep_resolution: u32,
    mcts_iterations: u32,
    mcts_depth: u32,
    mcts_nodes: u32,
    resolution: u32,
}

impl CoacdDetail {
    fn preset(preset: DetailPreset) -> Self {
        let (threshold, prep_resolution, mcts_iterations, mcts_depth, mcts_nodes, resolution) =
            match preset {
                DetailPreset::D01 => (0.80, 20, 60, 2, 10, 1000),
                DetailPreset::D02 => (0.50, 25, 60, 2, 10, 1000),
                DetailPreset::D03 => (0.30, 30, 70, 2, 12, 1200),
                DetailPreset::D04 => (0.15, 40, 80, 2, 15, 1500),
                DetailPreset::D05 => (0.05, 50, 150, 3, 20, 2000),
                DetailPreset::D06 => (0.035, 55, 200, 3, 22, 2500),
                DetailPreset::D07 => (0.025, 60, 250, 4, 25, 3500),
                DetailPreset::D08 => (0.018, 70, 300, 4, 28, 5000),
                DetailPreset::D09 => (0.013, 85, 400, 5, 30, 7000),
                DetailPreset::D10 => (0.01, 100, 500, 5, 35, 10000),
            };
        Self {
            threshold,
            prep_resolution,
            mcts_iterations,
            mcts_depth,
            mcts_nodes,
            resolution,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoacdParams {
    /// Concavity threshold, lower keeps more detail
    pub threshold: f64,
    pub preprocess_mode: PreprocessMode,
    pub prep_resolution: u32,
    pub mcts_iteration: u32,
    pub mcts_depth: u32,
    pub mcts_nodes: u32,
    pub hausdorff_resolution: u32,
    pub rv_k: f64,
    pub approximate_mode: ApproximateMode,
    /// -1 leaves the hull count unlimited
    pub max_convex_hull: i32,
    pub no_merge: bool,
    pub pca: bool,
    pub decimate: bool,
    pub max_ch_vertex: u32,
    pub extrude: bool,
    pub extrude_margin: f64,
    /// 0 lets the tool pick a random seed
    pub seed: u64,
}

impl Default for CoacdParams {
    fn default() -> Self {
        Self::preset(DetailPreset::D05)
    }
}

impl CoacdParams {
    pub fn preset(preset: DetailPreset) -> Self {
        let d = CoacdDetail::preset(preset);
        Self {
            threshold: d.threshold,
            preprocess_mode: PreprocessMode::Auto,
            prep_resolution: d.prep_resolution,
            mcts_iteration: d.mcts_iterations,
            mcts_depth: d.mcts_depth,
            mcts_nodes: d.mcts_nodes,
            hausdorff_resolution: d.resolution,
            rv_k: 0.3,
            approximate_mode: ApproximateMode::Ch,
            max_convex_hull: -1,
            no_merge: false,
            pca: false,
            decimate: false,
            max_ch_vertex: 256,
            extrude: false,
            extrude_margin: 0.01,
            seed: 0,
        }
    }

    /// Apply a preset's detail values, keeping every other option
    pub fn apply_preset(&mut self, preset: DetailPreset) {
        let d = CoacdDetail::preset(preset);
        self.threshold = d.threshold;
        self.prep_resolution = d.prep_resolution;
        self.mcts_iteration = d.mcts_iterations;
        self.mcts_depth = d.mcts_depth;
        self.mcts_nodes = d.mcts_nodes;
        self.hausdorff_resolution = d.resolution;
    }

    pub fn to_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-i".into(),
            path_arg(input),
            "-o".into(),
            path_arg(output),
            "-t".into(),
            format!("{:?}", self.threshold),
            "-pm".into(),
            self.preprocess_mode.as_str().into(),
            "-pr".into(),
            self.prep_resolution.to_string(),
            "-mi".into(),
            self.mcts_iteration.to_string(),
            "-md".into(),
            self.mcts_depth.to_string(),
            "-mn".into(),
            self.mcts_nodes.to_string(),
            "-r".into(),
            self.hausdorff_resolution.to_string(),
            "-k".into(),
            format!("{:?}", self.rv_k),
            "-am".into(),
            self.approximate_mode.as_str().into(),
        ];
        if self.max_convex_hull != -1 {
            args.extend(["-c".into(), self.max_convex_hull.to_string()]);
        }
        if self.no_merge {
            args.push("-nm".into());
        }
        if self.pca {
            args.push("--pca".into());
        }
        if self.decimate {
            args.extend(["-d".into(), "-dt".into(), self.max_ch_vertex.to_string()]);
        }
        if self.extrude {
            args.extend(["-ex".into(), "-em".into(), format!("{:?}", self.extrude_margin)]);
        }
        if self.seed > 0 {
            args.extend(["--seed".into(), self.seed.to_string()]);
        }
        args
    }
}

/// CoACD command-line tool
#[derive(Clone, Debug)]
pub struct Coacd {
    pub executable: PathBuf,
    pub params: CoacdParams,
}

impl Coacd {
    pub fn new(executable: impl Into<PathBuf>, params: CoacdParams) -> Self {
        Self {
            executable: executable.into(),
            params,
        }
    }
}

impl DecompositionBackend for Coacd {
    fn tool_name(&self) -> &str {
        "CoACD"
    }

    fn tool_tag(&self) -> &str {
        "CoACD"
    }

    fn temp_prefix(&self) -> &str {
        "coacd_"
    }

    fn output_file_name(&self) -> &str {
        "output.obj"
    }

    fn check(&self) -> Result<()> {
        require_executable(&self.executable)
    }

    fn prepare(&self, work_dir: &Path, input: &Path) -> Result<LaunchPlan> {
        let output = work_dir.join(self.output_file_name());
        Ok(LaunchPlan {
            program: self.executable.clone(),
            args: self.params.to_args(input, &output),
            expected_output: output,
        })
    }
}

// ============================================================================
// CoACD-U (scripted)
// ============================================================================

/// Helper run by the interpreter: reads `params.json`, decomposes, writes hulls
pub const COACD_U_SCRIPT: &str = r##"import sys
import json
import numpy as np


def parse_obj(filepath):
    vertices = []
    faces = []
    with open(filepath, 'r') as f:
        for line in f:
            parts = line.strip().split()
            if not parts:
                continue
            if parts[0] == 'v' and len(parts) >= 4:
                vertices.append([float(parts[1]), float(parts[2]), float(parts[3])])
            elif parts[0] == 'f':
                faces.append([int(token.split('/')[0]) - 1 for token in parts[1:]])
    return np.array(vertices, dtype=np.float64), np.array(faces, dtype=np.int32)


def write_obj(filepath, parts):
    offset = 0
    with open(filepath, 'w') as f:
        f.write("# CoACD-U decomposition output\n")
        for i, (verts, tris) in enumerate(parts):
            f.write(f"o hull_{i:03d}\n")
            for v in verts:
                f.write(f"v {float(v[0]):.6f} {float(v[1]):.6f} {float(v[2]):.6f}\n")
            for face in tris:
                f.write("f " + " ".join(str(int(idx) + 1 + offset) for idx in face) + "\n")
            offset += len(verts)


params = json.load(open(sys.argv[1]))

try:
    import coacd_u as coacd
except ImportError:
    print("ERROR: coacd_u module not found")
    sys.exit(1)

print("CoACD-U: Loading mesh...")
verts, faces = parse_obj(params["input"])
print(f"CoACD-U: {len(verts)} vertices, {len(faces)} faces")

print("CoACD-U: Running decomposition...")
parts = coacd.run_coacd(
    coacd.Mesh(verts, faces),
    threshold=params["threshold"],
    max_convex_hull=params["max_convex_hull"],
    preprocess_mode=params["preprocess_mode"],
    preprocess_resolution=params["prep_resolution"],
    resolution=params["resolution"],
    mcts_nodes=params["mcts_nodes"],
    mcts_iterations=params["mcts_iterations"],
    mcts_max_depth=params["mcts_max_depth"],
    pca=params["pca"],
    merge=params["merge"],
    seed=params["seed"],
)

print(f"CoACD-U: Decomposed into {len(parts)} parts")
write_obj(params["output"], parts)
print("CoACD-U: Done")
"##;

pub const COACD_U_SCRIPT_NAME: &str = "run_coacd_u.py";
pub const COACD_U_PARAMS_NAME: &str = "params.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoacdScriptParams {
    pub threshold: f64,
    pub max_convex_hull: i32,
    pub preprocess_mode: PreprocessMode,
    pub prep_resolution: u32,
    pub resolution: u32,
    pub mcts_nodes: u32,
    pub mcts_iterations: u32,
    pub mcts_max_depth: u32,
    pub pca: bool,
    pub merge: bool,
    pub seed: u64,
}

impl Default for CoacdScriptParams {
    fn default() -> Self {
        Self::preset(DetailPreset::D05)
    }
}

impl CoacdScriptParams {
    pub fn preset(preset: DetailPreset) -> Self {
        let d = CoacdDetail::preset(preset);
        Self {
            threshold: d.threshold,
            max_convex_hull: -1,
            preprocess_mode: PreprocessMode::Auto,
            prep_resolution: d.prep_resolution,
            resolution: d.resolution,
            mcts_nodes: d.mcts_nodes,
            mcts_iterations: d.mcts_iterations,
            mcts_max_depth: d.mcts_depth,
            pca: false,
            merge: true,
            seed: 0,
        }
    }

    pub fn apply_preset(&mut self, preset: DetailPreset) {
        let d = CoacdDetail::preset(preset);
        self.threshold = d.threshold;
        self.prep_resolution = d.prep_resolution;
        self.resolution = d.resolution;
        self.mcts_nodes = d.mcts_nodes;
        self.mcts_iterations = d.mcts_iterations;
        self.mcts_max_depth = d.mcts_depth;
    }
}

/// Contents of `params.json`
#[derive(Serialize)]
struct ScriptParamsFile<'a> {
    input: String,
    output: String,
    #[serde(flatten)]
    params: &'a CoacdScriptParams,
}

/// CoACD-U, driven through a helper script
#[derive(Clone, Debug)]
pub struct CoacdScript {
    /// Python interpreter with the `coacd_u` module installed
    pub interpreter: PathBuf,
    pub params: CoacdScriptParams,
}

impl CoacdScript {
    pub fn new(interpreter: impl Into<PathBuf>, params: CoacdScriptParams) -> Self {
        Self {
            interpreter: interpreter.into(),
            params,
        }
    }
}

impl DecompositionBackend for CoacdScript {
    fn tool_name(&self) -> &str {
        "CoACD-U"
    }

    fn tool_tag(&self) -> &str {
        "CoACD_U"
    }

    fn temp_prefix(&self) -> &str {
        "coacd_u_"
    }

    fn output_file_name(&self) -> &str {
        "output.obj"
    }

    fn prepare(&self, work_dir: &Path, input: &Path) -> Result<LaunchPlan> {
        let output = work_dir.join(self.output_file_name());
        let script = work_dir.join(COACD_U_SCRIPT_NAME);
        let params = work_dir.join(COACD_U_PARAMS_NAME);

        std::fs::write(&script, COACD_U_SCRIPT)?;
        let file = ScriptParamsFile {
            input: path_arg(input),
            output: path_arg(&output),
            params: &self.params,
        };
        std::fs::write(&params, serde_json::to_string_pretty(&file)?)?;

        Ok(LaunchPlan {
            program: self.interpreter.clone(),
            args: vec![path_arg(&script), path_arg(&params)],
            expected_output: output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_ordered() {
        assert_eq!(DetailPreset::default(), DetailPreset::D05);
        assert_eq!(DetailPreset::from_index(9), Some(DetailPreset::D10));
        assert_eq!(DetailPreset::from_index(10), None);

        let hulls: Vec<u32> = DetailPreset::ALL
            .iter()
            .map(|&p| VhacdParams::preset(p).max_convex_hulls)
            .collect();
        assert!(hulls.windows(2).all(|w| w[0] < w[1]));

        let thresholds: Vec<f64> = DetailPreset::ALL
            .iter()
            .map(|&p| CoacdParams::preset(p).threshold)
            .collect();
        assert!(thresholds.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_vhacd_args() {
        let params = VhacdParams::preset(DetailPreset::D01);
        let args = params.to_args(Path::new("/tmp/vhacd_x/input.obj"));
        assert_eq!(
            args,
            [
                "/tmp/vhacd_x/input.obj", "-h", "2", "-r", "50000", "-e", "10.0", "-d", "3", "-v",
                "32", "-s", "true", "-f", "flood", "-l", "5", "-p", "false", "-g", "true",
            ]
        );
    }

    #[test]
    fn test_vhacd_apply_preset_keeps_fill() {
        let mut params = VhacdParams {
            fill_mode: FillMode::Raycast,
            shrink_wrap: false,
            ..Default::default()
        };
        params.apply_preset(DetailPreset::D10);
        assert_eq!(params.fill_mode, FillMode::Raycast);
        assert!(!params.shrink_wrap);
        assert!(params.find_best_plane);
        assert_eq!(params.max_vertices_per_hull, 2048);
    }

    #[test]
    fn test_coacd_default_args() {
        let args = CoacdParams::default().to_args(Path::new("in.obj"), Path::new("out.obj"));
        assert_eq!(
            args,
            [
                "-i", "in.obj", "-o", "out.obj", "-t", "0.05", "-pm", "auto", "-pr", "50", "-mi",
                "150", "-md", "3", "-mn", "20", "-r", "2000", "-k", "0.3", "-am", "ch",
            ]
        );
    }

    #[test]
    fn test_coacd_optional_flags() {
        let params = CoacdParams {
            max_convex_hull: 12,
            no_merge: true,
            pca: true,
            decimate: true,
            extrude: true,
            seed: 7,
            ..Default::default()
        };
        let args = params.to_args(Path::new("in.obj"), Path::new("out.obj"));
        let tail = &args[22..];
        assert_eq!(
            tail,
            ["-c", "12", "-nm", "--pca", "-d", "-dt", "256", "-ex", "-em", "0.01", "--seed", "7"]
        );
    }

    #[test]
    fn test_missing_executable() {
        let vhacd = Vhacd::new("/definitely/not/here/vhacd", VhacdParams::default());
        assert!(matches!(vhacd.check(), Err(Error::ToolNotFound(_))));
    }

    #[test]
    fn test_script_backend_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.obj");
        let backend = CoacdScript::new("python3", CoacdScriptParams::default());
        let plan = backend.prepare(dir.path(), &input).unwrap();

        assert_eq!(plan.program, PathBuf::from("python3"));
        assert!(plan.args[0].ends_with(COACD_U_SCRIPT_NAME));
        assert!(plan.args[1].ends_with(COACD_U_PARAMS_NAME));
        assert_eq!(plan.expected_output, dir.path().join("output.obj"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&plan.args[1]).unwrap()).unwrap();
        assert_eq!(json["threshold"], 0.05);
        assert_eq!(json["merge"], true);
        assert_eq!(json["mcts_max_depth"], 3);
        assert_eq!(json["preprocess_mode"], "auto");
        assert_eq!(json["input"], &*input.to_string_lossy());

        let script = std::fs::read_to_string(&plan.args[0]).unwrap();
        assert!(script.contains("hull_{i:03d}"));
    }

    #[test]
    fn test_script_text_is_complete() {
        assert!(COACD_U_SCRIPT.starts_with("import sys\n"));
        assert!(COACD_U_SCRIPT.contains("f.write(\"# CoACD-U decomposition output\\n\")"));
        assert!(COACD_U_SCRIPT.ends_with("print(\"CoACD-U: Done\")\n"));
    }
}
