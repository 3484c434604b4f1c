use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail, ensure};
use log::{debug, info};
use machine_learning::{EdgeBatch, FeatureMapper};
use ndarray::Array2;
use serde::Deserialize;

/// A detector event: its hits and the candidate edges between them.
///
/// `edges_out[e]` and `edges_in[e]` are the indices of the hits that edge `e` leaves from
/// and arrives at, and `y[e]` tells whether it's a real track segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HitGraph {
    /// `(r, phi, z)` of every hit.
    pub x: Vec<[f64; 3]>,
    pub edges_out: Vec<usize>,
    pub edges_in: Vec<usize>,
    pub y: Vec<f64>,
}

impl HitGraph {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read graph '{}'", path.display()))?;

        let graph: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid graph '{}'", path.display()))?;

        graph
            .check()
            .with_context(|| format!("inconsistent graph '{}'", path.display()))?;
        Ok(graph)
    }

    pub fn check(&self) -> Result<()> {
        let n = self.y.len();
        ensure!(
            self.edges_out.len() == n && self.edges_in.len() == n,
            "got {} outgoing ends, {} incoming ends and {n} labels",
            self.edges_out.len(),
            self.edges_in.len()
        );

        let hits = self.x.len();
        if let Some(&hit) = self.edges_out.iter().chain(&self.edges_in).find(|&&h| h >= hits) {
            bail!("edge references hit {hit} but there are only {hits} hits");
        }

        Ok(())
    }

    /// Negates the `z` coordinate of every hit.
    pub fn negate_z(&mut self) {
        for hit in &mut self.x {
            hit[2] = -hit[2];
        }
    }

    /// The raw features of every edge, `[X[out], X[in]]`, one edge per row.
    ///
    /// # Panics
    /// If an edge references a missing hit, see `check`.
    pub fn edge_features(&self) -> Array2<f64> {
        let mut features = Array2::zeros((self.y.len(), 6));

        for (mut row, (&out, &inn)) in features
            .rows_mut()
            .into_iter()
            .zip(self.edges_out.iter().zip(&self.edges_in))
        {
            for (dst, &src) in row.iter_mut().zip(self.x[out].iter().chain(&self.x[inn])) {
                *dst = src;
            }
        }

        features
    }

    /// The labels as class indices.
    ///
    /// # Returns
    /// An error if any label isn't a non negative integer. Integers other than `0` and `1` are
    /// passed through.
    pub fn labels(&self) -> Result<Vec<u8>> {
        self.y
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                if y.fract() != 0. || !(0. ..=f64::from(u8::MAX)).contains(&y) {
                    bail!("edge {i} has label {y}, which is not a class index");
                }
                Ok(y as u8)
            })
            .collect()
    }

    /// Maps the graph's edges into a batch.
    ///
    /// # Returns
    /// An error if the graph is inconsistent or a label isn't a class index.
    pub fn into_batch(self, mapper: &FeatureMapper) -> Result<EdgeBatch> {
        self.check()?;
        let labels = self.labels()?;
        let features = mapper.map(self.edge_features().view())?;
        Ok(EdgeBatch::new(features, labels)?)
    }
}

/// The first `n` graph files of `dir`, in name order.
pub fn graph_files(dir: &Path, n: usize) -> Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)
        .with_context(|| format!("cannot list '{}'", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("cannot list '{}'", dir.display()))?;

    files.retain(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"));
    files.sort();

    ensure!(
        files.len() >= n,
        "'{}' holds {} graphs but {n} were requested",
        dir.display(),
        files.len()
    );

    files.truncate(n);
    Ok(files)
}

/// Loads the first `n` graphs of `dir` as edge batches.
///
/// Graphs at even positions come from the detector section with negative `z`, so their `z`
/// is negated before mapping.
pub fn load_batches(dir: &Path, n: usize, mapper: &FeatureMapper) -> Result<Vec<EdgeBatch>> {
    let files = graph_files(dir, n)?;
    let mut batches = Vec::with_capacity(files.len());

    for (i, path) in files.iter().enumerate() {
        let mut graph = HitGraph::load(path)?;
        if i % 2 == 0 {
            graph.negate_z();
        }

        let batch = graph
            .into_batch(mapper)
            .with_context(|| format!("cannot build a batch from '{}'", path.display()))?;

        debug!(graph = i, edges = batch.len(); "loaded {}", path.display());
        batches.push(batch);
    }

    info!(graphs = batches.len(); "dataset loaded from {}", dir.display());
    Ok(batches)
}
