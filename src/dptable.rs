//! A dynamic programming table with one row per site and one column per hidden state.
use crate::hmm::{State, N_STATES};

/// Serialized `(length + 1) x N_STATES` table of log-values.
/// Row 0 is the boundary row; rows `1..=length` correspond to the sites.
#[derive(Debug, Clone, PartialEq)]
pub struct DPTable {
    // Number of rows, i.e., length + 1.
    rows: usize,
    mem: Vec<f64>,
}

impl DPTable {
    /// Create a table for a sequence with `length` sites, every cell filled with `default`.
    pub fn new(length: usize, default: f64) -> Self {
        let rows = length + 1;
        Self {
            rows,
            mem: vec![default; rows * N_STATES],
        }
    }
    /// Number of sites, excluding the boundary row.
    pub fn length(&self) -> usize {
        self.rows - 1
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn get(&self, site: usize, state: State) -> f64 {
        self.mem[site * N_STATES + state as usize]
    }
    pub fn get_mut(&mut self, site: usize, state: State) -> &mut f64 {
        &mut self.mem[site * N_STATES + state as usize]
    }
    /// Return the cells of `site`. The length of the returned slice is `N_STATES`.
    pub fn row(&self, site: usize) -> &[f64] {
        &self.mem[site * N_STATES..(site + 1) * N_STATES]
    }
    pub fn row_mut(&mut self, site: usize) -> &mut [f64] {
        &mut self.mem[site * N_STATES..(site + 1) * N_STATES]
    }
    pub fn rows_iter(&self) -> std::slice::ChunksExact<'_, f64> {
        self.mem.chunks_exact(N_STATES)
    }
    /// Refill every cell by `value`, resizing to `length` if needed.
    /// Used to recycle a buffer for another pair.
    pub fn initialize(&mut self, length: usize, value: f64) {
        self.rows = length + 1;
        self.mem.clear();
        self.mem.resize(self.rows * N_STATES, value);
    }
}

impl std::ops::Index<(usize, State)> for DPTable {
    type Output = f64;
    fn index(&self, (site, state): (usize, State)) -> &Self::Output {
        &self.mem[site * N_STATES + state as usize]
    }
}

impl std::ops::IndexMut<(usize, State)> for DPTable {
    fn index_mut(&mut self, (site, state): (usize, State)) -> &mut Self::Output {
        &mut self.mem[site * N_STATES + state as usize]
    }
}

impl std::fmt::Display for DPTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, row) in self.rows_iter().enumerate() {
            writeln!(f, "{}\t{:.3}\t{:.3}", i, row[0], row[1])?;
        }
        Ok(())
    }
}
