//! 4-connected clustering of urban pixels.
use crate::grid::Raster;

const AXIS_OFFSETS: [(isize, isize); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

/// Result of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    pub clusters: usize,
    pub clustered_pixels: usize,
}

/// Reusable flood-fill scratch space.
#[derive(Debug, Clone, Default)]
pub struct ClusterScratch {
    visited: Vec<bool>,
    stack: Vec<(usize, usize)>,
}

impl ClusterScratch {
    /// Count 4-connected urban components. The outer ring is treated as
    /// non-urban, so components are formed by strict-interior pixels only.
    pub fn count(&mut self, urban: &Raster) -> ClusterSummary {
        self.visited.clear();
        self.visited.resize(urban.len(), false);
        self.stack.clear();

        let mut summary = ClusterSummary::default();
        for row in 1..urban.rows().saturating_sub(1) {
            for col in 1..urban.cols().saturating_sub(1) {
                let offset = urban.offset(row, col);
                if self.visited[offset] || urban.cells()[offset] == 0 {
                    continue;
                }
                summary.clusters += 1;
                summary.clustered_pixels += self.fill(urban, row, col);
            }
        }
        summary
    }

    fn fill(&mut self, urban: &Raster, row: usize, col: usize) -> usize {
        let mut size = 0;
        self.visited[urban.offset(row, col)] = true;
        self.stack.push((row, col));
        while let Some((r, c)) = self.stack.pop() {
            size += 1;
            for delta in AXIS_OFFSETS {
                let Some((nr, nc)) = urban.shifted(r, c, delta) else {
                    continue;
                };
                let offset = urban.offset(nr, nc);
                if !urban.is_interior(nr, nc) || self.visited[offset] || urban.cells()[offset] == 0
                {
                    continue;
                }
                self.visited[offset] = true;
                self.stack.push((nr, nc));
            }
        }
        size
    }
}
