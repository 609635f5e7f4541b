// Remaining-path tracking against a noisy live position

use tracing::debug;

use crate::transform::LocalPosition;

/// Index of the path point closest to `position`.
/// Ties keep the first (lowest) index. `None` for an empty path.
pub fn nearest_index(path: &[LocalPosition], position: &LocalPosition) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in path.iter().enumerate() {
        let dist = point.distance_to(position);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

/// Total length of a polyline
pub fn polyline_length(path: &[LocalPosition]) -> f64 {
    path.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Holds the planned path of the current navigation cycle and its remaining suffix.
///
/// `remaining` is always a suffix of `full`. Once the destination is reached the
/// remaining path stays empty until a new full path starts the next cycle.
#[derive(Debug, Default)]
pub struct PathTracker {
    full: Vec<LocalPosition>,
    remaining_from: Option<usize>,
    reached: bool,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new navigation cycle with a freshly planned path
    pub fn set_full_path(&mut self, path: Vec<LocalPosition>) {
        debug!("New path with {} points", path.len());
        self.full = path;
        self.remaining_from = None;
        self.reached = false;
    }

    /// Recompute the remaining path for a new position.
    /// Returns `None` when nothing was recomputed (empty path or destination reached).
    pub fn update(&mut self, position: &LocalPosition) -> Option<&[LocalPosition]> {
        if self.reached {
            return None;
        }
        let closest = nearest_index(&self.full, position)?;
        self.remaining_from = Some(closest);
        Some(&self.full[closest..])
    }

    /// Destination reached: force the remaining path empty until the next cycle
    pub fn mark_reached(&mut self) {
        self.reached = true;
        self.remaining_from = None;
    }

    pub fn full_path(&self) -> &[LocalPosition] {
        &self.full
    }

    pub fn remaining_path(&self) -> &[LocalPosition] {
        match self.remaining_from {
            Some(i) if !self.reached => &self.full[i..],
            _ => &[],
        }
    }

    pub fn nearest(&self) -> Option<usize> {
        self.remaining_from
    }

    pub fn is_reached(&self) -> bool {
        self.reached
    }

    /// Share of the path already travelled, by length, in percent
    pub fn progress_percent(&self) -> f64 {
        if self.reached {
            return 100.0;
        }
        let total = polyline_length(&self.full);
        if total <= 0.0 {
            return 0.0;
        }
        let left = match self.remaining_from {
            Some(i) => polyline_length(&self.full[i..]),
            None => total,
        };
        (100.0 * (1.0 - left / total)).clamp(0.0, 100.0)
    }
}
