/// A raw path fix before timestamp resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: Option<i64>,
}

/// A visit or activity span with its ordered path fixes.
///
/// Only lives while an adapter turns one entry into point records.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub path: Vec<PathFix>,
}

impl Segment {
    pub fn new(start_ms: Option<i64>, end_ms: Option<i64>) -> Self {
        Self {
            start_ms,
            end_ms,
            path: Vec::new(),
        }
    }

    /// End time, ignored when it precedes the start.
    fn usable_end(&self) -> Option<i64> {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) if end >= start => Some(end),
            _ => None,
        }
    }

    /// Resolves one timestamp per path fix.
    ///
    /// Fixes with their own timestamp keep it. The rest are spread evenly by
    /// index across `[start, end]`, pinned to `start` when the segment has no
    /// end, or interpolated between the nearest timestamped neighbours when
    /// the segment has no start. `None` means no context was available and
    /// the fix must be dropped.
    pub fn resolve_times(&self, interpolate: bool) -> Vec<Option<i64>> {
        let own: Vec<Option<i64>> = self.path.iter().map(|fix| fix.timestamp_ms).collect();
        if !interpolate {
            return own;
        }

        let n = own.len();
        let end = self.usable_end();
        (0..n)
            .map(|i| {
                if own[i].is_some() {
                    return own[i];
                }
                match (self.start_ms, end) {
                    (Some(start), Some(end)) => Some(spread(start, end, i, n)),
                    (Some(start), None) => Some(start),
                    _ => from_neighbours(&own, i),
                }
            })
            .collect()
    }
}

fn spread(start: i64, end: i64, index: usize, count: usize) -> i64 {
    if count <= 1 {
        return start;
    }
    let span = end as i128 - start as i128;
    start + (span * index as i128 / (count - 1) as i128) as i64
}

fn from_neighbours(own: &[Option<i64>], index: usize) -> Option<i64> {
    let before = own[..index]
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, ts)| ts.map(|ts| (i, ts)));
    let after = own[index + 1..]
        .iter()
        .enumerate()
        .find_map(|(offset, ts)| ts.map(|ts| (index + 1 + offset, ts)));

    match (before, after) {
        (Some((i0, t0)), Some((i1, t1))) => {
            let span = t1 as i128 - t0 as i128;
            let step = (index - i0) as i128;
            Some(t0 + (span * step / (i1 - i0) as i128) as i64)
        }
        (Some((_, t)), None) | (None, Some((_, t))) => Some(t),
        (None, None) => None,
    }
}
