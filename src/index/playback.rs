/// Frames in a smooth transition between two periods.
pub const BLEND_FRAMES: usize = 8;

/// Cursor stepping through the periods of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    len: usize,
    position: usize,
    looping: bool,
}

impl Playback {
    pub fn new(len: usize, looping: bool) -> Self {
        Self {
            len,
            position: 0,
            looping,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Moves to the next period. Past the last one the cursor wraps when
    /// looping, otherwise it stays on the last period and playback stops
    /// (`None`).
    pub fn advance(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        if self.position + 1 < self.len {
            self.position += 1;
            Some(self.position)
        } else if self.looping {
            self.position = 0;
            Some(0)
        } else {
            self.position = self.len - 1;
            None
        }
    }

    pub fn step_back(&mut self) -> Option<usize> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        Some(self.position)
    }

    /// Jumps to `position`, clamped to the last period.
    pub fn seek(&mut self, position: usize) -> usize {
        self.position = position.min(self.len.saturating_sub(1));
        self.position
    }
}

/// Mixes evenly spaced samples of `old` and `new`.
///
/// `progress` runs from 0 (only old) to 1 (only new); at 1 the result is
/// exactly `new`.
pub fn blend<T: Clone>(old: &[T], new: &[T], progress: f64) -> Vec<T> {
    let progress = progress.clamp(0.0, 1.0);
    let old_count = (old.len() as f64 * (1.0 - progress)).floor() as usize;
    let new_count = (new.len() as f64 * progress).floor() as usize;

    let mut blended = Vec::with_capacity(old_count + new_count);
    blended.extend(sample(old, old_count));
    blended.extend(sample(new, new_count));
    blended
}

fn sample<T: Clone>(items: &[T], count: usize) -> impl Iterator<Item = T> + '_ {
    (0..count).map(move |i| items[i * items.len() / count].clone())
}

/// Intermediate frames from `old` to `new`; the last frame is `new`.
pub fn transition<T: Clone>(old: &[T], new: &[T]) -> Vec<Vec<T>> {
    if old.is_empty() {
        return vec![new.to_vec()];
    }
    (1..=BLEND_FRAMES)
        .map(|frame| blend(old, new, frame as f64 / BLEND_FRAMES as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_stops_without_loop() {
        let mut playback = Playback::new(3, false);
        assert_eq!(playback.advance(), Some(1));
        assert_eq!(playback.advance(), Some(2));
        assert_eq!(playback.advance(), None);
        assert_eq!(playback.position(), 2);
        assert_eq!(playback.step_back(), Some(1));
    }

    #[test]
    fn test_advance_wraps_with_loop() {
        let mut playback = Playback::new(2, true);
        assert_eq!(playback.advance(), Some(1));
        assert_eq!(playback.advance(), Some(0));
        assert_eq!(playback.step_back(), None);
    }

    #[test]
    fn test_seek_clamps() {
        let mut playback = Playback::new(4, false);
        assert_eq!(playback.seek(10), 3);
        assert_eq!(Playback::new(0, true).advance(), None);
    }

    #[test]
    fn test_blend() {
        let old: Vec<u32> = (0..10).collect();
        let new: Vec<u32> = (100..104).collect();
        assert_eq!(blend(&old, &new, 0.0), old);
        assert_eq!(blend(&old, &new, 1.0), new);

        let half = blend(&old, &new, 0.5);
        assert_eq!(half, vec![0, 2, 4, 6, 8, 100, 102]);
    }

    #[test]
    fn test_transition_ends_on_new_data() {
        let old = vec![1, 2, 3];
        let new = vec![7, 8];
        let frames = transition(&old, &new);
        assert_eq!(frames.len(), BLEND_FRAMES);
        assert_eq!(frames.last(), Some(&new));
        assert_eq!(transition(&[], &new), vec![new.clone()]);
    }
}
