use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapDirection {
    Next,
    Previous,
}

/// Where the viewport should end up after a cursor move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTarget {
    pub index: usize,
    pub offset: f64,
}

/// Cursor over a feed where every post is one viewport tall.
#[derive(Debug, Clone)]
pub struct FeedScrollController {
    index: usize,
    len: usize,
    post_height: f64,
}

impl FeedScrollController {
    pub fn new(len: usize, post_height: f64) -> Self {
        Self {
            index: 0,
            len,
            post_height: post_height.max(0.0),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn post_height(&self) -> f64 {
        self.post_height
    }

    pub fn target(&self) -> ScrollTarget {
        ScrollTarget {
            index: self.index,
            offset: self.index as f64 * self.post_height,
        }
    }

    /// Feeds one scroll event. `scroll_position` is the viewport offset after
    /// the event was applied.
    pub fn on_scroll(&mut self, delta: f64, scroll_position: f64) -> Option<ScrollTarget> {
        if self.post_height <= 0.0 || self.len == 0 {
            return None;
        }
        let threshold = self.post_height / 2.0;
        let within = scroll_position.rem_euclid(self.post_height);
        if delta > 0.0 && within >= threshold && self.index + 1 < self.len {
            self.index += 1;
        } else if delta < 0.0 && within < threshold && self.index > 0 {
            self.index -= 1;
        } else {
            return None;
        }
        tracing::trace!(index = self.index, delta, scroll_position, "feed cursor moved");
        Some(self.target())
    }

    /// Moves one post in `direction` without sampling any offset.
    pub fn snap(&mut self, direction: SnapDirection) -> Option<ScrollTarget> {
        match direction {
            SnapDirection::Next if self.index + 1 < self.len => self.index += 1,
            SnapDirection::Previous if self.index > 0 => self.index -= 1,
            _ => return None,
        }
        Some(self.target())
    }

    pub fn jump_to(&mut self, index: usize) -> Option<ScrollTarget> {
        if self.len == 0 {
            return None;
        }
        let index = index.min(self.len - 1);
        if index == self.index {
            return None;
        }
        self.index = index;
        Some(self.target())
    }

    /// Adopts a new post count, clamping the cursor.
    pub fn set_len(&mut self, len: usize) -> Option<ScrollTarget> {
        self.len = len;
        let clamped = self.index.min(len.saturating_sub(1));
        if clamped != self.index {
            self.index = clamped;
            return Some(self.target());
        }
        None
    }

    /// Adopts a new viewport height and re-targets the current post.
    pub fn resize(&mut self, post_height: f64) -> ScrollTarget {
        self.post_height = post_height.max(0.0);
        self.target()
    }
}

/// Eases a viewport offset toward the latest target. A new target replaces
/// whatever animation is in flight.
#[derive(Debug, Clone)]
pub struct SmoothScroll {
    offset: f64,
    target: f64,
    duration: Duration,
}

impl SmoothScroll {
    pub fn new(duration: Duration) -> Self {
        Self {
            offset: 0.0,
            target: 0.0,
            duration,
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_animating(&self) -> bool {
        (self.target - self.offset).abs() > f64::EPSILON
    }

    pub fn retarget(&mut self, target: ScrollTarget) {
        self.target = target.offset;
        if self.duration.is_zero() {
            self.offset = self.target;
        }
    }

    /// Jumps straight to `target`, dropping any animation in flight.
    pub fn settle(&mut self, target: ScrollTarget) {
        self.target = target.offset;
        self.offset = target.offset;
    }

    /// Moves the viewport by a raw amount (mouse wheel) without animation.
    /// The pending target follows so the offset is not pulled back.
    pub fn nudge(&mut self, delta: f64, max: f64) -> f64 {
        self.offset = (self.offset + delta).clamp(0.0, max.max(0.0));
        self.target = self.offset;
        self.offset
    }

    /// Advances the animation by `elapsed`. Returns true when the offset
    /// changed.
    pub fn step(&mut self, elapsed: Duration) -> bool {
        if !self.is_animating() {
            return false;
        }
        let remaining = self.target - self.offset;
        let fraction = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        // Ease-out: cover a share of what is left, and always at least a
        // quarter row so the animation terminates.
        let step = remaining * fraction.max(0.35);
        if step.abs() < 0.25 || remaining.abs() <= step.abs() {
            self.offset = self.target;
        } else {
            self.offset += step;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_at_threshold_advances() {
        let mut ctl = FeedScrollController::new(3, 20.0);
        let target = ctl.on_scroll(1.0, 10.0).unwrap();
        assert_eq!(target.index, 1);
        assert_eq!(target.offset, 20.0);
    }

    #[test]
    fn forward_below_threshold_stays() {
        let mut ctl = FeedScrollController::new(3, 20.0);
        assert!(ctl.on_scroll(1.0, 9.5).is_none());
        assert_eq!(ctl.index(), 0);
    }

    #[test]
    fn forward_at_last_post_stays() {
        let mut ctl = FeedScrollController::new(3, 20.0);
        ctl.jump_to(2);
        assert!(ctl.on_scroll(1.0, 50.0).is_none());
        assert_eq!(ctl.index(), 2);
    }

    #[test]
    fn backward_below_threshold_retreats() {
        let mut ctl = FeedScrollController::new(3, 20.0);
        ctl.jump_to(2);
        let target = ctl.on_scroll(-1.0, 41.0).unwrap();
        assert_eq!(target.index, 1);
        assert!(ctl.on_scroll(-1.0, 35.0).is_none());
        assert_eq!(ctl.index(), 1);
    }

    #[test]
    fn cursor_never_leaves_bounds() {
        // Deterministic pseudo-random sweep (64-bit LCG) over feed sizes,
        // post heights, deltas and positions.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            state >> 33
        };
        for len in 1..=6 {
            for height in [0.5, 1.0, 7.0, 20.0, 33.3] {
                let mut ctl = FeedScrollController::new(len, height);
                for _ in 0..500 {
                    let delta = match next() % 5 {
                        0 => 0.0,
                        1 => 1.0,
                        2 => -1.0,
                        3 => (next() % 40) as f64 - 20.0,
                        _ => -((next() % 7) as f64) * 0.25,
                    };
                    let position = (next() % 4000) as f64 / 10.0 - 50.0;
                    let before = ctl.index();
                    let moved = ctl.on_scroll(delta, position);
                    assert!(ctl.index() < len, "len {len} height {height}");
                    assert!(ctl.index().abs_diff(before) <= 1);
                    if let Some(target) = moved {
                        assert_eq!(target.index, ctl.index());
                        assert_eq!(target.offset, ctl.index() as f64 * height);
                    }
                    if next() % 4 == 0 {
                        let dir = if next() % 2 == 0 {
                            SnapDirection::Next
                        } else {
                            SnapDirection::Previous
                        };
                        ctl.snap(dir);
                        assert!(ctl.index() < len);
                    }
                }
            }
        }
        let mut single = FeedScrollController::new(1, 10.0);
        assert!(single.on_scroll(1.0, 9.0).is_none());
        assert!(single.on_scroll(-1.0, 1.0).is_none());
        assert_eq!(single.index(), 0);
    }

    #[test]
    fn zero_delta_and_empty_feed_do_nothing() {
        let mut ctl = FeedScrollController::new(3, 20.0);
        assert!(ctl.on_scroll(0.0, 15.0).is_none());
        let mut empty = FeedScrollController::new(0, 20.0);
        assert!(empty.on_scroll(1.0, 15.0).is_none());
        assert!(empty.snap(SnapDirection::Next).is_none());
        let mut flat = FeedScrollController::new(3, 0.0);
        assert!(flat.on_scroll(1.0, 15.0).is_none());
    }

    #[test]
    fn snap_events_move_one_post() {
        let mut ctl = FeedScrollController::new(2, 20.0);
        assert!(ctl.snap(SnapDirection::Previous).is_none());
        assert_eq!(ctl.snap(SnapDirection::Next).unwrap().index, 1);
        assert!(ctl.snap(SnapDirection::Next).is_none());
        assert_eq!(ctl.snap(SnapDirection::Previous).unwrap().offset, 0.0);
    }

    #[test]
    fn shrinking_len_clamps_cursor() {
        let mut ctl = FeedScrollController::new(5, 10.0);
        ctl.jump_to(4);
        assert_eq!(ctl.set_len(2).unwrap().index, 1);
        assert!(ctl.set_len(10).is_none());
        assert_eq!(ctl.resize(30.0).offset, 30.0);
    }

    #[test]
    fn smooth_scroll_reaches_latest_target() {
        let mut anim = SmoothScroll::new(Duration::from_millis(300));
        anim.retarget(ScrollTarget {
            index: 1,
            offset: 40.0,
        });
        assert!(anim.is_animating());
        anim.step(Duration::from_millis(50));
        assert!(anim.offset() > 0.0 && anim.offset() < 40.0);
        anim.retarget(ScrollTarget {
            index: 2,
            offset: 80.0,
        });
        for _ in 0..100 {
            anim.step(Duration::from_millis(50));
        }
        assert_eq!(anim.offset(), 80.0);
        assert!(!anim.step(Duration::from_millis(50)));
    }

    #[test]
    fn nudge_clamps_and_cancels_animation() {
        let mut anim = SmoothScroll::new(Duration::from_millis(300));
        anim.retarget(ScrollTarget {
            index: 1,
            offset: 20.0,
        });
        assert_eq!(anim.nudge(-5.0, 60.0), 0.0);
        assert!(!anim.is_animating());
        assert_eq!(anim.nudge(100.0, 60.0), 60.0);
    }
}
