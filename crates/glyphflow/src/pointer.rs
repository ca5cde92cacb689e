/// How strongly a pointer delta is injected into the velocity field.
const SPLAT_FORCE: f32 = 6.0;

/// Per-frame decay applied to the pointer’s velocity and delta.
const DECAY: f32 = 0.92;

/// A pending impulse for the fluid, in normalized simulation space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

/// The single logical pointer. Coordinates are normalized to [0, 1] with the
/// y axis already flipped into simulation space by the engine.
pub struct Pointer {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    pub dx: f32,
    pub dy: f32,
    pub velocity: f32,

    // One-shot latch: the first move after construction (or after
    // `clear`-then-return gaps the host chooses to reset) only seeds the
    // position, so we never splat a spurious jump from the resting default.
    seen_first: bool,
}

impl Default for Pointer {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            prev_x: 0.5,
            prev_y: 0.5,
            dx: 0.0,
            dy: 0.0,
            velocity: 0.0,
            seen_first: false,
        }
    }
}

impl Pointer {
    /// Moves the pointer and, for any non-zero delta after the first seed,
    /// returns the splat to enqueue for the next frame.
    pub fn update(&mut self, x: f32, y: f32) -> Option<Splat> {
        if !self.seen_first {
            self.seen_first = true;
            self.prev_x = x;
            self.prev_y = y;
            self.x = x;
            self.y = y;
            return None;
        }

        let dx = x - self.x;
        let dy = y - self.y;

        self.prev_x = self.x;
        self.prev_y = self.y;
        self.x = x;
        self.y = y;
        self.dx = dx;
        self.dy = dy;
        self.velocity = (dx.hypot(dy) * 50.0).min(5.0);

        if dx.abs() > 0.0 || dy.abs() > 0.0 {
            Some(Splat {
                x,
                y,
                dx: SPLAT_FORCE * dx,
                dy: -SPLAT_FORCE * dy,
            })
        } else {
            None
        }
    }

    /// Called once per frame before the solver runs.
    pub fn decay(&mut self) {
        self.velocity *= DECAY;
        self.dx *= DECAY;
        self.dy *= DECAY;
    }

    /// Pointer left the surface: kill the motion, keep the position.
    pub fn clear(&mut self) {
        self.velocity = 0.0;
        self.dx = 0.0;
        self.dy = 0.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn first_move_seeds_without_a_splat() {
        let mut pointer = Pointer::default();
        assert_eq!(pointer.update(0.3, 0.7), None);
        assert_eq!(pointer.x, 0.3);
        assert_eq!(pointer.prev_x, 0.3);
        assert_eq!(pointer.velocity, 0.0);
    }

    #[test]
    fn move_inside_800x600_surface_queues_scaled_splat() {
        // (100,100) → (110,104) in an 800×600 surface, y flipped.
        let mut pointer = Pointer::default();
        assert!(pointer
            .update(100.0 / 800.0, 1.0 - 100.0 / 600.0)
            .is_none());

        let splat = pointer
            .update(110.0 / 800.0, 1.0 - 104.0 / 600.0)
            .expect("non-zero delta must queue a splat");

        assert_close(splat.dx, 6.0 * 0.0125);
        assert_close(splat.dy, 6.0 * (4.0 / 600.0));
    }

    #[test]
    fn zero_delta_queues_nothing() {
        let mut pointer = Pointer::default();
        pointer.update(0.5, 0.5);
        pointer.update(0.25, 0.25);
        assert_eq!(pointer.update(0.25, 0.25), None);
    }

    #[test]
    fn velocity_is_capped() {
        let mut pointer = Pointer::default();
        pointer.update(0.0, 0.0);
        pointer.update(1.0, 1.0);
        assert_eq!(pointer.velocity, 5.0);
    }

    #[test]
    fn decay_shrinks_motion_each_frame() {
        let mut pointer = Pointer::default();
        pointer.update(0.5, 0.5);
        pointer.update(0.6, 0.5);
        let (v, dx) = (pointer.velocity, pointer.dx);

        pointer.decay();
        assert_close(pointer.velocity, v * 0.92);
        assert_close(pointer.dx, dx * 0.92);

        pointer.clear();
        assert_eq!(pointer.velocity, 0.0);
        assert_eq!(pointer.dx, 0.0);
        assert_eq!(pointer.x, 0.6);
    }
}
