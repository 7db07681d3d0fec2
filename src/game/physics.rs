//! Boss movement and bullet hit detection

use super::config::MoveRange;

/// Bullets whose right edge is left of this x are off-screen.
/// Negative enough that a bullet without a measured width is not dropped early.
pub const OFFSCREEN_THRESHOLD: f32 = -100.0;

/// Vertical speed is this fraction of horizontal speed
pub const BOSS_VERTICAL_FACTOR: f32 = 0.5;

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Physics system for boss movement and collision tests
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the boss one tick.
    /// Returns (new_x, new_y, new_dir_x, new_dir_y)
    pub fn step_boss(
        x: f32,
        y: f32,
        dir_x: f32,
        dir_y: f32,
        speed: f32,
        range: &MoveRange,
    ) -> (f32, f32, f32, f32) {
        let new_x = x + dir_x * speed;
        let new_y = y + dir_y * speed * BOSS_VERTICAL_FACTOR;

        let new_dir_x = if new_x <= range.min_x || new_x >= range.max_x {
            -dir_x
        } else {
            dir_x
        };
        let new_dir_y = if new_y <= range.min_y || new_y >= range.max_y {
            -dir_y
        } else {
            dir_y
        };

        (new_x, new_y, new_dir_x, new_dir_y)
    }

    /// Circle vs rectangle: clamp the centre onto the rectangle and compare
    /// the distance to that closest point with the radius. Touching counts.
    pub fn circle_hits_rect(cx: f32, cy: f32, radius: f32, rect: &Rect) -> bool {
        let closest_x = cx.clamp(rect.x, rect.right().max(rect.x));
        let closest_y = cy.clamp(rect.y, rect.bottom().max(rect.y));

        let dx = cx - closest_x;
        let dy = cy - closest_y;
        dx * dx + dy * dy <= radius * radius
    }

    /// True once the rectangle has fully left the playfield on the left
    pub fn is_offscreen(rect: &Rect) -> bool {
        rect.right() < OFFSCREEN_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> MoveRange {
        MoveRange {
            min_x: 100.0,
            max_x: 900.0,
            min_y: 150.0,
            max_y: 400.0,
        }
    }

    #[test]
    fn boss_moves_with_half_vertical_speed() {
        let (x, y, dx, dy) = PhysicsSystem::step_boss(500.0, 300.0, 1.0, 1.0, 2.0, &range());
        assert_eq!((x, y), (502.0, 301.0));
        assert_eq!((dx, dy), (1.0, 1.0));
    }

    #[test]
    fn boss_bounces_on_each_axis_independently() {
        let (x, _, dx, dy) = PhysicsSystem::step_boss(899.5, 300.0, 1.0, -1.0, 1.0, &range());
        assert!(x >= 900.0);
        assert_eq!(dx, -1.0);
        assert_eq!(dy, -1.0);

        let (_, y, dx, dy) = PhysicsSystem::step_boss(500.0, 150.4, 1.0, -1.0, 1.0, &range());
        assert!(y <= 150.0);
        assert_eq!(dx, 1.0);
        assert_eq!(dy, 1.0);
    }

    #[test]
    fn boundary_distance_counts_as_hit() {
        // Closest point (10, 0) is exactly 5 from the centre.
        let rect = Rect {
            x: 10.0,
            y: -5.0,
            width: 20.0,
            height: 10.0,
        };
        assert!(PhysicsSystem::circle_hits_rect(5.0, 0.0, 5.0, &rect));
        assert!(!PhysicsSystem::circle_hits_rect(4.9, 0.0, 5.0, &rect));
    }

    #[test]
    fn centre_inside_rect_is_a_hit() {
        let rect = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 60.0,
        };
        assert!(PhysicsSystem::circle_hits_rect(50.0, 30.0, 1.0, &rect));
    }

    #[test]
    fn collision_is_symmetric_under_reflection() {
        let cases = [
            (0.0, 0.0, 10.0, 12.0, 3.0, 8.0, 4.0),
            (3.0, -2.0, 7.5, 9.0, 9.0, 2.0, 2.0),
            (0.0, 0.0, 5.0, 3.0, 4.0, 10.0, 10.0),
            (-4.0, 6.0, 2.0, 1.0, 1.0, 1.0, 1.0),
        ];

        for (cx, cy, r, x, y, w, h) in cases {
            let rect = Rect {
                x,
                y,
                width: w,
                height: h,
            };
            let base = PhysicsSystem::circle_hits_rect(cx, cy, r, &rect);

            let mirrored_x = Rect {
                x: -(x + w),
                ..rect
            };
            let mirrored_y = Rect {
                y: -(y + h),
                ..rect
            };
            assert_eq!(base, PhysicsSystem::circle_hits_rect(-cx, cy, r, &mirrored_x));
            assert_eq!(base, PhysicsSystem::circle_hits_rect(cx, -cy, r, &mirrored_y));
        }
    }

    #[test]
    fn offscreen_uses_right_edge() {
        let mut rect = Rect {
            x: -150.0,
            y: 0.0,
            width: 60.0,
            height: 60.0,
        };
        assert!(!PhysicsSystem::is_offscreen(&rect));
        rect.x = -161.0;
        assert!(PhysicsSystem::is_offscreen(&rect));
    }
}
