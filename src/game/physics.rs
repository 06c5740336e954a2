//! Point/ray geometry for hit detection and splash falloff

use super::vec3::Vec3;

/// Radius of a combatant's hit sphere
pub const HIT_RADIUS: f32 = 0.6;

/// A bounded ray with a unit direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub range: f32,
}

impl Ray {
    /// Build a ray, normalizing `direction` (degenerate input aims along +z)
    pub fn new(origin: Vec3, direction: Vec3, range: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(Vec3::FORWARD),
            range,
        }
    }
}

/// Geometry helpers shared by hitscan and projectile resolution
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Distance from `point` to the closest point on the ray segment `[0, range]`
    pub fn distance_point_to_ray(point: Vec3, ray: &Ray) -> f32 {
        let t = (point - ray.origin).dot(ray.direction).clamp(0.0, ray.range);
        let closest = ray.origin + ray.direction * t;
        point.distance(closest)
    }

    /// Forward distance along the ray if `point` is within `HIT_RADIUS` of it
    /// and its unclamped projection lies in `[0, range]`
    pub fn ray_hit(point: Vec3, ray: &Ray) -> Option<f32> {
        if Self::distance_point_to_ray(point, ray) > HIT_RADIUS {
            return None;
        }
        let forward = (point - ray.origin).dot(ray.direction);
        (0.0..=ray.range).contains(&forward).then_some(forward)
    }

    /// Linear splash falloff, rounded half away from zero; 0 outside `radius`
    pub fn splash_damage(distance: f32, radius: f32, max_damage: i32) -> i32 {
        if !(distance <= radius) || radius <= 0.0 {
            return 0;
        }
        let falloff = 1.0 - distance / radius;
        (falloff * max_damage as f32).round() as i32
    }

    /// Offset `forward` by independent amounts along two axes perpendicular to it
    pub fn perturb(forward: Vec3, offset_a: f32, offset_b: f32) -> Vec3 {
        let helper = if forward.y.abs() < 0.99 {
            Vec3::UNIT_Y
        } else {
            Vec3::UNIT_X
        };
        let right = forward.cross(helper).normalize_or(Vec3::UNIT_X);
        let up = right.cross(forward);
        (forward + right * offset_a + up * offset_b).normalize_or(forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray_along_z() -> Ray {
        Ray::new(Vec3::new(0.0, 1.6, 0.0), Vec3::new(0.0, 0.0, 5.0), 120.0)
    }

    #[test]
    fn test_ray_hit_on_axis() {
        let ray = ray_along_z();
        assert_eq!(PhysicsSystem::ray_hit(Vec3::new(0.0, 1.6, 10.0), &ray), Some(10.0));
    }

    #[test]
    fn test_ray_hit_respects_radius() {
        let ray = ray_along_z();
        assert!(PhysicsSystem::ray_hit(Vec3::new(0.5, 1.6, 10.0), &ray).is_some());
        assert!(PhysicsSystem::ray_hit(Vec3::new(0.7, 1.6, 10.0), &ray).is_none());
    }

    #[test]
    fn test_ray_hit_rejects_behind_and_beyond_range() {
        let ray = ray_along_z();
        // Within the radius of the origin but behind it
        assert!(PhysicsSystem::ray_hit(Vec3::new(0.0, 1.6, -0.3), &ray).is_none());
        // Within the radius of the segment end but past it
        assert!(PhysicsSystem::ray_hit(Vec3::new(0.0, 1.6, 120.4), &ray).is_none());
        assert!(PhysicsSystem::ray_hit(Vec3::new(0.0, 1.6, 119.9), &ray).is_some());
    }

    #[test]
    fn test_splash_damage_falloff() {
        assert_eq!(PhysicsSystem::splash_damage(0.0, 6.0, 85), 85);
        assert_eq!(PhysicsSystem::splash_damage(3.0, 6.0, 85), 43);
        assert_eq!(PhysicsSystem::splash_damage(6.0, 6.0, 85), 0);
        assert_eq!(PhysicsSystem::splash_damage(6.5, 6.0, 85), 0);
        assert_eq!(PhysicsSystem::splash_damage(f32::NAN, 6.0, 85), 0);
    }

    #[test]
    fn test_perturb_stays_unit_and_near_forward() {
        let forward = Vec3::FORWARD;
        let dir = PhysicsSystem::perturb(forward, 0.06, -0.06);
        assert!((dir.length() - 1.0).abs() < 1e-5);
        assert!(dir.dot(forward) > 0.99);
        assert_eq!(PhysicsSystem::perturb(forward, 0.0, 0.0), forward);

        let straight_up = PhysicsSystem::perturb(Vec3::UNIT_Y, 0.05, 0.05);
        assert!(straight_up.is_finite());
        assert!(straight_up.dot(Vec3::UNIT_Y) > 0.99);
    }
}
