use glam::Vec3;
use serde::{Deserialize, Serialize};

const EPSILON: f32 = 1.0e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    #[default]
    Accurate,
    Fast,
}

pub fn normalize_to_magnitude(mode: MathMode, v: Vec3, magnitude: f32) -> Option<Vec3> {
    let mag_sq = v.length_squared();
    if mag_sq <= EPSILON || !mag_sq.is_finite() {
        return None;
    }

    Some(v * (magnitude * inverse_sqrt(mode, mag_sq)))
}

pub fn limit_magnitude(mode: MathMode, v: Vec3, max_magnitude: f32) -> Vec3 {
    if max_magnitude <= 0.0 {
        return Vec3::ZERO;
    }

    let mag_sq = v.length_squared();
    let max_sq = max_magnitude * max_magnitude;
    if mag_sq <= max_sq {
        return v;
    }

    v * (max_magnitude * inverse_sqrt(mode, mag_sq)).min(1.0)
}

pub fn smoothstep01(p: f32) -> f32 {
    p * p * (3.0 - 2.0 * p)
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    smoothstep01(((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0))
}

pub fn quadratic_bezier(start: Vec3, control: Vec3, end: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        return start;
    }
    if t >= 1.0 {
        return end;
    }
    let u = 1.0 - t;
    start * (u * u) + control * (2.0 * u * t) + end * (t * t)
}

// Exact on `a` at t <= 0 and on `b` at t >= 1, unlike `Vec3::lerp`.
pub fn blend(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    a.lerp(b, t)
}

pub fn hash_unit(seed: u32, id: u32, salt: u32) -> f32 {
    let mut h = seed ^ 0x9e37_79b9;
    h = mix(h ^ id.wrapping_mul(0x85eb_ca6b));
    h = mix(h ^ salt.wrapping_mul(0xc2b2_ae35));
    // 24 high bits keep the result strictly below 1.0 in f32.
    (h >> 8) as f32 / (1u32 << 24) as f32
}

pub fn hash_signed(seed: u32, id: u32, salt: u32) -> f32 {
    hash_unit(seed, id, salt) * 2.0 - 1.0
}

fn mix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let h = hue.rem_euclid(1.0);
    let channel = |offset: f32| {
        let k = (h * 6.0 + offset).rem_euclid(6.0);
        ((k - 3.0).abs() - 1.0).clamp(0.0, 1.0)
    };
    let chroma = saturation * (1.0 - (2.0 * lightness - 1.0).abs());
    [
        lightness + chroma * (channel(0.0) - 0.5),
        lightness + chroma * (channel(4.0) - 0.5),
        lightness + chroma * (channel(2.0) - 0.5),
    ]
}

fn inverse_sqrt(mode: MathMode, value: f32) -> f32 {
    match mode {
        MathMode::Accurate => 1.0 / value.sqrt(),
        MathMode::Fast => fast_inverse_sqrt(value),
    }
}

// One Newton-Raphson refinement keeps this fast while staying stable enough
// for repulsion directions where small precision drift is acceptable.
fn fast_inverse_sqrt(value: f32) -> f32 {
    let half = 0.5 * value;
    let mut i = value.to_bits();
    i = 0x5f37_59df_u32.wrapping_sub(i >> 1);
    let mut y = f32::from_bits(i);
    y *= 1.5 - half * y * y;
    y.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_mode_normalize_is_reasonable() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let a = normalize_to_magnitude(MathMode::Accurate, v, 10.0).unwrap();
        let f = normalize_to_magnitude(MathMode::Fast, v, 10.0).unwrap();

        assert!((a - f).abs().max_element() < 0.2);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(normalize_to_magnitude(MathMode::Accurate, Vec3::ZERO, 1.0).is_none());
        assert!(normalize_to_magnitude(MathMode::Fast, Vec3::splat(f32::NAN), 1.0).is_none());
    }

    #[test]
    fn limited_vector_has_expected_upper_bound() {
        let v = limit_magnitude(MathMode::Fast, Vec3::new(0.0, 0.0, 10.0), 2.0);
        assert!(v.z <= 2.0 + 1.0e-4);
        assert!(v.z > 1.9);
    }

    #[test]
    fn bezier_is_exact_at_endpoints() {
        let a = Vec3::new(-1260.0, -70.0, -1260.0);
        let b = Vec3::new(10.0, 800.0, 3.0);
        let c = Vec3::new(-375.0, -375.0, -375.0);
        assert_eq!(quadratic_bezier(a, b, c, 0.0), a);
        assert_eq!(quadratic_bezier(a, b, c, 1.0), c);
        let mid = quadratic_bezier(a, b, c, 0.5);
        assert_eq!(mid, a * 0.25 + b * 0.5 + c * 0.25);
    }

    #[test]
    fn blend_is_exact_at_both_ends() {
        let a = Vec3::new(0.1, -375.0, 1.0e6);
        let b = Vec3::new(8.8, 399.9, -0.3);
        assert_eq!(blend(a, b, 0.0), a);
        assert_eq!(blend(a, b, 1.0), b);
        assert!((blend(a, b, 0.5) - (a + b) * 0.5).length() < 1.0);
    }

    #[test]
    fn smoothstep_hits_both_ends() {
        assert_eq!(smoothstep01(0.0), 0.0);
        assert_eq!(smoothstep01(1.0), 1.0);
        assert_eq!(smoothstep(2.0, 4.0, 3.0), 0.5);
        assert_eq!(smoothstep(1.0, 1.0, 0.5), 0.0);
    }

    #[test]
    fn hash_is_stable_and_in_range() {
        for id in 0..2048 {
            let a = hash_unit(7, id, 3);
            assert_eq!(a.to_bits(), hash_unit(7, id, 3).to_bits());
            assert!((0.0..1.0).contains(&a));
            assert!((-1.0..1.0).contains(&hash_signed(7, id, 3)));
        }
        assert_ne!(hash_unit(7, 1, 0), hash_unit(8, 1, 0));
    }

    #[test]
    fn hsl_primaries() {
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1.0e-6 && red[1].abs() < 1.0e-6 && red[2].abs() < 1.0e-6);
        let grey = hsl_to_rgb(0.3, 0.0, 0.4);
        assert!(grey.iter().all(|c| (c - 0.4).abs() < 1.0e-6));
    }
}
