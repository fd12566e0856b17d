//! Shared sampling and interpolation helpers.
//!
//! All randomness flows through a caller-supplied [`Rng`], so the engine can
//! own and inject its generator instead of leaning on process-global state.

use rand::Rng;

/// Uniform sample in `[0, 1)`.
pub fn rand_unit(rng: &mut impl Rng) -> f32 {
    rng.gen()
}

/// Uniform integer in `[0, max]`, inclusive on both ends.
pub fn rand_int(rng: &mut impl Rng, max: usize) -> usize {
    rng.gen_range(0..=max)
}

/// Uniform integer in `[min, max]`, inclusive on both ends.
pub fn rand_int_in(rng: &mut impl Rng, min: i32, max: i32) -> i32 {
    rng.gen_range(min..=max)
}

/// Zero-mean normal sample with standard deviation `std_dev`, drawn with
/// the Marsaglia polar method.
pub fn gaussian(rng: &mut impl Rng, std_dev: f32) -> f32 {
    loop {
        let u = 2.0 * rng.gen::<f32>() - 1.0;
        let v = 2.0 * rng.gen::<f32>() - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return std_dev * u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

pub fn clamp<T: PartialOrd>(value: T, min_value: T, max_value: T) -> T {
    if value < min_value {
        min_value
    } else if value > max_value {
        max_value
    } else {
        value
    }
}

/// Integer interpolation between `a` and `b`. Only the visualiser cares,
/// but it lives with the rest of the shared helpers.
pub fn lerp(a: i32, b: i32, alpha: f32) -> i32 {
    a + (alpha * (b - a) as f32) as i32
}
