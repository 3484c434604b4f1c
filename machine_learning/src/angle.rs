use std::f64::consts::TAU;

/// Reduces `x` to the canonical `[0, 2π)` range.
///
/// Every mutation of a learnable angle goes through here. `rem_euclid` can round up to
/// exactly `2π` for tiny negative inputs, that case is folded back to `0`.
#[inline]
pub fn wrap_angle(x: f64) -> f64 {
    let r = x.rem_euclid(TAU);
    if r >= TAU { 0. } else { r }
}

/// Reduces every element of `angles` in place.
pub fn wrap_all(angles: &mut [f64]) {
    angles.iter_mut().for_each(|a| *a = wrap_angle(*a));
}
