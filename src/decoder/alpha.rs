//! Undoing premultiplied (associated) alpha
//!
//! Associated alpha stores `color * alpha`. Consumers of the decoded image expect straight
//! color, so the stored values are divided back out once alpha is known.

use super::sample::Sample;
use super::writer::ChannelLayout;

/// Bound on the alpha correction steps of [`unpremultiply`] for float pixels.
pub const MAX_ALPHA_CORRECTION_STEPS: u32 = 1024;

/// Restores straight color for one pixel, in place.
///
/// For integer types each color is scaled by `max / alpha`, rounded and saturated; a zero
/// alpha makes the color zero.
///
/// For float types alpha is raised by the type's epsilon until dividing by it and multiplying
/// again gives back the stored colors, so tiny or zero alpha values do not blow up the
/// result. The adjusted alpha is stored back. After [`MAX_ALPHA_CORRECTION_STEPS`] steps the
/// colors are clamped to the finite range and decoding carries on.
pub fn unpremultiply<T: Sample>(pixel: &mut [T], layout: &ChannelLayout) {
    if T::IS_FLOAT {
        unpremultiply_float(pixel, layout)
    } else {
        unpremultiply_integer(pixel, layout)
    }
}

fn unpremultiply_integer<T: Sample>(pixel: &mut [T], layout: &ChannelLayout) {
    let alpha = pixel[layout.alpha()].to_f64();
    let factor = if alpha == 0.0 {
        0.0
    } else {
        T::unit_f64() / alpha
    };

    for &pos in layout.color() {
        pixel[pos] = T::from_f64(pixel[pos].to_f64() * factor);
    }
}

fn unpremultiply_float<T: Sample>(pixel: &mut [T], layout: &ChannelLayout) {
    let mut alpha = pixel[layout.alpha()].to_f64();
    let mut steps = 0;

    while !round_trips(pixel, layout, alpha) {
        if steps == MAX_ALPHA_CORRECTION_STEPS {
            log::warn!(
                "alpha {} could not be corrected after {} steps, clamping colors",
                pixel[layout.alpha()].to_f64(),
                steps
            );
            let alpha = alpha.max(T::EPSILON);
            for &pos in layout.color() {
                let straight = (pixel[pos].to_f64() / alpha).clamp(-T::MAX, T::MAX);
                pixel[pos] = T::from_f64(straight);
            }
            pixel[layout.alpha()] = T::from_f64(alpha);
            return;
        }

        alpha += T::EPSILON;
        steps += 1;
    }

    for &pos in layout.color() {
        pixel[pos] = T::from_f64(pixel[pos].to_f64() / alpha);
    }
    pixel[layout.alpha()] = T::from_f64(alpha);
}

/// Whether every stored color survives division by `alpha` and multiplication back.
fn round_trips<T: Sample>(pixel: &[T], layout: &ChannelLayout, alpha: f64) -> bool {
    if alpha <= 0.0 {
        return false;
    }

    layout.color().iter().all(|&pos| {
        let stored = pixel[pos].to_f64();
        let straight = T::from_f64(stored / alpha).to_f64();
        if !straight.is_finite() {
            return false;
        }
        let again = T::from_f64(straight * alpha).to_f64();
        (again - stored).abs() <= T::EPSILON * stored.abs()
    })
}
