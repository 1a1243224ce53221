use ndarray::ArrayView2;

/// Intensity range mapped onto 0..=255 when the underlay is displayed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DisplayWindow {
    pub(crate) low: f32,
    pub(crate) high: f32,
}

pub(crate) struct Interpolator;

impl Interpolator {
    /// Window between the `low`/`high` percentiles of the finite values.
    ///
    /// Equal bounds are widened to `low + 1` so normalization never divides by zero.
    pub(crate) fn percentile_window(image: &ArrayView2<'_, f32>, low: f32, high: f32) -> DisplayWindow {
        let mut values: Vec<f32> = image.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return DisplayWindow { low: 0.0, high: 1.0 };
        }
        values.sort_unstable_by(f32::total_cmp);
        let lo = Self::percentile(&values, low);
        let mut hi = Self::percentile(&values, high);
        if (hi - lo).abs() <= f32::EPSILON * lo.abs().max(1.0) {
            hi = lo + 1.0;
        }
        DisplayWindow { low: lo, high: hi }
    }

    /// Linear-interpolated percentile of sorted values.
    fn percentile(sorted: &[f32], p: f32) -> f32 {
        let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
        let below = rank.floor() as usize;
        let above = (below + 1).min(sorted.len() - 1);
        let t = rank - below as f32;
        sorted[below].mul_add(1.0 - t, sorted[above] * t)
    }

    #[inline]
    pub(crate) fn normalize_to_u8(value: f32, window: DisplayWindow) -> u8 {
        if !value.is_finite() {
            return 0;
        }
        (((value - window.low) / (window.high - window.low)) * 255.0).clamp(0.0, 255.0) as u8
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<'_, f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}
