/// Coefficient of determination. A constant target scores 1.0 when matched
/// exactly and 0.0 otherwise.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(truth.len(), predicted.len());
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Absolute prediction error statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    pub mean_abs: f64,
    pub max_abs: f64,
}

pub fn deviation(truth: &[f64], predicted: &[f64]) -> Deviation {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return Deviation {
            mean_abs: 0.0,
            max_abs: 0.0,
        };
    }
    let (sum, max) = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (p - t).abs())
        .fold((0.0, 0.0f64), |(s, m), e| (s + e, m.max(e)));
    Deviation {
        mean_abs: sum / n as f64,
        max_abs: max,
    }
}

/// Mean of the absolute values, or zero for an empty slice.
pub fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
    }
}
