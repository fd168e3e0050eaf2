/// Compute the Euclidean distance between two vectors.
///
/// Uses f64 intermediate precision. Components beyond the shorter slice are
/// ignored; callers validate dimensions before reaching here.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_distance(a, b).max(0.0).sqrt() as f32
}

/// Squared Euclidean distance with f64 accumulation.
pub(crate) fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut sum: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = x as f64 - y as f64;
        sum += d * d;
    }
    sum
}

/// Dot product with f64 accumulation.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
    let mut sum: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        sum += x as f64 * y as f64;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(euclidean_distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_three_four_five() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_symmetric() {
        let a = [0.3, -1.2, 4.0];
        let b = [1.0, 0.5, -2.0];
        assert_eq!(euclidean_distance(&a, &b), euclidean_distance(&b, &a));
    }

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }
}
