//! Parametric synthetic datasets
//!
//! Used when no real training data is supplied so that both predictors are
//! always trainable. Column names match the real training files.

use super::Table;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Default synthetic sample count for the baby weight task
pub const BABY_WEIGHT_SAMPLES: usize = 2000;

/// Default synthetic sample count for the diabetes task
pub const DIABETES_SAMPLES: usize = 1000;

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| Error::Training(format!("Invalid distribution: {e}")))
}

/// Draw `n` clipped normal samples
fn clipped_normal(rng: &mut StdRng, n: usize, mean: f64, std_dev: f64, lo: f64, hi: f64) -> Result<Vec<f64>> {
    let dist = normal(mean, std_dev)?;
    Ok((0..n).map(|_| dist.sample(rng).clamp(lo, hi)).collect())
}

/// Draw `n` values from a discrete distribution
fn choice(rng: &mut StdRng, n: usize, values: &[f64], probabilities: &[f64]) -> Vec<f64> {
    (0..n)
        .map(|_| {
            let u: f64 = rng.random();
            let mut cumulative = 0.0;
            for (value, p) in values.iter().zip(probabilities) {
                cumulative += p;
                if u < cumulative {
                    return *value;
                }
            }
            values[values.len() - 1]
        })
        .collect()
}

/// Synthetic baby weight records (`case, bwt, gestation, parity, age, height, weight, smoke`)
pub fn baby_weight_samples(n: usize, seed: u64) -> Result<Table> {
    let mut rng = StdRng::seed_from_u64(seed);

    let gestation = clipped_normal(&mut rng, n, 280.0, 20.0, 240.0, 320.0)?;
    let age = clipped_normal(&mut rng, n, 28.0, 5.0, 18.0, 45.0)?;
    let height = clipped_normal(&mut rng, n, 165.0, 8.0, 150.0, 180.0)?;
    let weight = clipped_normal(&mut rng, n, 65.0, 12.0, 45.0, 100.0)?;
    let parity = choice(&mut rng, n, &[0.0, 1.0, 2.0], &[0.6, 0.3, 0.1]);
    let smoke = choice(&mut rng, n, &[0.0, 1.0], &[0.85, 0.15]);
    let noise = normal(0.0, 300.0)?;

    let bwt: Vec<f64> = (0..n)
        .map(|i| {
            let base = 2500.0 + (gestation[i] - 240.0) * 15.0;
            let age_factor = if age[i] < 25.0 {
                -50.0
            } else if age[i] > 35.0 {
                100.0
            } else {
                0.0
            };
            let height_factor = (height[i] - 165.0) * 8.0;
            let weight_factor = (weight[i] - 65.0) * 5.0;
            let parity_factor = parity[i] * 100.0;
            let smoke_factor = smoke[i] * -200.0;
            (base + age_factor + height_factor + weight_factor + parity_factor + smoke_factor
                + noise.sample(&mut rng))
            .clamp(2000.0, 5000.0)
        })
        .collect();

    let case: Vec<f64> = (1..=n).map(|i| i as f64).collect();

    Ok(Table::from_columns(vec![
        ("case", case),
        ("bwt", bwt),
        ("gestation", gestation),
        ("parity", parity),
        ("age", age),
        ("height", height),
        ("weight", weight),
        ("smoke", smoke),
    ]))
}

/// Synthetic gestational diabetes records
/// (`Age, Pregnancy No, Weight, Height, BMI, Heredity, Prediction`)
pub fn diabetes_samples(n: usize, seed: u64) -> Result<Table> {
    let mut rng = StdRng::seed_from_u64(seed);

    let age = clipped_normal(&mut rng, n, 30.0, 6.0, 18.0, 45.0)?;
    let pregnancies = choice(
        &mut rng,
        n,
        &[1.0, 2.0, 3.0, 4.0, 5.0],
        &[0.4, 0.3, 0.2, 0.08, 0.02],
    );
    let weight = clipped_normal(&mut rng, n, 70.0, 15.0, 45.0, 120.0)?;
    let height = clipped_normal(&mut rng, n, 160.0, 8.0, 145.0, 180.0)?;
    let bmi = clipped_normal(&mut rng, n, 27.0, 5.0, 18.0, 45.0)?;
    let heredity = choice(&mut rng, n, &[0.0, 1.0], &[0.7, 0.3]);
    let noise = normal(0.0, 0.1)?;

    let prediction: Vec<f64> = (0..n)
        .map(|i| {
            let risk = (age[i] - 25.0) * 0.02
                + (bmi[i] - 25.0) * 0.03
                + (pregnancies[i] - 1.0) * 0.1
                + heredity[i] * 0.3
                + noise.sample(&mut rng);
            if risk > 0.3 {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    Ok(Table::from_columns(vec![
        ("Age", age),
        ("Pregnancy No", pregnancies),
        ("Weight", weight),
        ("Height", height),
        ("BMI", bmi),
        ("Heredity", heredity),
        ("Prediction", prediction),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baby_weight_samples_shape_and_ranges() {
        let table = baby_weight_samples(500, 42).unwrap();
        assert_eq!(table.n_rows(), 500);
        assert_eq!(table.n_cols(), 8);

        let bwt = table.numeric_values(table.column_index("bwt").unwrap());
        assert!(bwt.iter().all(|v| (2000.0..=5000.0).contains(v)));

        let gestation = table.numeric_values(table.column_index("gestation").unwrap());
        assert!(gestation.iter().all(|v| (240.0..=320.0).contains(v)));

        let smoke = table.numeric_values(table.column_index("smoke").unwrap());
        assert!(smoke.iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn test_diabetes_samples_have_both_classes() {
        let table = diabetes_samples(500, 42).unwrap();
        let labels = table.numeric_values(table.column_index("Prediction").unwrap());
        assert!(labels.iter().any(|v| *v == 1.0));
        assert!(labels.iter().any(|v| *v == 0.0));
    }

    #[test]
    fn test_samples_are_deterministic() {
        assert_eq!(baby_weight_samples(50, 7).unwrap(), baby_weight_samples(50, 7).unwrap());
        assert_eq!(diabetes_samples(50, 7).unwrap(), diabetes_samples(50, 7).unwrap());
    }
}
