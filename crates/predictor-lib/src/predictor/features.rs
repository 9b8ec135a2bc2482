//! Feature vectors and standardization
//!
//! A [`FeatureVector`] is the fixed, ordered set of named inputs a task feeds
//! its model. The [`FeatureScaler`] is fitted once on the training split and
//! persisted with the model; inference always reuses the training statistics.

use crate::dataset::{mean, population_std};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Ordered named feature values for a single prediction
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: &'static [&'static str],
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(names: &'static [&'static str], values: Vec<f64>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(Error::FeatureMismatch {
                expected: names.len(),
                got: values.len(),
            });
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Serialized as a JSON object whose keys keep feature order
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.names.iter().zip(&self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerState {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Per-column standardization `(x - mean) / std` with population statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    state: Option<ScalerState>,
}

impl FeatureScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on the rows of `x`. Zero-variance columns get a scale of 1.
    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(Error::Training("Cannot fit scaler on an empty matrix".to_string()));
        }
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());
        for column in x.columns() {
            let values = column.to_vec();
            let std = population_std(&values);
            means.push(mean(&values));
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }
        self.state = Some(ScalerState {
            mean: means,
            scale: scales,
        });
        Ok(())
    }

    pub fn fitted(x: ArrayView2<f64>) -> Result<Self> {
        let mut scaler = Self::new();
        scaler.fit(x)?;
        Ok(scaler)
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.mean.len())
    }

    pub fn mean(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.mean.as_slice())
    }

    pub fn scale(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.scale.as_slice())
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        let state = self.state.as_ref().ok_or(Error::NotFitted)?;
        if row.len() != state.mean.len() {
            return Err(Error::FeatureMismatch {
                expected: state.mean.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(state.mean.iter().zip(&state.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn transform_vector(&self, features: &FeatureVector) -> Result<Array1<f64>> {
        self.transform_row(ArrayView1::from(features.values()))
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(Error::NotFitted)?;
        if x.ncols() != state.mean.len() {
            return Err(Error::FeatureMismatch {
                expected: state.mean.len(),
                got: x.ncols(),
            });
        }
        let mut out = x.to_owned();
        for (j, mut column) in out.columns_mut().into_iter().enumerate() {
            let (m, s) = (state.mean[j], state.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }
}
