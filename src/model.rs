use crate::error::{EngineError, Result};
use crate::features::{FeatureVector, N_FEATURES};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Standardizes each feature column to zero mean and unit variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EngineError::Model("cannot fit scaler on zero rows".into()))?;
        // constant columns keep their centered value of zero
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &self.mean) / &self.scale
    }
}

/// Linear regressor over scaled features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Fit `y ~ x` with an L2 `penalty` on the coefficients.
    ///
    /// `x` must already be standardized so the intercept is the target mean.
    /// The penalty is applied by appending `sqrt(penalty) * I` rows with zero
    /// targets, which keeps the normal equations invertible for tiny fleets.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, penalty: f64) -> Result<Self> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(EngineError::Model(format!(
                "shape mismatch: {} rows, {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let intercept = y.mean().unwrap_or(0.0);
        let centered = y.mapv(|v| v - intercept);

        let (records, targets) = if penalty > 0.0 {
            let n_features = x.ncols();
            let ridge = Array2::<f64>::eye(n_features) * penalty.sqrt();
            let records = concatenate(Axis(0), &[x.view(), ridge.view()])
                .map_err(|e| EngineError::Model(e.to_string()))?;
            let padding = Array1::<f64>::zeros(n_features);
            let targets = concatenate(Axis(0), &[centered.view(), padding.view()])
                .map_err(|e| EngineError::Model(e.to_string()))?;
            (records, targets)
        } else {
            (x.to_owned(), centered)
        };

        let ds = Dataset::new(records, targets);
        let fitted = LinearRegression::new()
            .with_intercept(false)
            .fit(&ds)
            .map_err(|e| EngineError::Model(format!("failed to fit regression: {}", e)))?;

        let coefficients = fitted.params().to_owned();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::Model("regression produced non-finite coefficients".into()));
        }

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        row.dot(&self.coefficients) + self.intercept
    }
}

/// Fitted scaler and regressor, always replaced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub regressor: LinearModel,
}

impl TrainedModel {
    /// Fit the scaler on `x`, then the regressor on the scaled `x`.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, penalty: f64) -> Result<Self> {
        let scaler = StandardScaler::fit(x)?;
        let regressor = LinearModel::fit(&scaler.transform(x), y, penalty)?;
        Ok(Self { scaler, regressor })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.regressor.predict(&self.scaler.transform(x))
    }

    /// Estimated days until maintenance for one vehicle.
    pub fn predict_days(&self, features: &FeatureVector) -> f64 {
        let row = features.to_array();
        self.regressor.predict_row(self.scaler.transform_row(row.view()).view())
    }

    /// Artifacts loaded from disk must match the feature layout.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            self.scaler.mean.len(),
            self.scaler.scale.len(),
            self.regressor.coefficients.len(),
        ];
        if dims.iter().any(|&d| d != N_FEATURES) {
            return Err(EngineError::Model(format!(
                "expected {} features, artifacts have {:?}",
                N_FEATURES, dims
            )));
        }
        if self.scaler.scale.iter().any(|s| *s <= 0.0 || !s.is_finite()) {
            return Err(EngineError::Model("scaler has a non-positive scale".into()));
        }
        Ok(())
    }
}
