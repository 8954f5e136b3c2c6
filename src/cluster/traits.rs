use crate::error::Result;

/// One row of the zone-hour feature matrix: `(x_meters, y_meters, scaled_hour)`.
pub type Point3 = [f64; 3];

/// Common interface for weighted hard clustering (one label per point, `-1` for noise).
///
/// Points are fixed-size rows of any dimension `D`.
pub trait Clustering {
    /// Fit the model and return one label per input point.
    ///
    /// `weights[i]` is the density contribution of `data[i]`.
    fn fit_predict<const D: usize>(&self, data: &[[f64; D]], weights: &[f64])
        -> Result<Vec<i32>>;

    /// Same as [`Clustering::fit_predict`] with every point weighted 1.
    fn fit_predict_unweighted<const D: usize>(&self, data: &[[f64; D]]) -> Result<Vec<i32>> {
        let weights = vec![1.0; data.len()];
        self.fit_predict(data, &weights)
    }
}
