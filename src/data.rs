//! Dataset helpers: shape validation and mini-batch planning.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{NetworkError, Result};
use crate::utils::RandomSource;

/// Check that `x` has at least one row and `width` columns.
pub fn validate_features(x: &ArrayView2<f32>, width: usize, what: &str) -> Result<()> {
    if x.nrows() == 0 {
        return Err(NetworkError::data_shape(what, "at least one row", "0 rows"));
    }
    if x.ncols() != width {
        return Err(NetworkError::data_shape(
            what,
            format!("{width} columns"),
            format!("{} columns", x.ncols()),
        ));
    }
    Ok(())
}

/// Check a `(features, targets)` pair against the network's input and output
/// widths, and that both hold the same number of samples.
pub fn validate_pair(
    x: &ArrayView2<f32>,
    y: &ArrayView2<f32>,
    input_width: usize,
    output_width: usize,
    what: &str,
) -> Result<()> {
    validate_features(x, input_width, &format!("{what} features"))?;
    if y.ncols() != output_width {
        return Err(NetworkError::data_shape(
            format!("{what} targets"),
            format!("{output_width} columns"),
            format!("{} columns", y.ncols()),
        ));
    }
    if y.nrows() != x.nrows() {
        return Err(NetworkError::data_shape(
            format!("{what} targets"),
            format!("{} rows to match the features", x.nrows()),
            format!("{} rows", y.nrows()),
        ));
    }
    Ok(())
}

/// Split `rows` sample indices into the batches of one epoch.
///
/// `None` as batch size means a single full batch. With `shuffle` the row
/// order is permuted first using `rng`; otherwise the original order is kept
/// and `rng` is left untouched. The last batch may be smaller.
pub fn epoch_batches(
    rows: usize,
    batch_size: Option<usize>,
    shuffle: bool,
    rng: &mut RandomSource,
) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..rows).collect();
    if shuffle {
        rng.shuffle(&mut indices);
    }

    let size = batch_size.unwrap_or(rows).max(1);
    indices.chunks(size).map(<[usize]>::to_vec).collect()
}

/// Gather the given rows into a new matrix.
pub fn take_rows(data: &ArrayView2<f32>, indices: &[usize]) -> Array2<f32> {
    data.select(Axis(0), indices)
}
