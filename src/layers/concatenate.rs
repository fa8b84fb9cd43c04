//! Merge layer joining several inputs along the feature axis.

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

use crate::error::{NetworkError, Result};

/// Concatenates its inputs column-wise, in edge declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Concatenate {
    widths: Vec<usize>,
}

impl Concatenate {
    pub fn new(widths: Vec<usize>) -> Self {
        Self { widths }
    }

    /// Widths of the inputs, in the order they are joined.
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn output_width(&self) -> usize {
        self.widths.iter().sum()
    }

    pub fn forward(&self, inputs: &[ArrayView2<f32>]) -> Result<Array2<f32>> {
        concatenate(Axis(1), inputs)
            .map_err(|e| NetworkError::data_shape("concatenated inputs", "equal row counts", e))
    }

    /// Split the output gradient back into one gradient per input.
    pub fn backward(&self, grad_output: &ArrayView2<f32>) -> Vec<Array2<f32>> {
        let mut start = 0;
        self.widths
            .iter()
            .map(|&width| {
                let part = grad_output.slice(s![.., start..start + width]).to_owned();
                start += width;
                part
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_forward_joins_columns() {
        let layer = Concatenate::new(vec![1, 2]);
        let a = array![[1.0f32], [2.0]];
        let b = array![[3.0f32, 4.0], [5.0, 6.0]];

        let out = layer.forward(&[a.view(), b.view()]).unwrap();
        assert_eq!(out, array![[1.0f32, 3.0, 4.0], [2.0, 5.0, 6.0]]);
        assert_eq!(layer.output_width(), 3);
    }

    #[test]
    fn test_backward_splits_columns() {
        let layer = Concatenate::new(vec![2, 1]);
        let g = array![[1.0f32, 2.0, 3.0]];

        let parts = layer.backward(&g.view());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], array![[1.0f32, 2.0]]);
        assert_eq!(parts[1], array![[3.0f32]]);
    }
}
