// Tests for numerical gradient checking using finite differences.
// These tests verify that the gradients computed by the compiled backward
// pass match central-difference approximations of the loss.

use momentum_nets::compiler::{Compiler, Network};
use momentum_nets::graph::GraphBuilder;
use momentum_nets::layers::LayerSpec;
use momentum_nets::utils::{LossKind, RandomSource};
use ndarray::{array, Array2};

const EPSILON: f32 = 1e-2;

fn compile(builder: GraphBuilder, loss: LossKind, seed: u64) -> Network {
    let graph = builder.build(&mut RandomSource::seeded(seed)).unwrap();
    Compiler::compile(graph, loss).unwrap()
}

// Central difference of the loss with respect to one parameter entry.
fn numerical_gradient(
    net: &Network,
    x: &Array2<f32>,
    y: &Array2<f32>,
    param: usize,
    index: (usize, usize),
) -> f32 {
    let mut plus = net.clone();
    let mut minus = net.clone();
    plus.parameters_mut()[param].value_mut()[index] += EPSILON;
    minus.parameters_mut()[param].value_mut()[index] -= EPSILON;

    let loss_plus = plus.evaluate(x, y).unwrap();
    let loss_minus = minus.evaluate(x, y).unwrap();
    (loss_plus - loss_minus) / (2.0 * EPSILON)
}

// Compare every analytical gradient entry with its numerical estimate.
fn check_all_gradients(mut net: Network, x: &Array2<f32>, y: &Array2<f32>) {
    net.train_step(x, y).unwrap();
    let analytical = net.gradients().to_vec();

    for (p, grad) in analytical.iter().enumerate() {
        for ((r, c), &expected) in grad.indexed_iter() {
            let numerical = numerical_gradient(&net, x, y, p, (r, c));
            let tolerance = 2e-3 + 2e-2 * expected.abs();
            assert!(
                (numerical - expected).abs() <= tolerance,
                "parameter {} [{}, {}]: analytical {} vs numerical {}",
                net.parameters()[p].name(),
                r,
                c,
                expected,
                numerical
            );
        }
    }
}

// ============================================================================
// Chains
// ============================================================================

mod chain_tests {
    use super::*;

    #[test]
    fn test_sigmoid_mse() {
        let net = compile(
            GraphBuilder::sequential([
                LayerSpec::input(3),
                LayerSpec::sigmoid(4),
                LayerSpec::sigmoid(2),
            ]),
            LossKind::Mse,
            11,
        );
        let x = array![[0.5f32, -0.2, 0.1], [0.9, 0.4, -0.7]];
        let y = array![[1.0f32, 0.0], [0.0, 1.0]];

        check_all_gradients(net, &x, &y);
    }

    #[test]
    fn test_tanh_linear_regression() {
        let net = compile(
            GraphBuilder::sequential([
                LayerSpec::input(2),
                LayerSpec::tanh(3),
                LayerSpec::linear(1),
            ]),
            LossKind::Mse,
            12,
        );
        let x = array![[0.3f32, -0.4], [-0.8, 0.6], [0.1, 0.2]];
        let y = array![[0.5f32], [-0.5], [0.0]];

        check_all_gradients(net, &x, &y);
    }

    #[test]
    fn test_softmax_categorical_crossentropy() {
        let net = compile(
            GraphBuilder::sequential([
                LayerSpec::input(2),
                LayerSpec::tanh(3),
                LayerSpec::softmax(3),
            ]),
            LossKind::CategoricalCrossentropy,
            13,
        );
        let x = array![[0.2f32, 0.7], [-0.5, 0.1]];
        let y = array![[0.0f32, 1.0, 0.0], [1.0, 0.0, 0.0]];

        check_all_gradients(net, &x, &y);
    }

    #[test]
    fn test_sigmoid_binary_crossentropy() {
        let net = compile(
            GraphBuilder::sequential([LayerSpec::input(2), LayerSpec::sigmoid(1)]),
            LossKind::BinaryCrossentropy,
            14,
        );
        let x = array![[0.2f32, 0.7], [-0.5, 0.1], [1.0, -1.0]];
        let y = array![[1.0f32], [0.0], [1.0]];

        check_all_gradients(net, &x, &y);
    }
}

// ============================================================================
// Branching graphs
// ============================================================================

mod branching_tests {
    use super::*;

    #[test]
    fn test_concatenate_branches() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let left = builder.add(LayerSpec::tanh(3));
        let right = builder.add(LayerSpec::sigmoid(2));
        let merge = builder.add(LayerSpec::concatenate());
        let out = builder.add(LayerSpec::softmax(2));
        builder
            .connect(input, left)
            .connect(input, right)
            .connect(left, merge)
            .connect(right, merge)
            .connect(merge, out);

        let net = compile(builder, LossKind::CategoricalCrossentropy, 21);
        let x = array![[0.4f32, -0.3], [0.1, 0.9]];
        let y = array![[1.0f32, 0.0], [0.0, 1.0]];

        check_all_gradients(net, &x, &y);
    }

    #[test]
    fn test_shared_input_gradients_are_summed() {
        // The hidden layer feeds the merge twice through two paths.
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let hidden = builder.add(LayerSpec::tanh(2));
        let a = builder.add(LayerSpec::linear(2));
        let b = builder.add(LayerSpec::tanh(2));
        let merge = builder.add(LayerSpec::concatenate());
        let out = builder.add(LayerSpec::linear(1));
        builder
            .connect(input, hidden)
            .connect(hidden, a)
            .connect(hidden, b)
            .connect(a, merge)
            .connect(b, merge)
            .connect(merge, out);

        let net = compile(builder, LossKind::Mse, 22);
        let x = array![[0.5f32, 0.5], [-0.3, 0.8]];
        let y = array![[1.0f32], [-1.0]];

        check_all_gradients(net, &x, &y);
    }
}
