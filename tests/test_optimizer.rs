//! Integration tests for the momentum optimizer
//!
//! This file tests the update rules including:
//! - Zero momentum reducing exactly to gradient descent
//! - Velocity accumulating as a geometric series under a constant gradient
//! - Nesterov and classical variants on the same trajectory
//! - Updates applied through a compiled network

use approx::assert_relative_eq;
use momentum_nets::compiler::Compiler;
use momentum_nets::config::TrainingConfig;
use momentum_nets::graph::Graph;
use momentum_nets::layers::{LayerSpec, Parameter};
use momentum_nets::optimizers::{GradientDescent, Momentum, Optimizer};
use momentum_nets::utils::{LossKind, RandomSource};
use ndarray::{array, Array2};

fn params() -> Vec<Parameter> {
    vec![
        Parameter::new("dense", "weight", array![[0.3f32, -1.7], [2.5, 0.01]]),
        Parameter::new("dense", "bias", array![[0.125f32, -0.5]]),
    ]
}

fn grads() -> Vec<Array2<f32>> {
    vec![
        array![[0.7f32, -0.33], [1.9, -2.2]],
        array![[0.05f32, 3.0]],
    ]
}

// ============================================================================
// Zero Momentum Tests
// ============================================================================

mod zero_momentum_tests {
    use super::*;

    fn check_matches_descent(nesterov: bool) {
        let eta = 0.1f32;
        let mut optimizer = Momentum::new(eta, 0.0, nesterov).unwrap();
        let mut p = params();
        let g = grads();

        for _ in 0..3 {
            let expected: Vec<Array2<f32>> = p
                .iter()
                .zip(&g)
                .map(|(param, grad)| {
                    let mut out = param.value().clone();
                    out.zip_mut_with(grad, |w, &d| *w -= eta * d);
                    out
                })
                .collect();

            optimizer.step(&mut p, &g).unwrap();

            for (param, want) in p.iter().zip(&expected) {
                for (&got, &want) in param.value().iter().zip(want.iter()) {
                    assert_eq!(got.to_bits(), want.to_bits());
                }
            }
        }
    }

    #[test]
    fn test_classical_zero_momentum_is_descent() {
        check_matches_descent(false);
    }

    #[test]
    fn test_nesterov_zero_momentum_is_descent() {
        check_matches_descent(true);
    }

    #[test]
    fn test_matches_gradient_descent_optimizer() {
        let mut momentum = Momentum::new(0.05, 0.0, false).unwrap();
        let mut descent = GradientDescent::new(0.05);
        let (mut a, mut b) = (params(), params());

        momentum.step(&mut a, &grads()).unwrap();
        descent.step(&mut b, &grads()).unwrap();
        assert_eq!(a, b);
    }
}

// ============================================================================
// Velocity Accumulation Tests
// ============================================================================

mod velocity_tests {
    use super::*;

    #[test]
    fn test_velocity_is_geometric_series() {
        let (eta, mu) = (0.1f32, 0.9f32);
        let mut optimizer = Momentum::new(eta, mu, false).unwrap();
        let mut p = vec![Parameter::new("w", "weight", array![[0.0f32]])];
        let g = vec![array![[1.0f32]]];

        let mut expected_position = 0.0f32;
        for k in 1..=10 {
            optimizer.step(&mut p, &g).unwrap();

            let expected_velocity = -eta * (1.0 - mu.powi(k)) / (1.0 - mu);
            expected_position += expected_velocity;

            assert_relative_eq!(
                optimizer.velocities()[0][[0, 0]],
                expected_velocity,
                max_relative = 1e-5
            );
            assert_relative_eq!(p[0].value()[[0, 0]], expected_position, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_nesterov_velocity_matches_classical() {
        // Both variants share the velocity recursion; only the position differs.
        let mut classical = Momentum::new(0.1, 0.8, false).unwrap();
        let mut nesterov = Momentum::new(0.1, 0.8, true).unwrap();
        let (mut a, mut b) = (params(), params());

        for _ in 0..5 {
            classical.step(&mut a, &grads()).unwrap();
            nesterov.step(&mut b, &grads()).unwrap();
        }

        assert_eq!(classical.velocities(), nesterov.velocities());
        assert_ne!(a, b);
    }

    #[test]
    fn test_nesterov_step_formula() {
        let (eta, mu) = (0.5f32, 0.5f32);
        let mut optimizer = Momentum::new(eta, mu, true).unwrap();
        let mut p = vec![Parameter::new("w", "weight", array![[1.0f32]])];
        let g = vec![array![[1.0f32]]];

        // v1 = -0.5, p1 = 1 + 0.5 * -0.5 - 0.5 = 0.25
        optimizer.step(&mut p, &g).unwrap();
        assert_eq!(p[0].value()[[0, 0]], 0.25);

        // v2 = 0.5 * -0.5 - 0.5 = -0.75, p2 = 0.25 + 0.5 * -0.75 - 0.5 = -0.625
        optimizer.step(&mut p, &g).unwrap();
        assert_eq!(optimizer.velocities()[0][[0, 0]], -0.75);
        assert_eq!(p[0].value()[[0, 0]], -0.625);
    }

    #[test]
    fn test_each_parameter_updated_once() {
        let mut optimizer = Momentum::new(1.0, 0.0, false).unwrap();
        let mut p = vec![
            Parameter::new("a", "weight", array![[0.0f32]]),
            Parameter::new("b", "weight", array![[0.0f32]]),
        ];
        optimizer
            .step(&mut p, &[array![[1.0f32]], array![[2.0f32]]])
            .unwrap();

        assert_eq!(p[0].value()[[0, 0]], -1.0);
        assert_eq!(p[1].value()[[0, 0]], -2.0);
    }
}

// ============================================================================
// Network Integration Tests
// ============================================================================

mod network_tests {
    use super::*;

    #[test]
    fn test_from_config_drives_network() {
        let graph = Graph::sequential(
            [LayerSpec::input(2), LayerSpec::tanh(3), LayerSpec::linear(1)],
            &mut RandomSource::seeded(8),
        )
        .unwrap();
        let mut network = Compiler::compile(graph, LossKind::Mse).unwrap();

        let config = TrainingConfig::new()
            .with_step(0.05)
            .unwrap()
            .with_momentum(0.5)
            .unwrap()
            .with_nesterov(true)
            .unwrap();
        let mut optimizer = Momentum::from_config(&config).for_parameters(network.parameters());
        assert_eq!(optimizer.learning_rate(), 0.05);
        assert!(optimizer.nesterov());

        let x = array![[0.1f32, 0.2], [0.4, -0.3], [-0.5, 0.9]];
        let y = array![[0.3f32], [0.1], [-0.4]];

        let first = network.train_step(&x, &y).unwrap();
        for _ in 0..50 {
            network.train_step(&x, &y).unwrap();
            network.apply_gradients(&mut optimizer).unwrap();
        }
        let last = network.evaluate(&x, &y).unwrap();
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn test_wrong_gradient_count_rejected() {
        let mut optimizer = Momentum::new(0.1, 0.9, false).unwrap();
        let mut p = params();
        let err = optimizer.step(&mut p, &grads()[..1]).unwrap_err();
        assert!(err.to_string().contains("Gradient"));
    }
}
