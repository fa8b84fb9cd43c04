//! Integration tests for graph construction
//!
//! This file tests the graph builder including:
//! - Shape inference along chains and branches
//! - Width mismatches reported with both widths
//! - Structural errors (cycles, dangling outputs, bad edges, misplaced inputs)
//! - Deterministic parameter initialization

use momentum_nets::error::NetworkError;
use momentum_nets::graph::{Graph, GraphBuilder};
use momentum_nets::layers::{Initializer, LayerKind, LayerSpec};
use momentum_nets::utils::{Activation, RandomSource};

fn rng() -> RandomSource {
    RandomSource::seeded(2024)
}

// ============================================================================
// Shape Inference Tests
// ============================================================================

mod shape_tests {
    use super::*;

    #[test]
    fn test_chain_widths() {
        let graph = Graph::sequential(
            [
                LayerSpec::input(784),
                LayerSpec::relu(256),
                LayerSpec::sigmoid(64),
                LayerSpec::softmax(10),
            ],
            &mut rng(),
        )
        .unwrap();

        let widths: Vec<(usize, usize)> = graph
            .nodes()
            .iter()
            .map(|n| (n.layer().input_width(), n.layer().output_width()))
            .collect();
        assert_eq!(widths, vec![(784, 784), (784, 256), (256, 64), (64, 10)]);
        assert_eq!(graph.input_width(), 784);
        assert_eq!(graph.output_width(), 10);
    }

    #[test]
    fn test_parameter_order_follows_declaration() {
        let graph = Graph::sequential(
            [
                LayerSpec::input(3).with_name("in"),
                LayerSpec::relu(5).with_name("hidden"),
                LayerSpec::softmax(2).with_name("out"),
            ],
            &mut rng(),
        )
        .unwrap();

        let names: Vec<&str> = graph.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["hidden/weight", "hidden/bias", "out/weight", "out/bias"]
        );
        assert_eq!(graph.parameters()[0].shape(), (3, 5));
        assert_eq!(graph.parameters()[3].shape(), (1, 2));
        assert!(graph.parameters()[1].value().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_declared_input_width_that_matches_is_accepted() {
        let graph = Graph::sequential(
            [LayerSpec::input(4), LayerSpec::tanh(3).with_input_width(4)],
            &mut rng(),
        );
        assert!(graph.is_ok());
    }

    #[test]
    fn test_concatenate_width_is_sum_of_inputs() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(3));
        let b = builder.add(LayerSpec::tanh(5));
        let merge = builder.add(LayerSpec::concatenate());
        let out = builder.add(LayerSpec::linear(1).with_input_width(8));
        builder
            .connect(input, a)
            .connect(input, b)
            .connect(a, merge)
            .connect(b, merge)
            .connect(merge, out);

        let graph = builder.build(&mut rng()).unwrap();
        assert_eq!(graph.node(merge).layer().output_width(), 8);
        assert_eq!(graph.node(merge).kind(), LayerKind::Concatenate);
    }
}

// ============================================================================
// Mismatch Tests
// ============================================================================

mod mismatch_tests {
    use super::*;

    #[test]
    fn test_mismatch_error_names_both_widths() {
        let err = Graph::sequential(
            [
                LayerSpec::input(10),
                LayerSpec::relu(6).with_name("first"),
                LayerSpec::relu(3).with_name("second").with_input_width(7),
            ],
            &mut rng(),
        )
        .unwrap_err();

        assert!(err.is_graph_construction());
        let message = err.to_string();
        assert!(message.contains("second"), "{message}");
        assert!(message.contains('7'), "{message}");
        assert!(message.contains('6'), "{message}");
        assert!(matches!(
            err,
            NetworkError::ShapeMismatch {
                expected: 7,
                actual: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_concatenate_declared_width_mismatch() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(3));
        let b = builder.add(LayerSpec::relu(3));
        let merge = builder.add(LayerSpec::new(LayerKind::Concatenate, Some(5)));
        builder
            .connect(input, a)
            .connect(input, b)
            .connect(a, merge)
            .connect(b, merge);

        let err = builder.build(&mut rng()).unwrap_err();
        assert!(err.is_graph_construction());
        assert!(err.to_string().contains('6'));
    }
}

// ============================================================================
// Structural Error Tests
// ============================================================================

mod structure_tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let err = GraphBuilder::new().build(&mut rng()).unwrap_err();
        assert!(err.is_graph_construction());
    }

    #[test]
    fn test_second_input_rejected() {
        let err = Graph::sequential(
            [LayerSpec::input(2), LayerSpec::input(2), LayerSpec::relu(1)],
            &mut rng(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input"));
    }

    #[test]
    fn test_duplicate_names() {
        let err = Graph::sequential(
            [
                LayerSpec::input(2),
                LayerSpec::relu(2).with_name("dup"),
                LayerSpec::relu(2).with_name("dup"),
            ],
            &mut rng(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[test]
    fn test_missing_width() {
        let err = Graph::sequential(
            [
                LayerSpec::input(2),
                LayerSpec::new(LayerKind::Dense(Activation::Relu), None),
            ],
            &mut rng(),
        )
        .unwrap_err();
        assert!(err.is_graph_construction());
    }

    #[test]
    fn test_zero_width() {
        let err = Graph::sequential([LayerSpec::input(0), LayerSpec::relu(2)], &mut rng()).unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_self_loop() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(2));
        builder.connect(input, a).connect(a, a);
        assert!(builder.build(&mut rng()).is_err());
    }

    #[test]
    fn test_duplicate_edge() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(2));
        builder.connect(input, a).connect(input, a);
        let err = builder.build(&mut rng()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_edge_into_input() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(2));
        builder.connect(input, a).connect(a, input);
        assert!(builder.build(&mut rng()).is_err());
    }

    #[test]
    fn test_dense_with_two_inputs() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(2));
        let b = builder.add(LayerSpec::relu(2));
        builder.connect(input, a).connect(input, b).connect(a, b);
        let err = builder.build(&mut rng()).unwrap_err();
        assert!(err.to_string().contains("exactly 1 input"));
    }

    #[test]
    fn test_concatenate_with_one_input() {
        let err = Graph::sequential(
            [LayerSpec::input(2), LayerSpec::concatenate()],
            &mut rng(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 2 inputs"));
    }

    #[test]
    fn test_unreachable_layer_is_dangling() {
        let mut builder = GraphBuilder::new();
        let input = builder.add(LayerSpec::input(2));
        let a = builder.add(LayerSpec::relu(2));
        builder.add(LayerSpec::relu(2));
        builder.connect(input, a);
        assert!(builder.build(&mut rng()).is_err());
    }
}

// ============================================================================
// Initialization Tests
// ============================================================================

mod initialization_tests {
    use super::*;

    #[test]
    fn test_same_seed_same_parameters() {
        let specs = || [LayerSpec::input(4), LayerSpec::relu(8), LayerSpec::softmax(3)];
        let a = Graph::sequential(specs(), &mut RandomSource::seeded(5)).unwrap();
        let b = Graph::sequential(specs(), &mut RandomSource::seeded(5)).unwrap();
        let c = Graph::sequential(specs(), &mut RandomSource::seeded(6)).unwrap();

        assert_eq!(a.parameters(), b.parameters());
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn test_explicit_initializer() {
        let graph = Graph::sequential(
            [
                LayerSpec::input(2),
                LayerSpec::linear(3).with_initializer(Initializer::Constant { value: 0.25 }),
            ],
            &mut rng(),
        )
        .unwrap();
        assert!(graph.parameters()[0].value().iter().all(|&w| w == 0.25));
    }

    #[test]
    fn test_summary_reports_parameter_count() {
        let graph = Graph::sequential(
            [LayerSpec::input(2), LayerSpec::relu(2), LayerSpec::softmax(2)],
            &mut rng(),
        )
        .unwrap();
        assert_eq!(graph.parameter_count(), 12);
        assert!(graph.summary().ends_with("total trainable parameters: 12"));
    }
}
