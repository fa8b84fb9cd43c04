//! Forward/backward compiler
//!
//! [`Compiler::compile`] binds a [`Graph`] to a loss and yields a [`Network`]
//! that can run inference, compute a loss, and backpropagate through the
//! graph in reverse topological order.

use log::info;
use ndarray::{Array2, ArrayView2};

use crate::data::{validate_features, validate_pair};
use crate::error::{NetworkError, Result};
use crate::graph::{Graph, NodeId};
use crate::layers::{Layer, Parameter};
use crate::optimizers::Optimizer;
use crate::utils::{Activation, LossKind};

/// Turns a graph into a trainable [`Network`].
pub struct Compiler;

impl Compiler {
    /// Compile `graph` against `loss`.
    ///
    /// Categorical cross-entropy needs at least two output units.
    pub fn compile(graph: Graph, loss: LossKind) -> Result<Network> {
        if loss == LossKind::CategoricalCrossentropy && graph.output_width() < 2 {
            return Err(NetworkError::configuration(
                "error",
                loss,
                format!(
                    "a loss compatible with an output of width {}",
                    graph.output_width()
                ),
            ));
        }

        let gradients = graph
            .parameters()
            .iter()
            .map(|p| Array2::zeros(p.shape()))
            .collect();

        info!(
            "compiled network: {} -> {}, {} parameters, loss {}",
            graph.input_width(),
            graph.output_width(),
            graph.parameter_count(),
            loss
        );

        Ok(Network {
            graph,
            loss,
            gradients,
        })
    }
}

/// A compiled graph: forward pass, loss and gradients.
///
/// Gradients from the latest [`Network::train_step`] are kept until the next
/// one, one per parameter and in the same order as [`Network::parameters`].
#[derive(Debug, Clone)]
pub struct Network {
    graph: Graph,
    loss: LossKind,
    gradients: Vec<Array2<f32>>,
}

impl Network {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn loss(&self) -> LossKind {
        self.loss
    }

    pub fn input_width(&self) -> usize {
        self.graph.input_width()
    }

    pub fn output_width(&self) -> usize {
        self.graph.output_width()
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.graph.parameters()
    }

    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        self.graph.parameters_mut()
    }

    /// Gradients computed by the last training step.
    pub fn gradients(&self) -> &[Array2<f32>] {
        &self.gradients
    }

    /// Run inference. Doesn't touch any state: two calls on the same input
    /// return identical outputs.
    pub fn predict(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        validate_features(&x.view(), self.input_width(), "input")?;
        let mut activations = self.forward(&x.view())?;
        take_output(&mut activations, self.graph.output_node())
    }

    /// Loss of the network on `(x, y)` without computing gradients.
    pub fn evaluate(&self, x: &Array2<f32>, y: &Array2<f32>) -> Result<f32> {
        validate_pair(
            &x.view(),
            &y.view(),
            self.input_width(),
            self.output_width(),
            "evaluation",
        )?;
        let predicted = self.predict(x)?;
        Ok(self.loss.loss(&predicted.view(), &y.view()))
    }

    /// Forward pass, loss and backward pass on one batch.
    ///
    /// Returns the batch loss; gradients are available from
    /// [`Network::gradients`] afterwards. Fails with
    /// [`NetworkError::NumericInstability`] when the loss or any gradient
    /// isn't finite, leaving the previous gradients in place.
    pub fn train_step(&mut self, x: &Array2<f32>, y: &Array2<f32>) -> Result<f32> {
        validate_pair(
            &x.view(),
            &y.view(),
            self.input_width(),
            self.output_width(),
            "training",
        )?;

        let activations = self.forward(&x.view())?;
        let predicted = upstream(&activations, self.graph.output_node())?;

        let loss = self.loss.loss(&predicted.view(), &y.view());
        if !loss.is_finite() {
            return Err(NetworkError::numeric("loss"));
        }

        let gradients = self.backward(&activations, &y.view())?;
        if let Some(i) = gradients
            .iter()
            .position(|g| g.iter().any(|v| !v.is_finite()))
        {
            return Err(NetworkError::numeric(format!(
                "gradient of `{}`",
                self.graph.parameters()[i].name()
            )));
        }

        self.gradients = gradients;
        Ok(loss)
    }

    /// Let `optimizer` update the parameters from the stored gradients.
    ///
    /// The update runs on copies of the parameters and of the optimizer and is
    /// committed only when every updated value is finite. On
    /// [`NetworkError::NumericInstability`] both the parameters and the
    /// optimizer state are left exactly as they were.
    pub fn apply_gradients<O: Optimizer + Clone>(&mut self, optimizer: &mut O) -> Result<()> {
        let mut candidate = optimizer.clone();
        let mut updated = self.graph.parameters().to_vec();
        candidate.step(&mut updated, &self.gradients)?;

        if let Some(p) = updated
            .iter()
            .find(|p| p.value().iter().any(|v| !v.is_finite()))
        {
            return Err(NetworkError::numeric(format!("parameter `{}`", p.name())));
        }

        for (param, value) in self.graph.parameters_mut().iter_mut().zip(updated) {
            *param = value;
        }
        *optimizer = candidate;
        Ok(())
    }

    /// Outputs of every node, indexed by node.
    fn forward(&self, x: &ArrayView2<f32>) -> Result<Vec<Option<Array2<f32>>>> {
        let params = self.graph.parameters();
        let mut activations: Vec<Option<Array2<f32>>> = vec![None; self.graph.nodes().len()];

        for &id in self.graph.topological_order() {
            let node = self.graph.node(id);
            let out = match node.layer() {
                Layer::Input { .. } => x.to_owned(),
                Layer::Dense(dense) => {
                    let input = upstream(&activations, node.inputs()[0])?;
                    dense.forward(params, &input.view())
                }
                Layer::Concatenate(concat) => {
                    let inputs = node
                        .inputs()
                        .iter()
                        .map(|&from| upstream(&activations, from).map(|a| a.view()))
                        .collect::<Result<Vec<_>>>()?;
                    concat.forward(&inputs)?
                }
            };
            activations[id.index()] = Some(out);
        }

        Ok(activations)
    }

    fn backward(
        &self,
        activations: &[Option<Array2<f32>>],
        target: &ArrayView2<f32>,
    ) -> Result<Vec<Array2<f32>>> {
        let params = self.graph.parameters();
        let output = self.graph.output_node();
        let mut param_grads: Vec<Array2<f32>> =
            params.iter().map(|p| Array2::zeros(p.shape())).collect();
        let mut node_grads: Vec<Option<Array2<f32>>> = vec![None; self.graph.nodes().len()];

        let predicted = upstream(activations, output)?;
        let fused = self.fused_softmax_crossentropy();
        node_grads[output.index()] = Some(if fused {
            // d(loss)/dz for softmax + cross-entropy
            (predicted - target) / target.nrows() as f32
        } else {
            self.loss.gradient(&predicted.view(), target)
        });

        for &id in self.graph.topological_order().iter().rev() {
            let node = self.graph.node(id);
            let Some(grad) = node_grads[id.index()].take() else {
                continue;
            };

            match node.layer() {
                Layer::Input { .. } => {}
                Layer::Dense(dense) => {
                    let from = node.inputs()[0];
                    let input = upstream(activations, from)?;
                    let grads = if fused && id == output {
                        dense.backward_linear(params, &input.view(), &grad.view())
                    } else {
                        let out = upstream(activations, id)?;
                        dense.backward(params, &input.view(), &out.view(), &grad.view())
                    };
                    param_grads[dense.weight().index()] = grads.weight;
                    param_grads[dense.bias().index()] = grads.bias;
                    accumulate(&mut node_grads, from, grads.input);
                }
                Layer::Concatenate(concat) => {
                    for (&from, part) in node.inputs().iter().zip(concat.backward(&grad.view())) {
                        accumulate(&mut node_grads, from, part);
                    }
                }
            }
        }

        Ok(param_grads)
    }

    fn fused_softmax_crossentropy(&self) -> bool {
        self.loss == LossKind::CategoricalCrossentropy
            && matches!(
                self.graph.node(self.graph.output_node()).layer(),
                Layer::Dense(dense) if dense.activation() == Activation::Softmax
            )
    }
}

fn upstream(activations: &[Option<Array2<f32>>], id: NodeId) -> Result<&Array2<f32>> {
    activations[id.index()]
        .as_ref()
        .ok_or_else(|| NetworkError::graph(format!("#{}", id.index()), "input evaluated out of order"))
}

fn take_output(activations: &mut [Option<Array2<f32>>], output: NodeId) -> Result<Array2<f32>> {
    activations[output.index()]
        .take()
        .ok_or_else(|| NetworkError::graph("<output>", "output was not computed"))
}

fn accumulate(grads: &mut [Option<Array2<f32>>], id: NodeId, grad: Array2<f32>) {
    match &mut grads[id.index()] {
        Some(existing) => *existing += &grad,
        slot => *slot = Some(grad),
    }
}
