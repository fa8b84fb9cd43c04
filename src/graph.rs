//! Layer graph construction
//!
//! [`GraphBuilder`] wires a list of [`LayerSpec`]s into a validated, acyclic,
//! shape-checked [`Graph`]. Without explicit edges the layers form a chain in
//! declaration order; with [`GraphBuilder::connect`] any DAG with a single
//! input and a single output can be described.
//!
//! Every check runs before the first parameter is allocated, so a rejected
//! graph never consumes randomness from the [`RandomSource`].
//!
//! # Example
//!
//! ```
//! use momentum_nets::graph::GraphBuilder;
//! use momentum_nets::layers::LayerSpec;
//! use momentum_nets::utils::RandomSource;
//!
//! let mut rng = RandomSource::seeded(0);
//! let graph = GraphBuilder::sequential([
//!     LayerSpec::input(2),
//!     LayerSpec::relu(4),
//!     LayerSpec::softmax(2),
//! ])
//! .build(&mut rng)
//! .unwrap();
//!
//! assert_eq!(graph.input_width(), 2);
//! assert_eq!(graph.output_width(), 2);
//! assert_eq!(graph.parameters().len(), 4);
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::{debug, info};
use ndarray::Array2;

use crate::error::{NetworkError, Result};
use crate::layers::{Concatenate, DenseLayer, Layer, LayerKind, LayerSpec, ParamId, Parameter};
use crate::utils::RandomSource;

/// Handle to a node of a [`GraphBuilder`] / [`Graph`], in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A resolved layer together with its inbound edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: String,
    kind: LayerKind,
    layer: Layer,
    inputs: Vec<NodeId>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Upstream nodes, in edge declaration order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }
}

/// Collects layer specs and edges, then validates them into a [`Graph`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    specs: Vec<LayerSpec>,
    edges: Vec<(NodeId, NodeId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder whose layers will be chained in the given order.
    pub fn sequential<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = LayerSpec>,
    {
        Self {
            specs: specs.into_iter().collect(),
            edges: Vec::new(),
        }
    }

    /// Declare a layer and get its handle.
    pub fn add(&mut self, spec: LayerSpec) -> NodeId {
        self.specs.push(spec);
        NodeId(self.specs.len() - 1)
    }

    /// Chaining form of [`GraphBuilder::add`].
    pub fn layer(mut self, spec: LayerSpec) -> Self {
        self.add(spec);
        self
    }

    /// Declare a directed edge. Once any edge is declared the implicit chain
    /// is dropped and every connection must be explicit.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edges.push((from, to));
        self
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate the declaration and allocate parameters.
    ///
    /// # Errors
    ///
    /// [`NetworkError::GraphConstruction`] for structural problems (no input
    /// layer, cycles, dangling outputs, bad edge counts, invalid widths) and
    /// [`NetworkError::ShapeMismatch`] when a declared input width disagrees
    /// with what the upstream layers produce.
    pub fn build(&self, rng: &mut RandomSource) -> Result<Graph> {
        if self.specs.is_empty() {
            return Err(NetworkError::graph(
                "<empty>",
                "a graph needs at least an input layer",
            ));
        }

        let names = self.resolve_names()?;
        self.check_input_layer(&names)?;

        let edges = if self.edges.is_empty() {
            (1..self.specs.len())
                .map(|i| (NodeId(i - 1), NodeId(i)))
                .collect()
        } else {
            self.edges.clone()
        };
        let inputs = self.inbound_edges(&edges, &names)?;
        self.check_in_degrees(&inputs, &names)?;

        let order = topological_order(&inputs, &names)?;
        let output = single_sink(&edges, &names)?;
        let (in_widths, out_widths) = self.infer_widths(&order, &inputs, &names)?;

        // Everything is valid, parameters can be allocated.
        let mut parameters = Vec::new();
        let mut nodes = Vec::with_capacity(self.specs.len());
        for (i, spec) in self.specs.iter().enumerate() {
            let layer = match spec.kind() {
                LayerKind::Input => Layer::Input {
                    width: out_widths[i],
                },
                LayerKind::Concatenate => Layer::Concatenate(Concatenate::new(
                    inputs[i].iter().map(|id| out_widths[id.0]).collect(),
                )),
                kind @ (LayerKind::Dense(_) | LayerKind::Softmax) => {
                    let (fan_in, fan_out) = (in_widths[i], out_widths[i]);
                    let weight = spec
                        .weight_initializer()
                        .initialize(fan_in, fan_out, fan_in, fan_out, rng)?;

                    let weight_id = ParamId(parameters.len());
                    parameters.push(Parameter::new(&names[i], "weight", weight));
                    let bias_id = ParamId(parameters.len());
                    parameters.push(Parameter::new(&names[i], "bias", Array2::zeros((1, fan_out))));

                    let activation = kind.activation().unwrap_or_default();
                    Layer::Dense(DenseLayer::new(fan_in, fan_out, activation, weight_id, bias_id))
                }
            };

            nodes.push(Node {
                name: names[i].clone(),
                kind: spec.kind(),
                layer,
                inputs: inputs[i].clone(),
            });
        }

        let graph = Graph {
            nodes,
            order,
            parameters,
            input: NodeId(0),
            output,
        };
        info!("network architecture:\n{graph}");
        Ok(graph)
    }

    fn resolve_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .specs
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.resolved_name(i))
            .collect();

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(NetworkError::graph(name, "layer names must be unique"));
            }
        }
        Ok(names)
    }

    fn check_input_layer(&self, names: &[String]) -> Result<()> {
        if self.specs[0].kind() != LayerKind::Input {
            return Err(NetworkError::graph(
                &names[0],
                format!(
                    "the first layer must be an Input layer, found {}",
                    self.specs[0].kind()
                ),
            ));
        }
        if let Some(i) = (1..self.specs.len()).find(|&i| self.specs[i].kind() == LayerKind::Input)
        {
            return Err(NetworkError::graph(
                &names[i],
                "only one Input layer is supported",
            ));
        }
        Ok(())
    }

    fn inbound_edges(
        &self,
        edges: &[(NodeId, NodeId)],
        names: &[String],
    ) -> Result<Vec<Vec<NodeId>>> {
        let n = self.specs.len();
        let mut inputs = vec![Vec::new(); n];
        let mut seen = HashSet::new();

        for &(from, to) in edges {
            if from.0 >= n || to.0 >= n {
                let (bad, other) = if from.0 >= n { (from, to) } else { (to, from) };
                let anchor = names.get(other.0).map(String::as_str).unwrap_or("<unknown>");
                return Err(NetworkError::graph(
                    anchor,
                    format!("edge refers to unknown node #{}", bad.0),
                ));
            }
            if from == to {
                return Err(NetworkError::graph(&names[to.0], "a layer cannot feed itself"));
            }
            if to.0 == 0 {
                return Err(NetworkError::graph(
                    &names[0],
                    "the Input layer cannot receive edges",
                ));
            }
            if !seen.insert((from, to)) {
                return Err(NetworkError::graph(
                    &names[to.0],
                    format!("duplicate edge from `{}`", names[from.0]),
                ));
            }
            inputs[to.0].push(from);
        }

        Ok(inputs)
    }

    fn check_in_degrees(&self, inputs: &[Vec<NodeId>], names: &[String]) -> Result<()> {
        for (i, spec) in self.specs.iter().enumerate().skip(1) {
            let got = inputs[i].len();
            match spec.kind() {
                LayerKind::Concatenate if got < 2 => {
                    return Err(NetworkError::graph(
                        &names[i],
                        format!("Concatenate needs at least 2 inputs, got {got}"),
                    ));
                }
                LayerKind::Dense(_) | LayerKind::Softmax if got != 1 => {
                    return Err(NetworkError::graph(
                        &names[i],
                        format!("{} layers take exactly 1 input, got {got}", spec.kind()),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn infer_widths(
        &self,
        order: &[NodeId],
        inputs: &[Vec<NodeId>],
        names: &[String],
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let n = self.specs.len();
        let mut in_widths = vec![0; n];
        let mut out_widths = vec![0; n];

        for &id in order {
            let i = id.0;
            let spec = &self.specs[i];
            let name = &names[i];

            let inferred = match spec.kind() {
                LayerKind::Input => spec.width().unwrap_or(0),
                _ => inputs[i].iter().map(|from| out_widths[from.0]).sum(),
            };

            if spec.kind().has_parameters() {
                spec.weight_initializer()
                    .validate()
                    .map_err(|e| NetworkError::graph(name, e.to_string()))?;
            }

            if let Some(expected) = spec.input_width() {
                if expected != inferred {
                    return Err(NetworkError::ShapeMismatch {
                        layer: name.clone(),
                        expected,
                        actual: inferred,
                    });
                }
            }

            let width = match spec.kind() {
                LayerKind::Concatenate => match spec.width() {
                    Some(declared) if declared != inferred => {
                        return Err(NetworkError::graph(
                            name,
                            format!("declared width {declared} but inputs add up to {inferred}"),
                        ));
                    }
                    _ => inferred,
                },
                kind => spec.width().ok_or_else(|| {
                    NetworkError::graph(name, format!("{kind} layers need a declared width"))
                })?,
            };

            if width == 0 {
                return Err(NetworkError::graph(name, "width must be greater than 0"));
            }
            if spec.kind().activation() == Some(crate::utils::Activation::Softmax) && width < 2 {
                return Err(NetworkError::graph(
                    name,
                    format!("Softmax needs a width of at least 2, got {width}"),
                ));
            }

            debug!("layer `{name}`: {inferred} -> {width}");
            in_widths[i] = inferred;
            out_widths[i] = width;
        }

        Ok((in_widths, out_widths))
    }
}

/// Kahn's algorithm; ties are broken by declaration order so the resulting
/// order is deterministic.
fn topological_order(inputs: &[Vec<NodeId>], names: &[String]) -> Result<Vec<NodeId>> {
    let n = inputs.len();
    let mut outputs = vec![Vec::new(); n];
    let mut pending: Vec<usize> = inputs.iter().map(Vec::len).collect();
    for (to, froms) in inputs.iter().enumerate() {
        for from in froms {
            outputs[from.0].push(to);
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_front() {
        order.push(NodeId(i));
        for &next in &outputs[i] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < n {
        let stuck = (0..n).find(|&i| pending[i] > 0).unwrap_or(0);
        return Err(NetworkError::graph(
            &names[stuck],
            "the graph contains a cycle through this layer",
        ));
    }
    Ok(order)
}

fn single_sink(edges: &[(NodeId, NodeId)], names: &[String]) -> Result<NodeId> {
    let mut has_output = vec![false; names.len()];
    for &(from, _) in edges {
        has_output[from.0] = true;
    }

    let sinks: Vec<usize> = (0..names.len()).filter(|&i| !has_output[i]).collect();
    match sinks.as_slice() {
        [sink] => Ok(NodeId(*sink)),
        [] => Err(NetworkError::graph(&names[0], "the graph has no output layer")),
        [_, extra, ..] => Err(NetworkError::graph(
            &names[*extra],
            format!(
                "the graph must have a single output layer, found {}",
                sinks
                    .iter()
                    .map(|&i| names[i].as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
    }
}

/// An immutable, validated layer graph plus its parameters.
///
/// The structure never changes after [`GraphBuilder::build`]; only the
/// parameter values are mutated, in place, by the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    order: Vec<NodeId>,
    parameters: Vec<Parameter>,
    input: NodeId,
    output: NodeId,
}

impl Graph {
    /// Build a chain of layers.
    pub fn sequential<I>(specs: I, rng: &mut RandomSource) -> Result<Self>
    where
        I: IntoIterator<Item = LayerSpec>,
    {
        GraphBuilder::sequential(specs).build(rng)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Node ids such that every node comes after all of its inputs.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn output_node(&self) -> NodeId {
        self.output
    }

    pub fn input_width(&self) -> usize {
        self.nodes[self.input.0].layer.output_width()
    }

    pub fn output_width(&self) -> usize {
        self.nodes[self.output.0].layer.output_width()
    }

    /// All parameters, in declaration order (weight then bias per layer).
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    pub fn parameter(&self, id: ParamId) -> &Parameter {
        &self.parameters[id.index()]
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.parameters.iter().map(Parameter::len).sum()
    }

    /// One line per node, as logged when the graph is built.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// Find a node by layer name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            let sources = if node.inputs.is_empty() {
                String::from("-")
            } else {
                node.inputs
                    .iter()
                    .map(|id| self.nodes[id.0].name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            writeln!(
                f,
                "{:>3} | {:<16} | {:<16} | {:>5} -> {:<5} | {:>9} params | from: {}",
                i,
                node.name,
                node.kind.to_string(),
                node.layer.input_width(),
                node.layer.output_width(),
                node.layer.parameter_count(),
                sources,
            )?;
        }
        write!(f, "total trainable parameters: {}", self.parameter_count())
    }
}
