use crate::genomics::EdgeMap;
use crate::math;
use crate::networks::NetworkError;
use crate::serial::{self, Scalar};
use crate::NodeId;

use ahash::RandomState;
use rand::Rng;
use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

type NodeSet = HashSet<NodeId, RandomState>;
type Adjacency = HashMap<NodeId, NodeSet, RandomState>;

/// Where a neuron sits in the drawn network. `label` is the genome node id;
/// outputs carry their output order in `layer_index` instead of their
/// position within the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVisual {
    pub label: NodeId,
    pub layer_num: i32,
    pub layer_index: i32,
    pub is_output: bool,
}

/// One incoming connection of a neuron: the internal index it reads from
/// and the weight applied to that value.
#[derive(Debug, Clone, Copy)]
struct InputRecord {
    source: usize,
    weight: f32,
}

/// Per-neuron evaluation state: the latest activation and how many
/// consecutive [`InputRecord`]s feed this neuron.
#[derive(Debug, Clone, Copy)]
struct RunRecord {
    value: f32,
    block: usize,
}

/// A genome compiled into a flat, index-addressed evaluator.
///
/// Neurons are laid out in `(depth, id)` order, so every forward
/// predecessor of a neuron has a smaller index and is already up to date
/// when the neuron activates; recurrent predecessors contribute whatever
/// they produced on the previous [`run`](Network::run). Cloning a network
/// shares the weight storage but duplicates the evaluation state, so clones
/// can run independently.
#[derive(Debug, Clone)]
pub struct Network {
    num_inputs: i32,
    num_outputs: i32,
    input_info: Arc<Vec<InputRecord>>,
    output_indices: Arc<Vec<usize>>,
    run_info: Vec<RunRecord>,
    visual_info: Vec<NodeVisual>,
    layer_sizes: Vec<usize>,
    // Node-id adjacency consulted by connection proposals. Only present on
    // freshly compiled phenotypes; loading from disk leaves them empty.
    adjacency: Adjacency,
    recurrent_rev: Adjacency,
}

impl Network {
    /// Flattens the enabled edge maps into an executable network.
    /// `num_inputs` counts the bias sensor.
    pub(crate) fn compile(
        num_inputs: i32,
        num_outputs: i32,
        forward: &EdgeMap,
        recurrent: &EdgeMap,
    ) -> Result<Network, NetworkError> {
        let io_total = num_inputs + num_outputs;
        let is_sensor = |node: NodeId| (0..num_inputs).contains(&node);
        let is_output = |node: NodeId| (num_inputs..io_total).contains(&node);

        // Forward adjacency both ways, seeded with every fixed node.
        let mut adjacency = Adjacency::default();
        let mut preds = Adjacency::default();
        for node in 0..io_total {
            adjacency.entry(node).or_default();
            preds.entry(node).or_default();
        }
        for &(from, to) in forward.keys() {
            if is_output(from) && !is_output(to) {
                return Err(NetworkError::OutputAsForwardSource { from, to });
            }
            adjacency.entry(from).or_default().insert(to);
            adjacency.entry(to).or_default();
            preds.entry(to).or_default().insert(from);
            preds.entry(from).or_default();
        }
        let total_nodes = adjacency.len();

        // Two-pass topological sort: drain sensors and hidden nodes first,
        // then let the outputs settle, so that no output surfaces mid-graph.
        let mut remaining: HashMap<NodeId, usize, RandomState> =
            preds.iter().map(|(&node, p)| (node, p.len())).collect();

        let mut sorted: Vec<NodeId> = (0..num_inputs).collect();
        let mut hidden_sources: Vec<NodeId> = adjacency
            .keys()
            .copied()
            .filter(|&node| !is_sensor(node) && !is_output(node) && remaining[&node] == 0)
            .collect();
        hidden_sources.sort_unstable();
        sorted.extend(hidden_sources);

        let mut cursor = 0;
        while cursor < sorted.len() {
            let node = sorted[cursor];
            cursor += 1;
            let mut successors: Vec<NodeId> = adjacency[&node].iter().copied().collect();
            successors.sort_unstable();
            for succ in successors {
                if let Some(count) = remaining.get_mut(&succ) {
                    *count -= 1;
                    if *count == 0 && !is_output(succ) {
                        sorted.push(succ);
                    }
                }
            }
        }

        for node in num_inputs..io_total {
            if remaining[&node] == 0 {
                sorted.push(node);
            }
        }
        while cursor < sorted.len() {
            let node = sorted[cursor];
            cursor += 1;
            let mut successors: Vec<NodeId> = adjacency[&node].iter().copied().collect();
            successors.sort_unstable();
            for succ in successors {
                if let Some(count) = remaining.get_mut(&succ) {
                    *count -= 1;
                    if *count == 0 {
                        sorted.push(succ);
                    }
                }
            }
        }

        if sorted.len() != total_nodes {
            return Err(NetworkError::ForwardCycle);
        }

        // Depths: sensors at 0, the output layer one past the deepest
        // non-output, and every node at least one past its predecessors.
        let mut depth: HashMap<NodeId, i32, RandomState> = HashMap::default();
        let mut output_floor = 0;
        for &node in &sorted {
            if is_sensor(node) {
                depth.insert(node, 0);
                continue;
            }
            let mut node_depth = if is_output(node) { output_floor + 1 } else { 1 };
            for pred in &preds[&node] {
                node_depth = node_depth.max(depth[pred] + 1);
            }
            depth.insert(node, node_depth);
            if !is_output(node) && node_depth > output_floor {
                output_floor = node_depth;
            }
        }

        let mut order: Vec<(i32, NodeId)> = sorted.iter().map(|&node| (depth[&node], node)).collect();
        order.sort_unstable();

        let mut visual_info = Vec::with_capacity(order.len());
        let mut layer_sizes = Vec::new();
        let mut last_depth = 0;
        let mut layer_index = 0usize;
        for &(node_depth, node) in &order {
            if node_depth != last_depth {
                layer_sizes.push(layer_index);
                last_depth = node_depth;
                layer_index = 0;
            }
            let output = is_output(node);
            visual_info.push(NodeVisual {
                label: node,
                layer_num: node_depth,
                layer_index: if output {
                    node - num_inputs
                } else {
                    layer_index as i32
                },
                is_output: output,
            });
            layer_index += 1;
        }
        layer_sizes.push(layer_index);

        let index_of: HashMap<NodeId, usize, RandomState> = order
            .iter()
            .enumerate()
            .map(|(index, &(_, node))| (node, index))
            .collect();

        let mut recurrent_rev = Adjacency::default();
        for &(from, to) in recurrent.keys() {
            recurrent_rev.entry(to).or_default().insert(from);
            recurrent_rev.entry(from).or_default();
        }

        // Flatten: one input block per neuron, forward predecessors first,
        // then recurrent ones, each group in ascending id order.
        let mut input_info = Vec::new();
        let mut run_info = Vec::with_capacity(order.len());
        let mut output_indices = vec![0usize; num_outputs as usize];
        for (index, &(_, node)) in order.iter().enumerate() {
            if is_output(node) {
                output_indices[(node - num_inputs) as usize] = index;
            }

            let mut forward_preds: Vec<NodeId> = preds[&node].iter().copied().collect();
            forward_preds.sort_unstable();
            let mut recurrent_preds: Vec<NodeId> = recurrent_rev
                .get(&node)
                .map(|sources| sources.iter().copied().collect())
                .unwrap_or_default();
            recurrent_preds.sort_unstable();

            let block = forward_preds.len() + recurrent_preds.len();
            for pred in forward_preds {
                input_info.push(InputRecord {
                    source: index_of[&pred],
                    weight: forward.get(&(pred, node)).copied().unwrap_or(0.0),
                });
            }
            for pred in recurrent_preds {
                let source = *index_of
                    .get(&pred)
                    .ok_or(NetworkError::UnknownNode(pred))?;
                input_info.push(InputRecord {
                    source,
                    weight: recurrent.get(&(pred, node)).copied().unwrap_or(0.0),
                });
            }
            run_info.push(RunRecord { value: 0.0, block });
        }
        run_info[(num_inputs - 1) as usize].value = 1.0; // bias

        Ok(Network {
            num_inputs,
            num_outputs,
            input_info: Arc::new(input_info),
            output_indices: Arc::new(output_indices),
            run_info,
            visual_info,
            layer_sizes,
            adjacency,
            recurrent_rev,
        })
    }

    /// Number of sensor values [`run`](Network::run) expects (the bias is
    /// fed internally).
    pub fn num_inputs(&self) -> usize {
        (self.num_inputs - 1) as usize
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs as usize
    }

    pub fn num_nodes(&self) -> usize {
        self.run_info.len()
    }

    pub fn num_edges(&self) -> usize {
        self.input_info.len()
    }

    pub fn visual_info(&self) -> &[NodeVisual] {
        &self.visual_info
    }

    /// Neuron counts per consecutive depth layer, input layer first.
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// One forward pass. `input` must hold `num_inputs()` sensor values and
    /// `output` room for `num_outputs()` results; every non-sensor neuron
    /// applies `tanh` to its weighted input sum, and recurrent connections
    /// read the values of the previous invocation.
    pub fn run(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), NetworkError> {
        if self.num_inputs < 2 || self.num_outputs < 1 {
            return Err(NetworkError::Uninitialized);
        }
        let sensors = (self.num_inputs - 1) as usize;
        if input.len() != sensors {
            return Err(NetworkError::InputSize { expected: sensors, got: input.len() });
        }
        if output.len() != self.num_outputs as usize {
            return Err(NetworkError::OutputSize {
                expected: self.num_outputs as usize,
                got: output.len(),
            });
        }

        for (cell, &value) in self.run_info.iter_mut().zip(input) {
            cell.value = value;
        }
        self.run_info[sensors].value = 1.0; // bias is always on

        let mut start = 0usize;
        for index in (self.num_inputs as usize)..self.run_info.len() {
            let block = self.run_info[index].block;
            let mut sum = 0.0f32;
            for record in &self.input_info[start..start + block] {
                sum += self.run_info[record.source].value * record.weight;
            }
            start += block;
            self.run_info[index].value = sum.tanh();
        }

        for (slot, &index) in output.iter_mut().zip(self.output_indices.iter()) {
            *slot = self.run_info[index].value;
        }
        Ok(())
    }

    /// Zeroes every neuron's carried value. Call between independent
    /// episodes so recurrent connections start from a clean slate.
    pub fn reset_recurrent_connections(&mut self) {
        for cell in &mut self.run_info {
            cell.value = 0.0;
        }
    }

    /// True when connecting `from -> to` would have to be recurrent: a self
    /// loop, an output feeding a non-output, or a forward path already
    /// leading from `to` back to `from`.
    pub(crate) fn check_recurrent(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let io_total = self.num_inputs + self.num_outputs;
        let is_output = |node: NodeId| (self.num_inputs..io_total).contains(&node);
        if is_output(from) && !is_output(to) {
            return true;
        }

        let mut discovered = NodeSet::default();
        let mut frontier = VecDeque::new();
        discovered.insert(to);
        frontier.push_back(to);
        while let Some(node) = frontier.pop_front() {
            if node == from {
                return true;
            }
            let successors = match self.adjacency.get(&node) {
                Some(successors) => successors,
                None => return true, // unknown node, refuse a forward label
            };
            for &succ in successors {
                if discovered.insert(succ) {
                    frontier.push_back(succ);
                }
            }
        }
        false
    }

    /// Draws one random `(from, to)` pair — any node into any non-sensor —
    /// and returns it with its recurrence label, or `None` if an enabled
    /// edge already occupies the pair.
    pub(crate) fn propose_connection(&self, rng: &mut impl Rng) -> Option<(NodeId, NodeId, bool)> {
        let from = self.visual_info[math::rand_int(rng, self.run_info.len() - 1)].label;
        let to_index =
            math::rand_int_in(rng, self.num_inputs, self.run_info.len() as i32 - 1) as usize;
        let to = self.visual_info[to_index].label;

        match self.adjacency.get(&from) {
            Some(successors) if !successors.contains(&to) => {}
            _ => return None,
        }
        if let Some(sources) = self.recurrent_rev.get(&to) {
            if sources.contains(&from) {
                return None;
            }
        }
        Some((from, to, self.check_recurrent(from, to)))
    }

    /// Single-pass iterator over every compiled connection as
    /// `(source, destination, weight)`, with both ends as visual records.
    pub fn edges(&self) -> Edges<'_> {
        Edges { network: self, node: 0, within: 0, start: 0 }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        if self.num_inputs < 2 || self.num_outputs < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                NetworkError::Uninitialized.to_string(),
            ));
        }
        let mut writer = BufWriter::new(File::create(path)?);

        self.num_inputs.put(&mut writer)?;
        self.num_outputs.put(&mut writer)?;
        (self.input_info.len() as i32).put(&mut writer)?;
        (self.output_indices.len() as i32).put(&mut writer)?;
        (self.run_info.len() as i32).put(&mut writer)?;

        for record in self.input_info.iter() {
            (record.source as i32).put(&mut writer)?;
            record.weight.put(&mut writer)?;
        }
        for &index in self.output_indices.iter() {
            (index as i32).put(&mut writer)?;
        }
        for record in &self.run_info {
            record.value.put(&mut writer)?;
            (record.block as i32).put(&mut writer)?;
        }

        (self.visual_info.len() as i32).put(&mut writer)?;
        (self.layer_sizes.len() as i32).put(&mut writer)?;
        for visual in &self.visual_info {
            visual.label.put(&mut writer)?;
            visual.layer_num.put(&mut writer)?;
            visual.layer_index.put(&mut writer)?;
            (visual.is_output as i32).put(&mut writer)?;
        }
        for &size in &self.layer_sizes {
            (size as i32).put(&mut writer)?;
        }

        writer.flush()
    }

    /// Restores a network saved with [`save`](Network::save). Carried
    /// recurrent state is zeroed; the loaded network can be run but cannot
    /// serve new connection proposals.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Network> {
        let mut reader = BufReader::new(File::open(path)?);
        let corrupt = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());

        let num_inputs = i32::take(&mut reader)?;
        let num_outputs = i32::take(&mut reader)?;
        if num_inputs < 2 || num_outputs < 1 {
            return Err(corrupt("node counts out of range"));
        }
        let input_len = serial::take_count(&mut reader)?;
        let output_len = serial::take_count(&mut reader)?;
        let run_len = serial::take_count(&mut reader)?;
        if output_len != num_outputs as usize || run_len < (num_inputs + num_outputs) as usize {
            return Err(corrupt("record counts disagree with node counts"));
        }

        let mut input_info = Vec::with_capacity(input_len);
        for _ in 0..input_len {
            let source = i32::take(&mut reader)?;
            let weight = f32::take(&mut reader)?;
            if source < 0 || source as usize >= run_len {
                return Err(corrupt("input record points outside the network"));
            }
            input_info.push(InputRecord { source: source as usize, weight });
        }

        let mut output_indices = Vec::with_capacity(output_len);
        for _ in 0..output_len {
            let index = i32::take(&mut reader)?;
            if index < 0 || index as usize >= run_len {
                return Err(corrupt("output index points outside the network"));
            }
            output_indices.push(index as usize);
        }

        let mut run_info = Vec::with_capacity(run_len);
        let mut total_blocks = 0usize;
        for _ in 0..run_len {
            let _value = f32::take(&mut reader)?;
            let block = i32::take(&mut reader)?;
            if block < 0 {
                return Err(corrupt("negative input block size"));
            }
            total_blocks += block as usize;
            run_info.push(RunRecord { value: 0.0, block: block as usize });
        }
        if total_blocks != input_len {
            return Err(corrupt("input blocks disagree with input record count"));
        }

        let visual_len = serial::take_count(&mut reader)?;
        let layer_count = serial::take_count(&mut reader)?;
        if visual_len != run_len {
            return Err(corrupt("visual records disagree with node count"));
        }
        let mut visual_info = Vec::with_capacity(visual_len);
        for _ in 0..visual_len {
            visual_info.push(NodeVisual {
                label: i32::take(&mut reader)?,
                layer_num: i32::take(&mut reader)?,
                layer_index: i32::take(&mut reader)?,
                is_output: i32::take(&mut reader)? != 0,
            });
        }
        let mut layer_sizes = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            let size = i32::take(&mut reader)?;
            if size < 0 {
                return Err(corrupt("negative layer size"));
            }
            layer_sizes.push(size as usize);
        }

        Ok(Network {
            num_inputs,
            num_outputs,
            input_info: Arc::new(input_info),
            output_indices: Arc::new(output_indices),
            run_info,
            visual_info,
            layer_sizes,
            adjacency: Adjacency::default(),
            recurrent_rev: Adjacency::default(),
        })
    }
}

/// See [`Network::edges`].
pub struct Edges<'a> {
    network: &'a Network,
    node: usize,
    within: usize,
    start: usize,
}

impl<'a> Iterator for Edges<'a> {
    type Item = (&'a NodeVisual, &'a NodeVisual, f32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.node < self.network.run_info.len() {
            let block = self.network.run_info[self.node].block;
            if self.within < block {
                let record = &self.network.input_info[self.start + self.within];
                self.within += 1;
                return Some((
                    &self.network.visual_info[record.source],
                    &self.network.visual_info[self.node],
                    record.weight,
                ));
            }
            self.start += block;
            self.node += 1;
            self.within = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn edge_map(edges: &[(NodeId, NodeId, f32)]) -> EdgeMap {
        edges.iter().map(|&(from, to, weight)| ((from, to), weight)).collect()
    }

    fn index_of(network: &Network, label: NodeId) -> usize {
        network
            .visual_info
            .iter()
            .position(|visual| visual.label == label)
            .unwrap()
    }

    #[test]
    fn empty_genome_compiles_and_runs_to_zero() {
        let mut network =
            Network::compile(2, 1, &EdgeMap::default(), &EdgeMap::default()).unwrap();
        let mut out = [9.0f32];
        network.run(&[0.5], &mut out).unwrap();
        assert_eq!(out, [0.0]);
        assert_eq!(network.num_nodes(), 3);
        assert_eq!(network.num_edges(), 0);
    }

    #[test]
    fn bias_edge_dominates_regardless_of_input() {
        // Node 1 is the bias; a single bias -> output edge of weight w
        // pins the output at tanh(w).
        let weight = -1.3f32;
        let forward = edge_map(&[(1, 2, weight)]);
        let mut network = Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap();
        let mut out = [0.0f32];
        for input in [-1.0, 0.0, 0.25, 7.5] {
            network.run(&[input], &mut out).unwrap();
            assert_abs_diff_eq!(out[0], weight.tanh(), epsilon = 1e-6);
        }
    }

    #[test]
    fn run_info_order_is_topological() {
        let forward = edge_map(&[
            (0, 3, 1.0),
            (1, 3, 0.5),
            (3, 4, 1.0),
            (0, 4, -1.0),
            (4, 2, 2.0),
            (3, 2, 0.25),
        ]);
        let network = Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap();

        for &(from, to) in forward.keys() {
            assert!(
                index_of(&network, from) < index_of(&network, to),
                "edge {from} -> {to} is not topologically ordered"
            );
        }
    }

    #[test]
    fn outputs_sink_to_the_deepest_layer() {
        // Output 2 is fed directly by a sensor, but the hidden node 4
        // (feeding output 3) pushes the whole output layer to depth 2.
        let forward = edge_map(&[(0, 2, 1.0), (0, 4, 1.0), (4, 3, 1.0)]);
        let network = Network::compile(2, 2, &forward, &EdgeMap::default()).unwrap();

        let depth = |label| network.visual_info[index_of(&network, label)].layer_num;
        assert_eq!(depth(0), 0);
        assert_eq!(depth(1), 0);
        assert_eq!(depth(4), 1);
        assert_eq!(depth(2), 2);
        assert_eq!(depth(3), 2);
        assert_eq!(network.layer_sizes(), &[2, 1, 2]);

        let outputs: Vec<NodeId> = network
            .visual_info
            .iter()
            .filter(|visual| visual.is_output)
            .map(|visual| visual.label)
            .collect();
        assert_eq!(outputs, vec![2, 3]);
    }

    #[test]
    fn compile_rejects_output_sourced_forward_edges() {
        let forward = edge_map(&[(2, 3, 1.0), (0, 3, 1.0)]);
        assert_eq!(
            Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap_err(),
            NetworkError::OutputAsForwardSource { from: 2, to: 3 }
        );
    }

    #[test]
    fn compile_fails_closed_on_forward_cycles() {
        let forward = edge_map(&[(0, 3, 1.0), (3, 4, 1.0), (4, 3, 0.5), (4, 2, 1.0)]);
        assert_eq!(
            Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap_err(),
            NetworkError::ForwardCycle
        );
    }

    #[test]
    fn recurrence_classification_on_a_three_node_path() {
        // 0 -> 3 -> 2: input, hidden, output.
        let forward = edge_map(&[(0, 3, 1.0), (3, 2, 1.0)]);
        let network = Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap();

        // Output back into the hidden layer must be recurrent.
        assert!(network.check_recurrent(2, 3));
        // A fresh sensor-to-output edge is a plain forward edge.
        assert!(!network.check_recurrent(0, 2));
        // (0, 3) already exists; proposals must refuse it.
        assert!(network.adjacency[&0].contains(&3));
        // Self loops and path-closing edges are recurrent.
        assert!(network.check_recurrent(3, 3));
        let chain = edge_map(&[(0, 3, 1.0), (3, 4, 1.0), (4, 2, 1.0)]);
        let chain_net = Network::compile(2, 1, &chain, &EdgeMap::default()).unwrap();
        assert!(chain_net.check_recurrent(4, 3));
    }

    #[test]
    fn splitting_an_edge_roughly_preserves_behaviour() {
        let weight = 0.9f32;
        let before = edge_map(&[(0, 2, weight)]);
        let after = edge_map(&[(0, 3, 1.0), (3, 2, weight)]);
        let mut original = Network::compile(2, 1, &before, &EdgeMap::default()).unwrap();
        let mut split = Network::compile(2, 1, &after, &EdgeMap::default()).unwrap();

        let mut out_original = [0.0f32];
        let mut out_split = [0.0f32];
        for step in -10..=10 {
            let input = step as f32 / 40.0;
            original.run(&[input], &mut out_original).unwrap();
            split.run(&[input], &mut out_split).unwrap();
            assert_abs_diff_eq!(out_original[0], out_split[0], epsilon = 0.05);
        }
    }

    #[test]
    fn recurrent_connections_carry_previous_values() {
        // A saturating sensor edge plus a unit self loop on the output.
        let forward = edge_map(&[(0, 2, 10.0)]);
        let recurrent = edge_map(&[(2, 2, 1.0)]);
        let mut network = Network::compile(2, 1, &forward, &recurrent).unwrap();

        let mut out = [0.0f32];
        network.run(&[1.0], &mut out).unwrap();
        let first = out[0];
        assert_abs_diff_eq!(first, 10.0f32.tanh(), epsilon = 1e-4);

        network.run(&[0.0], &mut out).unwrap();
        assert_abs_diff_eq!(out[0], first.tanh(), epsilon = 1e-4);

        network.reset_recurrent_connections();
        network.run(&[0.0], &mut out).unwrap();
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn run_rejects_mismatched_slices() {
        let mut network =
            Network::compile(3, 2, &EdgeMap::default(), &EdgeMap::default()).unwrap();
        let mut out = [0.0f32; 2];
        assert_eq!(
            network.run(&[1.0], &mut out),
            Err(NetworkError::InputSize { expected: 2, got: 1 })
        );
        let mut short = [0.0f32];
        assert_eq!(
            network.run(&[1.0, 2.0], &mut short),
            Err(NetworkError::OutputSize { expected: 2, got: 1 })
        );
    }

    #[test]
    fn edge_iterator_visits_every_compiled_connection() {
        let forward = edge_map(&[(0, 3, 0.5), (1, 3, -0.5), (3, 2, 2.0)]);
        let recurrent = edge_map(&[(2, 3, 0.75)]);
        let network = Network::compile(2, 1, &forward, &recurrent).unwrap();

        let edges: Vec<(NodeId, NodeId, f32)> = network
            .edges()
            .map(|(source, dest, weight)| (source.label, dest.label, weight))
            .collect();
        assert_eq!(edges.len(), network.num_edges());
        assert!(edges.contains(&(0, 3, 0.5)));
        assert!(edges.contains(&(2, 3, 0.75)));
        assert!(edges.contains(&(3, 2, 2.0)));
    }

    #[test]
    fn saved_networks_reload_with_identical_outputs() {
        let mut rng = SmallRng::seed_from_u64(21);
        let forward = edge_map(&[
            (0, 3, 1.25),
            (1, 3, -2.0),
            (3, 2, 0.75),
            (0, 2, -0.25),
        ]);
        let mut network = Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap();

        let path = std::env::temp_dir().join("neatwork-phenotype-roundtrip.net");
        network.save(&path).unwrap();
        let mut restored = Network::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut expected = [0.0f32];
        let mut actual = [0.0f32];
        for _ in 0..32 {
            let input = [math::gaussian(&mut rng, 1.0)];
            network.run(&input, &mut expected).unwrap();
            restored.run(&input, &mut actual).unwrap();
            assert_eq!(expected[0].to_bits(), actual[0].to_bits());
        }
        assert_eq!(network.layer_sizes(), restored.layer_sizes());
        assert_eq!(network.visual_info(), restored.visual_info());
    }

    #[test]
    fn truncated_network_file_fails_to_load() {
        let forward = edge_map(&[(0, 2, 1.0)]);
        let network = Network::compile(2, 1, &forward, &EdgeMap::default()).unwrap();

        let path = std::env::temp_dir().join("neatwork-phenotype-truncated.net");
        network.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(Network::load(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
