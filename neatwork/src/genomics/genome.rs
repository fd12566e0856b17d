use crate::genomics::{Innovations, MutationError};
use crate::math;
use crate::networks::{Network, NetworkError};
use crate::serial::{self, Scalar};
use crate::{EdgeKey, NodeId};

use ahash::RandomState;
use rand::Rng;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::io::{self, Read, Write};

/// Weighted edges keyed by `(from, to)` node pairs.
pub type EdgeMap = HashMap<EdgeKey, f32, RandomState>;

/// Summary of the structural overlap between two genomes, consumed by the
/// engine's compatibility-distance formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatibilityInfo {
    /// Edge keys present in exactly one of the two genomes.
    pub non_matching: usize,
    /// Union size: `non_matching + matching`.
    pub genome_size: usize,
    /// Mean `|w₁ − w₂|` over matching keys, 0 if none match.
    pub avg_weight_diff: f32,
}

/// The structural description of a network: input/output counts plus four
/// edge maps partitioned along enabled/disabled and forward/recurrent.
///
/// Node ids are implicit. The first `num_inputs` ids are sensors (the last
/// of them the bias), the next `num_outputs` ids are outputs, and anything
/// beyond is a hidden node handed out by the engine's [`Innovations`]
/// registry. An edge key never appears in more than one of the four maps,
/// nothing targets a sensor, and the forward maps stay acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    num_inputs: i32,
    num_outputs: i32,
    forward: EdgeMap,
    recurrent: EdgeMap,
    disabled_forward: EdgeMap,
    disabled_recurrent: EdgeMap,
}

impl Genome {
    /// Returns an empty genome. `input_nodes` includes the bias sensor.
    pub fn new(input_nodes: i32, output_nodes: i32) -> Genome {
        Genome {
            num_inputs: input_nodes,
            num_outputs: output_nodes,
            forward: EdgeMap::default(),
            recurrent: EdgeMap::default(),
            disabled_forward: EdgeMap::default(),
            disabled_recurrent: EdgeMap::default(),
        }
    }

    /// Number of sensor nodes, bias included.
    pub fn num_inputs(&self) -> i32 {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> i32 {
        self.num_outputs
    }

    pub fn forward_edges(&self) -> &EdgeMap {
        &self.forward
    }

    pub fn recurrent_edges(&self) -> &EdgeMap {
        &self.recurrent
    }

    pub fn disabled_forward_edges(&self) -> &EdgeMap {
        &self.disabled_forward
    }

    pub fn disabled_recurrent_edges(&self) -> &EdgeMap {
        &self.disabled_recurrent
    }

    fn is_output(&self, node: NodeId) -> bool {
        node >= self.num_inputs && node < self.num_inputs + self.num_outputs
    }

    /// Compiles the enabled edges into a runnable phenotype. The genome
    /// itself is left untouched.
    pub fn generate_network(&self) -> Result<Network, NetworkError> {
        Network::compile(self.num_inputs, self.num_outputs, &self.forward, &self.recurrent)
    }

    /// Connects a uniformly random sensor to a uniformly random output with
    /// a `gaussian(std_dev)` weight. Meant for seeding empty genomes.
    pub fn add_input_output_edge(&mut self, rng: &mut impl Rng, std_dev: f32) {
        let from = math::rand_int_in(rng, 0, self.num_inputs - 1);
        let to = math::rand_int_in(rng, self.num_inputs, self.num_inputs + self.num_outputs - 1);
        self.forward.insert((from, to), math::gaussian(rng, std_dev));
    }

    /// For every enabled edge independently: with probability `replace_prob`
    /// assign a fresh `gaussian(replace_dev)` weight, otherwise nudge the
    /// weight by `gaussian(perturb_dev)`.
    pub fn mutate_weights(
        &mut self,
        rng: &mut impl Rng,
        perturb_dev: f32,
        replace_dev: f32,
        replace_prob: f32,
    ) {
        for weight in self.forward.values_mut().chain(self.recurrent.values_mut()) {
            if math::rand_unit(rng) < replace_prob {
                *weight = math::gaussian(rng, replace_dev);
            } else {
                *weight += math::gaussian(rng, perturb_dev);
            }
        }
    }

    /// Splits a uniformly random enabled edge whose source is not an output.
    ///
    /// The split edge `(u, v)` moves to its disabled map with its weight `w`
    /// preserved; `(u, h)` joins the forward map with weight 1 and `(h, v)`
    /// joins the map matching the split edge's kind with weight `w`, where
    /// `h` is the registry-assigned hidden node. Carrying `w` over and
    /// feeding it through a unit-weight edge keeps the network's behaviour
    /// near-unchanged at birth.
    pub fn add_node_mutation(
        &mut self,
        rng: &mut impl Rng,
        innovations: &mut Innovations,
    ) -> Result<(), MutationError> {
        let mut candidates: Vec<(EdgeKey, f32, bool)> = Vec::new();
        let mut forward_keys: Vec<EdgeKey> = self
            .forward
            .keys()
            .copied()
            .filter(|&(from, _)| !self.is_output(from))
            .collect();
        forward_keys.sort_unstable();
        candidates.extend(forward_keys.iter().map(|key| (*key, self.forward[key], false)));

        let mut recurrent_keys: Vec<EdgeKey> = self
            .recurrent
            .keys()
            .copied()
            .filter(|&(from, _)| !self.is_output(from))
            .collect();
        recurrent_keys.sort_unstable();
        candidates.extend(recurrent_keys.iter().map(|key| (*key, self.recurrent[key], true)));

        if candidates.is_empty() {
            return Err(MutationError::NoEdgeToSplit);
        }

        let ((from, to), weight, is_recurrent) =
            candidates[math::rand_int(rng, candidates.len() - 1)];
        let hidden = innovations.node_for_split((from, to), is_recurrent);

        if is_recurrent {
            self.recurrent.remove(&(from, to));
            self.disabled_recurrent.insert((from, to), weight);
        } else {
            self.forward.remove(&(from, to));
            self.disabled_forward.insert((from, to), weight);
        }

        self.forward.insert((from, hidden), 1.0);
        if is_recurrent {
            self.recurrent.insert((hidden, to), weight);
        } else {
            self.forward.insert((hidden, to), weight);
        }

        Ok(())
    }

    /// Tries up to `max_tries` times to connect a random node pair that no
    /// enabled edge occupies, classifying the new edge as recurrent via the
    /// compiled phenotype. Candidates already held as disabled forward edges
    /// are rejected; a disabled recurrent edge may be revived with a fresh
    /// `gaussian(std_dev)` weight.
    pub fn add_edge_mutation(
        &mut self,
        rng: &mut impl Rng,
        network: &Network,
        std_dev: f32,
        max_tries: usize,
    ) -> Result<(), MutationError> {
        for _ in 0..max_tries {
            let (from, to, is_recurrent) = match network.propose_connection(rng) {
                Some(candidate) => candidate,
                None => continue,
            };
            if !is_recurrent && self.disabled_forward.contains_key(&(from, to)) {
                continue;
            }

            let weight = math::gaussian(rng, std_dev);
            if is_recurrent {
                self.recurrent.insert((from, to), weight);
                self.disabled_recurrent.remove(&(from, to));
            } else {
                self.forward.insert((from, to), weight);
                self.disabled_forward.remove(&(from, to));
            }
            return Ok(());
        }
        Err(MutationError::NoNewEdge)
    }

    /// For every enabled edge shared with `other`, overwrites this genome's
    /// weight with `other`'s at a coin flip. Topology comes entirely from
    /// `self`, which must be the fitter (or equally fit) parent.
    pub fn crossover(&mut self, rng: &mut impl Rng, other: &Genome) {
        for (key, weight) in self.forward.iter_mut() {
            if let Some(theirs) = other.forward.get(key) {
                if rng.gen::<bool>() {
                    *weight = *theirs;
                }
            }
        }
        for (key, weight) in self.recurrent.iter_mut() {
            if let Some(theirs) = other.recurrent.get(key) {
                if rng.gen::<bool>() {
                    *weight = *theirs;
                }
            }
        }
    }

    /// Compares the entire edge sets of both genomes, enabled and disabled
    /// alike. Forward keys are matched against the peer's forward maps and
    /// recurrent keys against its recurrent maps, so the measure stays
    /// symmetric.
    pub fn compatibility_info(&self, other: &Genome) -> CompatibilityInfo {
        let mut matching = 0usize;
        let mut weight_diff = 0.0f32;

        tally_matches(&self.forward, &other.forward, &other.disabled_forward, &mut matching, &mut weight_diff);
        tally_matches(&self.disabled_forward, &other.forward, &other.disabled_forward, &mut matching, &mut weight_diff);
        tally_matches(&self.recurrent, &other.recurrent, &other.disabled_recurrent, &mut matching, &mut weight_diff);
        tally_matches(&self.disabled_recurrent, &other.recurrent, &other.disabled_recurrent, &mut matching, &mut weight_diff);

        let total = self.forward.len()
            + self.recurrent.len()
            + self.disabled_forward.len()
            + self.disabled_recurrent.len()
            + other.forward.len()
            + other.recurrent.len()
            + other.disabled_forward.len()
            + other.disabled_recurrent.len();
        let non_matching = total - 2 * matching;

        CompatibilityInfo {
            non_matching,
            genome_size: non_matching + matching,
            avg_weight_diff: if matching == 0 {
                0.0
            } else {
                weight_diff / matching as f32
            },
        }
    }

    pub fn save(&self, writer: &mut impl Write) -> io::Result<()> {
        self.num_inputs.put(writer)?;
        self.num_outputs.put(writer)?;
        serial::put_edge_map(&self.forward, writer)?;
        serial::put_edge_map(&self.recurrent, writer)?;
        serial::put_edge_map(&self.disabled_forward, writer)?;
        serial::put_edge_map(&self.disabled_recurrent, writer)?;
        Ok(())
    }

    pub fn load(reader: &mut impl Read) -> io::Result<Genome> {
        let num_inputs = i32::take(reader)?;
        let num_outputs = i32::take(reader)?;
        Ok(Genome {
            num_inputs,
            num_outputs,
            forward: serial::take_edge_map(reader)?,
            recurrent: serial::take_edge_map(reader)?,
            disabled_forward: serial::take_edge_map(reader)?,
            disabled_recurrent: serial::take_edge_map(reader)?,
        })
    }
}

fn tally_matches(
    ours: &EdgeMap,
    enabled: &EdgeMap,
    disabled: &EdgeMap,
    matching: &mut usize,
    weight_diff: &mut f32,
) {
    for (key, weight) in ours {
        if let Some(theirs) = enabled.get(key).or_else(|| disabled.get(key)) {
            *matching += 1;
            *weight_diff += (weight - theirs).abs();
        }
    }
}
