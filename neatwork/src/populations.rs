//! The evolution engine: a population of organisms grouped into species,
//! evolved one synchronous generation at a time.
//!
//! Per generation the host calls [`Engine::generate_networks`], scores every
//! returned network through its [`FitnessHandle`] (in any order, from any
//! thread), and then calls [`Engine::update_generation`] to speciate, breed
//! and replace the population.
mod errors;
mod fitness;
mod species;

use std::io::Write;

pub use errors::{EngineError, FitnessError};
pub use fitness::FitnessHandle;
pub use species::{Organism, Species};

use fitness::FitnessLedger;

use crate::genomics::{Genome, Innovations};
use crate::math;
use crate::networks::{Network, NetworkError};
use crate::serial::{self, Scalar};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

/// σ of the seed sensor→output weight and of freshly added edge weights.
const STRUCTURAL_WEIGHT_DEV: f32 = 2.0;
const ADD_EDGE_MAX_TRIES: usize = 3;
const WEIGHT_PERTURB_DEV: f32 = 0.1;
const WEIGHT_REPLACE_DEV: f32 = 2.0;
const WEIGHT_REPLACE_PROB: f32 = 0.1;
/// Species allotted more offspring than this copy their champion unchanged.
const CHAMPION_THRESHOLD: usize = 5;

/// Construction parameters of an [`Engine`].
///
/// Probabilities are expected to lie in `[0.0, 1.0]` and
/// `top_p_cutoff` in `(0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of sensor inputs, excluding the always-on bias.
    pub input_size: usize,
    pub output_size: usize,
    pub pop_size: usize,
    /// Genomes closer than this are placed into the same species.
    pub compatibility_thresh: f32,
    /// Weight of the non-matching edge share in compatibility distance.
    pub c12: f32,
    /// Weight of the average weight difference in compatibility distance.
    pub c3: f32,
    /// Fraction of a species (by descending fitness) eligible to breed.
    pub top_p_cutoff: f32,
    pub p_add_node: f32,
    pub p_add_edge: f32,
    pub p_weight: f32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            input_size: 1,
            output_size: 1,
            pop_size: 150,
            compatibility_thresh: 1.5,
            c12: 1.0,
            c3: 0.4,
            top_p_cutoff: 0.6,
            p_add_node: 0.03,
            p_add_edge: 0.30,
            p_weight: 0.80,
        }
    }
}

/// The NEAT evolution engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    input_nodes: i32,
    output_nodes: i32,
    species: Vec<Species>,
    innovations: Innovations,
    ledger: Arc<FitnessLedger>,
    generation: i32,
    rng: SmallRng,
}

impl Engine {
    /// Builds the initial population: one species holding a single empty
    /// genome, and `pop_size − 1` genomes seeded with one random
    /// sensor→output edge each, speciated as they arrive.
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        if config.input_size == 0 {
            return Err(EngineError::InvalidConstruction("input size"));
        }
        if config.output_size == 0 {
            return Err(EngineError::InvalidConstruction("output size"));
        }
        if config.pop_size == 0 {
            return Err(EngineError::InvalidConstruction("population size"));
        }

        let input_nodes = config.input_size as i32 + 1; // bias included
        let output_nodes = config.output_size as i32;

        let mut rng = SmallRng::from_entropy();
        let mut innovations = Innovations::new(input_nodes + output_nodes);

        // The empty genome joins too; the seed mutations alone might not
        // cover every edge case (they could all land on the same edge).
        let mut species = Vec::new();
        let mut first = Species::new(innovations.next_species_id());
        first.push(Organism::new(Genome::new(input_nodes, output_nodes)));
        species.push(first);

        for _ in 1..config.pop_size {
            let mut genome = Genome::new(input_nodes, output_nodes);
            genome.add_input_output_edge(&mut rng, STRUCTURAL_WEIGHT_DEV);
            place_offspring(&config, &[], &mut innovations, &mut species, genome);
        }

        let organisms = species.iter().map(Species::len).sum();
        Ok(Engine {
            config,
            input_nodes,
            output_nodes,
            species,
            innovations,
            ledger: Arc::new(FitnessLedger::new(organisms)),
            generation: 0,
            rng,
        })
    }

    /// Compiles one network per live organism, paired with a write-back
    /// fitness handle and the id of the organism's species.
    pub fn generate_networks(
        &self,
    ) -> Result<Vec<(Network, FitnessHandle, i32)>, NetworkError> {
        let mut batch = Vec::new();
        let mut index = 0;
        for species in &self.species {
            for organism in species.organisms() {
                let network = organism.genome().generate_network()?;
                batch.push((network, FitnessHandle::new(&self.ledger, index), species.id()));
                index += 1;
            }
        }
        Ok(batch)
    }

    /// Breeds the next generation from the reported fitnesses and replaces
    /// the current one, invalidating all outstanding fitness handles.
    ///
    /// Fails with [`EngineError::FitnessNotSet`] — leaving the population
    /// and the handles untouched, so the host can finish reporting and
    /// retry — if any organism was never scored.
    pub fn update_generation(&mut self) -> Result<(), EngineError> {
        // Fold the host's reports back into the organisms.
        let mut index = 0;
        let mut all_set = true;
        for species in &mut self.species {
            for organism in &mut species.organisms {
                let reported = self.ledger.get(index);
                if reported >= 0.0 {
                    organism.fitness = reported;
                }
                all_set &= organism.fitness >= 0.0;
                index += 1;
            }
        }
        if !all_set {
            return Err(EngineError::FitnessNotSet);
        }

        // Explicit fitness sharing: a species' fitness is the organism
        // average, so large species don't swallow the allotment.
        let shared: Vec<f32> = self
            .species
            .iter()
            .map(|s| s.organisms().map(Organism::fitness).sum::<f32>() / s.len() as f32)
            .collect();
        let shared_sum: f32 = shared.iter().sum();
        if shared_sum == 0.0 {
            eprintln!(
                "update_generation warning: total shared fitness is 0, \
                 allocating offspring evenly; check the fitness function"
            );
        }

        for species in &mut self.species {
            species.organisms.sort_unstable_by(Organism::by_descending_fitness);
        }

        // Carried-over species keep their slot and id so offspring speciate
        // against the previous generation's representatives in index order.
        let mut next: Vec<Species> = self.species.iter().map(|s| Species::new(s.id())).collect();

        let Engine { config, species, innovations, rng, .. } = self;
        for (i, current) in species.iter().enumerate() {
            let mut allocation = if shared_sum == 0.0 {
                config.pop_size / species.len()
            } else {
                (config.pop_size as f32 * shared[i] / shared_sum + 0.5) as usize
            };
            if allocation == 0 {
                continue; // no offspring this round; may go extinct
            }

            if allocation > CHAMPION_THRESHOLD {
                let champion = current.organisms[0].genome().clone();
                place_offspring(config, species, innovations, &mut next, champion);
                allocation -= 1;
            }

            let pool = breeding_pool_len(current.len(), config.top_p_cutoff);
            for _ in 0..allocation {
                let first = math::rand_int(rng, pool - 1);
                let second = math::rand_int(rng, pool - 1);
                // Ranks ascend as fitness descends, so the smaller rank is
                // the fitter parent and supplies the child's topology.
                let (fitter, other) = if first <= second {
                    (first, second)
                } else {
                    (second, first)
                };

                let mut child = current.organisms[fitter].genome().clone();
                if fitter != other {
                    child.crossover(rng, current.organisms[other].genome());
                }
                mutate_child(config, innovations, rng, &mut child);
                place_offspring(config, species, innovations, &mut next, child);
            }
        }

        next.retain(|species| !species.is_empty());
        self.species = next;
        let organisms = self.species.iter().map(Species::len).sum();
        self.ledger = Arc::new(FitnessLedger::new(organisms));
        self.generation += 1;
        Ok(())
    }

    /// Compatibility distance between two genomes under this engine's
    /// coefficients.
    pub fn compatibility_distance(&self, first: &Genome, second: &Genome) -> f32 {
        compatibility_distance(&self.config, first, second)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generation_id(&self) -> i32 {
        self.generation
    }

    pub fn num_species(&self) -> usize {
        self.species.len()
    }

    pub fn species(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    /// Prints a `{id,size}` listing of the live species.
    pub fn print_specie_info(&self) {
        print!("{{SpecieID,SpecieSize}}:");
        for species in &self.species {
            print!(" {{{},{}}}", species.id(), species.len());
        }
        println!();
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        self.input_nodes.put(&mut writer)?;
        self.output_nodes.put(&mut writer)?;
        serial::put_edge_map(&self.innovations.forward_splits, &mut writer)?;
        serial::put_edge_map(&self.innovations.recurrent_splits, &mut writer)?;

        (self.species.len() as u32).put(&mut writer)?;
        for species in &self.species {
            species.save(&mut writer)?;
        }

        self.innovations.next_node.put(&mut writer)?;
        self.innovations.next_species.put(&mut writer)?;
        self.generation.put(&mut writer)?;

        (self.config.pop_size as i32).put(&mut writer)?;
        self.config.compatibility_thresh.put(&mut writer)?;
        self.config.c12.put(&mut writer)?;
        self.config.c3.put(&mut writer)?;
        self.config.top_p_cutoff.put(&mut writer)?;
        self.config.p_add_node.put(&mut writer)?;
        self.config.p_add_edge.put(&mut writer)?;
        self.config.p_weight.put(&mut writer)?;

        writer.flush()
    }

    /// Restores an engine saved with [`save`](Engine::save). All organisms
    /// keep their recorded fitnesses; outstanding handles of the saved
    /// engine do not carry over.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Engine> {
        let mut reader = BufReader::new(File::open(path)?);
        let corrupt = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());

        let input_nodes = i32::take(&mut reader)?;
        let output_nodes = i32::take(&mut reader)?;
        if input_nodes < 2 || output_nodes < 1 {
            return Err(corrupt("node counts out of range"));
        }

        let forward_splits = serial::take_edge_map(&mut reader)?;
        let recurrent_splits = serial::take_edge_map(&mut reader)?;

        let species_count = u32::take(&mut reader)? as usize;
        let mut species = Vec::with_capacity(species_count);
        for _ in 0..species_count {
            species.push(Species::load(&mut reader)?);
        }

        let next_node = i32::take(&mut reader)?;
        let next_species = i32::take(&mut reader)?;
        let generation = i32::take(&mut reader)?;

        let pop_size = i32::take(&mut reader)?;
        if pop_size < 1 {
            return Err(corrupt("population size out of range"));
        }
        let config = EngineConfig {
            input_size: (input_nodes - 1) as usize,
            output_size: output_nodes as usize,
            pop_size: pop_size as usize,
            compatibility_thresh: f32::take(&mut reader)?,
            c12: f32::take(&mut reader)?,
            c3: f32::take(&mut reader)?,
            top_p_cutoff: f32::take(&mut reader)?,
            p_add_node: f32::take(&mut reader)?,
            p_add_edge: f32::take(&mut reader)?,
            p_weight: f32::take(&mut reader)?,
        };

        let organisms = species.iter().map(Species::len).sum();
        Ok(Engine {
            config,
            input_nodes,
            output_nodes,
            species,
            innovations: Innovations {
                forward_splits,
                recurrent_splits,
                next_node,
                next_species,
            },
            ledger: Arc::new(FitnessLedger::new(organisms)),
            generation,
            rng: SmallRng::from_entropy(),
        })
    }
}

/// `max(1, round(len · top_p))` breeding candidates off the top of the
/// descending-fitness ranking.
fn breeding_pool_len(len: usize, top_p: f32) -> usize {
    ((len as f32 * top_p + 0.5) as usize).clamp(1, len)
}

fn compatibility_distance(config: &EngineConfig, first: &Genome, second: &Genome) -> f32 {
    let info = first.compatibility_info(second);
    if info.genome_size == 0 {
        0.0
    } else {
        config.c12 * info.non_matching as f32 / info.genome_size as f32
            + config.c3 * info.avg_weight_diff
    }
}

/// Applies at most one mutation, picked through exclusive probability
/// gates. Changing this to independent draws would shift the fitness
/// landscape the default rates were tuned against.
fn mutate_child(
    config: &EngineConfig,
    innovations: &mut Innovations,
    rng: &mut impl Rng,
    child: &mut Genome,
) {
    if math::rand_unit(rng) < config.p_add_node {
        let _ = child.add_node_mutation(rng, innovations);
    } else if math::rand_unit(rng) < config.p_add_edge {
        if let Ok(network) = child.generate_network() {
            let _ =
                child.add_edge_mutation(rng, &network, STRUCTURAL_WEIGHT_DEV, ADD_EDGE_MAX_TRIES);
        }
    } else if math::rand_unit(rng) < config.p_weight {
        child.mutate_weights(rng, WEIGHT_PERTURB_DEV, WEIGHT_REPLACE_DEV, WEIGHT_REPLACE_PROB);
    }
}

/// Appends `genome` to the first species whose representative it is
/// compatible with, or founds a new species around it. Slots carried over
/// from the previous generation are judged by that generation's
/// representative; fresh species by their first member.
fn place_offspring(
    config: &EngineConfig,
    previous: &[Species],
    innovations: &mut Innovations,
    next: &mut Vec<Species>,
    genome: Genome,
) {
    for (slot, species) in next.iter_mut().enumerate() {
        let representative = if slot < previous.len() {
            previous[slot].representative()
        } else {
            species.representative()
        };
        let representative = match representative {
            Some(organism) => organism.genome(),
            None => continue,
        };
        if compatibility_distance(config, representative, &genome) < config.compatibility_thresh {
            species.push(Organism::new(genome));
            return;
        }
    }

    let mut species = Species::new(innovations.next_species_id());
    species.push(Organism::new(genome));
    next.push(species);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn small_engine(pop_size: usize) -> Engine {
        Engine::new(EngineConfig {
            input_size: 2,
            output_size: 1,
            pop_size,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn total_organisms(engine: &Engine) -> usize {
        engine.species().map(Species::len).sum()
    }

    #[test]
    fn zero_sizes_are_rejected() {
        for (input_size, output_size, pop_size, what) in [
            (0, 1, 10, "input size"),
            (1, 0, 10, "output size"),
            (1, 1, 0, "population size"),
        ] {
            let result = Engine::new(EngineConfig {
                input_size,
                output_size,
                pop_size,
                ..EngineConfig::default()
            });
            assert_eq!(result.unwrap_err(), EngineError::InvalidConstruction(what));
        }
    }

    #[test]
    fn initial_population_is_seeded_with_single_edges() {
        let engine = small_engine(40);
        assert_eq!(total_organisms(&engine), 40);
        assert_eq!(engine.generation_id(), 0);

        let first = engine.species().next().unwrap();
        assert!(first.representative().unwrap().genome().forward_edges().is_empty());

        let seeded = engine
            .species()
            .flat_map(Species::organisms)
            .filter(|organism| organism.genome().forward_edges().len() == 1)
            .count();
        assert_eq!(seeded, 39);
    }

    #[test]
    fn generate_networks_covers_every_organism() {
        let engine = small_engine(25);
        let batch = engine.generate_networks().unwrap();
        assert_eq!(batch.len(), 25);

        for (_, handle, species_id) in &batch {
            assert!(engine.species().any(|s| s.id() == *species_id));
            handle.set_fitness(1.0).unwrap();
        }
    }

    #[test]
    fn update_without_fitness_fails_and_keeps_the_population() {
        let mut engine = small_engine(15);
        let before: Vec<(i32, usize)> =
            engine.species().map(|s| (s.id(), s.len())).collect();

        assert_eq!(engine.update_generation(), Err(EngineError::FitnessNotSet));

        let after: Vec<(i32, usize)> = engine.species().map(|s| (s.id(), s.len())).collect();
        assert_eq!(before, after);
        assert_eq!(engine.generation_id(), 0);
    }

    #[test]
    fn partial_reports_can_be_completed_and_retried() {
        let mut engine = small_engine(10);
        let batch = engine.generate_networks().unwrap();

        for (_, handle, _) in batch.iter().take(5) {
            handle.set_fitness(1.0).unwrap();
        }
        assert_eq!(engine.update_generation(), Err(EngineError::FitnessNotSet));

        // The ledger survived the failure; finish reporting and retry.
        for (_, handle, _) in batch.iter().skip(5) {
            handle.set_fitness(2.0).unwrap();
        }
        engine.update_generation().unwrap();
        assert_eq!(engine.generation_id(), 1);
    }

    #[test]
    fn turnover_invalidates_handles_and_roughly_keeps_the_size() {
        let mut engine = small_engine(60);

        for _ in 0..5 {
            let species_before = engine.num_species();
            let batch = engine.generate_networks().unwrap();
            for (_, handle, _) in &batch {
                handle.set_fitness(1.0).unwrap();
            }
            engine.update_generation().unwrap();

            for (_, handle, _) in &batch {
                assert_eq!(handle.set_fitness(1.0), Err(FitnessError::StaleGeneration));
            }

            // Per-species rounding drifts the total by at most half an
            // organism per species.
            let drift = total_organisms(&engine) as i64 - 60;
            assert!(
                drift.unsigned_abs() as usize <= species_before,
                "population drifted by {drift} across {species_before} species"
            );
        }
        assert_eq!(engine.generation_id(), 5);
    }

    #[test]
    fn the_champion_of_a_large_species_survives_unchanged() {
        let mut engine = small_engine(30);
        let batch = engine.generate_networks().unwrap();
        for (index, (_, handle, _)) in batch.iter().enumerate() {
            // One standout organism; everyone else scores low.
            handle.set_fitness(if index == 7 { 5.0 } else { 0.1 }).unwrap();
        }

        let champion = engine
            .species()
            .flat_map(Species::organisms)
            .nth(7)
            .unwrap()
            .genome()
            .clone();

        engine.update_generation().unwrap();

        assert!(
            engine
                .species()
                .flat_map(Species::organisms)
                .any(|organism| organism.genome() == &champion),
            "champion genome did not survive turnover"
        );
    }

    #[test]
    fn small_weight_changes_keep_genomes_in_the_same_species() {
        let mut rng = SmallRng::seed_from_u64(17);
        let engine = small_engine(5);

        let mut original = Genome::new(3, 1);
        original.add_input_output_edge(&mut rng, 2.0);
        let mut nudged = original.clone();
        assert_eq!(engine.compatibility_distance(&original, &nudged), 0.0);

        nudged.mutate_weights(&mut rng, 0.01, 2.0, 0.0);
        let distance = engine.compatibility_distance(&original, &nudged);
        assert!(distance < engine.config().compatibility_thresh);
        assert!(distance > 0.0);
    }

    #[test]
    fn breeding_pool_is_clamped_to_the_species() {
        assert_eq!(breeding_pool_len(1, 0.6), 1);
        assert_eq!(breeding_pool_len(2, 0.6), 1);
        assert_eq!(breeding_pool_len(5, 0.6), 3);
        assert_eq!(breeding_pool_len(10, 0.6), 6);
        assert_eq!(breeding_pool_len(3, 0.1), 1);
        assert_eq!(breeding_pool_len(4, 1.0), 4);
    }

    #[test]
    fn engine_round_trips_through_disk() {
        let mut engine = small_engine(20);
        for _ in 0..3 {
            let batch = engine.generate_networks().unwrap();
            for (index, (_, handle, _)) in batch.iter().enumerate() {
                handle.set_fitness(index as f32).unwrap();
            }
            engine.update_generation().unwrap();
        }

        let path = std::env::temp_dir().join("neatwork-engine-roundtrip.dat");
        engine.save(&path).unwrap();
        let mut restored = Engine::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.generation_id(), engine.generation_id());
        assert_eq!(restored.num_species(), engine.num_species());
        assert_eq!(restored.config(), engine.config());
        for (ours, theirs) in engine.species().zip(restored.species()) {
            assert_eq!(ours.id(), theirs.id());
            assert_eq!(ours.len(), theirs.len());
            for (a, b) in ours.organisms().zip(theirs.organisms()) {
                assert_eq!(a.genome(), b.genome());
                assert_eq!(a.fitness(), b.fitness());
            }
        }

        // The restored engine keeps evolving.
        let batch = restored.generate_networks().unwrap();
        for (_, handle, _) in &batch {
            handle.set_fitness(1.0).unwrap();
        }
        restored.update_generation().unwrap();
    }
}
