//! Evolves a XOR approximator and prints per-generation species
//! diagnostics. Network evaluation runs in parallel; each evaluation
//! reports through its own fitness handle.

use neatwork::{Engine, EngineConfig};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

const INPUTS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
const TARGETS: [f32; 4] = [0.0, 1.0, 1.0, 0.0];
const TRIALS: usize = 3;
const TARGET_FITNESS: f32 = 0.95;
const MAX_GENERATIONS: usize = 200;

fn main() {
    let mut engine = match Engine::new(EngineConfig {
        input_size: 2,
        output_size: 1,
        pop_size: 300,
        ..EngineConfig::default()
    }) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let mut rng = SmallRng::from_entropy();

    for _ in 0..MAX_GENERATIONS {
        let mut batch = match engine.generate_networks() {
            Ok(batch) => batch,
            Err(e) => {
                eprintln!("{e}");
                return;
            }
        };

        // Every case appears TRIALS times, shuffled so carried recurrent
        // state can't pattern-match the evaluation order.
        let mut sequence: Vec<usize> = (0..INPUTS.len())
            .cycle()
            .take(TRIALS * INPUTS.len())
            .collect();
        sequence.shuffle(&mut rng);
        let max_error = 6.0 * TRIALS as f32;

        let fitnesses: Vec<f32> = batch
            .par_iter_mut()
            .map(|(network, handle, _)| {
                let mut out = [0.0f32];
                let mut error = 0.0;
                for &case in &sequence {
                    if network.run(&INPUTS[case], &mut out).is_ok() {
                        error += (TARGETS[case] - out[0]).abs();
                    }
                }
                let fitness = (max_error - error) / max_error;
                if let Err(e) = handle.set_fitness(fitness) {
                    eprintln!("{e}");
                }
                fitness
            })
            .collect();

        let (best, best_fitness) = fitnesses
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, fitness)| (index, *fitness))
            .unwrap_or((0, 0.0));

        engine.print_specie_info();
        println!(
            "generation {}: species = {}, best fitness = {:.3}, nodes = {}, edges = {}, specie = {}",
            engine.generation_id(),
            engine.num_species(),
            best_fitness,
            batch[best].0.num_nodes(),
            batch[best].0.num_edges(),
            batch[best].2,
        );

        if best_fitness >= TARGET_FITNESS {
            let (network, _, _) = &mut batch[best];
            network.reset_recurrent_connections();
            let mut out = [0.0f32];
            for (input, target) in INPUTS.iter().zip(TARGETS) {
                match network.run(input, &mut out) {
                    Ok(()) => println!("{input:?} => {:+.3} (target {target})", out[0]),
                    Err(e) => eprintln!("{e}"),
                }
            }
            if let Err(e) = network.save("xor-champion.net") {
                eprintln!("failed to save champion network: {e}");
            } else {
                println!("champion network written to xor-champion.net");
            }
            return;
        }

        if let Err(e) = engine.update_generation() {
            eprintln!("{e}");
            return;
        }
    }

    println!("no solution within {MAX_GENERATIONS} generations");
}
