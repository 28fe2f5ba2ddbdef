//! The multi-restart session driver: seeding, circuit ingestion, reduction
//! runs, optional ABC interleaving and final emission.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use alsvid_ir::Circuit;

use crate::abc;
use crate::config::Config;
use crate::error::SynthResult;
use crate::reduction::{Budget, Reduction};

/// One reduction session over a circuit.
pub struct Session {
    cfg: Config,
    circuit: Circuit,
    initial_gates: usize,
    initial_depth: u32,
    rng: StdRng,
    start: Instant,
}

impl Session {
    /// Validate the configuration, seed the RNG and wrap the circuit.
    pub fn new(circuit: Circuit, cfg: Config) -> SynthResult<Self> {
        cfg.validate()?;
        let seed = cfg.seed.unwrap_or_else(rand::random);
        info!(seed, "seeding the session");
        let initial_gates = circuit.gate_count();
        let initial_depth = circuit.depth();
        println!("Initial depth:     {initial_depth}");
        println!("Initial gate count: {initial_gates}");
        Ok(Self {
            cfg,
            circuit,
            initial_gates,
            initial_depth,
            rng: StdRng::seed_from_u64(seed),
            start: Instant::now(),
        })
    }

    /// Load the circuit by file suffix and build a session around it.
    pub fn from_file(path: &Path, cfg: Config, ordered: bool) -> SynthResult<Self> {
        let circuit = alsvid_io::read_circuit(path, ordered)?;
        Self::new(circuit, cfg)
    }

    /// The current circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Consume the session, yielding the reduced circuit.
    pub fn into_circuit(self) -> Circuit {
        self.circuit
    }

    /// Run the configured number of reduction rounds, each under `budget`,
    /// optionally interleaving the ABC post-optimiser.
    pub fn reduce(&mut self, budget: Budget) -> SynthResult<()> {
        self.start = Instant::now();
        let mut total_abc_time = Duration::ZERO;
        let mut reduced_by_abc = 0usize;
        for run in 0..self.cfg.runs {
            let mut reduction = Reduction::new(&self.cfg);
            reduction.run(&mut self.circuit, &budget, &mut self.rng)?;
            self.print_run_results(&reduction, run)?;
            if self.cfg.use_abc {
                let abc_start = Instant::now();
                let before = self.circuit.gate_count();
                match abc::optimise(&self.circuit, &self.cfg)? {
                    Some(optimised) => {
                        println!(
                            "ABC gate count before: {before}; after: {}",
                            optimised.gate_count()
                        );
                        if optimised.gate_count() < before {
                            reduced_by_abc += before - optimised.gate_count();
                            self.circuit = optimised;
                            if let Some(dir) = &self.cfg.specification_log_dir {
                                if run < self.cfg.runs - 1 {
                                    let path = dir.join(format!("abc_run_{run}.blif"));
                                    alsvid_io::write_blif_file(&path, &self.circuit, "spec")?;
                                }
                            }
                        } else {
                            println!("ABC increased the gate count; its result is not used");
                        }
                    }
                    None => warn!("ABC produced no usable result"),
                }
                let abc_time = abc_start.elapsed();
                println!("ABC used time: {:.3}s", abc_time.as_secs_f64());
                total_abc_time += abc_time;
            }
        }
        if self.cfg.use_abc {
            println!("Total ABC time: {:.3}s", total_abc_time.as_secs_f64());
            println!("Reduced by ABC: {reduced_by_abc}");
        }
        Ok(())
    }

    fn print_run_results(&self, reduction: &Reduction<'_>, run: usize) -> SynthResult<()> {
        if run < self.cfg.runs - 1 {
            println!("Results after run {run}");
        } else {
            println!("Final results");
        }
        println!("*************************************************");
        self.print_statistics();
        reduction.print_statistics();
        println!("*************************************************");
        if let Some(dir) = &self.cfg.specification_log_dir {
            if run < self.cfg.runs - 1 {
                let path = dir.join(format!("intermediate_result_run_{run}.blif"));
                alsvid_io::write_blif_file(&path, &self.circuit, "spec")?;
            }
        }
        Ok(())
    }

    /// Print the session-level progress counters.
    pub fn print_statistics(&self) {
        println!(
            "Total time: {:.3}s",
            self.start.elapsed().as_secs_f64()
        );
        println!(
            "Initial gate count: {}; current gate count: {}",
            self.initial_gates,
            self.circuit.gate_count()
        );
        println!(
            "Initial depth: {}; current depth: {}",
            self.initial_depth,
            self.circuit.depth()
        );
    }

    /// Emit the final circuit, format chosen by file suffix.
    pub fn write(&self, path: &Path) -> SynthResult<()> {
        alsvid_io::write_circuit(path, &self.circuit)?;
        Ok(())
    }
}
