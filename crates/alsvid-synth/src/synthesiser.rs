//! The subcircuit synthesiser: drives the encoder across decreasing target
//! sizes, invokes the solver under the per-size timeouts, parses
//! certificates into replacement gate lists and splices them into the host.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, info, warn};

use alsvid_ir::{Circuit, Gate, TruthTable};
use alsvid_qbf::encoder::SpecSource;
use alsvid_qbf::{
    Encoder, EncoderOptions, EncodingLayout, HostSpec, IsolatedSpec, QbfError, SolverOutcome,
    miter, solve,
};

use crate::config::{Config, SynthesisMode};
use crate::error::{SynthError, SynthResult};
use crate::timeouts::TimeManager;

/// A spliced replacement, as the reduction loop needs it.
#[derive(Debug)]
pub struct ReplacementInfo {
    /// Aliases of the new gates (reused from the replaced set, extended
    /// with fresh ones when the replacement is larger).
    pub gate_names: Vec<u32>,
    /// Final output association, extended by any successors that folded to
    /// constants during splicing.
    pub output_assoc: FxHashMap<u32, Option<u32>>,
    /// Every alias removed by the splice, transitive casualties included.
    pub removed: FxHashSet<u32>,
    /// Size of the replacement.
    pub new_size: usize,
}

/// Result of one reduction attempt.
#[derive(Debug)]
pub enum ReduceOutcome {
    /// A replacement was found and spliced in.
    Replaced(ReplacementInfo),
    /// No realisation at any attempted size.
    Unrealisable,
    /// The solver timed out before any realisation was found.
    Timeout,
}

/// A replacement candidate extracted from a solver certificate.
#[derive(Debug)]
struct Candidate {
    gates: Vec<Gate>,
    output_assoc: FxHashMap<u32, Option<u32>>,
    gate_names: Vec<u32>,
}

impl Candidate {
    fn empty() -> Self {
        Self {
            gates: vec![],
            output_assoc: FxHashMap::default(),
            gate_names: vec![],
        }
    }
}

enum CheckResult {
    Sat(Candidate),
    Unsat,
    Timeout,
}

enum SynthOutcome {
    Realised { size: usize, candidate: Candidate },
    Unrealisable,
    Timeout,
}

enum EncodingFile {
    Logged(PathBuf),
    Temp(tempfile::NamedTempFile),
}

impl EncodingFile {
    fn path(&self) -> &Path {
        match self {
            EncodingFile::Logged(p) => p.as_path(),
            EncodingFile::Temp(f) => f.path(),
        }
    }
}

/// Drives synthesis attempts against one circuit over a whole run.
pub struct Synthesiser<'a> {
    cfg: &'a Config,
    timer: TimeManager,
    replacements_per_size: FxHashMap<usize, usize>,
    equivalent_per_size: FxHashMap<usize, usize>,
    checks_per_size: FxHashMap<usize, usize>,
    subcircuit_counter: u64,
    disable_timeouts: bool,
}

impl<'a> Synthesiser<'a> {
    /// Create a synthesiser for one reduction run.
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            timer: TimeManager::new(cfg),
            replacements_per_size: FxHashMap::default(),
            equivalent_per_size: FxHashMap::default(),
            checks_per_size: FxHashMap::default(),
            subcircuit_counter: 0,
            disable_timeouts: false,
        }
    }

    /// The timing ledger.
    pub fn timer(&self) -> &TimeManager {
        &self.timer
    }

    /// Try to replace `to_replace` by an equivalent subcircuit, splicing
    /// the best candidate in on success.
    pub fn reduce(
        &mut self,
        circuit: &mut Circuit,
        to_replace: &[u32],
        require_reduction: bool,
    ) -> SynthResult<ReduceOutcome> {
        let start = Instant::now();
        let result = match self.cfg.synthesis_mode {
            SynthesisMode::Qbf => self.synthesise_qbf(circuit, to_replace, require_reduction),
            SynthesisMode::Exact => self.synthesise_exact(circuit, to_replace, require_reduction),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(
                    e,
                    SynthError::Qbf(
                        QbfError::SolverFailed { .. } | QbfError::InvalidCertificate(_)
                    )
                ) {
                    self.dump_context(circuit, to_replace);
                }
                return Err(e);
            }
        };
        self.timer.add_total(start.elapsed());

        match outcome {
            SynthOutcome::Realised { size, candidate } => {
                self.log_replacement(circuit, to_replace, &candidate, size);
                let Candidate {
                    gates,
                    mut output_assoc,
                    gate_names,
                } = candidate;
                let splice_start = Instant::now();
                let removed = circuit.replace_subcircuit(to_replace, gates, &mut output_assoc)?;
                self.timer.log_integration(splice_start.elapsed());
                Ok(ReduceOutcome::Replaced(ReplacementInfo {
                    gate_names,
                    output_assoc,
                    removed,
                    new_size: size,
                }))
            }
            SynthOutcome::Unrealisable => Ok(ReduceOutcome::Unrealisable),
            SynthOutcome::Timeout => Ok(ReduceOutcome::Timeout),
        }
    }

    /// Exact-synthesis entry: search upward from the smallest size until a
    /// realisation exists, splice it, and return the minimum size found.
    pub fn bottom_up(&mut self, circuit: &mut Circuit) -> SynthResult<usize> {
        let to_replace: Vec<u32> = {
            let mut all: Vec<u32> = circuit.gate_aliases().collect();
            all.sort_unstable();
            all
        };
        let r = self.cfg.gate_inputs;
        let opts = self.encoder_options(false);
        let spec = HostSpec::new(circuit, &to_replace)?;
        if spec.subcircuit_inputs().len() < r {
            return Err(SynthError::NotEnoughInputs {
                available: spec.subcircuit_inputs().len(),
                required: r,
            });
        }
        self.disable_timeouts = true;
        let start = Instant::now();
        let start_size = usize::from(!opts.inputs_as_outputs && !opts.constants_as_outputs);
        let mut size = start_size;
        let candidate = loop {
            self.count_check(size);
            match self.check_encoding(&spec, circuit.max_alias(), &to_replace, size, r, &opts)? {
                CheckResult::Sat(candidate) => break candidate,
                CheckResult::Unsat => size += 1,
                CheckResult::Timeout => {
                    return Err(SynthError::Internal(
                        "timeout although timeouts are disabled".into(),
                    ));
                }
            }
        };
        self.disable_timeouts = false;
        info!(elapsed = ?start.elapsed(), size, "bottom-up synthesis finished");
        let Candidate {
            gates,
            mut output_assoc,
            ..
        } = candidate;
        circuit.replace_subcircuit(&to_replace, gates, &mut output_assoc)?;
        Ok(size)
    }

    /// Print per-size replacement counts and the timing report.
    pub fn print_statistics(&self) {
        self.timer.report();
        let mut sizes: Vec<usize> = self.replacements_per_size.keys().copied().collect();
        sizes.sort_unstable();
        for size in sizes {
            let replacements = self.replacements_per_size[&size];
            if self.cfg.log_equivalent_replacements {
                let equivalent = self.equivalent_per_size.get(&size).copied().unwrap_or(0);
                println!(
                    "Size: {size}; replacements: {replacements}; equivalent replacements: {equivalent}"
                );
            } else {
                println!("Size: {size}; replacements: {replacements}");
            }
        }
        let mut sizes: Vec<usize> = self.checks_per_size.keys().copied().collect();
        sizes.sort_unstable();
        for size in sizes {
            println!("Size: {size}; checks: {}", self.checks_per_size[&size]);
        }
    }

    // =====================================================================
    // Synthesis drivers
    // =====================================================================

    fn encoder_options(&self, has_feedback: bool) -> EncoderOptions {
        let mut opts = self.cfg.encoder.clone();
        opts.aig = self.cfg.synthesise_aig;
        if has_feedback && !self.cfg.inputs_as_outputs_with_cycles {
            opts.inputs_as_outputs = false;
        }
        opts
    }

    fn synthesise_qbf(
        &mut self,
        circuit: &Circuit,
        to_replace: &[u32],
        require_reduction: bool,
    ) -> SynthResult<SynthOutcome> {
        let spec = match HostSpec::new(circuit, to_replace) {
            Ok(spec) => spec,
            Err(QbfError::NoOutputs) => {
                warn!(?to_replace, "subcircuit without outputs; removing it outright");
                return Ok(SynthOutcome::Realised {
                    size: 0,
                    candidate: Candidate::empty(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if spec.subcircuit_inputs().len() < self.cfg.gate_inputs {
            // Fewer inputs than the gate fan-in: skip silently.
            return Ok(SynthOutcome::Unrealisable);
        }
        let opts = self.encoder_options(!spec.forbidden().is_empty());
        self.synthesise(&spec, circuit.max_alias(), to_replace, require_reduction, opts)
    }

    fn synthesise_exact(
        &mut self,
        circuit: &Circuit,
        to_replace: &[u32],
        require_reduction: bool,
    ) -> SynthResult<SynthOutcome> {
        let internal: FxHashSet<u32> = to_replace.iter().copied().collect();
        let mut gates = vec![];
        let mut input_set: FxHashSet<u32> = FxHashSet::default();
        let mut outputs = vec![];
        for gate in circuit.ordered_gates() {
            if !internal.contains(&gate.alias) {
                continue;
            }
            gates.push((gate.alias, gate.cover()));
            input_set.extend(gate.inputs.iter().copied());
            let external = circuit.is_primary_output(gate.alias)
                || circuit.successors_of(gate.alias).any(|s| !internal.contains(&s));
            if external {
                outputs.push(gate.alias);
            }
        }
        let mut inputs: Vec<u32> = input_set
            .into_iter()
            .filter(|x| !internal.contains(x))
            .collect();
        inputs.sort_unstable();
        let forbidden = circuit.potential_cycles(&inputs, &outputs, &internal);

        let spec = match IsolatedSpec::new(inputs, outputs, gates, forbidden) {
            Ok(spec) => spec,
            Err(QbfError::NoOutputs) => {
                warn!(?to_replace, "subcircuit without outputs; removing it outright");
                return Ok(SynthOutcome::Realised {
                    size: 0,
                    candidate: Candidate::empty(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if spec.subcircuit_inputs().len() < self.cfg.gate_inputs {
            return Ok(SynthOutcome::Unrealisable);
        }
        let opts = self.encoder_options(!spec.forbidden().is_empty());
        self.synthesise(&spec, circuit.max_alias(), to_replace, require_reduction, opts)
    }

    fn synthesise<S: SpecSource>(
        &mut self,
        spec: &S,
        max_alias: u32,
        to_replace: &[u32],
        require_reduction: bool,
        mut opts: EncoderOptions,
    ) -> SynthResult<SynthOutcome> {
        self.subcircuit_counter += 1;
        let n = to_replace.len();
        let r = self.cfg.gate_inputs;
        let max_size = if require_reduction { n - 1 } else { n };
        if !self.timer.is_timeout_set(max_size) {
            self.timer.init_timeout(max_size);
        }

        let mut best: Option<(usize, Candidate)> = None;
        if !require_reduction {
            // Probe the current size first: the identity is always legal,
            // so an UNSAT here means symmetry breaking got in the way (or
            // the encoding is broken).
            match self.analyse_original_size(spec, max_alias, to_replace, n, r, &mut opts)? {
                Some(candidate) => best = Some((n, candidate)),
                None => return Ok(SynthOutcome::Unrealisable),
            }
        }

        for size in (1..n).rev() {
            self.count_check(size);
            match self.check_encoding(spec, max_alias, to_replace, size, r, &opts)? {
                CheckResult::Sat(candidate) => best = Some((size, candidate)),
                CheckResult::Unsat => break,
                CheckResult::Timeout => {
                    self.timer.log_timeout(size);
                    if best.is_none() {
                        return Ok(SynthOutcome::Timeout);
                    }
                    break;
                }
            }
        }

        if opts.inputs_as_outputs || opts.constants_as_outputs {
            // Size 0: pure wire-through or constant outputs.
            self.count_check(0);
            match self.check_encoding(spec, max_alias, to_replace, 0, r, &opts)? {
                CheckResult::Sat(candidate) => best = Some((0, candidate)),
                CheckResult::Unsat => {}
                CheckResult::Timeout => debug!("timeout on the size-0 check"),
            }
        }

        match best {
            Some((size, candidate)) => {
                if self.cfg.log_replaced_gates {
                    info!(
                        ?to_replace,
                        new_gates = ?candidate.gate_names,
                        assoc = ?candidate.output_assoc,
                        "replacement found"
                    );
                }
                Ok(SynthOutcome::Realised { size, candidate })
            }
            None => Ok(SynthOutcome::Unrealisable),
        }
    }

    /// Verify the subcircuit is realisable at its own size; on UNSAT retry
    /// without the restrictive symmetry-breaking constraints (and keep them
    /// off for the smaller sizes of this attempt).
    fn analyse_original_size<S: SpecSource>(
        &mut self,
        spec: &S,
        max_alias: u32,
        to_replace: &[u32],
        n: usize,
        r: usize,
        opts: &mut EncoderOptions,
    ) -> SynthResult<Option<Candidate>> {
        match self.check_encoding(spec, max_alias, to_replace, n, r, opts)? {
            CheckResult::Sat(candidate) => Ok(Some(candidate)),
            CheckResult::Timeout => {
                self.timer.log_timeout(n);
                Ok(None)
            }
            CheckResult::Unsat => {
                if !opts.symmetry_breaking_used() {
                    warn!(?to_replace, "subcircuit cannot be rebuilt at its own size");
                    return Ok(None);
                }
                let relaxed = opts.without_restrictive_symmetry_breaking();
                match self.check_encoding(spec, max_alias, to_replace, n, r, &relaxed)? {
                    CheckResult::Sat(candidate) => {
                        info!("symmetry breaking constraints prevented realisation");
                        *opts = relaxed;
                        Ok(Some(candidate))
                    }
                    CheckResult::Timeout => {
                        self.timer.log_timeout(n);
                        Ok(None)
                    }
                    CheckResult::Unsat => {
                        warn!(?to_replace, "subcircuit cannot be rebuilt at its own size");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Emit one encoding, run the solver under the per-size timeout, and
    /// extract the candidate on SAT.
    fn check_encoding<S: SpecSource>(
        &mut self,
        spec: &S,
        max_alias: u32,
        to_replace: &[u32],
        size: usize,
        r: usize,
        opts: &EncoderOptions,
    ) -> SynthResult<CheckResult> {
        let timeout = if self.disable_timeouts || !self.timer.use_timeouts() {
            None
        } else {
            Some(self.timer.timeout_for(size))
        };

        let encoder = Encoder::new(spec, opts.clone());
        let encoding_start = Instant::now();
        let (layout, file) = match &self.cfg.encoding_log_dir {
            Some(dir) => {
                let path = dir.join(format!(
                    "iteration_{}_nof_gates_{size}.qcir",
                    self.subcircuit_counter
                ));
                let out = BufWriter::new(File::create(&path)?);
                let layout = encoder.encode(size, r, out)?;
                (layout, EncodingFile::Logged(path))
            }
            None => {
                let tmp = tempfile::Builder::new().suffix(".qcir").tempfile()?;
                let layout = encoder.encode(size, r, BufWriter::new(tmp.as_file()))?;
                (layout, EncodingFile::Temp(tmp))
            }
        };
        self.timer.log_encoding(encoding_start.elapsed());

        match solve(&self.cfg.solver_path, self.cfg.solver, file.path(), timeout) {
            Ok(run) => match run.outcome {
                SolverOutcome::Realisable(assignment) => {
                    if timeout.is_some() {
                        self.timer.record_sat(size, run.duration);
                    } else {
                        self.timer.log_sat(size, run.duration);
                    }
                    match extract_candidate(
                        &assignment,
                        &layout,
                        spec,
                        opts,
                        to_replace,
                        max_alias,
                        size,
                        r,
                    ) {
                        Ok(candidate) => Ok(CheckResult::Sat(candidate)),
                        Err(e) => {
                            self.dump_encoding(spec, size, r, opts);
                            Err(e)
                        }
                    }
                }
                SolverOutcome::Unrealisable => {
                    self.timer.log_unsat(size, run.duration);
                    Ok(CheckResult::Unsat)
                }
            },
            Err(QbfError::Timeout(_)) => Ok(CheckResult::Timeout),
            Err(e @ (QbfError::SolverFailed { .. } | QbfError::InvalidCertificate(_))) => {
                self.dump_encoding(spec, size, r, opts);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-emit the failing encoding to stderr. The encoding normally lives
    /// in a temporary file that is gone by the time the error surfaces, so
    /// it is regenerated here for the post-mortem.
    fn dump_encoding<S: SpecSource>(
        &self,
        spec: &S,
        size: usize,
        r: usize,
        opts: &EncoderOptions,
    ) {
        error!(size, "dumping the failing encoding for post-mortem");
        let mut buf = vec![];
        if Encoder::new(spec, opts.clone()).encode(size, r, &mut buf).is_ok() {
            let _ = std::io::stderr().write_all(&buf);
        }
    }

    fn count_check(&mut self, size: usize) {
        *self.checks_per_size.entry(size).or_default() += 1;
    }

    // =====================================================================
    // Replacement logging
    // =====================================================================

    fn log_replacement(
        &mut self,
        circuit: &Circuit,
        to_replace: &[u32],
        candidate: &Candidate,
        size: usize,
    ) {
        *self.replacements_per_size.entry(size).or_default() += 1;
        if !self.cfg.log_equivalent_replacements {
            return;
        }
        let start = Instant::now();
        match self.is_equivalent_replacement(circuit, to_replace, candidate) {
            Ok(true) => {
                *self.equivalent_per_size.entry(size).or_default() += 1;
            }
            Ok(false) => {}
            Err(e) => warn!("equivalence logging failed: {e}"),
        }
        self.timer.log_equivalence(start.elapsed());
    }

    /// Check whether the replacement is an exact equivalent of the removed
    /// subcircuit (rather than a same-function-under-the-host alternative).
    fn is_equivalent_replacement(
        &self,
        circuit: &Circuit,
        to_replace: &[u32],
        candidate: &Candidate,
    ) -> SynthResult<bool> {
        let internal: FxHashSet<u32> = to_replace.iter().copied().collect();
        let inputs = circuit.subcircuit_inputs(&internal);
        let outputs = circuit.subcircuit_outputs(&internal);
        let old_gates: Vec<(u32, Vec<u32>, TruthTable)> = circuit
            .ordered_gates()
            .filter(|g| internal.contains(&g.alias))
            .map(|g| (g.alias, g.inputs.clone(), g.table.clone()))
            .collect();
        let old = miter::SubcircuitSpec {
            inputs: inputs.clone(),
            outputs: outputs.iter().map(|&x| Some(x)).collect(),
            gates: old_gates,
        };
        let new = miter::SubcircuitSpec {
            inputs,
            outputs: outputs
                .iter()
                .map(|x| candidate.output_assoc.get(x).copied().flatten())
                .collect(),
            gates: candidate
                .gates
                .iter()
                .map(|g| (g.alias, g.inputs.clone(), g.table.clone()))
                .collect(),
        };
        Ok(miter::equivalent(
            &old,
            &new,
            &self.cfg.solver_path,
            self.cfg.solver,
        )?)
    }

    /// Post-mortem dump of the host circuit after a solver failure or an
    /// invalid certificate; the failing encoding was already re-emitted at
    /// the check site.
    fn dump_context(&self, circuit: &Circuit, to_replace: &[u32]) {
        error!(
            root = to_replace.first(),
            ?to_replace,
            "solver failure; dumping the specification for post-mortem"
        );
        let mut buf = vec![];
        if alsvid_io::write_blif(&mut buf, circuit, "error").is_ok() {
            let _ = std::io::stderr().write_all(&buf);
        }
    }
}

/// Read a replacement out of a satisfying assignment: selection bits give
/// each gate's input list, definition bits its table (row 0 false), output
/// bits the association of each subcircuit output with a gate, an input
/// (wire-through) or the constant.
#[allow(clippy::too_many_arguments)]
fn extract_candidate<S: SpecSource>(
    assignment: &alsvid_qbf::Assignment,
    layout: &EncodingLayout,
    spec: &S,
    opts: &EncoderOptions,
    to_replace: &[u32],
    max_alias: u32,
    size: usize,
    r: usize,
) -> SynthResult<Candidate> {
    let sub_inputs = spec.subcircuit_inputs();
    let sub_outputs = spec.subcircuit_outputs();
    let n_in = sub_inputs.len();

    let mut gate_names: Vec<u32> = to_replace.iter().copied().take(size).collect();
    let mut extra = 0;
    while gate_names.len() < size {
        extra += 1;
        gate_names.push(max_alias + extra);
    }

    let value = |var: u32| -> SynthResult<bool> {
        assignment.get(&var).copied().ok_or_else(|| {
            QbfError::InvalidCertificate(format!("no literal for variable {var}")).into()
        })
    };

    let mut gates = vec![];
    let mut output_assoc: FxHashMap<u32, Option<u32>> = FxHashMap::default();
    for i in 0..size {
        let mut inputs = vec![];
        for (j, &s) in layout.selection[i].iter().enumerate() {
            if value(s)? {
                inputs.push(if j < n_in {
                    sub_inputs[j]
                } else {
                    gate_names[j - n_in]
                });
            }
        }
        if inputs.len() != r {
            return Err(QbfError::InvalidCertificate(format!(
                "gate {i} selects {} inputs instead of {r}",
                inputs.len()
            ))
            .into());
        }
        let mut table = TruthTable::zeros(r);
        for pattern in 1..1usize << r {
            if value(layout.definition[i][pattern - 1])? {
                table.set(pattern, true);
            }
        }
        gates.push(Gate::new(gate_names[i], inputs, table));
        for (q, &o) in layout.output[i].iter().enumerate() {
            if value(o)? {
                output_assoc.insert(sub_outputs[q], Some(gate_names[i]));
            }
        }
    }
    if opts.inputs_as_outputs {
        for i in 0..n_in {
            for (q, &o) in layout.output[size + i].iter().enumerate() {
                if value(o)? {
                    output_assoc.insert(sub_outputs[q], Some(sub_inputs[i]));
                }
            }
        }
    }
    if opts.constants_as_outputs {
        let last = layout.output.len() - 1;
        for (q, &o) in layout.output[last].iter().enumerate() {
            if value(o)? {
                output_assoc.insert(sub_outputs[q], None);
            }
        }
    }
    for &out in sub_outputs {
        if !output_assoc.contains_key(&out) {
            return Err(QbfError::InvalidCertificate(format!(
                "subcircuit output {out} has no source in the certificate"
            ))
            .into());
        }
    }

    Ok(Candidate {
        gates,
        output_assoc,
        gate_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and_table() -> TruthTable {
        TruthTable::from_rows(&[false, false, false, true])
    }

    fn and3_circuit() -> Circuit {
        let mut c = Circuit::new(vec![1, 2, 3], vec![11]);
        c.add_gate(10, vec![1, 2], and_table()).unwrap();
        c.add_gate(11, vec![10, 3], and_table()).unwrap();
        c.init(true).unwrap();
        c
    }

    /// Encode a host spec and fabricate a satisfying assignment for a known
    /// replacement, then check the extraction reads back exactly that.
    #[test]
    fn test_extract_candidate_from_synthetic_assignment() {
        let circuit = and3_circuit();
        let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
        let opts = EncoderOptions::default();
        let encoder = Encoder::new(&spec, opts.clone());
        let layout = encoder.encode(2, 2, std::io::sink()).unwrap();

        // Gate 0 selects inputs 1 and 2 as an AND; gate 1 selects input 3
        // and gate 0 as an AND; output slot 0 is driven by gate 1.
        let mut assignment = alsvid_qbf::Assignment::default();
        for row in layout.selection.iter().chain(layout.definition.iter()) {
            for &v in row {
                assignment.insert(v, false);
            }
        }
        for row in &layout.output {
            for &v in row {
                assignment.insert(v, false);
            }
        }
        assignment.insert(layout.selection[0][0], true); // input 1
        assignment.insert(layout.selection[0][1], true); // input 2
        assignment.insert(layout.selection[1][2], true); // input 3
        assignment.insert(layout.selection[1][3], true); // gate 0
        assignment.insert(layout.definition[0][2], true); // pattern 11
        assignment.insert(layout.definition[1][2], true);
        assignment.insert(layout.output[1][0], true); // gate 1 -> output 11

        let candidate =
            extract_candidate(&assignment, &layout, &spec, &opts, &[10, 11], 11, 2, 2).unwrap();
        assert_eq!(candidate.gate_names, vec![10, 11]);
        assert_eq!(candidate.gates[0].inputs, vec![1, 2]);
        assert_eq!(candidate.gates[0].table, and_table());
        assert_eq!(candidate.gates[1].inputs, vec![3, 10]);
        assert_eq!(candidate.output_assoc.get(&11), Some(&Some(11)));
    }

    #[test]
    fn test_extract_wire_through_and_constant() {
        let circuit = and3_circuit();
        let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
        let opts = EncoderOptions::default();
        let layout = Encoder::new(&spec, opts.clone())
            .encode(0, 2, std::io::sink())
            .unwrap();

        let mut assignment = alsvid_qbf::Assignment::default();
        for row in &layout.output {
            for &v in row {
                assignment.insert(v, false);
            }
        }
        // Size 0: rows are the three inputs then the constant. Wire output
        // 11 to input 2.
        assignment.insert(layout.output[1][0], true);
        let candidate =
            extract_candidate(&assignment, &layout, &spec, &opts, &[10, 11], 11, 0, 2).unwrap();
        assert!(candidate.gates.is_empty());
        assert_eq!(candidate.output_assoc.get(&11), Some(&Some(2)));

        // Constant instead.
        let mut assignment = alsvid_qbf::Assignment::default();
        for row in &layout.output {
            for &v in row {
                assignment.insert(v, false);
            }
        }
        assignment.insert(layout.output[3][0], true);
        let candidate =
            extract_candidate(&assignment, &layout, &spec, &opts, &[10, 11], 11, 0, 2).unwrap();
        assert_eq!(candidate.output_assoc.get(&11), Some(&None));
    }

    #[test]
    fn test_extract_rejects_partial_assignment() {
        let circuit = and3_circuit();
        let spec = HostSpec::new(&circuit, &[10, 11]).unwrap();
        let opts = EncoderOptions::default();
        let layout = Encoder::new(&spec, opts.clone())
            .encode(1, 2, std::io::sink())
            .unwrap();
        let assignment = alsvid_qbf::Assignment::default();
        let err =
            extract_candidate(&assignment, &layout, &spec, &opts, &[10, 11], 11, 1, 2).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Qbf(QbfError::InvalidCertificate(_))
        ));
    }
}
