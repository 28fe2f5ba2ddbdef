//! The QBF exact-synthesis encoding.
//!
//! For a specification provider and a target size *k*, emits a
//! two-alternation circuit QBF: an outermost existential choice of a k-gate
//! circuit (selection, definition, output and connection variables), a
//! universal block over the specification's primary inputs, and an inner
//! existential block for the candidate gate values and the subcircuit output
//! values. A satisfying assignment of the outer block encodes a replacement
//! subcircuit; the constraint families follow the SAT-based exact-synthesis
//! encoding of Knuth/Haaswijk/Soeken, extended with acyclicity constraints
//! against feedback paths through the surrounding circuit.

use std::io::{self, Write};

use alsvid_ir::bit_seq;
use rustc_hash::FxHashSet;

use crate::error::{QbfError, QbfResult};
use crate::qcir::{QcirWriter, lit, neg};

/// Feature toggles of the encoding. The symmetry-breaking constraints are
/// independently switchable and on by default.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Forbid constant and single-input-projection gates.
    pub non_trivial: bool,
    /// Every gate must feed an output or a later gate.
    pub all_steps: bool,
    /// A gate reading gate *i* must not draw its other inputs from within
    /// *i*'s inputs.
    pub no_reapplication: bool,
    /// Later gates must not select strictly earlier sources than their
    /// predecessor.
    pub ordered_steps: bool,
    /// Allow wiring a subcircuit output straight to a subcircuit input.
    pub inputs_as_outputs: bool,
    /// Allow a subcircuit output to be the constant false.
    pub constants_as_outputs: bool,
    /// Introduce one variable per gate input, linked through the selection
    /// counter; trades clauses for variables at larger fan-in.
    pub gate_input_variables: bool,
    /// Restrict gates to AND-inverter functions (no XOR).
    pub aig: bool,
    /// Emit `#` comments into the encoding.
    pub comments: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            non_trivial: true,
            all_steps: true,
            no_reapplication: true,
            ordered_steps: true,
            inputs_as_outputs: true,
            constants_as_outputs: true,
            gate_input_variables: true,
            aig: false,
            comments: true,
        }
    }
}

impl EncoderOptions {
    /// Whether any symmetry-breaking constraint is active.
    pub fn symmetry_breaking_used(&self) -> bool {
        self.non_trivial || self.all_steps || self.no_reapplication || self.ordered_steps
    }

    /// Drop the constraints that can prevent a realisation at the current
    /// size. Ordered-steps and all-steps never do; non-trivial and
    /// no-reapplication can.
    pub fn without_restrictive_symmetry_breaking(&self) -> Self {
        Self {
            no_reapplication: false,
            ..self.clone()
        }
    }
}

/// What the encoder needs to know about the circuit being matched. Two
/// implementations: the host-embedded specification (full circuit plus a
/// copy of everything downstream of the subcircuit) and the isolated gate
/// list.
pub trait SpecSource {
    /// The universally quantified variables (the host's primary inputs).
    fn universal_variables(&self) -> &[u32];

    /// The inputs the candidate gates may select, feedback-affected entries
    /// renamed to their copied counterpart.
    fn candidate_inputs(&self) -> &[u32];

    /// The subcircuit inputs under their original aliases, aligned with
    /// [`SpecSource::candidate_inputs`]. Used for certificate extraction.
    fn subcircuit_inputs(&self) -> &[u32];

    /// The subcircuit outputs in slot order.
    fn subcircuit_outputs(&self) -> &[u32];

    /// The fresh variable carrying the candidate value of output slot `idx`.
    fn output_value_var(&self, idx: usize) -> u32;

    /// Feedback pairs `(output alias, candidate-input variable)`.
    fn forbidden(&self) -> &[(u32, u32)];

    /// The largest variable the provider has allocated; the encoder starts
    /// its own numbering above this.
    fn last_used_var(&self) -> u32;

    /// Emit the specification gate network (F1).
    fn write_specification<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<()>;

    /// Emit the renamed copy of everything downstream of the subcircuit
    /// (F2). No-op for isolated specifications.
    fn write_specification_copy<W: Write>(&self, _w: &mut QcirWriter<W>) -> io::Result<()> {
        Ok(())
    }

    /// Emit the miter tail tying the candidate to the specification;
    /// returns the constraint gates to conjoin.
    fn write_miter<W: Write>(&self, w: &mut QcirWriter<W>) -> io::Result<Vec<u32>>;
}

/// The variable families of one emitted encoding, needed to read a
/// replacement back out of a satisfying assignment.
#[derive(Debug, Clone)]
pub struct EncodingLayout {
    /// `selection[i][j]`: gate *i* selects candidate source *j*.
    pub selection: Vec<Vec<u32>>,
    /// `definition[i][m-1]`: gate *i* outputs true on input pattern *m*
    /// (pattern 0 is omitted: gates are normalised).
    pub definition: Vec<Vec<u32>>,
    /// `output[p][q]`: candidate source *p* drives subcircuit output *q*.
    /// Rows: the *k* gates, then the inputs (when inputs-as-outputs), then
    /// the constant row (when constants-as-outputs).
    pub output: Vec<Vec<u32>>,
}

/// The synthesis encoder, parameterised over the specification provider.
pub struct Encoder<'s, S: SpecSource> {
    spec: &'s S,
    opts: EncoderOptions,
}

impl<'s, S: SpecSource> Encoder<'s, S> {
    /// Create an encoder over a specification.
    pub fn new(spec: &'s S, opts: EncoderOptions) -> Self {
        Self { spec, opts }
    }

    /// Emit the complete QBF for `nof_gates` candidate gates of fan-in
    /// `gate_inputs` into `out`, returning the variable layout.
    pub fn encode<W: Write>(
        &self,
        nof_gates: usize,
        gate_inputs: usize,
        out: W,
    ) -> QbfResult<EncodingLayout> {
        let inputs = self.spec.candidate_inputs();
        if inputs.len() < gate_inputs {
            return Err(QbfError::NotEnoughInputs {
                available: inputs.len(),
                required: gate_inputs,
            });
        }
        let emitter = Emitter {
            spec: self.spec,
            opts: &self.opts,
            k: nof_gates,
            r: gate_inputs,
            n_in: inputs.len(),
            n_out: self.spec.subcircuit_outputs().len(),
            w: QcirWriter::new(out, self.spec.last_used_var(), self.opts.comments),
            internal_gates: vec![],
            selection: vec![],
            definition: vec![],
            output_vars: vec![],
            gate_input_vars: vec![],
            connection: vec![],
            constraints: vec![],
        };
        emitter.run()
    }
}

/// Per-encoding state: the writer, the allocated variable families and the
/// accumulated constraint gates.
struct Emitter<'a, W: Write, S: SpecSource> {
    spec: &'a S,
    opts: &'a EncoderOptions,
    k: usize,
    r: usize,
    n_in: usize,
    n_out: usize,
    w: QcirWriter<W>,
    internal_gates: Vec<u32>,
    selection: Vec<Vec<u32>>,
    definition: Vec<Vec<u32>>,
    output_vars: Vec<Vec<u32>>,
    gate_input_vars: Vec<Vec<u32>>,
    /// Per feedback-affected input: its connection variables, one per
    /// candidate (inputs included when inputs-as-outputs is on).
    connection: Vec<(u32, Vec<u32>)>,
    constraints: Vec<u32>,
}

impl<W: Write, S: SpecSource> Emitter<'_, W, S> {
    fn run(mut self) -> QbfResult<EncodingLayout> {
        let output_var = self.prefix()?;

        self.w.comment("Specification")?;
        self.spec.write_specification(&mut self.w)?;
        self.w.comment("Specification Copy")?;
        self.spec.write_specification_copy(&mut self.w)?;
        if !self.spec.forbidden().is_empty() {
            self.w.comment("Cycle Constraint")?;
            self.cycle_constraints()?;
        }
        if self.opts.aig {
            self.aiger_constraints()?;
        }
        self.selection_constraints()?;
        self.output_cardinality()?;
        self.gate_semantics()?;
        self.symmetry_breaking()?;
        self.subcircuit_output_equivalences()?;

        self.w.comment("Miter")?;
        let miter = self.spec.write_miter(&mut self.w)?;
        self.constraints.extend(miter);

        let lits: Vec<i64> = self.constraints.iter().map(|&v| lit(v)).collect();
        self.w.and(output_var, &lits)?;
        self.w.flush()?;

        Ok(EncodingLayout {
            selection: self.selection,
            definition: self.definition,
            output: self.output_vars,
        })
    }

    /// Allocate every variable family and write the quantifier prefix.
    fn prefix(&mut self) -> QbfResult<u32> {
        // Connection variables first: one per feedback-affected input and
        // candidate. Width includes the inputs when they may be outputs.
        let affected: FxHashSet<u32> = self.spec.forbidden().iter().map(|&(_, y)| y).collect();
        let mut affected: Vec<u32> = affected.into_iter().collect();
        affected.sort_unstable();
        let conn_width = if self.opts.inputs_as_outputs {
            self.k + self.n_in
        } else {
            self.k
        };
        self.connection = affected
            .into_iter()
            .map(|y| (y, (0..conn_width).map(|_| self.w.fresh()).collect()))
            .collect();

        self.w.header()?;
        self.selection = (0..self.k)
            .map(|i| (0..self.n_in + i).map(|_| self.w.fresh()).collect())
            .collect();
        self.definition = (0..self.k)
            .map(|_| (1..1usize << self.r).map(|_| self.w.fresh()).collect())
            .collect();
        let mut output_rows = self.k;
        if self.opts.inputs_as_outputs {
            output_rows += self.n_in;
        }
        if self.opts.constants_as_outputs {
            output_rows += 1;
        }
        self.output_vars = (0..output_rows)
            .map(|_| (0..self.n_out).map(|_| self.w.fresh()).collect())
            .collect();

        let outer: Vec<u32> = self
            .selection
            .iter()
            .chain(self.definition.iter())
            .chain(self.output_vars.iter())
            .flatten()
            .copied()
            .chain(self.connection.iter().flat_map(|(_, v)| v.iter().copied()))
            .collect();
        self.w.exists(outer)?;
        self.w
            .forall(self.spec.universal_variables().iter().copied())?;

        self.internal_gates = (0..self.k).map(|_| self.w.fresh()).collect();
        self.w.exists(self.internal_gates.iter().copied())?;
        self.w
            .exists((0..self.n_out).map(|q| self.spec.output_value_var(q)))?;
        if self.opts.gate_input_variables {
            self.gate_input_vars = (0..self.k)
                .map(|_| (0..self.r).map(|_| self.w.fresh()).collect())
                .collect();
            self.w
                .exists(self.gate_input_vars.iter().flatten().copied())?;
        }
        let output_var = self.w.fresh();
        self.w.output(output_var)?;
        Ok(output_var)
    }

    /// Candidate source `idx`: first the inputs, then the gates.
    fn node(&self, idx: usize) -> u32 {
        if idx < self.n_in {
            self.spec.candidate_inputs()[idx]
        } else {
            self.internal_gates[idx - self.n_in]
        }
    }

    fn gate_var(&self, idx: usize) -> u32 {
        self.internal_gates[idx]
    }

    fn def_var(&self, gate: usize, pattern: usize) -> u32 {
        self.definition[gate][pattern - 1]
    }

    /// Literal for "`var` differs from `constant`".
    fn cond(var: u32, constant: bool) -> i64 {
        if constant { neg(var) } else { lit(var) }
    }

    fn connection_for(&self, input: u32) -> QbfResult<&[u32]> {
        self.connection
            .iter()
            .find(|(y, _)| *y == input)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| QbfError::Encoding(format!("no connection variables for input {input}")))
    }

    /// Index of a candidate gate in a connection-variable vector.
    fn conn_gate_idx(&self, gate: usize) -> usize {
        if self.opts.inputs_as_outputs {
            self.n_in + gate
        } else {
            gate
        }
    }

    fn input_position(&self, input: u32) -> QbfResult<usize> {
        self.spec
            .candidate_inputs()
            .iter()
            .position(|&x| x == input)
            .ok_or_else(|| QbfError::Encoding(format!("input {input} is not a candidate input")))
    }

    fn output_position(&self, output: u32) -> QbfResult<usize> {
        self.spec
            .subcircuit_outputs()
            .iter()
            .position(|&x| x == output)
            .ok_or_else(|| QbfError::Encoding(format!("{output} is not a subcircuit output")))
    }

    fn push_or(&mut self, lits: &[i64]) -> io::Result<u32> {
        let var = self.w.fresh();
        self.w.or(var, lits)?;
        Ok(var)
    }

    fn push_or_constraint(&mut self, lits: &[i64]) -> io::Result<()> {
        let var = self.push_or(lits)?;
        self.constraints.push(var);
        Ok(())
    }

    /// Conjoin a group of clause gates into a single constraint gate.
    fn group_constraint(&mut self, vars: Vec<u32>) -> io::Result<()> {
        let lits: Vec<i64> = vars.into_iter().map(lit).collect();
        let var = self.w.fresh();
        self.w.and(var, &lits)?;
        self.constraints.push(var);
        Ok(())
    }

    // =====================================================================
    // Cardinality (sequential counter)
    // =====================================================================

    /// One stage of the unary sequential counter: fold variable `in1` into
    /// the running counts `inputs`, returning the new counts and a carry
    /// when the count would exceed `cardinality`.
    fn counter_stage(
        &mut self,
        in1: u32,
        inputs: &[u32],
        cardinality: usize,
        last: bool,
    ) -> io::Result<(Vec<u32>, Option<u32>)> {
        if last {
            let carry = self.w.fresh();
            self.w.and(carry, &[lit(in1), lit(inputs[inputs.len() - 1])])?;
            let or_var = self.w.fresh();
            if inputs.len() == 1 {
                self.w.or(or_var, &[lit(in1), lit(inputs[0])])?;
            } else {
                let and_var = self.w.fresh();
                self.w
                    .and(and_var, &[lit(in1), lit(inputs[inputs.len() - 2])])?;
                self.w.or(or_var, &[lit(and_var), lit(inputs[inputs.len() - 1])])?;
            }
            return Ok((vec![or_var], Some(carry)));
        }
        let mut outputs = vec![];
        let mut or_in = in1;
        for &input in inputs {
            let or_var = self.w.fresh();
            self.w.or(or_var, &[lit(or_in), lit(input)])?;
            outputs.push(or_var);
            let and_var = self.w.fresh();
            self.w.and(and_var, &[lit(in1), lit(input)])?;
            or_in = and_var;
        }
        if outputs.len() == cardinality {
            Ok((outputs, Some(or_in)))
        } else {
            outputs.push(or_in);
            Ok((outputs, None))
        }
    }

    /// Exactly `cardinality` of `vars` are true.
    fn cardinality_exactly(&mut self, vars: &[u32], cardinality: usize) -> io::Result<()> {
        if vars.len() == cardinality {
            let lits: Vec<i64> = vars.iter().map(|&v| lit(v)).collect();
            let var = self.w.fresh();
            self.w.and(var, &lits)?;
            self.constraints.push(var);
            return Ok(());
        }
        debug_assert!(vars.len() > cardinality);
        let mut carries: Vec<i64> = vec![];
        let mut aux = vec![vars[0]];
        for (idx, &v) in vars[1..].iter().enumerate() {
            let last = idx == vars.len() - 2;
            let (outputs, carry) = self.counter_stage(v, &aux, cardinality, last)?;
            aux = outputs;
            if let Some(c) = carry {
                carries.push(neg(c));
            }
        }
        // No carry may fire, and the count-at-cardinality bit must hold.
        carries.push(lit(aux[aux.len() - 1]));
        let var = self.w.fresh();
        self.w.and(var, &carries)?;
        self.constraints.push(var);
        Ok(())
    }

    // =====================================================================
    // Selection, outputs, gate semantics
    // =====================================================================

    fn selection_constraints(&mut self) -> io::Result<()> {
        self.w.comment("Selection Vars")?;
        for i in 0..self.k {
            if self.opts.gate_input_variables {
                self.setup_gate_input_variables(i)?;
            } else {
                let vars = self.selection[i].clone();
                self.cardinality_exactly(&vars, self.r)?;
            }
        }
        Ok(())
    }

    fn output_cardinality(&mut self) -> io::Result<()> {
        self.w.comment("Output Vars")?;
        for q in 0..self.n_out {
            let vars: Vec<u32> = self.output_vars.iter().map(|row| row[q]).collect();
            self.cardinality_exactly(&vars, 1)?;
        }
        Ok(())
    }

    fn gate_semantics(&mut self) -> io::Result<()> {
        for i in 0..self.k {
            self.w.comment(&format!("Rules for gate {i}"))?;
            if self.opts.gate_input_variables {
                self.gate_constraint_with_input_vars(i)?;
            } else {
                self.gate_constraint(i)?;
            }
        }
        Ok(())
    }

    /// F4: for every r-subset of candidates and every input pattern, the
    /// selected inputs force the gate output through its definition bits;
    /// pattern 0 forces false (normalisation).
    fn gate_constraint(&mut self, gate: usize) -> io::Result<()> {
        let m = self.n_in + gate;
        let out = self.gate_var(gate);
        let mut combo: Vec<usize> = (0..self.r).collect();
        loop {
            let sel_lits: Vec<i64> = combo.iter().map(|&x| neg(self.selection[gate][x])).collect();

            let mut clause = vec![Self::cond(out, true)];
            clause.extend(combo.iter().map(|&x| lit(self.node(x))));
            clause.extend(&sel_lits);
            self.push_or_constraint(&clause)?;

            for pattern in 1..1usize << self.r {
                let polarity: Vec<bool> = bit_seq(pattern, self.r).collect();
                let mismatch: Vec<i64> = combo
                    .iter()
                    .zip(&polarity)
                    .map(|(&x, &p)| Self::cond(self.node(x), p))
                    .collect();
                for value in [false, true] {
                    let c1 = Self::cond(self.def_var(gate, pattern), value);
                    let c2 = Self::cond(out, !value);
                    let mut clause = vec![c1, c2];
                    clause.extend(&mismatch);
                    clause.extend(&sel_lits);
                    self.push_or_constraint(&clause)?;
                }
            }

            if !next_combination(&mut combo, m) {
                break;
            }
        }
        Ok(())
    }

    /// F4 rewritten over the per-gate input variables.
    fn gate_constraint_with_input_vars(&mut self, gate: usize) -> io::Result<()> {
        let out = self.gate_var(gate);
        let givs = self.gate_input_vars[gate].clone();

        let mut clause = vec![Self::cond(out, true)];
        clause.extend(givs.iter().map(|&g| Self::cond(g, false)));
        self.push_or_constraint(&clause)?;

        for pattern in 1..1usize << self.r {
            let polarity: Vec<bool> = bit_seq(pattern, self.r).collect();
            let mismatch: Vec<i64> = givs
                .iter()
                .zip(&polarity)
                .map(|(&g, &p)| Self::cond(g, p))
                .collect();
            for value in [false, true] {
                let c1 = Self::cond(self.def_var(gate, pattern), value);
                let c2 = Self::cond(out, !value);
                let mut clause = vec![c1, c2];
                clause.extend(&mismatch);
                self.push_or_constraint(&clause)?;
            }
        }
        Ok(())
    }

    fn conditional_equivalence_constraint(&mut self, cond: i64, a: i64, b: i64) -> io::Result<()> {
        let var = self.w.fresh();
        self.w.conditional_equivalence(var, cond, a, b)?;
        self.constraints.push(var);
        Ok(())
    }

    /// Tie the gate-input variables of `gate` to the selected sources. With
    /// exactly r candidates the selection is forced and the link is direct;
    /// otherwise the sequential counter for the selection doubles as the
    /// input index: when the counter held i-1 before a selected candidate,
    /// that candidate is the i-th gate input.
    fn setup_gate_input_variables(&mut self, gate: usize) -> io::Result<()> {
        let sel = self.selection[gate].clone();
        let givs = self.gate_input_vars[gate].clone();
        if sel.len() == self.r {
            let lits: Vec<i64> = sel.iter().map(|&v| lit(v)).collect();
            let var = self.w.fresh();
            self.w.and(var, &lits)?;
            self.constraints.push(var);
            for idx in 0..self.r {
                let var = self.w.fresh();
                self.w
                    .equivalence(var, lit(self.node(idx)), lit(givs[idx]))?;
                self.constraints.push(var);
            }
            return Ok(());
        }

        let mut carries: Vec<i64> = vec![];
        let mut aux = vec![sel[0]];
        self.conditional_equivalence_constraint(lit(sel[0]), lit(givs[0]), lit(self.node(0)))?;
        for (idx, &variable) in sel[1..].iter().enumerate() {
            let (outputs, carry) = self.counter_stage(variable, &aux, self.r, false)?;
            if let Some(c) = carry {
                carries.push(neg(c));
            }
            for i in 0..aux.len() {
                if idx as isize > sel.len() as isize - self.r as isize + i as isize - 1 {
                    continue;
                }
                let and_var = self.w.fresh();
                self.w.and(and_var, &[neg(aux[i]), lit(outputs[i])])?;
                self.conditional_equivalence_constraint(
                    lit(and_var),
                    lit(givs[i]),
                    lit(self.node(idx + 1)),
                )?;
            }
            if aux.len() < outputs.len() {
                self.conditional_equivalence_constraint(
                    lit(outputs[outputs.len() - 1]),
                    lit(givs[outputs.len() - 1]),
                    lit(self.node(idx + 1)),
                )?;
            }
            aux = outputs;
        }
        carries.push(lit(aux[aux.len() - 1]));
        let var = self.w.fresh();
        self.w.and(var, &carries)?;
        self.constraints.push(var);
        Ok(())
    }

    // =====================================================================
    // Symmetry breaking
    // =====================================================================

    fn symmetry_breaking(&mut self) -> io::Result<()> {
        if self.opts.non_trivial {
            self.w.comment("Non-trivial constraints")?;
            self.non_trivial_constraint()?;
        }
        if self.opts.all_steps {
            self.w.comment("Use all steps constraints")?;
            self.all_steps_constraint()?;
        }
        if self.opts.no_reapplication {
            self.w.comment("No reapplication constraints")?;
            self.no_reapplication_constraint()?;
        }
        if self.opts.ordered_steps {
            self.w.comment("Ordered steps constraints")?;
            self.ordered_steps_constraint()?;
        }
        Ok(())
    }

    /// No gate computes the constant false or the projection of one of its
    /// selected inputs.
    fn non_trivial_constraint(&mut self) -> io::Result<()> {
        for i in 0..self.k {
            let defs = self.definition[i].clone();
            let lits: Vec<i64> = defs.iter().map(|&v| lit(v)).collect();
            self.push_or_constraint(&lits)?;
            for j in 0..self.r {
                let start = 1usize << (self.r - j);
                let block = 1usize << (self.r - j - 1);
                let mut clause = vec![];
                for chunk in 0..1usize << j {
                    let lo = chunk * start - usize::from(chunk != 0);
                    clause.extend(defs[lo..chunk * start + block - 1].iter().map(|&v| lit(v)));
                    clause.extend(
                        defs[chunk * start + block - 1..(chunk + 1) * start - 1]
                            .iter()
                            .map(|&v| neg(v)),
                    );
                }
                self.push_or_constraint(&clause)?;
            }
        }
        Ok(())
    }

    /// Every gate is an output source or an input of a later gate.
    fn all_steps_constraint(&mut self) -> io::Result<()> {
        for i in 0..self.k {
            let mut clause: Vec<i64> = self.output_vars[i].iter().map(|&v| lit(v)).collect();
            for j in i + 1..self.k {
                clause.push(lit(self.selection[j][self.n_in + i]));
            }
            self.push_or_constraint(&clause)?;
        }
        Ok(())
    }

    /// If gate j selects gate i, j's remaining inputs must not all lie
    /// within i's selected inputs.
    fn no_reapplication_constraint(&mut self) -> io::Result<()> {
        for i in 0..self.k {
            let m = self.n_in + i;
            let mut combo: Vec<usize> = (0..self.r).collect();
            loop {
                for j in i + 1..self.k {
                    let selector = self.selection[j][self.n_in + i];
                    let mut clause: Vec<i64> = combo
                        .iter()
                        .map(|&x| neg(self.selection[i][x]))
                        .collect();
                    clause.push(neg(selector));
                    for (idx, &s) in self.selection[j].iter().enumerate() {
                        if !combo.contains(&idx) && s != selector {
                            clause.push(lit(s));
                        }
                    }
                    self.push_or_constraint(&clause)?;
                }
                if !next_combination(&mut combo, m) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// If gate i selects gate j, gate i+1 selects some gate >= j.
    fn ordered_steps_constraint(&mut self) -> io::Result<()> {
        for i in 0..self.k.saturating_sub(1) {
            for j in 0..i {
                let selector = self.selection[i][self.n_in + j];
                let mut clause = vec![neg(selector)];
                clause.extend((j..=i).map(|x| lit(self.selection[i + 1][self.n_in + x])));
                self.push_or_constraint(&clause)?;
            }
        }
        Ok(())
    }

    // =====================================================================
    // Acyclicity
    // =====================================================================

    fn cycle_constraints(&mut self) -> QbfResult<()> {
        self.w.comment("Connection Variables Base")?;
        self.connection_base()?;
        let distinct_pairs: FxHashSet<(u32, u32)> = self.spec.forbidden().iter().copied().collect();
        if distinct_pairs.len() > 1 {
            self.w.comment("Multiple Forbidden")?;
            self.combined_cycle_rule()?;
        }
        self.w.comment("Cycle Restrictions")?;
        self.gate_output_cycle_constraints()?;
        Ok(())
    }

    /// Define the connection variables inductively along the candidate
    /// order: an input connects to itself, and a gate connects to whatever
    /// its selected sources connect to.
    fn connection_base(&mut self) -> QbfResult<()> {
        let mut group = vec![];
        for (y, conn) in self.connection.clone() {
            let input_idx = self.input_position(y)?;
            if self.opts.inputs_as_outputs {
                group.push(conn[input_idx]);
                for i in 0..self.k {
                    for j in 0..self.n_in {
                        let v = self.push_or(&[
                            neg(self.selection[i][j]),
                            neg(conn[j]),
                            lit(conn[self.conn_gate_idx(i)]),
                        ])?;
                        group.push(v);
                    }
                    for j in 0..i {
                        let v = self.push_or(&[
                            neg(self.selection[i][self.n_in + j]),
                            neg(conn[self.conn_gate_idx(j)]),
                            lit(conn[self.conn_gate_idx(i)]),
                        ])?;
                        group.push(v);
                    }
                }
            } else {
                for i in 0..self.k {
                    let v = self.push_or(&[neg(self.selection[i][input_idx]), lit(conn[i])])?;
                    group.push(v);
                    for j in 0..i {
                        let v = self.push_or(&[
                            neg(self.selection[i][self.n_in + j]),
                            neg(conn[j]),
                            lit(conn[i]),
                        ])?;
                        group.push(v);
                    }
                }
            }
        }
        self.group_constraint(group)?;
        Ok(())
    }

    /// The source assigned to a feedback pair's output must not connect to
    /// the pair's input.
    fn gate_output_cycle_constraints(&mut self) -> QbfResult<()> {
        let mut group = vec![];
        for &(outp, inp) in &self.spec.forbidden().to_vec() {
            let q = self.output_position(outp)?;
            let conn = self.connection_for(inp)?.to_vec();
            for i in 0..self.k {
                let v = self.push_or(&[
                    neg(self.output_vars[i][q]),
                    neg(conn[self.conn_gate_idx(i)]),
                ])?;
                group.push(v);
            }
            if self.opts.inputs_as_outputs {
                for i in 0..self.n_in {
                    let v =
                        self.push_or(&[neg(self.output_vars[self.k + i][q]), neg(conn[i])])?;
                    group.push(v);
                }
            }
        }
        self.group_constraint(group)?;
        Ok(())
    }

    /// Cross-pair rule: when the source of output o already connects to an
    /// input b of a different pair, o's own paired inputs must be treated as
    /// connected to b as well, since the external path from o reaches them.
    fn combined_cycle_rule(&mut self) -> QbfResult<()> {
        let forbidden = self.spec.forbidden().to_vec();
        let mut outputs: Vec<u32> = forbidden.iter().map(|&(o, _)| o).collect();
        outputs.sort_unstable();
        outputs.dedup();
        let mut all_inputs: Vec<u32> = forbidden.iter().map(|&(_, y)| y).collect();
        all_inputs.sort_unstable();
        all_inputs.dedup();

        let mut group = vec![];
        for &outp in &outputs {
            let mut paired: Vec<u32> = forbidden
                .iter()
                .filter(|&&(o, _)| o == outp)
                .map(|&(_, y)| y)
                .collect();
            paired.sort_unstable();
            paired.dedup();
            let others: Vec<u32> = all_inputs
                .iter()
                .copied()
                .filter(|b| !paired.contains(b))
                .collect();
            let q = self.output_position(outp)?;
            for &b in &others {
                let conn_b = self.connection_for(b)?.to_vec();
                for i in 0..self.k {
                    for &y in &paired {
                        let y_idx = self.input_position(y)?;
                        if self.opts.inputs_as_outputs {
                            let v = self.push_or(&[
                                neg(self.output_vars[i][q]),
                                neg(conn_b[self.conn_gate_idx(i)]),
                                lit(conn_b[y_idx]),
                            ])?;
                            group.push(v);
                        } else {
                            let cond = self.w.fresh();
                            self.w.and(
                                cond,
                                &[lit(self.output_vars[i][q]), lit(conn_b[i])],
                            )?;
                            for j in 0..self.k {
                                let v = self.push_or(&[
                                    neg(cond),
                                    neg(self.selection[j][y_idx]),
                                    lit(conn_b[j]),
                                ])?;
                                group.push(v);
                            }
                        }
                    }
                }
                if self.opts.inputs_as_outputs {
                    for i in 0..self.n_in {
                        for &y in &paired {
                            let y_idx = self.input_position(y)?;
                            let v = self.push_or(&[
                                neg(self.output_vars[self.k + i][q]),
                                neg(conn_b[i]),
                                lit(conn_b[y_idx]),
                            ])?;
                            group.push(v);
                        }
                    }
                }
            }
        }
        self.group_constraint(group)?;
        Ok(())
    }

    // =====================================================================
    // AIG restriction and output equivalences
    // =====================================================================

    /// F6: forbid the one normalised 2-input function outside the AIG basis.
    fn aiger_constraints(&mut self) -> io::Result<()> {
        self.w.comment("AIGER Constraints")?;
        debug_assert_eq!(self.r, 2);
        for i in 0..self.k {
            let clause = [
                neg(self.definition[i][0]),
                neg(self.definition[i][1]),
                lit(self.definition[i][2]),
            ];
            self.push_or_constraint(&clause)?;
        }
        Ok(())
    }

    /// F3: the selected source of each output slot fixes the slot's value
    /// variable; the constant source forces it false.
    fn subcircuit_output_equivalences(&mut self) -> io::Result<()> {
        self.w.comment("Subcircuit output equivalences")?;
        for q in 0..self.n_out {
            let value = self.spec.output_value_var(q);
            for i in 0..self.k {
                let var = self.w.fresh();
                self.w.conditional_equivalence(
                    var,
                    lit(self.output_vars[i][q]),
                    lit(self.gate_var(i)),
                    lit(value),
                )?;
                self.constraints.push(var);
            }
            if self.opts.inputs_as_outputs {
                for i in 0..self.n_in {
                    let var = self.w.fresh();
                    self.w.conditional_equivalence(
                        var,
                        lit(self.output_vars[self.k + i][q]),
                        lit(self.spec.candidate_inputs()[i]),
                        lit(value),
                    )?;
                    self.constraints.push(var);
                }
            }
            if self.opts.constants_as_outputs {
                let last = self.output_vars.len() - 1;
                let clause = [neg(self.output_vars[last][q]), neg(value)];
                self.push_or_constraint(&clause)?;
            }
        }
        Ok(())
    }
}

/// Advance `idx` to the next strictly increasing r-combination over `0..m`;
/// false when exhausted.
fn next_combination(idx: &mut [usize], m: usize) -> bool {
    let r = idx.len();
    let mut i = r;
    while i > 0 {
        i -= 1;
        if idx[i] < m - (r - i) {
            idx[i] += 1;
            for j in i + 1..r {
                idx[j] = idx[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_combination() {
        let mut combos = vec![];
        let mut idx = vec![0usize, 1];
        loop {
            combos.push(idx.clone());
            if !next_combination(&mut idx, 4) {
                break;
            }
        }
        assert_eq!(
            combos,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn test_next_combination_full_width() {
        let mut idx = vec![0usize, 1, 2];
        assert!(!next_combination(&mut idx, 3));
    }

    #[test]
    fn test_options_symmetry_toggle() {
        let opts = EncoderOptions::default();
        assert!(opts.symmetry_breaking_used());
        let relaxed = opts.without_restrictive_symmetry_breaking();
        assert!(!relaxed.no_reapplication);
        assert!(relaxed.ordered_steps);
        assert!(relaxed.all_steps);
    }
}
