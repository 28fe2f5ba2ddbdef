//! QCIR-G14 emission.
//!
//! A thin writer over any `io::Write` sink that owns the fresh-variable
//! counter. Gates are written as `v = and(lits)` / `v = or(lits)`; XOR and
//! (conditional) equivalence are expanded into and/or pairs so the output
//! stays within the gate basis every supported solver accepts.

use std::io::{self, Write};

use alsvid_ir::Cover;

/// A positive literal for a variable or defined gate.
pub fn lit(var: u32) -> i64 {
    i64::from(var)
}

/// A negative literal.
pub fn neg(var: u32) -> i64 {
    -i64::from(var)
}

/// Streaming QCIR writer with fresh-variable allocation.
pub struct QcirWriter<W: Write> {
    out: W,
    last_var: u32,
    comments: bool,
}

impl<W: Write> QcirWriter<W> {
    /// Create a writer; fresh variables start above `last_used_var`.
    pub fn new(out: W, last_used_var: u32, comments: bool) -> Self {
        Self {
            out,
            last_var: last_used_var,
            comments,
        }
    }

    /// Allocate a fresh variable.
    pub fn fresh(&mut self) -> u32 {
        self.last_var += 1;
        self.last_var
    }

    /// The last variable handed out.
    pub fn last_var(&self) -> u32 {
        self.last_var
    }

    /// The format header line.
    pub fn header(&mut self) -> io::Result<()> {
        writeln!(self.out, "#QCIR-G14")
    }

    /// An `exists(...)` prefix block; skipped when empty.
    pub fn exists(&mut self, vars: impl IntoIterator<Item = u32>) -> io::Result<()> {
        self.quantifier("exists", vars)
    }

    /// A `forall(...)` prefix block; skipped when empty.
    pub fn forall(&mut self, vars: impl IntoIterator<Item = u32>) -> io::Result<()> {
        self.quantifier("forall", vars)
    }

    fn quantifier(&mut self, kind: &str, vars: impl IntoIterator<Item = u32>) -> io::Result<()> {
        let joined = join(vars.into_iter().map(i64::from));
        if joined.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "{kind}({joined})")
    }

    /// The `output(...)` line naming the top gate.
    pub fn output(&mut self, var: u32) -> io::Result<()> {
        writeln!(self.out, "output({var})")
    }

    /// `var = and(lits)`. Empty lits is the constant true.
    pub fn and(&mut self, var: u32, lits: &[i64]) -> io::Result<()> {
        writeln!(self.out, "{var} = and({})", join(lits.iter().copied()))
    }

    /// `var = or(lits)`. Empty lits is the constant false.
    pub fn or(&mut self, var: u32, lits: &[i64]) -> io::Result<()> {
        writeln!(self.out, "{var} = or({})", join(lits.iter().copied()))
    }

    /// `out = a xor b`, expanded into two ors and an and.
    pub fn xor(&mut self, out_var: u32, a: i64, b: i64) -> io::Result<()> {
        let or1 = self.fresh();
        self.or(or1, &[a, b])?;
        let or2 = self.fresh();
        self.or(or2, &[-a, -b])?;
        self.and(out_var, &[lit(or1), lit(or2)])
    }

    /// `out = (a == b)`.
    pub fn equivalence(&mut self, out_var: u32, a: i64, b: i64) -> io::Result<()> {
        self.xor(out_var, -a, b)
    }

    /// `out = cond -> (a == b)`.
    pub fn conditional_equivalence(
        &mut self,
        out_var: u32,
        cond: i64,
        a: i64,
        b: i64,
    ) -> io::Result<()> {
        let or1 = self.fresh();
        self.or(or1, &[-cond, -a, b])?;
        let or2 = self.fresh();
        self.or(or2, &[-cond, a, -b])?;
        self.and(out_var, &[lit(or1), lit(or2)])
    }

    /// Define `alias` from a two-level cover. Multi-row covers introduce one
    /// auxiliary gate per row.
    pub fn cover_gate(&mut self, alias: u32, cover: &Cover) -> io::Result<()> {
        match cover {
            Cover::SumOfProducts(rows) => match rows.as_slice() {
                [] => self.or(alias, &[]),
                [row] => self.and(alias, row),
                rows => {
                    let aux = self.row_gates(rows, true)?;
                    self.or(alias, &aux)
                }
            },
            Cover::ProductOfSums(rows) => match rows.as_slice() {
                [] => self.and(alias, &[]),
                [row] => self.or(alias, row),
                rows => {
                    let aux = self.row_gates(rows, false)?;
                    self.and(alias, &aux)
                }
            },
        }
    }

    fn row_gates(&mut self, rows: &[Vec<i64>], anded: bool) -> io::Result<Vec<i64>> {
        let mut aux = Vec::with_capacity(rows.len());
        for row in rows {
            let var = self.fresh();
            if anded {
                self.and(var, row)?;
            } else {
                self.or(var, row)?;
            }
            aux.push(lit(var));
        }
        Ok(aux)
    }

    /// A `#` comment line, when enabled.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        if self.comments {
            writeln!(self.out, "# {text}")?;
        }
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn join(lits: impl Iterator<Item = i64>) -> String {
    let mut s = String::new();
    for (i, l) in lits.enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        s.push_str(&l.to_string());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut QcirWriter<&mut Vec<u8>>)) -> String {
        let mut buf = vec![];
        let mut w = QcirWriter::new(&mut buf, 10, true);
        f(&mut w);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_gates() {
        let text = written(|w| {
            w.and(11, &[1, -2]).unwrap();
            w.or(12, &[]).unwrap();
        });
        assert_eq!(text, "11 = and(1, -2)\n12 = or()\n");
    }

    #[test]
    fn test_fresh_allocation() {
        let mut buf = vec![];
        let mut w = QcirWriter::new(&mut buf, 10, false);
        assert_eq!(w.fresh(), 11);
        assert_eq!(w.fresh(), 12);
        assert_eq!(w.last_var(), 12);
    }

    #[test]
    fn test_xor_expansion() {
        let text = written(|w| w.xor(20, 1, 2).unwrap());
        assert_eq!(text, "11 = or(1, 2)\n12 = or(-1, -2)\n20 = and(11, 12)\n");
    }

    #[test]
    fn test_conditional_equivalence() {
        let text = written(|w| w.conditional_equivalence(20, 5, 1, 2).unwrap());
        assert_eq!(
            text,
            "11 = or(-5, -1, 2)\n12 = or(-5, 1, -2)\n20 = and(11, 12)\n"
        );
    }

    #[test]
    fn test_cover_gate_multi_row() {
        use alsvid_ir::Cover;
        let cover = Cover::SumOfProducts(vec![vec![1, -2], vec![-1, 2]]);
        let text = written(|w| w.cover_gate(9, &cover).unwrap());
        assert_eq!(text, "11 = and(1, -2)\n12 = and(-1, 2)\n9 = or(11, 12)\n");
    }

    #[test]
    fn test_empty_quantifier_skipped() {
        let text = written(|w| {
            w.exists(std::iter::empty()).unwrap();
            w.forall([1, 2]).unwrap();
        });
        assert_eq!(text, "forall(1, 2)\n");
    }
}
