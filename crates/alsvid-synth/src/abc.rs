//! External ABC post-optimisation.
//!
//! The circuit is piped through the ABC binary: one preprocessing pass,
//! then the optimisation script re-applied while the reported gate count
//! keeps shrinking. The caller adopts the result only if it is strictly
//! smaller than the current circuit.

use std::process::Command;

use tracing::{info, warn};

use alsvid_ir::Circuit;

use crate::config::Config;
use crate::error::SynthResult;

/// Run ABC over the circuit. Returns the optimised circuit, or `None` when
/// ABC's output could not be interpreted.
pub fn optimise(circuit: &Circuit, cfg: &Config) -> SynthResult<Option<Circuit>> {
    let suffix = if cfg.synthesise_aig { ".aig" } else { ".blif" };
    let input = tempfile::Builder::new().suffix(suffix).tempfile()?;
    alsvid_io::write_circuit(input.path(), circuit)?;

    let read_cmd = if cfg.synthesise_aig {
        "read_aiger"
    } else {
        "read_blif"
    };
    let write_cmd = if cfg.synthesise_aig {
        "write_aiger"
    } else {
        "write_blif"
    };

    let mut best = tempfile::Builder::new().suffix(suffix).tempfile()?;
    let mut scratch = tempfile::Builder::new().suffix(suffix).tempfile()?;

    let initial = format!(
        "{read_cmd} {}; {}; {}; {write_cmd} {}; print_stats",
        input.path().display(),
        cfg.abc_preprocess_cmds,
        cfg.abc_cmds,
        best.path().display(),
    );
    let output = run_abc(cfg, &initial)?;
    let Some(mut best_count) = parse_gate_count(&output) else {
        warn!("could not read a gate count from ABC output");
        return Ok(None);
    };

    let mut applications = 1;
    loop {
        let command = format!(
            "{read_cmd} {}; {}; {write_cmd} {}; print_stats",
            best.path().display(),
            cfg.abc_cmds,
            scratch.path().display(),
        );
        let output = run_abc(cfg, &command)?;
        applications += 1;
        let Some(count) = parse_gate_count(&output) else {
            warn!("could not read a gate count from ABC output");
            return Ok(None);
        };
        if count < best_count {
            best_count = count;
            std::mem::swap(&mut best, &mut scratch);
        } else {
            break;
        }
    }
    info!(applications, gate_count = best_count, "ABC finished");

    let optimised = alsvid_io::read_circuit(best.path(), false)?;
    Ok(Some(optimised))
}

fn run_abc(cfg: &Config, command: &str) -> SynthResult<String> {
    let output = Command::new(&cfg.abc_path).args(["-c", command]).output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pull the gate count out of `print_stats` output. The optimisation
/// script (fraig, rewrite, resub, balance, dc2) keeps the network in AIG
/// form regardless of the requested file format, so the count is always
/// reported as `and = N`.
fn parse_gate_count(output: &str) -> Option<usize> {
    let needle = "and";
    let mut rest = output;
    while let Some(pos) = rest.find(needle) {
        let after = rest[pos + needle.len()..].trim_start();
        if let Some(tail) = after.strip_prefix('=') {
            let digits: String = tail
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if !digits.is_empty() {
                return digits.parse().ok();
            }
        }
        rest = &rest[pos + needle.len()..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gate_count() {
        let stats = "top : i/o = 8/4  lat = 0  and = 123  lev = 9\n";
        assert_eq!(parse_gate_count(stats), Some(123));
    }

    #[test]
    fn test_parse_gate_count_ignores_netlist_field() {
        // The count is always the AIG one; a node count alone is not
        // usable.
        let stats = "top : i/o = 8/4  lat = 0  nd = 57  edge = 120\n";
        assert_eq!(parse_gate_count(stats), None);
    }

    #[test]
    fn test_parse_gate_count_missing() {
        assert_eq!(parse_gate_count("no stats here"), None);
    }
}
