//! External QBF solver invocation.
//!
//! The solver is a child process given the encoding file as a positional
//! argument (plus a solver-specific flag for partial-assignment output).
//! Exit code 10 means satisfiable with a certificate, 20 unsatisfiable,
//! anything else is an error. Standard output is redirected into an
//! unlinked temporary file so large certificates cannot deadlock the pipe;
//! the child is polled and killed once the budget elapses.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{QbfError, QbfResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The supported QBF solvers and their command-line conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QbfSolver {
    /// qfun: no extra flag, lowercase `v` assignment line.
    Qfun,
    /// quabs: `--partial-assignment`, uppercase `V` line.
    Quabs,
    /// miniQU: `-cert`, uppercase `V` line.
    MiniQu,
}

impl QbfSolver {
    /// The conventional binary name, used when no path is configured.
    pub fn default_command(self) -> &'static str {
        match self {
            QbfSolver::Qfun => "qfun",
            QbfSolver::Quabs => "quabs",
            QbfSolver::MiniQu => "miniQU",
        }
    }

    fn arguments(self, encoding: &Path) -> Vec<std::ffi::OsString> {
        let mut args = vec![];
        match self {
            QbfSolver::Qfun => {}
            QbfSolver::Quabs => args.push("--partial-assignment".into()),
            QbfSolver::MiniQu => args.push("-cert".into()),
        }
        args.push(encoding.as_os_str().to_owned());
        args
    }
}

/// A parsed satisfying assignment: variable to value.
pub type Assignment = FxHashMap<u32, bool>;

/// Solver verdict for one encoding.
#[derive(Debug)]
pub enum SolverOutcome {
    /// Satisfiable; the assignment covers the outermost existentials.
    Realisable(Assignment),
    /// Unsatisfiable.
    Unrealisable,
}

/// One completed solver invocation.
#[derive(Debug)]
pub struct SolverRun {
    /// The verdict.
    pub outcome: SolverOutcome,
    /// Wall-clock solving time.
    pub duration: Duration,
}

/// Run `command` on `encoding` with an optional wall-clock budget.
///
/// On timeout the child is killed and [`QbfError::Timeout`] returned; exit
/// codes other than 10/20 surface as [`QbfError::SolverFailed`].
pub fn solve(
    command: &Path,
    solver: QbfSolver,
    encoding: &Path,
    timeout: Option<Duration>,
) -> QbfResult<SolverRun> {
    let mut stdout_file = tempfile::tempfile()?;
    let mut stderr_file = tempfile::tempfile()?;
    let mut child = Command::new(command)
        .args(solver.arguments(encoding))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(budget) = timeout {
            if start.elapsed() > budget {
                child.kill()?;
                child.wait()?;
                debug!(?budget, "solver killed after timeout");
                return Err(QbfError::Timeout(budget));
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    let duration = start.elapsed();

    match status.code() {
        Some(10) => {
            let mut output = String::new();
            stdout_file.seek(SeekFrom::Start(0))?;
            stdout_file.read_to_string(&mut output)?;
            let assignment = parse_assignment(&output)?;
            debug!(vars = assignment.len(), ?duration, "solver: realisable");
            Ok(SolverRun {
                outcome: SolverOutcome::Realisable(assignment),
                duration,
            })
        }
        Some(20) => {
            debug!(?duration, "solver: unrealisable");
            Ok(SolverRun {
                outcome: SolverOutcome::Unrealisable,
                duration,
            })
        }
        code => {
            let mut stderr = String::new();
            stderr_file.seek(SeekFrom::Start(0))?;
            stderr_file.read_to_string(&mut stderr)?;
            Err(QbfError::SolverFailed { code, stderr })
        }
    }
}

/// Parse the assignment line: a leading `v` or `V`, then space-separated
/// integer literals terminated by 0. Positive means true.
fn parse_assignment(output: &str) -> QbfResult<Assignment> {
    let mut assignment = Assignment::default();
    let mut found = false;
    for line in output.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
        else {
            continue;
        };
        found = true;
        for token in rest.split_whitespace() {
            match token.parse::<i64>() {
                Ok(0) => break,
                Ok(literal) => {
                    assignment.insert(literal.unsigned_abs() as u32, literal > 0);
                }
                // Trailing solver chatter after the literals.
                Err(_) => break,
            }
        }
    }
    if !found {
        return Err(QbfError::InvalidCertificate(
            "no assignment line in solver output".into(),
        ));
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_qfun_style() {
        let a = parse_assignment("some preamble\nv 1 -2 3 0\n").unwrap();
        assert_eq!(a.get(&1), Some(&true));
        assert_eq!(a.get(&2), Some(&false));
        assert_eq!(a.get(&3), Some(&true));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_parse_assignment_quabs_style() {
        let a = parse_assignment("V -4 5 0\nr SAT\n").unwrap();
        assert_eq!(a.get(&4), Some(&false));
        assert_eq!(a.get(&5), Some(&true));
    }

    #[test]
    fn test_parse_assignment_missing() {
        assert!(matches!(
            parse_assignment("s cnf 1\n"),
            Err(QbfError::InvalidCertificate(_))
        ));
    }

    #[cfg(unix)]
    mod with_stub_solver {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn stub(script: &str) -> (tempfile::TempDir, std::path::PathBuf) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("solver.sh");
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "#!/bin/sh\n{script}").unwrap();
            let mut perm = f.metadata().unwrap().permissions();
            perm.set_mode(0o755);
            std::fs::set_permissions(&path, perm).unwrap();
            (dir, path)
        }

        fn dummy_encoding(dir: &tempfile::TempDir) -> std::path::PathBuf {
            let path = dir.path().join("enc.qcir");
            std::fs::write(&path, "#QCIR-G14\n").unwrap();
            path
        }

        #[test]
        fn test_sat_with_certificate() {
            let (dir, solver) = stub("echo 'v 1 -2 0'; exit 10");
            let enc = dummy_encoding(&dir);
            let run = solve(&solver, QbfSolver::Qfun, &enc, None).unwrap();
            match run.outcome {
                SolverOutcome::Realisable(a) => {
                    assert_eq!(a.get(&1), Some(&true));
                    assert_eq!(a.get(&2), Some(&false));
                }
                SolverOutcome::Unrealisable => panic!("expected realisable"),
            }
        }

        #[test]
        fn test_unsat() {
            let (dir, solver) = stub("exit 20");
            let enc = dummy_encoding(&dir);
            let run = solve(&solver, QbfSolver::Qfun, &enc, None).unwrap();
            assert!(matches!(run.outcome, SolverOutcome::Unrealisable));
        }

        #[test]
        fn test_error_exit_code() {
            let (dir, solver) = stub("echo 'boom' >&2; exit 1");
            let enc = dummy_encoding(&dir);
            let err = solve(&solver, QbfSolver::Qfun, &enc, None).unwrap_err();
            match err {
                QbfError::SolverFailed { code, stderr } => {
                    assert_eq!(code, Some(1));
                    assert!(stderr.contains("boom"));
                }
                other => panic!("unexpected error {other}"),
            }
        }

        #[test]
        fn test_timeout_kills_child() {
            let (dir, solver) = stub("sleep 5; exit 10");
            let enc = dummy_encoding(&dir);
            let start = Instant::now();
            let err = solve(
                &solver,
                QbfSolver::Qfun,
                &enc,
                Some(Duration::from_millis(200)),
            )
            .unwrap_err();
            assert!(matches!(err, QbfError::Timeout(_)));
            assert!(start.elapsed() < Duration::from_secs(4));
        }
    }
}
