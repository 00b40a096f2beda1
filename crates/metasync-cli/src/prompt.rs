// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive confirmation on the console.

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use metasync_engine::{Decision, DecisionPolicy, Question};

/// Asks the operator on stderr/stdin. Concurrent workflows take turns so
/// their questions never interleave.
#[derive(Debug, Default)]
pub struct ConsolePolicy {
    turn: Mutex<()>,
}

impl DecisionPolicy for ConsolePolicy {
    fn decide(&self, subject: &str, question: Question) -> Decision {
        tokio::task::block_in_place(|| {
            let _turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
            let default = question.default_decision();
            let hint = match default {
                Decision::Proceed => "[Y/n]",
                Decision::Abort => "[y/N]",
            };

            let mut stderr = io::stderr().lock();
            // A failed prompt write still leaves the answer to stdin.
            if let Err(e) = write!(stderr, "{subject}: {question}? {hint} ")
                .and_then(|()| stderr.flush())
            {
                debug!(error = %e, "could not write prompt");
            }

            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => Decision::Abort,
                Ok(_) => parse_answer(&line, default),
            }
        })
    }
}

fn parse_answer(line: &str, default: Decision) -> Decision {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => Decision::Proceed,
        _ => Decision::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert_eq!(parse_answer("\n", Decision::Proceed), Decision::Proceed);
        assert_eq!(parse_answer("\n", Decision::Abort), Decision::Abort);
        assert_eq!(parse_answer("Yes\n", Decision::Abort), Decision::Proceed);
        assert_eq!(parse_answer("n\n", Decision::Proceed), Decision::Abort);
        assert_eq!(parse_answer("maybe\n", Decision::Proceed), Decision::Abort);
    }
}
