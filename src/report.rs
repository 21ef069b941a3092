//! Tab-separated output for the CLI frontend.

use std::io::Write;

use crate::error::{KineticError, Result};
use crate::solver::TimeCourse;

fn output_error(e: std::io::Error) -> KineticError {
    KineticError::OutputError {
        message: e.to_string(),
    }
}

/// Write a time course as one row per sample: `t` then each species.
pub fn write_time_course<W: Write>(out: &mut W, names: &[String], course: &TimeCourse) -> Result<()> {
    write!(out, "t").map_err(output_error)?;
    for name in names {
        write!(out, "\t{}", name).map_err(output_error)?;
    }
    writeln!(out).map_err(output_error)?;

    for (t, row) in course.times.iter().zip(&course.states) {
        write!(out, "{}", t).map_err(output_error)?;
        for value in row {
            write!(out, "\t{:.9e}", value).map_err(output_error)?;
        }
        writeln!(out).map_err(output_error)?;
    }
    out.flush().map_err(output_error)
}

/// Write a steady state as one `species<TAB>value` row per species.
pub fn write_steady_state<W: Write>(out: &mut W, names: &[String], states: &[f64]) -> Result<()> {
    writeln!(out, "species\tvalue").map_err(output_error)?;
    for (name, value) in names.iter().zip(states) {
        writeln!(out, "{}\t{:.9e}", name, value).map_err(output_error)?;
    }
    out.flush().map_err(output_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["C".to_string(), "O".to_string()]
    }

    #[test]
    fn test_write_time_course() {
        let course = TimeCourse {
            times: vec![0.0, 0.5],
            states: vec![vec![1.0, 0.0], vec![0.75, 0.25]],
        };
        let mut out = Vec::new();
        write_time_course(&mut out, &names(), &course).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t\tC\tO");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("0.5\t7.5"));
        assert_eq!(lines[2].split('\t').count(), 3);
    }

    #[test]
    fn test_write_steady_state() {
        let mut out = Vec::new();
        write_steady_state(&mut out, &names(), &[0.25, 0.75]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "species\tvalue");
        assert_eq!(lines[1], "C\t2.500000000e-1");
    }
}
