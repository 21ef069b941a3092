//! Description language for kinetic schemes.
//!
//! A small line-oriented language in the spirit of a KINETIC block. Each
//! line is a directive, a reaction or blank.
//!
//! # Grammar Overview
//!
//! ```text
//! scheme    = { line }
//! line      = comment | directive | reaction | empty
//! comment   = ('#' | ';') { any_char }
//! directive = ".state" name { name }
//!           | ".param" name '=' number
//!           | ".init" name '=' number
//!           | ".conserve" terms '=' number
//! reaction  = '~' terms arrow terms '(' rate [',' rate] ')'
//! arrow     = "<->" | "->"
//! terms     = term { '+' term }
//! term      = [number] name
//! rate      = number | name
//!
//! number    = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! name      = (letter | '_') { letter | digit | '_' }
//! ```
//!
//! A reversible reaction (`<->`) takes a forward and a backward rate, an
//! irreversible one (`->`) a single forward rate. Rates are literals or
//! names defined with `.param`. Species start at zero unless given an
//! `.init` value.
//!
//! # Example
//!
//! ```text
//! # Three-state channel
//! .state C1 C2 O
//! .param a = 0.4
//! .param b = 0.1
//! .init C1 = 1
//!
//! ~ C1 <-> C2 (a, b)
//! ~ C2 <-> O  (2.0, 0.5)
//! .conserve C1 + C2 + O = 1
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a scheme description string into an AST.
pub fn parse(input: &str) -> Result<SchemeAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a scheme file.
pub fn parse_file(path: &std::path::Path) -> Result<SchemeAst> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::KineticError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(std::path::Path::new("/nonexistent/scheme.kin")).unwrap_err();
        assert!(matches!(err, crate::error::KineticError::FileReadError { .. }));
    }

    #[test]
    fn test_parse_doc_example() {
        let input = "\
.state C1 C2 O
.param a = 0.4
.param b = 0.1
.init C1 = 1

~ C1 <-> C2 (a, b)
~ C2 <-> O  (2.0, 0.5)
.conserve C1 + C2 + O = 1
";
        let ast = parse(input).unwrap();
        assert_eq!(ast.species.len(), 3);
        assert_eq!(ast.reactions.len(), 2);
        assert_eq!(ast.conserves.len(), 1);
    }
}
