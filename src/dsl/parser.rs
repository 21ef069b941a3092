//! Parser for the scheme language.

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{KineticError, Result};

/// Line-oriented parser for scheme files.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire scheme description.
    pub fn parse(&mut self) -> Result<SchemeAst> {
        let mut ast = SchemeAst::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Tilde => {
                    let reaction = self.parse_reaction()?;
                    ast.reactions.push(reaction);
                }
                _ => {
                    return Err(KineticError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }
            self.end_of_line()?;
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(KineticError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => self.advance(),
            TokenKind::Eof => Ok(()),
            _ => Err(KineticError::parse(
                self.current.line,
                format!("unexpected {:?} at end of line", self.current.text),
            )),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| KineticError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    fn parse_directive(&mut self, ast: &mut SchemeAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".state" | ".states" => {
                let first = self.expect(TokenKind::Identifier)?;
                ast.species.push(SpeciesDecl {
                    name: first.text,
                    line,
                });
                while self.current.kind == TokenKind::Identifier {
                    ast.species.push(SpeciesDecl {
                        name: self.current.text.clone(),
                        line,
                    });
                    self.advance()?;
                }
            }
            ".param" => {
                let name = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Equals)?;
                let value = self.number()?;
                ast.params.push(ParamDef { name, value, line });
            }
            ".init" => {
                let name = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Equals)?;
                let value = self.number()?;
                ast.inits.push(InitDef { name, value, line });
            }
            ".conserve" => {
                let terms = self.parse_terms()?;
                self.expect(TokenKind::Equals)?;
                let total = self.number()?;
                ast.conserves.push(ConserveDef { terms, total, line });
            }
            _ => {
                return Err(KineticError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    /// `[coeff] name { '+' [coeff] name }`
    fn parse_terms(&mut self) -> Result<Vec<Term>> {
        let mut terms = vec![self.parse_term()?];
        while self.current.kind == TokenKind::Plus {
            self.advance()?;
            terms.push(self.parse_term()?);
        }
        Ok(terms)
    }

    fn parse_term(&mut self) -> Result<Term> {
        let coeff = if self.current.kind == TokenKind::Number {
            self.number()?
        } else {
            1.0
        };
        let species = self.expect(TokenKind::Identifier)?.text;
        Ok(Term { coeff, species })
    }

    fn parse_rate(&mut self) -> Result<RateExpr> {
        match self.current.kind {
            TokenKind::Number => Ok(RateExpr::Value(self.number()?)),
            TokenKind::Identifier => {
                let name = self.current.text.clone();
                self.advance()?;
                Ok(RateExpr::Param(name))
            }
            _ => Err(KineticError::parse(
                self.current.line,
                format!("expected rate constant, got {:?}", self.current.text),
            )),
        }
    }

    fn parse_reaction(&mut self) -> Result<ReactionDef> {
        let line = self.expect(TokenKind::Tilde)?.line;
        let reactants = self.parse_terms()?;

        let reversible = match self.current.kind {
            TokenKind::Reversible => true,
            TokenKind::Forward => false,
            _ => {
                return Err(KineticError::parse(
                    line,
                    format!("expected '<->' or '->', got {:?}", self.current.text),
                ))
            }
        };
        self.advance()?;
        let products = self.parse_terms()?;

        self.expect(TokenKind::OpenParen)?;
        let forward = self.parse_rate()?;
        let backward = if self.current.kind == TokenKind::Comma {
            self.advance()?;
            Some(self.parse_rate()?)
        } else {
            None
        };
        self.expect(TokenKind::CloseParen)?;

        match (reversible, &backward) {
            (true, None) => Err(KineticError::parse(
                line,
                "reversible reaction needs forward and backward rates",
            )),
            (false, Some(_)) => Err(KineticError::parse(
                line,
                "irreversible reaction takes a single rate",
            )),
            _ => Ok(ReactionDef {
                reactants,
                products,
                reversible,
                forward,
                backward,
                line,
            }),
        }
    }
}
