//! Abstract Syntax Tree types for the scheme language.

/// Complete AST of a parsed scheme file, in source order.
#[derive(Debug, Clone, Default)]
pub struct SchemeAst {
    /// `.state` declarations
    pub species: Vec<SpeciesDecl>,
    /// `.param` definitions
    pub params: Vec<ParamDef>,
    /// `.init` assignments
    pub inits: Vec<InitDef>,
    /// `~` reaction lines
    pub reactions: Vec<ReactionDef>,
    /// `.conserve` constraints
    pub conserves: Vec<ConserveDef>,
}

impl SchemeAst {
    /// Create a new empty AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A declared species.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesDecl {
    pub name: String,
    pub line: usize,
}

/// A named constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub value: f64,
    pub line: usize,
}

/// Initial value of a species.
#[derive(Debug, Clone, PartialEq)]
pub struct InitDef {
    pub name: String,
    pub value: f64,
    pub line: usize,
}

/// `coeff * species` on one side of a reaction or conservation law.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub coeff: f64,
    pub species: String,
}

/// A rate constant: literal or parameter reference.
#[derive(Debug, Clone, PartialEq)]
pub enum RateExpr {
    Value(f64),
    Param(String),
}

/// A reaction line.
///
/// ```text
/// ~ 2 A + B <-> C (kf, kb)
/// ~ C -> D (k)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionDef {
    pub reactants: Vec<Term>,
    pub products: Vec<Term>,
    /// `<->` rather than `->`
    pub reversible: bool,
    /// Forward rate
    pub forward: RateExpr,
    /// Backward rate, present exactly when `reversible`
    pub backward: Option<RateExpr>,
    pub line: usize,
}

/// `.conserve a A + b B = total`
#[derive(Debug, Clone, PartialEq)]
pub struct ConserveDef {
    pub terms: Vec<Term>,
    pub total: f64,
    pub line: usize,
}
