//! Identifier types for kinetic schemes.

use std::fmt;

/// Index of a species in its scheme.
///
/// Species are numbered in declaration order; the same index is the
/// species' equation row and its column in the Newton system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeciesId(pub usize);

impl SpeciesId {
    /// Raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// A species with its stoichiometric coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stoich {
    pub species: SpeciesId,
    pub coeff: u32,
}

impl fmt::Display for Stoich {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coeff == 1 {
            write!(f, "{}", self.species)
        } else {
            write!(f, "{}{}", self.coeff, self.species)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SpeciesId(3).to_string(), "S3");
        let s = Stoich {
            species: SpeciesId(1),
            coeff: 2,
        };
        assert_eq!(s.to_string(), "2S1");
    }
}
