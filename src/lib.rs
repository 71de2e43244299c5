use petgraph::graph::UnGraph;
use tracing::level_filters::LevelFilter;

mod element;
pub use element::*;

mod molecule;
pub use molecule::*;

mod parse;
pub use parse::*;

mod kekulize;
pub use kekulize::*;

mod aromaticity;
pub use aromaticity::*;

mod canon;
pub use canon::*;

mod standardize;
pub use standardize::*;

mod normalizer;
pub use normalizer::*;

mod records;
pub use records::*;

/// A single atom in a molecule graph.
///
/// `hydrogens` counts the hydrogens folded into this atom. Hydrogens written
/// as explicit `[H]` atoms are separate nodes until standardization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub charge: i8,
    pub isotope: u16,
    pub hydrogens: u8,
    pub aromatic: bool,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            charge: 0,
            isotope: 0,
            hydrogens: 0,
            aromatic: false,
        }
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_hydrogens(mut self, hydrogens: u8) -> Self {
        self.hydrogens = hydrogens;
        self
    }

    pub fn with_isotope(mut self, isotope: u16) -> Self {
        self.isotope = isotope;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    /// Valence contributed to each end. Aromatic bonds count as one; the
    /// extra pi electron is accounted for on the atom.
    pub fn order(self) -> u8 {
        match self {
            Bond::Single | Bond::Aromatic => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
        }
    }
}

pub type MoleculeGraph = UnGraph<Atom, Bond>;

/// Install a `tracing` subscriber that prints events up to `level`
/// ("error", "warn", "info", "debug" or "trace").
///
/// Calling this more than once is harmless; only the first call installs.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .try_init();
}
