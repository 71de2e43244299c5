use crate::*;
use std::cmp::{Ordering, Reverse};
use tracing::*;

/// Picks a single fragment out of a disconnected molecule.
///
/// The winner has the most atoms; ties go to the higher molecular weight
/// and then to the alphabetically first canonical SMILES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LargestFragmentChooser {
    /// Ignore hydrogens when counting atoms.
    pub count_heavy_atoms_only: bool,
    /// Rank fragments containing carbon above all others.
    pub prefer_organic: bool,
}

impl LargestFragmentChooser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chosen fragment without properties. An empty molecule
    /// comes back empty.
    pub fn choose(&self, mol: &Molecule) -> Molecule {
        let fragments = mol.fragments();
        let scored: Vec<(FragmentScore, Molecule)> = fragments
            .into_iter()
            .map(|fragment| (self.score(&fragment), fragment))
            .collect();
        match scored.into_iter().max_by(|a, b| a.0.compare(&b.0)) {
            Some((score, fragment)) => {
                debug!(
                    "Chose fragment {} with {} atoms",
                    score.smiles.0, score.atoms
                );
                fragment
            }
            None => Molecule::default(),
        }
    }

    fn score(&self, fragment: &Molecule) -> FragmentScore {
        let organic = self.prefer_organic
            && fragment
                .graph()
                .node_weights()
                .any(|atom| atom.element == Element::C);
        let atoms = if self.count_heavy_atoms_only {
            fragment.heavy_atom_count()
        } else {
            fragment.total_atom_count()
        };
        FragmentScore {
            organic,
            atoms,
            // rounded so that isomers compare equal
            weight: (fragment.molecular_weight() * 1e4).round() as i64,
            smiles: Reverse(fragment.to_smiles()),
        }
    }
}

/// Ordering key of a fragment; larger is better.
struct FragmentScore {
    organic: bool,
    atoms: usize,
    weight: i64,
    smiles: Reverse<String>,
}

impl FragmentScore {
    fn compare(&self, other: &Self) -> Ordering {
        self.organic
            .cmp(&other.organic)
            .then(self.atoms.cmp(&other.atoms))
            .then(self.weight.cmp(&other.weight))
            .then(self.smiles.cmp(&other.smiles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chosen(chooser: LargestFragmentChooser, smiles: &str) -> String {
        chooser.choose(&parse_smiles(smiles).unwrap()).to_smiles()
    }

    #[test]
    fn test_keeps_largest() {
        init_logging("trace");
        let chooser = LargestFragmentChooser::new();
        assert_eq!(chooser.choose(&Molecule::default()).atom_count(), 0);
        assert_eq!(chosen(chooser, "CC(=O)[O-].[Na+]"), "CC(=O)[O-]");
        assert_eq!(chosen(chooser, "CCO"), "CCO");
        assert_eq!(chosen(chooser, "c1ccccc1.CCCCCC"), "CCCCCC");
    }

    #[test]
    fn test_heavy_atoms_only() {
        let chooser = LargestFragmentChooser {
            count_heavy_atoms_only: true,
            ..Default::default()
        };
        // six heavy atoms each, hexane wins on weight
        assert_eq!(chosen(chooser, "c1ccccc1.CCCCCC"), "CCCCCC");
        // with heavy atoms only, bromide outweighs methane at one atom each
        assert_eq!(chosen(chooser, "C.[Br-]"), "[Br-]");
        assert_eq!(chosen(LargestFragmentChooser::new(), "C.[Br-]"), "C");
    }

    #[test]
    fn test_prefer_organic() {
        let chooser = LargestFragmentChooser {
            prefer_organic: true,
            ..Default::default()
        };
        assert_eq!(chosen(chooser, "C.OS(=O)(=O)O"), "C");
        assert_eq!(
            chosen(LargestFragmentChooser::new(), "C.OS(=O)(=O)O"),
            "O=S(=O)(O)O"
        );
    }

    #[test]
    fn test_ties_use_smiles() {
        // same atom count and weight: alphabetically first SMILES wins
        assert_eq!(chosen(LargestFragmentChooser::new(), "CCO.COC"), "CCO");
    }
}
