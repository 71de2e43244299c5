use crate::*;
use lazy_static::lazy_static;
use std::collections::HashSet;
use tracing::*;

/// Options for [`get_parent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentOptions {
    /// Neutralize the parent with a balanced [`Uncharger`].
    pub neutralize: bool,
    /// Compute the exclusion flag and stop early when it is set.
    pub check_exclusion: bool,
}

impl Default for ParentOptions {
    fn default() -> Self {
        Self {
            neutralize: true,
            check_exclusion: true,
        }
    }
}

/// Elements allowed in a molecule that is not excluded:
/// H B C N O F Si P S Cl Se Br I.
const ALLOWED_ELEMENTS: [u8; 13] = [1, 5, 6, 7, 8, 9, 14, 15, 16, 17, 34, 35, 53];

/// Metals tolerated when they appear as isolated counter ions.
const COUNTER_ION_ELEMENTS: [u8; 11] = [3, 11, 19, 37, 55, 12, 20, 38, 56, 30, 13];

const MAX_BORON_ATOMS: usize = 7;

const SALT_SMILES: &[&str] = &[
    "[Li+]", "[Na+]", "[K+]", "[Rb+]", "[Cs+]", "[Mg+2]", "[Ca+2]", "[Sr+2]", "[Ba+2]",
    "[Zn+2]", "[Al+3]", "N", "F", "Cl", "Br", "I", "OS(=O)(=O)O", "O[N+](=O)[O-]",
    "[O-][N+](=O)[O-]", "OP(=O)(O)O", "OCl(=O)(=O)=O", "OC(=O)C(F)(F)F", "CS(=O)(=O)O",
    "OC(=O)C(=O)O",
];

const SOLVENT_SMILES: &[&str] = &[
    "O", "CO", "CCO", "CC(C)O", "CS(C)=O", "CC(C)=O", "ClCCl", "ClC(Cl)Cl", "CC#N",
    "C1CCOC1", "CCOCC", "CN(C)C=O", "CCOC(C)=O",
];

fn fragment_keys(table: &[&str]) -> HashSet<String> {
    table
        .iter()
        .filter_map(|smiles| parse_smiles(smiles).ok())
        .map(|mol| fragment_key(&mol))
        .collect()
}

lazy_static! {
    static ref SALTS: HashSet<String> = fragment_keys(SALT_SMILES);
    static ref SOLVENTS: HashSet<String> = fragment_keys(SOLVENT_SMILES);
}

/// Fragments are compared by the canonical SMILES of their fully uncharged
/// form, so `[Cl-]` matches `Cl`.
fn fragment_key(fragment: &Molecule) -> String {
    let graph = remove_hydrogens(fragment.graph());
    Uncharger::forced()
        .uncharge(&Molecule::new(graph))
        .to_smiles()
}

/// The molecule with every isotope label cleared; labelled hydrogen atoms
/// are then folded into their neighbours.
pub fn isotope_parent(mol: &Molecule) -> Molecule {
    let mut graph = mol.graph().clone();
    for atom in graph.node_weights_mut() {
        atom.isotope = 0;
    }
    Molecule::new(remove_hydrogens(&graph))
}

/// Whether a molecule should be dropped from further processing: it
/// contains an element outside the allowed organic set (metals bonded to
/// anything, or not on the counter ion list) or more than seven boron atoms.
pub fn exclusion_flag(mol: &Molecule) -> bool {
    let graph = mol.graph();
    let boron = graph
        .node_weights()
        .filter(|atom| atom.element == Element::B)
        .count();
    if boron > MAX_BORON_ATOMS {
        debug!("Excluding molecule with {boron} boron atoms");
        return true;
    }
    graph.node_indices().any(|node| {
        let number = graph[node].element.atomic_number();
        if ALLOWED_ELEMENTS.contains(&number) {
            return false;
        }
        let isolated = graph.neighbors(node).next().is_none();
        let excluded = !(isolated && COUNTER_ION_ELEMENTS.contains(&number));
        if excluded {
            debug!("Excluding molecule containing {}", graph[node].element);
        }
        excluded
    })
}

/// Remove every fragment whose key is in `table`, unless that would remove
/// all of them.
fn strip_fragments(mol: &Molecule, table: &HashSet<String>, kind: &str) -> Molecule {
    let fragments = mol.fragments();
    let (removed, kept): (Vec<Molecule>, Vec<Molecule>) = fragments
        .into_iter()
        .partition(|fragment| table.contains(&fragment_key(fragment)));
    if removed.is_empty() || kept.is_empty() {
        return Molecule::combine(removed.iter().chain(kept.iter()));
    }
    for fragment in &removed {
        debug!("Stripped {kind} fragment {}", fragment.to_smiles());
    }
    Molecule::combine(kept.iter())
}

/// Solvent fragments are removed first, then salt fragments.
pub fn fragment_parent(mol: &Molecule) -> Molecule {
    let without_solvents = strip_fragments(mol, &SOLVENTS, "solvent");
    strip_fragments(&without_solvents, &SALTS, "salt")
}

/// Extract the parent structure of a standardized molecule.
///
/// # Arguments
///
/// * `mol` - A standardized molecule.
/// * `options` - Whether to neutralize and whether to check for exclusion.
///
/// # Returns
///
/// * `(parent, excluded)` - When `excluded` is true the isotope parent is
///   returned as is and no further work was done.
pub fn get_parent(mol: &Molecule, options: &ParentOptions) -> (Molecule, bool) {
    let parent = isotope_parent(mol);
    if options.check_exclusion && exclusion_flag(&parent) {
        return (parent, true);
    }
    let mut parent = fragment_parent(&parent);
    if options.neutralize {
        parent = Uncharger::new().uncharge(&parent);
    }
    (parent, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_of(smiles: &str) -> (String, bool) {
        let mol = standardize(&parse_smiles(smiles).unwrap()).unwrap();
        let (parent, excluded) = get_parent(&mol, &ParentOptions::default());
        (parent.to_smiles(), excluded)
    }

    #[test]
    fn test_salts_are_stripped() {
        init_logging("trace");
        assert_eq!(parent_of("CC(=O)[O-].[Na+]"), ("CC(=O)O".to_string(), false));
        assert_eq!(parent_of("C[NH3+].[Cl-]"), ("CN".to_string(), false));
        assert_eq!(parent_of("CCN.OS(=O)(=O)O"), ("CCN".to_string(), false));
        assert_eq!(
            parent_of("CCCC(=O)O.OC(=O)C(F)(F)F"),
            ("CCCC(=O)O".to_string(), false)
        );
    }

    #[test]
    fn test_solvents_are_stripped() {
        init_logging("trace");
        assert_eq!(parent_of("c1ccccc1O.O.O"), ("Oc1ccccc1".to_string(), false));
        assert_eq!(parent_of("CCCCCC.CS(C)=O"), ("CCCCCC".to_string(), false));
    }

    #[test]
    fn test_pure_salt_kept_whole() {
        init_logging("trace");
        let (smiles, excluded) = parent_of("[Na+].[Cl-]");
        assert!(!excluded);
        assert_eq!(smiles, "[Cl-].[Na+]");
        assert_eq!(parent_of("O"), ("O".to_string(), false));
    }

    #[test]
    fn test_isotope_parent() {
        init_logging("trace");
        let mol = parse_smiles("[13CH3][2H]").unwrap();
        assert_eq!(isotope_parent(&mol).to_smiles(), "C");
    }

    #[test]
    fn test_exclusion() {
        init_logging("trace");
        assert!(parent_of("CC(=O)O.[Fe]").1);
        assert!(parent_of("C[Hg]C").1);
        assert!(parent_of("BBBBBBBB").1);
        assert!(!parent_of("CC(=O)[O-].[K+]").1);
        assert!(!parent_of("C[Si](C)(C)C").1);

        let mol = parse_smiles("CC(=O)O.[Fe]").unwrap();
        let options = ParentOptions {
            check_exclusion: false,
            ..Default::default()
        };
        let (_, excluded) = get_parent(&mol, &options);
        assert!(!excluded);
    }
}
