use crate::*;
use anyhow::Result;
use tracing::*;

/// The chemistry operations the normalizer is built from.
///
/// Every method returns a fresh molecule; implementations are not expected
/// to carry properties over.
pub trait Toolkit {
    fn canonical_tautomer(&self, mol: &Molecule) -> Result<Molecule>;
    fn standardize(&self, mol: &Molecule) -> Result<Molecule>;
    /// The parent structure and whether the molecule is excluded.
    fn parent(&self, mol: &Molecule) -> Result<(Molecule, bool)>;
    fn largest_fragment(&self, mol: &Molecule) -> Result<Molecule>;
    fn uncharge(&self, mol: &Molecule) -> Result<Molecule>;
}

/// The crate's own implementation of [`Toolkit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultToolkit {
    pub tautomers: TautomerEnumerator,
    pub parent: ParentOptions,
    pub chooser: LargestFragmentChooser,
    pub uncharger: Uncharger,
}

impl Toolkit for DefaultToolkit {
    fn canonical_tautomer(&self, mol: &Molecule) -> Result<Molecule> {
        Ok(self.tautomers.canonicalize(mol))
    }

    fn standardize(&self, mol: &Molecule) -> Result<Molecule> {
        standardize(mol)
    }

    fn parent(&self, mol: &Molecule) -> Result<(Molecule, bool)> {
        Ok(get_parent(mol, &self.parent))
    }

    fn largest_fragment(&self, mol: &Molecule) -> Result<Molecule> {
        Ok(self.chooser.choose(mol))
    }

    fn uncharge(&self, mol: &Molecule) -> Result<Molecule> {
        Ok(self.uncharger.uncharge(mol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub canonicalize_tautomer: bool,
    pub extract_largest_fragment: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            canonicalize_tautomer: true,
            extract_largest_fragment: true,
        }
    }
}

/// The outcome of normalizing one molecule.
#[derive(Debug, Clone)]
pub enum Normalized {
    Found(Molecule),
    /// The parent contained a disallowed component.
    Excluded,
}

impl Normalized {
    pub fn molecule(&self) -> Option<&Molecule> {
        match self {
            Normalized::Found(mol) => Some(mol),
            Normalized::Excluded => None,
        }
    }

    pub fn into_molecule(self) -> Option<Molecule> {
        match self {
            Normalized::Found(mol) => Some(mol),
            Normalized::Excluded => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Normalized::Excluded)
    }

    /// Canonical SMILES of the result, `None` when excluded.
    pub fn to_smiles(&self) -> Option<String> {
        self.molecule().map(Molecule::to_smiles)
    }
}

/// Runs the normalization pipeline over a [`Toolkit`].
#[derive(Debug, Clone, Default)]
pub struct MoleculeNormalizer<T: Toolkit = DefaultToolkit> {
    toolkit: T,
    options: NormalizeOptions,
}

impl MoleculeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Toolkit> MoleculeNormalizer<T> {
    pub fn with_toolkit(toolkit: T) -> Self {
        Self {
            toolkit,
            options: NormalizeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Normalize a molecule, keeping its properties and name.
    ///
    /// # Arguments
    ///
    /// * `mol` - The molecule to normalize. Its properties are copied before
    ///   any toolkit call.
    ///
    /// # Returns
    ///
    /// * `Normalized::Found` - The normalized molecule. Every property of the
    ///   input is attached as a string and `_Name` is set from the input
    ///   (empty when it had none).
    /// * `Normalized::Excluded` - The parent step flagged the molecule.
    ///
    /// Toolkit errors are returned as they are.
    pub fn normalize(&self, mol: Molecule) -> Result<Normalized> {
        let mut props = mol.props_as_dict(true);
        props.remove(NAME_PROP);
        let name = mol.name();
        debug!("Normalizing {name:?} with {} properties", props.len());

        let mol = if self.options.canonicalize_tautomer {
            let tautomer = self.toolkit.canonical_tautomer(&mol)?;
            debug!("Canonical tautomer: {tautomer}");
            tautomer
        } else {
            mol
        };

        let standardized = self.toolkit.standardize(&mol)?;
        debug!("Standardized: {standardized}");

        let (mut parent, excluded) = self.toolkit.parent(&standardized)?;
        if excluded {
            debug!("Excluded {name:?}");
            return Ok(Normalized::Excluded);
        }
        debug!("Parent: {parent}");

        if self.options.extract_largest_fragment {
            parent = self.toolkit.largest_fragment(&parent)?;
            parent = self.toolkit.uncharge(&parent)?;
            debug!("Largest fragment, uncharged: {parent}");
        }

        for (key, value) in props {
            parent.set_prop(key, PropValue::Str(value.to_string()));
        }
        parent.set_name(name);
        Ok(Normalized::Found(parent))
    }
}

/// Normalize `mol` with the [`DefaultToolkit`].
pub fn normalize(mol: Molecule, options: NormalizeOptions) -> Result<Normalized> {
    MoleculeNormalizer::new().with_options(options).normalize(mol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn normalized_smiles(smiles: &str, options: NormalizeOptions) -> Option<String> {
        normalize(parse_smiles(smiles).unwrap(), options)
            .unwrap()
            .to_smiles()
    }

    #[test]
    fn test_pyridone() {
        init_logging("trace");
        assert_eq!(
            normalized_smiles("C1=CC(=O)NC=C1", NormalizeOptions::default()),
            Some("O=c1cccc[nH]1".to_string())
        );
    }

    #[test]
    fn test_sodium_acetate() {
        init_logging("trace");
        assert_eq!(
            normalized_smiles("CC(=O)[O-].[Na+]", NormalizeOptions::default()),
            Some("CC(=O)O".to_string())
        );
    }

    #[test]
    fn test_without_tautomers() {
        init_logging("trace");
        let options = NormalizeOptions {
            canonicalize_tautomer: false,
            ..Default::default()
        };
        assert_eq!(
            normalized_smiles("Oc1ccccn1", options),
            Some("Oc1ccccn1".to_string())
        );
        assert_eq!(
            normalized_smiles("Oc1ccccn1", NormalizeOptions::default()),
            Some("O=c1cccc[nH]1".to_string())
        );
    }

    #[test]
    fn test_idempotent() {
        init_logging("trace");
        let options = NormalizeOptions::default();
        for smiles in [
            "C1=CC(=O)NC=C1",
            "CC(=O)[O-].[Na+]",
            "C[NH3+].[Cl-]",
            "CC(C)=O",
            "c1ccccc1O.O",
            "O=[N+]([O-])c1ccccc1",
        ] {
            let once = normalized_smiles(smiles, options).unwrap();
            let twice = normalized_smiles(&once, options).unwrap();
            assert_eq!(once, twice, "{smiles}");
        }
    }

    #[test]
    fn test_fluoro_salts_normalize_twice() -> Result<()> {
        init_logging("trace");
        for (smiles, expected) in [
            ("F[B-](F)(F)F.[Na+]", "F[B-](F)(F)F"),
            ("F[P-](F)(F)(F)(F)F.[K+]", "F[P-](F)(F)(F)(F)F"),
        ] {
            let once = normalize(parse_smiles(smiles)?, NormalizeOptions::default())?
                .into_molecule()
                .unwrap();
            check_valences(once.graph())?;
            assert_eq!(once.to_smiles(), expected);
            let twice = normalize(parse_smiles(&once.to_smiles())?, NormalizeOptions::default())?;
            assert_eq!(twice.to_smiles(), Some(expected.to_string()));
        }
        Ok(())
    }

    #[test]
    fn test_properties_and_name() -> Result<()> {
        init_logging("trace");
        let mut mol = parse_smiles("CC(=O)[O-].[Na+]")?;
        mol.set_name("sodium acetate");
        mol.set_prop("mw", 82.03);
        mol.set_prop("id", 17i64);
        mol.set_prop("source", "catalog");

        let result = normalize(mol, NormalizeOptions::default())?;
        let out = result.molecule().unwrap();
        assert_eq!(out.name(), "sodium acetate");
        assert_eq!(out.get_prop("mw"), Some(&PropValue::Str("82.03".to_string())));
        assert_eq!(out.get_prop("id"), Some(&PropValue::Str("17".to_string())));
        assert_eq!(out.get_prop("source"), Some(&PropValue::Str("catalog".to_string())));
        assert_eq!(out.props().len(), 4);
        Ok(())
    }

    #[test]
    fn test_missing_name_is_empty() -> Result<()> {
        let result = normalize(parse_smiles("CCO")?, NormalizeOptions::default())?;
        let out = result.into_molecule().unwrap();
        assert_eq!(out.get_prop(NAME_PROP), Some(&PropValue::Str(String::new())));
        assert_eq!(out.name(), "");
        Ok(())
    }

    #[test]
    fn test_exclusion_ignores_options() {
        init_logging("trace");
        for smiles in ["CC(=O)O.[Fe]", "C[Hg]C", "BBBBBBBB"] {
            for canonicalize_tautomer in [true, false] {
                for extract_largest_fragment in [true, false] {
                    let options = NormalizeOptions {
                        canonicalize_tautomer,
                        extract_largest_fragment,
                    };
                    let result = normalize(parse_smiles(smiles).unwrap(), options).unwrap();
                    assert!(result.is_excluded(), "{smiles}");
                    assert_eq!(result.to_smiles(), None);
                }
            }
        }
    }

    /// Records the order of toolkit calls and returns its inputs unchanged
    /// (without properties).
    #[derive(Default)]
    struct RecordingToolkit {
        calls: RefCell<Vec<&'static str>>,
        exclude: bool,
        fail_standardize: bool,
    }

    impl RecordingToolkit {
        fn record(&self, call: &'static str, mol: &Molecule) -> Molecule {
            self.calls.borrow_mut().push(call);
            Molecule::new(mol.graph().clone())
        }
    }

    impl Toolkit for RecordingToolkit {
        fn canonical_tautomer(&self, mol: &Molecule) -> Result<Molecule> {
            Ok(self.record("tautomer", mol))
        }

        fn standardize(&self, mol: &Molecule) -> Result<Molecule> {
            let out = self.record("standardize", mol);
            if self.fail_standardize {
                anyhow::bail!("standardizer failed");
            }
            Ok(out)
        }

        fn parent(&self, mol: &Molecule) -> Result<(Molecule, bool)> {
            Ok((self.record("parent", mol), self.exclude))
        }

        fn largest_fragment(&self, mol: &Molecule) -> Result<Molecule> {
            Ok(self.record("largest_fragment", mol))
        }

        fn uncharge(&self, mol: &Molecule) -> Result<Molecule> {
            Ok(self.record("uncharge", mol))
        }
    }

    #[test]
    fn test_call_order() -> Result<()> {
        let normalizer = MoleculeNormalizer::with_toolkit(RecordingToolkit::default());
        let mut mol = parse_smiles("CCO")?;
        mol.set_prop("tag", "x");
        let result = normalizer.normalize(mol)?;
        assert_eq!(
            *normalizer.toolkit().calls.borrow(),
            ["tautomer", "standardize", "parent", "largest_fragment", "uncharge"]
        );
        assert_eq!(
            result.molecule().and_then(|mol| mol.get_prop("tag")),
            Some(&PropValue::Str("x".to_string()))
        );

        let normalizer = MoleculeNormalizer::with_toolkit(RecordingToolkit::default())
            .with_options(NormalizeOptions {
                canonicalize_tautomer: false,
                extract_largest_fragment: false,
            });
        normalizer.normalize(parse_smiles("CCO")?)?;
        assert_eq!(*normalizer.toolkit().calls.borrow(), ["standardize", "parent"]);
        Ok(())
    }

    #[test]
    fn test_exclusion_stops_pipeline() -> Result<()> {
        let toolkit = RecordingToolkit {
            exclude: true,
            ..Default::default()
        };
        let normalizer = MoleculeNormalizer::with_toolkit(toolkit);
        assert!(normalizer.normalize(parse_smiles("CCO")?)?.is_excluded());
        assert_eq!(
            *normalizer.toolkit().calls.borrow(),
            ["tautomer", "standardize", "parent"]
        );
        Ok(())
    }

    #[test]
    fn test_toolkit_errors_propagate() -> Result<()> {
        let toolkit = RecordingToolkit {
            fail_standardize: true,
            ..Default::default()
        };
        let normalizer = MoleculeNormalizer::with_toolkit(toolkit);
        let err = normalizer.normalize(parse_smiles("CCO")?).unwrap_err();
        assert_eq!(err.to_string(), "standardizer failed");
        assert_eq!(*normalizer.toolkit().calls.borrow(), ["tautomer", "standardize"]);
        Ok(())
    }
}
