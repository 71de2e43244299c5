use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

struct ElementData {
    number: u8,
    symbol: &'static str,
    mass: f64,
    valences: &'static [u8],
}

const fn el(number: u8, symbol: &'static str, mass: f64, valences: &'static [u8]) -> ElementData {
    ElementData {
        number,
        symbol,
        mass,
        valences,
    }
}

/// Sorted by atomic number.
const ELEMENTS: &[ElementData] = &[
    el(1, "H", 1.008, &[1]),
    el(2, "He", 4.0026, &[]),
    el(3, "Li", 6.94, &[]),
    el(4, "Be", 9.0122, &[]),
    el(5, "B", 10.81, &[3]),
    el(6, "C", 12.011, &[4]),
    el(7, "N", 14.007, &[3, 5]),
    el(8, "O", 15.999, &[2]),
    el(9, "F", 18.998, &[1]),
    el(10, "Ne", 20.180, &[]),
    el(11, "Na", 22.990, &[]),
    el(12, "Mg", 24.305, &[]),
    el(13, "Al", 26.982, &[]),
    el(14, "Si", 28.085, &[4]),
    el(15, "P", 30.974, &[3, 5]),
    el(16, "S", 32.06, &[2, 4, 6]),
    el(17, "Cl", 35.45, &[1, 3, 5, 7]),
    el(18, "Ar", 39.948, &[]),
    el(19, "K", 39.098, &[]),
    el(20, "Ca", 40.078, &[]),
    el(21, "Sc", 44.956, &[]),
    el(22, "Ti", 47.867, &[]),
    el(23, "V", 50.942, &[]),
    el(24, "Cr", 51.996, &[]),
    el(25, "Mn", 54.938, &[]),
    el(26, "Fe", 55.845, &[]),
    el(27, "Co", 58.933, &[]),
    el(28, "Ni", 58.693, &[]),
    el(29, "Cu", 63.546, &[]),
    el(30, "Zn", 65.38, &[]),
    el(31, "Ga", 69.723, &[]),
    el(32, "Ge", 72.630, &[4]),
    el(33, "As", 74.922, &[3, 5]),
    el(34, "Se", 78.971, &[2, 4, 6]),
    el(35, "Br", 79.904, &[1, 3, 5]),
    el(36, "Kr", 83.798, &[]),
    el(37, "Rb", 85.468, &[]),
    el(38, "Sr", 87.62, &[]),
    el(39, "Y", 88.906, &[]),
    el(40, "Zr", 91.224, &[]),
    el(41, "Nb", 92.906, &[]),
    el(42, "Mo", 95.95, &[]),
    el(43, "Tc", 98.0, &[]),
    el(44, "Ru", 101.07, &[]),
    el(45, "Rh", 102.91, &[]),
    el(46, "Pd", 106.42, &[]),
    el(47, "Ag", 107.87, &[]),
    el(48, "Cd", 112.41, &[]),
    el(49, "In", 114.82, &[]),
    el(50, "Sn", 118.71, &[]),
    el(51, "Sb", 121.76, &[3, 5]),
    el(52, "Te", 127.60, &[2, 4, 6]),
    el(53, "I", 126.90, &[1, 3, 5, 7]),
    el(54, "Xe", 131.29, &[]),
    el(55, "Cs", 132.91, &[]),
    el(56, "Ba", 137.33, &[]),
    el(78, "Pt", 195.08, &[]),
    el(79, "Au", 196.97, &[]),
    el(80, "Hg", 200.59, &[]),
    el(81, "Tl", 204.38, &[]),
    el(82, "Pb", 207.2, &[]),
    el(83, "Bi", 208.98, &[]),
];

lazy_static! {
    static ref BY_SYMBOL: HashMap<&'static str, Element> = ELEMENTS
        .iter()
        .map(|data| (data.symbol, Element(data.number)))
        .collect();
}

/// A chemical element, identified by its atomic number.
///
/// Only elements present in the internal table can be constructed, so every
/// `Element` has a symbol, a mass and a (possibly empty) valence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Element(u8);

impl Element {
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const NA: Element = Element(11);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const SE: Element = Element(34);
    pub const BR: Element = Element(35);
    pub const TE: Element = Element(52);
    pub const I: Element = Element(53);

    pub fn from_atomic_number(number: u8) -> Option<Self> {
        Self::lookup(number).map(|data| Element(data.number))
    }

    /// Look up a properly capitalized element symbol such as `"Cl"`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        BY_SYMBOL.get(symbol).copied()
    }

    fn lookup(number: u8) -> Option<&'static ElementData> {
        ELEMENTS
            .binary_search_by_key(&number, |data| data.number)
            .ok()
            .map(|i| &ELEMENTS[i])
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        Self::lookup(self.0).map(|data| data.symbol).unwrap_or("*")
    }

    /// Standard atomic weight in g/mol.
    pub fn mass(self) -> f64 {
        Self::lookup(self.0).map(|data| data.mass).unwrap_or(0.0)
    }

    /// Allowed valences of the neutral element, smallest first. Empty for
    /// metals and noble gases, whose valence is never inferred.
    pub fn default_valences(self) -> &'static [u8] {
        Self::lookup(self.0).map(|data| data.valences).unwrap_or(&[])
    }

    /// Allowed valences for a charged atom, taken from the isoelectronic
    /// element of the same period (N+ behaves like C, O- like F).
    pub fn valences_with_charge(self, charge: i8) -> &'static [u8] {
        if charge == 0 || self.is_metal() {
            return self.default_valences();
        }
        let shifted = self.0 as i16 - charge as i16;
        if !(1..=118).contains(&shifted) || period(shifted as u8) != period(self.0) {
            return &[];
        }
        Element::from_atomic_number(shifted as u8)
            .map(|e| e.default_valences())
            .unwrap_or(&[])
    }

    /// Elements that may be written without brackets in SMILES.
    pub fn is_organic_subset(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }

    /// Elements that may be written as bare lowercase aromatic symbols.
    pub fn is_bare_aromatic(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 15 | 16)
    }

    pub fn is_metal(self) -> bool {
        !matches!(
            self.0,
            1 | 2 | 5..=10 | 14..=18 | 32..=36 | 51..=54 | 85 | 86
        )
    }

    /// Anything other than carbon and hydrogen.
    pub fn is_hetero(self) -> bool {
        self.0 != 1 && self.0 != 6
    }
}

fn period(number: u8) -> u8 {
    match number {
        1..=2 => 1,
        3..=10 => 2,
        11..=18 => 3,
        19..=36 => 4,
        37..=54 => 5,
        55..=86 => 6,
        _ => 7,
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert_eq!(Element::from_symbol("Na"), Some(Element::NA));
        assert_eq!(Element::from_symbol("cl"), None);
        assert_eq!(Element::C.symbol(), "C");
        assert_eq!(Element::from_atomic_number(26).map(|e| e.symbol()), Some("Fe"));
        assert_eq!(Element::from_atomic_number(100), None);
    }

    #[test]
    fn test_charged_valences() {
        // N+ is isoelectronic with C, O- with F, C- with N
        assert_eq!(Element::N.valences_with_charge(1), &[4]);
        assert_eq!(Element::O.valences_with_charge(-1), &[1]);
        assert_eq!(Element::C.valences_with_charge(-1), &[3, 5]);
        assert_eq!(Element::NA.valences_with_charge(1), &[] as &[u8]);
        // a noble gas configuration has no valence to offer
        assert_eq!(Element::F.valences_with_charge(-1), &[] as &[u8]);
    }

    #[test]
    fn test_metals() {
        assert!(Element::NA.is_metal());
        assert!(Element::from_symbol("Fe").map(|e| e.is_metal()).unwrap_or(false));
        assert!(!Element::C.is_metal());
        assert!(!Element::SE.is_metal());
        assert!(!Element::B.is_metal());
    }
}
