use crate::*;
use anyhow::{Context, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum SmilesError {
    #[error("Branch start '(' at position {0} (followed by {1}) without a current atom")]
    BranchNoCurrentAtom(usize, String),
    #[error("Branch end ')' at position {0} (followed by {1}) without a matching '('")]
    BranchEndNoStart(usize, String),
    #[error("Ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u16, usize),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Invalid bracket atom '[{0}]' at position {1}")]
    InvalidBracketAtom(String, usize),
    #[error("Unknown element '{0}' at position {1}")]
    UnknownElement(String, usize),
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("Ring closure {0} is never closed")]
    UnclosedRing(u16),
    #[error("{0} branch(es) left open at the end of the string")]
    UnclosedBranch(usize),
    #[error("Bond symbol at position {0} is not followed by an atom")]
    DanglingBond(usize),
}

/// Parses a SMILES string into a kekulized [`Molecule`].
///
/// Hydrogens on unbracketed atoms are derived from the default valence rule.
/// Stereo markers and atom classes are accepted and discarded.
///
/// # Arguments
///
/// * `smiles` - The SMILES string to parse.
///
/// # Returns
///
/// * `Result<Molecule>` - The parsed molecule, or the reason it could not be read.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_helper(smiles).context(format!("Failed to parse SMILES string {smiles}"))
}

/// The contents of a `[...]` atom.
#[derive(Debug, Clone, PartialEq)]
struct BracketAtom {
    isotope: u16,
    element: Element,
    aromatic: bool,
    hydrogens: u8,
    charge: i8,
}

fn capitalize(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn aromatic_symbol(input: &str) -> IResult<&str, (Element, bool)> {
    map_res(
        alt((tag("se"), tag("as"), tag("te"), recognize(one_of("bcnops")))),
        |s: &str| {
            Element::from_symbol(&capitalize(s))
                .map(|element| (element, true))
                .ok_or(())
        },
    )(input)
}

fn aliphatic_symbol(input: &str) -> IResult<&str, (Element, bool)> {
    let two_letter = recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        satisfy(|c| c.is_ascii_lowercase()),
    ));
    let one_letter = recognize(satisfy(|c| c.is_ascii_uppercase()));
    alt((
        map_res(two_letter, |s: &str| {
            Element::from_symbol(s).map(|e| (e, false)).ok_or(())
        }),
        map_res(one_letter, |s: &str| {
            Element::from_symbol(s).map(|e| (e, false)).ok_or(())
        }),
    ))(input)
}

/// Largest formal charge accepted in a bracket atom.
const MAX_CHARGE: usize = 15;

fn signed_charge(sign: char, magnitude: usize) -> Result<i8, ()> {
    if magnitude > MAX_CHARGE {
        return Err(());
    }
    let magnitude = magnitude as i8;
    Ok(if sign == '-' { -magnitude } else { magnitude })
}

fn charge(input: &str) -> IResult<&str, i8> {
    alt((
        map_res(
            pair(one_of("+-"), map_res(digit1, |d: &str| d.parse::<usize>())),
            |(sign, n)| signed_charge(sign, n),
        ),
        map_res(take_while1(|c: char| c == '+'), |s: &str| signed_charge('+', s.len())),
        map_res(take_while1(|c: char| c == '-'), |s: &str| signed_charge('-', s.len())),
    ))(input)
}

fn hydrogen_count(input: &str) -> IResult<&str, u8> {
    map(
        preceded(char('H'), opt(map_res(digit1, |d: &str| d.parse::<u8>()))),
        |n| n.unwrap_or(1),
    )(input)
}

/// `isotope? symbol chirality? hcount? charge? class?`
fn bracket_atom(input: &str) -> IResult<&str, BracketAtom> {
    map(
        tuple((
            opt(map_res(digit1, |d: &str| d.parse::<u16>())),
            alt((aromatic_symbol, aliphatic_symbol)),
            opt(take_while1(|c: char| c == '@')),
            opt(hydrogen_count),
            opt(charge),
            opt(preceded(char(':'), digit1)),
        )),
        |(isotope, (element, aromatic), _chirality, hydrogens, charge, _class)| BracketAtom {
            isotope: isotope.unwrap_or(0),
            element,
            aromatic,
            hydrogens: hydrogens.unwrap_or(0),
            charge: charge.unwrap_or(0),
        },
    )(input)
}

/// Reads an organic-subset atom starting at `i`, returning it with the
/// number of characters it used.
fn organic_atom(chars: &[char], i: usize) -> Option<(Atom, usize)> {
    let next = chars.get(i + 1).copied();
    let (symbol, aromatic, width) = match (chars[i], next) {
        ('C', Some('l')) => ("Cl", false, 2),
        ('B', Some('r')) => ("Br", false, 2),
        ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => {
            return Element::from_symbol(&chars[i].to_string()).map(|e| (Atom::new(e), 1));
        }
        ('b', _) => ("B", true, 1),
        ('c', _) => ("C", true, 1),
        ('n', _) => ("N", true, 1),
        ('o', _) => ("O", true, 1),
        ('p', _) => ("P", true, 1),
        ('s', _) => ("S", true, 1),
        _ => return None,
    };
    Element::from_symbol(symbol).map(|e| {
        let mut atom = Atom::new(e);
        atom.aromatic = aromatic;
        (atom, width)
    })
}

/// The bond used when none is written: aromatic between two aromatic atoms.
fn implied_bond(graph: &MoleculeGraph, a: NodeIndex, b: NodeIndex) -> Bond {
    if graph[a].aromatic && graph[b].aromatic {
        Bond::Aromatic
    } else {
        Bond::Single
    }
}

fn parse_smiles_helper(smiles: &str) -> Result<Molecule> {
    let mut graph = MoleculeGraph::new_undirected();
    let mut current_atom: Option<NodeIndex> = None;
    let mut bond_type: Option<(Bond, usize)> = None;
    let mut branch_stack: Vec<NodeIndex> = Vec::new();
    let mut ring_map: HashMap<u16, (NodeIndex, Option<Bond>)> = HashMap::new();
    // Atoms whose hydrogen count was written out in brackets.
    let mut bracketed: Vec<bool> = Vec::new();

    let chars: Vec<char> = smiles.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current_atom.ok_or_else(|| {
                    SmilesError::BranchNoCurrentAtom(i, chars[i..].iter().collect())
                })?;
                branch_stack.push(atom);
                i += 1;
            }
            ')' => {
                if bond_type.is_some() {
                    return Err(SmilesError::DanglingBond(i).into());
                }
                current_atom = Some(branch_stack.pop().ok_or_else(|| {
                    SmilesError::BranchEndNoStart(i, chars[i..].iter().collect())
                })?);
                i += 1;
            }
            '-' | '=' | '#' | ':' | '/' | '\\' => {
                let bond = match c {
                    '=' => Bond::Double,
                    '#' => Bond::Triple,
                    ':' => Bond::Aromatic,
                    _ => Bond::Single,
                };
                bond_type = Some((bond, i));
                i += 1;
            }
            '%' | '0'..='9' => {
                let (ring_number, width) = if c == '%' {
                    let digits: String = chars.iter().skip(i + 1).take(2).collect();
                    if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(SmilesError::UnexpectedCharacter(c, i).into());
                    }
                    (digits.parse::<u16>()?, 3)
                } else {
                    (c.to_digit(10).unwrap_or(0) as u16, 1)
                };
                let current = current_atom
                    .ok_or(SmilesError::RingClosureNoCurrentAtom(ring_number, i))?;
                let written = bond_type.take().map(|(bond, _)| bond);
                if let Some((start_atom, opening_bond)) = ring_map.remove(&ring_number) {
                    let bond = written
                        .or(opening_bond)
                        .unwrap_or_else(|| implied_bond(&graph, start_atom, current));
                    trace!("Closing ring {ring_number} between {start_atom:?} and {current:?}");
                    graph.add_edge(start_atom, current, bond);
                } else {
                    ring_map.insert(ring_number, (current, written));
                }
                i += width;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|offset| i + offset)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let (_, parsed) = all_consuming(bracket_atom)(content.as_str())
                    .map_err(|_| SmilesError::InvalidBracketAtom(content.clone(), i))?;
                let mut atom = Atom::new(parsed.element)
                    .with_charge(parsed.charge)
                    .with_hydrogens(parsed.hydrogens)
                    .with_isotope(parsed.isotope);
                atom.aromatic = parsed.aromatic;
                let new_atom = graph.add_node(atom);
                bracketed.push(true);
                if let Some(prev_atom) = current_atom {
                    let bond = bond_type
                        .take()
                        .map(|(bond, _)| bond)
                        .unwrap_or_else(|| implied_bond(&graph, prev_atom, new_atom));
                    graph.add_edge(prev_atom, new_atom, bond);
                }
                current_atom = Some(new_atom);
                i = end + 1;
            }
            '.' => {
                if let Some((_, position)) = bond_type {
                    return Err(SmilesError::DanglingBond(position).into());
                }
                current_atom = None;
                i += 1;
            }
            '@' => {
                i += 1;
            }
            _ => {
                let (atom, width) = organic_atom(&chars, i).ok_or_else(|| {
                    if c.is_ascii_alphabetic() || c == '*' {
                        SmilesError::UnknownElement(c.to_string(), i)
                    } else {
                        SmilesError::UnexpectedCharacter(c, i)
                    }
                })?;
                let new_atom = graph.add_node(atom);
                bracketed.push(false);
                if let Some(prev_atom) = current_atom {
                    let bond = bond_type
                        .take()
                        .map(|(bond, _)| bond)
                        .unwrap_or_else(|| implied_bond(&graph, prev_atom, new_atom));
                    graph.add_edge(prev_atom, new_atom, bond);
                }
                current_atom = Some(new_atom);
                i += width;
            }
        }
    }

    if let Some((_, position)) = bond_type {
        return Err(SmilesError::DanglingBond(position).into());
    }
    if !branch_stack.is_empty() {
        return Err(SmilesError::UnclosedBranch(branch_stack.len()).into());
    }
    if let Some(ring_number) = ring_map.keys().min() {
        return Err(SmilesError::UnclosedRing(*ring_number).into());
    }

    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    for node in nodes {
        if !bracketed[node.index()] {
            graph[node].hydrogens = default_implicit_hydrogens(&graph, node);
        }
    }

    kekulize(&mut graph)?;
    debug!(
        "Parsed {smiles} into {} atoms and {} bonds",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(Molecule::new(graph))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_atom() {
        let (_, atom) = all_consuming(bracket_atom)("13CH3+").unwrap();
        assert_eq!(atom.isotope, 13);
        assert_eq!(atom.element, Element::C);
        assert_eq!(atom.hydrogens, 3);
        assert_eq!(atom.charge, 1);

        let (_, atom) = all_consuming(bracket_atom)("nH").unwrap();
        assert!(atom.aromatic);
        assert_eq!(atom.element, Element::N);
        assert_eq!(atom.hydrogens, 1);

        let (_, atom) = all_consuming(bracket_atom)("Fe+2").unwrap();
        assert_eq!(atom.charge, 2);
        let (_, atom) = all_consuming(bracket_atom)("O--").unwrap();
        assert_eq!(atom.charge, -2);
        let (_, atom) = all_consuming(bracket_atom)("C@@H:12").unwrap();
        assert_eq!(atom.hydrogens, 1);
        let (_, atom) = all_consuming(bracket_atom)("se").unwrap();
        assert_eq!(atom.element, Element::SE);

        let (_, atom) = all_consuming(bracket_atom)("Fe+15").unwrap();
        assert_eq!(atom.charge, 15);
        assert!(all_consuming(bracket_atom)("Fe+16").is_err());
        assert!(all_consuming(bracket_atom)("Fe+127").is_err());
        let many_plus = format!("C{}", "+".repeat(200));
        assert!(all_consuming(bracket_atom)(many_plus.as_str()).is_err());
        let many_minus = format!("C{}", "-".repeat(16));
        assert!(all_consuming(bracket_atom)(many_minus.as_str()).is_err());
        assert!(all_consuming(bracket_atom)("Xx").is_err());
        assert!(all_consuming(bracket_atom)("").is_err());
    }

    #[test]
    fn test_implicit_hydrogens() -> Result<()> {
        init_logging("trace");
        let mol = parse_smiles("CC(=O)O")?;
        let hydrogens: Vec<u8> = mol.graph().node_weights().map(|a| a.hydrogens).collect();
        assert_eq!(hydrogens, vec![3, 0, 0, 1]);

        let mol = parse_smiles("C[N+](C)(C)C")?;
        assert_eq!(mol.graph()[NodeIndex::new(1)].hydrogens, 0);
        Ok(())
    }

    #[test]
    fn test_aromatic_input_is_kekulized() -> Result<()> {
        init_logging("trace");
        let mol = parse_smiles("c1ccccc1")?;
        let doubles = mol
            .graph()
            .edge_weights()
            .filter(|&&bond| bond == Bond::Double)
            .count();
        assert_eq!(doubles, 3);
        assert!(mol.graph().node_weights().all(|a| !a.aromatic && a.hydrogens == 1));
        assert!(mol.graph().edge_weights().all(|&b| b != Bond::Aromatic));
        Ok(())
    }

    #[test]
    fn test_ring_closures() -> Result<()> {
        let mol = parse_smiles("C%10CC%10")?;
        assert_eq!(mol.graph().edge_count(), 3);
        let mol = parse_smiles("C1CC=1")?;
        assert_eq!(
            mol.graph().edge_weights().filter(|&&b| b == Bond::Double).count(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_fragments_and_stereo() -> Result<()> {
        let mol = parse_smiles("C/C=C\\C.[Na+]")?;
        assert_eq!(mol.atom_count(), 5);
        assert_eq!(mol.fragment_indices().len(), 2);
        let mol = parse_smiles("N[C@@H](C)C(=O)O")?;
        assert_eq!(mol.atom_count(), 6);
        Ok(())
    }

    #[test]
    fn test_empty() -> Result<()> {
        let mol = parse_smiles("")?;
        assert_eq!(mol.atom_count(), 0);
        Ok(())
    }

    #[test]
    fn test_errors() {
        init_logging("trace");
        for bad in ["C1CC", "C(C", "C)C", "C[Fe", "CX", "C=", "(C)", "C[Qq]", "c1cccc1", "[Fe+127]O"] {
            let result = parse_smiles(bad);
            assert!(result.is_err(), "{bad} should not parse");
        }
        let err = parse_smiles("C1CC").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse SMILES string C1CC"));
    }
}
