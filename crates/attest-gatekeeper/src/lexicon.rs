//! Fixed vocabulary the render gate classifies numbers with
//!
//! Everything here is a plain list so that every decision can be traced to
//! an entry an auditor can read.

/// Unit spellings grouped under a canonical form
///
/// Within a group, longer spellings must not be prefixes of shorter ones
/// the scanner would prefer; lookup always takes the longest match.
const UNITS: &[(&str, &[&str])] = &[
    ("eV/atom", &["eV/atom", "eV per atom", "eV atom^-1", "eV atom-1", "eV/at"]),
    ("meV/atom", &["meV/atom", "meV per atom", "meV atom^-1"]),
    ("eV", &["eV", "electronvolts", "electronvolt", "electron volts"]),
    ("meV", &["meV"]),
    ("Å^3", &["Å^3", "Å³", "A^3", "angstrom^3", "cubic angstroms", "Å3"]),
    ("Å", &["Å", "angstroms", "angstrom", "Angstroms", "Angstrom"]),
    ("g/cm^3", &["g/cm^3", "g/cm3", "g/cm³", "g cm^-3"]),
    ("GPa", &["GPa"]),
    ("K", &["K", "kelvin"]),
];

/// Property keyword phrases grouped under a canonical property
const KEYWORDS: &[(&str, &[&str])] = &[
    ("formation_energy", &["formation energy", "formation energies", "heat of formation", "enthalpy of formation"]),
    ("band_gap", &["band gap", "band gaps", "bandgap", "bandgaps"]),
    ("energy_above_hull", &["energy above hull", "energy above the hull", "e_hull", "ehull", "hull energy", "hull distance"]),
    ("total_energy", &["total energy"]),
    ("density", &["density"]),
    ("volume", &["volume", "cell volume"]),
    ("bulk_modulus", &["bulk modulus"]),
    ("lattice_parameter", &["lattice parameter", "lattice parameters", "lattice constant"]),
    (GENERIC_ENERGY, &["energy", "energies"]),
];

/// Keyword accepted by any energy-like property
pub const GENERIC_ENERGY: &str = "energy";

/// Registry property names that denote a canonical property
const PROPERTY_ALIASES: &[(&str, &str)] = &[
    ("formation_energy_per_atom", "formation_energy"),
    ("heat_of_formation", "formation_energy"),
    ("bandgap", "band_gap"),
    ("gap", "band_gap"),
    ("e_above_hull", "energy_above_hull"),
    ("e_hull", "energy_above_hull"),
    ("ehull", "energy_above_hull"),
    ("energy_total", "total_energy"),
    ("lattice_a", "lattice_parameter"),
    ("lattice_constant", "lattice_parameter"),
    ("k_vrh", "bulk_modulus"),
];

/// Nouns that make a preceding integer a count
const COUNT_NOUNS: &[&str] = &[
    "candidate", "candidates", "structure", "structures", "compound", "compounds",
    "material", "materials", "composition", "compositions", "polymorph", "polymorphs",
    "calculation", "calculations", "configuration", "configurations", "sample", "samples",
    "result", "results", "entry", "entries", "option", "options", "step", "steps",
    "iteration", "iterations", "run", "runs", "time", "times", "tool", "tools",
    "file", "files", "phase", "phases", "element", "elements", "site", "sites",
    "minute", "minutes", "hour", "hours", "second", "seconds",
];

/// Words that, directly before a number, make it an ordinal or a label
const NARRATIVE_CUES: &[&str] = &[
    "step", "figure", "fig", "table", "section", "chapter", "version", "top", "rank",
    "ranked", "item", "iteration", "round", "run", "equation", "eq", "candidate",
    "structure", "option", "no", "number", "#",
];

/// Canonical form of a unit spelling, if the lexicon knows it
pub fn canonical_unit(spelling: &str) -> Option<&'static str> {
    let spelling = spelling.trim();
    UNITS
        .iter()
        .find(|(_, spellings)| spellings.contains(&spelling))
        .map(|(canonical, _)| *canonical)
}

/// Whether two unit spellings denote the same unit
pub fn units_equivalent(a: &str, b: &str) -> bool {
    match (canonical_unit(a), canonical_unit(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

/// Longest unit spelling at the start of `text`, as `(canonical, byte length)`
///
/// The spelling must end on a word boundary.
pub fn match_unit(text: &str) -> Option<(&'static str, usize)> {
    UNITS
        .iter()
        .flat_map(|(canonical, spellings)| spellings.iter().map(move |spelling| (*canonical, *spelling)))
        .filter(|(_, spelling)| {
            text.starts_with(spelling)
                && !text[spelling.len()..]
                    .chars()
                    .next()
                    .is_some_and(|next| next.is_alphanumeric() || next == '_')
        })
        .max_by_key(|(_, spelling)| spelling.len())
        .map(|(canonical, spelling)| (canonical, spelling.len()))
}

/// Keyword phrases as `(canonical property, lowercase words)`
pub fn keyword_phrases() -> impl Iterator<Item = (&'static str, Vec<&'static str>)> {
    KEYWORDS.iter().flat_map(|(canonical, phrases)| {
        phrases
            .iter()
            .map(move |phrase| (*canonical, phrase.split(' ').collect()))
    })
}

/// Canonical property a registry property name denotes
pub fn canonical_property(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    PROPERTY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

/// Whether a claim keyword may be backed by a registry property
pub fn property_compatible(keyword: &str, property_name: &str) -> bool {
    let property = canonical_property(property_name);
    if keyword == GENERIC_ENERGY {
        property.contains(GENERIC_ENERGY)
    } else {
        property == keyword
    }
}

/// Whether `word` (any case) counts things
pub fn is_count_noun(word: &str) -> bool {
    COUNT_NOUNS.contains(&word.to_lowercase().as_str())
}

/// Whether `word` (any case) marks the following number as a label
pub fn is_narrative_cue(word: &str) -> bool {
    NARRATIVE_CUES.contains(&word.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_synonyms() {
        assert_eq!(canonical_unit("eV per atom"), Some("eV/atom"));
        assert_eq!(canonical_unit("eV atom^-1"), Some("eV/atom"));
        assert!(units_equivalent("eV/atom", "eV per atom"));
        assert!(units_equivalent("g/cm3", "g/cm^3"));
        assert!(!units_equivalent("eV", "eV/atom"));
        assert!(units_equivalent("furlongs", "furlongs"));
    }

    #[test]
    fn test_longest_unit_match() {
        assert_eq!(match_unit("eV/atom."), Some(("eV/atom", 7)));
        assert_eq!(match_unit("eV per atom and"), Some(("eV/atom", 11)));
        assert_eq!(match_unit("eV, which"), Some(("eV", 2)));
        assert_eq!(match_unit("meV/atom"), Some(("meV/atom", 8)));
        assert_eq!(match_unit("eVx"), None);
        assert_eq!(match_unit("Kelvin"), None);
        assert_eq!(match_unit("candidate"), None);
    }

    #[test]
    fn test_property_compatibility() {
        assert!(property_compatible("formation_energy", "formation_energy_per_atom"));
        assert!(property_compatible("band_gap", "band_gap"));
        assert!(property_compatible("energy", "formation_energy"));
        assert!(property_compatible("energy", "energy_above_hull"));
        assert!(!property_compatible("energy", "band_gap"));
        assert!(!property_compatible("band_gap", "formation_energy"));
    }

    #[test]
    fn test_word_lists_ignore_case() {
        assert!(is_count_noun("Candidates"));
        assert!(is_narrative_cue("Figure"));
        assert!(!is_count_noun("energy"));
        // "per atom" is a unit, never a count
        assert!(!is_count_noun("atoms"));
    }
}
