//! Per-tool extraction profiles and unit contracts

use attest_domain::Unit;
use std::collections::BTreeMap;

/// How numeric properties are laid out in a tool's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Structures and their properties live in disjoint arrays joined by id
    Join {
        /// Array of structure groups
        structures_key: String,
        /// Array of property elements
        properties_key: String,
        /// Key on property elements naming the structure
        id_key: String,
    },
    /// One flat record per result
    ///
    /// When `records_key` is absent the payload root is read as a single
    /// flat record.
    Records {
        /// Array of records
        records_key: String,
        /// Key naming the structure a record describes
        id_key: String,
    },
    /// Properties at the payload root
    Flat,
    /// The tool produces no numeric properties
    None,
}

/// Extraction rules for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProfile {
    /// Tool name
    pub tool: String,
    /// Payload layout
    pub strategy: ExtractionStrategy,
    declared_units: BTreeMap<String, String>,
}

impl ExtractionProfile {
    /// Profile with an explicit strategy
    pub fn new(tool: impl Into<String>, strategy: ExtractionStrategy) -> Self {
        Self {
            tool: tool.into(),
            strategy,
            declared_units: BTreeMap::new(),
        }
    }

    /// Join profile
    pub fn join(tool: impl Into<String>, structures_key: &str, properties_key: &str, id_key: &str) -> Self {
        Self::new(
            tool,
            ExtractionStrategy::Join {
                structures_key: structures_key.to_string(),
                properties_key: properties_key.to_string(),
                id_key: id_key.to_string(),
            },
        )
    }

    /// Records profile
    pub fn records(tool: impl Into<String>, records_key: &str, id_key: &str) -> Self {
        Self::new(
            tool,
            ExtractionStrategy::Records {
                records_key: records_key.to_string(),
                id_key: id_key.to_string(),
            },
        )
    }

    /// Declare the documented unit of a property
    pub fn with_unit(mut self, property: &str, unit: &str) -> Self {
        self.declared_units.insert(property.to_string(), unit.to_string());
        self
    }

    /// Documented unit of `property`, if the tool declares one
    pub fn declared_unit(&self, property: &str) -> Option<Unit> {
        self.declared_units.get(property).map(|unit| Unit::parse(unit))
    }
}

/// Profiles keyed by tool name
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: BTreeMap<String, ExtractionProfile>,
}

impl ProfileSet {
    /// Empty set
    pub fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    /// Add or replace a profile
    pub fn with(mut self, profile: ExtractionProfile) -> Self {
        self.profiles.insert(profile.tool.clone(), profile);
        self
    }

    /// Profile for `tool`
    pub fn get(&self, tool: &str) -> Option<&ExtractionProfile> {
        self.profiles.get(tool)
    }

    /// Number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileSet {
    /// Profiles of the materials-science tool suite
    fn default() -> Self {
        Self::new()
            .with(
                ExtractionProfile::join(
                    "structure_analysis",
                    "generated_structures",
                    "energy_calculations",
                    "structure_id",
                )
                .with_unit("formation_energy", "eV/atom")
                .with_unit("energy_per_atom", "eV/atom")
                .with_unit("energy_above_hull", "eV/atom")
                .with_unit("total_energy", "eV"),
            )
            .with(
                ExtractionProfile::records("database_lookup", "results", "material_id")
                    .with_unit("formation_energy", "eV/atom")
                    .with_unit("formation_energy_per_atom", "eV/atom")
                    .with_unit("energy_above_hull", "eV/atom")
                    .with_unit("band_gap", "eV")
                    .with_unit("density", "g/cm^3")
                    .with_unit("volume", "Å^3"),
            )
            .with(
                ExtractionProfile::records("structure_generator", "structures", "structure_id")
                    .with_unit("volume", "Å^3")
                    .with_unit("density", "g/cm^3"),
            )
            .with(
                ExtractionProfile::records("energy_calculator", "energies", "structure_id")
                    .with_unit("formation_energy", "eV/atom")
                    .with_unit("energy_per_atom", "eV/atom")
                    .with_unit("energy_above_hull", "eV/atom")
                    .with_unit("total_energy", "eV"),
            )
            .with(ExtractionProfile::new("composition_validator", ExtractionStrategy::None))
    }
}
