//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::detector::{Detection, ToolDetector};
use crate::error::ExtractorError;
use crate::profile::{ExtractionProfile, ExtractionStrategy, ProfileSet};
use crate::types::{
    ArtifactDescriptor, ExtractionResult, ProcessedOutput, UnknownUnit, Unpaired, UnpairedSide,
};
use crate::unwrap::{unwrap_output, Unwrapped};
use attest_domain::{CallId, DetectedTool, ProvenanceDraft, Unit};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Numeric fields that identify or count things rather than measure them
const NON_PROPERTY_KEYS: &[&str] = &[
    "id",
    "index",
    "rank",
    "count",
    "seed",
    "n_atoms",
    "num_sites",
    "n_structures",
    "num_structures",
    "space_group_number",
    "spacegroup_number",
];

/// Turns unwrapped, attributed payloads into provenance drafts
#[derive(Debug, Clone, Default)]
pub struct ValueExtractor {
    profiles: ProfileSet,
}

impl ValueExtractor {
    /// Extractor over a set of profiles
    pub fn new(profiles: ProfileSet) -> Self {
        Self { profiles }
    }

    /// Profiles in use
    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Extract every numeric property of one tool output
    ///
    /// Unattributed outputs are refused: a value without a known source
    /// tool can never back a claim.
    pub fn extract(
        &self,
        tool: &DetectedTool,
        call_id: &CallId,
        payload: &Value,
    ) -> Result<ExtractionResult, ExtractorError> {
        let tool_name = tool.tool_name().ok_or(ExtractorError::Unattributed)?;
        let profile = self
            .profiles
            .get(tool_name)
            .ok_or_else(|| ExtractorError::NoProfile(tool_name.to_string()))?;

        let mut result = ExtractionResult::default();
        let root = match payload {
            Value::Object(root) => root,
            _ if profile.strategy == ExtractionStrategy::None => return Ok(result),
            _ => {
                return Err(ExtractorError::InvalidFormat(format!(
                    "{} output is not an object",
                    tool_name
                )))
            }
        };

        let mut run = Run {
            profile,
            call_id,
            root,
            result: &mut result,
        };
        match &profile.strategy {
            ExtractionStrategy::Join {
                structures_key,
                properties_key,
                id_key,
            } => run.join(structures_key, properties_key, id_key)?,
            ExtractionStrategy::Records { records_key, id_key } => run.records(records_key, id_key)?,
            ExtractionStrategy::Flat => run.flat(),
            ExtractionStrategy::None => {}
        }
        result.artifacts = artifact_descriptors(root);

        debug!(
            "Extracted {} drafts, {} unpaired, {} artifacts from {} ({})",
            result.drafts.len(),
            result.unpaired.len(),
            result.artifacts.len(),
            tool_name,
            call_id
        );
        Ok(result)
    }
}

/// State of one extraction pass
struct Run<'a> {
    profile: &'a ExtractionProfile,
    call_id: &'a CallId,
    root: &'a Map<String, Value>,
    result: &'a mut ExtractionResult,
}

impl Run<'_> {
    fn join(&mut self, structures_key: &str, properties_key: &str, id_key: &str) -> Result<(), ExtractorError> {
        let groups = array_at(self.root, structures_key)?;
        let elements = array_at(self.root, properties_key)?;

        // Enumerate structures; numbering is per composition and 1-based
        let mut structure_ids: Vec<String> = Vec::new();
        let mut per_composition: HashMap<&str, usize> = HashMap::new();
        for (position, group) in groups.iter().enumerate() {
            let Some(composition) = group.get("composition").and_then(Value::as_str) else {
                self.unpaired(
                    format!("#{}", position + 1),
                    UnpairedSide::Structure,
                    "structure group without composition",
                );
                continue;
            };
            let count = match group.get("structures") {
                Some(Value::Array(structures)) => structures.len(),
                _ => 1,
            };
            let counter = per_composition.entry(composition).or_insert(0);
            for _ in 0..count {
                *counter += 1;
                structure_ids.push(format!("{}_struct_{}", composition, counter));
            }
        }

        // Index property elements by id
        let mut index: HashMap<&str, &Map<String, Value>> = HashMap::new();
        let mut index_order: Vec<&str> = Vec::new();
        for (position, element) in elements.iter().enumerate() {
            let Some(fields) = element.as_object() else {
                self.unpaired(
                    format!("#{}", position + 1),
                    UnpairedSide::Property,
                    "property element is not an object",
                );
                continue;
            };
            let Some(id) = fields.get(id_key).and_then(Value::as_str) else {
                self.unpaired(
                    format!("#{}", position + 1),
                    UnpairedSide::Property,
                    &format!("property element without '{}'", id_key),
                );
                continue;
            };
            if index.contains_key(id) {
                self.unpaired(id.to_string(), UnpairedSide::Property, "duplicate property element");
                continue;
            }
            index.insert(id, fields);
            index_order.push(id);
        }

        let mut paired: HashSet<&str> = HashSet::new();
        for structure_id in &structure_ids {
            match index.get(structure_id.as_str()) {
                Some(fields) => {
                    paired.insert(structure_id.as_str());
                    self.push_drafts(fields, Some(structure_id.clone()), &[id_key]);
                }
                None => self.unpaired(
                    structure_id.clone(),
                    UnpairedSide::Structure,
                    "no property element for structure",
                ),
            }
        }
        for id in index_order {
            if !paired.contains(id) {
                self.unpaired(id.to_string(), UnpairedSide::Property, "no structure for property element");
            }
        }
        Ok(())
    }

    fn records(&mut self, records_key: &str, id_key: &str) -> Result<(), ExtractorError> {
        let records = match self.root.get(records_key) {
            None => {
                self.flat();
                return Ok(());
            }
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(ExtractorError::InvalidFormat(format!(
                    "'{}' is not an array",
                    records_key
                )))
            }
        };

        for (position, record) in records.iter().enumerate() {
            let Some(fields) = record.as_object() else {
                debug!("Skipping non-object record #{} of {}", position + 1, records_key);
                continue;
            };
            let structure_id = fields
                .get(id_key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    fields
                        .get("composition")
                        .and_then(Value::as_str)
                        .map(|composition| format!("{}_{}", composition, position + 1))
                });
            self.push_drafts(fields, structure_id, &[id_key]);
        }
        Ok(())
    }

    fn flat(&mut self) {
        let root = self.root;
        let structure_id = root
            .get("structure_id")
            .or_else(|| root.get("composition"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self.push_drafts(root, structure_id, &[]);
    }

    fn push_drafts(&mut self, fields: &Map<String, Value>, structure_id: Option<String>, skip: &[&str]) {
        for (name, value) in fields {
            if skip.contains(&name.as_str()) || !is_property_name(name) {
                continue;
            }
            let Some(number) = finite_number(value) else {
                continue;
            };

            let unit = self.resolve_unit(name, fields);
            if !unit.is_known() {
                warn!(
                    "No unit for {}{} from {} ({})",
                    name,
                    structure_id.as_deref().map(|s| format!("@{}", s)).unwrap_or_default(),
                    self.profile.tool,
                    self.call_id
                );
                self.result.unknown_units.push(UnknownUnit {
                    property_name: name.clone(),
                    structure_id: structure_id.clone(),
                });
            }

            let mut draft = ProvenanceDraft::new(
                name.clone(),
                number,
                unit,
                self.profile.tool.clone(),
                self.call_id.clone(),
            );
            if let Some(structure_id) = &structure_id {
                draft = draft.with_structure(structure_id.clone());
            }
            self.result.drafts.push(draft);
        }
    }

    /// Sibling `<property>_unit`, element `units`, root `units`, then the
    /// tool's declared unit
    fn resolve_unit(&self, property: &str, element: &Map<String, Value>) -> Unit {
        let sibling = element
            .get(&format!("{}_unit", property))
            .and_then(Value::as_str);
        let from_map = |fields: &Map<String, Value>| {
            fields
                .get("units")
                .and_then(|units| units.get(property))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        sibling
            .map(str::to_string)
            .or_else(|| from_map(element))
            .or_else(|| from_map(self.root))
            .map(|raw| Unit::parse(&raw))
            .filter(Unit::is_known)
            .or_else(|| self.profile.declared_unit(property))
            .unwrap_or(Unit::Unknown)
    }

    fn unpaired(&mut self, structure_id: String, side: UnpairedSide, reason: &str) {
        warn!(
            "Unpaired {:?} {} in {} ({}): {}",
            side, structure_id, self.profile.tool, self.call_id, reason
        );
        self.result.unpaired.push(Unpaired {
            structure_id,
            side,
            reason: reason.to_string(),
        });
    }
}

fn array_at<'a>(root: &'a Map<String, Value>, key: &str) -> Result<&'a Vec<Value>, ExtractorError> {
    root.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractorError::InvalidFormat(format!("'{}' is missing or not an array", key)))
}

fn is_property_name(name: &str) -> bool {
    !name.ends_with("_unit") && !name.ends_with("_id") && !NON_PROPERTY_KEYS.contains(&name)
}

/// Finite JSON numbers only; booleans and numeric strings are not values
fn finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn artifact_descriptors(root: &Map<String, Value>) -> Vec<ArtifactDescriptor> {
    let Some(items) = root.get("artifacts").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(path) => Some(ArtifactDescriptor {
                reference: path.clone(),
                content: None,
                structure_id: None,
            }),
            Value::Object(fields) => {
                let reference = ["path", "name", "filename"]
                    .iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str));
                let Some(reference) = reference else {
                    warn!("Artifact descriptor without path or name: {}", item);
                    return None;
                };
                Some(ArtifactDescriptor {
                    reference: reference.to_string(),
                    content: fields.get("content").and_then(Value::as_str).map(str::to_string),
                    structure_id: fields
                        .get("structure_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            }
            _ => None,
        })
        .collect()
}

/// The Extractor runs the three stages a tool output goes through:
/// unwrap, detect, extract
///
/// Each stage is exposed on its own so callers can log between them.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
    detector: ToolDetector,
    values: ValueExtractor,
}

impl Extractor {
    /// Create an Extractor
    pub fn new(config: ExtractorConfig, detector: ToolDetector, values: ValueExtractor) -> Self {
        Self {
            config,
            detector,
            values,
        }
    }

    /// Extractor with default signatures and profiles
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Extractor with default signatures and profiles, after validating
    /// the configuration
    pub fn try_new(config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self::with_config(config))
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Remove transport envelopes
    pub fn unwrap_envelopes(&self, raw: &Value) -> Result<Unwrapped, ExtractorError> {
        Ok(unwrap_output(raw, self.config.max_unwrap_depth)?)
    }

    /// Identify the tool behind an unwrapped payload
    pub fn detect(&self, reported_name: Option<&str>, payload: &Value) -> Detection {
        self.detector.detect(reported_name, payload)
    }

    /// Extract drafts from an unwrapped, attributed payload
    pub fn extract(
        &self,
        tool: &DetectedTool,
        call_id: &CallId,
        payload: &Value,
    ) -> Result<ExtractionResult, ExtractorError> {
        self.values.extract(tool, call_id, payload)
    }

    /// Run all three stages
    ///
    /// Unattributed outputs come back with `extraction: None`.
    pub fn process(
        &self,
        reported_name: Option<&str>,
        call_id: &CallId,
        raw: &Value,
    ) -> Result<ProcessedOutput, ExtractorError> {
        let Unwrapped { payload, layers } = self.unwrap_envelopes(raw)?;
        let detection = self.detect(reported_name, &payload);
        let extraction = if detection.tool.is_attributed() {
            Some(self.extract(&detection.tool, call_id, &payload)?)
        } else {
            None
        };
        Ok(ProcessedOutput {
            payload,
            layers,
            detection,
            extraction,
        })
    }
}
