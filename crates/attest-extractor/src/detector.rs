//! Structural tool identity detection
//!
//! Hosts often report every tool call under a generic label, so the tool
//! that produced an output is recognized from the shape of its payload.
//! Signatures are pure functions of the payload; the caller decides what
//! to log.

use attest_domain::DetectedTool;
use serde_json::{Map, Value};

/// Tool names hosts use when they do not know the real one
pub const GENERIC_LABELS: &[&str] = &["tool", "function", "mcp_tool", "tool_call"];

/// Extra condition a payload must satisfy beyond key presence
pub type SignaturePredicate = fn(&Map<String, Value>) -> bool;

/// Structural fingerprint of one tool's output
#[derive(Debug, Clone)]
pub struct Signature {
    tool: String,
    required_keys: Vec<String>,
    predicate: Option<SignaturePredicate>,
}

impl Signature {
    /// Signature matching payloads that carry all of `required_keys`
    pub fn new(tool: impl Into<String>, required_keys: &[&str]) -> Self {
        Self {
            tool: tool.into(),
            required_keys: required_keys.iter().map(|key| key.to_string()).collect(),
            predicate: None,
        }
    }

    /// Add a predicate on the payload
    pub fn with_predicate(mut self, predicate: SignaturePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Tool this signature identifies
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Number of structural keys, used to rank competing matches
    pub fn specificity(&self) -> usize {
        self.required_keys.len()
    }

    /// Whether `payload` carries this signature
    pub fn matches(&self, payload: &Value) -> bool {
        let Some(fields) = payload.as_object() else {
            return false;
        };
        self.required_keys.iter().all(|key| fields.contains_key(key))
            && self.predicate.is_none_or(|predicate| predicate(fields))
    }
}

/// Several signatures matched one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionAmbiguity {
    /// Tool that won
    pub chosen: String,
    /// Every matching tool, in table order
    pub candidates: Vec<String>,
}

/// Result of a detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Detected identity
    pub tool: DetectedTool,
    /// Set when the choice had to break a tie between signatures
    pub ambiguity: Option<DetectionAmbiguity>,
}

impl Detection {
    fn unattributed() -> Self {
        Self {
            tool: DetectedTool::Unattributed,
            ambiguity: None,
        }
    }
}

/// Ordered table of signatures, most specific first
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl SignatureTable {
    /// Empty table
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// Append a signature
    pub fn with(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Signatures in table order
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Whether any signature identifies `tool`
    pub fn knows_tool(&self, tool: &str) -> bool {
        self.signatures.iter().any(|signature| signature.tool == tool)
    }

    /// Identify the tool behind `payload` from its structure alone
    ///
    /// The most specific matching signature wins; ties keep table order.
    pub fn detect(&self, payload: &Value) -> Detection {
        let matching: Vec<&Signature> = self
            .signatures
            .iter()
            .filter(|signature| signature.matches(payload))
            .collect();

        let mut best: Option<&Signature> = None;
        for signature in matching.iter().copied() {
            if best.is_none_or(|current| signature.specificity() > current.specificity()) {
                best = Some(signature);
            }
        }
        let Some(best) = best else {
            return Detection::unattributed();
        };

        let mut candidates: Vec<String> = Vec::new();
        for signature in &matching {
            if !candidates.contains(&signature.tool) {
                candidates.push(signature.tool.clone());
            }
        }
        let ambiguity = (candidates.len() > 1).then(|| DetectionAmbiguity {
            chosen: best.tool.clone(),
            candidates,
        });

        Detection {
            tool: DetectedTool::by_signature(best.tool.clone()),
            ambiguity,
        }
    }
}

impl Default for SignatureTable {
    /// Signatures of the materials-science tool suite
    fn default() -> Self {
        Self::new()
            .with(
                Signature::new(
                    "structure_analysis",
                    &["generated_structures", "energy_calculations"],
                )
                .with_predicate(analysis_sections_are_arrays),
            )
            .with(Signature::new("database_lookup", &["mode", "results"]).with_predicate(mode_is_database))
            .with(
                Signature::new("structure_generator", &["mode", "structures"])
                    .with_predicate(mode_is_generation),
            )
            .with(Signature::new("energy_calculator", &["composition", "formation_energy"]))
            .with(Signature::new("energy_calculator", &["energies"]).with_predicate(energies_is_array))
            .with(
                Signature::new("composition_validator", &["composition", "valid"])
                    .with_predicate(valid_is_bool),
            )
    }
}

fn analysis_sections_are_arrays(fields: &Map<String, Value>) -> bool {
    fields.get("generated_structures").is_some_and(Value::is_array)
        && fields.get("energy_calculations").is_some_and(Value::is_array)
}

fn mode_is_database(fields: &Map<String, Value>) -> bool {
    fields.get("mode").and_then(Value::as_str) == Some("database")
}

fn mode_is_generation(fields: &Map<String, Value>) -> bool {
    fields.get("mode").and_then(Value::as_str) == Some("generation")
}

fn energies_is_array(fields: &Map<String, Value>) -> bool {
    fields.get("energies").is_some_and(Value::is_array)
}

fn valid_is_bool(fields: &Map<String, Value>) -> bool {
    fields.get("valid").is_some_and(Value::is_boolean)
}

/// Resolves tool identity from the reported name and the payload
#[derive(Debug, Clone, Default)]
pub struct ToolDetector {
    table: SignatureTable,
}

impl ToolDetector {
    /// Detector over a signature table
    pub fn new(table: SignatureTable) -> Self {
        Self { table }
    }

    /// Signature table in use
    pub fn table(&self) -> &SignatureTable {
        &self.table
    }

    /// Identify the tool behind one output
    ///
    /// A concrete reported name that the table knows is trusted as declared;
    /// generic labels and unknown names fall through to structural detection.
    pub fn detect(&self, reported_name: Option<&str>, payload: &Value) -> Detection {
        if let Some(name) = reported_name.map(str::trim) {
            if !is_generic_label(name) && self.table.knows_tool(name) {
                return Detection {
                    tool: DetectedTool::declared(name),
                    ambiguity: None,
                };
            }
        }
        self.table.detect(payload)
    }
}

/// Whether a host-reported tool name carries no identity
pub fn is_generic_label(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || GENERIC_LABELS.iter().any(|label| label.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_domain::DetectionSource;
    use serde_json::json;

    fn detect(payload: Value) -> Detection {
        SignatureTable::default().detect(&payload)
    }

    #[test]
    fn test_default_signatures() {
        let cases = [
            (json!({"generated_structures": [], "energy_calculations": []}), "structure_analysis"),
            (json!({"mode": "database", "results": []}), "database_lookup"),
            (json!({"mode": "generation", "structures": []}), "structure_generator"),
            (json!({"composition": "TiO2", "formation_energy": -3.1}), "energy_calculator"),
            (json!({"energies": [{"composition": "TiO2"}]}), "energy_calculator"),
            (json!({"composition": "TiO2", "valid": true}), "composition_validator"),
        ];
        for (payload, tool) in cases {
            let detection = detect(payload.clone());
            assert_eq!(detection.tool.tool_name(), Some(tool), "payload {}", payload);
            assert!(detection.ambiguity.is_none());
        }
    }

    #[test]
    fn test_predicates_are_enforced() {
        assert_eq!(detect(json!({"mode": "generation", "results": []})).tool, DetectedTool::Unattributed);
        assert_eq!(detect(json!({"energies": 3})).tool, DetectedTool::Unattributed);
        assert_eq!(detect(json!({"composition": "TiO2", "valid": "yes"})).tool, DetectedTool::Unattributed);
        assert_eq!(detect(json!([1, 2, 3])).tool, DetectedTool::Unattributed);
    }

    #[test]
    fn test_specificity_wins_over_table_order() {
        let table = SignatureTable::new()
            .with(Signature::new("loose", &["composition"]))
            .with(Signature::new("tight", &["composition", "band_gap"]));
        let detection = table.detect(&json!({"composition": "GaN", "band_gap": 3.4}));
        assert_eq!(detection.tool.tool_name(), Some("tight"));
        let ambiguity = detection.ambiguity.unwrap();
        assert_eq!(ambiguity.chosen, "tight");
        assert_eq!(ambiguity.candidates, vec!["loose".to_string(), "tight".to_string()]);
    }

    #[test]
    fn test_tie_keeps_table_order_and_reports_ambiguity() {
        let detection = detect(json!({"composition": "TiO2", "formation_energy": -3.1, "valid": true}));
        assert_eq!(detection.tool.tool_name(), Some("energy_calculator"));
        let ambiguity = detection.ambiguity.unwrap();
        assert_eq!(
            ambiguity.candidates,
            vec!["energy_calculator".to_string(), "composition_validator".to_string()]
        );
    }

    #[test]
    fn test_declared_name_is_trusted_only_when_concrete_and_known() {
        let detector = ToolDetector::default();
        let payload = json!({"composition": "TiO2", "valid": true});

        let declared = detector.detect(Some("composition_validator"), &payload);
        assert_eq!(
            declared.tool,
            DetectedTool::Attributed {
                tool: "composition_validator".to_string(),
                source: DetectionSource::Declared,
            }
        );

        let generic = detector.detect(Some("mcp_tool"), &payload);
        assert_eq!(generic.tool, DetectedTool::by_signature("composition_validator"));

        let unknown = detector.detect(Some("weather_lookup"), &payload);
        assert_eq!(unknown.tool, DetectedTool::by_signature("composition_validator"));
    }

    #[test]
    fn test_generic_labels() {
        assert!(is_generic_label(""));
        assert!(is_generic_label("  "));
        assert!(is_generic_label("Tool"));
        assert!(is_generic_label("tool_call"));
        assert!(!is_generic_label("energy_calculator"));
    }
}
