//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        Extractor, ExtractorConfig, ExtractorError, SignatureTable, UnpairedSide, UnwrapError,
        ValueExtractor,
    };
    use attest_domain::{CallId, DetectedTool, Unit};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn analysis() -> DetectedTool {
        DetectedTool::by_signature("structure_analysis")
    }

    #[test]
    fn test_join_single_structure() {
        let payload = json!({
            "generated_structures": [{"composition": "TiO2", "structures": [{}]}],
            "energy_calculations": [{"structure_id": "TiO2_struct_1", "formation_energy": -6.823}]
        });
        let result = ValueExtractor::default()
            .extract(&analysis(), &CallId::new("c1"), &payload)
            .unwrap();

        assert_eq!(result.drafts.len(), 1);
        let draft = &result.drafts[0];
        assert_eq!(draft.property_name, "formation_energy");
        assert_eq!(draft.value, -6.823);
        assert_eq!(draft.unit, Unit::parse("eV/atom"));
        assert_eq!(draft.structure_id.as_deref(), Some("TiO2_struct_1"));
        assert_eq!(draft.source_tool, "structure_analysis");
        assert!(result.unpaired.is_empty());
        assert!(result.unknown_units.is_empty());
    }

    #[test]
    fn test_join_reports_both_sides_of_unpaired() {
        let payload = json!({
            "generated_structures": [
                {"composition": "SrTiO3", "structures": [{}, {}, {}]},
                {"composition": "BaTiO3"}
            ],
            "energy_calculations": [
                {"structure_id": "SrTiO3_struct_1", "formation_energy": -3.1},
                {"structure_id": "SrTiO3_struct_3", "formation_energy": -3.0},
                {"structure_id": "CaTiO3_struct_1", "formation_energy": -2.9},
                {"formation_energy": -1.0}
            ]
        });
        let result = ValueExtractor::default()
            .extract(&analysis(), &CallId::new("c1"), &payload)
            .unwrap();

        let ids: Vec<_> = result.drafts.iter().filter_map(|d| d.structure_id.as_deref()).collect();
        assert_eq!(ids, vec!["SrTiO3_struct_1", "SrTiO3_struct_3"]);

        let structures: Vec<_> = result
            .unpaired
            .iter()
            .filter(|u| u.side == UnpairedSide::Structure)
            .map(|u| u.structure_id.as_str())
            .collect();
        assert_eq!(structures, vec!["SrTiO3_struct_2", "BaTiO3_struct_1"]);

        let properties: Vec<_> = result
            .unpaired
            .iter()
            .filter(|u| u.side == UnpairedSide::Property)
            .map(|u| u.structure_id.as_str())
            .collect();
        assert_eq!(properties, vec!["#4", "CaTiO3_struct_1"]);
    }

    #[test]
    fn test_join_numbers_repeated_compositions() {
        let payload = json!({
            "generated_structures": [{"composition": "TiO2"}, {"composition": "TiO2"}],
            "energy_calculations": [
                {"structure_id": "TiO2_struct_2", "formation_energy": -6.1}
            ]
        });
        let result = ValueExtractor::default()
            .extract(&analysis(), &CallId::new("c1"), &payload)
            .unwrap();
        assert_eq!(result.drafts[0].structure_id.as_deref(), Some("TiO2_struct_2"));
        assert_eq!(result.unpaired.len(), 1);
        assert_eq!(result.unpaired[0].structure_id, "TiO2_struct_1");
    }

    #[test]
    fn test_join_requires_arrays() {
        let payload = json!({"generated_structures": {}, "energy_calculations": []});
        let result = ValueExtractor::default().extract(&analysis(), &CallId::new("c1"), &payload);
        assert!(matches!(result, Err(ExtractorError::InvalidFormat(_))));
    }

    #[test]
    fn test_unit_resolution_order() {
        let payload = json!({
            "units": {"band_gap": "meV", "density": "kg/m^3"},
            "energies": [{
                "structure_id": "GaN_1",
                "formation_energy": -1.2,
                "formation_energy_unit": "eV",
                "band_gap": 3.4,
                "units": {"band_gap": "eV"},
                "density": 6.15,
                "score": 0.7
            }]
        });
        let result = ValueExtractor::default()
            .extract(&DetectedTool::by_signature("energy_calculator"), &CallId::new("c1"), &payload)
            .unwrap();

        let unit_of = |name: &str| {
            result
                .drafts
                .iter()
                .find(|d| d.property_name == name)
                .map(|d| d.unit.clone())
                .unwrap()
        };
        // Sibling key beats the declared eV/atom
        assert_eq!(unit_of("formation_energy"), Unit::parse("eV"));
        // Element map beats root map
        assert_eq!(unit_of("band_gap"), Unit::parse("eV"));
        assert_eq!(unit_of("density"), Unit::parse("kg/m^3"));
        assert_eq!(unit_of("score"), Unit::Unknown);

        assert_eq!(result.unknown_units.len(), 1);
        assert_eq!(result.unknown_units[0].property_name, "score");
    }

    #[test]
    fn test_records_ids_and_flat_fallback() {
        let extractor = ValueExtractor::default();
        let database = DetectedTool::by_signature("database_lookup");
        let payload = json!({
            "mode": "database",
            "results": [
                {"material_id": "mp-2657", "composition": "TiO2", "band_gap": 3.0, "valid": true},
                {"composition": "TiO2", "band_gap": 2.9}
            ]
        });
        let result = extractor.extract(&database, &CallId::new("c1"), &payload).unwrap();
        let ids: Vec<_> = result.drafts.iter().filter_map(|d| d.structure_id.as_deref()).collect();
        assert_eq!(ids, vec!["mp-2657", "TiO2_2"]);

        let flat = json!({"composition": "TiO2", "formation_energy": -3.4, "energy_above_hull": 0.0});
        let result = extractor
            .extract(&DetectedTool::by_signature("energy_calculator"), &CallId::new("c2"), &flat)
            .unwrap();
        assert_eq!(result.drafts.len(), 2);
        assert!(result.drafts.iter().all(|d| d.structure_id.as_deref() == Some("TiO2")));
    }

    #[test]
    fn test_ids_and_booleans_are_not_values() {
        let payload = json!({
            "composition": "TiO2",
            "valid": true,
            "formation_energy": -3.4,
            "index": 2,
            "structure_id": "TiO2_a",
            "label": "-1.0"
        });
        let result = ValueExtractor::default()
            .extract(&DetectedTool::by_signature("energy_calculator"), &CallId::new("c1"), &payload)
            .unwrap();
        assert_eq!(result.drafts.len(), 1);
        assert_eq!(result.drafts[0].property_name, "formation_energy");
        assert_eq!(result.drafts[0].structure_id.as_deref(), Some("TiO2_a"));
    }

    #[test]
    fn test_validator_yields_no_values() {
        let payload = json!({"composition": "TiO2", "valid": true, "charge_balance": 0});
        let result = ValueExtractor::default()
            .extract(&DetectedTool::by_signature("composition_validator"), &CallId::new("c1"), &payload)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_artifact_descriptors() {
        let payload = json!({
            "mode": "generation",
            "structures": [{"structure_id": "TiO2_struct_1", "volume": 62.4}],
            "artifacts": [
                {"path": "out/TiO2_struct_1.cif", "content": "data_TiO2", "structure_id": "TiO2_struct_1"},
                {"name": "summary.json"},
                "raw/log.txt",
                {"size": 10}
            ]
        });
        let result = ValueExtractor::default()
            .extract(&DetectedTool::by_signature("structure_generator"), &CallId::new("c1"), &payload)
            .unwrap();

        assert_eq!(result.artifacts.len(), 3);
        assert_eq!(result.artifacts[0].content.as_deref(), Some("data_TiO2"));
        assert_eq!(result.artifacts[0].structure_id.as_deref(), Some("TiO2_struct_1"));
        assert_eq!(result.artifacts[1].reference, "summary.json");
        assert_eq!(result.artifacts[2].reference, "raw/log.txt");
    }

    #[test]
    fn test_unattributed_and_unknown_tools_are_refused() {
        let extractor = ValueExtractor::default();
        let payload = json!({"a": 1});
        assert_eq!(
            extractor.extract(&DetectedTool::Unattributed, &CallId::new("c1"), &payload),
            Err(ExtractorError::Unattributed)
        );
        assert_eq!(
            extractor.extract(&DetectedTool::declared("weather"), &CallId::new("c1"), &payload),
            Err(ExtractorError::NoProfile("weather".to_string()))
        );
    }

    #[test]
    fn test_process_runs_all_stages() {
        let extractor = Extractor::default();
        let inner = json!({"composition": "TiO2", "formation_energy": -3.4}).to_string();
        let raw = json!({"content": [{"type": "text", "text": inner}]});

        let processed = extractor.process(Some("mcp_tool"), &CallId::new("c9"), &raw).unwrap();
        assert_eq!(processed.layers, 2);
        assert_eq!(processed.detection.tool.tool_name(), Some("energy_calculator"));
        let extraction = processed.extraction.unwrap();
        assert_eq!(extraction.drafts[0].call_id.as_str(), "c9");

        let unknown = extractor.process(None, &CallId::new("c10"), &json!({"weather": "sunny"})).unwrap();
        assert_eq!(unknown.detection.tool, DetectedTool::Unattributed);
        assert!(unknown.extraction.is_none());
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let result = Extractor::try_new(ExtractorConfig { max_unwrap_depth: 0 });
        assert!(matches!(result, Err(ExtractorError::Config(_))));
        assert!(Extractor::try_new(ExtractorConfig::default()).is_ok());
    }

    #[test]
    fn test_process_honours_unwrap_depth() {
        let extractor = Extractor::with_config(ExtractorConfig { max_unwrap_depth: 1 });
        let raw = json!({"result": json!({"energies": []}).to_string()});
        assert_eq!(
            extractor.process(None, &CallId::new("c1"), &raw),
            Err(ExtractorError::Unwrap(UnwrapError::DepthExceeded { max_depth: 1 }))
        );
    }

    fn structure_group() -> impl Strategy<Value = (String, usize)> {
        (prop::sample::select(vec!["TiO2", "SrTiO3", "GaN", "ZnO"]), 0usize..4)
            .prop_map(|(composition, count)| (composition.to_string(), count))
    }

    proptest! {
        // Joining S structures with E property elements yields exactly one
        // value per id present on both sides, and reports every other id
        #[test]
        fn prop_join_pairs_intersection(
            groups in prop::collection::vec(structure_group(), 0..5),
            extra_ids in prop::collection::vec(0usize..6, 0..6),
        ) {
            let mut structure_ids = Vec::new();
            let mut counters = std::collections::HashMap::new();
            let mut generated = Vec::new();
            for (composition, count) in &groups {
                let structures: Vec<Value> = (0..*count).map(|_| json!({})).collect();
                generated.push(json!({"composition": composition, "structures": structures}));
                let counter = counters.entry(composition.clone()).or_insert(0usize);
                for _ in 0..*count {
                    *counter += 1;
                    structure_ids.push(format!("{}_struct_{}", composition, counter));
                }
            }

            let mut property_ids: Vec<String> = extra_ids
                .iter()
                .map(|n| format!("TiO2_struct_{}", n + 1))
                .collect();
            property_ids.sort();
            property_ids.dedup();
            let calculations: Vec<Value> = property_ids
                .iter()
                .map(|id| json!({"structure_id": id, "formation_energy": -1.5}))
                .collect();

            let payload = json!({
                "generated_structures": generated,
                "energy_calculations": calculations,
            });
            let result = ValueExtractor::default()
                .extract(&DetectedTool::by_signature("structure_analysis"), &CallId::new("c"), &payload)
                .unwrap();

            let paired = structure_ids.iter().filter(|id| property_ids.contains(id)).count();
            prop_assert_eq!(result.drafts.len(), paired);
            prop_assert_eq!(
                result.unpaired.len(),
                structure_ids.len() - paired + property_ids.len() - paired
            );
        }

        // Detection depends only on the payload
        #[test]
        fn prop_detection_is_deterministic(
            keys in prop::collection::vec(
                prop::sample::select(vec![
                    "composition", "formation_energy", "valid", "energies", "mode",
                    "results", "structures", "generated_structures", "energy_calculations",
                ]),
                0..6,
            ),
        ) {
            let mut payload = serde_json::Map::new();
            for key in keys {
                let value = match key {
                    "valid" => json!(true),
                    "mode" => json!("database"),
                    "composition" => json!("TiO2"),
                    "formation_energy" => json!(-1.0),
                    _ => json!([]),
                };
                payload.insert(key.to_string(), value);
            }
            let payload = Value::Object(payload);

            let table = SignatureTable::default();
            let first = table.detect(&payload);
            let second = table.detect(&payload);
            prop_assert_eq!(first, second);
        }
    }
}
