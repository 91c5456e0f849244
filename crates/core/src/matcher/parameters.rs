use super::normalise::parameter_key;
use crate::masters::TestDefinition;
use crate::model::{RawParameter, ResolvedParameter};

/// Links submitted parameters to the definition's parameter list.
///
/// Names are compared ignoring case and whitespace. A hit attaches the parameter and unit
/// references; a miss keeps the submitted parameter unchanged. Order and values are preserved.
pub fn resolve_parameters(
    definition: Option<&TestDefinition>,
    submitted: &[RawParameter],
) -> Vec<ResolvedParameter> {
    submitted
        .iter()
        .map(|raw| {
            let mut resolved = ResolvedParameter::unresolved(raw);
            let key = parameter_key(&raw.name);
            let hit = definition.and_then(|def| {
                def.parameters
                    .iter()
                    .find(|p| parameter_key(&p.name) == key)
            });
            if let Some(param) = hit {
                resolved.parameter_ref = Some(param.id);
                resolved.unit_ref = param.unit_id;
            }
            resolved
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masters::TestParameterDef;
    use lab_uuid::RecordId;

    #[test]
    fn test_resolve_parameters_matches_ignoring_case_and_spacing() {
        let unit = RecordId::new();
        let definition = TestDefinition {
            id: RecordId::new(),
            name: "CBC".into(),
            short_name: None,
            category_id: None,
            parameters: vec![TestParameterDef {
                id: RecordId::new(),
                name: "Total WBC Count".into(),
                unit_id: Some(unit),
            }],
        };
        let submitted = vec![
            RawParameter {
                name: "total wbc  count".into(),
                value: Some("7200".into()),
                ..Default::default()
            },
            RawParameter {
                name: "Platelets".into(),
                value: Some("2.1".into()),
                ..Default::default()
            },
        ];

        let resolved = resolve_parameters(Some(&definition), &submitted);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].parameter_ref, Some(definition.parameters[0].id));
        assert_eq!(resolved[0].unit_ref, Some(unit));
        assert_eq!(resolved[0].value.as_deref(), Some("7200"));
        assert!(resolved[1].parameter_ref.is_none());
        assert_eq!(resolved[1].name, "Platelets");
    }

    #[test]
    fn test_resolve_parameters_without_definition_keeps_input() {
        let submitted = vec![RawParameter {
            name: "Hb".into(),
            value: Some("12".into()),
            ..Default::default()
        }];

        let resolved = resolve_parameters(None, &submitted);
        assert_eq!(resolved, vec![ResolvedParameter::unresolved(&submitted[0])]);
    }
}
