//! Conversion between [`InfluenceDiagram`] and the serializable
//! [`ModelDefinition`].

use sa_common::{NodeKind, Result, SCHEMA_VERSION};
use sa_config::{
    validate_definition, ArcDefinition, ModelDefinition, NodeDefinition, TableDefinition,
    VariableDefinition, VariableKind,
};

use super::diagram::InfluenceDiagram;

impl InfluenceDiagram {
    /// Build a diagram from a definition.
    ///
    /// The definition is validated first. Tables are applied in order:
    /// raw `values` or `fill`, then every slice in declaration order. The
    /// returned diagram is not validated; call [`InfluenceDiagram::validate`]
    /// or hand it to an engine.
    pub fn from_definition(def: &ModelDefinition) -> Result<Self> {
        validate_definition(def)?;

        let mut diagram = InfluenceDiagram::new(def.name.clone());
        for var in &def.variables {
            match var.kind {
                VariableKind::Labeled => {
                    diagram.registry_mut().create_variable(
                        &var.name,
                        &var.display_label,
                        var.labels.iter().cloned(),
                    )?;
                }
                VariableKind::Numeric => {
                    diagram
                        .registry_mut()
                        .create_numeric_variable(&var.name, &var.display_label)?;
                }
            }
        }
        for node in &def.nodes {
            diagram.add_node(&node.variable, node.kind)?;
        }
        for arc in &def.arcs {
            diagram.add_arc(&arc.parent, &arc.child)?;
        }
        for entry in &def.tables {
            let table = diagram.allocate_table(&entry.node)?;
            if let Some(values) = &entry.values {
                table.set_values(values.clone())?;
            }
            if let Some(fill) = &entry.fill {
                table.fill_uniform(fill)?;
            }
            for slice in &entry.slices {
                table.set_slice(
                    slice
                        .assignment
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                    &slice.values,
                )?;
            }
        }

        tracing::debug!(
            event = crate::logging::event_names::MODEL_BUILT,
            model = %diagram.name(),
            nodes = diagram.nodes().len(),
            arcs = diagram.arcs().len(),
            "diagram built from definition"
        );
        Ok(diagram)
    }
}

impl From<&InfluenceDiagram> for ModelDefinition {
    /// Export with raw flattened tables. Rebuilding from the export yields a
    /// diagram with identical tables and parent order.
    fn from(diagram: &InfluenceDiagram) -> Self {
        let registry = diagram.registry();
        let variables = registry
            .iter()
            .map(|v| VariableDefinition {
                name: v.name().to_string(),
                display_label: v.display_label().to_string(),
                kind: if v.is_numeric() {
                    VariableKind::Numeric
                } else {
                    VariableKind::Labeled
                },
                labels: v.labels().to_vec(),
            })
            .collect();
        let nodes = diagram
            .nodes()
            .iter()
            .map(|n| NodeDefinition {
                variable: n.name().to_string(),
                kind: n.kind(),
            })
            .collect();
        let arcs = diagram
            .arcs()
            .iter()
            .map(|&(p, c)| ArcDefinition {
                parent: registry[p].name().to_string(),
                child: registry[c].name().to_string(),
            })
            .collect();
        let tables = diagram
            .nodes()
            .iter()
            .filter(|n| n.kind() != NodeKind::Decision)
            .filter_map(|n| diagram.table_by_id(n.id()))
            .map(|t| TableDefinition {
                node: t.name().to_string(),
                fill: None,
                values: Some(t.values().to_vec()),
                slices: Vec::new(),
            })
            .collect();

        ModelDefinition {
            schema_version: SCHEMA_VERSION.to_string(),
            name: diagram.name().to_string(),
            description: None,
            variables,
            nodes,
            arcs,
            tables,
            inference: None,
        }
    }
}
