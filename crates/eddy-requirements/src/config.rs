//! Declarative requirement entries, as read from a session file.
//!
//! ```toml
//! [[analysis.requirements]]
//! mesh = "fluid"
//! cell_arrays = ["pressure"]
//! point_arrays = ["velocity", "temperature"]
//! ```

use eddy_core::Association;
use serde::Deserialize;

use crate::registry::DataRequirements;

/// One mesh's requirements in configuration form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementConfig {
    /// Mesh name.
    pub mesh: String,
    /// Fetch the mesh without arrays.
    #[serde(default)]
    pub structure_only: bool,
    /// Required point arrays.
    #[serde(default)]
    pub point_arrays: Vec<String>,
    /// Required cell arrays.
    #[serde(default)]
    pub cell_arrays: Vec<String>,
    /// Required field arrays.
    #[serde(default)]
    pub field_arrays: Vec<String>,
}

impl RequirementConfig {
    fn arrays(&self, association: Association) -> &[String] {
        match association {
            Association::Point => &self.point_arrays,
            Association::Cell => &self.cell_arrays,
            Association::Field => &self.field_arrays,
        }
    }
}

impl DataRequirements {
    /// Build a registry from configuration entries, in order.
    pub fn from_configs(entries: &[RequirementConfig]) -> Self {
        let mut reqs = Self::new();
        for entry in entries {
            reqs.add_mesh(&entry.mesh, entry.structure_only);
            for association in Association::ALL {
                reqs.add_requirement(
                    &entry.mesh,
                    association,
                    entry.arrays(association).iter().cloned(),
                );
            }
        }
        reqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Doc {
        requirements: Vec<RequirementConfig>,
    }

    #[test]
    fn parses_and_builds_registry() {
        let doc: Doc = toml::from_str(
            r#"
            [[requirements]]
            mesh = "fluid"
            cell_arrays = ["pressure"]
            point_arrays = ["velocity"]

            [[requirements]]
            mesh = "outline"
            structure_only = true
            "#,
        )
        .unwrap();
        let reqs = DataRequirements::from_configs(&doc.requirements);

        let names: Vec<_> = reqs.required_meshes().collect();
        assert_eq!(names, ["fluid", "outline"]);
        let fluid: Vec<_> = reqs
            .array_requirements("fluid")
            .unwrap()
            .map(|a| (a.association, a.name.as_str()))
            .collect();
        assert_eq!(
            fluid,
            [(Association::Point, "velocity"), (Association::Cell, "pressure")]
        );
        let outline = reqs.mesh("outline").unwrap();
        assert!(outline.structure_only());
        assert_eq!(outline.arrays().len(), 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<RequirementConfig, _> =
            toml::from_str("mesh = \"m\"\nedge_arrays = [\"x\"]\n");
        assert!(res.is_err());
    }
}
