use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::warn;

use crate::config::MeshConfig;
use crate::materials::Material;
use crate::schema::Region;

/// Opaque reference to geometry owned by the mesh loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GeometryHandle(pub u64);

/// What a mesh loader hands back: named sub-geometries and named materials.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub nodes: BTreeMap<String, GeometryHandle>,
    pub materials: BTreeMap<String, Material>,
}

pub trait MeshSource {
    fn load_mesh(&self, path: &str) -> Result<MeshAsset>;
}

/// Stand-in loader that exposes the configured node and material names
/// without reading any geometry.
pub struct NodeTable {
    mesh: MeshConfig,
}

impl NodeTable {
    pub fn new(mesh: MeshConfig) -> Self {
        Self { mesh }
    }
}

impl MeshSource for NodeTable {
    fn load_mesh(&self, path: &str) -> Result<MeshAsset> {
        if path.trim().is_empty() {
            bail!("mesh path cannot be empty");
        }
        let nodes = self
            .mesh
            .nodes
            .values()
            .enumerate()
            .map(|(index, name)| (name.clone(), GeometryHandle(index as u64 + 1)))
            .collect();
        let materials = [&self.mesh.base_material, &self.mesh.button_material]
            .into_iter()
            .map(|name| (name.clone(), Material::new(name.clone())))
            .collect();
        Ok(MeshAsset { nodes, materials })
    }
}

#[derive(Debug, Clone)]
pub struct RegionBindings {
    pub geometry: BTreeMap<Region, GeometryHandle>,
    pub base_material: Material,
    pub button_material: Option<Material>,
}

/// Maps the configured node names onto regions. Missing nodes are skipped
/// with a warning; a missing base material is fatal.
pub fn bind_regions(asset: &MeshAsset, mesh: &MeshConfig) -> Result<RegionBindings> {
    let Some(base_material) = asset.materials.get(&mesh.base_material) else {
        bail!(
            "mesh has no base material '{}' (found: {})",
            mesh.base_material,
            asset
                .materials
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    };
    let button_material = asset.materials.get(&mesh.button_material).cloned();
    if button_material.is_none() {
        warn!(material = %mesh.button_material, "mesh has no button material");
    }

    let mut geometry = BTreeMap::new();
    for (region, node) in &mesh.nodes {
        match asset.nodes.get(node) {
            Some(handle) => {
                geometry.insert(*region, *handle);
            }
            None => warn!(%region, node = %node, "mesh node not found; region skipped"),
        }
    }

    Ok(RegionBindings {
        geometry,
        base_material: base_material.clone(),
        button_material,
    })
}

#[cfg(test)]
mod tests {
    use super::{bind_regions, MeshSource, NodeTable};
    use crate::config::MeshConfig;
    use crate::schema::Region;

    #[test]
    fn node_table_binds_every_configured_region() {
        let config = MeshConfig::default();
        let asset = NodeTable::new(config.clone())
            .load_mesh(&config.path)
            .unwrap();
        let bindings = bind_regions(&asset, &config).unwrap();
        assert_eq!(bindings.geometry.len(), Region::ALL.len());
        assert!(bindings.button_material.is_some());
    }

    #[test]
    fn missing_nodes_are_skipped_and_missing_base_fails() {
        let config = MeshConfig::default();
        let mut asset = NodeTable::new(config.clone())
            .load_mesh(&config.path)
            .unwrap();
        asset.nodes.remove("collar_back");
        let bindings = bind_regions(&asset, &config).unwrap();
        assert!(!bindings.geometry.contains_key(&Region::CollarBack));

        asset.materials.remove(&config.base_material);
        assert!(bind_regions(&asset, &config).is_err());
    }
}
