// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Importing decomposition results into a host scene
//!
//! The host is reached through [`SceneHost`]. Imported objects are found by
//! diffing object ids around the import, then renamed, grouped and styled.
//! The user's selection is restored afterwards whatever happens.

use crate::obj::read_obj;
use crate::Result;
use cursorbox_geometry::MeshScene;
use cursorbox_model::{MeshData, MeshQuery, ObjectId, SceneQuery};
use nalgebra::Matrix4;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

/// Collection that receives generated objects
pub const DEFAULT_COLLECTION: &str = "CursorBBox";

/// Selected objects and the active one
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: Vec<ObjectId>,
    pub active: Option<ObjectId>,
}

/// Scene operations the import pipeline needs from a host application
pub trait SceneHost {
    /// All object ids, in a stable order
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Import every object of a Y-up OBJ file as a new scene object
    fn import_obj(&mut self, path: &Path) -> Result<()>;

    fn selection(&self) -> SelectionState;

    /// Reselect exactly `selection`, skipping objects that no longer exist
    fn restore_selection(&mut self, selection: &SelectionState);

    fn object_name(&self, id: ObjectId) -> Option<String>;

    fn rename_object(&mut self, id: ObjectId, name: &str);

    /// Create the collection if it does not exist yet
    fn ensure_collection(&mut self, name: &str);

    /// Make `collection` the object's only collection
    fn move_to_collection(&mut self, id: ObjectId, collection: &str);

    /// Give a generated object the add-on's display style
    fn apply_default_style(&mut self, id: ObjectId);
}

/// Name of the `index`th hull made from `source`
pub fn hull_name(tag: &str, source: &str, index: usize) -> String {
    format!("{}_{}_{:03}", tag, source, index)
}

/// Import a result file and organise the new objects
///
/// Returns the created objects in import order.
pub fn import_results(
    host: &mut dyn SceneHost,
    path: &Path,
    source_name: &str,
    tag: &str,
    collection: &str,
) -> Result<Vec<ObjectId>> {
    let saved = host.selection();
    let result = import_and_organize(host, path, source_name, tag, collection);
    host.restore_selection(&saved);
    result
}

fn import_and_organize(
    host: &mut dyn SceneHost,
    path: &Path,
    source_name: &str,
    tag: &str,
    collection: &str,
) -> Result<Vec<ObjectId>> {
    let before: FxHashSet<ObjectId> = host.object_ids().into_iter().collect();
    host.import_obj(path)?;
    let created: Vec<ObjectId> = host
        .object_ids()
        .into_iter()
        .filter(|id| !before.contains(id))
        .collect();

    if !created.is_empty() {
        host.ensure_collection(collection);
    }
    for (i, &id) in created.iter().enumerate() {
        host.rename_object(id, &hull_name(tag, source_name, i));
        host.move_to_collection(id, collection);
        host.apply_default_style(id);
    }
    Ok(created)
}

// ============================================================================
// In-memory host
// ============================================================================

/// Host scene kept entirely in memory
///
/// Importing selects the new objects, as interactive hosts do.
#[derive(Debug, Default)]
pub struct MemoryScene {
    meshes: MeshScene,
    collections: Vec<String>,
    membership: FxHashMap<ObjectId, String>,
    styled: FxHashSet<ObjectId>,
    selection: SelectionState,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, data: MeshData, transform: Matrix4<f64>) -> ObjectId {
        self.meshes.add(name, data, transform)
    }

    pub fn meshes(&self) -> &MeshScene {
        &self.meshes
    }

    /// Replace the selection
    pub fn select(&mut self, selected: Vec<ObjectId>, active: Option<ObjectId>) {
        self.selection = SelectionState { selected, active };
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.iter().any(|c| c == name)
    }

    pub fn collection_of(&self, id: ObjectId) -> Option<&str> {
        self.membership.get(&id).map(String::as_str)
    }

    /// Objects in a collection, in scene order
    pub fn collection_members(&self, name: &str) -> Vec<ObjectId> {
        self.meshes
            .iter()
            .map(|o| o.id())
            .filter(|id| self.collection_of(*id) == Some(name))
            .collect()
    }

    pub fn is_styled(&self, id: ObjectId) -> bool {
        self.styled.contains(&id)
    }
}

impl SceneQuery for MemoryScene {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.meshes.object_ids()
    }

    fn object(&self, id: ObjectId) -> Option<&dyn MeshQuery> {
        self.meshes.object(id)
    }
}

impl SceneHost for MemoryScene {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.meshes.object_ids()
    }

    fn import_obj(&mut self, path: &Path) -> Result<()> {
        let objects = read_obj(path)?;
        let created: Vec<ObjectId> = objects
            .into_iter()
            .map(|o| self.meshes.add(o.name, o.mesh, Matrix4::identity()))
            .collect();
        let active = created.last().copied();
        self.select(created, active);
        Ok(())
    }

    fn selection(&self) -> SelectionState {
        self.selection.clone()
    }

    fn restore_selection(&mut self, selection: &SelectionState) {
        let exists = |id: &ObjectId| self.meshes.get(*id).is_some();
        let selected = selection.selected.iter().copied().filter(exists).collect();
        let active = selection.active.filter(exists);
        self.select(selected, active);
    }

    fn object_name(&self, id: ObjectId) -> Option<String> {
        self.meshes.get(id).map(|o| o.name().to_string())
    }

    fn rename_object(&mut self, id: ObjectId, name: &str) {
        if let Some(object) = self.meshes.get_mut(id) {
            object.set_name(name);
        }
    }

    fn ensure_collection(&mut self, name: &str) {
        if !self.has_collection(name) {
            self.collections.push(name.to_string());
        }
    }

    fn move_to_collection(&mut self, id: ObjectId, collection: &str) {
        self.ensure_collection(collection);
        self.membership.insert(id, collection.to_string());
    }

    fn apply_default_style(&mut self, id: ObjectId) {
        self.styled.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::{to_y_up, write_obj};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn write_hulls(dir: &Path, count: usize) -> std::path::PathBuf {
        let path = dir.join("output.obj");
        let meshes: Vec<MeshData> = (0..count)
            .map(|i| {
                let mut m = MeshData::cuboid(Point3::new(i as f64, 0.0, 0.0), Vector3::repeat(0.5));
                m.vertices = m.vertices.iter().map(to_y_up).collect();
                m
            })
            .collect();
        let named: Vec<(&str, &MeshData)> = meshes.iter().map(|m| ("hull", m)).collect();
        write_obj(std::fs::File::create(&path).unwrap(), &named).unwrap();
        path
    }

    #[test]
    fn test_hull_name() {
        assert_eq!(hull_name("VHACD", "Chair", 7), "VHACD_Chair_007");
        assert_eq!(hull_name("CoACD_U", "Box", 1234), "CoACD_U_Box_1234");
    }

    #[test]
    fn test_import_organises_and_restores_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_hulls(dir.path(), 2);

        let mut scene = MemoryScene::new();
        let source = scene.add("Chair", MeshData::default(), Matrix4::identity());
        let other = scene.add("Table", MeshData::default(), Matrix4::identity());
        scene.select(vec![other, source], Some(source));

        let created =
            import_results(&mut scene, &path, "Chair", "VHACD", DEFAULT_COLLECTION).unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(SceneHost::object_name(&scene, created[0]).unwrap(), "VHACD_Chair_000");
        assert_eq!(SceneHost::object_name(&scene, created[1]).unwrap(), "VHACD_Chair_001");
        assert_eq!(scene.collection_members(DEFAULT_COLLECTION), created);
        assert!(created.iter().all(|&id| scene.is_styled(id)));
        assert!(!scene.is_styled(source));
        assert_eq!(
            scene.selection(),
            SelectionState {
                selected: vec![other, source],
                active: Some(source)
            }
        );

        // Back in Z-up
        let bounds = scene.meshes().get(created[1]).unwrap().data().bounds().unwrap();
        assert_relative_eq!(bounds.center(), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_failed_import_restores_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = MemoryScene::new();
        let source = scene.add("Chair", MeshData::default(), Matrix4::identity());
        scene.select(vec![source], Some(source));

        let missing = dir.path().join("missing.obj");
        assert!(import_results(&mut scene, &missing, "Chair", "CoACD", DEFAULT_COLLECTION).is_err());
        assert_eq!(scene.selection().active, Some(source));
        assert!(!scene.has_collection(DEFAULT_COLLECTION));
    }
}
