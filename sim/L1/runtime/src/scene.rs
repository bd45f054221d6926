//! Demo scene assembly.
//!
//! Each scene is a ground plane plus one or more 1 kg boxes, a fully
//! populated contact-material table, a proxy for every body and a cue
//! router that sends ground contacts to `hit1` and everything else to
//! `hit2`.

use clatter_contact::MaterialRegistry;
use clatter_core::{
    BodyId, CollisionShape, ContactMaterial, MaterialId, Pose, SimulationConfig, World,
};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::convert::proxy_shape;
use crate::events::CueRouter;
use crate::sync::{Synchronizer, VisualProxy};

/// Cue for contacts with the ground.
pub const GROUND_CUE: &str = "hit1";

/// Cue for every other contact.
pub const BODY_CUE: &str = "hit2";

/// Half-extent of every demo box.
pub const BOX_HALF_EXTENT: f64 = 0.5;

/// Mass of every demo box (kg).
pub const BOX_MASS: f64 = 1.0;

/// Which demo to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// One box dropped from 10 m onto a bouncy ground.
    Drop,
    /// Two boxes with their own materials.
    Pair,
    /// `count` boxes scattered above the ground.
    Tumble {
        /// Number of boxes.
        count: usize,
        /// Seed for the horizontal scatter.
        seed: u64,
    },
}

impl SceneKind {
    /// Tumble scene with the default ten boxes.
    #[must_use]
    pub const fn tumble(seed: u64) -> Self {
        Self::Tumble { count: 10, seed }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Pair => "pair",
            Self::Tumble { .. } => "tumble",
        }
    }
}

/// An assembled scene, ready to hand to a frame driver.
#[derive(Debug, Clone)]
pub struct Scene {
    /// The physics world.
    pub world: World,
    /// Proxies bound to every body.
    pub synchronizer: Synchronizer,
    /// Cue selection for contact events.
    pub router: CueRouter,
    /// Material names.
    pub materials: MaterialRegistry,
}

impl Scene {
    /// Build a scene with the default simulation config.
    ///
    /// # Errors
    ///
    /// Returns an error if a contact material is invalid.
    pub fn build(kind: SceneKind) -> clatter_core::Result<Self> {
        Self::build_with_config(kind, SimulationConfig::default())
    }

    /// Build a scene with a custom simulation config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or a contact material is invalid.
    pub fn build_with_config(
        kind: SceneKind,
        config: SimulationConfig,
    ) -> clatter_core::Result<Self> {
        config.validate()?;
        let mut builder = SceneBuilder::new(config);

        match kind {
            SceneKind::Drop => {
                let block = builder.materials.register("box");
                builder.add_box("box", Point3::new(0.0, 10.0, 0.0), block);
                builder.pair_with_ground(block, ContactMaterial::new(0.9, 0.9))?;
            }
            SceneKind::Pair => {
                let m1 = builder.materials.register("box1");
                let m2 = builder.materials.register("box2");
                builder.add_box("box1", Point3::new(0.0, 10.0, 0.0), m1);
                builder.add_box("box2", Point3::new(0.4, 13.0, 0.2), m2);
                builder.pair_with_ground(m1, ContactMaterial::new(0.9, 0.9))?;
                builder.pair_with_ground(m2, ContactMaterial::new(0.0, 0.9))?;
                builder
                    .world
                    .set_contact_material(m1, m2, ContactMaterial::new(0.3, 0.5))?;
            }
            SceneKind::Tumble { count, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut ids = vec![builder.ground_material];
                for i in 0..count {
                    let name = format!("box{i}");
                    let material = builder.materials.register(name.as_str());
                    let position = Point3::new(
                        rng.gen_range(-2.0..=2.0),
                        (i as f64 + 2.0) * 2.0,
                        rng.gen_range(-2.0..=2.0),
                    );
                    builder.add_box(&name, position, material);
                    ids.push(material);
                }

                let ground = builder.ground_material;
                builder
                    .world
                    .contact_materials_mut()
                    .insert_all_pairs(&ids, |a, b| {
                        if a == ground || b == ground {
                            ContactMaterial::new(50.0, 0.1)
                        } else {
                            ContactMaterial::new(50.0, 0.2)
                        }
                    })?;
            }
        }

        let scene = builder.finish();
        info!(
            scene = kind.name(),
            bodies = scene.world.body_count(),
            materials = scene.materials.len(),
            pairs = scene.world.contact_materials().len(),
            "scene assembled"
        );
        Ok(scene)
    }

    /// Body id for a body name, if any body carries it.
    #[must_use]
    pub fn body_named(&self, name: &str) -> Option<BodyId> {
        self.world
            .bodies()
            .find(|b| b.name.as_deref() == Some(name))
            .map(|b| b.id)
    }
}

struct SceneBuilder {
    world: World,
    synchronizer: Synchronizer,
    materials: MaterialRegistry,
    ground_material: MaterialId,
}

impl SceneBuilder {
    fn new(config: SimulationConfig) -> Self {
        let mut materials = MaterialRegistry::new();
        let ground_material = materials.register("ground");
        let mut builder = Self {
            world: World::new(config),
            synchronizer: Synchronizer::new(),
            materials,
            ground_material,
        };

        let ground = builder
            .world
            .add_static_body(CollisionShape::ground_plane(), ground_material);
        builder.bind(ground, "ground");
        builder
    }

    fn add_box(&mut self, name: &str, position: Point3<f64>, material: MaterialId) -> BodyId {
        let id = self.world.add_dynamic_body(
            CollisionShape::cuboid(Vector3::repeat(BOX_HALF_EXTENT)),
            BOX_MASS,
            Pose::from_position(position),
            material,
        );
        self.bind(id, name);
        id
    }

    fn bind(&mut self, id: BodyId, name: &str) {
        if let Some(body) = self.world.body_mut(id) {
            body.name = Some(name.to_owned());
            let proxy = VisualProxy::new(name, proxy_shape(&body.shape));
            self.synchronizer.spawn(id, proxy);
        }
    }

    fn pair_with_ground(
        &mut self,
        material: MaterialId,
        entry: ContactMaterial,
    ) -> clatter_core::Result<()> {
        self.world
            .set_contact_material(self.ground_material, material, entry)?;
        Ok(())
    }

    fn finish(mut self) -> Scene {
        self.synchronizer.sync(&self.world);
        Scene {
            world: self.world,
            synchronizer: self.synchronizer,
            router: CueRouter::new(BODY_CUE).with_surface(self.ground_material, GROUND_CUE),
            materials: self.materials,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn drop_scene_layout() {
        let scene = Scene::build(SceneKind::Drop).unwrap();
        assert_eq!(scene.world.body_count(), 2);
        assert_eq!(scene.synchronizer.proxies().len(), 2);
        assert!(scene.world.missing_material_pairs().is_empty());

        let block = scene.body_named("box").unwrap();
        let proxy = scene.synchronizer.proxy_for(block).unwrap();
        assert_eq!(proxy.transform.translation.y, 10.0);
    }

    #[test]
    fn pair_scene_materials() {
        let scene = Scene::build(SceneKind::Pair).unwrap();
        let ground = scene.materials.find("ground").unwrap();
        let m1 = scene.materials.find("box1").unwrap();
        let m2 = scene.materials.find("box2").unwrap();
        let table = scene.world.contact_materials();

        assert_eq!(table.get(m1, ground), Some(&ContactMaterial::new(0.9, 0.9)));
        assert_eq!(table.get(ground, m2), Some(&ContactMaterial::new(0.0, 0.9)));
        assert_eq!(table.get(m2, m1), Some(&ContactMaterial::new(0.3, 0.5)));
        assert!(scene.world.missing_material_pairs().is_empty());
    }

    #[test]
    fn tumble_scene_is_seeded() {
        let a = Scene::build(SceneKind::Tumble { count: 6, seed: 7 }).unwrap();
        let b = Scene::build(SceneKind::Tumble { count: 6, seed: 7 }).unwrap();
        let c = Scene::build(SceneKind::Tumble { count: 6, seed: 8 }).unwrap();

        let positions = |s: &Scene| -> Vec<_> {
            s.world.bodies().map(|b| b.state.pose.position).collect()
        };
        assert_eq!(positions(&a), positions(&b));
        assert_ne!(positions(&a), positions(&c));

        for (i, body) in a.world.bodies().skip(1).enumerate() {
            let p = body.state.pose.position;
            assert!(p.x.abs() <= 2.0 && p.z.abs() <= 2.0);
            assert_eq!(p.y, (i as f64 + 2.0) * 2.0);
        }
        assert!(a.world.missing_material_pairs().is_empty());
        assert_eq!(a.materials.len(), 7);
    }

    #[test]
    fn ground_routes_to_its_own_cue() {
        let scene = Scene::build(SceneKind::Drop).unwrap();
        assert_eq!(scene.router.default_cue(), BODY_CUE);
        assert_eq!(SceneKind::tumble(0), SceneKind::Tumble { count: 10, seed: 0 });
    }
}
