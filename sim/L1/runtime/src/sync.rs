//! Body → visual proxy synchronization.
//!
//! Proxies live outside the world. A [`ProxyBindings`] map ties each body to
//! exactly one proxy, and [`Synchronizer::sync`] copies the latest pose of
//! every bound body into its proxy verbatim. There is no interpolation
//! between steps: a proxy always shows the most recent physics state.

use clatter_core::{BodyId, World};
use glam::{Quat, Vec3};
use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::convert::transform_from_pose;

/// Render-side transform of a proxy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    /// Position in world space.
    pub translation: Vec3,
    /// Orientation in world space.
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Geometry a renderer should draw for a proxy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProxyShape {
    /// Box with half-extents.
    Cuboid {
        /// Half-extents along each local axis.
        half_extents: Vec3,
    },
    /// Sphere with radius.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// Infinite plane.
    Plane {
        /// Local normal.
        normal: Vec3,
        /// Offset along the normal.
        offset: f32,
    },
}

/// Index of a proxy inside a [`Synchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub usize);

/// A renderable stand-in for one body.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualProxy {
    /// Label for debugging and renderers.
    pub label: String,
    /// What to draw.
    pub shape: ProxyShape,
    /// Where to draw it, updated by [`Synchronizer::sync`].
    pub transform: Transform,
}

impl VisualProxy {
    /// Create a proxy at the identity transform.
    #[must_use]
    pub fn new(label: impl Into<String>, shape: ProxyShape) -> Self {
        Self {
            label: label.into(),
            shape,
            transform: Transform::default(),
        }
    }
}

/// One-to-one mapping between bodies and proxies.
#[derive(Debug, Clone, Default)]
pub struct ProxyBindings {
    body_to_proxy: HashMap<BodyId, ProxyId>,
    proxy_to_body: HashMap<ProxyId, BodyId>,
}

impl ProxyBindings {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `body` to `proxy`, dropping any binding either side had.
    pub fn insert(&mut self, body: BodyId, proxy: ProxyId) {
        self.remove_by_body(body);
        self.remove_by_proxy(proxy);
        self.body_to_proxy.insert(body, proxy);
        self.proxy_to_body.insert(proxy, body);
    }

    /// Remove a binding by body.
    pub fn remove_by_body(&mut self, body: BodyId) -> Option<ProxyId> {
        let proxy = self.body_to_proxy.remove(&body)?;
        self.proxy_to_body.remove(&proxy);
        Some(proxy)
    }

    /// Remove a binding by proxy.
    pub fn remove_by_proxy(&mut self, proxy: ProxyId) -> Option<BodyId> {
        let body = self.proxy_to_body.remove(&proxy)?;
        self.body_to_proxy.remove(&body);
        Some(body)
    }

    /// Proxy bound to a body.
    #[must_use]
    pub fn proxy_for(&self, body: BodyId) -> Option<ProxyId> {
        self.body_to_proxy.get(&body).copied()
    }

    /// Body bound to a proxy.
    #[must_use]
    pub fn body_for(&self, proxy: ProxyId) -> Option<BodyId> {
        self.proxy_to_body.get(&proxy).copied()
    }

    /// All bindings as `(body, proxy)`.
    pub fn iter(&self) -> impl Iterator<Item = (BodyId, ProxyId)> + '_ {
        self.body_to_proxy.iter().map(|(b, p)| (*b, *p))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body_to_proxy.len()
    }

    /// Whether no body is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body_to_proxy.is_empty()
    }
}

/// Outcome of one [`Synchronizer::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Proxies whose transform was copied.
    pub updated: usize,
    /// Bindings whose body the world no longer has.
    pub missing: usize,
}

/// Owns the proxies and copies body poses into them.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    proxies: Vec<VisualProxy>,
    bindings: ProxyBindings,
}

impl Synchronizer {
    /// Create an empty synchronizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a proxy for `body` and bind them.
    ///
    /// If `body` already has a proxy, the new one takes its slot and id, so
    /// every body is drawn at most once.
    pub fn spawn(&mut self, body: BodyId, proxy: VisualProxy) -> ProxyId {
        if let Some(id) = self.bindings.proxy_for(body) {
            if let Some(slot) = self.proxies.get_mut(id.0) {
                debug!(%body, proxy = id.0, "replacing proxy of rebound body");
                *slot = proxy;
                return id;
            }
        }
        let id = ProxyId(self.proxies.len());
        self.proxies.push(proxy);
        self.bindings.insert(body, id);
        id
    }

    /// All proxies, bound or not.
    #[must_use]
    pub fn proxies(&self) -> &[VisualProxy] {
        &self.proxies
    }

    /// Proxy by id.
    #[must_use]
    pub fn proxy(&self, id: ProxyId) -> Option<&VisualProxy> {
        self.proxies.get(id.0)
    }

    /// Proxy bound to `body`.
    #[must_use]
    pub fn proxy_for(&self, body: BodyId) -> Option<&VisualProxy> {
        self.bindings.proxy_for(body).and_then(|id| self.proxy(id))
    }

    /// Body ↔ proxy bindings.
    #[must_use]
    pub fn bindings(&self) -> &ProxyBindings {
        &self.bindings
    }

    /// Copy the current pose of every bound body into its proxy.
    pub fn sync(&mut self, world: &World) -> SyncReport {
        let mut report = SyncReport::default();

        for (body_id, proxy_id) in self.bindings.iter() {
            let Some(body) = world.body(body_id) else {
                report.missing += 1;
                continue;
            };
            if let Some(proxy) = self.proxies.get_mut(proxy_id.0) {
                proxy.transform = transform_from_pose(&body.state.pose);
                report.updated += 1;
            }
        }

        trace!(updated = report.updated, missing = report.missing, "proxies synced");
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clatter_contact::MaterialRegistry;
    use clatter_core::{CollisionShape, Pose};
    use nalgebra::{Point3, UnitQuaternion, Vector3};

    fn cube() -> ProxyShape {
        ProxyShape::Cuboid {
            half_extents: Vec3::splat(0.5),
        }
    }

    #[test]
    fn bindings_stay_one_to_one() {
        let mut map = ProxyBindings::new();
        map.insert(BodyId::new(1), ProxyId(0));
        map.insert(BodyId::new(2), ProxyId(0));

        assert_eq!(map.len(), 1);
        assert_eq!(map.proxy_for(BodyId::new(1)), None);
        assert_eq!(map.body_for(ProxyId(0)), Some(BodyId::new(2)));

        map.insert(BodyId::new(2), ProxyId(3));
        assert_eq!(map.len(), 1);
        assert_eq!(map.body_for(ProxyId(0)), None);
        assert_eq!(map.remove_by_proxy(ProxyId(3)), Some(BodyId::new(2)));
        assert!(map.is_empty());
    }

    #[test]
    fn sync_copies_latest_pose_verbatim() {
        let mut registry = MaterialRegistry::new();
        let m = registry.register("box");
        let mut world = World::default();
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, 5.0, -2.0),
            UnitQuaternion::from_euler_angles(0.2, 0.4, 0.6),
        );
        let id = world.add_dynamic_body(
            CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
            1.0,
            pose,
            m,
        );

        let mut sync = Synchronizer::new();
        let proxy = sync.spawn(id, VisualProxy::new("box", cube()));
        assert_eq!(sync.proxy(proxy).unwrap().transform, Transform::default());

        world.run_steps(3).unwrap();
        let report = sync.sync(&world);

        assert_eq!(report, SyncReport { updated: 1, missing: 0 });
        let expected = transform_from_pose(&world.body(id).unwrap().state.pose);
        assert_eq!(sync.proxy_for(id).unwrap().transform, expected);
    }

    #[test]
    fn missing_bodies_are_counted() {
        let world = World::default();
        let mut sync = Synchronizer::new();
        sync.spawn(BodyId::new(99), VisualProxy::new("ghost", cube()));

        assert_eq!(sync.sync(&world), SyncReport { updated: 0, missing: 1 });
    }

    #[test]
    fn respawn_replaces_old_proxy() {
        let mut sync = Synchronizer::new();
        let other = sync.spawn(BodyId::new(2), VisualProxy::new("other", cube()));
        let first = sync.spawn(BodyId::new(1), VisualProxy::new("a", cube()));
        let second = sync.spawn(
            BodyId::new(1),
            VisualProxy::new("b", ProxyShape::Sphere { radius: 0.5 }),
        );

        assert_eq!(second, first);
        assert_eq!(sync.proxies().len(), 2);
        assert!(sync.proxies().iter().all(|p| p.label != "a"));
        assert_eq!(sync.proxy_for(BodyId::new(1)).unwrap().label, "b");
        assert_eq!(sync.bindings().body_for(other), Some(BodyId::new(2)));
        assert_eq!(sync.bindings().len(), 2);
    }

    #[test]
    fn respawned_proxy_is_synced() {
        let mut registry = MaterialRegistry::new();
        let m = registry.register("box");
        let mut world = World::default();
        let id = world.add_dynamic_body(
            CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
            1.0,
            Pose::from_position(Point3::new(0.0, 3.0, 0.0)),
            m,
        );

        let mut sync = Synchronizer::new();
        sync.spawn(id, VisualProxy::new("a", cube()));
        sync.spawn(id, VisualProxy::new("b", cube()));

        assert_eq!(sync.sync(&world), SyncReport { updated: 1, missing: 0 });
        let expected = transform_from_pose(&world.body(id).unwrap().state.pose);
        assert!(sync.proxies().iter().all(|p| p.transform == expected));
    }
}
