//! Property tests: how wall-clock time is sliced into frames never changes
//! the physics, and static bodies never move.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Standard in tests

use clatter_contact::{ContactMaterial, MaterialRegistry};
use clatter_core::{CollisionShape, Pose, Stepper, World};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use proptest::prelude::*;

/// Two boxes over a ground plane, one tilted so contacts are not symmetric.
fn two_box_world() -> World {
    let mut registry = MaterialRegistry::new();
    let ground = registry.register("ground");
    let block = registry.register("box");

    let mut world = World::default();
    world
        .contact_materials_mut()
        .insert_all_pairs(&[ground, block], |_, _| ContactMaterial::new(0.5, 0.4))
        .unwrap();
    world.add_static_body(CollisionShape::ground_plane(), ground);
    world.add_dynamic_body(
        CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
        1.0,
        Pose::from_position(Point3::new(0.0, 1.5, 0.0)),
        block,
    );
    world.add_dynamic_body(
        CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
        1.0,
        Pose::from_position_rotation(
            Point3::new(0.4, 3.0, 0.2),
            UnitQuaternion::from_euler_angles(0.3, 0.1, 0.5),
        ),
        block,
    );
    world
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn frame_slicing_matches_direct_stepping(
        frames in prop::collection::vec(0.0f64..0.08, 1..40)
    ) {
        let mut driven = two_box_world();
        let mut stepper = Stepper::new();
        let mut substeps = 0;
        let mut driven_events = Vec::new();
        for elapsed in &frames {
            substeps += stepper
                .advance(&mut driven, *elapsed, |w, _| driven_events.extend(w.drain_events()))
                .unwrap();
        }

        let mut direct = two_box_world();
        let mut direct_events = Vec::new();
        for _ in 0..substeps {
            direct.step().unwrap();
            direct_events.extend(direct.drain_events());
        }

        let a: Vec<_> = driven.bodies().map(|b| b.state).collect();
        let b: Vec<_> = direct.bodies().map(|b| b.state).collect();
        prop_assert_eq!(a, b);
        prop_assert_eq!(driven_events, direct_events);
        prop_assert_eq!(driven.step_index(), substeps as u64);
    }

    #[test]
    fn static_bodies_never_move(
        x in -1.0f64..1.0,
        z in -1.0f64..1.0,
        roll in -1.0f64..1.0,
        yaw in -3.0f64..3.0,
        steps in 1usize..200,
    ) {
        let mut registry = MaterialRegistry::new();
        let stone = registry.register("stone");
        let block = registry.register("box");

        let mut world = World::default();
        let pose = Pose::from_position_rotation(
            Point3::new(x, 1.0, z),
            UnitQuaternion::from_euler_angles(roll, 0.0, yaw),
        );
        let pillar = world.add_static_body_at(
            CollisionShape::cuboid(Vector3::new(1.0, 1.0, 1.0)),
            pose,
            stone,
        );
        let dropped = world.add_dynamic_body(
            CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
            5.0,
            Pose::from_position(Point3::new(0.0, 4.0, 0.0)),
            block,
        );

        for _ in 0..steps {
            world.apply_force(pillar, Vector3::new(1e4, -1e4, 1e4)).unwrap();
            world.apply_force(dropped, Vector3::new(0.0, -50.0, 0.0)).unwrap();
            world.step().unwrap();
        }

        let body = world.body(pillar).unwrap();
        prop_assert_eq!(body.state.pose, pose);
        prop_assert_eq!(body.state.twist.linear, Vector3::zeros());
        prop_assert_eq!(body.state.twist.angular, Vector3::zeros());
    }
}
