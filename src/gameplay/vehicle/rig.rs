use super::model::{collect_part_points, points_bounds, resolve_parts, snapshot_nodes};
use super::*;
use crate::config::RigConfig;
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelSlot {
    BackLeft,
    BackRight,
    FrontLeft,
    FrontRight,
}

impl WheelSlot {
    pub const ALL: [Self; 4] = [
        Self::BackLeft,
        Self::BackRight,
        Self::FrontLeft,
        Self::FrontRight,
    ];

    pub fn side(self) -> Side {
        match self {
            Self::BackLeft | Self::FrontLeft => Side::Left,
            Self::BackRight | Self::FrontRight => Side::Right,
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, Self::FrontLeft | Self::FrontRight)
    }
}

/// One value per wheel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelSet<T> {
    pub back_left: T,
    pub back_right: T,
    pub front_left: T,
    pub front_right: T,
}

impl<T> WheelSet<T> {
    pub fn get(&self, slot: WheelSlot) -> &T {
        match slot {
            WheelSlot::BackLeft => &self.back_left,
            WheelSlot::BackRight => &self.back_right,
            WheelSlot::FrontLeft => &self.front_left,
            WheelSlot::FrontRight => &self.front_right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (WheelSlot, &T)> {
        WheelSlot::ALL.into_iter().map(|slot| (slot, self.get(slot)))
    }
}

/// One value per steering side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SidePair<T> {
    pub left: T,
    pub right: T,
}

impl<T> SidePair<T> {
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRole {
    Chassis,
    Wheel(WheelSlot),
    SteeringAxle(Side),
}

impl BodyRole {
    /// Creation order: chassis, rear wheels, steering axles, front wheels.
    pub const BUILD_ORDER: [Self; 7] = [
        Self::Chassis,
        Self::Wheel(WheelSlot::BackLeft),
        Self::Wheel(WheelSlot::BackRight),
        Self::SteeringAxle(Side::Left),
        Self::SteeringAxle(Side::Right),
        Self::Wheel(WheelSlot::FrontLeft),
        Self::Wheel(WheelSlot::FrontRight),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Chassis => "chassis",
            Self::Wheel(WheelSlot::BackLeft) => "wheel_back_left",
            Self::Wheel(WheelSlot::BackRight) => "wheel_back_right",
            Self::Wheel(WheelSlot::FrontLeft) => "wheel_front_left",
            Self::Wheel(WheelSlot::FrontRight) => "wheel_front_right",
            Self::SteeringAxle(Side::Left) => "steering_axle_left",
            Self::SteeringAxle(Side::Right) => "steering_axle_right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    Drive,
    Steering,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    /// Hull of the chassis meshes; the cuboid is used when no mesh data is available.
    ChassisHull { fallback_half_extents: Vec3 },
    Wheel {
        radius: f32,
        half_height: f32,
        offset: f32,
        side: Side,
    },
    Axle { half_extent: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub role: BodyRole,
    pub translation: Vec3,
    pub shape: BodyShape,
    pub mass: Option<f32>,
    pub friction: Option<f32>,
    pub collision_group: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSpec {
    pub kind: JointKind,
    pub parent: BodyRole,
    pub child: BodyRole,
    pub axis: Vec3,
    pub parent_anchor: Vec3,
    pub child_anchor: Vec3,
}

impl JointSpec {
    fn build(&self) -> RevoluteJoint {
        let builder = RevoluteJointBuilder::new(self.axis)
            .local_anchor1(self.parent_anchor)
            .local_anchor2(self.child_anchor);
        match self.kind {
            JointKind::Drive => builder.build(),
            JointKind::Steering => builder.motor_model(MotorModel::ForceBased).build(),
        }
    }
}

/// Body and joint layout for one vehicle, fixed when the vehicle is spawned.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct RigBlueprint {
    pub chassis: BodySpec,
    pub wheels: WheelSet<BodySpec>,
    pub axles: SidePair<BodySpec>,
    pub chassis_visual_offset: Vec3,
    pub ground_mask: Vec<u8>,
}

impl RigBlueprint {
    pub fn from_config(rig: &RigConfig) -> Self {
        let collision = &rig.collision;
        let wheel = |slot: WheelSlot, position: [f32; 3]| BodySpec {
            role: BodyRole::Wheel(slot),
            translation: Vec3::from_array(position),
            shape: BodyShape::Wheel {
                radius: rig.wheel.radius,
                half_height: rig.wheel.half_height,
                offset: rig.wheel.collider_offset,
                side: slot.side(),
            },
            mass: None,
            friction: Some(rig.wheel.friction),
            collision_group: collision.wheel_group,
        };
        let axle = |side: Side, position: [f32; 3]| BodySpec {
            role: BodyRole::SteeringAxle(side),
            translation: Vec3::from_array(position),
            shape: BodyShape::Axle {
                half_extent: rig.axle.half_extent,
            },
            mass: None,
            friction: None,
            collision_group: collision.axle_group,
        };

        Self {
            chassis: BodySpec {
                role: BodyRole::Chassis,
                translation: Vec3::ZERO,
                shape: BodyShape::ChassisHull {
                    fallback_half_extents: Vec3::from_array(rig.chassis.fallback_half_extents),
                },
                mass: Some(rig.chassis.mass),
                friction: Some(rig.chassis.friction),
                collision_group: collision.chassis_group,
            },
            wheels: WheelSet {
                back_left: wheel(WheelSlot::BackLeft, rig.slots.back_left),
                back_right: wheel(WheelSlot::BackRight, rig.slots.back_right),
                front_left: wheel(WheelSlot::FrontLeft, rig.slots.front_left),
                front_right: wheel(WheelSlot::FrontRight, rig.slots.front_right),
            },
            axles: SidePair {
                left: axle(Side::Left, rig.slots.front_left),
                right: axle(Side::Right, rig.slots.front_right),
            },
            chassis_visual_offset: Vec3::from_array(rig.chassis.visual_offset),
            ground_mask: collision.ground_mask.clone(),
        }
    }

    pub fn body(&self, role: BodyRole) -> &BodySpec {
        match role {
            BodyRole::Chassis => &self.chassis,
            BodyRole::Wheel(slot) => self.wheels.get(slot),
            BodyRole::SteeringAxle(side) => self.axles.get(side),
        }
    }

    pub fn bodies(&self) -> [&BodySpec; 7] {
        BodyRole::BUILD_ORDER.map(|role| self.body(role))
    }

    /// Joints in creation order. Each one lives on its child body.
    pub fn joints(&self) -> [JointSpec; 6] {
        let drive = |slot: WheelSlot| {
            let (parent, parent_anchor) = if slot.is_front() {
                (BodyRole::SteeringAxle(slot.side()), Vec3::ZERO)
            } else {
                (BodyRole::Chassis, self.wheels.get(slot).translation)
            };
            JointSpec {
                kind: JointKind::Drive,
                parent,
                child: BodyRole::Wheel(slot),
                axis: Vec3::X,
                parent_anchor,
                child_anchor: Vec3::ZERO,
            }
        };
        let steering = |side: Side| JointSpec {
            kind: JointKind::Steering,
            parent: BodyRole::Chassis,
            child: BodyRole::SteeringAxle(side),
            axis: Vec3::Y,
            parent_anchor: self.axles.get(side).translation,
            child_anchor: Vec3::ZERO,
        };

        [
            drive(WheelSlot::BackLeft),
            drive(WheelSlot::BackRight),
            steering(Side::Left),
            drive(WheelSlot::FrontLeft),
            steering(Side::Right),
            drive(WheelSlot::FrontRight),
        ]
    }
}

/// Entity handles of an assembled rig. Joint components live on their child bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleRig {
    pub chassis: Entity,
    pub wheels: WheelSet<Entity>,
    pub axles: SidePair<Entity>,
}

impl VehicleRig {
    pub fn body(&self, role: BodyRole) -> Entity {
        match role {
            BodyRole::Chassis => self.chassis,
            BodyRole::Wheel(slot) => *self.wheels.get(slot),
            BodyRole::SteeringAxle(side) => *self.axles.get(side),
        }
    }

    pub fn body_entities(&self) -> [Entity; 7] {
        BodyRole::BUILD_ORDER.map(|role| self.body(role))
    }

    pub fn drive_joints(&self) -> [Entity; 4] {
        WheelSlot::ALL.map(|slot| *self.wheels.get(slot))
    }

    pub fn steering_joints(&self) -> [Entity; 2] {
        [self.axles.left, self.axles.right]
    }

    pub fn joint_entities(&self) -> [Entity; 6] {
        let [back_left, back_right, front_left, front_right] = self.drive_joints();
        let [left_axle, right_axle] = self.steering_joints();
        [
            back_left,
            back_right,
            left_axle,
            front_left,
            right_axle,
            front_right,
        ]
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RigState {
    #[default]
    Unbuilt,
    Building,
    Ready(VehicleRig),
}

impl RigState {
    pub fn rig(&self) -> Option<&VehicleRig> {
        match self {
            Self::Ready(rig) => Some(rig),
            _ => None,
        }
    }
}

/// Rig spawned this frame, waiting for its components to land.
#[derive(Component, Debug, Clone, Copy)]
pub(super) struct PendingRig(VehicleRig);

#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct RigDiagnostics {
    pub attempts: u32,
    pub missing: Vec<String>,
    pub model_unavailable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RigStatus {
    Ready,
    Building,
    WaitingForModel,
    ModelUnavailable,
    WaitingForParts(Vec<String>),
}

impl RigStatus {
    pub fn of(state: &RigState, diagnostics: &RigDiagnostics) -> Self {
        match state {
            RigState::Ready(_) => Self::Ready,
            RigState::Building => Self::Building,
            RigState::Unbuilt if diagnostics.model_unavailable => Self::ModelUnavailable,
            RigState::Unbuilt if !diagnostics.missing.is_empty() => {
                Self::WaitingForParts(diagnostics.missing.clone())
            }
            RigState::Unbuilt => Self::WaitingForModel,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Ready => "ready".to_string(),
            Self::Building => "assembling rig".to_string(),
            Self::WaitingForModel => "loading model".to_string(),
            Self::ModelUnavailable => "model unavailable".to_string(),
            Self::WaitingForParts(missing) => format!("missing parts: {}", missing.join(", ")),
        }
    }
}

/// Marks every body of a rig with its owner and role.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigBody {
    pub vehicle: Entity,
    pub role: BodyRole,
}

pub(crate) fn collision_group(index: u8) -> Group {
    Group::from_bits_truncate(1_u32 << (index.clamp(1, 32) - 1))
}

pub(crate) fn collision_mask(indices: &[u8]) -> Group {
    indices
        .iter()
        .fold(Group::NONE, |mask, index| mask | collision_group(*index))
}

fn wheel_collider(radius: f32, half_height: f32, offset: f32, side: Side) -> Collider {
    Collider::compound(vec![(
        Vec3::X * offset * side.sign(),
        Quat::from_rotation_z(side.sign() * FRAC_PI_2),
        Collider::cylinder(half_height, radius),
    )])
}

/// Convex hull of `points`, else their bounding box, else the configured cuboid.
fn chassis_collider(points: &[Vec3], fallback_half_extents: Vec3) -> Collider {
    if let Some(hull) = Collider::convex_hull(points) {
        return hull;
    }

    let Some((min, max)) = points_bounds(points) else {
        return Collider::cuboid(
            fallback_half_extents.x,
            fallback_half_extents.y,
            fallback_half_extents.z,
        );
    };
    let half_extents = ((max - min) * 0.5).max(Vec3::splat(0.01));
    Collider::compound(vec![(
        (min + max) * 0.5,
        Quat::IDENTITY,
        Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
    )])
}

fn body_collider(spec: &BodySpec, chassis_points: &[Vec3]) -> Collider {
    match spec.shape {
        BodyShape::ChassisHull {
            fallback_half_extents,
        } => chassis_collider(chassis_points, fallback_half_extents),
        BodyShape::Wheel {
            radius,
            half_height,
            offset,
            side,
        } => wheel_collider(radius, half_height, offset, side),
        BodyShape::Axle { half_extent } => {
            Collider::cuboid(half_extent, half_extent, half_extent)
        }
    }
}

fn spawn_body(
    commands: &mut Commands,
    vehicle: Entity,
    spec: &BodySpec,
    filters: Group,
    chassis_points: &[Vec3],
) -> Entity {
    let mut body = commands.spawn((
        Name::new(spec.role.label()),
        RigBody {
            vehicle,
            role: spec.role,
        },
        RigidBody::Dynamic,
        body_collider(spec, chassis_points),
        CollisionGroups::new(collision_group(spec.collision_group), filters),
        Sleeping::disabled(),
        Velocity::zero(),
        Transform::from_translation(spec.translation),
        ChildOf(vehicle),
    ));
    if let Some(mass) = spec.mass {
        body.insert(ColliderMassProperties::Mass(mass));
    }
    if let Some(friction) = spec.friction {
        body.insert(Friction::coefficient(friction));
    }
    body.id()
}

/// Spawns all bodies in dependency order, then all joints.
pub(super) fn spawn_rig(
    commands: &mut Commands,
    vehicle: Entity,
    blueprint: &RigBlueprint,
    chassis_points: &[Vec3],
) -> VehicleRig {
    let filters = collision_mask(&blueprint.ground_mask);
    let mut spawn = |role: BodyRole| {
        spawn_body(
            commands,
            vehicle,
            blueprint.body(role),
            filters,
            chassis_points,
        )
    };

    let chassis = spawn(BodyRole::Chassis);
    let back_left = spawn(BodyRole::Wheel(WheelSlot::BackLeft));
    let back_right = spawn(BodyRole::Wheel(WheelSlot::BackRight));
    let left_axle = spawn(BodyRole::SteeringAxle(Side::Left));
    let right_axle = spawn(BodyRole::SteeringAxle(Side::Right));
    let front_left = spawn(BodyRole::Wheel(WheelSlot::FrontLeft));
    let front_right = spawn(BodyRole::Wheel(WheelSlot::FrontRight));

    let rig = VehicleRig {
        chassis,
        wheels: WheelSet {
            back_left,
            back_right,
            front_left,
            front_right,
        },
        axles: SidePair {
            left: left_axle,
            right: right_axle,
        },
    };

    for joint in blueprint.joints() {
        commands
            .entity(rig.body(joint.child))
            .insert(ImpulseJoint::new(rig.body(joint.parent), joint.build()));
    }

    rig
}

fn part_transform(snapshots: &[ModelSceneNodeSnapshot], part: Entity, offset: Vec3) -> Transform {
    let local = snapshots
        .iter()
        .find(|node| node.entity == part)
        .and_then(|node| node.local_transform)
        .unwrap_or_default();
    Transform {
        translation: offset,
        rotation: local.rotation,
        scale: local.scale,
    }
}

#[allow(clippy::type_complexity)]
pub(super) fn assemble_vehicle_rigs(
    mut commands: Commands,
    meshes: Option<Res<Assets<Mesh>>>,
    mut vehicle_query: Query<(
        Entity,
        &Vehicle,
        &VehiclePartNames,
        &RigBlueprint,
        &mut RigState,
        &mut RigDiagnostics,
    )>,
    children_query: Query<&Children>,
    node_query: SceneNodeQuery,
) {
    for (vehicle_entity, vehicle, names, blueprint, mut state, mut diagnostics) in
        &mut vehicle_query
    {
        if *state != RigState::Unbuilt {
            continue;
        }

        let mut descendants = Vec::new();
        collect_descendants(vehicle_entity, &children_query, &mut descendants);
        let snapshots = snapshot_nodes(&descendants, &node_query);
        if snapshots.is_empty() {
            continue;
        }

        diagnostics.attempts = diagnostics.attempts.saturating_add(1);
        let parts = match resolve_parts(&snapshots, names) {
            Ok(parts) => parts,
            Err(error) => {
                if diagnostics.missing != error.missing {
                    warn!(
                        "Vehicle `{}` is waiting for model parts: {error}",
                        vehicle.config_id
                    );
                    diagnostics.missing = error.missing;
                }
                continue;
            }
        };

        let chassis_visual =
            part_transform(&snapshots, parts.chassis, blueprint.chassis_visual_offset);
        let chassis_points = meshes
            .as_deref()
            .map(|meshes| {
                collect_part_points(
                    parts.chassis,
                    chassis_visual,
                    &children_query,
                    &node_query,
                    meshes,
                )
            })
            .unwrap_or_default();

        let rig = spawn_rig(&mut commands, vehicle_entity, blueprint, &chassis_points);

        commands
            .entity(parts.chassis)
            .insert((ChildOf(rig.chassis), chassis_visual));
        for (slot, part) in parts.wheels.iter() {
            commands.entity(*part).insert((
                ChildOf(*rig.wheels.get(slot)),
                part_transform(&snapshots, *part, Vec3::ZERO),
            ));
        }

        diagnostics.missing.clear();
        *state = RigState::Building;
        commands.entity(vehicle_entity).insert(PendingRig(rig));
    }
}

pub(super) fn promote_built_rigs(
    mut commands: Commands,
    mut vehicle_query: Query<(Entity, &Vehicle, &PendingRig, &mut RigState)>,
    body_query: Query<(), With<RigidBody>>,
    joint_query: Query<(), With<ImpulseJoint>>,
) {
    for (vehicle_entity, vehicle, pending, mut state) in &mut vehicle_query {
        let rig = pending.0;
        let bodies = rig.body_entities();
        let joints = rig.joint_entities();
        if !bodies.iter().all(|entity| body_query.contains(*entity))
            || !joints.iter().all(|entity| joint_query.contains(*entity))
        {
            continue;
        }

        info!(
            "Assembled rig for vehicle `{}`: {} bodies, {} joints.",
            vehicle.config_id,
            bodies.len(),
            joints.len()
        );
        *state = RigState::Ready(rig);
        commands.entity(vehicle_entity).remove::<PendingRig>();
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::config::tests::{sedan_model_config, sedan_vehicle_config};
    use bevy_rapier3d::geometry::ColliderView;

    pub(in crate::gameplay::vehicle) const SEDAN_PARTS: [&str; 5] = [
        "body",
        "wheel_backLeft",
        "wheel_backRight",
        "wheel_frontLeft",
        "wheel_frontRight",
    ];

    pub(in crate::gameplay::vehicle) fn rig_app() -> App {
        let mut app = App::new();
        app.add_systems(Update, (assemble_vehicle_rigs, promote_built_rigs).chain());
        app
    }

    pub(in crate::gameplay::vehicle) fn spawn_test_vehicle(
        world: &mut World,
        translation: Vec3,
        parts: &[&str],
    ) -> Entity {
        let bundle = VehicleControlBundle::from_config(
            &sedan_vehicle_config(),
            &sedan_model_config().parts,
        )
        .expect("sedan config is complete");
        let vehicle = world
            .spawn((bundle, Transform::from_translation(translation)))
            .id();
        let scene = world.spawn((Transform::default(), ChildOf(vehicle))).id();
        for name in parts {
            world.spawn((
                Name::new(name.to_string()),
                Transform::from_xyz(0.0, 0.3, 0.0),
                ChildOf(scene),
            ));
        }
        vehicle
    }

    fn rig_of(app: &App, vehicle: Entity) -> VehicleRig {
        *app.world()
            .get::<RigState>(vehicle)
            .and_then(RigState::rig)
            .expect("rig should be ready")
    }

    fn revolute(app: &App, entity: Entity) -> (Entity, RevoluteJoint) {
        let joint = app
            .world()
            .get::<ImpulseJoint>(entity)
            .expect("joint component");
        let TypedJoint::RevoluteJoint(revolute) = &joint.data else {
            panic!("expected a revolute joint");
        };
        (joint.parent, *revolute)
    }

    fn count_bodies(app: &mut App) -> usize {
        app.world_mut()
            .query_filtered::<Entity, With<RigBody>>()
            .iter(app.world())
            .count()
    }

    #[test]
    fn blueprint_lists_seven_bodies_in_build_order() {
        let blueprint = RigBlueprint::from_config(&sedan_vehicle_config().rig);
        let roles: Vec<BodyRole> = blueprint.bodies().iter().map(|body| body.role).collect();

        assert_eq!(roles, BodyRole::BUILD_ORDER);
        assert_eq!(
            blueprint.wheels.back_left.translation,
            Vec3::new(-0.45, 0.0, 0.66)
        );
        assert_eq!(
            blueprint.axles.right.translation,
            Vec3::new(0.45, 0.0, -0.66)
        );
        assert_eq!(blueprint.chassis.mass, Some(1.0));
        assert_eq!(blueprint.wheels.front_left.friction, Some(3.0));
        assert_eq!(blueprint.axles.left.friction, None);
    }

    #[test]
    fn blueprint_joints_follow_dependency_order() {
        let blueprint = RigBlueprint::from_config(&sedan_vehicle_config().rig);
        let joints = blueprint.joints();

        let summary: Vec<(JointKind, BodyRole, BodyRole)> = joints
            .iter()
            .map(|joint| (joint.kind, joint.parent, joint.child))
            .collect();
        assert_eq!(
            summary,
            [
                (
                    JointKind::Drive,
                    BodyRole::Chassis,
                    BodyRole::Wheel(WheelSlot::BackLeft)
                ),
                (
                    JointKind::Drive,
                    BodyRole::Chassis,
                    BodyRole::Wheel(WheelSlot::BackRight)
                ),
                (
                    JointKind::Steering,
                    BodyRole::Chassis,
                    BodyRole::SteeringAxle(Side::Left)
                ),
                (
                    JointKind::Drive,
                    BodyRole::SteeringAxle(Side::Left),
                    BodyRole::Wheel(WheelSlot::FrontLeft)
                ),
                (
                    JointKind::Steering,
                    BodyRole::Chassis,
                    BodyRole::SteeringAxle(Side::Right)
                ),
                (
                    JointKind::Drive,
                    BodyRole::SteeringAxle(Side::Right),
                    BodyRole::Wheel(WheelSlot::FrontRight)
                ),
            ]
        );

        for joint in joints {
            let expected_axis = match joint.kind {
                JointKind::Drive => Vec3::X,
                JointKind::Steering => Vec3::Y,
            };
            assert_eq!(joint.axis, expected_axis);
            assert_eq!(joint.child_anchor, Vec3::ZERO);
        }
        assert_eq!(joints[0].parent_anchor, Vec3::new(-0.45, 0.0, 0.66));
        assert_eq!(joints[3].parent_anchor, Vec3::ZERO);
    }

    #[test]
    fn collision_groups_map_to_bits() {
        assert_eq!(collision_group(1), Group::GROUP_1);
        assert_eq!(collision_group(3), Group::GROUP_3);
        assert_eq!(collision_mask(&[2, 3]), Group::GROUP_2 | Group::GROUP_3);
        assert_eq!(collision_mask(&[]), Group::NONE);
    }

    #[test]
    fn chassis_collider_falls_back_to_configured_box() {
        let collider = chassis_collider(&[], Vec3::new(0.5, 0.3, 1.0));
        let cuboid = collider.as_cuboid().expect("fallback is a cuboid");
        assert_eq!(cuboid.half_extents(), Vec3::new(0.5, 0.3, 1.0));
    }

    #[test]
    fn wheel_colliders_roll_onto_the_spin_axis_mirrored_per_side() {
        let placement = |side| {
            let collider = wheel_collider(0.3, 0.1, 0.2, side);
            let compound = collider.as_compound().expect("wheel collider is a compound");
            let (offset, rotation, shape) = compound
                .shapes()
                .next()
                .expect("wheel collider has one shape");
            let ColliderView::Cylinder(cylinder) = shape else {
                panic!("wheel shape should be a cylinder");
            };
            assert_eq!(cylinder.radius(), 0.3);
            assert_eq!(cylinder.half_height(), 0.1);
            (offset, rotation)
        };

        let (left_offset, left_rotation) = placement(Side::Left);
        let (right_offset, right_rotation) = placement(Side::Right);

        for rotation in [left_rotation, right_rotation] {
            let axis = rotation * Vec3::Y;
            assert!(axis.x.abs() > 0.999, "cylinder axis {axis} should lie along X");
        }
        assert!((left_rotation * Vec3::Y + right_rotation * Vec3::Y).length() < 1e-5);
        assert!(left_rotation.abs_diff_eq(right_rotation.inverse(), 1e-6));
        assert_eq!(left_offset, Vec3::new(-0.2, 0.0, 0.0));
        assert_eq!(right_offset, -left_offset);
    }

    #[test]
    fn chassis_collider_wraps_mesh_points_in_a_hull() {
        let points: Vec<Vec3> = [-1.0_f32, 1.0]
            .into_iter()
            .flat_map(|x| [-0.5_f32, 0.5].map(move |y| (x, y)))
            .flat_map(|(x, y)| [-2.0_f32, 2.0].map(move |z| Vec3::new(x, y, z)))
            .collect();

        let collider = chassis_collider(&points, Vec3::ONE);
        assert!(collider.as_convex_polyhedron().is_some());
    }

    #[test]
    fn assembles_rig_once_all_parts_exist() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS);

        app.update();

        let rig = rig_of(&app, vehicle);
        assert_eq!(count_bodies(&mut app), 7);
        assert!(app.world().get::<PendingRig>(vehicle).is_none());

        for (index, entity) in rig.body_entities().into_iter().enumerate() {
            let body = app.world().get::<RigBody>(entity).expect("rig body");
            assert_eq!(body.vehicle, vehicle);
            assert_eq!(body.role, BodyRole::BUILD_ORDER[index]);
            assert_eq!(
                app.world().get::<ChildOf>(entity).map(ChildOf::parent),
                Some(vehicle)
            );
            assert!(app.world().get::<RigidBody>(entity).is_some());
        }

        for (slot, wheel) in rig.wheels.iter() {
            let (parent, joint) = revolute(&app, *wheel);
            let expected_parent = if slot.is_front() {
                *rig.axles.get(slot.side())
            } else {
                rig.chassis
            };
            assert_eq!(parent, expected_parent);
            assert_eq!(joint.data.local_axis1(), Vec3::X);
        }
        for axle in rig.steering_joints() {
            let (parent, joint) = revolute(&app, axle);
            assert_eq!(parent, rig.chassis);
            assert_eq!(joint.data.local_axis1(), Vec3::Y);
        }
        let (_, back_left) = revolute(&app, rig.wheels.back_left);
        assert_eq!(back_left.local_anchor1(), Vec3::new(-0.45, 0.0, 0.66));
    }

    #[test]
    fn bodies_only_collide_with_the_ground_mask() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS);
        app.update();
        let rig = rig_of(&app, vehicle);

        let groups = |entity: Entity| {
            *app.world()
                .get::<CollisionGroups>(entity)
                .expect("collision groups")
        };
        let chassis = groups(rig.chassis);
        let wheel = groups(rig.wheels.front_right);
        let axle = groups(rig.axles.left);

        assert_eq!(chassis.memberships, Group::GROUP_2);
        assert_eq!(wheel.memberships, Group::GROUP_3);
        assert_eq!(axle.memberships, Group::GROUP_4);
        for group in [chassis, wheel, axle] {
            assert_eq!(group.filters, Group::GROUP_1);
        }
        assert!(matches!(
            app.world().get::<ColliderMassProperties>(rig.chassis),
            Some(ColliderMassProperties::Mass(mass)) if *mass == 1.0
        ));
        assert_eq!(
            app.world().get::<Sleeping>(rig.axles.right),
            Some(&Sleeping::disabled())
        );
    }

    #[test]
    fn visual_parts_follow_their_bodies() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS);
        app.update();
        let rig = rig_of(&app, vehicle);

        let mut parts = app.world_mut().query::<(&Name, &ChildOf, &Transform)>();
        let mut seen = 0;
        for (name, child_of, transform) in parts.iter(app.world()) {
            match name.as_str() {
                "body" => {
                    assert_eq!(child_of.parent(), rig.chassis);
                    assert_eq!(transform.translation, Vec3::new(0.0, -0.07, 0.0));
                }
                "wheel_frontLeft" => {
                    assert_eq!(child_of.parent(), rig.wheels.front_left);
                    assert_eq!(transform.translation, Vec3::ZERO);
                }
                _ => continue,
            }
            seen += 1;
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn missing_part_builds_nothing_until_it_appears() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS[..4]);

        app.update();
        app.update();

        assert_eq!(count_bodies(&mut app), 0);
        assert_eq!(
            app.world().get::<RigState>(vehicle),
            Some(&RigState::Unbuilt)
        );
        let diagnostics = app
            .world()
            .get::<RigDiagnostics>(vehicle)
            .expect("diagnostics");
        assert_eq!(diagnostics.missing, ["wheel_frontRight"]);
        assert_eq!(diagnostics.attempts, 2);
        assert_eq!(
            RigStatus::of(&RigState::Unbuilt, diagnostics),
            RigStatus::WaitingForParts(vec!["wheel_frontRight".to_string()])
        );

        app.world_mut().spawn((
            Name::new("wheel_frontRight"),
            Transform::default(),
            ChildOf(vehicle),
        ));
        app.update();

        rig_of(&app, vehicle);
        assert_eq!(count_bodies(&mut app), 7);
    }

    #[test]
    fn vehicle_without_scene_waits_for_model() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &[]);

        app.update();

        let state = app.world().get::<RigState>(vehicle).expect("state");
        let diagnostics = app
            .world()
            .get::<RigDiagnostics>(vehicle)
            .expect("diagnostics");
        assert_eq!(diagnostics.attempts, 0);
        assert_eq!(RigStatus::of(state, diagnostics), RigStatus::WaitingForModel);
    }

    #[test]
    fn two_vehicles_get_independent_rigs() {
        let mut app = rig_app();
        let first = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS);
        let second =
            spawn_test_vehicle(app.world_mut(), Vec3::new(5.0, 0.0, 0.0), &SEDAN_PARTS);

        app.update();

        let first_rig = rig_of(&app, first);
        let second_rig = rig_of(&app, second);
        assert_eq!(count_bodies(&mut app), 14);
        for entity in first_rig.body_entities() {
            assert!(!second_rig.body_entities().contains(&entity));
        }
    }

    #[test]
    fn despawning_vehicle_releases_its_rig() {
        let mut app = rig_app();
        let vehicle = spawn_test_vehicle(app.world_mut(), Vec3::ZERO, &SEDAN_PARTS);
        app.update();
        let rig = rig_of(&app, vehicle);

        app.world_mut().entity_mut(vehicle).despawn();

        assert_eq!(count_bodies(&mut app), 0);
        for entity in rig.joint_entities() {
            assert!(app.world().get_entity(entity).is_err());
        }
    }
}
