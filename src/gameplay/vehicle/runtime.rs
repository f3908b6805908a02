use super::*;

pub(super) fn read_vehicle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    mut input_state: ResMut<VehicleInputState>,
) {
    let pressed = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.pressed(*key));
    let just_pressed = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.just_pressed(*key));
    input_state.pending_gear_up |= just_pressed(&bindings.gear_up);
    input_state.pending_gear_down |= just_pressed(&bindings.gear_down);
    input_state.held = VehicleInput {
        forward: pressed(&bindings.forward),
        backward: pressed(&bindings.backward),
        left: pressed(&bindings.left),
        right: pressed(&bindings.right),
        brake: pressed(&bindings.brake),
        gear_up: pressed(&bindings.gear_up),
        gear_down: pressed(&bindings.gear_down),
    };
}

pub(super) fn route_player_input(
    mut input_state: ResMut<VehicleInputState>,
    mut player_query: Query<&mut VehicleInput, With<PlayerVehicle>>,
) {
    let tick_input = input_state.take_tick_input();
    for mut input in &mut player_query {
        *input = tick_input;
    }
}

/// Targets computed for one controller tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPlan {
    pub gear: Gear,
    pub gear_change: Option<GearChange>,
    pub pedal: Pedal,
    pub drive: DriveMotorTarget,
    pub steering: SteeringTarget,
}

/// Gearbox first, then the drive target for the resulting gear, then steering.
pub fn plan_tick(
    gearbox: &mut Gearbox,
    table: &GearTable,
    steering: &SteeringPolicy,
    input: VehicleInput,
    now: Duration,
) -> TickPlan {
    let gear_change = gearbox.advance(input.shift(), now);
    let gear = gearbox.gear();
    let pedal = input.pedal();

    TickPlan {
        gear,
        gear_change,
        pedal,
        drive: table.command(gear, pedal),
        steering: steering.target(input.left, input.right),
    }
}

#[allow(clippy::type_complexity)]
pub(super) fn drive_vehicles(
    time: Res<Time>,
    mut vehicle_query: Query<(
        &Vehicle,
        &VehicleInput,
        &RigState,
        &GearTable,
        &SteeringPolicy,
        &mut Gearbox,
        &mut VehicleCommand,
    )>,
    mut joint_query: Query<&mut ImpulseJoint>,
) {
    let now = time.elapsed();

    for (vehicle, input, state, table, steering, mut gearbox, mut command) in &mut vehicle_query {
        let RigState::Ready(rig) = state else {
            continue;
        };

        let plan = plan_tick(&mut gearbox, table, steering, *input, now);
        if let Some(change) = plan.gear_change {
            debug!(
                "Vehicle `{}` shifted {} -> {}.",
                vehicle.config_id, change.from, change.to
            );
        }

        let mut skipped = 0_u32;
        for joint_entity in rig.drive_joints() {
            let written = joint_query
                .get_mut(joint_entity)
                .is_ok_and(|mut joint| set_drive_motor(&mut joint, plan.drive));
            if !written {
                skipped += 1;
            }
        }
        for joint_entity in rig.steering_joints() {
            let written = joint_query
                .get_mut(joint_entity)
                .is_ok_and(|mut joint| set_steering_motor(&mut joint, plan.steering));
            if !written {
                skipped += 1;
            }
        }

        command.gear = plan.gear;
        command.pedal = plan.pedal;
        command.drive = plan.drive;
        command.steering = plan.steering;
        command.skipped_motor_writes = command.skipped_motor_writes.saturating_add(skipped);
    }
}

fn set_drive_motor(joint: &mut ImpulseJoint, target: DriveMotorTarget) -> bool {
    let TypedJoint::RevoluteJoint(revolute) = &mut joint.data else {
        return false;
    };
    revolute.set_motor_velocity(target.target_velocity, target.target_stiffness);
    true
}

fn set_steering_motor(joint: &mut ImpulseJoint, target: SteeringTarget) -> bool {
    let TypedJoint::RevoluteJoint(revolute) = &mut joint.data else {
        return false;
    };
    revolute.set_motor_position(target.angle, target.stiffness, target.damping);
    true
}

/// Applies reloaded tuning between fixed ticks. Rig geometry only affects rigs built later.
#[allow(clippy::type_complexity)]
pub(super) fn sync_vehicle_tuning_from_config(
    config: Res<GameConfig>,
    mut vehicle_query: Query<(
        &Vehicle,
        &mut Gearbox,
        &mut GearTable,
        &mut SteeringPolicy,
        &mut RigBlueprint,
        &mut VehiclePartNames,
    )>,
) {
    if !config.is_changed() {
        return;
    }

    for (vehicle, mut gearbox, mut table, mut steering, mut blueprint, mut part_names) in
        &mut vehicle_query
    {
        let Some(vehicle_config) = config.vehicles_by_id.get(&vehicle.config_id) else {
            warn!(
                "Vehicle `{}` is no longer configured; keeping its current tuning.",
                vehicle.config_id
            );
            continue;
        };

        match GearTable::from_config(&vehicle_config.drivetrain) {
            Ok(new_table) => *table = new_table,
            Err(error) => {
                warn!(
                    "Keeping drivetrain of vehicle `{}`: {error}",
                    vehicle.config_id
                );
                continue;
            }
        }
        *steering = SteeringPolicy::from_config(&vehicle_config.steering);
        gearbox.set_cooldown(Duration::from_millis(
            vehicle_config.gearbox.shift_cooldown_ms,
        ));
        *blueprint = RigBlueprint::from_config(&vehicle_config.rig);
        if let Some(model) = config.model_assets_by_id.get(&vehicle_config.model_id) {
            *part_names = VehiclePartNames::from_config(&model.parts);
        }
    }
}

pub(super) fn sync_rapier_gravity_from_config(
    config: Res<GameConfig>,
    mut rapier_config_query: Query<&mut RapierConfiguration, With<DefaultRapierContext>>,
) {
    if !config.is_changed() {
        return;
    }

    if let Ok(mut rapier_config) = rapier_config_query.single_mut() {
        rapier_config.gravity = Vec3::from_array(config.game.physics.gravity);
    }
}

pub(super) fn update_vehicle_telemetry(
    mut telemetry: ResMut<VehicleTelemetry>,
    player_query: Query<
        (&VehicleCommand, &Gearbox, &RigState, &RigDiagnostics),
        With<PlayerVehicle>,
    >,
    chassis_query: Query<(&GlobalTransform, Option<&Velocity>)>,
) {
    let Ok((command, gearbox, state, diagnostics)) = player_query.single() else {
        return;
    };

    telemetry.gear = command.gear;
    telemetry.pedal = command.pedal;
    telemetry.drive = command.drive;
    telemetry.steering = command.steering;
    telemetry.last_shift_at = gearbox.last_shift_at();
    telemetry.shift_cooldown = gearbox.cooldown();
    telemetry.rig_status = RigStatus::of(state, diagnostics);

    let Some(rig) = state.rig() else {
        telemetry.speed_mps = 0.0;
        return;
    };
    if let Ok((transform, velocity)) = chassis_query.get(rig.chassis) {
        telemetry.chassis_translation = transform.translation();
        telemetry.speed_mps = velocity.map(|velocity| velocity.linvel.length()).unwrap_or(0.0);
    }
}

#[allow(clippy::type_complexity)]
pub(super) fn camera_follow_vehicle(
    config: Res<GameConfig>,
    player_query: Query<&RigState, With<PlayerVehicle>>,
    chassis_query: Query<&GlobalTransform, Without<Camera3d>>,
    mut camera_query: Query<(&mut Transform, &mut Projection), With<Camera3d>>,
) {
    let Ok(state) = player_query.single() else {
        return;
    };
    let Some(rig) = state.rig() else {
        return;
    };
    let Ok(chassis) = chassis_query.get(rig.chassis) else {
        return;
    };
    let Ok((mut camera_transform, mut projection)) = camera_query.single_mut() else {
        return;
    };

    let target = chassis.translation();
    let offset = Vec3::from_array(config.game.camera.follow_offset);
    *camera_transform =
        Transform::from_translation(target + offset).looking_at(target, Vec3::Y);

    if let Projection::Perspective(perspective) = projection.as_mut() {
        let fov = config.game.camera.fov_degrees.to_radians();
        if perspective.fov != fov {
            perspective.fov = fov;
        }
    }
}
