pub(crate) mod drivetrain;
pub(crate) mod gearbox;
mod model;
mod rig;
mod runtime;
mod scene;
mod steering;

use crate::assets::AssetRegistry;
use crate::config::{GameConfig, ModelPartsConfig, VehicleConfig};
use crate::states::GameState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::time::Duration;

pub use rig::RigStatus;

use drivetrain::{DriveMotorTarget, GearTable, Pedal};
use gearbox::{Gear, GearChange, Gearbox, ShiftInput};
use model::VehiclePartNames;
use rig::{RigBlueprint, RigDiagnostics, RigState, WheelSet};
use steering::{SteeringPolicy, SteeringTarget};
use model::{collect_descendants, ModelSceneNodeSnapshot, SceneNodeQuery};
use runtime::{
    camera_follow_vehicle, drive_vehicles, read_vehicle_input, route_player_input,
    sync_rapier_gravity_from_config, sync_vehicle_tuning_from_config, update_vehicle_telemetry,
};
use scene::{cleanup_vehicle_scene, spawn_vehicle_scene, track_vehicle_model_loads};

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleInputState>()
            .init_resource::<VehicleInputBindings>()
            .init_resource::<VehicleTelemetry>()
            .add_systems(OnEnter(GameState::InRun), spawn_vehicle_scene)
            .add_systems(OnExit(GameState::InRun), cleanup_vehicle_scene)
            .add_systems(
                Update,
                (
                    sync_vehicle_tuning_from_config,
                    sync_rapier_gravity_from_config,
                    track_vehicle_model_loads,
                    rig::assemble_vehicle_rigs,
                    rig::promote_built_rigs,
                    update_vehicle_telemetry,
                    camera_follow_vehicle,
                )
                    .chain()
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                RunFixedMainLoop,
                read_vehicle_input
                    .in_set(RunFixedMainLoopSystems::BeforeFixedMainLoop)
                    .run_if(in_state(GameState::InRun)),
            )
            // Rapier steps in FixedPostUpdate, so targets written here land in the same step.
            .add_systems(
                FixedUpdate,
                (route_player_input, drive_vehicles)
                    .chain()
                    .run_if(in_state(GameState::InRun)),
            );
    }
}

/// Root entity of one vehicle. Bodies, joints and the model scene hang below it.
#[derive(Component, Debug, Clone)]
pub struct Vehicle {
    pub config_id: String,
}

/// The vehicle driven by the keyboard.
#[derive(Component)]
pub struct PlayerVehicle;

#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub brake: bool,
    pub gear_up: bool,
    pub gear_down: bool,
}

impl VehicleInput {
    pub fn pedal(&self) -> Pedal {
        Pedal::select(self.forward, self.backward, self.brake)
    }

    pub fn shift(&self) -> ShiftInput {
        ShiftInput {
            up: self.gear_up,
            down: self.gear_down,
        }
    }
}

/// Keyboard sample for the player vehicle, refreshed every frame before the fixed loop.
///
/// Shift presses stay latched until a fixed tick consumes them, so a tap in a frame
/// without a tick still reaches the gearbox.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct VehicleInputState {
    pub held: VehicleInput,
    pub pending_gear_up: bool,
    pub pending_gear_down: bool,
}

impl VehicleInputState {
    pub fn take_tick_input(&mut self) -> VehicleInput {
        let mut input = self.held;
        input.gear_up |= std::mem::take(&mut self.pending_gear_up);
        input.gear_down |= std::mem::take(&mut self.pending_gear_down);
        input
    }
}

#[derive(Resource, Debug, Clone)]
struct VehicleInputBindings {
    forward: Vec<KeyCode>,
    backward: Vec<KeyCode>,
    left: Vec<KeyCode>,
    right: Vec<KeyCode>,
    brake: Vec<KeyCode>,
    gear_up: Vec<KeyCode>,
    gear_down: Vec<KeyCode>,
}

impl Default for VehicleInputBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            backward: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            brake: vec![KeyCode::Space],
            gear_up: vec![KeyCode::Period],
            gear_down: vec![KeyCode::Comma],
        }
    }
}

/// Last targets computed by the controller for one vehicle.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct VehicleCommand {
    pub gear: Gear,
    pub pedal: Pedal,
    pub drive: DriveMotorTarget,
    pub steering: SteeringTarget,
    pub skipped_motor_writes: u32,
}

impl Default for VehicleCommand {
    fn default() -> Self {
        Self {
            gear: Gear::NEUTRAL,
            pedal: Pedal::Neutral,
            drive: DriveMotorTarget::IDLE,
            steering: SteeringTarget::default(),
            skipped_motor_writes: 0,
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct VehicleTelemetry {
    pub gear: Gear,
    pub pedal: Pedal,
    pub drive: DriveMotorTarget,
    pub steering: SteeringTarget,
    pub last_shift_at: Option<Duration>,
    pub shift_cooldown: Duration,
    pub speed_mps: f32,
    pub chassis_translation: Vec3,
    pub rig_status: RigStatus,
}

impl Default for VehicleTelemetry {
    fn default() -> Self {
        Self {
            gear: Gear::NEUTRAL,
            pedal: Pedal::Neutral,
            drive: DriveMotorTarget::IDLE,
            steering: SteeringTarget::default(),
            last_shift_at: None,
            shift_cooldown: Duration::ZERO,
            speed_mps: 0.0,
            chassis_translation: Vec3::ZERO,
            rig_status: RigStatus::WaitingForModel,
        }
    }
}

/// Everything a vehicle root needs besides its transform and model scene.
#[derive(Bundle)]
pub struct VehicleControlBundle {
    pub vehicle: Vehicle,
    pub gearbox: Gearbox,
    pub gear_table: GearTable,
    pub steering: SteeringPolicy,
    pub blueprint: RigBlueprint,
    pub part_names: VehiclePartNames,
    pub rig_state: RigState,
    pub diagnostics: RigDiagnostics,
    pub input: VehicleInput,
    pub command: VehicleCommand,
}

impl VehicleControlBundle {
    pub fn from_config(
        vehicle: &VehicleConfig,
        parts: &ModelPartsConfig,
    ) -> Result<Self, drivetrain::MissingGearError> {
        Ok(Self {
            vehicle: Vehicle {
                config_id: vehicle.id.clone(),
            },
            gearbox: Gearbox::from_config(&vehicle.gearbox),
            gear_table: GearTable::from_config(&vehicle.drivetrain)?,
            steering: SteeringPolicy::from_config(&vehicle.steering),
            blueprint: RigBlueprint::from_config(&vehicle.rig),
            part_names: VehiclePartNames::from_config(parts),
            rig_state: RigState::Unbuilt,
            diagnostics: RigDiagnostics::default(),
            input: VehicleInput::default(),
            command: VehicleCommand::default(),
        })
    }
}
