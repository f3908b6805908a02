use crate::config::{GameConfig, VehicleConfig};
use crate::gameplay::vehicle::VehicleTelemetry;
use crate::states::GameState;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use bevy_rapier3d::prelude::DebugRenderContext;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DrivePanelState>()
            .add_systems(Update, toggle_drive_panel)
            .add_systems(
                EguiPrimaryContextPass,
                drive_panel_ui
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

/// Live-editable slice of a vehicle's controller tuning.
#[derive(Debug, Clone, PartialEq)]
struct DriveTuningParams {
    max_angle_rad: f32,
    steering_stiffness: f32,
    steering_damping: f32,
    shift_cooldown_ms: u64,
    coast_stiffness: f32,
}

impl DriveTuningParams {
    fn from_vehicle(vehicle: &VehicleConfig) -> Self {
        Self {
            max_angle_rad: vehicle.steering.max_angle_rad,
            steering_stiffness: vehicle.steering.stiffness,
            steering_damping: vehicle.steering.damping,
            shift_cooldown_ms: vehicle.gearbox.shift_cooldown_ms,
            coast_stiffness: vehicle.drivetrain.coast_stiffness,
        }
    }

    fn apply_to_vehicle(&self, vehicle: &mut VehicleConfig) {
        vehicle.steering.max_angle_rad = self.max_angle_rad;
        vehicle.steering.stiffness = self.steering_stiffness;
        vehicle.steering.damping = self.steering_damping;
        vehicle.gearbox.shift_cooldown_ms = self.shift_cooldown_ms;
        vehicle.drivetrain.coast_stiffness = self.coast_stiffness;
    }
}

#[derive(Resource, Debug, Clone, Default)]
struct DrivePanelState {
    visible: bool,
    source_vehicle_id: String,
    params: Option<DriveTuningParams>,
    status: String,
}

fn toggle_drive_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<DrivePanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F1) {
        return;
    }
    let Some(config) = config else {
        return;
    };
    if !config.game.app.debug_overlay {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
        }
        info!("Drive debug panel shown.");
    } else {
        info!("Drive debug panel hidden.");
    }
}

fn drive_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<DrivePanelState>,
    mut config: ResMut<GameConfig>,
    telemetry: Option<Res<VehicleTelemetry>>,
    debug_render: Option<ResMut<DebugRenderContext>>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.params.is_none()
        || panel_state.source_vehicle_id != config.game.app.default_vehicle
    {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
            return;
        }
    }

    let Some(mut params) = panel_state.params.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut physics_debug = debug_render.as_ref().is_some_and(|context| context.enabled);
    let status = panel_state.status.clone();
    let vehicle_id = panel_state.source_vehicle_id.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Drive Debug")
        .open(&mut window_open)
        .resizable(true)
        .default_width(420.0)
        .show(ctx, |ui| {
            ui.label(format!("Vehicle: {vehicle_id}"));
            if let Some(telemetry) = telemetry.as_deref() {
                ui.label(format!(
                    "Gear {} | pedal {} | rig {}",
                    telemetry.gear,
                    telemetry.pedal.label(),
                    telemetry.rig_status.describe()
                ));
                ui.label(format!(
                    "Drive target {:.1} rad/s @ {:.1}",
                    telemetry.drive.target_velocity, telemetry.drive.target_stiffness
                ));
                ui.label(format!(
                    "Steering target {:+.2} rad (k {:.0}, c {:.0})",
                    telemetry.steering.angle,
                    telemetry.steering.stiffness,
                    telemetry.steering.damping
                ));
                let last_shift = telemetry
                    .last_shift_at
                    .map(|at| format!("{:.2}s", at.as_secs_f32()))
                    .unwrap_or_else(|| "never".to_string());
                ui.label(format!(
                    "Last shift {last_shift} (cooldown {} ms)",
                    telemetry.shift_cooldown.as_millis()
                ));
                let position = telemetry.chassis_translation;
                ui.label(format!(
                    "Chassis at ({:.2}, {:.2}, {:.2}) | {:.2} m/s",
                    position.x, position.y, position.z, telemetry.speed_mps
                ));
            }
            ui.checkbox(&mut physics_debug, "Physics debug render");
            ui.separator();

            ui.collapsing("Tuning", |ui| {
                params_changed |= tuning_slider_row(
                    ui,
                    "max steering angle (rad)",
                    &mut params.max_angle_rad,
                    0.0..=1.2,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "steering stiffness",
                    &mut params.steering_stiffness,
                    0.0..=400.0,
                    1.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "steering damping",
                    &mut params.steering_damping,
                    0.0..=100.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "coast stiffness",
                    &mut params.coast_stiffness,
                    0.0..=600.0,
                    1.0,
                );
                ui.horizontal(|ui| {
                    ui.label("shift cooldown (ms)");
                    params_changed |= ui
                        .add(egui::Slider::new(&mut params.shift_cooldown_ms, 0..=2000))
                        .changed();
                });
            });

            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;
    if let Some(mut context) = debug_render {
        if context.enabled != physics_debug {
            context.enabled = physics_debug;
            info!(
                "Physics debug render {}.",
                if physics_debug { "enabled" } else { "disabled" }
            );
        }
    }

    if reload_clicked {
        match sync_panel_state_from_config(&mut panel_state, &config) {
            Ok(()) => panel_state.status = "Reloaded values from current config.".to_string(),
            Err(error) => panel_state.status = error,
        }
        return;
    }

    panel_state.params = Some(params.clone());

    if params_changed {
        match apply_drive_tuning_to_runtime_config(
            &mut config,
            &panel_state.source_vehicle_id,
            &params,
        ) {
            Ok(()) => {
                panel_state.status = "Live tuning active (in-memory config updated).".to_string()
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn sync_panel_state_from_config(
    panel_state: &mut DrivePanelState,
    config: &GameConfig,
) -> Result<(), String> {
    let vehicle_id = config.game.app.default_vehicle.clone();
    let Some(vehicle) = config.vehicles_by_id.get(&vehicle_id) else {
        return Err(format!(
            "Drive panel: default vehicle `{vehicle_id}` not found in config."
        ));
    };

    panel_state.source_vehicle_id = vehicle_id;
    panel_state.params = Some(DriveTuningParams::from_vehicle(vehicle));
    Ok(())
}

/// Edits the live config; vehicles pick the change up in the next `Update`, between fixed ticks.
fn apply_drive_tuning_to_runtime_config(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &DriveTuningParams,
) -> Result<(), String> {
    let Some(vehicle) = config.vehicles_by_id.get_mut(vehicle_id) else {
        return Err(format!(
            "Drive panel: runtime vehicle `{vehicle_id}` not found in vehicles_by_id."
        ));
    };
    params.apply_to_vehicle(vehicle);

    let Some(vehicle) = config
        .vehicles
        .vehicles
        .iter_mut()
        .find(|vehicle| vehicle.id == vehicle_id)
    else {
        return Err(format!(
            "Drive panel: runtime vehicle `{vehicle_id}` not found in vehicles list."
        ));
    };
    params.apply_to_vehicle(vehicle);
    Ok(())
}
