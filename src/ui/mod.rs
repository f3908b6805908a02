use crate::gameplay::vehicle::{RigStatus, VehicleTelemetry};
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const HUD_TEXT_WARNING: Color = Color::srgb(0.98, 0.74, 0.36);

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InRun), spawn_game_hud)
            .add_systems(OnExit(GameState::InRun), cleanup_game_hud)
            .add_systems(
                Update,
                update_game_hud
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<VehicleTelemetry>),
            );
    }
}

#[derive(Component)]
struct GameHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Gear,
    Drive,
    Status,
}

fn spawn_game_hud(mut commands: Commands, existing_hud: Query<Entity, With<GameHudRoot>>) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("GameHudRoot"),
            GameHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(10.0),
                width: Val::Px(360.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(6.0),
                padding: UiRect::all(Val::Px(12.0)),
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(HUD_PANEL_BG),
            BorderColor::all(HUD_PANEL_BORDER),
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|panel| {
            panel.spawn((
                HudTextKind::Gear,
                Text::new("GEAR N"),
                TextFont {
                    font_size: 30.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
            ));
            panel.spawn((
                HudTextKind::Drive,
                Text::new("Pedal coast | Steer +0.00 rad | Speed 0.0 m/s"),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
            ));
            panel.spawn((
                HudTextKind::Status,
                Text::new("Rig: loading model"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(HUD_TEXT_MUTED),
            ));
        });
}

fn cleanup_game_hud(mut commands: Commands, hud_query: Query<Entity, With<GameHudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_game_hud(
    telemetry: Res<VehicleTelemetry>,
    mut text_query: Query<(&HudTextKind, &mut Text, &mut TextColor)>,
) {
    if !telemetry.is_changed() {
        return;
    }

    for (kind, mut text, mut color) in &mut text_query {
        match kind {
            HudTextKind::Gear => {
                *text = Text::new(format!("GEAR {}", telemetry.gear));
            }
            HudTextKind::Drive => {
                *text = Text::new(drive_line(&telemetry));
            }
            HudTextKind::Status => {
                *text = Text::new(status_line(&telemetry.rig_status));
                *color = TextColor(status_color(&telemetry.rig_status));
            }
        }
    }
}

fn drive_line(telemetry: &VehicleTelemetry) -> String {
    format!(
        "Pedal {} | Steer {:+.2} rad | Speed {:.1} m/s",
        telemetry.pedal.label(),
        telemetry.steering.angle,
        telemetry.speed_mps
    )
}

fn status_line(status: &RigStatus) -> String {
    match status {
        RigStatus::Ready => {
            "Rig: ready | W/S drive, A/D steer, Space brake, . and , shift".to_string()
        }
        other => format!("Rig: {}", other.describe()),
    }
}

fn status_color(status: &RigStatus) -> Color {
    match status {
        RigStatus::Ready | RigStatus::Building | RigStatus::WaitingForModel => HUD_TEXT_MUTED,
        RigStatus::ModelUnavailable | RigStatus::WaitingForParts(_) => HUD_TEXT_WARNING,
    }
}
