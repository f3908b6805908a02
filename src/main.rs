mod assets;
mod config;
mod debug;
mod gameplay;
mod states;
mod ui;

use assets::AssetRegistryPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_rapier3d::prelude::*;
use config::ConfigPlugin;
use debug::DebugOverlayPlugin;
use gameplay::GameplayPlugin;
use states::{GameState, GameStatePlugin};
use ui::GameHudPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Sedan Drive".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
        .add_plugins(RapierDebugRenderPlugin {
            enabled: false,
            ..default()
        })
        .add_plugins(ConfigPlugin)
        .add_plugins(AssetRegistryPlugin)
        .add_plugins(DebugOverlayPlugin)
        .add_plugins(GameplayPlugin)
        .add_plugins(GameHudPlugin)
        .init_state::<GameState>()
        .add_plugins(GameStatePlugin)
        .run();
}
