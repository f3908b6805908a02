use crate::assets::AssetRegistry;
use crate::config::GameConfig;
use bevy::asset::LoadState;
use bevy::prelude::*;

const MIN_LOADING_SCREEN_SECONDS: f64 = 0.5;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    InRun,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(Update, boot_to_loading.run_if(in_state(GameState::Boot)))
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(OnExit(GameState::Loading), cleanup_loading_screen)
            .add_systems(
                Update,
                loading_to_in_run.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::InRun), enter_in_run);
    }
}

#[derive(Component)]
struct LoadingScreenText;

#[derive(Resource, Debug, Clone)]
struct LoadingScreenState {
    entered_at_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleSceneLoad {
    Pending,
    Loaded,
    Failed,
    Unavailable,
}

impl VehicleSceneLoad {
    fn is_settled(self) -> bool {
        self != Self::Pending
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("FollowCamera"),
        Camera3d::default(),
        Transform::from_xyz(-2.0, 10.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Loading);
}

fn enter_loading(mut commands: Commands, time: Res<Time>) {
    info!("Entered state: Loading");
    commands.insert_resource(LoadingScreenState {
        entered_at_s: time.elapsed_secs_f64(),
    });

    commands.spawn((
        Name::new("LoadingText"),
        LoadingScreenText,
        Text::new("Loading vehicle..."),
        TextFont {
            font_size: 28.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(24.0),
            bottom: Val::Px(24.0),
            ..default()
        },
    ));
}

fn cleanup_loading_screen(
    mut commands: Commands,
    loading_text_query: Query<Entity, With<LoadingScreenText>>,
) {
    for entity in &loading_text_query {
        commands.entity(entity).try_despawn();
    }
    commands.remove_resource::<LoadingScreenState>();
}

fn loading_to_in_run(
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    config: Option<Res<GameConfig>>,
    registry: Option<Res<AssetRegistry>>,
    loading_state: Option<Res<LoadingScreenState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(loading_state) = loading_state else {
        return;
    };
    let (Some(config), Some(registry)) = (config, registry) else {
        return;
    };

    let has_min_time =
        time.elapsed_secs_f64() - loading_state.entered_at_s >= MIN_LOADING_SCREEN_SECONDS;
    if !has_min_time {
        return;
    }

    let scene_load = vehicle_scene_load(&config, &registry, &asset_server);
    if !scene_load.is_settled() {
        return;
    }

    match scene_load {
        VehicleSceneLoad::Failed => {
            warn!("Vehicle scene failed to load, continuing to run state without a rig.")
        }
        VehicleSceneLoad::Unavailable => {
            warn!("Vehicle scene is unavailable, continuing to run state without a rig.")
        }
        VehicleSceneLoad::Loaded | VehicleSceneLoad::Pending => {}
    }

    next_state.set(GameState::InRun);
}

fn vehicle_scene_load(
    config: &GameConfig,
    registry: &AssetRegistry,
    asset_server: &AssetServer,
) -> VehicleSceneLoad {
    let Some(handle) = config
        .default_vehicle()
        .and_then(|vehicle| registry.model(&vehicle.model_id))
        .and_then(|entry| entry.handle.as_ref())
    else {
        return VehicleSceneLoad::Unavailable;
    };

    if asset_server.is_loaded_with_dependencies(handle.id()) {
        VehicleSceneLoad::Loaded
    } else if matches!(asset_server.load_state(handle.id()), LoadState::Failed(_)) {
        VehicleSceneLoad::Failed
    } else {
        VehicleSceneLoad::Pending
    }
}

fn enter_in_run() {
    info!("Entered state: InRun");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_scene_holds_the_loading_screen() {
        assert!(!VehicleSceneLoad::Pending.is_settled());
        assert!(VehicleSceneLoad::Loaded.is_settled());
        assert!(VehicleSceneLoad::Failed.is_settled());
        assert!(VehicleSceneLoad::Unavailable.is_settled());
    }
}
