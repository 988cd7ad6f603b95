use std::path::PathBuf;

use crate::{
    engine::EngineParameters,
    geometry::Rect,
    scene::{MassPoint, Scene, SpawnPoint},
};

// -------------------------------------------------------------------------------------------------

/// Plain value snapshot of everything a host needs to persist and later restore an engine:
/// parameters, points, canvas bounds and the loaded audio file path.
///
/// Live particles are not part of the state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub parameters: EngineParameters,
    pub mass_points: Vec<MassPoint>,
    pub spawn_points: Vec<SpawnPoint>,
    pub canvas_bounds: Rect,
    pub audio_file_path: Option<PathBuf>,
}

impl Default for EngineState {
    fn default() -> Self {
        let scene = Scene::default();
        Self {
            parameters: EngineParameters::default(),
            mass_points: scene.mass_points().to_vec(),
            spawn_points: scene.spawn_points().to_vec(),
            canvas_bounds: Rect::default(),
            audio_file_path: None,
        }
    }
}
