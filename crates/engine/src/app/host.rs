use crate::content::SceneIndex;
use crate::scene::ActorIndex;

use super::spatial::{SpatialGraph, Vec3};

pub trait MusicPlayer {
    fn is_playing(&self) -> bool;
    fn load(&mut self, track: u16);
    fn play(&mut self);
    fn stop(&mut self);
}

pub trait CameraController {
    /// Called once a scene is attached; `focus` is the protagonist position when known.
    fn reinitialize(&mut self, scene: SceneIndex, focus: Option<Vec3>);
}

/// Receives animation and behaviour changes issued by scripts, synchronously
/// within the tick that issued them.
pub trait ActorAnimator {
    fn play_anim(&mut self, scene: SceneIndex, actor: ActorIndex, anim: u16);
    fn set_behaviour(&mut self, scene: SceneIndex, actor: ActorIndex, behaviour: u8);
}

/// External collaborators the scene manager drives.
pub struct Host {
    pub graph: Box<dyn SpatialGraph>,
    pub music: Box<dyn MusicPlayer>,
    pub menu_music: Box<dyn MusicPlayer>,
    pub camera: Box<dyn CameraController>,
    pub animator: Box<dyn ActorAnimator>,
}

impl Host {
    /// Starts the ambience track unless something is already playing.
    pub(crate) fn resume_music(&mut self, track: u16) -> bool {
        if self.music.is_playing() {
            return false;
        }
        self.music.load(track);
        // Menu music may have started while the scene was loading.
        self.menu_music.stop();
        self.music.play();
        true
    }
}
