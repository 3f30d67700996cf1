use isle_engine::{
    ActorAnimator, ActorIndex, CameraController, Host, MusicPlayer, NodeTree, SceneIndex, Vec3,
};
use tracing::{debug, info};

/// Stand-in for an audio channel: remembers the loaded track and logs
/// transport changes.
#[derive(Debug)]
pub(crate) struct LoggedMusic {
    channel: &'static str,
    track: Option<u16>,
    playing: bool,
}

impl LoggedMusic {
    pub(crate) fn new(channel: &'static str) -> Self {
        Self {
            channel,
            track: None,
            playing: false,
        }
    }
}

impl MusicPlayer for LoggedMusic {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn load(&mut self, track: u16) {
        self.track = Some(track);
        debug!(channel = self.channel, track, "music_loaded");
    }

    fn play(&mut self) {
        self.playing = true;
        info!(channel = self.channel, track = ?self.track, "music_started");
    }

    fn stop(&mut self) {
        if self.playing {
            info!(channel = self.channel, track = ?self.track, "music_stopped");
        }
        self.playing = false;
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoggedCamera {
    focus: Option<Vec3>,
}

impl CameraController for LoggedCamera {
    fn reinitialize(&mut self, scene: SceneIndex, focus: Option<Vec3>) {
        self.focus = focus;
        info!(scene = %scene, focus = ?focus, "camera_reinitialized");
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoggedAnimator;

impl ActorAnimator for LoggedAnimator {
    fn play_anim(&mut self, scene: SceneIndex, actor: ActorIndex, anim: u16) {
        debug!(scene = %scene, actor = %actor, anim, "anim_requested");
    }

    fn set_behaviour(&mut self, scene: SceneIndex, actor: ActorIndex, behaviour: u8) {
        debug!(scene = %scene, actor = %actor, behaviour, "behaviour_requested");
    }
}

/// Headless collaborators: an in-memory node tree plus logging stand-ins for
/// audio, camera and animation.
pub(crate) fn headless_host() -> Host {
    let mut menu_music = LoggedMusic::new("menu");
    menu_music.load(0);
    menu_music.play();
    Host {
        graph: Box::new(NodeTree::default()),
        music: Box::new(LoggedMusic::new("ambience")),
        menu_music: Box::new(menu_music),
        camera: Box::new(LoggedCamera::default()),
        animator: Box::new(LoggedAnimator),
    }
}
