//! Mixer controller: mute and volume.
//!
//! Events: `mute_changed`, `volume_changed`.

use serde_json::json;

use crate::driver::Driver;
use crate::request::{Request, Scope};
use crate::session::MopidySession;

pub fn driver(session: MopidySession) -> Driver {
    Driver::new(session, Scope::Mixer)
}

/// `true` if muted, `null` if unknown
pub fn get_mute() -> Request {
    Request::new(Scope::Mixer, "get_mute", None)
}

/// 0..=100, or `null` if unknown
pub fn get_volume() -> Request {
    Request::new(Scope::Mixer, "get_volume", None)
}

pub fn set_mute(mute: bool) -> Request {
    Request::new(Scope::Mixer, "set_mute", Some(json!({ "mute": mute })))
}

/// Values above 100 are clamped.
pub fn set_volume(volume: u8) -> Request {
    Request::new(
        Scope::Mixer,
        "set_volume",
        Some(json!({ "volume": volume.min(100) })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_mixer_requests() {
        assert_eq!(get_mute().method, "core.mixer.get_mute");
        assert_eq!(set_mute(true).params, json!({"mute": true}));
        assert_eq!(set_volume(250).params, json!({"volume": 100}));
    }
}
