//! Playback controller.
//!
//! Events whose names contain `playback`, `seeked` or `stream` belong here.

use serde_json::json;

use crate::driver::Driver;
use crate::request::{Request, Scope};
use crate::session::MopidySession;

pub fn driver(session: MopidySession) -> Driver {
    Driver::new(session, Scope::Playback)
}

fn request(command: &str) -> Request {
    Request::new(Scope::Playback, command, None)
}

pub fn play() -> Request {
    request("play")
}

pub fn next() -> Request {
    request("next")
}

pub fn previous() -> Request {
    request("previous")
}

pub fn stop() -> Request {
    request("stop")
}

pub fn pause() -> Request {
    request("pause")
}

pub fn resume() -> Request {
    request("resume")
}

/// Seek to `time_position` milliseconds.
pub fn seek(time_position: u64) -> Request {
    Request::new(
        Scope::Playback,
        "seek",
        Some(json!({ "time_position": time_position })),
    )
}

/// `new_state` is one of `playing`, `paused`, `stopped`.
pub fn set_state(new_state: &str) -> Request {
    Request::new(
        Scope::Playback,
        "set_state",
        Some(json!({ "new_state": new_state })),
    )
}

pub fn get_state() -> Request {
    request("get_state")
}

pub fn get_current_tl_track() -> Request {
    request("get_current_tl_track")
}

pub fn get_current_tlid() -> Request {
    request("get_current_tlid")
}

pub fn get_current_track() -> Request {
    request("get_current_track")
}

pub fn get_stream_title() -> Request {
    request("get_stream_title")
}

pub fn get_time_position() -> Request {
    request("get_time_position")
}
