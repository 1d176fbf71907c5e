//! Tracklist controller, including the consume/random/repeat/single options.
//!
//! Events whose names contain `tracklist` or `options` belong here.

use serde_json::{Value, json};

use crate::driver::Driver;
use crate::request::{Request, Scope};
use crate::session::MopidySession;

pub fn driver(session: MopidySession) -> Driver {
    Driver::new(session, Scope::Tracklist)
}

fn request(command: &str) -> Request {
    Request::new(Scope::Tracklist, command, None)
}

fn with<const N: usize>(command: &str, params: [(&str, Option<Value>); N]) -> Request {
    Request::with_params(Scope::Tracklist, command, params)
}

pub fn add(uris: &[String], at_position: Option<u32>) -> Request {
    with(
        "add",
        [
            ("uris", Some(json!(uris))),
            ("at_position", at_position.map(Value::from)),
        ],
    )
}

/// `criteria` maps a field to the values to match, e.g. `{"tlid": [1, 2]}`.
pub fn remove(criteria: Value) -> Request {
    with("remove", [("criteria", Some(criteria))])
}

pub fn clear() -> Request {
    request("clear")
}

pub fn move_tracks(start: u32, end: u32, to_position: u32) -> Request {
    with(
        "move",
        [
            ("start", Some(start.into())),
            ("end", Some(end.into())),
            ("to_position", Some(to_position.into())),
        ],
    )
}

pub fn shuffle(start: Option<u32>, end: Option<u32>) -> Request {
    with(
        "shuffle",
        [
            ("start", start.map(Value::from)),
            ("end", end.map(Value::from)),
        ],
    )
}

pub fn get_tl_tracks() -> Request {
    request("get_tl_tracks")
}

pub fn index(tl_track: Option<Value>, tlid: Option<u64>) -> Request {
    with(
        "index",
        [("tl_track", tl_track), ("tlid", tlid.map(Value::from))],
    )
}

pub fn get_version() -> Request {
    request("get_version")
}

pub fn get_length() -> Request {
    request("get_length")
}

pub fn get_tracks() -> Request {
    request("get_tracks")
}

pub fn slice(start: u32, end: u32) -> Request {
    with(
        "slice",
        [("start", Some(start.into())), ("end", Some(end.into()))],
    )
}

pub fn filter(criteria: Value) -> Request {
    with("filter", [("criteria", Some(criteria))])
}

pub fn get_eot_tlid() -> Request {
    request("get_eot_tlid")
}

pub fn get_next_tlid() -> Request {
    request("get_next_tlid")
}

pub fn get_previous_tlid() -> Request {
    request("get_previous_tlid")
}

pub fn eot_track(tl_track: Option<Value>) -> Request {
    with("eot_track", [("tl_track", tl_track)])
}

pub fn next_track(tl_track: Option<Value>) -> Request {
    with("next_track", [("tl_track", tl_track)])
}

pub fn previous_track(tl_track: Option<Value>) -> Request {
    with("previous_track", [("tl_track", tl_track)])
}

/// Tracklist playback options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracklistOption {
    Consume,
    Random,
    Repeat,
    Single,
}

impl TracklistOption {
    fn name(&self) -> &'static str {
        match self {
            TracklistOption::Consume => "consume",
            TracklistOption::Random => "random",
            TracklistOption::Repeat => "repeat",
            TracklistOption::Single => "single",
        }
    }
}

pub fn get_option(option: TracklistOption) -> Request {
    request(&format!("get_{}", option.name()))
}

pub fn set_option(option: TracklistOption, value: bool) -> Request {
    with(
        &format!("set_{}", option.name()),
        [("value", Some(value.into()))],
    )
}
