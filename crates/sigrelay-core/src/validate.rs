/// Query-parameter validation shared by the connection handler and its tests.
///
/// The hub never needs to validate peer payloads (they're opaque), but it
/// does need to defensively validate the handful of strings carried in the
/// upgrade URL before trusting them as room/registry keys.
const ROOM_MIN: usize = 1;
const ROOM_MAX: usize = 64;
const CLIENT_ID_MIN: usize = 1;
const CLIENT_ID_MAX: usize = 128;

/// `true` if `s` is non-empty, within `[min, max]` bytes, and contains only
/// printable ASCII (no control characters, no whitespace).
fn is_valid_token(s: &str, min: usize, max: usize) -> bool {
    let len = s.len();
    if len < min || len > max {
        return false;
    }
    s.bytes().all(|b| b.is_ascii_graphic())
}

pub fn is_valid_room_code(code: &str) -> bool {
    is_valid_token(code, ROOM_MIN, ROOM_MAX)
}

pub fn is_valid_client_id(id: &str) -> bool {
    is_valid_token(id, CLIENT_ID_MIN, CLIENT_ID_MAX)
}
