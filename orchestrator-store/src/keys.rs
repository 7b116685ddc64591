//! Key naming for the keyed store (§4.2, §6 "Keyed store keys").
//!
//! Every operation is keyed by `(user_id, session_id?)`; the session segment
//! is omitted entirely (not left empty) when no session is given, matching
//! the bracketed-optional notation in the wire contract.

pub fn chat_history(user_id: &str, session_id: Option<&str>) -> String {
    scoped("chat_history", user_id, session_id)
}

pub fn session_summary(user_id: &str, session_id: Option<&str>) -> String {
    scoped("session_summary", user_id, session_id)
}

pub fn tool_state(user_id: &str, session_id: Option<&str>) -> String {
    scoped("tool_state", user_id, session_id)
}

pub fn person_profile(user_id: &str, person_id: &str) -> String {
    format!("person_profile:{user_id}:{person_id}")
}

pub fn chat_status(request_id: &str) -> String {
    format!("chat_status:{request_id}")
}

fn scoped(prefix: &str, user_id: &str, session_id: Option<&str>) -> String {
    match session_id {
        Some(session_id) => format!("{prefix}:{user_id}:{session_id}"),
        None => format!("{prefix}:{user_id}"),
    }
}

/// Pattern matching every key of `prefix` belonging to `user_id`, for `listSessions`
/// and the `list*` scans (§4.2).
pub fn scoped_scan_pattern(prefix: &str, user_id: &str) -> String {
    format!("{prefix}:{user_id}*")
}

/// Recovers the session id (if any) from a key produced by [`scoped`].
pub fn session_id_from_key(prefix: &str, user_id: &str, key: &str) -> Option<String> {
    let base = format!("{prefix}:{user_id}");
    if key == base {
        None
    } else {
        key.strip_prefix(&format!("{base}:")).map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_session_segment_when_absent() {
        assert_eq!(chat_history("u1", None), "chat_history:u1");
        assert_eq!(chat_history("u1", Some("s1")), "chat_history:u1:s1");
    }

    #[test]
    fn person_profile_always_has_both_segments() {
        assert_eq!(person_profile("u1", "p1"), "person_profile:u1:p1");
    }

    #[test]
    fn recovers_session_id_from_scoped_key() {
        assert_eq!(
            session_id_from_key("chat_history", "u1", "chat_history:u1:s1"),
            Some("s1".to_string())
        );
        assert_eq!(session_id_from_key("chat_history", "u1", "chat_history:u1"), None);
    }
}
