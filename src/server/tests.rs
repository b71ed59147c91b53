use std::collections::HashSet;
use std::sync::Arc;

use crate::accessory::Value;

use crate::protocol::http::Method;

use super::session::Session;
use super::{ServerEvent, allowed_before_established, apply_event};

#[test]
fn self_echo_is_suppressed_for_the_writer() {
    let mut writer_session = Session::new(1);
    let mut other_session = Session::new(2);

    let targets: HashSet<u64> = [1, 2].into_iter().collect();
    let event = ServerEvent::CharacteristicChanged {
        source: 1,
        targets: Arc::new(targets),
        aid: 1,
        iid: 10,
        value: Value::Bool(true),
    };

    apply_event(&mut writer_session, event.clone());
    apply_event(&mut other_session, event);

    assert!(writer_session.event_queue.is_empty());
    assert!(!other_session.event_queue.is_empty());
}

#[test]
fn non_subscribers_do_not_receive_the_change() {
    let mut session = Session::new(3);
    let targets: HashSet<u64> = [7].into_iter().collect();
    let event = ServerEvent::CharacteristicChanged {
        source: 1,
        targets: Arc::new(targets),
        aid: 1,
        iid: 10,
        value: Value::Bool(true),
    };

    apply_event(&mut session, event);
    assert!(session.event_queue.is_empty());
}

#[test]
fn force_disconnect_only_matches_the_owning_pairing() {
    let mut session = Session::new(4);
    session.pairing_id = Some("controller-a".to_string());

    apply_event(&mut session, ServerEvent::ForceDisconnect { pairing_id: "controller-b".to_string() });
    assert!(!session.disconnect);

    apply_event(&mut session, ServerEvent::ForceDisconnect { pairing_id: "controller-a".to_string() });
    assert!(session.disconnect);
}

#[test]
fn reset_disconnects_every_session_unconditionally() {
    let mut session = Session::new(5);
    assert!(!session.disconnect);

    apply_event(&mut session, ServerEvent::Reset);
    assert!(session.disconnect);
}

#[test]
fn identify_is_allowed_before_established_only_while_unpaired() {
    assert!(allowed_before_established(Method::Post, "/identify", false));
    assert!(!allowed_before_established(Method::Post, "/identify", true));
}

#[test]
fn other_paths_are_never_allowed_before_established() {
    assert!(!allowed_before_established(Method::Get, "/accessories", false));
    assert!(!allowed_before_established(Method::Post, "/pairings", false));
    assert!(!allowed_before_established(Method::Get, "/identify", false));
}
