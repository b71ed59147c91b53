use std::collections::HashMap;

use crate::accessory::{AccessoryBuilder, AccessoryTree, CharacteristicBuilder, CharacteristicPermissions, Format, ServiceBuilder, Value, accessory_information};
use crate::protocol::http::{HttpRequest, Method};
use crate::protocol::pairing::SetupCode;
use crate::protocol::pairing::storage::{AccessoryIdentity, IdentityStore, MemoryStore, Pairing, Permissions};
use crate::protocol::pairing::tlv::{TlvDecoder, TlvEncoder, TlvType, methods};

use super::Dispatcher;
use crate::server::session::{Session, SessionStep};

fn identity() -> AccessoryIdentity {
    let kp = crate::protocol::crypto::Ed25519KeyPair::generate();
    AccessoryIdentity {
        accessory_id: "AA:BB:CC:DD:EE:FF".to_string(),
        secret_key: kp.secret_bytes(),
        public_key: *kp.public_key().as_bytes(),
    }
}

fn dispatcher_with_lightbulb() -> Dispatcher {
    let lightbulb = ServiceBuilder::new("00000043").primary(true).characteristic(
        CharacteristicBuilder::new("00000025", Format::Bool, Value::Bool(false))
            .permissions(CharacteristicPermissions::PAIRED_READ | CharacteristicPermissions::PAIRED_WRITE | CharacteristicPermissions::NOTIFY),
    );
    let accessory = AccessoryBuilder::new(1, 5)
        .service(accessory_information("Lamp", "Acme", "L1", "SN1", "1.0"))
        .service(lightbulb)
        .build();
    let tree = AccessoryTree::new(vec![accessory]);
    let setup_code = SetupCode::parse("111-11-111").unwrap();
    Dispatcher::new(tree, identity(), Box::new(MemoryStore::new()), setup_code)
}

fn established_session(id: u64, admin: bool) -> Session {
    let mut session = Session::new(id);
    session.step = SessionStep::Established;
    session.permissions = if admin { Permissions::ADMIN } else { Permissions::USER };
    session
}

fn get_request(path: &str, query: &[(&str, &str)]) -> HttpRequest {
    HttpRequest {
        method: Method::Get,
        path: path.to_string(),
        query: query.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect::<HashMap<_, _>>(),
        headers: crate::protocol::http::Headers::new(),
        body: Vec::new(),
    }
}

fn on_characteristic_iid(dispatcher: &Dispatcher) -> u64 {
    dispatcher.tree.accessories()[0].services[1].characteristics[0].iid
}

#[test]
fn get_characteristics_omits_type_and_perms_by_default() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);
    let iid = on_characteristic_iid(&dispatcher);

    let request = get_request("/characteristics", &[("id", &format!("1.{iid}"))]);
    let result = dispatcher.handle(&mut session, &request);
    let body = response_json_body(&result.wire);

    let item = &body["characteristics"][0];
    assert!(item.get("type").is_none());
    assert!(item.get("perms").is_none());
    assert!(item.get("ev").is_none());
    assert_eq!(item["value"], serde_json::json!(false));
}

#[test]
fn get_characteristics_honors_type_perms_and_ev_flags() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);
    let iid = on_characteristic_iid(&dispatcher);

    dispatcher.tree.set_subscription(1, iid, session.id, true);

    let request = get_request("/characteristics", &[("id", &format!("1.{iid}")), ("type", "1"), ("perms", "1"), ("ev", "1")]);
    let result = dispatcher.handle(&mut session, &request);
    let body = response_json_body(&result.wire);

    let item = &body["characteristics"][0];
    assert_eq!(item["type"], serde_json::json!("00000025"));
    assert!(item["perms"].as_array().unwrap().contains(&serde_json::json!("ev")));
    assert_eq!(item["ev"], serde_json::json!(true));
}

#[test]
fn reset_wipes_storage_and_flags_the_result_for_teardown() {
    let mut dispatcher = dispatcher_with_lightbulb();
    dispatcher
        .store
        .add_pairing(Pairing {
            device_id: "some-controller".to_string(),
            device_public_key: [1u8; 32],
            permissions: Permissions::ADMIN,
        })
        .unwrap();
    assert!(dispatcher.store.has_admin_pairing());

    let mut session = established_session(1, true);
    let request = HttpRequest {
        method: Method::Post,
        path: "/reset".to_string(),
        query: HashMap::new(),
        headers: crate::protocol::http::Headers::new(),
        body: Vec::new(),
    };

    let result = dispatcher.handle(&mut session, &request);
    assert!(result.reset);
    assert!(!dispatcher.store.has_admin_pairing());
}

#[test]
fn reset_is_rejected_for_non_admin_sessions() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);
    let request = HttpRequest {
        method: Method::Post,
        path: "/reset".to_string(),
        query: HashMap::new(),
        headers: crate::protocol::http::Headers::new(),
        body: Vec::new(),
    };

    let result = dispatcher.handle(&mut session, &request);
    assert!(!result.reset);
}

fn put_request(body: serde_json::Value) -> HttpRequest {
    HttpRequest {
        method: Method::Put,
        path: "/characteristics".to_string(),
        query: HashMap::new(),
        headers: crate::protocol::http::Headers::new(),
        body: body.to_string().into_bytes(),
    }
}

fn pairings_request(body: Vec<u8>) -> HttpRequest {
    HttpRequest {
        method: Method::Post,
        path: "/pairings".to_string(),
        query: HashMap::new(),
        headers: crate::protocol::http::Headers::new(),
        body,
    }
}

#[test]
fn put_characteristics_writes_the_value_and_returns_no_content() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);
    let iid = on_characteristic_iid(&dispatcher);

    let request = put_request(serde_json::json!({
        "characteristics": [{ "aid": 1, "iid": iid, "value": true }]
    }));
    let result = dispatcher.handle(&mut session, &request);

    assert_eq!(result.wire, crate::protocol::http::ResponseBuilder::no_content().encode());
    assert_eq!(result.changes, vec![(1, iid, Value::Bool(true))]);
    assert_eq!(dispatcher.tree.get(1, iid).unwrap().value, Value::Bool(true));
}

fn dispatcher_with_ranged_percentage() -> (Dispatcher, u64) {
    let service = ServiceBuilder::new("00000043").characteristic(
        CharacteristicBuilder::new("00000008", Format::UInt8, Value::Uint8(50))
            .permissions(CharacteristicPermissions::PAIRED_READ | CharacteristicPermissions::PAIRED_WRITE)
            .range(0.0, 100.0),
    );
    let accessory = AccessoryBuilder::new(1, 5)
        .service(accessory_information("Fan", "Acme", "F1", "SN2", "1.0"))
        .service(service)
        .build();
    let tree = AccessoryTree::new(vec![accessory]);
    let iid = tree.accessories()[0].services[1].characteristics[0].iid;
    let setup_code = SetupCode::parse("111-11-111").unwrap();
    (Dispatcher::new(tree, identity(), Box::new(MemoryStore::new()), setup_code), iid)
}

#[test]
fn put_characteristics_out_of_range_value_is_rejected_and_value_unchanged() {
    let (mut dispatcher, iid) = dispatcher_with_ranged_percentage();
    let mut session = established_session(1, false);

    let request = put_request(serde_json::json!({
        "characteristics": [{ "aid": 1, "iid": iid, "value": 150 }]
    }));
    let result = dispatcher.handle(&mut session, &request);
    let body = response_json_body(&result.wire);

    assert_eq!(body["characteristics"][0]["status"], serde_json::json!(super::status::INVALID_VALUE));
    assert_eq!(dispatcher.tree.get(1, iid).unwrap().value, Value::Uint8(50));
    assert!(result.changes.is_empty());
}

#[test]
fn put_characteristics_requires_paired_write_permission() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);

    // The mandatory NAME characteristic is read-only.
    let name_iid = dispatcher.tree.accessories()[0].services[0].characteristics[0].iid;
    let request = put_request(serde_json::json!({
        "characteristics": [{ "aid": 1, "iid": name_iid, "value": "New Name" }]
    }));
    let result = dispatcher.handle(&mut session, &request);
    let body = response_json_body(&result.wire);

    assert_eq!(body["characteristics"][0]["status"], serde_json::json!(super::status::READ_ONLY));
}

#[test]
fn put_characteristics_subscribe_requires_notify_permission() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut session = established_session(1, false);

    let name_iid = dispatcher.tree.accessories()[0].services[0].characteristics[0].iid;
    let request = put_request(serde_json::json!({
        "characteristics": [{ "aid": 1, "iid": name_iid, "ev": true }]
    }));
    let result = dispatcher.handle(&mut session, &request);
    let body = response_json_body(&result.wire);

    assert_eq!(body["characteristics"][0]["status"], serde_json::json!(super::status::NOTIFICATIONS_UNSUPPORTED));
    assert!(!dispatcher.tree.get(1, name_iid).unwrap().subscribers.contains(&session.id));
}

#[test]
fn add_pairing_requires_admin() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let inner = TlvEncoder::new()
        .add_method(methods::ADD_PAIRING)
        .add(TlvType::Identifier, b"controller-a")
        .add(TlvType::PublicKey, &[7u8; 32])
        .build();

    let mut non_admin = established_session(1, false);
    let result = dispatcher.handle(&mut non_admin, &pairings_request(inner));
    assert_eq!(result.wire, crate::protocol::http::ResponseBuilder::error(crate::protocol::http::StatusCode::NOT_FOUND).encode());
}

#[test]
fn add_pairing_then_list_pairings_round_trips_admin() {
    let mut dispatcher = dispatcher_with_lightbulb();
    let mut admin = established_session(1, true);

    let add = TlvEncoder::new()
        .add_method(methods::ADD_PAIRING)
        .add(TlvType::Identifier, b"controller-a")
        .add(TlvType::PublicKey, &[7u8; 32])
        .add_byte(TlvType::Permissions, 0x01)
        .build();
    let result = dispatcher.handle(&mut admin, &pairings_request(add));
    assert!(result.pairing_changed);
    assert!(dispatcher.store.find_pairing("controller-a").is_some());

    let list = TlvEncoder::new().add_method(methods::LIST_PAIRINGS).build();
    let result = dispatcher.handle(&mut admin, &pairings_request(list));
    let tlv_body = extract_tlv_body(&result.wire);
    let decoded = TlvDecoder::decode(&tlv_body).unwrap();
    assert_eq!(decoded.get_required(TlvType::Identifier).unwrap(), b"controller-a");
}

#[test]
fn remove_pairing_flags_force_disconnect_and_pairing_changed() {
    let mut dispatcher = dispatcher_with_lightbulb();
    dispatcher
        .store
        .add_pairing(Pairing {
            device_id: "controller-a".to_string(),
            device_public_key: [7u8; 32],
            permissions: Permissions::ADMIN,
        })
        .unwrap();
    let mut admin = established_session(1, true);

    let remove = TlvEncoder::new()
        .add_method(methods::REMOVE_PAIRING)
        .add(TlvType::Identifier, b"controller-a")
        .build();
    let result = dispatcher.handle(&mut admin, &pairings_request(remove));

    assert_eq!(result.removed_pairing_id.as_deref(), Some("controller-a"));
    assert!(result.pairing_changed);
    assert!(dispatcher.store.find_pairing("controller-a").is_none());
}

fn identify_request() -> HttpRequest {
    HttpRequest {
        method: Method::Post,
        path: "/identify".to_string(),
        query: HashMap::new(),
        headers: crate::protocol::http::Headers::new(),
        body: Vec::new(),
    }
}

#[test]
fn identify_succeeds_when_unpaired_regardless_of_session_step() {
    for step in [SessionStep::None, SessionStep::PairSetupInProgress, SessionStep::Established] {
        let mut dispatcher = dispatcher_with_lightbulb();
        assert!(!dispatcher.store.has_admin_pairing());

        let mut session = Session::new(1);
        session.step = step;
        let result = dispatcher.handle(&mut session, &identify_request());

        assert_eq!(result.wire, crate::protocol::http::ResponseBuilder::no_content().encode());
    }
}

#[test]
fn identify_is_refused_once_an_admin_pairing_exists() {
    let mut dispatcher = dispatcher_with_lightbulb();
    dispatcher
        .store
        .add_pairing(Pairing {
            device_id: "some-controller".to_string(),
            device_public_key: [1u8; 32],
            permissions: Permissions::ADMIN,
        })
        .unwrap();

    let mut session = established_session(1, false);
    let result = dispatcher.handle(&mut session, &identify_request());
    let body = response_json_body(&result.wire);

    assert_eq!(body["status"], serde_json::json!(super::status::INSUFFICIENT_PRIVILEGES));
}

fn extract_tlv_body(wire: &[u8]) -> Vec<u8> {
    let split = wire.windows(4).position(|w| w == b"\r\n\r\n").expect("header/body separator");
    wire[split + 4..].to_vec()
}

fn response_json_body(wire: &[u8]) -> serde_json::Value {
    let split = wire.windows(4).position(|w| w == b"\r\n\r\n").expect("header/body separator");
    serde_json::from_slice(&wire[split + 4..]).expect("valid JSON body")
}
