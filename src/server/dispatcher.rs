//! Routes HTTP-shaped requests to handlers, producing JSON or TLV
//! responses (C8, §4.5).

#[cfg(test)]
mod tests;

use serde_json::{Value as Json, json};

use crate::accessory::{AccessoryTree, CharacteristicPermissions, JsonFlags, Value, ValueError, characteristic_json};
use crate::protocol::http::{HttpRequest, Method, ResponseBuilder, StatusCode, encode_response};
use crate::protocol::pairing::storage::{AccessoryIdentity, IdentityStore, Permissions};
use crate::protocol::pairing::tlv::{TlvDecoder, TlvEncoder, TlvType, errors, methods};
use crate::protocol::pairing::{PairSetup, PairSetupStep, PairVerify, PairVerifyStep, SetupCode};

use super::session::{Session, SessionId, SessionStep};
use super::status;

/// Holds the process-wide Pair-Setup context (§3 — at most one at a time,
/// §8 property 2).
struct PairingContext {
    owner: SessionId,
    state: PairSetup,
}

/// Side effects of one dispatched request the server loop must carry out:
/// fan out characteristic changes to subscribers (suppressing the writer,
/// §4.5/§8 property 4), and force-disconnect sessions tied to a pairing
/// that just got removed (§8 property 3, S6).
pub struct DispatchResult {
    pub wire: Vec<u8>,
    pub changes: Vec<(u64, u64, Value)>,
    pub removed_pairing_id: Option<String>,
    /// Set by `/reset` (§4.5): storage has been wiped, every connected
    /// session must be torn down so the accessory re-enters unpaired mode.
    pub reset: bool,
    /// Set whenever the pairing state changed (Pair-Setup completed,
    /// AddPairing/RemovePairing, or `/reset`) so the server loop can
    /// re-announce `_hap._tcp` with a fresh `sf` TXT field (§6).
    pub pairing_changed: bool,
}

impl DispatchResult {
    fn reply(wire: Vec<u8>) -> Self {
        Self {
            wire,
            changes: Vec::new(),
            removed_pairing_id: None,
            reset: false,
            pairing_changed: false,
        }
    }
}

type ResourceHandler = Box<dyn FnMut(&[u8]) -> (StatusCode, Vec<u8>) + Send>;

/// Owns the accessory tree, the identity store, and the process-wide
/// Pair-Setup context; routes every inbound request (C8).
pub struct Dispatcher {
    pub tree: AccessoryTree,
    identity: AccessoryIdentity,
    store: Box<dyn IdentityStore + Send>,
    setup_code: SetupCode,
    pairing_context: Option<PairingContext>,
    resource_handler: Option<ResourceHandler>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(tree: AccessoryTree, identity: AccessoryIdentity, store: Box<dyn IdentityStore + Send>, setup_code: SetupCode) -> Self {
        Self {
            tree,
            identity,
            store,
            setup_code,
            pairing_context: None,
            resource_handler: None,
        }
    }

    pub fn set_resource_handler(&mut self, handler: impl FnMut(&[u8]) -> (StatusCode, Vec<u8>) + Send + 'static) {
        self.resource_handler = Some(Box::new(handler));
    }

    /// Sessions currently subscribed to `(aid,iid)` (§4.6 — the server loop
    /// uses this right after a write to fan the change out).
    #[must_use]
    pub fn subscribers(&self, aid: u64, iid: u64) -> std::collections::HashSet<SessionId> {
        self.tree.get(aid, iid).map(|ch| ch.subscribers.clone()).unwrap_or_default()
    }

    /// Route one request. `session` is the connection it arrived on.
    pub fn handle(&mut self, session: &mut Session, request: &HttpRequest) -> DispatchResult {
        match (request.method, request.path.as_str()) {
            (Method::Post, "/pair-setup") => self.handle_pair_setup(session, &request.body),
            (Method::Post, "/pair-verify") => self.handle_pair_verify(session, &request.body),
            (Method::Post, "/identify") => self.handle_identify(),
            (Method::Get, "/accessories") if session.is_established() => DispatchResult::reply(self.handle_get_accessories()),
            (Method::Get, "/characteristics") if session.is_established() => {
                DispatchResult::reply(self.handle_get_characteristics(session, request))
            }
            (Method::Put, "/characteristics") if session.is_established() => self.handle_put_characteristics(session, &request.body),
            (Method::Post, "/pairings") if session.is_established() && session.is_admin() => self.handle_pairings(&request.body),
            (Method::Post, "/resource") if session.is_established() => DispatchResult::reply(self.handle_resource(&request.body)),
            (Method::Post, "/reset") if session.is_established() && session.is_admin() => self.handle_reset(),
            _ => DispatchResult::reply(ResponseBuilder::error(StatusCode::NOT_FOUND).encode()),
        }
    }

    fn handle_pair_setup(&mut self, session: &mut Session, body: &[u8]) -> DispatchResult {
        let tlv = match TlvDecoder::decode(body) {
            Ok(t) => t,
            Err(_) => return DispatchResult::reply(tlv_response(error_tlv(1, errors::UNKNOWN))),
        };
        let state = tlv.get_state().unwrap_or(0);

        if state == 1 {
            if self.store.has_admin_pairing() {
                return DispatchResult::reply(tlv_response(crate::protocol::pairing::setup::refusal(errors::UNAVAILABLE)));
            }
            if let Some(ctx) = &self.pairing_context {
                if ctx.owner != session.id {
                    return DispatchResult::reply(tlv_response(crate::protocol::pairing::setup::refusal(errors::BUSY)));
                }
            }
        }

        let mut ps = match self.pairing_context.take() {
            Some(ctx) if ctx.owner == session.id => ctx.state,
            Some(ctx) => {
                // Another session owns the in-flight context; put it back
                // and refuse this one.
                self.pairing_context = Some(ctx);
                return DispatchResult::reply(tlv_response(error_tlv(state, errors::BUSY)));
            }
            None if state == 1 => PairSetup::new(),
            None => return DispatchResult::reply(tlv_response(error_tlv(state, errors::UNKNOWN))),
        };

        let step = ps.step(body, &self.setup_code, &self.identity, self.store.as_mut());
        match step {
            PairSetupStep::Continue(bytes) => {
                self.pairing_context = Some(PairingContext { owner: session.id, state: ps });
                session.step = SessionStep::PairSetupInProgress;
                DispatchResult::reply(tlv_response(bytes))
            }
            PairSetupStep::Failed(bytes) => {
                session.step = SessionStep::None;
                DispatchResult::reply(tlv_response(bytes))
            }
            PairSetupStep::Complete(bytes, _pairing) => {
                session.step = SessionStep::None;
                let mut result = DispatchResult::reply(tlv_response(bytes));
                result.pairing_changed = true;
                result
            }
        }
    }

    fn handle_pair_verify(&mut self, session: &mut Session, body: &[u8]) -> DispatchResult {
        let tlv = match TlvDecoder::decode(body) {
            Ok(t) => t,
            Err(_) => return DispatchResult::reply(tlv_response(error_tlv(1, errors::UNKNOWN))),
        };
        let state = tlv.get_state().unwrap_or(0);

        if state == 1 {
            session.pair_verify = Some(PairVerify::new());
            session.step = SessionStep::PairVerifyInProgress;
        }

        let Some(mut pv) = session.pair_verify.take() else {
            return DispatchResult::reply(tlv_response(error_tlv(state, errors::UNKNOWN)));
        };

        match pv.step(body, &self.identity, self.store.as_ref()) {
            PairVerifyStep::Continue(bytes) => {
                session.pair_verify = Some(pv);
                DispatchResult::reply(tlv_response(bytes))
            }
            PairVerifyStep::Failed(bytes) => {
                session.pair_verify = None;
                session.step = SessionStep::None;
                DispatchResult::reply(tlv_response(bytes))
            }
            PairVerifyStep::Complete(bytes, pairing, keys) => {
                session.establish(&keys.read_key, &keys.write_key, pairing.device_id, pairing.permissions);
                DispatchResult::reply(tlv_response(bytes))
            }
        }
    }

    /// Whether the identity store currently holds an admin pairing (§4.5's
    /// `/identify` dispatch-state gate, §9 "server.paired").
    #[must_use]
    pub fn has_admin_pairing(&self) -> bool {
        self.store.has_admin_pairing()
    }

    fn handle_identify(&mut self) -> DispatchResult {
        if self.store.has_admin_pairing() {
            let body = json!({ "status": status::INSUFFICIENT_PRIVILEGES }).to_string().into_bytes();
            DispatchResult::reply(ResponseBuilder::error(StatusCode::BAD_REQUEST).json_body(body).encode())
        } else {
            DispatchResult::reply(ResponseBuilder::no_content().encode())
        }
    }

    fn handle_get_accessories(&self) -> Vec<u8> {
        let body = self.tree.to_json().to_string().into_bytes();
        ResponseBuilder::ok().json_body(body).encode()
    }

    fn handle_get_characteristics(&mut self, session: &Session, request: &HttpRequest) -> Vec<u8> {
        let Some(id_param) = request.query.get("id") else {
            let body = json!({ "status": status::INVALID_VALUE }).to_string().into_bytes();
            return ResponseBuilder::error(StatusCode::BAD_REQUEST).json_body(body).encode();
        };
        let query_flag = |name: &str| request.query.get(name).map(String::as_str) == Some("1");
        let flags = JsonFlags {
            type_: query_flag("type"),
            perms: query_flag("perms"),
            meta: query_flag("meta"),
            ev: query_flag("ev").then_some(session.id),
        };

        let mut any_error = false;
        let mut items: Vec<Json> = Vec::new();

        for pair in id_param.split(',') {
            let Some((aid_str, iid_str)) = pair.split_once('.') else {
                any_error = true;
                continue;
            };
            let (Ok(aid), Ok(iid)) = (aid_str.parse::<u64>(), iid_str.parse::<u64>()) else {
                any_error = true;
                continue;
            };

            match self.tree.get_mut(aid, iid) {
                None => {
                    any_error = true;
                    items.push(json!({ "aid": aid, "iid": iid, "status": status::NO_RESOURCE }));
                }
                Some(ch) if !ch.permissions.contains(CharacteristicPermissions::PAIRED_READ) => {
                    any_error = true;
                    items.push(json!({ "aid": aid, "iid": iid, "status": status::WRITE_ONLY }));
                }
                Some(ch) => {
                    ch.read();
                    items.push(characteristic_json(aid, ch, flags));
                }
            }
        }

        let body = json!({ "characteristics": items }).to_string().into_bytes();
        let status_code = if any_error { StatusCode::MULTI_STATUS } else { StatusCode::OK };
        ResponseBuilder::new(status_code).json_body(body).encode()
    }

    fn handle_put_characteristics(&mut self, session: &mut Session, body: &[u8]) -> DispatchResult {
        let parsed: Result<Json, _> = serde_json::from_slice(body);
        let Ok(Json::Object(root)) = parsed else {
            let err_body = json!({ "status": status::INVALID_VALUE }).to_string().into_bytes();
            return DispatchResult::reply(ResponseBuilder::error(StatusCode::BAD_REQUEST).json_body(err_body).encode());
        };
        let Some(Json::Array(entries)) = root.get("characteristics") else {
            let err_body = json!({ "status": status::INVALID_VALUE }).to_string().into_bytes();
            return DispatchResult::reply(ResponseBuilder::error(StatusCode::BAD_REQUEST).json_body(err_body).encode());
        };

        let mut any_error = false;
        let mut items: Vec<Json> = Vec::new();
        let mut changes = Vec::new();

        for entry in entries {
            let aid = entry.get("aid").and_then(Json::as_u64);
            let iid = entry.get("iid").and_then(Json::as_u64);
            let (Some(aid), Some(iid)) = (aid, iid) else {
                any_error = true;
                continue;
            };

            let Some(ch) = self.tree.get_mut(aid, iid) else {
                any_error = true;
                items.push(json!({ "aid": aid, "iid": iid, "status": status::NO_RESOURCE }));
                continue;
            };

            let mut item_status = status::SUCCESS;
            let mut do_subscribe: Option<bool> = None;

            if let Some(value_json) = entry.get("value") {
                if !ch.permissions.contains(CharacteristicPermissions::PAIRED_WRITE) {
                    item_status = status::READ_ONLY;
                } else {
                    match ch.write(value_json) {
                        Ok(()) => changes.push((aid, iid, ch.value.clone())),
                        Err(ValueError::SetterRejected(_)) => item_status = status::RESOURCE_BUSY,
                        Err(_) => item_status = status::INVALID_VALUE,
                    }
                }
            }

            if item_status == status::SUCCESS {
                if let Some(ev) = entry.get("ev").and_then(Json::as_bool) {
                    if ch.permissions.contains(CharacteristicPermissions::NOTIFY) {
                        do_subscribe = Some(ev);
                    } else {
                        item_status = status::NOTIFICATIONS_UNSUPPORTED;
                    }
                }
            }

            if item_status != status::SUCCESS {
                any_error = true;
                items.push(json!({ "aid": aid, "iid": iid, "status": item_status }));
            }

            if let Some(ev) = do_subscribe {
                self.tree.set_subscription(aid, iid, session.id, ev);
            }
        }

        let wire = if any_error {
            let body = json!({ "characteristics": items }).to_string().into_bytes();
            ResponseBuilder::new(StatusCode::MULTI_STATUS).json_body(body).encode()
        } else {
            ResponseBuilder::no_content().encode()
        };

        DispatchResult {
            wire,
            changes,
            removed_pairing_id: None,
            reset: false,
            pairing_changed: false,
        }
    }

    fn handle_pairings(&mut self, body: &[u8]) -> DispatchResult {
        let tlv = match TlvDecoder::decode(body) {
            Ok(t) => t,
            Err(_) => return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN))),
        };
        let method = tlv.get_u8(TlvType::Method).unwrap_or(0xFF);

        match method {
            m if m == methods::ADD_PAIRING => self.handle_add_pairing(&tlv),
            m if m == methods::REMOVE_PAIRING => self.handle_remove_pairing(&tlv),
            m if m == methods::LIST_PAIRINGS => self.handle_list_pairings(),
            _ => DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN))),
        }
    }

    fn handle_add_pairing(&mut self, tlv: &TlvDecoder) -> DispatchResult {
        let (Ok(identifier), Ok(public_key_bytes)) = (tlv.get_required(TlvType::Identifier), tlv.get_required(TlvType::PublicKey)) else {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
        };
        let Ok(device_id) = std::str::from_utf8(identifier) else {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
        };
        if public_key_bytes.len() != 32 {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
        }
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(public_key_bytes);

        let is_admin = tlv.get_u8(TlvType::Permissions).unwrap_or(0) & 0x01 != 0;
        let permissions = if is_admin { Permissions::ADMIN } else { Permissions::USER };

        if let Some(existing) = self.store.find_pairing(device_id) {
            if existing.device_public_key != public_key {
                return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
            }
        } else if !self.store.can_add_pairing() {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::MAX_PEERS)));
        }

        let pairing = crate::protocol::pairing::storage::Pairing {
            device_id: device_id.to_string(),
            device_public_key: public_key,
            permissions,
        };
        if self.store.add_pairing(pairing).is_err() {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::MAX_PEERS)));
        }

        let mut result = DispatchResult::reply(tlv_response(TlvEncoder::new().add_state(2).build()));
        result.pairing_changed = true;
        result
    }

    fn handle_remove_pairing(&mut self, tlv: &TlvDecoder) -> DispatchResult {
        let Ok(identifier) = tlv.get_required(TlvType::Identifier) else {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
        };
        let Ok(device_id) = std::str::from_utf8(identifier) else {
            return DispatchResult::reply(tlv_response(error_tlv(2, errors::UNKNOWN)));
        };

        let _ = self.store.remove_pairing(device_id);

        DispatchResult {
            wire: tlv_response(TlvEncoder::new().add_state(2).build()),
            changes: Vec::new(),
            removed_pairing_id: Some(device_id.to_string()),
            reset: false,
            pairing_changed: true,
        }
    }

    fn handle_list_pairings(&mut self) -> DispatchResult {
        let mut encoder = TlvEncoder::new().add_state(2);
        let pairings = self.store.list_pairings();
        for (i, pairing) in pairings.iter().enumerate() {
            if i > 0 {
                encoder = encoder.add(TlvType::Separator, &[]);
            }
            encoder = encoder
                .add(TlvType::Identifier, pairing.device_id.as_bytes())
                .add(TlvType::PublicKey, &pairing.device_public_key)
                .add_byte(TlvType::Permissions, pairing.permissions.bits());
        }
        DispatchResult::reply(tlv_response(encoder.build()))
    }

    /// `POST /reset` (§4.5, admin-only): wipe the identity/pairing store
    /// and signal the server loop to tear down every connected session so
    /// the accessory re-enters unpaired mode.
    fn handle_reset(&mut self) -> DispatchResult {
        self.pairing_context = None;
        let wire = match self.store.reset() {
            Ok(()) => ResponseBuilder::no_content().encode(),
            Err(_) => {
                let body = json!({ "status": status::RESOURCE_BUSY }).to_string().into_bytes();
                ResponseBuilder::error(StatusCode::INTERNAL_SERVER_ERROR).json_body(body).encode()
            }
        };
        DispatchResult {
            wire,
            changes: Vec::new(),
            removed_pairing_id: None,
            reset: true,
            pairing_changed: true,
        }
    }

    /// Snapshot of the state the `_hap._tcp` TXT records are computed from
    /// (delegated collaborator, §6): the server loop re-announces whenever
    /// [`DispatchResult::pairing_changed`] comes back set.
    #[cfg(feature = "discovery")]
    #[must_use]
    pub fn advertised_state(&self, config: &crate::config::ServerConfig) -> crate::discovery::AdvertisedState {
        crate::discovery::AdvertisedState {
            model: config.model.clone(),
            accessory_id: self.identity.accessory_id.clone(),
            config_number: 1,
            category: config.category,
            paired: self.store.has_admin_pairing(),
            setup_id: config.setup_id.clone(),
        }
    }

    fn handle_resource(&mut self, body: &[u8]) -> Vec<u8> {
        match self.resource_handler.as_mut() {
            Some(handler) => {
                let (status, resp_body) = handler(body);
                ResponseBuilder::new(status).json_body(resp_body).encode()
            }
            None => ResponseBuilder::error(StatusCode::NOT_FOUND).encode(),
        }
    }
}

fn tlv_response(body: Vec<u8>) -> Vec<u8> {
    encode_response(&ResponseBuilder::ok().tlv_body(body).build())
}

fn error_tlv(state: u8, code: u8) -> Vec<u8> {
    TlvEncoder::new().add_state(state).add_byte(TlvType::Error, code).build()
}
