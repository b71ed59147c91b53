use super::*;

fn sample_tree() -> AccessoryTree {
    let lightbulb = ServiceBuilder::new("00000043")
        .primary(true)
        .characteristic(
            CharacteristicBuilder::new("00000025", Format::Bool, Value::Bool(false))
                .permissions(CharacteristicPermissions::PAIRED_READ | CharacteristicPermissions::PAIRED_WRITE | CharacteristicPermissions::NOTIFY),
        )
        .characteristic(
            CharacteristicBuilder::new("00000008", Format::Uint8, Value::Uint8(50))
                .permissions(CharacteristicPermissions::PAIRED_READ | CharacteristicPermissions::PAIRED_WRITE)
                .range(0.0, 100.0),
        );

    let accessory = AccessoryBuilder::new(1, 5)
        .service(accessory_information("Lamp", "Acme", "L1", "SN1", "1.0"))
        .service(lightbulb)
        .build();

    AccessoryTree::new(vec![accessory])
}

#[test]
fn iids_are_assigned_sequentially_within_an_accessory() {
    let tree = sample_tree();
    let accessory = &tree.accessories()[0];
    let info_service = &accessory.services[0];
    let bulb_service = &accessory.services[1];

    assert_eq!(info_service.iid, 1);
    assert_eq!(info_service.characteristics[0].iid, 2);
    assert!(bulb_service.iid > info_service.characteristics.last().unwrap().iid);
}

#[test]
fn lookup_by_aid_iid_finds_the_on_characteristic() {
    let tree = sample_tree();
    let accessory = &tree.accessories()[0];
    let on_iid = accessory.services[1].characteristics[0].iid;

    assert!(tree.contains(1, on_iid));
    let ch = tree.get(1, on_iid).unwrap();
    assert_eq!(ch.value, Value::Bool(false));
}

#[test]
fn accessory_information_service_carries_the_mandatory_characteristics() {
    let tree = sample_tree();
    let accessory = &tree.accessories()[0];
    let info = &accessory.services[0];
    assert_eq!(info.characteristics.len(), 6);

    let names: Vec<&str> = info.characteristics.iter().map(|c| c.type_.as_str()).collect();
    assert!(names.iter().any(|t| t.starts_with("00000023"))); // NAME
    assert!(names.iter().any(|t| t.starts_with("00000014"))); // IDENTIFY
}

#[test]
fn value_omitted_without_paired_read() {
    let mut tree = sample_tree();
    let accessory_aid = tree.accessories()[0].aid;
    let on_iid = tree.accessories()[0].services[1].characteristics[0].iid;

    tree.get_mut(accessory_aid, on_iid).unwrap().permissions = CharacteristicPermissions::PAIRED_WRITE;
    let ch = tree.get(accessory_aid, on_iid).unwrap();
    let json = characteristic_json(accessory_aid, ch, JsonFlags::full());
    assert!(json.get("value").is_none());
}

#[test]
fn write_rejects_out_of_range_value_and_leaves_value_unchanged() {
    let mut tree = sample_tree();
    let aid = tree.accessories()[0].aid;
    let brightness_iid = tree.accessories()[0].services[1].characteristics[1].iid;

    let ch = tree.get_mut(aid, brightness_iid).unwrap();
    let result = ch.write(&serde_json::json!(150));
    assert!(matches!(result, Err(ValueError::AboveMax(150.0, 100.0))));
    assert_eq!(ch.value, Value::Uint8(50));
}

#[test]
fn write_within_range_updates_value_and_invokes_setter() {
    let mut tree = sample_tree();
    let aid = tree.accessories()[0].aid;
    let on_iid = tree.accessories()[0].services[1].characteristics[0].iid;

    let ch = tree.get_mut(aid, on_iid).unwrap();
    ch.write(&serde_json::json!(true)).unwrap();
    assert_eq!(ch.value, Value::Bool(true));
}

#[test]
fn subscription_tracking_adds_and_clears_on_teardown() {
    let mut tree = sample_tree();
    let aid = tree.accessories()[0].aid;
    let on_iid = tree.accessories()[0].services[1].characteristics[0].iid;

    tree.set_subscription(aid, on_iid, 7, true);
    assert!(tree.get(aid, on_iid).unwrap().subscribers.contains(&7));

    tree.unsubscribe_all(7);
    assert!(!tree.get(aid, on_iid).unwrap().subscribers.contains(&7));
}

#[test]
fn full_tree_json_has_accessories_and_services() {
    let tree = sample_tree();
    let json = tree.to_json();
    assert!(json["accessories"][0]["services"].as_array().unwrap().len() == 2);
}
