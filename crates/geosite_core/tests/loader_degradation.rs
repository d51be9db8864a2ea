mod common;

use common::{placed_item, ScriptedClient};
use geosite_core::{load_project_items, BundleBuilder, GeoPoint, ItemKind};

#[test]
fn failing_category_degrades_without_aborting_the_load() {
    let bundle = BundleBuilder::default().build(GeoPoint::new(40.0, -3.0).unwrap(), None);
    let client = ScriptedClient {
        items: vec![
            placed_item(1, ItemKind::Photo360, Some(bundle)),
            placed_item(1, ItemKind::GalleryImage, None),
            placed_item(1, ItemKind::Incident, Some(bundle)),
        ],
        failing_lists: vec![ItemKind::GalleryImage],
        ..ScriptedClient::default()
    };

    let report = load_project_items(&client, 1);
    assert!(!report.is_complete());
    assert_eq!(report.degraded.len(), 1);
    assert_eq!(report.degraded[0].0, ItemKind::GalleryImage);
    assert!(!report.degraded[0].1.is_partial_data());

    let store = report.into_store(1);
    let stats = store.stats();
    assert_eq!(stats.photos360, 1);
    assert_eq!(stats.gallery_images, 0);
    assert_eq!(stats.incidents, 1);
    assert_eq!(stats.with_coordinates, 2);
}

#[test]
fn unavailable_incident_endpoint_is_partial_data() {
    let client = ScriptedClient {
        items: vec![placed_item(1, ItemKind::Photo360, None)],
        incidents_unavailable: true,
        ..ScriptedClient::default()
    };

    let report = load_project_items(&client, 1);
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.degraded.len(), 1);
    assert!(report.degraded[0].1.is_partial_data());
    assert!(report.failed_kinds().is_empty());
    assert_eq!(report.unavailable_kinds(), vec![ItemKind::Incident]);
}

#[test]
fn failed_and_unavailable_categories_are_reported_apart() {
    let client = ScriptedClient {
        failing_lists: vec![ItemKind::Photo360],
        incidents_unavailable: true,
        ..ScriptedClient::default()
    };

    let report = load_project_items(&client, 1);
    assert_eq!(report.degraded.len(), 2);
    assert_eq!(report.failed_kinds(), vec![ItemKind::Photo360]);
    assert_eq!(report.unavailable_kinds(), vec![ItemKind::Incident]);
}

#[test]
fn items_of_other_projects_are_not_stored() {
    let client = ScriptedClient {
        items: vec![placed_item(2, ItemKind::Photo360, None)],
        ..ScriptedClient::default()
    };
    let store = load_project_items(&client, 1).into_store(1);
    assert!(store.is_empty());
}
