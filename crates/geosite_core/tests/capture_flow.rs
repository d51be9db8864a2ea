mod common;

use common::ScriptedClient;
use geosite_core::session::SubmitOutcome;
use geosite_core::{
    open_db_in_memory, BundleBuilder, CaptureError, CaptureForm, CaptureSession, CaptureState,
    FileRef, GeoPoint, IncidentDetails, ItemKind, MapItemStore, PersistenceClient,
    ProjectOrigin, SqlitePersistence, ValidationError,
};

fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).unwrap()
}

#[test]
fn photo_capture_is_persisted_and_stored() {
    let conn = open_db_in_memory().unwrap();
    let client = SqlitePersistence::new(&conn);
    client.ensure_project(3, "tunnel").unwrap();
    let builder = BundleBuilder::default();
    let origin = ProjectOrigin {
        origin: point(40.0, -3.0),
        rotation_degrees: 0.0,
    };
    let mut store = MapItemStore::new(3);
    let mut session = CaptureSession::new();

    session.select_tool(ItemKind::Photo360);
    let placed = *session
        .click(point(40.001, -3.0), &builder, Some(&origin))
        .unwrap();
    assert!(placed.local.is_some());

    let outcome = session
        .submit(
            CaptureForm::Media {
                file: Some(FileRef::new("pano.jpg", vec![0xff, 0xd8])),
                z: 2.0,
            },
            &client,
            &mut store,
        )
        .unwrap();

    let SubmitOutcome::Created { id, attached } = outcome else {
        panic!("expected a created item, got {outcome:?}");
    };
    assert!(attached);
    assert_eq!(session.state(), &CaptureState::Idle);
    let stored = store.get(id).unwrap();
    assert_eq!(stored.height, 2.0);
    assert_eq!(stored.bundle.unwrap().geo, placed.geo);
    assert_eq!(client.list_photos360(3).unwrap().len(), 1);
}

#[test]
fn missing_file_is_rejected_without_network_call() {
    let client = ScriptedClient::default();
    let mut store = MapItemStore::new(1);
    let mut session = CaptureSession::new();
    session.select_tool(ItemKind::GalleryImage);
    session.click(point(40.0, -3.0), &BundleBuilder::default(), None);

    let err = session
        .submit(CaptureForm::Media { file: None, z: 0.0 }, &client, &mut store)
        .unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Validation(ValidationError::MissingFile)
    ));
    assert_eq!(client.writes.get(), 0);
    assert!(matches!(session.state(), CaptureState::Positioned { .. }));
}

#[test]
fn transport_failure_returns_to_positioned_for_retry() {
    let client = ScriptedClient::default();
    client.fail_writes.set(true);
    let mut store = MapItemStore::new(1);
    let mut session = CaptureSession::new();
    session.select_tool(ItemKind::Incident);
    let placed = *session
        .click(point(40.0, -3.0), &BundleBuilder::default(), None)
        .unwrap();

    let form = CaptureForm::Incident {
        details: IncidentDetails::new("Water leak"),
        z: 0.0,
    };
    let err = session.submit(form.clone(), &client, &mut store).unwrap_err();
    assert!(matches!(err, CaptureError::Transport(_)));
    assert_eq!(
        session.state(),
        &CaptureState::Positioned {
            mode: ItemKind::Incident,
            bundle: placed
        }
    );
    assert!(store.is_empty());

    client.fail_writes.set(false);
    assert!(session.submit(form, &client, &mut store).is_ok());
    assert_eq!(store.len(), 1);
}

#[test]
fn response_after_cancel_is_still_stored_for_same_project() {
    let client = ScriptedClient::default();
    let mut store = MapItemStore::new(1);
    let mut session = CaptureSession::new();
    session.select_tool(ItemKind::Photo360);
    session.click(point(40.0, -3.0), &BundleBuilder::default(), None);

    let request = session
        .begin_submit(CaptureForm::Media {
            file: Some(FileRef::new("late.jpg", vec![1])),
            z: 0.0,
        })
        .unwrap();
    assert_eq!(session.cancel(), Some(request.ticket));

    let result = request.send(&client, store.project_id());
    let outcome = session
        .finish_submit(request.ticket, result, &mut store)
        .unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Created {
            attached: false,
            ..
        }
    ));
    assert_eq!(store.len(), 1);
    assert_eq!(session.state(), &CaptureState::Idle);
}

#[test]
fn response_for_another_project_is_discarded() {
    let client = ScriptedClient::default();
    let mut session = CaptureSession::new();
    session.select_tool(ItemKind::Photo360);
    session.click(point(40.0, -3.0), &BundleBuilder::default(), None);
    let request = session
        .begin_submit(CaptureForm::Media {
            file: Some(FileRef::new("a.jpg", vec![1])),
            z: 0.0,
        })
        .unwrap();
    session.cancel();

    // user switched to project 2 while the upload for project 1 was running
    let result = request.send(&client, 1);
    let mut other_store = MapItemStore::new(2);
    let outcome = session
        .finish_submit(request.ticket, result, &mut other_store)
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Discarded { .. }));
    assert!(other_store.is_empty());
}
