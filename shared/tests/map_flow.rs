use crux_core::testing::AppTester;
use crux_core::App as _;
use shared::api::Resource;
use shared::capabilities::HttpResponse;
use shared::event::{Coordinate, Zoom};
use shared::map::{DetailState, MAX_ZOOM};
use shared::{App, Effect, ErrorKind, Event, Model};

const BOUNDARIES: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"name": "Poznan"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[16.8, 52.3], [17.1, 52.3], [17.1, 52.5], [16.8, 52.5], [16.8, 52.3]]]
            }
        },
        {
            "type": "Feature",
            "properties": {"name": "Swarzędz"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[17.0, 52.4], [17.2, 52.4], [17.2, 52.5], [17.0, 52.5], [17.0, 52.4]]]
            }
        }
    ]
}"#;

fn ok(body: &str) -> Box<shared::capabilities::HttpResult> {
    Box::new(Ok(HttpResponse::new(200, body.as_bytes().to_vec(), "test")))
}

fn urls(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request.operation.url.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_start_fetches_session_and_points() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::AppStarted, &mut model);

    assert_eq!(
        urls(&update.effects),
        [
            "http://localhost:8080/auth/me",
            "http://localhost:8080/map/artPieces"
        ]
    );
    assert!(model.map.is_loading_points());
}

#[test]
fn test_markers_without_coordinates_are_hidden() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(Event::MapOpened, &mut model);
    let ticket = model.requests.current(Resource::MapPoints).unwrap();

    app.update(
        Event::MapPointsFetched {
            ticket,
            result: ok(r#"[
                {"id": 1, "title": "Neon Fox", "lat": 52.40, "lng": 16.93},
                {"id": 2, "title": "Lost", "lat": null, "lng": 16.90},
                {"id": 3, "title": "Also lost"}
            ]"#),
        },
        &mut model,
    );

    let view = App.view(&model);
    assert!(!view.map.is_loading);
    assert_eq!(view.map.markers.len(), 1);
    assert_eq!(view.map.markers[0].id, "1");
}

#[test]
fn test_boundary_locks_camera() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::BoundaryDataLoaded {
            geojson: BOUNDARIES.into(),
        },
        &mut model,
    );
    let lock = model.map.lock().expect("boundary should lock the camera");
    assert!(lock.contains(52.4, 16.95));
    assert!(model.map.boundary().unwrap().features.len() == 1);

    app.update(
        Event::CameraMoved {
            center: Coordinate::new(0.0, 0.0).unwrap(),
            zoom: Zoom::new(22.0).unwrap(),
        },
        &mut model,
    );
    let camera = model.map.camera();
    assert!(lock.contains(camera.lat, camera.lng));
    assert!((camera.zoom - MAX_ZOOM).abs() < f64::EPSILON);
}

#[test]
fn test_invalid_boundary_is_reported() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::BoundaryDataLoaded {
            geojson: "not json".into(),
        },
        &mut model,
    );

    assert!(model.map.lock().is_none());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Deserialization);
}

#[test]
fn test_marker_click_loads_detail() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::MarkerClicked { id: "7".into() }, &mut model);
    assert_eq!(urls(&update.effects), ["http://localhost:8080/map/artPieces/7"]);
    assert_eq!(model.map.detail(), &DetailState::Loading { id: "7".into() });

    let ticket = model.requests.current(Resource::MapDetail).unwrap();
    app.update(
        Event::DetailFetched {
            ticket,
            result: ok(r#"{"id": 7, "title": "Neon Fox", "address": "Półwiejska 1", "lat": 52.4, "lng": 16.93}"#),
        },
        &mut model,
    );

    match model.map.detail() {
        DetailState::Open(details) => assert_eq!(details.title, "Neon Fox"),
        other => panic!("expected open detail, got {other:?}"),
    }
}

#[test]
fn test_detail_response_after_close_is_dropped() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(Event::MarkerClicked { id: "7".into() }, &mut model);
    let ticket = model.requests.current(Resource::MapDetail).unwrap();

    app.update(Event::DetailClosed, &mut model);
    app.update(
        Event::DetailFetched {
            ticket,
            result: ok(r#"{"id": 7, "title": "Neon Fox"}"#),
        },
        &mut model,
    );

    assert_eq!(model.map.detail(), &DetailState::Closed);
}

#[test]
fn test_second_click_supersedes_first() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(Event::MarkerClicked { id: "7".into() }, &mut model);
    let first = model.requests.current(Resource::MapDetail).unwrap();
    app.update(Event::MarkerClicked { id: "8".into() }, &mut model);

    app.update(
        Event::DetailFetched {
            ticket: first,
            result: ok(r#"{"id": 7, "title": "Old"}"#),
        },
        &mut model,
    );

    assert_eq!(model.map.detail(), &DetailState::Loading { id: "8".into() });
}

#[test]
fn test_marker_without_id_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::MarkerClicked { id: " ".into() }, &mut model);

    assert!(urls(&update.effects).is_empty());
    assert_eq!(model.map.detail(), &DetailState::Closed);
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Validation);
}
