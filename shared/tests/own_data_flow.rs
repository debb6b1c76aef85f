use crux_core::testing::AppTester;
use crux_core::App as _;
use shared::admin::UserForm;
use shared::api::{CurrentUser, Resource};
use shared::auth::profile_seed;
use shared::capabilities::HttpResponse;
use shared::submission::NewArtPieceForm;
use shared::{App, Effect, ErrorKind, Event, Model, Screen};

fn ann() -> CurrentUser {
    CurrentUser {
        email: "ann@x.pl".into(),
        first_name: "Ann".into(),
        last_name: "Nowak".into(),
        home_district: Some("Wilda".into()),
        roles: vec!["USER".into()],
    }
}

fn signed_in() -> Model {
    let mut model = Model::default();
    model.auth.set_user(Some(ann()));
    model
}

fn respond(status: u16, body: &str) -> Box<shared::capabilities::HttpResult> {
    Box::new(Ok(HttpResponse::new(status, body.as_bytes().to_vec(), "test")))
}

fn ok(body: &str) -> Box<shared::capabilities::HttpResult> {
    respond(200, body)
}

/// (method, url, body) of every HTTP request in `effects`.
fn http_requests(effects: &[Effect]) -> Vec<(String, String, Vec<u8>)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some((
                request.operation.method.clone(),
                request.operation.url.clone(),
                request.operation.body.clone(),
            )),
            _ => None,
        })
        .collect()
}

fn neon_fox() -> NewArtPieceForm {
    NewArtPieceForm {
        title: "Neon Fox".into(),
        address: "Półwiejska 1".into(),
        description: " fox on a wall ".into(),
        lat: 52.4,
        lng: 16.93,
        ..NewArtPieceForm::default()
    }
}

fn home_district_form(district: &str) -> Box<UserForm> {
    let mut form = profile_seed(&ann());
    form.home_district = district.into();
    form.roles = vec!["ADMIN".into()];
    form.enabled = Some(false);
    Box::new(form)
}

#[test]
fn test_my_art_pieces_loads_list() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();

    let update = app.update(Event::MyArtPiecesRequested, &mut model);
    assert_eq!(model.screen, Screen::MyArtPieces);
    let requests = http_requests(&update.effects);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "GET");
    assert_eq!(requests[0].1, "http://localhost:8080/my/artPieces");
    assert!(model.own_art_pieces.is_loading());

    let ticket = model.requests.current(Resource::MyArtPieces).unwrap();
    app.update(
        Event::MyArtPiecesFetched {
            ticket,
            result: ok(r#"[
                {"id": 3, "title": "Neon Fox", "address": "Półwiejska 1"},
                {"id": "4", "title": "Blue Owl"}
            ]"#),
        },
        &mut model,
    );

    assert!(!model.own_art_pieces.is_loading());
    let titles: Vec<&str> = model
        .own_art_pieces
        .rows()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(titles, ["Neon Fox", "Blue Owl"]);
}

#[test]
fn test_my_art_pieces_without_session_redirects_to_login() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::MyArtPiecesRequested, &mut model);

    assert!(http_requests(&update.effects).is_empty());
    assert_eq!(model.screen, Screen::Login);
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Authentication);
}

#[test]
fn test_failed_list_stops_loading() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();
    app.update(Event::MyArtPiecesRequested, &mut model);
    let ticket = model.requests.current(Resource::MyArtPieces).unwrap();

    app.update(
        Event::MyArtPiecesFetched {
            ticket,
            result: respond(500, ""),
        },
        &mut model,
    );

    assert!(!model.own_art_pieces.is_loading());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Internal);
}

#[test]
fn test_new_art_piece_is_posted_and_listed() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();

    let update = app.update(Event::ArtPieceSubmitted(Box::new(neon_fox())), &mut model);
    let requests = http_requests(&update.effects);
    assert_eq!(requests.len(), 1);
    let (method, url, body) = &requests[0];
    assert_eq!(method, "POST");
    assert_eq!(url, "http://localhost:8080/addNew/addArtPiece");
    let body: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "title": "Neon Fox",
            "address": "Półwiejska 1",
            "artPieceUserDescription": "fox on a wall",
            "containsText": false,
            "lat": 52.4,
            "lng": 16.93
        })
    );
    assert!(model.own_art_pieces.is_submitting());

    app.update(
        Event::ArtPieceCreated(ok(r#"{"id": 12, "title": "Neon Fox", "address": "Półwiejska 1"}"#)),
        &mut model,
    );

    assert!(!model.own_art_pieces.is_submitting());
    assert_eq!(model.own_art_pieces.rows()[0].id, "12");
    assert_eq!(App.view(&model).toast.unwrap().message, "Art piece added.");
}

#[test]
fn test_second_art_piece_waits_for_first() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();
    app.update(Event::ArtPieceSubmitted(Box::new(neon_fox())), &mut model);

    let update = app.update(Event::ArtPieceSubmitted(Box::new(neon_fox())), &mut model);

    assert!(http_requests(&update.effects).is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::InvalidState);
}

#[test]
fn test_art_piece_without_title_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();
    let form = NewArtPieceForm {
        title: "  ".into(),
        ..neon_fox()
    };

    let update = app.update(Event::ArtPieceSubmitted(Box::new(form)), &mut model);

    assert!(http_requests(&update.effects).is_empty());
    assert!(!model.own_art_pieces.is_submitting());
    let error = model.active_error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(error.user_facing_message(), "title is required");
}

#[test]
fn test_art_piece_requires_session() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ArtPieceSubmitted(Box::new(neon_fox())), &mut model);

    assert!(http_requests(&update.effects).is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Authentication);
}

#[test]
fn test_own_profile_update_never_sends_roles() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();

    let update = app.update(Event::OwnProfileSubmitted(home_district_form("Jeżyce")), &mut model);
    let requests = http_requests(&update.effects);
    assert_eq!(requests.len(), 1);
    let (method, url, body) = &requests[0];
    assert_eq!(method, "PUT");
    assert_eq!(url, "http://localhost:8080/updateAppUser/me");
    let body: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(body, serde_json::json!({"homeDistrict": "Jeżyce"}));
    assert!(App.view(&model).session.is_profile_saving);

    app.update(Event::OwnProfileResponded(ok("")), &mut model);

    let view = App.view(&model);
    assert!(!view.session.is_profile_saving);
    assert_eq!(view.toast.unwrap().message, "Profile updated.");
    let user = model.auth.current_user().unwrap();
    assert_eq!(user.home_district.as_deref(), Some("Jeżyce"));
    assert_eq!(user.roles, ["USER"]);
}

#[test]
fn test_own_profile_submit_while_saving_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();
    app.update(Event::OwnProfileSubmitted(home_district_form("Jeżyce")), &mut model);

    let update = app.update(Event::OwnProfileSubmitted(home_district_form("Łazarz")), &mut model);

    assert!(http_requests(&update.effects).is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::InvalidState);

    // The first change is still the one that lands.
    app.update(Event::OwnProfileResponded(ok("")), &mut model);
    assert_eq!(
        model.auth.current_user().unwrap().home_district.as_deref(),
        Some("Jeżyce")
    );
}

#[test]
fn test_failed_own_profile_update_keeps_user() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();
    app.update(Event::OwnProfileSubmitted(home_district_form("Jeżyce")), &mut model);

    app.update(
        Event::OwnProfileResponded(respond(409, r#"{"message": "email taken"}"#)),
        &mut model,
    );

    assert!(!model.auth.is_profile_saving());
    assert_eq!(model.auth.current_user(), Some(&ann()));
    let error = model.active_error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Conflict);
    assert_eq!(error.message, "email taken");
}

#[test]
fn test_unchanged_own_profile_sends_nothing() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in();

    let update = app.update(
        Event::OwnProfileSubmitted(Box::new(profile_seed(&ann()))),
        &mut model,
    );

    assert!(http_requests(&update.effects).is_empty());
    assert!(!model.auth.is_profile_saving());
    assert_eq!(App.view(&model).toast.unwrap().message, "No changes to save.");
}
