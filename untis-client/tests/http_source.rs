//! Drives the HTTP transport against a mock WebUntis server.

use chrono::NaiveDate;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};

use untis_client::domain::{LessonState, Resource, TimetableFor};
use untis_client::{HttpSource, UntisClient, UntisConfig, UntisError};

const RPC_PATH: &str = "/WebUntis/jsonrpc.do";

fn client(server: &ServerGuard) -> UntisClient<HttpSource> {
    let config = UntisConfig::new("untis.test", "Spengergasse").with_base_url(server.url());
    UntisClient::new(HttpSource::new(config).unwrap())
}

fn mock_rpc(server: &mut ServerGuard, method: &str, response: Value) -> Mock {
    server
        .mock("POST", RPC_PATH)
        .match_query(Matcher::UrlEncoded("school".into(), "Spengergasse".into()))
        .match_body(Matcher::PartialJson(json!({"jsonrpc": "2.0", "method": method})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(response.to_string())
        .create()
}

fn mock_login(server: &mut ServerGuard) -> Mock {
    mock_rpc(
        server,
        "authenticate",
        json!({"jsonrpc": "2.0", "id": 1, "result": {"sessionId": "ABC123", "personType": 2, "personId": 42}}),
    )
}

fn mock_page(server: &mut ServerGuard, page: &str, query: Matcher, body: Value) -> Mock {
    server
        .mock("GET", format!("/WebUntis/api/public/{page}").as_str())
        .match_query(query)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create()
}

fn pageconfig(kind: i64) -> Matcher {
    Matcher::UrlEncoded("type".into(), kind.to_string())
}

#[tokio::test]
async fn login_fetch_and_logout() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server);
    let teachers = mock_page(
        &mut server,
        "timetable/weekly/pageconfig",
        pageconfig(2),
        json!({"data": {"elements": [
            {"type": 2, "id": 5, "name": "AB", "longName": "Alpha", "displayname": "Alpha B."},
            {"type": 2, "id": 6, "name": "CD", "longName": "Delta"}
        ]}}),
    );
    let logout = mock_rpc(&mut server, "logout", json!({"jsonrpc": "2.0", "id": 2, "result": null}));

    let client = client(&server);
    assert!(client.login("user", "secret").await.unwrap());

    let user = client.current_user().await.unwrap();
    assert_eq!(user.session_id, "ABC123");
    assert_eq!(user.person_id, 42);

    let first = client.teachers().await.unwrap();
    let second = client.teachers().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].unique_name(), "AB");
    assert_eq!(first[0].resource.display_name, "Alpha B.");
    assert_eq!(second.len(), 2);

    client.close().await;

    login.assert_async().await;
    teachers.assert_async().await;
    logout.assert_async().await;
}

#[tokio::test]
async fn bad_credentials_are_not_an_error() {
    let mut server = Server::new_async().await;
    let login = mock_rpc(
        &mut server,
        "authenticate",
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -8504, "message": "bad credentials"}}),
    );

    let client = client(&server);
    assert!(!client.login("user", "wrong").await.unwrap());
    assert!(!client.is_logged_in().await);

    login.assert_async().await;
}

#[tokio::test]
async fn other_remote_errors_propagate() {
    let mut server = Server::new_async().await;
    mock_rpc(
        &mut server,
        "authenticate",
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -8500, "message": "invalid schoolname"}}),
    );

    let err = client(&server).login("user", "secret").await.unwrap_err();
    assert_eq!(
        err,
        UntisError::Remote {
            method: "authenticate".into(),
            code: -8500,
            message: "invalid schoolname".into(),
        }
    );
}

#[tokio::test]
async fn rpc_without_result_is_a_protocol_error() {
    let mut server = Server::new_async().await;
    let login = mock_rpc(&mut server, "authenticate", json!({"jsonrpc": "2.0", "id": 1}));

    let client = client(&server);
    let err = client.login("user", "secret").await.unwrap_err();
    assert!(matches!(err, UntisError::Protocol { .. }), "{err:?}");
    assert_eq!(err.method(), Some("authenticate"));
    assert!(!client.is_logged_in().await);

    login.assert_async().await;
}

#[tokio::test]
async fn missing_data_is_a_protocol_error() {
    let mut server = Server::new_async().await;
    mock_login(&mut server);
    mock_page(
        &mut server,
        "timetable/weekly/pageconfig",
        pageconfig(4),
        json!({"elements": []}),
    );

    let client = client(&server);
    assert!(client.login("user", "secret").await.unwrap());

    let err = client.rooms().await.unwrap_err();
    assert!(matches!(err, UntisError::Protocol { .. }), "{err:?}");
    assert_eq!(err.method(), Some("timetable/weekly/pageconfig?type=4"));
}

#[tokio::test]
async fn http_failure_is_a_transport_error_and_retried() {
    let mut server = Server::new_async().await;
    mock_login(&mut server);
    let failing = server
        .mock("GET", "/WebUntis/api/public/timegrid")
        .match_query(Matcher::UrlEncoded("schoolyearId".into(), "2".into()))
        .with_status(503)
        .expect(1)
        .create();

    let client = client(&server);
    assert!(client.login("user", "secret").await.unwrap());

    let err = client.periods().await.unwrap_err();
    assert!(matches!(err, UntisError::Transport { status: Some(503), .. }), "{err:?}");
    failing.assert_async().await;
    failing.remove_async().await;

    mock_page(
        &mut server,
        "timegrid",
        Matcher::UrlEncoded("schoolyearId".into(), "2".into()),
        json!({"data": {"rows": [{"period": 1, "startTime": 800, "endTime": 850}]}}),
    );
    assert_eq!(client.periods().await.unwrap().len(), 1);
}

#[tokio::test]
async fn weekly_lessons_for_a_teacher() {
    let mut server = Server::new_async().await;
    mock_login(&mut server);
    mock_page(
        &mut server,
        "timetable/weekly/pageconfig",
        pageconfig(2),
        json!({"data": {"elements": [
            {"id": 5, "name": "AB"},
            {"id": 6, "name": "CD"}
        ]}}),
    );
    mock_page(
        &mut server,
        "timegrid",
        Matcher::Any,
        json!({"data": {"rows": [
            {"period": 1, "startTime": 800, "endTime": 850},
            {"period": 2, "startTime": 850, "endTime": 940}
        ]}}),
    );
    let week = mock_page(
        &mut server,
        "timetable/weekly/data",
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("elementType".into(), "2".into()),
            Matcher::UrlEncoded("elementId".into(), "5".into()),
            Matcher::UrlEncoded("date".into(), "2019-10-22".into()),
        ]),
        json!({"data": {"result": {"data": {"elementPeriods": {"5": [
            {
                "date": 20191022, "startTime": 850, "endTime": 940,
                "lessonText": "Exkursion",
                "is": {"event": true, "standard": true},
                "elements": [{"type": 2, "id": 5}]
            },
            {
                "date": 20191022, "startTime": 900, "endTime": 950,
                "is": {"substitution": true},
                "elements": [{"type": 2, "id": 6, "orgId": 5}]
            },
            {"startTime": 800, "endTime": 850, "is": {}, "elements": []}
        ]}}}}}),
    );

    let client = client(&server);
    assert!(client.login("user", "secret").await.unwrap());

    let date = NaiveDate::from_ymd_opt(2019, 10, 22).unwrap();
    let lessons = client.lessons(TimetableFor::Teacher(5), date).await.unwrap();
    week.assert_async().await;

    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].state, LessonState::Event);
    assert_eq!(lessons[0].period.map(|p| p.nr), Some(2));
    assert_eq!(lessons[0].lesson_text, "Exkursion");
    assert_eq!(lessons[1].state, LessonState::Substitution);
    assert!(lessons[1].period.is_none());
    assert!(lessons[1].teachers[0].is_changed());
    assert_eq!(lessons[1].teacher_names(), "CD");
}
