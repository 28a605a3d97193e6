//! The WebUntis client: session lifecycle and queries.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::try_join;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheSession, Collection, ResourceCache};
use crate::domain::{
    Lesson, Period, Resource, Room, SchoolClass, Student, Subject, Teacher, TimetableFor,
    TimetableQuery, User,
};
use crate::timetable::{Catalog, normalize_week, referenced_kinds, week_records};
use crate::untis::{UntisError, UntisSource, convert_students};

/// A client for one WebUntis account.
///
/// Reference collections are cached per login session; see
/// [`ResourceCache`]. Lessons and student rosters are fetched fresh on every
/// call.
pub struct UntisClient<S> {
    source: S,
    cache: ResourceCache,
    user: RwLock<Option<User>>,
}

impl<S: UntisSource> UntisClient<S> {
    /// Create a client. Nothing is contacted until [`login`](Self::login).
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: ResourceCache::new(),
            user: RwLock::new(None),
        }
    }

    /// The transport this client talks through.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Log in, ending any previous session first.
    ///
    /// Returns `Ok(false)` if the service rejected the credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<bool, UntisError> {
        self.logout().await;

        match self.source.authenticate(username, password).await {
            Ok(user) => {
                info!(username, person_id = user.person_id, "logged in");
                let mut current = self.user.write().await;
                *current = Some(user);
                self.cache.activate();
                Ok(true)
            }
            Err(e) if e.is_bad_credentials() => {
                warn!(username, error = %e, "login rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// End the session. Cached data is dropped before the service is told,
    /// and a failing remote logout is only logged. Does nothing without a
    /// session.
    pub async fn logout(&self) {
        let user = {
            let mut current = self.user.write().await;
            let Some(user) = current.take() else {
                return;
            };
            self.cache.clear();
            user
        };

        match self.source.logout().await {
            Ok(()) => info!(username = %user.username, "logged out"),
            Err(e) => warn!(username = %user.username, error = %e, "remote logout failed"),
        }
    }

    /// Log out and hand back the source.
    pub async fn close(self) -> S {
        self.logout().await;
        self.source
    }

    /// Whether a session is active.
    pub async fn is_logged_in(&self) -> bool {
        self.user.read().await.is_some()
    }

    /// The user of the active session.
    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    /// School classes with resolved head teachers. Empty without a session.
    pub async fn classes(&self) -> Result<Collection<SchoolClass>, UntisError> {
        self.cache.classes(&self.source).await
    }

    /// Teachers of the school. Empty without a session.
    pub async fn teachers(&self) -> Result<Collection<Teacher>, UntisError> {
        self.cache.teachers(&self.source).await
    }

    /// Subjects taught at the school. Empty without a session.
    pub async fn subjects(&self) -> Result<Collection<Subject>, UntisError> {
        self.cache.subjects(&self.source).await
    }

    /// Rooms of the school. Empty without a session.
    pub async fn rooms(&self) -> Result<Collection<Room>, UntisError> {
        self.cache.rooms(&self.source).await
    }

    /// The period grid. Empty without a session.
    pub async fn periods(&self) -> Result<Collection<Period>, UntisError> {
        self.cache.periods(&self.source).await
    }

    /// Lessons of the week containing `date`, in the order the service
    /// lists them.
    ///
    /// Only the reference collections the week actually refers to are loaded,
    /// concurrently. Records that cannot be read are skipped. Fails with
    /// [`UntisError::SessionChanged`] if the session ends before the week is
    /// resolved.
    pub async fn lessons(
        &self,
        target: TimetableFor,
        date: NaiveDate,
    ) -> Result<Vec<Lesson>, UntisError> {
        let session = self.pin_session("lessons").await?;

        let query = TimetableQuery { target, date };
        debug!(%query, "fetching timetable");

        let payload = self.source.fetch_weekly_timetable(target, date).await?;
        let records = week_records(&payload, &query)?;
        let needed = referenced_kinds(records);

        let (classes, teachers, subjects, rooms, periods) = try_join!(
            load_if(needed.classes, session.classes(&self.source)),
            load_if(needed.teachers, session.teachers(&self.source)),
            load_if(needed.subjects, session.subjects(&self.source)),
            load_if(needed.rooms, session.rooms(&self.source)),
            load_if(needed.periods, session.periods(&self.source)),
        )?;
        ensure_current(&session, "lessons")?;

        let catalog = Catalog {
            classes: &classes,
            teachers: &teachers,
            subjects: &subjects,
            rooms: &rooms,
            periods: &periods,
        };
        let lessons = normalize_week(records, &catalog);
        debug!(%query, records = records.len(), lessons = lessons.len(), "normalized timetable");

        Ok(lessons)
    }

    /// Lessons of `class` in the week containing `date`.
    pub async fn lessons_for_class(
        &self,
        class: &SchoolClass,
        date: NaiveDate,
    ) -> Result<Vec<Lesson>, UntisError> {
        self.lessons(TimetableFor::Class(class.internal_id()), date)
            .await
    }

    /// Lessons of `teacher` in the week containing `date`.
    pub async fn lessons_for_teacher(
        &self,
        teacher: &Teacher,
        date: NaiveDate,
    ) -> Result<Vec<Lesson>, UntisError> {
        self.lessons(TimetableFor::Teacher(teacher.internal_id()), date)
            .await
    }

    /// Students of `class`, or every student the account may see. Not cached.
    pub async fn students(&self, class: Option<&SchoolClass>) -> Result<Vec<Student>, UntisError> {
        let session = self.pin_session("students").await?;

        let rows = self
            .source
            .fetch_students(class.map(|c| c.internal_id()))
            .await?;
        ensure_current(&session, "students")?;
        convert_students(rows)
    }

    /// Pin the cache to the active session, or fail if there is none.
    async fn pin_session(&self, method: &str) -> Result<CacheSession<'_>, UntisError> {
        let current = self.user.read().await;
        if current.is_none() {
            return Err(UntisError::NotLoggedIn {
                method: method.to_string(),
            });
        }
        Ok(self.cache.session())
    }
}

fn ensure_current(session: &CacheSession<'_>, method: &str) -> Result<(), UntisError> {
    if session.is_current() {
        Ok(())
    } else {
        Err(UntisError::SessionChanged {
            method: method.to_string(),
        })
    }
}

/// Run `load` only when the collection is needed.
async fn load_if<T>(
    needed: bool,
    load: impl Future<Output = Result<Collection<T>, UntisError>>,
) -> Result<Collection<T>, UntisError> {
    if needed { load.await } else { Ok(Arc::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LessonState, ResourceType};
    use crate::untis::mock::{MockSource, Operation};
    use futures::future::join_all;
    use serde_json::{Value, json};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 10, 22).unwrap()
    }

    fn week(id: i64, records: Vec<Value>) -> Value {
        json!({"result": {"data": {"elementPeriods": {id.to_string(): records}}}})
    }

    fn source() -> MockSource {
        MockSource::new("user", "secret")
            .with_resources(
                ResourceType::Teacher,
                vec![
                    json!({"id": 5, "name": "AB"}),
                    json!({"id": 6, "name": "CD"}),
                ],
            )
            .with_resources(
                ResourceType::SchoolClass,
                vec![json!({"id": 12, "name": "4BHIF", "classteacher": {"name": "AB"}})],
            )
            .with_resources(ResourceType::Subject, vec![json!({"id": 3, "name": "POS"})])
            .with_resources(ResourceType::Room, vec![json!({"id": 4, "name": "C3.07"})])
            .with_period_grid(vec![
                json!({"period": 1, "startTime": 800, "endTime": 850}),
                json!({"period": 2, "startTime": 850, "endTime": 940}),
            ])
            .with_timetable(
                TimetableFor::Class(12),
                week(
                    12,
                    vec![
                        json!({
                            "date": 20191022, "startTime": 800, "endTime": 850,
                            "is": {"standard": true},
                            "elements": [{"type": 1, "id": 12}, {"type": 2, "id": 5}, {"type": 3, "id": 3}]
                        }),
                        json!({
                            "date": 20191022, "startTime": 850, "endTime": 940,
                            "is": {"substitution": true, "cancelled": true},
                            "elements": [{"type": 2, "id": 6, "orgId": 5}, {"type": 4, "id": 4}]
                        }),
                    ],
                ),
            )
            .with_timetable(
                TimetableFor::Teacher(6),
                week(
                    6,
                    vec![json!({
                        "date": 20191023, "startTime": 800, "endTime": 850,
                        "is": {"event": true},
                        "elements": [{"type": 2, "id": 6}]
                    })],
                ),
            )
            .with_timetable(TimetableFor::Teacher(7), json!({"result": {"data": {}}}))
            .with_students(vec![
                json!({"id": 900, "name": "MUSTERMANN", "forename": "Max", "klasseId": 12}),
                json!({"id": 901, "name": "MUSTERFRAU", "forename": "Erika", "klasseId": 13}),
            ])
    }

    async fn logged_in() -> UntisClient<MockSource> {
        let client = UntisClient::new(source());
        assert!(client.login("user", "secret").await.unwrap());
        client
    }

    fn transport_error(method: &str) -> UntisError {
        UntisError::Transport {
            method: method.into(),
            status: None,
            message: "connection reset".into(),
        }
    }

    #[tokio::test]
    async fn login_and_logout() {
        let client = UntisClient::new(source());
        assert!(!client.is_logged_in().await);

        assert!(client.login("user", "secret").await.unwrap());
        assert!(client.is_logged_in().await);
        assert_eq!(client.current_user().await.unwrap().username, "user");

        client.logout().await;
        assert!(!client.is_logged_in().await);
        assert!(client.current_user().await.is_none());
        assert_eq!(client.source().calls(Operation::Logout), 1);
    }

    #[tokio::test]
    async fn bad_credentials_return_false() {
        let client = UntisClient::new(source());
        assert!(!client.login("user", "wrong").await.unwrap());
        assert!(!client.is_logged_in().await);
    }

    #[tokio::test]
    async fn other_login_failures_propagate() {
        let client = UntisClient::new(source());
        client
            .source()
            .fail_next(Operation::Authenticate, transport_error("authenticate"));

        let err = client.login("user", "secret").await.unwrap_err();
        assert_eq!(err.method(), Some("authenticate"));
        assert!(!client.is_logged_in().await);
    }

    #[tokio::test]
    async fn logout_without_session_is_a_no_op() {
        let client = UntisClient::new(source());
        client.logout().await;
        assert_eq!(client.source().calls(Operation::Logout), 0);
    }

    #[tokio::test]
    async fn login_ends_previous_session() {
        let client = logged_in().await;
        client.teachers().await.unwrap();

        assert!(client.login("user", "secret").await.unwrap());
        assert_eq!(client.source().calls(Operation::Logout), 1);

        client.teachers().await.unwrap();
        assert_eq!(client.source().calls(Operation::Resources(ResourceType::Teacher)), 2);
    }

    #[tokio::test]
    async fn failing_remote_logout_still_clears() {
        let client = logged_in().await;
        assert_eq!(client.rooms().await.unwrap().len(), 1);

        client
            .source()
            .fail_next(Operation::Logout, transport_error("logout"));
        client.logout().await;

        assert!(!client.is_logged_in().await);
        assert!(client.rooms().await.unwrap().is_empty());
        assert_eq!(client.source().calls(Operation::Resources(ResourceType::Room)), 1);
    }

    #[tokio::test]
    async fn collections_are_empty_without_session() {
        let client = UntisClient::new(source());
        assert!(client.classes().await.unwrap().is_empty());
        assert!(client.subjects().await.unwrap().is_empty());
        assert!(client.periods().await.unwrap().is_empty());
        assert_eq!(client.source().calls(Operation::PeriodGrid), 0);
    }

    #[tokio::test]
    async fn lessons_resolve_against_cache() {
        let client = logged_in().await;
        let lessons = client.lessons(TimetableFor::Class(12), date()).await.unwrap();

        assert_eq!(lessons.len(), 2);

        let first = &lessons[0];
        assert_eq!(first.state, LessonState::Standard);
        assert_eq!(first.period.map(|p| p.nr), Some(1));
        assert_eq!(first.class_names(), "4BHIF");
        assert_eq!(first.teacher_names(), "AB");
        assert_eq!(first.subject_names(), "POS");

        let second = &lessons[1];
        assert_eq!(second.state, LessonState::Substitution);
        assert_eq!(second.period.map(|p| p.nr), Some(2));
        let teacher = &second.teachers[0];
        assert_eq!(teacher.current.as_ref().map(|t| t.unique_name()), Some("CD"));
        assert_eq!(teacher.original.as_ref().map(|t| t.unique_name()), Some("AB"));
        assert_eq!(second.room_names(), "C3.07");
    }

    #[tokio::test]
    async fn lessons_load_only_referenced_collections() {
        let client = logged_in().await;
        let teacher = Teacher::new(6, "CD");
        let lessons = client.lessons_for_teacher(&teacher, date()).await.unwrap();

        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].state, LessonState::Event);

        let source = client.source();
        assert_eq!(source.calls(Operation::Resources(ResourceType::Teacher)), 1);
        assert_eq!(source.calls(Operation::PeriodGrid), 1);
        assert_eq!(source.calls(Operation::Resources(ResourceType::SchoolClass)), 0);
        assert_eq!(source.calls(Operation::Resources(ResourceType::Subject)), 0);
        assert_eq!(source.calls(Operation::Resources(ResourceType::Room)), 0);
    }

    #[tokio::test]
    async fn concurrent_lesson_queries_share_fetches() {
        let client = logged_in().await;
        let class = SchoolClass::new(12, "4BHIF");

        let results = join_all((0..4).map(|_| client.lessons_for_class(&class, date()))).await;
        assert!(results.iter().all(|r| r.as_ref().unwrap().len() == 2));

        let source = client.source();
        assert_eq!(source.calls(Operation::Timetable), 4);
        assert_eq!(source.calls(Operation::Resources(ResourceType::Teacher)), 1);
        assert_eq!(source.calls(Operation::Resources(ResourceType::SchoolClass)), 1);
        assert_eq!(source.calls(Operation::PeriodGrid), 1);
    }

    #[tokio::test]
    async fn lessons_fetch_failure_propagates() {
        let client = logged_in().await;
        client
            .source()
            .fail_next(Operation::PeriodGrid, transport_error("timegrid"));

        let err = client
            .lessons(TimetableFor::Class(12), date())
            .await
            .unwrap_err();
        assert_eq!(err.method(), Some("timegrid"));

        assert!(client.lessons(TimetableFor::Class(12), date()).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_week_is_an_error() {
        let client = logged_in().await;
        let err = client
            .lessons(TimetableFor::Teacher(7), date())
            .await
            .unwrap_err();

        assert!(matches!(err, UntisError::InvalidTimetable { .. }));
        assert!(err.to_string().contains("teacher 7"));
    }

    #[tokio::test]
    async fn queries_need_a_session() {
        let client = UntisClient::new(source());

        let err = client
            .lessons(TimetableFor::Class(12), date())
            .await
            .unwrap_err();
        assert_eq!(err, UntisError::NotLoggedIn { method: "lessons".into() });

        let err = client.students(None).await.unwrap_err();
        assert_eq!(err, UntisError::NotLoggedIn { method: "students".into() });
        assert_eq!(client.source().calls(Operation::Timetable), 0);
    }

    #[tokio::test]
    async fn students_by_class() {
        let client = logged_in().await;
        let class = SchoolClass::new(12, "4BHIF");

        let students = client.students(Some(&class)).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].fore_name, "Max");

        assert_eq!(client.students(None).await.unwrap().len(), 2);
        assert_eq!(client.source().calls(Operation::Students), 2);
    }

    #[tokio::test]
    async fn relogin_during_a_lesson_query_fails_the_query() {
        let client = logged_in().await;
        let release = client.source().hold_next(Operation::Timetable);

        let relogin = async {
            assert!(client.login("user", "secret").await.unwrap());
            release.notify_one();
        };
        let (result, ()) = tokio::join!(client.lessons(TimetableFor::Class(12), date()), relogin);

        assert_eq!(
            result.unwrap_err(),
            UntisError::SessionChanged { method: "lessons".into() }
        );
        assert!(client.is_logged_in().await);

        // Nothing was loaded into the new session for the old query
        let source = client.source();
        assert_eq!(source.calls(Operation::Resources(ResourceType::Teacher)), 0);
        assert_eq!(source.calls(Operation::Resources(ResourceType::SchoolClass)), 0);
        assert_eq!(source.calls(Operation::PeriodGrid), 0);

        let lessons = client.lessons(TimetableFor::Class(12), date()).await.unwrap();
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[0].teacher_names(), "AB");
    }

    #[tokio::test]
    async fn logout_during_a_lesson_query_fails_the_query() {
        let client = logged_in().await;
        let release = client.source().hold_next(Operation::Timetable);

        let logout = async {
            client.logout().await;
            release.notify_one();
        };
        let (result, ()) = tokio::join!(client.lessons(TimetableFor::Class(12), date()), logout);

        assert_eq!(
            result.unwrap_err(),
            UntisError::SessionChanged { method: "lessons".into() }
        );
        assert_eq!(client.source().calls(Operation::PeriodGrid), 0);
    }

    #[tokio::test]
    async fn relogin_during_a_student_query_fails_the_query() {
        let client = logged_in().await;
        let release = client.source().hold_next(Operation::Students);

        let relogin = async {
            assert!(client.login("user", "secret").await.unwrap());
            release.notify_one();
        };
        let (result, ()) = tokio::join!(client.students(None), relogin);

        assert_eq!(
            result.unwrap_err(),
            UntisError::SessionChanged { method: "students".into() }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn user_and_cache_change_together() {
        let client = Arc::new(logged_in().await);

        for _ in 0..20 {
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let client = client.clone();
                    tokio::spawn(async move {
                        if i % 2 == 0 {
                            client.login("user", "secret").await.unwrap();
                        } else {
                            client.logout().await;
                        }
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            assert_eq!(client.is_logged_in().await, client.cache.is_active());
        }
    }

    #[tokio::test]
    async fn close_logs_out() {
        let client = logged_in().await;
        let source = client.close().await;
        assert_eq!(source.calls(Operation::Logout), 1);
    }
}
