use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use portal_core::Clock;
use portal_core::model::{
    AdminAccount, AuthToken, Identity, PaymentDraft, PaymentMode, PaymentStatus, QuestionDraft,
    QuestionKind, QuizDraft, QuizId, QuizKind, QuizStatus, QuestionId, StudentId, SubmitTrigger,
};
use serde_json::{Value, json};
use services::api::{ApiClient, ApiConfig};
use services::auth_service::AuthSession;
use services::error::{ApiErrorKind, AuthError, ServiceError};
use services::payment_service::PaymentService;
use services::quiz_service::QuizService;
use services::sessions::{QuizBackend, QuizSessionController, SessionPhase, SubmitOutcome};
use storage::repository::{AuthSessionRepository, InMemoryRepository, PersistedSession};

const STUDENT_TOKEN: &str = "student-token";

#[derive(Default)]
struct Recorded {
    authorizations: Vec<Option<String>>,
    login_bodies: Vec<Value>,
    submissions: Vec<Value>,
    created: Vec<Value>,
    next_submit_reply: Option<(StatusCode, Value)>,
    verify_status: Option<StatusCode>,
}

type Shared = Arc<Mutex<Recorded>>;

fn record_auth(state: &Shared, headers: &HeaderMap) {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state.lock().unwrap().authorizations.push(value);
}

fn student_json() -> Value {
    json!({
        "id_etudiant": 12,
        "nom": "Rabe",
        "prenom": "Hery",
        "email": "hery@example.com",
        "actif": true
    })
}

async fn login_student(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.lock().unwrap().login_bodies.push(body.clone());
    if body["code_auth"] == "ABC123" {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "user": student_json(), "isAdmin": false, "token": STUDENT_TOKEN }
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Code d'authentification invalide" })),
        )
    }
}

async fn verify(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    if let Some(status) = state.lock().unwrap().verify_status {
        return (status, Json(json!({ "success": false, "message": "Token invalide" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": { "user": { "id": 12 }, "isAdmin": false } })),
    )
}

async fn list_quizzes(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
    record_auth(&state, &headers);
    Json(json!({
        "success": true,
        "data": [
            { "id": 3, "titre": "Bases de données", "type": "examen", "total_points": 2,
              "duree": 1, "statut": "actif", "modifiable": false },
            { "id_quiz": 4, "titre": "Brouillon", "duree": 30, "statut": "inactif" }
        ]
    }))
}

async fn quiz_detail(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    if id != 3 {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Quiz not available" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "quiz": { "id": 3, "titre": "Bases de données", "duree": 1, "statut": "actif" },
            "questions": [
                { "id": 31, "question": "SQL est déclaratif", "type_question": "vrai_faux" },
                { "id": 32, "question": "Clé primaire ?", "type_question": "choix_multiple",
                  "options": "[\"unique\", \"nulle\"]", "points": 1 }
            ]
        })),
    )
}

async fn submit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    let mut recorded = state.lock().unwrap();
    recorded.submissions.push(body);
    if let Some((status, body)) = recorded.next_submit_reply.take() {
        return (status, Json(body));
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Quiz soumis avec succès",
            "data": { "score": 1, "max_score": 2, "percentage": 50.0, "correct_answers": 1 }
        })),
    )
}

async fn create_quiz(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().created.push(body);
    Json(json!({ "success": true, "message": "Quiz créé", "quiz_id": 9 }))
}

async fn add_question(
    State(state): State<Shared>,
    Path(_id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().created.push(body);
    Json(json!({ "success": true, "data": { "question_id": 91 } }))
}

async fn record_payment(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().created.push(body);
    Json(json!({ "success": true, "payment_id": 4 }))
}

async fn soft_failure() -> Json<Value> {
    Json(json!({ "success": false, "error": "Paramètre manquant" }))
}

async fn spawn_backend() -> (SocketAddr, Shared) {
    let state = Shared::default();
    let app = Router::new()
        .route("/api/auth/login/student", post(login_student))
        .route("/api/auth/verify", get(verify))
        .route("/api/quizzes", get(list_quizzes).post(create_quiz))
        .route("/api/quizzes/{id}/questions", post(add_question))
        .route("/api/payments", post(record_payment))
        .route("/api/quizzes/{id}", get(quiz_detail))
        .route("/api/quizzes/{id}/submit", post(submit))
        .route("/api/admin/results", get(soft_failure))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn client_for(addr: SocketAddr) -> ApiClient {
    let config = ApiConfig::new(&format!("http://{addr}/api"), Duration::from_secs(5)).unwrap();
    ApiClient::new(&config).unwrap()
}

fn clock() -> Clock {
    Clock::fixed(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
}

async fn logged_in_student(addr: SocketAddr) -> (AuthSession, Arc<InMemoryRepository>) {
    let store = Arc::new(InMemoryRepository::new());
    let repo: Arc<dyn AuthSessionRepository> = store.clone();
    let mut auth = AuthSession::init(client_for(addr), repo, clock()).await.unwrap();
    assert!(!auth.is_authenticated());
    auth.login_student("hery@example.com ", " abc123").await.unwrap();
    (auth, store)
}

#[tokio::test]
async fn student_login_persists_session_and_normalizes_code() {
    let (addr, state) = spawn_backend().await;
    let (auth, store) = logged_in_student(addr).await;

    assert_eq!(state.lock().unwrap().login_bodies[0]["code_auth"], "ABC123");
    assert_eq!(state.lock().unwrap().login_bodies[0]["email"], "hery@example.com");
    assert!(!auth.is_admin());
    assert_eq!(auth.student().unwrap().id, StudentId::new(12));

    let persisted = store.load_session().await.unwrap().unwrap();
    assert_eq!(persisted.token.as_str(), STUDENT_TOKEN);
    assert_eq!(persisted.identity.user_id(), 12);
    assert!(matches!(auth.admin_client(), Err(AuthError::AdminRequired)));
}

#[tokio::test]
async fn wrong_code_is_rejected_with_server_message() {
    let (addr, _state) = spawn_backend().await;
    let repo: Arc<dyn AuthSessionRepository> = Arc::new(InMemoryRepository::new());
    let mut auth = AuthSession::init(client_for(addr), repo, clock()).await.unwrap();

    let err = auth.login_student("hery@example.com", "nope").await.unwrap_err();
    match err {
        AuthError::Rejected(message) => assert_eq!(message, "Code d'authentification invalide"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(!auth.is_authenticated());
    assert!(matches!(auth.client(), Err(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn authenticated_requests_carry_bearer_token() {
    let (addr, state) = spawn_backend().await;
    let (auth, _store) = logged_in_student(addr).await;
    let quizzes = QuizService::new(auth.client().unwrap(), clock());

    let listed = quizzes.list_quizzes().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].status(), QuizStatus::Active);
    assert_eq!(listed[1].id(), QuizId::new(4));
    assert_eq!(listed[1].status(), QuizStatus::Draft);

    let open = quizzes.open_quizzes().await.unwrap();
    assert_eq!(open.len(), 1);

    let recorded = state.lock().unwrap();
    assert!(
        recorded
            .authorizations
            .iter()
            .all(|auth| auth.as_deref() == Some("Bearer student-token"))
    );
}

#[tokio::test]
async fn quiz_session_round_trip_over_http() {
    let (addr, state) = spawn_backend().await;
    let (auth, _store) = logged_in_student(addr).await;
    let backend: Arc<dyn QuizBackend> = Arc::new(QuizService::new(auth.client().unwrap(), clock()));
    let mut controller = QuizSessionController::new(backend);

    let attempt = controller.load_quiz(QuizId::new(3)).await.unwrap();
    assert_eq!(attempt.questions().len(), 2);
    assert_eq!(attempt.questions()[1].options(), ["unique", "nulle"]);
    assert_eq!(attempt.remaining_secs(), 60);

    controller.start().unwrap();
    controller.record_answer(QuestionId::new(32), "unique").unwrap();
    for _ in 0..20 {
        controller.tick().await.unwrap();
    }
    let outcome = controller.submit(SubmitTrigger::Confirmed).await.unwrap();

    let SubmitOutcome::Submitted { receipt, elapsed_secs, .. } = outcome else {
        panic!("expected a graded submission");
    };
    assert_eq!(elapsed_secs, 20);
    assert_eq!(receipt.score, Some(1.0));
    assert_eq!(receipt.message.as_deref(), Some("Quiz soumis avec succès"));

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.submissions[0],
        json!({
            "answers": [{ "question_id": 32, "reponse": "unique" }],
            "temps_utilise": 20
        })
    );
}

#[tokio::test]
async fn duplicate_submission_is_recognized_from_backend_message() {
    let (addr, state) = spawn_backend().await;
    state.lock().unwrap().next_submit_reply = Some((
        StatusCode::BAD_REQUEST,
        json!({ "success": false, "message": "Vous avez déjà soumis ce quiz" }),
    ));
    let (auth, _store) = logged_in_student(addr).await;
    let backend: Arc<dyn QuizBackend> = Arc::new(QuizService::new(auth.client().unwrap(), clock()));
    let mut controller = QuizSessionController::new(backend);
    controller.load_quiz(QuizId::new(3)).await.unwrap();
    controller.start().unwrap();

    let outcome = controller.submit(SubmitTrigger::Confirmed).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::AlreadySubmitted { .. }));
    assert_eq!(controller.phase(), SessionPhase::Submitted);
    assert_eq!(state.lock().unwrap().submissions.len(), 1);
}

#[tokio::test]
async fn accepted_submission_without_envelope_still_counts() {
    for reply in [Value::Null, json!({ "score": 2, "max_score": 2 })] {
        let (addr, state) = spawn_backend().await;
        state.lock().unwrap().next_submit_reply = Some((StatusCode::OK, reply.clone()));
        let (auth, _store) = logged_in_student(addr).await;
        let backend: Arc<dyn QuizBackend> =
            Arc::new(QuizService::new(auth.client().unwrap(), clock()));
        let mut controller = QuizSessionController::new(backend);
        controller.load_quiz(QuizId::new(3)).await.unwrap();
        controller.start().unwrap();

        let outcome = controller.submit(SubmitTrigger::Confirmed).await.unwrap();
        let SubmitOutcome::Submitted { receipt, .. } = outcome else {
            panic!("expected an accepted submission for {reply}");
        };
        assert_eq!(receipt.score, reply.get("score").and_then(Value::as_f64));
        assert_eq!(controller.phase(), SessionPhase::Submitted);
    }
}

#[tokio::test]
async fn forbidden_quiz_is_reported_as_not_found() {
    let (addr, _state) = spawn_backend().await;
    let (auth, _store) = logged_in_student(addr).await;
    let backend: Arc<dyn QuizBackend> = Arc::new(QuizService::new(auth.client().unwrap(), clock()));

    let err = backend.fetch_quiz(QuizId::new(99)).await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Forbidden);
    assert_eq!(err.message(), "Quiz not available");
}

#[tokio::test]
async fn success_false_in_ok_response_is_an_error() {
    let (addr, _state) = spawn_backend().await;
    let (auth, _store) = logged_in_student(addr).await;
    let quizzes = QuizService::new(auth.client().unwrap(), clock());

    let api = match quizzes.all_results().await.unwrap_err() {
        ServiceError::Api(api) => api,
        other => panic!("expected api error, got {other:?}"),
    };
    assert_eq!(api.kind(), ApiErrorKind::Validation);
    assert_eq!(api.message(), "Paramètre manquant");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let quizzes = QuizService::new(
        client_for(addr).with_token(AuthToken::new(STUDENT_TOKEN)),
        clock(),
    );
    let ServiceError::Api(err) = quizzes.list_quizzes().await.unwrap_err() else {
        panic!("expected api error");
    };
    assert_eq!(err.kind(), ApiErrorKind::Network);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn restore_keeps_a_verified_session() {
    let (addr, state) = spawn_backend().await;
    let (_first, store) = logged_in_student(addr).await;
    let repo: Arc<dyn AuthSessionRepository> = store.clone();

    let restored = AuthSession::init(client_for(addr), repo, clock()).await.unwrap();
    assert!(restored.is_authenticated());
    assert_eq!(restored.identity().unwrap().user_id(), 12);
    assert_eq!(
        state.lock().unwrap().authorizations.last().cloned().flatten().as_deref(),
        Some("Bearer student-token")
    );
}

#[tokio::test]
async fn restore_clears_a_rejected_session() {
    let (addr, state) = spawn_backend().await;
    let (_first, store) = logged_in_student(addr).await;
    state.lock().unwrap().verify_status = Some(StatusCode::UNAUTHORIZED);
    let repo: Arc<dyn AuthSessionRepository> = store.clone();

    let restored = AuthSession::init(client_for(addr), repo, clock()).await.unwrap();
    assert!(!restored.is_authenticated());
    assert!(store.load_session().await.unwrap().is_none());
}

#[tokio::test]
async fn restore_clears_a_session_whose_role_changed() {
    let (addr, _state) = spawn_backend().await;
    let store = Arc::new(InMemoryRepository::new());
    store
        .save_session(&PersistedSession {
            token: AuthToken::new(STUDENT_TOKEN),
            identity: Identity::Admin(AdminAccount {
                user_id: 12,
                username: "admin".into(),
                email: "admin@example.com".into(),
            }),
            saved_at: clock().now(),
        })
        .await
        .unwrap();
    let repo: Arc<dyn AuthSessionRepository> = store.clone();

    let restored = AuthSession::init(client_for(addr), repo, clock()).await.unwrap();
    assert!(!restored.is_authenticated());
    assert!(store.load_session().await.unwrap().is_none());
}

fn admin_client(addr: SocketAddr) -> ApiClient {
    client_for(addr).with_token(AuthToken::new("admin-token"))
}

fn question_draft() -> QuestionDraft {
    QuestionDraft {
        text: " Capitale de Madagascar ? ".into(),
        kind: QuestionKind::MultipleChoice,
        correct_answer: "Antananarivo".into(),
        options: vec!["Antananarivo".into(), " ".into(), "Toamasina".into()],
        points: 2,
    }
}

#[tokio::test]
async fn quiz_authoring_uses_backend_wire_format() {
    let (addr, state) = spawn_backend().await;
    let quizzes = QuizService::new(admin_client(addr), clock());
    let draft = QuizDraft {
        title: "Géographie".into(),
        kind: QuizKind::Exam,
        total_points: None,
        starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        duration_minutes: 45,
        status: QuizStatus::Draft,
    };

    let id = quizzes.create_quiz(&draft, &[question_draft()]).await.unwrap();
    assert_eq!(id, QuizId::new(9));

    let recorded = state.lock().unwrap();
    let body = &recorded.created[0];
    assert_eq!(body["titre"], "Géographie");
    assert_eq!(body["type"], "examen");
    assert_eq!(body["statut"], "inactif");
    assert_eq!(body["duree"], 45);
    assert_eq!(body["date_debut"], "2024-05-01T08:00:00");
    assert!(body.get("total_points").is_none());
    assert_eq!(body["questions"][0]["question"], "Capitale de Madagascar ?");
    assert_eq!(body["questions"][0]["type_question"], "choix_multiple");
    assert_eq!(body["questions"][0]["options"], json!(["Antananarivo", "Toamasina"]));
}

#[tokio::test]
async fn locked_quizzes_are_refused_before_any_request() {
    let (addr, state) = spawn_backend().await;
    let quizzes = QuizService::new(admin_client(addr), clock());
    let listed = quizzes.list_quizzes().await.unwrap();
    let (locked, editable) = (&listed[0], &listed[1]);

    let err = quizzes.add_question(locked, &question_draft()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    let draft = QuizDraft {
        title: "Bases".into(),
        kind: QuizKind::Quiz,
        total_points: Some(2),
        starts_at: clock().now(),
        ends_at: clock().now(),
        duration_minutes: 10,
        status: QuizStatus::Active,
    };
    let err = quizzes.update_quiz(locked, &draft, &[]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    assert!(state.lock().unwrap().created.is_empty());

    let question_id = quizzes.add_question(editable, &question_draft()).await.unwrap();
    assert_eq!(question_id, QuestionId::new(91));
}

#[tokio::test]
async fn payments_are_validated_then_recorded() {
    let (addr, state) = spawn_backend().await;
    let payments = PaymentService::new(admin_client(addr));
    let mut draft = PaymentDraft {
        mode: PaymentMode::Mvola,
        mvola_reference: None,
        amount: 150_000.0,
        status: PaymentStatus::Installment,
        remaining_installment: 50_000.0,
    };

    let err = payments.record(StudentId::new(12), &draft).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    assert!(state.lock().unwrap().created.is_empty());

    draft.mvola_reference = Some(" MV-778 ".into());
    let id = payments.record(StudentId::new(12), &draft).await.unwrap();
    assert_eq!(id.value(), 4);
    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.created[0],
        json!({
            "id_etudiant": 12,
            "mode_paiement": "mvola",
            "code_ref_mvola": "MV-778",
            "montant": 150000.0,
            "statut": "par_tranche",
            "tranche_restante": 50000.0
        })
    );
}
