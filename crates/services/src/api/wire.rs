//! Raw backend payloads and their normalization into domain types.
//!
//! The backend is loosely typed: ids arrive under several keys, most fields may be
//! absent, and dates come in more than one format. Everything is decoded into
//! `Option`-heavy structs here and converted once.

use portal_core::model::{
    AdminAccount, Document, DocumentId, DocumentKind, Notification, NotificationId,
    NotificationTarget, Payment, PaymentId, PaymentMode, PaymentStatus, Question, QuestionDraft,
    QuestionId, QuestionKind, Quiz, QuizDraft, QuizId, QuizKind, QuizResult, QuizStatus,
    ResultId, Student, StudentId, SubmissionReceipt,
};
use portal_core::time::{format_timestamp, parse_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

const DEFAULT_DURATION_MINUTES: u32 = 60;
const DEFAULT_QUESTION_POINTS: u32 = 1;

fn decode(what: &str) -> ApiError {
    ApiError::Decode(format!("{what} without id"))
}

fn timestamp(raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.and_then(parse_timestamp)
}

//
// ─── ENVELOPE ──────────────────────────────────────────────────────────────────
//

/// `{ success, data, message }` wrapper used by most endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, ApiError> {
        self.data
            .ok_or_else(|| ApiError::Decode("response has no data".into()))
    }
}

//
// ─── QUIZZES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawQuiz {
    pub id: Option<u64>,
    pub id_quiz: Option<u64>,
    pub titre: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub total_points: Option<u32>,
    pub date_debut: Option<String>,
    pub date_fin: Option<String>,
    pub duree: Option<u32>,
    pub statut: Option<String>,
    pub modifiable: Option<bool>,
}

impl RawQuiz {
    pub fn normalize(self) -> Result<Quiz, ApiError> {
        let id = self.id.or(self.id_quiz).ok_or_else(|| decode("quiz"))?;
        Quiz::from_persisted(
            QuizId::new(id),
            self.titre.unwrap_or_default(),
            self.kind.as_deref().and_then(QuizKind::parse).unwrap_or_default(),
            self.total_points.unwrap_or(0),
            timestamp(self.date_debut.as_deref()),
            timestamp(self.date_fin.as_deref()),
            self.duree.unwrap_or(DEFAULT_DURATION_MINUTES),
            self.statut.as_deref().and_then(QuizStatus::parse).unwrap_or_default(),
            self.modifiable.unwrap_or(true),
        )
        .map_err(|err| ApiError::Decode(format!("quiz {id}: {err}")))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawQuestion {
    pub id: Option<u64>,
    pub id_question: Option<u64>,
    pub question: Option<String>,
    pub type_question: Option<String>,
    pub options: Option<Value>,
    pub points: Option<u32>,
    pub reponse_correcte: Option<Value>,
}

impl RawQuestion {
    pub fn normalize(self, quiz_id: QuizId) -> Result<Question, ApiError> {
        let id = self.id.or(self.id_question).ok_or_else(|| decode("question"))?;
        Ok(Question::from_persisted(
            QuestionId::new(id),
            quiz_id,
            self.question.unwrap_or_default(),
            self.type_question
                .as_deref()
                .and_then(QuestionKind::parse)
                .unwrap_or_default(),
            self.reponse_correcte.as_ref().and_then(scalar_text),
            self.options.as_ref().map(option_list).unwrap_or_default(),
            self.points.unwrap_or(DEFAULT_QUESTION_POINTS),
        ))
    }
}

/// Options arrive as a JSON array, a JSON-encoded string, or `null`.
fn option_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(encoded) => serde_json::from_str::<Vec<Value>>(encoded)
            .map(|items| items.iter().filter_map(scalar_text).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `GET /quizzes/{id}`; tolerated with or without a `data` wrapper.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawQuizDetail {
    pub quiz: Option<RawQuiz>,
    pub questions: Option<Vec<RawQuestion>>,
    pub data: Option<Box<RawQuizDetail>>,
}

impl RawQuizDetail {
    pub fn normalize(self) -> Result<(Quiz, Vec<Question>), ApiError> {
        let Some(raw_quiz) = self.quiz else {
            return match self.data {
                Some(inner) => inner.normalize(),
                None => Err(ApiError::Decode("response has no quiz".into())),
            };
        };
        let quiz = raw_quiz.normalize()?;
        let questions = self
            .questions
            .unwrap_or_default()
            .into_iter()
            .map(|q| q.normalize(quiz.id()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((quiz, questions))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitBody {
    pub answers: Vec<AnswerBody>,
    pub temps_utilise: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerBody {
    pub question_id: u64,
    pub reponse: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSubmission {
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub percentage: Option<f64>,
    pub total_questions: Option<u32>,
    pub correct_answers: Option<u32>,
    pub time_used: Option<u32>,
}

impl RawSubmission {
    /// Reads `data`, or the bare body when the reply is not wrapped.
    /// An empty 2xx body, or JSON without receipt fields, still counts as accepted.
    pub fn receipt_from(body: &Value) -> SubmissionReceipt {
        let message = super::client::server_message(body);
        let payload = match body.get("data") {
            Some(data) if data.is_object() => data,
            _ => body,
        };
        let raw = if payload.is_object() {
            Self::deserialize(payload).unwrap_or_default()
        } else {
            Self::default()
        };
        raw.into_receipt(message)
    }

    pub fn into_receipt(self, message: Option<String>) -> SubmissionReceipt {
        SubmissionReceipt {
            message,
            score: self.score,
            max_score: self.max_score,
            percentage: self.percentage,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            time_used_secs: self.time_used,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizBody {
    pub titre: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
    pub date_debut: String,
    pub date_fin: String,
    pub duree: u32,
    pub statut: &'static str,
    pub questions: Vec<QuestionBody>,
}

impl QuizBody {
    pub fn new(draft: &QuizDraft, questions: &[QuestionDraft]) -> Self {
        Self {
            titre: draft.title.trim().to_owned(),
            kind: draft.kind.as_str(),
            total_points: draft.total_points,
            date_debut: format_timestamp(draft.starts_at),
            date_fin: format_timestamp(draft.ends_at),
            duree: draft.duration_minutes,
            statut: draft.status.as_str(),
            questions: questions.iter().map(QuestionBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionBody {
    pub question: String,
    pub type_question: &'static str,
    pub reponse_correcte: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub points: u32,
}

impl From<&QuestionDraft> for QuestionBody {
    fn from(draft: &QuestionDraft) -> Self {
        Self {
            question: draft.text.trim().to_owned(),
            type_question: draft.kind.as_str(),
            reponse_correcte: draft.correct_answer.trim().to_owned(),
            options: draft
                .options
                .iter()
                .map(|opt| opt.trim())
                .filter(|opt| !opt.is_empty())
                .map(str::to_owned)
                .collect(),
            points: draft.points,
        }
    }
}

/// `{ quiz_id }` / `{ question_id }` returned by creation endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCreated {
    pub quiz_id: Option<u64>,
    pub question_id: Option<u64>,
    pub payment_id: Option<u64>,
    pub data: Option<Value>,
}

impl RawCreated {
    /// First id found under `key` at the top level or inside `data`.
    pub fn id(&self, key: &str) -> Option<u64> {
        let top = match key {
            "quiz_id" => self.quiz_id,
            "question_id" => self.question_id,
            "payment_id" => self.payment_id,
            _ => None,
        };
        top.or_else(|| {
            self.data
                .as_ref()
                .and_then(|data| data.get(key))
                .and_then(Value::as_u64)
        })
    }
}

//
// ─── PEOPLE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawStudent {
    pub id_etudiant: Option<u64>,
    pub id: Option<u64>,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub code_auth: Option<String>,
    pub actif: Option<bool>,
    pub date_inscription: Option<String>,
}

impl RawStudent {
    pub fn normalize(self) -> Result<Student, ApiError> {
        let id = self.id_etudiant.or(self.id).ok_or_else(|| decode("student"))?;
        let last_name = self
            .nom
            .filter(|n| !n.trim().is_empty())
            .or(self.username)
            .unwrap_or_default();
        Ok(Student {
            id: StudentId::new(id),
            last_name,
            first_name: self.prenom.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.telephone.filter(|p| !p.trim().is_empty()),
            auth_code: self.code_auth.filter(|c| !c.trim().is_empty()),
            active: self.actif.unwrap_or(false),
            enrolled_at: timestamp(self.date_inscription.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawAdmin {
    pub id: Option<u64>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl RawAdmin {
    pub fn normalize(self) -> Result<AdminAccount, ApiError> {
        Ok(AdminAccount {
            user_id: self.id.ok_or_else(|| decode("admin"))?,
            username: self.username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
        })
    }
}

/// `data` of both login endpoints. `user` is decoded later, once the role is known.
#[derive(Debug, Deserialize)]
pub(crate) struct RawLogin {
    pub user: Option<Value>,
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<bool>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVerify {
    pub user: Option<RawVerifyUser>,
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVerifyUser {
    pub id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentLoginBody<'a> {
    pub email: &'a str,
    pub code_auth: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminLoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentBody<'a> {
    pub nom: &'a str,
    pub prenom: &'a str,
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegistrationBody<'a> {
    #[serde(flatten)]
    pub student: StudentBody<'a>,
    pub mode_paiement: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_ref_mvola: Option<&'a str>,
    pub montant: f64,
    pub statut: &'static str,
    pub tranche_restante: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRegistration {
    pub auth_code: Option<String>,
    pub code_auth: Option<String>,
    pub student_id: Option<u64>,
}

//
// ─── PAYMENTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPayment {
    pub id_paiement: Option<u64>,
    pub id: Option<u64>,
    pub id_etudiant: Option<u64>,
    pub user_id: Option<u64>,
    pub mode_paiement: Option<String>,
    pub code_ref_mvola: Option<String>,
    pub montant: Option<f64>,
    pub statut: Option<String>,
    pub tranche_restante: Option<f64>,
    pub date_paiement: Option<String>,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl RawPayment {
    pub fn normalize(self) -> Result<Payment, ApiError> {
        let id = self.id_paiement.or(self.id).ok_or_else(|| decode("payment"))?;
        let student_id = self
            .id_etudiant
            .or(self.user_id)
            .ok_or_else(|| ApiError::Decode(format!("payment {id} without student")))?;
        let student_name = match (self.prenom, self.nom) {
            (Some(first), Some(last)) => Some(format!("{first} {last}").trim().to_owned()),
            (first, last) => first.or(last).or(self.username),
        };
        Ok(Payment {
            id: PaymentId::new(id),
            student_id: StudentId::new(student_id),
            mode: self
                .mode_paiement
                .as_deref()
                .and_then(PaymentMode::parse)
                .unwrap_or(PaymentMode::Cash),
            mvola_reference: self.code_ref_mvola.filter(|r| !r.trim().is_empty()),
            amount: self.montant.unwrap_or(0.0),
            status: self
                .statut
                .as_deref()
                .and_then(PaymentStatus::parse)
                .unwrap_or_default(),
            remaining_installment: self.tranche_restante.unwrap_or(0.0),
            paid_at: timestamp(self.date_paiement.as_deref()),
            student_name,
            student_email: self.email,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaymentBody<'a> {
    pub id_etudiant: u64,
    pub mode_paiement: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_ref_mvola: Option<&'a str>,
    pub montant: f64,
    pub statut: &'static str,
    pub tranche_restante: f64,
}

/// `data` of validate / partial: a fresh auth code for the student.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawActivation {
    pub code_auth: Option<String>,
    pub user_email: Option<String>,
}

//
// ─── DOCUMENTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDocument {
    pub id_document: Option<u64>,
    pub id: Option<u64>,
    pub titre: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub chemin: Option<String>,
    pub telechargeable: Option<bool>,
    pub date_upload: Option<String>,
}

impl RawDocument {
    pub fn normalize(self) -> Result<Document, ApiError> {
        let id = self.id_document.or(self.id).ok_or_else(|| decode("document"))?;
        Ok(Document {
            id: DocumentId::new(id),
            title: self.titre.unwrap_or_default(),
            kind: self.kind.as_deref().and_then(DocumentKind::parse).unwrap_or_default(),
            path: self.chemin.unwrap_or_default(),
            downloadable: self.telechargeable.unwrap_or(false),
            uploaded_at: timestamp(self.date_upload.as_deref()),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentPatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titre: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telechargeable: Option<bool>,
}

//
// ─── NOTIFICATIONS ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawNotification {
    pub id_notification: Option<u64>,
    pub id: Option<u64>,
    pub titre: Option<String>,
    pub message: Option<String>,
    pub type_cible: Option<String>,
    pub id_etudiant: Option<u64>,
    pub date_envoi: Option<String>,
    pub lu: Option<bool>,
}

impl RawNotification {
    pub fn normalize(self) -> Result<Notification, ApiError> {
        let id = self
            .id_notification
            .or(self.id)
            .ok_or_else(|| decode("notification"))?;
        let target = match (self.type_cible.as_deref(), self.id_etudiant) {
            (Some("individuel"), Some(student)) => NotificationTarget::Student(StudentId::new(student)),
            _ => NotificationTarget::All,
        };
        Ok(Notification {
            id: NotificationId::new(id),
            title: self.titre.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            target,
            sent_at: timestamp(self.date_envoi.as_deref()),
            read: self.lu.unwrap_or(false),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationBody<'a> {
    pub titre: &'a str,
    pub message: &'a str,
    pub type_cible: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_etudiant: Option<u64>,
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawResult {
    pub id_resultat: Option<u64>,
    pub id: Option<u64>,
    pub id_quiz: Option<u64>,
    pub quiz_id: Option<u64>,
    pub id_etudiant: Option<u64>,
    pub score: Option<f64>,
    pub total_points: Option<f64>,
    pub max_score: Option<f64>,
    pub temps_utilise: Option<u32>,
    pub date_passage: Option<String>,
}

impl RawResult {
    pub fn normalize(self) -> Result<QuizResult, ApiError> {
        let id = self.id_resultat.or(self.id).ok_or_else(|| decode("result"))?;
        let quiz_id = self
            .id_quiz
            .or(self.quiz_id)
            .ok_or_else(|| ApiError::Decode(format!("result {id} without quiz")))?;
        Ok(QuizResult {
            id: ResultId::new(id),
            quiz_id: QuizId::new(quiz_id),
            student_id: self.id_etudiant.map(StudentId::new),
            score: self.score.unwrap_or(0.0),
            max_score: self.max_score.or(self.total_points),
            time_used_secs: self.temps_utilise.unwrap_or(0),
            taken_at: timestamp(self.date_passage.as_deref()),
        })
    }
}

/// Normalize every element, failing on the first malformed one.
pub(crate) fn normalize_all<R, T>(
    raw: Vec<R>,
    normalize: impl Fn(R) -> Result<T, ApiError>,
) -> Result<Vec<T>, ApiError> {
    raw.into_iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quiz_detail_applies_defaults() {
        let raw: RawQuizDetail = serde_json::from_value(json!({
            "quiz": {"id_quiz": 3, "titre": "Bio", "statut": "inactif"},
            "questions": [
                {"id": 10, "question": "Cell?", "options": null},
                {"id": 11, "question": "Short", "type_question": "reponse_courte", "points": 4}
            ]
        }))
        .unwrap();
        let (quiz, questions) = raw.normalize().unwrap();
        assert_eq!(quiz.id(), QuizId::new(3));
        assert_eq!(quiz.duration_minutes(), 60);
        assert_eq!(quiz.kind(), QuizKind::Quiz);
        assert_eq!(quiz.status(), QuizStatus::Draft);
        assert!(quiz.is_editable());
        assert_eq!(questions[0].kind(), QuestionKind::MultipleChoice);
        assert_eq!(questions[0].points(), 1);
        assert!(questions[0].options().is_empty());
        assert_eq!(questions[1].kind(), QuestionKind::FreeText);
        assert_eq!(questions[1].quiz_id(), QuizId::new(3));
    }

    #[test]
    fn quiz_detail_accepts_data_wrapper() {
        let raw: RawQuizDetail = serde_json::from_value(json!({
            "success": true,
            "data": {"quiz": {"id": 1, "duree": 5}, "questions": []}
        }))
        .unwrap();
        let (quiz, questions) = raw.normalize().unwrap();
        assert_eq!(quiz.duration_secs(), 300);
        assert!(questions.is_empty());
    }

    #[test]
    fn quiz_without_id_is_a_decode_error() {
        let raw: RawQuizDetail =
            serde_json::from_value(json!({"quiz": {"titre": "x"}, "questions": []})).unwrap();
        assert!(matches!(raw.normalize(), Err(ApiError::Decode(_))));
    }

    #[test]
    fn options_accept_encoded_strings_and_numbers() {
        assert_eq!(option_list(&json!(["a", 2, true])), vec!["a", "2", "true"]);
        assert_eq!(option_list(&json!("[\"x\",\"y\"]")), vec!["x", "y"]);
        assert!(option_list(&json!("garbage")).is_empty());
    }

    #[test]
    fn submit_body_shape() {
        let body = SubmitBody {
            answers: vec![AnswerBody {
                question_id: 4,
                reponse: "vrai".into(),
            }],
            temps_utilise: 3100,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"answers": [{"question_id": 4, "reponse": "vrai"}], "temps_utilise": 3100})
        );
    }

    #[test]
    fn submit_receipt_reads_wrapped_bare_or_empty_replies() {
        let wrapped = RawSubmission::receipt_from(&json!({
            "success": true, "message": "ok", "data": {"score": 3, "percentage": 75.0}
        }));
        assert_eq!(wrapped.score, Some(3.0));
        assert_eq!(wrapped.message.as_deref(), Some("ok"));

        let bare = RawSubmission::receipt_from(&json!({"score": 1, "correct_answers": 1}));
        assert_eq!(bare.correct_answers, Some(1));

        let empty = RawSubmission::receipt_from(&Value::Null);
        assert_eq!(empty.score, None);
        assert_eq!(empty.message, None);
    }

    #[test]
    fn payment_joins_student_name() {
        let raw: RawPayment = serde_json::from_value(json!({
            "id_paiement": 2, "user_id": 5, "mode_paiement": "mvola",
            "code_ref_mvola": "MV1", "montant": 30000, "statut": "par_tranche",
            "tranche_restante": 20000, "date_paiement": "2024-02-01",
            "username": "hery.rakoto", "email": "hery@example.mg"
        }))
        .unwrap();
        let payment = raw.normalize().unwrap();
        assert_eq!(payment.student_id, StudentId::new(5));
        assert_eq!(payment.status, PaymentStatus::Installment);
        assert_eq!(payment.student_name.as_deref(), Some("hery.rakoto"));
        assert!(payment.paid_at.is_some());
        assert!((payment.remaining_installment - 20_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn student_falls_back_to_username() {
        let raw: RawStudent = serde_json::from_value(json!({
            "id": 8, "username": "lova", "email": "l@example.mg", "actif": true, "code_auth": ""
        }))
        .unwrap();
        let student = raw.normalize().unwrap();
        assert_eq!(student.last_name, "lova");
        assert_eq!(student.auth_code, None);
        assert!(student.active);
    }

    #[test]
    fn individual_notification_keeps_recipient() {
        let raw: RawNotification = serde_json::from_value(json!({
            "id_notification": 1, "titre": "t", "message": "m",
            "type_cible": "individuel", "id_etudiant": 9
        }))
        .unwrap();
        assert_eq!(
            raw.normalize().unwrap().target,
            NotificationTarget::Student(StudentId::new(9))
        );
    }
}
