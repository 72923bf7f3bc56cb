//! Security policy acceptance and the quiz that gates it

use std::sync::Arc;

use lure_core::{ServiceError, ServiceResult};
use lure_entities::{compliance_acceptances, compliance_policies, compliance_quizzes};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::cooldown::QuizCooldown;

pub const DEFAULT_POLICY_VERSION: &str = "1.0";
const DEFAULT_PASSING_SCORE: i32 = 80;

const DEFAULT_POLICY_TITLE: &str = "Information Security Policy";
const DEFAULT_POLICY_CONTENT: &str = "\
Never share your password with anyone, including IT staff.\n\
Verify the sender before opening attachments or following links.\n\
Report suspicious emails to your security team using the report button.\n\
Lock your workstation whenever you leave it unattended.\n";

#[derive(Debug, Deserialize)]
struct Question {
    answer: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizOutcome {
    /// Percentage of correct answers.
    pub score: i32,
    pub passing_score: i32,
    pub passed: bool,
    /// Whether this submission recorded a new acceptance.
    pub accepted: bool,
}

pub struct ComplianceService {
    db: Arc<DatabaseConnection>,
    cooldown: QuizCooldown,
}

impl ComplianceService {
    pub fn new(db: Arc<DatabaseConnection>, cooldown: QuizCooldown) -> Self {
        Self { db, cooldown }
    }

    /// Insert the default policy and quiz for a new tenant. Idempotent.
    pub async fn seed_defaults<C: ConnectionTrait>(&self, conn: &C, tenant: &str) -> ServiceResult<()> {
        let existing = compliance_policies::Entity::find()
            .filter(compliance_policies::Column::Tenant.eq(tenant))
            .count(conn)
            .await?;
        if existing > 0 {
            debug!("Compliance defaults already present for {}", tenant);
            return Ok(());
        }

        let now = chrono::Utc::now();
        compliance_policies::ActiveModel {
            tenant: Set(tenant.to_string()),
            version: Set(DEFAULT_POLICY_VERSION.to_string()),
            title: Set(DEFAULT_POLICY_TITLE.to_string()),
            content: Set(DEFAULT_POLICY_CONTENT.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        compliance_quizzes::ActiveModel {
            tenant: Set(tenant.to_string()),
            policy_version: Set(DEFAULT_POLICY_VERSION.to_string()),
            questions: Set(default_questions()),
            passing_score: Set(DEFAULT_PASSING_SCORE),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        info!("Seeded compliance policy {} for {}", DEFAULT_POLICY_VERSION, tenant);
        Ok(())
    }

    pub async fn active_policy(&self, tenant: &str) -> ServiceResult<compliance_policies::Model> {
        compliance_policies::Entity::find()
            .filter(compliance_policies::Column::Tenant.eq(tenant))
            .filter(compliance_policies::Column::IsActive.eq(true))
            .order_by_desc(compliance_policies::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Compliance policy for {}", tenant)))
    }

    async fn active_quiz(&self, tenant: &str) -> ServiceResult<(compliance_policies::Model, compliance_quizzes::Model)> {
        let policy = self.active_policy(tenant).await?;
        let quiz = compliance_quizzes::Entity::find()
            .filter(compliance_quizzes::Column::Tenant.eq(tenant))
            .filter(compliance_quizzes::Column::PolicyVersion.eq(policy.version.as_str()))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Quiz for policy {}", policy.version)))?;
        Ok((policy, quiz))
    }

    /// Quiz questions of the active policy with the answers removed.
    pub async fn quiz(&self, tenant: &str) -> ServiceResult<Value> {
        let (policy, quiz) = self.active_quiz(tenant).await?;
        let mut questions = quiz.questions;
        if let Some(items) = questions.as_array_mut() {
            for item in items.iter_mut() {
                if let Some(object) = item.as_object_mut() {
                    object.remove("answer");
                }
            }
        }
        Ok(json!({
            "policy_version": policy.version,
            "passing_score": quiz.passing_score,
            "questions": questions,
        }))
    }

    /// Grade a submission; a passing score records acceptance of the policy.
    pub async fn submit_quiz(
        &self,
        tenant: &str,
        user_identifier: &str,
        answers: &[usize],
    ) -> ServiceResult<QuizOutcome> {
        if let Err(wait) = self.cooldown.try_attempt(tenant, user_identifier) {
            return Err(ServiceError::validation(format!(
                "Quiz was submitted recently; retry in {} seconds",
                wait.as_secs().max(1)
            )));
        }

        let (policy, quiz) = self.active_quiz(tenant).await?;
        let questions: Vec<Question> = serde_json::from_value(quiz.questions.clone())
            .map_err(|e| ServiceError::Database(format!("Malformed quiz: {}", e)))?;
        let score = grade(&questions, answers);
        let passed = score >= quiz.passing_score;

        let accepted = if passed {
            match self.accept(tenant, user_identifier, &policy.version, score).await {
                Ok(_) => true,
                Err(ServiceError::Conflict { .. }) => false,
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        Ok(QuizOutcome {
            score,
            passing_score: quiz.passing_score,
            passed,
            accepted,
        })
    }

    /// Record acceptance of a policy version. Each user accepts a version once.
    pub async fn accept(
        &self,
        tenant: &str,
        user_identifier: &str,
        version: &str,
        score: i32,
    ) -> ServiceResult<compliance_acceptances::Model> {
        let result = compliance_acceptances::ActiveModel {
            user_identifier: Set(user_identifier.to_string()),
            tenant: Set(tenant.to_string()),
            version: Set(version.to_string()),
            score: Set(score),
            accepted_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await;

        match result {
            Ok(model) => {
                info!("{} accepted policy {} of {}", user_identifier, version, tenant);
                Ok(model)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                ServiceError::conflict(format!("Policy {} already accepted", version)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Acceptance of the active policy, if any.
    pub async fn status(
        &self,
        tenant: &str,
        user_identifier: &str,
    ) -> ServiceResult<Option<compliance_acceptances::Model>> {
        let policy = self.active_policy(tenant).await?;
        Ok(compliance_acceptances::Entity::find()
            .filter(compliance_acceptances::Column::Tenant.eq(tenant))
            .filter(compliance_acceptances::Column::UserIdentifier.eq(user_identifier))
            .filter(compliance_acceptances::Column::Version.eq(policy.version))
            .one(self.db.as_ref())
            .await?)
    }
}

fn grade(questions: &[Question], answers: &[usize]) -> i32 {
    if questions.is_empty() {
        return 100;
    }
    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.answer == **answer)
        .count();
    (correct * 100 / questions.len()) as i32
}

fn default_questions() -> Value {
    json!([
        {
            "question": "A colleague from IT asks for your password by phone. What do you do?",
            "options": ["Give it to them", "Refuse and report the call", "Send it by email instead"],
            "answer": 1
        },
        {
            "question": "An unexpected invoice arrives with a link to 'view the document'. What do you do?",
            "options": ["Open it quickly", "Forward it to colleagues", "Check the sender and report it"],
            "answer": 2
        },
        {
            "question": "You step away from your desk for coffee. What should you do first?",
            "options": ["Lock your workstation", "Nothing, it is only a minute"],
            "answer": 0
        },
        {
            "question": "Where do you report a suspicious email?",
            "options": ["Reply to the sender", "Use the report button or contact security", "Delete it silently"],
            "answer": 1
        },
        {
            "question": "Which of these is a sign of phishing?",
            "options": ["Urgent tone and a mismatched sender domain", "Your manager's usual signature"],
            "answer": 0
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade() {
        let questions = vec![Question { answer: 0 }, Question { answer: 2 }];
        assert_eq!(grade(&questions, &[0, 2]), 100);
        assert_eq!(grade(&questions, &[0, 1]), 50);
        assert_eq!(grade(&questions, &[]), 0);
    }

    #[test]
    fn test_default_quiz_answers_are_valid_options() {
        for question in default_questions().as_array().unwrap() {
            let answer = question["answer"].as_u64().unwrap() as usize;
            assert!(answer < question["options"].as_array().unwrap().len());
        }
    }
}
