use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::game_logic::round::ActiveQuestion;
use crate::game_logic::{
    AnswerOutcome, Lifeline, LifelineOutcome, Lifelines, QuestionLoader, QuizError, RoundPhase,
    RoundState, Theme,
};
use crate::leaderboard::{HighScoreEntry, LeaderboardStore};

const SESSION_BUFFER_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("Invalid answer choice: {0}")]
    InvalidChoice(String),
    #[error("Session {0} is no longer running")]
    Closed(Uuid),
}

/// How a player picks an answer: the displayed option number or its text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AnswerChoice {
    Number(usize),
    Text(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&ActiveQuestion> for QuestionView {
    fn from(active: &ActiveQuestion) -> Self {
        Self {
            text: active.record.question_text.clone(),
            options: active.displayed.clone(),
            hint: active.hint.clone(),
        }
    }
}

/// Client-facing snapshot of a session. Never contains the correct answer of
/// the active question.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub player_name: String,
    pub theme: Theme,
    pub phase: RoundPhase,
    pub question_index: usize,
    pub total_questions: usize,
    pub score: u32,
    pub question: Option<QuestionView>,
    pub lifelines: Lifelines,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<HighScoreEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetails {
    pub session_id: Uuid,
    pub player_name: String,
    pub theme: Theme,
}

#[derive(Debug)]
pub enum SessionManagerMessage {
    CreateSession {
        player_name: String,
        theme: Theme,
        respond_to: oneshot::Sender<SessionDetails>,
    },
    GetSessionHandle {
        session_id: Uuid,
        respond_to: oneshot::Sender<Option<SessionActorHandle>>,
    },
    SessionActorShutdown {
        session_id: Uuid,
    },
    RemoveSession {
        session_id: Uuid,
    },
    SessionCount {
        respond_to: oneshot::Sender<usize>,
    },
}

/// Shared by every session the manager spawns.
#[derive(Clone)]
pub struct SessionResources {
    pub loader: QuestionLoader,
    pub leaderboard: Arc<LeaderboardStore>,
    pub questions_per_round: usize,
    pub idle_timeout: Duration,
}

pub struct SessionManagerActor {
    receiver: mpsc::Receiver<SessionManagerMessage>,
    sessions: HashMap<Uuid, SessionActorHandle>,
    self_sender: mpsc::Sender<SessionManagerMessage>,
    resources: SessionResources,
}

impl SessionManagerActor {
    fn new(
        receiver: mpsc::Receiver<SessionManagerMessage>,
        self_sender: mpsc::Sender<SessionManagerMessage>,
        resources: SessionResources,
    ) -> Self {
        SessionManagerActor {
            receiver,
            sessions: HashMap::new(),
            self_sender,
            resources,
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionManagerMessage) {
        match msg {
            SessionManagerMessage::CreateSession {
                player_name,
                theme,
                respond_to,
            } => {
                let session_id = Uuid::new_v4();
                tracing::info!(
                    session.id = %session_id,
                    player = %player_name,
                    theme = %theme,
                    "Creating quiz session"
                );

                let manager_handle = SessionManagerHandle {
                    sender: self.self_sender.clone(),
                };
                let round = RoundState::new(
                    player_name.clone(),
                    theme,
                    self.resources.questions_per_round,
                );
                let handle = SessionActorHandle::spawn(
                    session_id,
                    SESSION_BUFFER_SIZE,
                    manager_handle,
                    round,
                    self.resources.clone(),
                );
                self.sessions.insert(session_id, handle);

                let _ = respond_to.send(SessionDetails {
                    session_id,
                    player_name,
                    theme,
                });
            }
            SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to,
            } => {
                tracing::debug!(session.id = %session_id, "Received GetSessionHandle request");
                let _ = respond_to.send(self.sessions.get(&session_id).cloned());
            }
            SessionManagerMessage::SessionActorShutdown { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    tracing::info!(session.id = %session_id, "Cleaning up session after actor shutdown");
                } else {
                    tracing::warn!(session.id = %session_id, "Received shutdown for unknown session");
                }
            }
            SessionManagerMessage::RemoveSession { session_id } => {
                // Dropping the last handle closes the actor's channel and stops it.
                if self.sessions.remove(&session_id).is_some() {
                    tracing::info!(session.id = %session_id, active = self.sessions.len(), "Session removed");
                }
            }
            SessionManagerMessage::SessionCount { respond_to } => {
                let _ = respond_to.send(self.sessions.len());
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_session_manager_actor(mut actor: SessionManagerActor) {
    tracing::info!("SessionManager actor started");
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("SessionManager actor stopped");
}

#[derive(Clone, Debug)]
pub struct SessionManagerHandle {
    sender: mpsc::Sender<SessionManagerMessage>,
}

impl SessionManagerHandle {
    pub fn spawn(buffer_size: usize, resources: SessionResources) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionManagerActor::new(receiver, sender.clone(), resources);
        tokio::spawn(run_session_manager_actor(actor));
        Self { sender }
    }

    pub async fn create_session(
        &self,
        player_name: String,
        theme: Theme,
    ) -> Result<SessionDetails, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::CreateSession {
                player_name,
                theme,
                respond_to,
            })
            .await
            .map_err(|e| format!("Failed to send CreateSession: {}", e))?;
        rx.await
            .map_err(|e| format!("SessionManager no response: {}", e))
    }

    pub async fn get_session_handle(&self, session_id: Uuid) -> Option<SessionActorHandle> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn remove_session(&self, session_id: Uuid) -> Result<(), String> {
        self.sender
            .send(SessionManagerMessage::RemoveSession { session_id })
            .await
            .map_err(|e| format!("Failed to send RemoveSession: {}", e))
    }

    pub async fn session_count(&self) -> Result<usize, String> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::SessionCount { respond_to })
            .await
            .map_err(|e| format!("Failed to send SessionCount: {}", e))?;
        rx.await
            .map_err(|e| format!("SessionManager no response: {}", e))
    }

    pub async fn notify_session_shutdown(&self, session_id: Uuid) -> Result<(), String> {
        self.sender
            .send(SessionManagerMessage::SessionActorShutdown { session_id })
            .await
            .map_err(|e| format!("Failed to send SessionActorShutdown: {}", e))
    }
}

#[derive(Debug)]
pub enum SessionActorMessage {
    View {
        respond_to: oneshot::Sender<Result<SessionView, SessionError>>,
    },
    UseLifeline {
        lifeline: Lifeline,
        respond_to: oneshot::Sender<Result<(LifelineOutcome, SessionView), SessionError>>,
    },
    SubmitAnswer {
        choice: AnswerChoice,
        respond_to: oneshot::Sender<Result<(AnswerOutcome, SessionView), SessionError>>,
    },
    /// Play Again. Keeps the current theme when `theme` is `None`.
    Restart {
        theme: Option<Theme>,
        respond_to: oneshot::Sender<Result<SessionView, SessionError>>,
    },
}

/// Owns one `RoundState`. Commands run one at a time, so a session never has
/// more than one model call in flight.
pub struct SessionActor {
    receiver: mpsc::Receiver<SessionActorMessage>,
    session_id: Uuid,
    round: RoundState,
    resources: SessionResources,
    manager_handle: SessionManagerHandle,
    rng: StdRng,
    persisted: bool,
    leaderboard_snapshot: Option<Vec<HighScoreEntry>>,
}

impl SessionActor {
    fn new(
        receiver: mpsc::Receiver<SessionActorMessage>,
        session_id: Uuid,
        manager_handle: SessionManagerHandle,
        round: RoundState,
        resources: SessionResources,
    ) -> Self {
        SessionActor {
            receiver,
            session_id,
            round,
            resources,
            manager_handle,
            rng: StdRng::from_entropy(),
            persisted: false,
            leaderboard_snapshot: None,
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        session.id = %self.session_id,
        theme = %self.round.theme(),
        question.index = self.round.question_index(),
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionActorMessage) {
        match msg {
            SessionActorMessage::View { respond_to } => {
                let result = self.view().await;
                let _ = respond_to.send(result);
            }
            SessionActorMessage::UseLifeline {
                lifeline,
                respond_to,
            } => {
                let outcome = self.round.use_lifeline(lifeline, &mut self.rng);
                tracing::debug!(lifeline = %lifeline, outcome = ?outcome, "Lifeline requested");
                self.finish_if_complete().await;
                let _ = respond_to.send(Ok((outcome, self.snapshot())));
            }
            SessionActorMessage::SubmitAnswer { choice, respond_to } => {
                let result = self.submit_answer(choice).await;
                let _ = respond_to.send(result);
            }
            SessionActorMessage::Restart { theme, respond_to } => {
                let theme = theme.unwrap_or_else(|| self.round.theme());
                tracing::info!(new_theme = %theme, "Restarting round");
                self.round = RoundState::new(
                    self.round.player_name().to_string(),
                    theme,
                    self.resources.questions_per_round,
                );
                self.persisted = false;
                self.leaderboard_snapshot = None;
                let result = self.view().await;
                let _ = respond_to.send(result);
            }
        }
    }

    async fn view(&mut self) -> Result<SessionView, SessionError> {
        if self.round.needs_question() {
            self.round
                .ensure_question(&self.resources.loader, &mut self.rng)
                .await?;
        }
        self.finish_if_complete().await;
        Ok(self.snapshot())
    }

    async fn submit_answer(
        &mut self,
        choice: AnswerChoice,
    ) -> Result<(AnswerOutcome, SessionView), SessionError> {
        let choice_text = match choice {
            AnswerChoice::Text(text) => text,
            AnswerChoice::Number(number) => {
                if self.round.is_over() {
                    return Err(QuizError::RoundOver.into());
                }
                if self.round.current().is_none() {
                    return Err(QuizError::NoActiveQuestion.into());
                }
                self.round
                    .displayed_option(number)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SessionError::InvalidChoice(format!(
                            "option {} is not displayed",
                            number
                        ))
                    })?
            }
        };

        let outcome = self.round.submit_answer(&choice_text)?;
        self.finish_if_complete().await;
        Ok((outcome, self.snapshot()))
    }

    /// Persists the final score the first time the round is seen complete.
    async fn finish_if_complete(&mut self) {
        if self.persisted {
            return;
        }
        let Some(entry) = self.round.high_score_entry() else {
            return;
        };

        match self.resources.leaderboard.append(entry).await {
            Ok(entries) => {
                tracing::info!(score = self.round.score(), "Round complete, score saved");
                self.persisted = true;
                self.leaderboard_snapshot = Some(entries);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save high score, will retry on next request");
            }
        }
    }

    fn snapshot(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            player_name: self.round.player_name().to_string(),
            theme: self.round.theme(),
            phase: self.round.phase(),
            question_index: self.round.question_index(),
            total_questions: self.round.total_questions(),
            score: self.round.score(),
            question: self.round.current().map(QuestionView::from),
            lifelines: self.round.lifelines().clone(),
            leaderboard: self.leaderboard_snapshot.clone(),
        }
    }
}

#[tracing::instrument(skip(actor), fields(session.id = %actor.session_id))]
pub async fn run_session_actor(mut actor: SessionActor) {
    tracing::info!("Session actor started");

    let idle_timeout = actor.resources.idle_timeout;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => {
                        last_activity = Instant::now();
                        actor.handle_message(msg).await;
                    }
                    None => {
                        tracing::info!("Session actor channel closed. Shutting down");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                tracing::info!("Session inactivity timeout. Notifying manager for shutdown");
                if let Err(e) = actor.manager_handle.notify_session_shutdown(actor.session_id).await {
                    tracing::error!(error = %e, "Failed to notify SessionManager of shutdown");
                }
                break;
            }
        }
    }

    tracing::info!("Session actor stopping");
}

#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionActorMessage>,
    pub session_id: Uuid,
}

impl SessionActorHandle {
    pub fn spawn(
        session_id: Uuid,
        buffer_size: usize,
        manager_handle: SessionManagerHandle,
        round: RoundState,
        resources: SessionResources,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionActor::new(receiver, session_id, manager_handle, round, resources);
        tokio::spawn(run_session_actor(actor));
        Self { sender, session_id }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionActorMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| SessionError::Closed(self.session_id))?;
        rx.await.map_err(|_| SessionError::Closed(self.session_id))?
    }

    pub async fn view(&self) -> Result<SessionView, SessionError> {
        self.request(|respond_to| SessionActorMessage::View { respond_to })
            .await
    }

    pub async fn use_lifeline(
        &self,
        lifeline: Lifeline,
    ) -> Result<(LifelineOutcome, SessionView), SessionError> {
        self.request(|respond_to| SessionActorMessage::UseLifeline {
            lifeline,
            respond_to,
        })
        .await
    }

    pub async fn submit_answer(
        &self,
        choice: AnswerChoice,
    ) -> Result<(AnswerOutcome, SessionView), SessionError> {
        self.request(|respond_to| SessionActorMessage::SubmitAnswer { choice, respond_to })
            .await
    }

    pub async fn restart(&self, theme: Option<Theme>) -> Result<SessionView, SessionError> {
        self.request(|respond_to| SessionActorMessage::Restart { theme, respond_to })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game_logic::{AnswerOracle, QuestionSource};
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Numbered questions whose first option is always right.
    pub(crate) struct CountingSource {
        calls: AtomicUsize,
    }

    impl CountingSource {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuestionSource for CountingSource {
        async fn generate_question(
            &self,
            theme: Theme,
            _exclude: &[String],
        ) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "Question: {} question {}?\nOptions:\n1. right {}\n2. wrong a\n3. wrong b\n4. wrong c\nExplanation: Number {} is right. Really.",
                theme, n, n, n
            ))
        }
    }

    pub(crate) struct FirstOptionOracle;

    #[async_trait]
    impl AnswerOracle for FirstOptionOracle {
        async fn answer(&self, _question_block: &str) -> Result<String, LlmError> {
            Ok("1".to_string())
        }
    }

    /// Never produces a parsable question.
    pub(crate) struct GarbageSource {
        pub(crate) calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionSource for GarbageSource {
        async fn generate_question(
            &self,
            _theme: Theme,
            _exclude: &[String],
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("garbage".to_string())
        }
    }

    pub(crate) fn resources(dir: &TempDir, idle_timeout: Duration) -> SessionResources {
        resources_with_source(dir, Arc::new(CountingSource::new()), idle_timeout)
    }

    pub(crate) fn resources_with_source(
        dir: &TempDir,
        source: Arc<dyn QuestionSource>,
        idle_timeout: Duration,
    ) -> SessionResources {
        let loader = QuestionLoader::new(source, Arc::new(FirstOptionOracle))
            .with_backoff(Duration::from_millis(1));
        SessionResources {
            loader,
            leaderboard: Arc::new(LeaderboardStore::new(dir.path().join("highscores.csv"))),
            questions_per_round: 5,
            idle_timeout,
        }
    }

    fn right_option(view: &SessionView) -> String {
        view.question
            .as_ref()
            .and_then(|q| q.options.iter().find(|o| o.starts_with("right")).cloned())
            .expect("active question with a right option")
    }

    #[tokio::test]
    async fn test_view_loads_question_lazily() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManagerHandle::spawn(8, resources(&dir, Duration::from_secs(60)));
        let details = manager
            .create_session("Asha".to_string(), Theme::History)
            .await
            .unwrap();
        let session = manager.get_session_handle(details.session_id).await.unwrap();

        let view = session.view().await.unwrap();
        assert_eq!(view.phase, RoundPhase::InProgress);
        assert_eq!(view.question.as_ref().unwrap().options.len(), 4);
        assert!(view.leaderboard.is_none());

        let again = session.view().await.unwrap();
        assert_eq!(
            again.question.as_ref().unwrap().text,
            view.question.as_ref().unwrap().text
        );
    }

    #[tokio::test]
    async fn test_full_round_persists_exactly_once() {
        let dir = TempDir::new().unwrap();
        let res = resources(&dir, Duration::from_secs(60));
        let store = res.leaderboard.clone();
        let manager = SessionManagerHandle::spawn(8, res);
        let details = manager
            .create_session("Asha".to_string(), Theme::History)
            .await
            .unwrap();
        let session = manager.get_session_handle(details.session_id).await.unwrap();

        let mut last = None;
        for _ in 0..5 {
            let view = session.view().await.unwrap();
            let (outcome, after) = session
                .submit_answer(AnswerChoice::Text(right_option(&view)))
                .await
                .unwrap();
            assert!(outcome.correct);
            last = Some(after);
        }

        let last = last.unwrap();
        assert_eq!(last.phase, RoundPhase::Completed);
        assert_eq!(last.score, 5);
        assert_eq!(
            last.leaderboard,
            Some(vec![HighScoreEntry {
                player_name: "Asha".to_string(),
                score: 5
            }])
        );

        session.view().await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);

        let err = session
            .submit_answer(AnswerChoice::Number(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Quiz(QuizError::RoundOver)));
    }

    #[tokio::test]
    async fn test_answer_by_number_and_invalid_number() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManagerHandle::spawn(8, resources(&dir, Duration::from_secs(60)));
        let details = manager
            .create_session("Ravi".to_string(), Theme::Sports)
            .await
            .unwrap();
        let session = manager.get_session_handle(details.session_id).await.unwrap();

        let err = session
            .submit_answer(AnswerChoice::Number(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Quiz(QuizError::NoActiveQuestion)));

        session.view().await.unwrap();
        let err = session
            .submit_answer(AnswerChoice::Number(9))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidChoice(_)));

        let (outcome, view) = session.submit_answer(AnswerChoice::Number(1)).await.unwrap();
        assert_eq!(outcome.question_index, 1);
        assert_eq!(view.question_index, 1);
        assert!(view.question.is_none());
    }

    #[tokio::test]
    async fn test_lifelines_and_restart() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManagerHandle::spawn(8, resources(&dir, Duration::from_secs(60)));
        let details = manager
            .create_session("Meera".to_string(), Theme::Science)
            .await
            .unwrap();
        let session = manager.get_session_handle(details.session_id).await.unwrap();
        session.view().await.unwrap();

        let (outcome, view) = session.use_lifeline(Lifeline::FiftyFifty).await.unwrap();
        assert!(matches!(outcome, LifelineOutcome::FiftyFifty { .. }));
        assert_eq!(view.question.unwrap().options.len(), 2);

        let (outcome, _) = session.use_lifeline(Lifeline::FiftyFifty).await.unwrap();
        assert_eq!(
            outcome,
            LifelineOutcome::AlreadyUsed {
                lifeline: Lifeline::FiftyFifty
            }
        );

        let (outcome, view) = session.use_lifeline(Lifeline::Skip).await.unwrap();
        assert!(matches!(outcome, LifelineOutcome::Skipped { question_index: 1, .. }));
        assert_eq!(view.score, 0);

        let view = session.restart(Some(Theme::Movies)).await.unwrap();
        assert_eq!(view.theme, Theme::Movies);
        assert_eq!(view.question_index, 0);
        assert_eq!(view.player_name, "Meera");
        assert!(view.lifelines.is_available(Lifeline::FiftyFifty));
        assert!(view.question.is_some());
    }

    #[tokio::test]
    async fn test_idle_session_deregisters() {
        let dir = TempDir::new().unwrap();
        let manager = SessionManagerHandle::spawn(8, resources(&dir, Duration::from_millis(50)));
        let details = manager
            .create_session("Asha".to_string(), Theme::History)
            .await
            .unwrap();
        assert!(manager.get_session_handle(details.session_id).await.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(manager.get_session_handle(details.session_id).await.is_none());
    }
}
