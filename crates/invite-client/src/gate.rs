//! Two-phase registration gate.
//!
//! A user first submits an invitation token. Once the server confirms it,
//! the gate moves to the registration phase, where username, password and
//! confirmation are required as well. The active validation rules are a pure
//! function of the current [`Phase`], and every state change goes through
//! [`GateState::apply`].

use crate::error::ClientError;
use crate::invite_link::token_from_invite_link;
use crate::types::{AccountCreated, RegistrationRequest};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MSG_REQUIRED: &str = "Required";
pub const MSG_INVALID_UUID: &str = "Invalid uuid";
pub const MSG_PASSWORDS_NOT_MATCHED: &str = "Passwords not matched";
pub const MSG_TOKEN_NOT_VERIFIED: &str = "Token does not match the verified one";

/// Length of a hyphenated UUID string.
const TOKEN_LEN: usize = 36;

/// Remote operations the gate depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// Whether `token` exists on the server.
    async fn verify_token(&self, token: &str) -> Result<bool, ClientError>;

    /// Create an account, consuming the request's token.
    async fn create_account(
        &self,
        request: &RegistrationRequest,
    ) -> Result<AccountCreated, ClientError>;
}

/// Step of the registration flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Only the token field is shown.
    #[default]
    AwaitingToken,
    /// Token accepted; username and password fields are shown.
    AwaitingRegistration,
    /// Account created.
    Registered,
}

/// Form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Token,
    Username,
    Password,
    PasswordConfirmation,
}

/// Validation messages keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a message to a field, keeping the first one reported.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

/// Raw form input as typed by the user.
#[derive(Clone, Default)]
pub struct FormInput {
    pub token: String,
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

impl FormInput {
    /// Input for the token phase.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Input for the registration phase.
    pub fn registration(
        token: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        password_confirmation: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            password: password.into(),
            password_confirmation: password_confirmation.into(),
        }
    }
}

impl fmt::Debug for FormInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormInput")
            .field("token", &self.token)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("password_confirmation", &"[REDACTED]")
            .finish()
    }
}

/// Input that passed the rules of its phase.
#[derive(Debug, Clone)]
pub enum ValidatedInput {
    Token(String),
    Registration(RegistrationRequest),
    /// Nothing left to submit.
    AlreadyRegistered,
}

/// Whether `token` is a 36-character hyphenated UUID.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && Uuid::try_parse(token).is_ok()
}

/// Validate `input` against the rules of `phase`.
pub fn validate(phase: Phase, input: &FormInput) -> Result<ValidatedInput, FieldErrors> {
    if phase == Phase::Registered {
        return Ok(ValidatedInput::AlreadyRegistered);
    }

    let mut errors = FieldErrors::new();

    if input.token.is_empty() {
        errors.insert(Field::Token, MSG_REQUIRED);
    } else if !is_well_formed_token(&input.token) {
        errors.insert(Field::Token, MSG_INVALID_UUID);
    }

    if phase == Phase::AwaitingToken {
        return if errors.is_empty() {
            Ok(ValidatedInput::Token(input.token.clone()))
        } else {
            Err(errors)
        };
    }

    for (field, value) in [
        (Field::Username, &input.username),
        (Field::Password, &input.password),
        (Field::PasswordConfirmation, &input.password_confirmation),
    ] {
        if value.is_empty() {
            errors.insert(field, MSG_REQUIRED);
        }
    }

    if input.password != input.password_confirmation {
        errors.insert(Field::PasswordConfirmation, MSG_PASSWORDS_NOT_MATCHED);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedInput::Registration(RegistrationRequest {
        username: input.username.clone(),
        password: SecretString::new(input.password.clone()),
        token: input.token.clone(),
    }))
}

/// Message shown to the user after a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Verification answered `valid: false`.
    TokenNotRecognised,
    /// Transport failure or unexpected server answer.
    TryAgain,
    /// Account creation refused the token (unknown or already used).
    TokenRejected,
    UsernameTaken,
    /// Server refused the input.
    Rejected(String),
    RateLimited,
}

impl From<&ClientError> for Notice {
    fn from(error: &ClientError) -> Self {
        match error {
            ClientError::InvalidToken => Notice::TokenRejected,
            ClientError::UsernameTaken => Notice::UsernameTaken,
            ClientError::Rejected(message) => Notice::Rejected(message.clone()),
            ClientError::RateLimited => Notice::RateLimited,
            ClientError::Http(_)
            | ClientError::Json(_)
            | ClientError::InvalidBaseUrl(_)
            | ClientError::Api { .. } => Notice::TryAgain,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::TokenNotRecognised => write!(f, "This invitation token was not recognised"),
            Notice::TryAgain => write!(f, "Could not reach the server, please try again"),
            Notice::TokenRejected => write!(f, "This invitation token is no longer valid"),
            Notice::UsernameTaken => write!(f, "That username is already taken"),
            Notice::Rejected(message) => write!(f, "{}", message),
            Notice::RateLimited => write!(f, "Too many attempts, please try again shortly"),
        }
    }
}

/// Something that happened to the gate.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// The user edited the token field.
    TokenEdited(String),
    /// A validated submission is about to call the server.
    SubmitStarted,
    ValidationFailed(FieldErrors),
    TokenAccepted(String),
    TokenNotFound,
    RequestFailed(Notice),
    AccountCreated(AccountCreated),
}

/// Snapshot of the gate, replaced as a whole on every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateState {
    pub phase: Phase,
    /// Current content of the token field
    pub token: String,
    /// Token the server confirmed; registration is bound to it
    pub verified_token: Option<String>,
    /// A remote call is in flight
    pub is_loading: bool,
    pub notice: Option<Notice>,
    pub field_errors: FieldErrors,
    pub account: Option<AccountCreated>,
}

impl GateState {
    /// Initial state with the token field pre-filled.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Whether the username and password fields are visible.
    pub fn shows_registration_fields(&self) -> bool {
        self.phase == Phase::AwaitingRegistration
    }

    /// Compute the state that follows `event`.
    ///
    /// The phase only ever moves forward.
    pub fn apply(self, event: GateEvent) -> Self {
        match event {
            GateEvent::TokenEdited(token) => Self {
                token,
                notice: None,
                ..self
            },
            GateEvent::SubmitStarted => Self {
                is_loading: true,
                notice: None,
                field_errors: FieldErrors::new(),
                ..self
            },
            GateEvent::ValidationFailed(field_errors) => Self {
                is_loading: false,
                notice: None,
                field_errors,
                ..self
            },
            GateEvent::TokenAccepted(token) => {
                let phase = match self.phase {
                    Phase::AwaitingToken => Phase::AwaitingRegistration,
                    later => later,
                };
                Self {
                    phase,
                    verified_token: Some(token.clone()),
                    token,
                    is_loading: false,
                    notice: None,
                    ..self
                }
            }
            GateEvent::TokenNotFound => Self {
                is_loading: false,
                notice: Some(Notice::TokenNotRecognised),
                ..self
            },
            GateEvent::RequestFailed(notice) => Self {
                is_loading: false,
                notice: Some(notice),
                ..self
            },
            GateEvent::AccountCreated(account) => Self {
                phase: Phase::Registered,
                is_loading: false,
                notice: None,
                account: Some(account),
                ..self
            },
        }
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Local validation failed; no request was made.
    Invalid(FieldErrors),
    /// The token exists; registration fields are now shown.
    TokenAccepted,
    /// The token does not exist; still awaiting a token.
    TokenNotRecognised,
    Registered(AccountCreated),
    /// The remote call failed; the phase is unchanged.
    Failed(Notice),
    /// The gate already completed.
    AlreadyRegistered,
}

/// Drives the token → registration flow against a [`RegistrationApi`].
pub struct RegistrationGate<A> {
    api: A,
    state: watch::Sender<GateState>,
}

impl<A: RegistrationApi> RegistrationGate<A> {
    /// Create a gate with an empty token field.
    pub fn new(api: A) -> Self {
        Self::with_state(api, GateState::default())
    }

    /// Create a gate whose token field is pre-filled from an invite link.
    pub fn from_invite_link(api: A, link: &str) -> Self {
        let token = token_from_invite_link(link).unwrap_or_default();
        if !token.is_empty() {
            debug!("Token pre-filled from invite link");
        }
        Self::with_state(api, GateState::with_token(token))
    }

    fn with_state(api: A, state: GateState) -> Self {
        let (state, _) = watch::channel(state);
        Self { api, state }
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    /// Receive every state change, including loading toggles.
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Record the user editing the token field.
    pub fn set_token_text(&self, token: impl Into<String>) {
        self.dispatch(GateEvent::TokenEdited(token.into()));
    }

    fn dispatch(&self, event: GateEvent) {
        self.state
            .send_modify(|state| *state = std::mem::take(state).apply(event));
    }

    /// Validate `input` for the current phase and, if it passes, call the
    /// server.
    pub async fn submit(&self, input: &FormInput) -> SubmitOutcome {
        let (phase, verified_token) = {
            let state = self.state.borrow();
            (state.phase, state.verified_token.clone())
        };

        let validated = match validate(phase, input) {
            Ok(validated) => validated,
            Err(errors) => return self.invalid(errors),
        };

        match validated {
            ValidatedInput::Token(token) => self.verify(token).await,
            ValidatedInput::Registration(request) => {
                if verified_token.as_deref() != Some(request.token.as_str()) {
                    let mut errors = FieldErrors::new();
                    errors.insert(Field::Token, MSG_TOKEN_NOT_VERIFIED);
                    return self.invalid(errors);
                }
                self.register(request).await
            }
            ValidatedInput::AlreadyRegistered => SubmitOutcome::AlreadyRegistered,
        }
    }

    fn invalid(&self, errors: FieldErrors) -> SubmitOutcome {
        debug!(fields = errors.len(), "Submission blocked by validation");
        self.dispatch(GateEvent::ValidationFailed(errors.clone()));
        SubmitOutcome::Invalid(errors)
    }

    async fn verify(&self, token: String) -> SubmitOutcome {
        self.dispatch(GateEvent::SubmitStarted);

        match self.api.verify_token(&token).await {
            Ok(true) => {
                info!("Invitation token accepted");
                self.dispatch(GateEvent::TokenAccepted(token));
                SubmitOutcome::TokenAccepted
            }
            Ok(false) => {
                info!("Invitation token not recognised");
                self.dispatch(GateEvent::TokenNotFound);
                SubmitOutcome::TokenNotRecognised
            }
            Err(e) => self.fail("Token verification failed", &e),
        }
    }

    async fn register(&self, request: RegistrationRequest) -> SubmitOutcome {
        self.dispatch(GateEvent::SubmitStarted);

        match self.api.create_account(&request).await {
            Ok(account) => {
                info!(username = %account.username, "Account created");
                self.dispatch(GateEvent::AccountCreated(account.clone()));
                SubmitOutcome::Registered(account)
            }
            Err(e) => self.fail("Account creation failed", &e),
        }
    }

    fn fail(&self, context: &str, error: &ClientError) -> SubmitOutcome {
        warn!(error = %error, transport = error.is_transport(), "{}", context);
        let notice = Notice::from(error);
        self.dispatch(GateEvent::RequestFailed(notice.clone()));
        SubmitOutcome::Failed(notice)
    }
}
