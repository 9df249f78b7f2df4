//! Invite registration client.
//!
//! [`InviteClient`] talks to the invite server over HTTP, and
//! [`RegistrationGate`] drives the two-phase form on top of it: token first,
//! then username and password.

mod client;
mod error;
pub mod gate;
mod invite_link;
mod types;

pub use client::InviteClient;
pub use error::ClientError;
pub use gate::{
    validate, Field, FieldErrors, FormInput, GateState, Notice, Phase, RegistrationApi,
    RegistrationGate, SubmitOutcome,
};
pub use invite_link::token_from_invite_link;
pub use types::*;
