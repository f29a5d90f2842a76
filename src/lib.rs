//! Authentication gating for web app shells.
//!
//! SYSTEM CONTEXT
//! ==============
//! A credential provider pushes auth state changes into a single-resolution
//! [`gate::AuthGate`]. Page loads consult a short-lived cached snapshot, then
//! the gate, to decide between rendering and redirecting to sign-in. API
//! requests go through an [`interceptor::AuthInterceptor`] that attaches
//! bearer tokens and retries once with a forced refresh after a 401.
//!
//! [`shell::AuthShell`] wires everything together and owns the process-scoped
//! state. Browser touch-points (storage, navigation, notices, the loading
//! overlay) are traits, so the same core runs behind a DOM front end or the
//! bundled CLI.

pub mod authorizer;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod interceptor;
pub mod page;
pub mod provider;
pub mod request;
pub mod sender;
pub mod shell;
pub mod storage;
pub mod ui;
pub mod unauthorized;

#[cfg(test)]
mod test_helpers;

pub use config::{ConfigError, ShellConfig};
pub use error::{ErrorCode, ShellError};
pub use page::{GuardDecision, PageOutcome, ProtectOptions};
pub use provider::{CredentialProvider, CurrentUser, ProviderError, User};
pub use request::{ApiRequest, ApiResponse, RequestInit, RequestInput};
pub use sender::{HttpSender, RequestSender};
pub use shell::{AuthShell, ShellServices};
