pub mod config;
pub mod domain;
pub mod errors;
pub mod templating;
pub mod text;

pub use domain::command::{
    CommandKind, CommandSet, CommandSpec, FieldKind, FieldSpec, SpecError, TextSemantic,
};
pub use domain::webhook::{RemoteOption, WebhookResponse, WebhookStatus};
pub use errors::{ApplicationError, InterfaceError};
pub use templating::{ResponseTemplater, TemplateData, TemplateError, DEFAULT_ACKNOWLEDGEMENT};
