use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;
use yambot_core::text::title_case;
use yambot_core::{CommandSpec, FieldKind, FieldSpec, TextSemantic};

use crate::webhook::RemoteOptionSource;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{0,15}$").expect("phone pattern compiles"));
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\t\n\f\r ]+$").expect("url pattern compiles"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// Every problem found in one form submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Please fix the following issues:")?;
        for violation in &self.violations {
            write!(f, "\n• **{}** {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

pub struct FieldValidator {
    remote_options: Arc<dyn RemoteOptionSource>,
}

impl FieldValidator {
    pub fn new(remote_options: Arc<dyn RemoteOptionSource>) -> Self {
        Self { remote_options }
    }

    /// Problems with one submitted value, without the field name.
    pub async fn validate(&self, field: &FieldSpec, value: Option<&str>) -> Vec<String> {
        let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
            return if field.required { vec!["is required".to_owned()] } else { Vec::new() };
        };

        match field.kind {
            FieldKind::Text => check_text(field, value),
            FieldKind::Select => check_select(field, value).into_iter().collect(),
            FieldKind::RemoteSelect => self.check_remote_select(field, value).await.into_iter().collect(),
            FieldKind::Attachment => Vec::new(),
        }
    }

    pub async fn validate_form(
        &self,
        spec: &CommandSpec,
        values: &HashMap<String, String>,
    ) -> Result<(), ValidationReport> {
        let mut report = ValidationReport::default();

        for field in &spec.fields {
            let value = values.get(&field.name).map(String::as_str);
            for message in self.validate(field, value).await {
                report.violations.push(Violation { field: title_case(&field.name), message });
            }
        }

        if report.is_empty() {
            Ok(())
        } else {
            Err(report)
        }
    }

    async fn check_remote_select(&self, field: &FieldSpec, value: &str) -> Option<String> {
        let url = field.webhook_url()?;

        match self.remote_options.fetch(url).await {
            Ok(options) if options.iter().any(|option| option.value == value) => None,
            Ok(_) => Some(format!("has invalid value '{value}'")),
            Err(error) => {
                warn!(
                    event_name = "validation.remote_options.unavailable",
                    field = %field.name,
                    url,
                    error = %error,
                    "failed to fetch remote options for validation"
                );
                Some("could not validate options (remote service unavailable)".to_owned())
            }
        }
    }
}

fn check_text(field: &FieldSpec, value: &str) -> Vec<String> {
    field
        .text_semantics()
        .into_iter()
        .filter_map(|semantic| {
            let valid = match semantic {
                TextSemantic::Email => EMAIL_PATTERN.is_match(value),
                TextSemantic::Amount => value.replace(',', ".").parse::<f64>().is_ok(),
                TextSemantic::Phone => PHONE_PATTERN.is_match(&value.replace(' ', "")),
                TextSemantic::Url => URL_PATTERN.is_match(value),
            };
            (!valid).then(|| semantic_message(semantic).to_owned())
        })
        .collect()
}

fn semantic_message(semantic: TextSemantic) -> &'static str {
    match semantic {
        TextSemantic::Email => "must be a valid email address",
        TextSemantic::Amount => "must be a valid number",
        TextSemantic::Phone => "must be a valid phone number",
        TextSemantic::Url => "must be a valid URL starting with http:// or https://",
    }
}

fn check_select(field: &FieldSpec, value: &str) -> Option<String> {
    if field.options.is_empty() || field.options.iter().any(|option| option == value) {
        return None;
    }

    Some(format!(
        "has invalid value '{value}'. Available options: {}",
        field.options.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use yambot_core::{CommandKind, CommandSpec, FieldSpec, RemoteOption};

    use super::FieldValidator;
    use crate::webhook::{RemoteOptionError, RemoteOptionSource};

    struct StaticOptions {
        result: Result<Vec<RemoteOption>, RemoteOptionError>,
        calls: AtomicUsize,
    }

    impl StaticOptions {
        fn ok(values: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(values.iter().map(|value| RemoteOption::new(*value, *value)).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err(RemoteOptionError::Status(503)),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteOptionSource for StaticOptions {
        async fn fetch(&self, _url: &str) -> Result<Vec<RemoteOption>, RemoteOptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn validator() -> FieldValidator {
        FieldValidator::new(StaticOptions::ok(&["alpha", "beta"]))
    }

    #[tokio::test]
    async fn optional_blank_values_pass_for_every_type() {
        let validator = validator();
        let fields = [
            FieldSpec::text("contact_email"),
            FieldSpec::select("company", ["A"]),
            FieldSpec::attachment("pdf"),
            FieldSpec::remote_select("project", "https://example.com/projects"),
        ];

        for field in &fields {
            assert!(validator.validate(field, None).await.is_empty(), "{}", field.name);
            assert!(validator.validate(field, Some("   ")).await.is_empty(), "{}", field.name);
        }
    }

    #[tokio::test]
    async fn required_blank_values_fail() {
        let validator = validator();
        let field = FieldSpec::attachment("pdf").required();

        assert_eq!(validator.validate(&field, Some("")).await, vec!["is required"]);
    }

    #[tokio::test]
    async fn text_semantics_check_formats() {
        let validator = validator();
        let cases = [
            ("email", "test@example.com", true),
            ("email", "invalid-email", false),
            ("amount", "123.45", true),
            ("amount", "123,45", true),
            ("amount", "abc", false),
            ("phone", "+1234567890", true),
            ("phone", "+48 600 700 800", true),
            ("phone", "invalid-phone", false),
            ("phone", "1\u{662}\u{663}\u{664}\u{665}", false),
            ("url", "https://example.com", true),
            ("url", "invalid-url", false),
            ("url", "https://example.com/a\u{a0}b", true),
            ("url", "https://example.com/a b", false),
            ("title", "anything goes", true),
        ];

        for (name, value, valid) in cases {
            let problems = validator.validate(&FieldSpec::text(name), Some(value)).await;
            assert_eq!(problems.is_empty(), valid, "{name} = {value}: {problems:?}");
        }
    }

    #[tokio::test]
    async fn every_matching_text_check_runs() {
        let problems = validator().validate(&FieldSpec::text("price_link"), Some("nope")).await;

        assert_eq!(
            problems,
            vec![
                "must be a valid number",
                "must be a valid URL starting with http:// or https://"
            ]
        );
    }

    #[tokio::test]
    async fn select_membership_is_exact() {
        let validator = validator();
        let field = FieldSpec::select("company", ["Company A", "Company B"]);

        assert!(validator.validate(&field, Some("Company A")).await.is_empty());
        assert_eq!(
            validator.validate(&field, Some("company a")).await,
            vec!["has invalid value 'company a'. Available options: Company A, Company B"]
        );
        assert!(validator.validate(&FieldSpec::select("free", Vec::<String>::new()), Some("x")).await.is_empty());
    }

    #[tokio::test]
    async fn remote_select_checks_live_values() {
        let source = StaticOptions::ok(&["alpha", "beta"]);
        let validator = FieldValidator::new(source.clone());
        let field = FieldSpec::remote_select("project", "https://example.com/projects");

        assert!(validator.validate(&field, Some("beta")).await.is_empty());
        assert_eq!(validator.validate(&field, Some("gamma")).await, vec!["has invalid value 'gamma'"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remote_select_failure_reports_unavailable() {
        let validator = FieldValidator::new(StaticOptions::failing());
        let field = FieldSpec::remote_select("project", "https://example.com/projects");

        assert_eq!(
            validator.validate(&field, Some("alpha")).await,
            vec!["could not validate options (remote service unavailable)"]
        );
    }

    #[tokio::test]
    async fn remote_select_without_webhook_checks_presence_only() {
        let source = StaticOptions::ok(&[]);
        let validator = FieldValidator::new(source.clone());
        let mut field = FieldSpec::remote_select("project", "");
        field.webhook = None;

        assert!(validator.validate(&field, Some("anything")).await.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn form_validation_collects_every_violation() {
        let spec = CommandSpec::new("cost", CommandKind::Modal)
            .with_field(FieldSpec::text("title").required())
            .with_field(FieldSpec::select("company", ["Company A", "Company B"]).required())
            .with_field(FieldSpec::attachment("pdf").required());
        let values = HashMap::from([
            ("title".to_owned(), String::new()),
            ("company".to_owned(), "Invalid".to_owned()),
            ("pdf".to_owned(), String::new()),
        ]);

        let report = validator().validate_form(&spec, &values).await.expect_err("violations");
        let message = report.to_string();

        assert!(message.starts_with("Please fix the following issues:\n"));
        assert!(message.contains("• **Title** is required"));
        assert!(message.contains("• **Company** has invalid value 'Invalid'"));
        assert!(message.contains("• **Pdf** is required"));
        assert_eq!(report.violations.len(), 3);
    }

    #[tokio::test]
    async fn valid_form_passes() {
        let spec = CommandSpec::new("contact", CommandKind::Modal)
            .with_field(FieldSpec::text("email").required())
            .with_field(FieldSpec::text("comment"));
        let values = HashMap::from([("email".to_owned(), "test@example.com".to_owned())]);

        assert!(validator().validate_form(&spec, &values).await.is_ok());
    }
}
