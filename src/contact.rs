//! Contact form relay.
//!
//! A valid submission produces two emails: a notification to the site owner
//! (awaited, its failure is the caller's failure) and an acknowledgment to
//! the sender (spawned, its outcome is only logged).

use std::sync::Arc;

use serde::Deserialize;
use tera::{Context, Tera};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::mailer::{Email, MailError, Mailer};

const NOTIFICATION_TEXT: &str = "\
Name: {{ name }}
Email: {{ email }}
Subject: {{ subject }}

{{ message }}

--
This email was sent from your portfolio website.";

const NOTIFICATION_HTML: &str = r#"<p><strong>Name:</strong> {{ name }}</p>
<p><strong>Email:</strong> <a href="mailto:{{ email }}">{{ email }}</a></p>
<p><strong>Subject:</strong> {{ subject }}</p>
<p style="white-space:pre-wrap">{{ message }}</p>
<hr><p>This email was sent from your portfolio website.</p>"#;

const ACKNOWLEDGMENT_TEXT: &str = "\
Hi {{ name }},

Thank you for reaching out through my portfolio website. I've received your message and appreciate you taking the time to connect.

I personally review all messages and will respond as soon as possible, usually within 24-48 hours.

Best regards

--
This is an automated acknowledgment confirming receipt of your message.";

const ACKNOWLEDGMENT_HTML: &str = r#"<p>Hi {{ name }},</p>
<p>Thank you for reaching out through my portfolio website. I've received your message and appreciate you taking the time to connect.</p>
<p>I personally review all messages and will respond as soon as possible, usually within 24-48 hours.</p>
<p>Best regards</p>
<hr><p>This is an automated acknowledgment confirming receipt of your message.</p>"#;

/// A contact form submission. Missing JSON fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    /// Sender address; becomes the notification's `Reply-To`.
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    /// True when every field has non-whitespace content.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.subject, &self.message]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("name", self.name.trim());
        context.insert("email", self.email.trim());
        context.insert("subject", self.subject.trim());
        context.insert("message", self.message.trim());
        context
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("All fields are required")]
    MissingFields,

    #[error("failed to render contact email: {0}")]
    Render(#[from] tera::Error),

    #[error("failed to deliver notification: {0}")]
    Delivery(#[from] MailError),
}

/// Relays contact submissions to the site owner and acknowledges the sender.
///
/// Both emails carry a plain-text and an HTML part rendered from built-in
/// templates. HTML templates escape every submitted value.
#[derive(Clone)]
pub struct ContactRelay {
    mailer: Arc<dyn Mailer>,
    templates: Arc<Tera>,
    recipient: String,
    from: String,
}

impl std::fmt::Debug for ContactRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactRelay")
            .field("recipient", &self.recipient)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl ContactRelay {
    /// Creates a relay sending from `from` and notifying `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Template`] if a built-in template fails to parse.
    pub fn new(
        mailer: Arc<dyn Mailer>,
        recipient: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self> {
        let mut templates = Tera::default();
        templates.add_raw_templates(vec![
            ("notification.txt", NOTIFICATION_TEXT),
            ("notification.html", NOTIFICATION_HTML),
            ("acknowledgment.txt", ACKNOWLEDGMENT_TEXT),
            ("acknowledgment.html", ACKNOWLEDGMENT_HTML),
        ])?;

        Ok(Self {
            mailer,
            templates: Arc::new(templates),
            recipient: recipient.into(),
            from: from.into(),
        })
    }

    /// Validates and relays `form`.
    ///
    /// The owner notification is awaited and its failure is returned. On
    /// success the returned handle tracks the acknowledgment send; dropping
    /// it does not cancel the task.
    pub async fn submit(&self, form: &ContactForm) -> Result<JoinHandle<()>, ContactError> {
        if !form.is_complete() {
            return Err(ContactError::MissingFields);
        }

        let context = form.context();
        let notification = self.notification(form, &context)?;
        let acknowledgment = self.acknowledgment(form, &context)?;

        self.mailer.send(&notification).await?;
        tracing::info!("contact notification delivered");

        let mailer = Arc::clone(&self.mailer);
        Ok(tokio::spawn(async move {
            if let Err(e) = mailer.send(&acknowledgment).await {
                tracing::warn!(error = %e, "contact acknowledgment failed");
            }
        }))
    }

    fn notification(&self, form: &ContactForm, context: &Context) -> Result<Email, tera::Error> {
        Ok(Email::new(
            &self.from,
            &self.recipient,
            format!("New contact form submission: {}", form.subject.trim()),
        )
        .text(self.templates.render("notification.txt", context)?)
        .html(self.templates.render("notification.html", context)?)
        .reply_to(form.email.trim()))
    }

    fn acknowledgment(&self, form: &ContactForm, context: &Context) -> Result<Email, tera::Error> {
        Ok(
            Email::new(&self.from, form.email.trim(), "Thank you for getting in touch")
                .text(self.templates.render("acknowledgment.txt", context)?)
                .html(self.templates.render("acknowledgment.html", context)?),
        )
    }
}
