//! Outbound account email over SMTP.
//!
//! Sending is a no-op returning `Ok(false)` when SMTP is not configured, so
//! registration and password flows work in development without a mail server.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use veda_core::{AppError, Config, User};

#[derive(Clone)]
pub struct EmailService {
    transport: Option<(Arc<AsyncSmtpTransport<Tokio1Executor>>, Mailbox)>,
    app_name: String,
    app_url: String,
}

impl EmailService {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transport: Self::build_transport(config),
            app_name: config.app_name().to_string(),
            app_url: config.app_url().to_string(),
        }
    }

    /// Service that never sends; used when SMTP is deliberately off.
    pub fn disabled(app_name: impl Into<String>, app_url: impl Into<String>) -> Self {
        Self {
            transport: None,
            app_name: app_name.into(),
            app_url: app_url.into(),
        }
    }

    fn build_transport(
        config: &Config,
    ) -> Option<(Arc<AsyncSmtpTransport<Tokio1Executor>>, Mailbox)> {
        let host = config.smtp_host()?;
        let from = config.smtp_from()?;
        let address: Address = match from.parse() {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(smtp_from = %from, error = %e, "Invalid SMTP_FROM, email disabled");
                return None;
            }
        };
        let sender = Mailbox::new(Some(config.app_name().to_string()), address);
        let port = config.smtp_port();
        let credentials = match (config.smtp_user(), config.smtp_pass()) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.to_string(), pass.to_string())),
            _ => None,
        };

        let mailer = if config.smtp_tls() {
            let builder = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
                Ok(builder) => builder.port(port),
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Invalid SMTP relay, email disabled");
                    return None;
                }
            };
            let builder = match credentials {
                Some(c) => builder.credentials(c),
                None => builder,
            };
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP with STARTTLS)");
            builder.build()
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let builder = match credentials {
                Some(c) => builder.credentials(c),
                None => builder,
            };
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP)");
            builder.build()
        };

        Some((Arc::new(mailer), sender))
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    async fn send(&self, to: &str, rendered: templates::Rendered) -> Result<bool, AppError> {
        let Some((mailer, sender)) = &self.transport else {
            tracing::warn!(subject = %rendered.subject, "Email configuration is incomplete. Email not sent.");
            return Ok(false);
        };

        let recipient: Mailbox = to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(sender.clone())
            .to(recipient)
            .subject(rendered.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                rendered.text,
                rendered.html,
            ))
            .map_err(|e| AppError::Email(e.to_string()))?;

        mailer.send(message).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to send email");
            AppError::Email(e.to_string())
        })?;

        tracing::info!(subject = %rendered.subject, "Email sent");
        Ok(true)
    }

    pub async fn send_verification_email(&self, user: &User, token: &str) -> Result<bool, AppError> {
        let url = format!("{}/verify-email/{}", self.app_url, token);
        self.send(&user.email, templates::verification(&self.app_name, user, &url))
            .await
    }

    pub async fn send_password_reset_email(
        &self,
        user: &User,
        token: &str,
        client_ip: Option<&str>,
    ) -> Result<bool, AppError> {
        let url = format!("{}/reset-password?token={}", self.app_url, token);
        self.send(
            &user.email,
            templates::password_reset(&self.app_name, user, &url, client_ip),
        )
        .await
    }

    /// Welcome an account created by an administrator. `password` is only
    /// included when it was generated for the user.
    pub async fn send_welcome_email(
        &self,
        user: &User,
        password: Option<&str>,
    ) -> Result<bool, AppError> {
        self.send(
            &user.email,
            templates::welcome(&self.app_name, &self.app_url, user, password),
        )
        .await
    }

    pub async fn send_otp_email(
        &self,
        user: &User,
        code: &str,
        expires_minutes: i64,
    ) -> Result<bool, AppError> {
        self.send(
            &user.email,
            templates::otp(&self.app_name, user, code, expires_minutes),
        )
        .await
    }
}

/// Built-in message bodies.
mod templates {
    use veda_core::User;

    pub struct Rendered {
        pub subject: String,
        pub text: String,
        pub html: String,
    }

    fn escape_html(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }

    fn html_page(app_name: &str, body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><body style=\"font-family: sans-serif; line-height: 1.5;\">\
             <h2>{}</h2>{}<p style=\"color: #777; font-size: 12px;\">{}</p></body></html>",
            escape_html(app_name),
            body,
            escape_html(app_name)
        )
    }

    pub fn verification(app_name: &str, user: &User, url: &str) -> Rendered {
        let name = user.full_name();
        Rendered {
            subject: format!("Verify your email for {}", app_name),
            text: format!(
                "Hello {},\n\nPlease confirm your email address by opening the link below:\n\n{}\n\n\
                 The link is valid for 24 hours. If you did not create an account, ignore this email.\n",
                name, url
            ),
            html: html_page(
                app_name,
                &format!(
                    "<p>Hello {},</p><p>Please confirm your email address:</p>\
                     <p><a href=\"{url}\">{url}</a></p>\
                     <p>The link is valid for 24 hours. If you did not create an account, ignore this email.</p>",
                    escape_html(&name),
                    url = escape_html(url)
                ),
            ),
        }
    }

    pub fn password_reset(
        app_name: &str,
        user: &User,
        url: &str,
        client_ip: Option<&str>,
    ) -> Rendered {
        let name = user.full_name();
        let origin = client_ip
            .map(|ip| format!(" The request came from {}.", ip))
            .unwrap_or_default();
        Rendered {
            subject: format!("Password reset request for {}", app_name),
            text: format!(
                "Hello {},\n\nA password reset was requested for your account.{}\n\n\
                 Reset your password here (valid for 1 hour):\n\n{}\n\n\
                 If you did not request this, you can ignore this email.\n",
                name, origin, url
            ),
            html: html_page(
                app_name,
                &format!(
                    "<p>Hello {},</p><p>A password reset was requested for your account.{}</p>\
                     <p><a href=\"{url}\">Reset your password</a> (valid for 1 hour)</p>\
                     <p>If you did not request this, you can ignore this email.</p>",
                    escape_html(&name),
                    escape_html(&origin),
                    url = escape_html(url)
                ),
            ),
        }
    }

    pub fn welcome(app_name: &str, app_url: &str, user: &User, password: Option<&str>) -> Rendered {
        let name = user.full_name();
        let credentials = match password {
            Some(password) => format!(
                "Username: {}\nTemporary password: {}\nPlease change it after your first login.",
                user.username, password
            ),
            None => format!("Username: {}", user.username),
        };
        Rendered {
            subject: format!("Welcome to {}!", app_name),
            text: format!(
                "Hello {},\n\nAn account has been created for you at {}.\n\n{}\n\nSign in at {}\n",
                name, app_name, credentials, app_url
            ),
            html: html_page(
                app_name,
                &format!(
                    "<p>Hello {},</p><p>An account has been created for you at {}.</p>\
                     <pre>{}</pre><p><a href=\"{url}\">Sign in</a></p>",
                    escape_html(&name),
                    escape_html(app_name),
                    escape_html(&credentials),
                    url = escape_html(app_url)
                ),
            ),
        }
    }

    pub fn otp(app_name: &str, user: &User, code: &str, expires_minutes: i64) -> Rendered {
        let name = user.full_name();
        Rendered {
            subject: format!("Your {} login code", app_name),
            text: format!(
                "Hello {},\n\nYour one-time login code is {}.\nIt expires in {} minutes.\n",
                name, code, expires_minutes
            ),
            html: html_page(
                app_name,
                &format!(
                    "<p>Hello {},</p><p>Your one-time login code is</p>\
                     <p style=\"font-size: 24px; letter-spacing: 4px;\"><strong>{}</strong></p>\
                     <p>It expires in {} minutes.</p>",
                    escape_html(&name),
                    escape_html(code),
                    expires_minutes
                ),
            ),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_service_does_not_send() {
        let service = EmailService::disabled("Archive", "http://localhost:8000");
        assert!(!service.is_configured());

        let now = chrono::Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "x@example.org".to_string(),
            username: "x_user".to_string(),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash: String::new(),
            otp_secret: None,
            otp_expires_at: None,
            role: veda_core::UserRole::Viewer,
            status: veda_core::UserStatus::Active,
            email_verified: true,
            last_login: None,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        };
        assert!(!service.send_otp_email(&user, "000000", 15).await.unwrap());
    }
}
