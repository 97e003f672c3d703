//! Page payloads and the renderer contract.

use anyhow::Result;
use serde::Serialize;

pub const LOGIN_VIEW: &str = "login";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Danger,
}

impl MessageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Danger => "danger",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMessage {
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageSession {
    pub service: String,
    pub username: String,
}

/// Everything a view needs to draw the login page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginPage {
    pub site: String,
    pub session: PageSession,
    pub message: Option<PageMessage>,
    pub show_form: bool,
    pub login_ticket: String,
}

/// Turns a named view and its payload into a response body.
pub trait Renderer: Send + Sync {
    /// # Errors
    /// Returns an error if the view is unknown or cannot be rendered.
    fn render(&self, view: &str, page: &LoginPage) -> Result<String>;
}

/// Minimal built-in HTML views.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, view: &str, page: &LoginPage) -> Result<String> {
        if view != LOGIN_VIEW {
            anyhow::bail!("unknown view: {view}");
        }

        let mut body = String::new();

        if let Some(message) = &page.message {
            body.push_str(&format!(
                "<div class=\"alert alert-{}\">{}</div>\n",
                message.kind.as_str(),
                escape(&message.text)
            ));
        }

        if !page.session.username.is_empty() {
            body.push_str(&format!(
                "<p class=\"signed-in\">Signed in as <strong>{}</strong>.</p>\n",
                escape(&page.session.username)
            ));
        }

        if page.show_form {
            body.push_str(&format!(
                concat!(
                    "<form method=\"post\" action=\"/login\">\n",
                    "<input type=\"hidden\" name=\"lt\" value=\"{lt}\">\n",
                    "<input type=\"hidden\" name=\"service\" value=\"{service}\">\n",
                    "<label>Username <input type=\"text\" name=\"username\" autofocus></label>\n",
                    "<label>Password <input type=\"password\" name=\"password\"></label>\n",
                    "<button type=\"submit\">Sign in</button>\n",
                    "</form>\n"
                ),
                lt = escape(&page.login_ticket),
                service = escape(&page.session.service),
            ));
        }

        Ok(format!(
            concat!(
                "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
                "<title>{site}</title>\n</head>\n<body>\n<h1>{site}</h1>\n{body}</body>\n</html>\n"
            ),
            site = escape(&page.site),
            body = body,
        ))
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
