//! HTML templates for the launch page.
//!
//! Server-rendered pages, one per [`LaunchView`]. Every dynamic value goes
//! through [`html_escape`].

use octofhir_launch::{ErrorCategory, LaunchView};

/// Page title shown on every render.
pub const PAGE_TITLE: &str = "SMART App Launch Helper";

const STYLES: &str = r#"
:root {
    --brand-primary: #3b3fe3;
    --surface-1: #0d0e1a;
    --surface-2: #141629;
    --text-primary: #f8f9fe;
    --text-secondary: #adb5bd;
    --radius-md: 6px;
    --radius-xl: 12px;
}

* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: "Inter", -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: radial-gradient(circle at top left, #1c1f40, #0d0e1a);
    min-height: 100vh;
    color: var(--text-primary);
    line-height: 1.5;
}

.container {
    max-width: 720px;
    margin: 0 auto;
    padding: 3rem 1rem;
}

h1 {
    font-size: 2rem;
    font-weight: 700;
    margin-bottom: 1.5rem;
}

h2 {
    font-size: 1.375rem;
    font-weight: 600;
    margin-bottom: 1rem;
}

.alert {
    padding: 0.75rem 1rem;
    border-radius: var(--radius-md);
    margin-bottom: 1rem;
    font-size: 0.9375rem;
}

.alert-success { background: rgba(64, 192, 87, 0.15); color: #69db7c; }
.alert-info { background: rgba(94, 133, 255, 0.15); color: #91a7ff; }
.alert-warning { background: rgba(250, 176, 5, 0.15); color: #ffd43b; }
.alert-error { background: rgba(255, 77, 61, 0.15); color: #ff6b6b; }

.label {
    color: var(--text-secondary);
    font-size: 0.875rem;
    margin: 0.75rem 0 0.25rem;
}

pre.code {
    background: var(--surface-2);
    border-radius: var(--radius-md);
    padding: 0.75rem 1rem;
    font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
    font-size: 0.875rem;
    white-space: pre-wrap;
    word-break: break-all;
}

.btn {
    display: inline-block;
    padding: 0.625rem 1rem;
    border-radius: var(--radius-md);
    font-size: 0.9375rem;
    font-weight: 500;
    text-decoration: none;
}

.btn-primary {
    background: var(--brand-primary);
    color: #fff;
}
"#;

/// Renders the page for a launch view.
pub fn render_view(view: &LaunchView) -> String {
    let mut content = String::with_capacity(2048);

    match view {
        LaunchView::Waiting => {
            push_alert(&mut content, "warning", "Waiting for EHR launch.");
        }
        LaunchView::ReadyToAuthorize { authorize_url } => {
            push_alert(&mut content, "success", "Launch parameters received!");
            push_alert(
                &mut content,
                "info",
                "Click the button below to authorize the application.",
            );
            content.push_str("<a class=\"btn btn-primary\" id=\"authorize\" href=\"");
            content.push_str(&html_escape(authorize_url.as_str()));
            content.push_str(
                "\" target=\"_blank\" rel=\"noopener noreferrer\">Login to EHR and Authorize App</a>\n",
            );
        }
        LaunchView::CallbackVerified { code } => {
            content.push_str("<h2>Authorization Callback Received</h2>\n");
            push_alert(&mut content, "success", "State verified successfully! \u{2705}");
            content.push_str("<div class=\"label\">Received Authorization Code:</div>\n");
            content.push_str("<pre class=\"code\" id=\"code\">");
            content.push_str(&html_escape(code));
            content.push_str("</pre>\n");
            push_alert(
                &mut content,
                "info",
                "The next step is to exchange this code for an access token.",
            );
        }
        LaunchView::CallbackRejected { expected, received } => {
            content.push_str("<h2>Authorization Callback Received</h2>\n");
            push_alert(
                &mut content,
                "error",
                "State mismatch! This could be a security risk. Please try launching the app again.",
            );
            content.push_str("<div class=\"label\">Expected state:</div>\n");
            content.push_str("<pre class=\"code\" id=\"expected-state\">");
            content.push_str(&html_escape(expected.as_deref().unwrap_or("(none)")));
            content.push_str("</pre>\n");
            content.push_str("<div class=\"label\">Received state:</div>\n");
            content.push_str("<pre class=\"code\" id=\"received-state\">");
            content.push_str(&html_escape(received));
            content.push_str("</pre>\n");
        }
        LaunchView::Failed { error } => {
            let message = match error.category() {
                ErrorCategory::Discovery | ErrorCategory::Protocol => {
                    "Could not fetch server configuration. Halting."
                }
                ErrorCategory::Input => "Launch parameters are invalid. Halting.",
                ErrorCategory::Security => {
                    "State mismatch! This could be a security risk. Please try launching the app again."
                }
                ErrorCategory::Internal => "Something went wrong. Halting.",
            };
            push_alert(&mut content, "error", message);
            content.push_str("<div class=\"label\">Details:</div>\n");
            content.push_str("<pre class=\"code\" id=\"error\">");
            content.push_str(&html_escape(&error.to_string()));
            content.push_str("</pre>\n");
        }
    }

    html_page(&content)
}

fn push_alert(content: &mut String, kind: &str, message: &str) {
    content.push_str("<div class=\"alert alert-");
    content.push_str(kind);
    content.push_str("\">");
    content.push_str(&html_escape(message));
    content.push_str("</div>\n");
}

fn html_page(content: &str) -> String {
    let mut html = String::with_capacity(content.len() + STYLES.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>SMART on FHIR Launch App</title>\n");
    html.push_str("<style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n<h1>");
    html.push_str(PAGE_TITLE);
    html.push_str("</h1>\n");
    html.push_str(content);
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Simple HTML escaping to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
