//! # HTML Views
//!
//! Server-rendered pages. Every piece of user- or storage-provided text goes
//! through [`escape_html`] before it is interpolated.

use std::fmt::Write;

use crate::dashboard::SummaryOutcome;
use crate::identity::{SignUpForm, SIGN_UP_FIELDS};
use crate::models::{FileEntry, UserRecord};
use crate::utils::{escape_html, human_size};

/// Outcome messages shown on the dashboard after a redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    UploadSucceeded,
    UploadFailed,
    NoFileSelected,
    FileTooLarge,
    Deleted,
    DeleteFailed,
    ViewFailed,
    ListFailed,
}

impl Notice {
    pub fn code(self) -> &'static str {
        match self {
            Notice::UploadSucceeded => "upload-succeeded",
            Notice::UploadFailed => "upload-failed",
            Notice::NoFileSelected => "no-file",
            Notice::FileTooLarge => "too-large",
            Notice::Deleted => "deleted",
            Notice::DeleteFailed => "delete-failed",
            Notice::ViewFailed => "view-failed",
            Notice::ListFailed => "list-failed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Notice::UploadSucceeded,
            Notice::UploadFailed,
            Notice::NoFileSelected,
            Notice::FileTooLarge,
            Notice::Deleted,
            Notice::DeleteFailed,
            Notice::ViewFailed,
            Notice::ListFailed,
        ]
        .into_iter()
        .find(|notice| notice.code() == code)
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::UploadSucceeded => "Success!",
            Notice::UploadFailed => "Upload Failed.",
            Notice::NoFileSelected => "Choose a file to upload first.",
            Notice::FileTooLarge => "Upload Failed. The file is too large.",
            Notice::Deleted => "File deleted.",
            Notice::DeleteFailed => "Failed to delete file.",
            Notice::ViewFailed => "Could not generate download link.",
            Notice::ListFailed => "Could not load your files. Please refresh the page.",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, Notice::UploadSucceeded | Notice::Deleted)
    }
}

const STYLE: &str = "body{margin:0;font-family:Arial,sans-serif;background:#f8f9fa;color:#333}\
.center{display:flex;flex-direction:column;justify-content:center;align-items:center;min-height:100vh;position:relative}\
.card{border:1px solid #ccc;padding:20px;border-radius:8px;background:#fff;margin-bottom:30px}\
.overlay{position:absolute;z-index:10;background:#f8f9fa;padding:20px}\
.btn{padding:8px 16px;border:none;border-radius:4px;color:#fff;cursor:pointer;text-decoration:none;display:inline-block}\
.btn:disabled{background:#ccc;cursor:not-allowed}\
.red{background:#d32f2f}.green{background:#2e7d32}.blue{background:#0288d1}.purple{background:#7b1fa2}.google{background:#4285f4}\
.row{display:flex;justify-content:space-between;align-items:center;padding:10px;background:#f9f9f9;border:1px solid #eee;border-radius:4px}\
.ok{color:green}.err{color:#d32f2f}label{display:block;margin-top:10px}input{padding:6px;width:100%;box-sizing:border-box}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape_html(title),
        STYLE,
        body
    )
}

fn message_line(class: &str, text: &str) -> String {
    format!("<p class=\"{}\">{}</p>", class, escape_html(text))
}

#[derive(Clone, Debug, Default)]
pub struct LoginPage<'a> {
    pub error: Option<&'a str>,
    pub info: Option<&'a str>,
    /// `(provider name, href)` for each social sign-in button.
    pub social_links: Vec<(String, String)>,
}

pub fn login_page(view: &LoginPage<'_>) -> String {
    let mut body = String::from("<div class=\"center\">");
    body.push_str(
        "<div style=\"margin-bottom:20px;text-align:center\">\
<h2>Welcome Back</h2><p>Please sign in or create an account</p></div>",
    );
    body.push_str("<div class=\"card\" style=\"min-width:320px\">");
    if let Some(error) = view.error {
        body.push_str(&message_line("err", error));
    }
    if let Some(info) = view.info {
        body.push_str(&message_line("ok", info));
    }
    for (provider, href) in &view.social_links {
        let _ = write!(
            body,
            "<p><a class=\"btn google\" href=\"{}\">Sign In with {}</a></p>",
            escape_html(href),
            escape_html(provider)
        );
    }
    body.push_str(
        "<form method=\"post\" action=\"/auth/sign-in\">\
<label>Username<input name=\"username\" autocomplete=\"username\" required></label>\
<label>Password<input type=\"password\" name=\"password\" autocomplete=\"current-password\" required></label>\
<p><button class=\"btn green\" type=\"submit\">Sign in</button></p></form>\
<p><a href=\"/auth/sign-up\">Create Account</a></p></div></div>",
    );
    page("Sign in", &body)
}

/// Body sent with the redirect that leaves the login route once the
/// visitor is signed in.
pub fn redirecting_page(to: &str) -> String {
    page(
        "Redirecting",
        &format!(
            "<div class=\"center\"><div class=\"overlay\"><h2>Redirecting...</h2>\
<p><a href=\"{}\">Continue</a></p></div></div>",
            escape_html(to)
        ),
    )
}

pub fn sign_up_page(form: &SignUpForm, error: Option<&str>) -> String {
    let mut body = String::from(
        "<div class=\"center\"><div class=\"card\" style=\"min-width:320px\"><h2>Create Account</h2>",
    );
    if let Some(error) = error {
        body.push_str(&message_line("err", error));
    }
    body.push_str("<form method=\"post\" action=\"/auth/sign-up\">");
    let mut fields = SIGN_UP_FIELDS;
    fields.sort_by_key(|field| field.order);
    for field in fields {
        // Passwords are never echoed back.
        let value = match field.name {
            "username" => form.username.as_str(),
            "name" => form.name.as_str(),
            "email" => form.email.as_str(),
            _ => "",
        };
        let _ = write!(
            body,
            "<label>{}<input type=\"{}\" name=\"{}\" placeholder=\"{}\" value=\"{}\"{}></label>",
            escape_html(field.label),
            field.input_type,
            field.name,
            escape_html(field.placeholder),
            escape_html(value),
            if field.required { " required" } else { "" }
        );
    }
    body.push_str(
        "<p><button class=\"btn green\" type=\"submit\">Create Account</button></p></form>\
<p><a href=\"/\">Back to sign in</a></p></div></div>",
    );
    page("Create Account", &body)
}

pub fn confirm_sign_up_page(username: &str, destination: Option<&str>, error: Option<&str>) -> String {
    let mut body = String::from(
        "<div class=\"center\"><div class=\"card\" style=\"min-width:320px\"><h2>Confirm Sign Up</h2>",
    );
    if let Some(error) = error {
        body.push_str(&message_line("err", error));
    }
    if let Some(destination) = destination {
        body.push_str(&message_line(
            "ok",
            &format!("We sent a confirmation code to {}.", destination),
        ));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/auth/confirm\">\
<input type=\"hidden\" name=\"username\" value=\"{}\">\
<label>Confirmation Code<input name=\"code\" autocomplete=\"one-time-code\" required></label>\
<p><button class=\"btn green\" type=\"submit\">Confirm</button></p></form></div></div>",
        escape_html(username)
    );
    page("Confirm Sign Up", &body)
}

fn welcome_card(user: &UserRecord) -> String {
    let mut card = String::from(
        "<div style=\"background:#e3f2fd;padding:20px;border-radius:8px;margin-bottom:30px;\
display:flex;align-items:center;gap:20px\">",
    );
    if let Some(picture) = user.picture.as_deref().filter(|p| !p.is_empty()) {
        let _ = write!(
            card,
            "<img src=\"{}\" alt=\"Profile\" style=\"width:80px;height:80px;border-radius:50%\">",
            escape_html(picture)
        );
    }
    let _ = write!(
        card,
        "<div><h3>Welcome, {}</h3><p>User ID: {}</p></div></div>",
        escape_html(user.greeting_name()),
        escape_html(&user.username)
    );
    card
}

fn file_row(entry: &FileEntry) -> String {
    let key = escape_html(&entry.key);
    let modified = entry
        .last_modified
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();
    format!(
        "<div class=\"row\"><span style=\"font-weight:500\">{name}</span>\
<small style=\"color:#777\">{size} {modified}</small>\
<div style=\"display:flex;gap:10px\">\
<a class=\"btn blue\" target=\"_blank\" rel=\"noopener\" href=\"/dashboard/view?key={query}\">View</a>\
<a class=\"btn purple\" href=\"/dashboard/summary?key={query}\">Summary</a>\
<form method=\"post\" action=\"/dashboard/delete\" style=\"margin:0\" \
onsubmit=\"if (!confirm('Are you sure you want to delete this file?')) return false; this.confirmed.value = 'yes';\">\
<input type=\"hidden\" name=\"key\" value=\"{key}\"><input type=\"hidden\" name=\"confirmed\" value=\"\">\
<button class=\"btn red\" type=\"submit\">Delete</button></form></div></div>",
        name = escape_html(&entry.name),
        size = human_size(entry.size),
        modified = modified,
        query = escape_html(&encode_query_value(&entry.key)),
        key = key,
    )
}

pub fn dashboard_page(user: &UserRecord, files: Option<&[FileEntry]>, notice: Option<Notice>) -> String {
    let mut body = String::from(
        "<div style=\"padding:40px\"><nav style=\"display:flex;justify-content:space-between;margin-bottom:40px\">\
<h2>Dashboard</h2><form method=\"post\" action=\"/auth/sign-out\">\
<button class=\"btn red\" type=\"submit\">Sign Out</button></form></nav>\
<main style=\"max-width:800px;margin:0 auto\">",
    );
    body.push_str(&welcome_card(user));

    body.push_str(
        "<div class=\"card\"><h3>Upload New File</h3>\
<form method=\"post\" action=\"/dashboard/upload\" enctype=\"multipart/form-data\" \
style=\"display:flex;gap:10px;align-items:center\">\
<input type=\"file\" name=\"file\" style=\"width:auto\" \
onchange=\"document.getElementById('upload').disabled = !this.files.length\">\
<button id=\"upload\" class=\"btn green\" type=\"submit\" disabled>Upload</button></form>",
    );
    if let Some(notice) = notice {
        body.push_str(&message_line(if notice.is_error() { "err" } else { "ok" }, notice.message()));
    }
    body.push_str("</div>");

    body.push_str("<div class=\"card\"><h3>Your Files</h3><div style=\"display:flex;flex-direction:column;gap:10px\">");
    match files {
        None => body.push_str(&message_line("err", Notice::ListFailed.message())),
        Some([]) => body.push_str("<p style=\"color:#777\">No files found.</p>"),
        Some(files) => {
            for entry in files {
                body.push_str(&file_row(entry));
            }
        }
    }
    body.push_str("</div></div></main></div>");

    page("Dashboard", &body)
}

pub fn delete_confirmation_page(entry_name: &str, key: &str) -> String {
    page(
        "Delete file",
        &format!(
            "<div class=\"center\"><div class=\"card\"><h3>Are you sure you want to delete this file?</h3>\
<p>{}</p><form method=\"post\" action=\"/dashboard/delete\">\
<input type=\"hidden\" name=\"key\" value=\"{}\"><input type=\"hidden\" name=\"confirmed\" value=\"yes\">\
<button class=\"btn red\" type=\"submit\">Delete</button> <a href=\"/dashboard\">Cancel</a></form></div></div>",
            escape_html(entry_name),
            escape_html(key)
        ),
    )
}

/// What the summary page shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SummaryView {
    Outcome(SummaryOutcome),
    /// The summary could not be fetched at all.
    Missing,
}

pub fn summary_page(file_name: &str, view: &SummaryView) -> String {
    let content = match view {
        SummaryView::Outcome(SummaryOutcome::Ready(text)) => format!(
            "<h3>AI SUMMARY</h3><pre style=\"white-space:pre-wrap\">{}</pre>",
            escape_html(text)
        ),
        SummaryView::Outcome(SummaryOutcome::Pending) => message_line(
            "err",
            "Summary is currently being generated. Please wait 10-20 seconds and try again.",
        ),
        SummaryView::Missing => message_line(
            "err",
            "No summary found. Ensure the file has been processed.",
        ),
    };
    page(
        "Summary",
        &format!(
            "<div style=\"padding:40px\"><main style=\"max-width:800px;margin:0 auto\">\
<div class=\"card\"><h2>{}</h2>{}<p><a href=\"/dashboard\">Back to dashboard</a></p></div></main></div>",
            escape_html(file_name),
            content
        ),
    )
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            key: format!("alice/{}", name),
            name: name.to_string(),
            last_modified: None,
            size: 10,
        }
    }

    #[test]
    fn notices_round_trip_through_their_codes() {
        for notice in [Notice::UploadSucceeded, Notice::DeleteFailed, Notice::ViewFailed] {
            assert_eq!(Notice::from_code(notice.code()), Some(notice));
        }
        assert_eq!(Notice::from_code("nonsense"), None);
        assert_eq!(Notice::UploadSucceeded.message(), "Success!");
        assert!(!Notice::UploadSucceeded.is_error());
    }

    #[test]
    fn empty_dashboard_says_no_files_found() {
        let html = dashboard_page(&UserRecord::new("alice"), Some(&[][..]), None);
        assert!(html.contains("No files found."));
        assert!(html.contains("Welcome, alice"));
        assert!(html.contains("User ID: alice"));
    }

    #[test]
    fn dashboard_escapes_names_and_encodes_links() {
        let files = vec![entry("<b>x</b> & y.txt")];
        let html = dashboard_page(&UserRecord::new("alice"), Some(files.as_slice()), Some(Notice::UploadSucceeded));

        assert!(html.contains("&lt;b&gt;x&lt;/b&gt; &amp; y.txt"));
        assert!(!html.contains("<b>x</b>"));
        assert!(html.contains("/dashboard/view?key=alice%2F%3Cb%3Ex%3C%2Fb%3E+%26+y.txt"));
        assert!(html.contains("Success!"));
    }

    #[test]
    fn profile_picture_is_shown_when_present() {
        let mut user = UserRecord::new("alice");
        user.picture = Some("https://example.com/a.png".to_string());
        user.display_name = Some("Alice".to_string());
        let html = dashboard_page(&user, Some(&[][..]), None);
        assert!(html.contains("<img src=\"https://example.com/a.png\""));
        assert!(html.contains("Welcome, Alice"));
    }

    #[test]
    fn list_failure_is_reported_instead_of_an_empty_list() {
        let html = dashboard_page(&UserRecord::new("alice"), None, None);
        assert!(html.contains(Notice::ListFailed.message()));
        assert!(!html.contains("No files found."));
    }

    #[test]
    fn login_form_and_redirecting_overlay_are_separate_pages() {
        let form = login_page(&LoginPage {
            social_links: vec![("Google".to_string(), "/auth/google".to_string())],
            ..LoginPage::default()
        });
        assert!(form.contains("Welcome Back"));
        assert!(form.contains("Sign In with Google"));
        assert!(!form.contains("Redirecting..."));

        let overlay = redirecting_page("/dashboard");
        assert!(overlay.contains("Redirecting..."));
        assert!(overlay.contains("href=\"/dashboard\""));
        assert!(!overlay.contains("Welcome Back"));
    }

    #[test]
    fn sign_up_form_renders_fields_in_order_without_passwords() {
        let form = SignUpForm {
            username: "alice".to_string(),
            password: "secret-pass".to_string(),
            confirm_password: "secret-pass".to_string(),
            ..SignUpForm::default()
        };
        let html = sign_up_page(&form, Some("Name is required"));

        let positions: Vec<usize> = ["\"username\"", "\"name\"", "\"email\"", "\"password\"", "\"confirm_password\""]
            .iter()
            .map(|name| html.find(&format!("name={}", name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(html.contains("placeholder=\"Enter full name\""));
        assert!(!html.contains("secret-pass"));
        assert!(html.contains("Name is required"));
    }

    #[test]
    fn summary_page_variants() {
        let ready = summary_page(
            "report.pdf",
            &SummaryView::Outcome(SummaryOutcome::Ready("<ok>".to_string())),
        );
        assert!(ready.contains("AI SUMMARY"));
        assert!(ready.contains("&lt;ok&gt;"));

        let pending = summary_page("report.pdf", &SummaryView::Outcome(SummaryOutcome::Pending));
        assert!(pending.contains("currently being generated"));

        let missing = summary_page("report.pdf", &SummaryView::Missing);
        assert!(missing.contains("No summary found"));
    }
}
