use dom_query::{Document, Selection};
use url::Url;

use super::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
    /// Lower-cased `type` attribute; inputs without one are text inputs.
    pub kind: String,
}

/// A form scraped from a page, ready to be submitted as-is.
#[derive(Debug, Clone)]
pub struct HtmlForm {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<FormField>,
}

/// Extract the single `<form name="...">` on the page.
///
/// `action` is made absolute against `page_url`; a missing action submits
/// back to the page itself.
pub fn extract_form(html: &str, page_url: &Url, form_name: &str) -> Result<HtmlForm, ScrapeError> {
    let doc = Document::from(html);
    let forms = doc.select(&format!(r#"form[name="{form_name}"]"#));

    let count = forms.nodes().len();
    if count != 1 {
        return Err(ScrapeError::UnexpectedMarkup(format!(
            "expected exactly one form named '{form_name}' at {page_url}, found {count}"
        )));
    }
    let form = Selection::from(forms.nodes()[0]);

    let action = match attr(&form, "action") {
        Some(a) if !a.trim().is_empty() => page_url.join(a.trim()).map_err(|e| {
            ScrapeError::UnexpectedMarkup(format!("invalid form action '{a}': {e}"))
        })?,
        _ => page_url.clone(),
    };

    let method = match attr(&form, "method") {
        Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
        _ => FormMethod::Get,
    };

    let fields = form
        .select("input")
        .nodes()
        .iter()
        .filter_map(|node| {
            let input = Selection::from(*node);
            let name = attr(&input, "name").filter(|n| !n.is_empty())?;
            Some(FormField {
                name,
                value: attr(&input, "value").unwrap_or_default(),
                kind: attr(&input, "type")
                    .map(|t| t.to_ascii_lowercase())
                    .unwrap_or_else(|| "text".to_string()),
            })
        })
        .collect();

    Ok(HtmlForm {
        action,
        method,
        fields,
    })
}

fn attr(sel: &Selection, name: &str) -> Option<String> {
    sel.attr(name).map(|s| s.to_string())
}

impl HtmlForm {
    /// Names of the username and password inputs of a login form.
    ///
    /// Requires exactly one text and one password input, plus the hidden
    /// state fields ASP.NET forms carry.
    pub fn login_fields(&self) -> Result<(&str, &str), ScrapeError> {
        let of_kind = |kind: &str| -> Vec<&str> {
            self.fields
                .iter()
                .filter(|f| f.kind == kind)
                .map(|f| f.name.as_str())
                .collect()
        };

        let texts = of_kind("text");
        let passwords = of_kind("password");

        match (texts.as_slice(), passwords.as_slice()) {
            ([user], [pass]) if self.fields.len() > 2 => Ok((*user, *pass)),
            (users, passes) => Err(ScrapeError::UnexpectedMarkup(format!(
                "unexpected login form at {}: {} text, {} password, {} total fields",
                self.action,
                users.len(),
                passes.len(),
                self.fields.len()
            ))),
        }
    }

    /// Copy of the form with the credentials filled in.
    pub fn with_credentials(&self, username: &str, password: &str) -> Result<HtmlForm, ScrapeError> {
        let (user_field, pass_field) = self.login_fields()?;
        let (user_field, pass_field) = (user_field.to_string(), pass_field.to_string());

        let mut filled = self.clone();
        for f in &mut filled.fields {
            if f.name == user_field {
                f.value = username.to_string();
            } else if f.name == pass_field {
                f.value = password.to_string();
            }
        }
        Ok(filled)
    }

    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect()
    }

    #[cfg(test)]
    fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><body>
        <form name="aspnetForm" method="post" action="./login.aspx?ReturnUrl=%2f">
          <input type="hidden" name="__VIEWSTATE" value="abc123" />
          <input type="hidden" name="__EVENTVALIDATION" value="def456" />
          <input type="text" name="ctl00$Main$UserName" />
          <input type="password" name="ctl00$Main$Password" />
          <input type="submit" name="ctl00$Main$Login" value="Log In" />
        </form>
        </body></html>
    "#;

    fn page_url() -> Url {
        Url::parse("https://css.example.com/selfserve/pages/login.aspx").unwrap()
    }

    #[test]
    fn extracts_named_form_with_absolute_action() {
        let form = extract_form(LOGIN_PAGE, &page_url(), "aspnetForm").unwrap();
        assert_eq!(
            form.action.as_str(),
            "https://css.example.com/selfserve/pages/login.aspx?ReturnUrl=%2f"
        );
        assert_eq!(form.method, FormMethod::Post);
        assert_eq!(form.fields.len(), 5);
        assert_eq!(form.value("__VIEWSTATE"), Some("abc123"));
        assert_eq!(form.value("ctl00$Main$UserName"), Some(""));
    }

    #[test]
    fn missing_form_is_unexpected_markup() {
        let err = extract_form("<html><body>Maintenance</body></html>", &page_url(), "aspnetForm").unwrap_err();
        assert!(matches!(err, ScrapeError::UnexpectedMarkup(_)));
    }

    #[test]
    fn duplicate_forms_are_unexpected_markup() {
        let html = r#"<form name="form"></form><form name="form"></form>"#;
        let err = extract_form(html, &page_url(), "form").unwrap_err();
        assert!(matches!(err, ScrapeError::UnexpectedMarkup(_)));
    }

    #[test]
    fn form_without_action_or_method_defaults() {
        let html = r#"<form name="form"><input name="token" value="t" type="hidden"></form>"#;
        let form = extract_form(html, &page_url(), "form").unwrap();
        assert_eq!(form.action, page_url());
        assert_eq!(form.method, FormMethod::Get);
        assert_eq!(form.pairs(), vec![("token", "t")]);
    }

    #[test]
    fn fills_in_credentials() {
        let form = extract_form(LOGIN_PAGE, &page_url(), "aspnetForm").unwrap();
        let filled = form.with_credentials("alice", "s3cret").unwrap();
        assert_eq!(filled.value("ctl00$Main$UserName"), Some("alice"));
        assert_eq!(filled.value("ctl00$Main$Password"), Some("s3cret"));
        assert_eq!(filled.value("__EVENTVALIDATION"), Some("def456"));
    }

    #[test]
    fn login_form_without_password_is_rejected() {
        let html = r#"<form name="aspnetForm" method="post">
            <input type="hidden" name="a" value="1">
            <input type="text" name="user">
            <input type="text" name="other">
        </form>"#;
        let form = extract_form(html, &page_url(), "aspnetForm").unwrap();
        assert!(matches!(
            form.with_credentials("u", "p"),
            Err(ScrapeError::UnexpectedMarkup(_))
        ));
    }
}
