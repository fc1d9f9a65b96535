use std::{fs, io, path::Path};

use reqwest::{Certificate, Client};
use url::Url;

use super::forms::{extract_form, FormMethod, HtmlForm};
use super::ScrapeError;
use crate::config::{Credentials, PortalConfig};

const LOGIN_FORM: &str = "aspnetForm";
// The usage page answers with a script-submitted form that hands the
// session over to the usage site.
const HANDOFF_FORM: &str = "form";

/// A cookie-carrying session against the portal.
pub struct PortalClient {
    client: Client,
    login_url: Url,
    usage_url: Url,
    data_url: Url,
}

/// Result of submitting a form.
#[derive(Debug)]
pub struct FormResponse {
    pub url: Url,
    pub redirected: bool,
    pub body: String,
}

impl PortalClient {
    pub fn new(cfg: &PortalConfig) -> Result<Self, ScrapeError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(cfg.user_agent.clone());

        if let Some(path) = &cfg.ca_bundle {
            for cert in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self {
            client: builder.build()?,
            login_url: parse_url(&cfg.login_url)?,
            usage_url: parse_url(&cfg.usage_url)?,
            data_url: parse_url(&cfg.data_url)?,
        })
    }

    /// Log in, hand the session to the usage site, and download the export.
    pub async fn fetch_usage_export(&self, creds: &Credentials) -> Result<String, ScrapeError> {
        let (page_url, html) = self.get(&self.login_url).await?;
        let login = extract_form(&html, &page_url, LOGIN_FORM)?.with_credentials(&creds.username, &creds.password)?;

        tracing::info!(user = %creds.username, action = %login.action, "submitting portal login");
        let res = self.submit_form(&login).await?;
        if !res.redirected {
            return Err(ScrapeError::LoginRejected);
        }

        let (page_url, html) = self.get(&self.usage_url).await?;
        let handoff = extract_form(&html, &page_url, HANDOFF_FORM)?;
        tracing::debug!(action = %handoff.action, "submitting usage session handoff");
        let res = self.submit_form(&handoff).await?;
        if !res.redirected {
            return Err(ScrapeError::SessionHandoff(handoff.action.to_string()));
        }

        let (_, body) = self.get(&self.data_url).await?;
        tracing::info!(bytes = body.len(), "downloaded usage export");
        Ok(body)
    }

    /// Submit a form, following redirects. `redirected` is false when the
    /// final URL is the one the form was submitted to.
    pub async fn submit_form(&self, form: &HtmlForm) -> Result<FormResponse, ScrapeError> {
        let (request_url, request) = match form.method {
            FormMethod::Post => (form.action.clone(), self.client.post(form.action.clone()).form(&form.pairs())),
            FormMethod::Get => {
                let mut url = form.action.clone();
                url.query_pairs_mut().extend_pairs(form.pairs());
                (url.clone(), self.client.get(url))
            }
        };

        let res = request.send().await?;
        let url = res.url().clone();
        check_status(&res)?;
        let body = res.text().await?;

        Ok(FormResponse {
            redirected: url != request_url,
            url,
            body,
        })
    }

    async fn get(&self, url: &Url) -> Result<(Url, String), ScrapeError> {
        let res = self.client.get(url.clone()).send().await?;
        check_status(&res)?;
        let final_url = res.url().clone();
        Ok((final_url, res.text().await?))
    }
}

fn check_status(res: &reqwest::Response) -> Result<(), ScrapeError> {
    if res.status().is_success() {
        Ok(())
    } else {
        Err(ScrapeError::Status {
            status: res.status().as_u16(),
            url: res.url().to_string(),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ScrapeError> {
    Url::parse(raw).map_err(|e| ScrapeError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Every certificate of a PEM bundle. A missing file falls back to the
/// built-in roots; a malformed or empty bundle is an error.
pub fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, ScrapeError> {
    let ca_err = |reason: String| ScrapeError::CaBundle {
        path: path.display().to_string(),
        reason,
    };

    let pem = match fs::read(path) {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "CA bundle not found, using built-in roots only");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ca_err(e.to_string())),
    };

    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| ca_err(e.to_string()))?;
    if certs.is_empty() {
        return Err(ca_err("no certificates in bundle".to_string()));
    }
    tracing::debug!(path = %path.display(), count = certs.len(), "loaded CA bundle");
    Ok(certs)
}
