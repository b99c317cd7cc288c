//! WebDAV remote store
//!
//! Blocking client for a WebDAV share. Blob operations map to:
//!
//! | operation | request                                        |
//! |-----------|------------------------------------------------|
//! | read      | `GET`                                          |
//! | write     | `PUT`                                          |
//! | stat      | `PROPFIND` with `Depth: 0`                     |
//! | rename    | `MOVE` with `Destination` and `Overwrite`      |
//! | remove    | `DELETE` (404 counts as removed)               |
//!
//! Servers answer 409 Conflict when a parent collection is missing; `write`
//! and `rename` then create the parents with `MKCOL` and retry once.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use tracing::debug;

use super::{normalize_file, RemoteError, RemoteResult, RemoteStore};
use crate::config::Config;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
  </d:prop>
</d:propfind>
"#;

pub struct WebDavStore {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl WebDavStore {
    /// Create a store for `base_url` using an existing HTTP client
    pub fn new(
        client: Client,
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> RemoteResult<Self> {
        let mut parsed = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl {
            url: base_url.to_string(),
            details: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl {
                url: base_url.to_string(),
                details: "URL cannot be used as a base".to_string(),
            });
        }
        parsed.set_query(None);
        parsed.set_fragment(None);

        Ok(Self {
            client,
            base_url: parsed,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create a store from the `[webdav]` configuration
    pub fn from_config(config: &Config) -> RemoteResult<Self> {
        let client = super::tls::build_client(config.ca_cert_dir.as_deref())?;
        Self::new(
            client,
            &config.webdav.url,
            config.webdav.username.clone(),
            config.webdav.password.clone(),
        )
    }

    /// Absolute URL of a store path; `collection` adds a trailing slash
    pub fn url_for(&self, path: &str, collection: bool) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| RemoteError::InvalidUrl {
                url: self.base_url.to_string(),
                details: "URL cannot be used as a base".to_string(),
            })?;
            segments.pop_if_empty();
            for part in path.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
            if collection {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CACHE_CONTROL, "no-cache")
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Create every missing parent collection of `path`
    fn mkcol_parents(&self, path: &str) -> RemoteResult<()> {
        let path = normalize_file(path);
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let mut current = String::new();

        for part in parts.iter().take(parts.len().saturating_sub(1)) {
            current.push('/');
            current.push_str(part);

            let url = self.url_for(&current, true)?;
            debug!("MKCOL {}", current);
            let resp = self.request(dav_method("MKCOL")?, url).send()?;
            match resp.status().as_u16() {
                200 | 201 | 204 | 405 => {}
                _ => return Err(http_error("MKCOL", &current, resp)),
            }
        }
        Ok(())
    }

    fn put(&self, path: &str, bytes: &[u8]) -> RemoteResult<Response> {
        let url = self.url_for(path, false)?;
        Ok(self.request(Method::PUT, url).body(bytes.to_vec()).send()?)
    }

    fn send_move(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<Response> {
        let source = self.url_for(from, false)?;
        let destination = self.url_for(to, false)?;
        let destination = HeaderValue::from_str(destination.as_str())
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;

        Ok(self
            .request(dav_method("MOVE")?, source)
            .header("Destination", destination)
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()?)
    }
}

impl RemoteStore for WebDavStore {
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
        let url = self.url_for(path, false)?;
        debug!("GET {}", path);
        let resp = self.request(Method::GET, url).send()?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                path: normalize_file(path),
            });
        }
        if !resp.status().is_success() {
            return Err(http_error("GET", path, resp));
        }
        Ok(resp.bytes()?.to_vec())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
        debug!("PUT {} ({} bytes)", path, bytes.len());
        let mut resp = self.put(path, bytes)?;

        if resp.status() == StatusCode::CONFLICT {
            self.mkcol_parents(path)?;
            resp = self.put(path, bytes)?;
        }
        if !resp.status().is_success() {
            return Err(http_error("PUT", path, resp));
        }
        Ok(())
    }

    fn stat(&self, path: &str) -> RemoteResult<bool> {
        let url = self.url_for(path, false)?;
        debug!("PROPFIND {}", path);
        let resp = self
            .request(dav_method("PROPFIND")?, url)
            .header("Depth", "0")
            .header(CONTENT_TYPE, "application/xml")
            .body(PROPFIND_BODY)
            .send()?;

        match resp.status().as_u16() {
            404 => Ok(false),
            200 | 207 => Ok(true),
            _ => Err(http_error("PROPFIND", path, resp)),
        }
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
        debug!("MOVE {} -> {}", from, to);
        let mut resp = self.send_move(from, to, overwrite)?;

        if resp.status() == StatusCode::CONFLICT {
            self.mkcol_parents(to)?;
            resp = self.send_move(from, to, overwrite)?;
        }

        match resp.status().as_u16() {
            200 | 201 | 204 => Ok(()),
            404 => Err(RemoteError::NotFound {
                path: normalize_file(from),
            }),
            412 => Err(RemoteError::AlreadyExists {
                path: normalize_file(to),
            }),
            _ => Err(http_error("MOVE", from, resp)),
        }
    }

    fn remove(&self, path: &str) -> RemoteResult<()> {
        let url = self.url_for(path, false)?;
        debug!("DELETE {}", path);
        let resp = self.request(Method::DELETE, url).send()?;

        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(http_error("DELETE", path, resp))
    }

    fn describe(&self) -> String {
        let mut url = self.base_url.clone();
        let _ = url.set_password(None);
        format!("webdav:{}", url)
    }
}

fn dav_method(name: &str) -> RemoteResult<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|e| RemoteError::Protocol(e.to_string()))
}

fn http_error(method: &str, path: &str, resp: Response) -> RemoteError {
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    RemoteError::Http {
        method: method.to_string(),
        path: normalize_file(path),
        status,
        body: body.trim().to_string(),
    }
}
