//! Trusted root certificates
//!
//! E-readers ship without a usable CA store, so HTTPS connections trust the
//! certificates found in a configured directory. Every file below the
//! directory is read and each PEM `CERTIFICATE` block becomes a root.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::{Client, ClientBuilder};
use reqwest::Certificate;

use super::{RemoteError, RemoteResult};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Extract every PEM certificate block from a file's text
///
/// Other block types (keys, CRLs) are skipped.
pub fn pem_certificate_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(PEM_BEGIN) {
        let from_start = &rest[start..];
        let Some(end) = from_start.find(PEM_END) else {
            break;
        };
        let block_end = end + PEM_END.len();
        blocks.push(&from_start[..block_end]);
        rest = &from_start[block_end..];
    }

    blocks
}

/// Load all certificates below `dir`
pub fn load_ca_certs(dir: &Path) -> RemoteResult<Vec<Certificate>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut certs = Vec::new();
    for path in files {
        let data = fs::read(&path).map_err(|source| RemoteError::Io {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&data);

        for block in pem_certificate_blocks(&text) {
            let cert =
                Certificate::from_pem(block.as_bytes()).map_err(|e| RemoteError::Certificate {
                    path: path.clone(),
                    details: e.to_string(),
                })?;
            certs.push(cert);
        }
    }

    tracing::debug!("loaded {} CA certificates from {:?}", certs.len(), dir);
    Ok(certs)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> RemoteResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| RemoteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| RemoteError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Build a blocking HTTP client, trusting `ca_cert_dir` when configured
pub fn build_client(ca_cert_dir: Option<&Path>) -> RemoteResult<Client> {
    let mut builder = ClientBuilder::new().user_agent(concat!(
        "kobosync/",
        env!("CARGO_PKG_VERSION")
    ));

    if let Some(dir) = ca_cert_dir {
        for cert in load_ca_certs(dir)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    Ok(builder.build()?)
}
