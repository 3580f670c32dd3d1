//! Shallow git clone with optional token or SSH-key auth.

use crate::{Credentials, SourceError};
use git2::{Cred, FetchOptions, RemoteCallbacks, build::RepoBuilder};
use std::path::Path;
use tracing::{info, warn};

pub(crate) fn shallow_clone(
    url: &str,
    branch: Option<&str>,
    credentials: Option<&Credentials>,
    target: &Path,
) -> Result<(), SourceError> {
    info!("source: cloning {} -> {}", url, target.display());

    let mut callbacks = RemoteCallbacks::new();
    let creds = credentials.cloned();
    callbacks.credentials(move |_url, username_from_url, _allowed| {
        let user = creds
            .as_ref()
            .and_then(|c| c.username.as_deref())
            .or(username_from_url)
            .unwrap_or("git");
        if let Some(c) = &creds {
            if let Some(token) = &c.token {
                return Cred::userpass_plaintext(user, token);
            }
            if let Some(key) = &c.ssh_key_path {
                return Cred::ssh_key(user, None, key, None);
            }
        }
        Cred::default()
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch.depth(1); // shallow: history is irrelevant to ingestion

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);
    if let Some(b) = branch {
        builder.branch(b);
    }

    match builder.clone(url, target) {
        Ok(_) => {
            info!("source: clone completed {}", target.display());
            Ok(())
        }
        Err(e) => {
            warn!("source: clone failed for {}: {}", url, e);
            // Auth and network failures surface as the task-fatal kind.
            Err(SourceError::Unavailable(format!("clone of {url} failed: {e}")))
        }
    }
}
