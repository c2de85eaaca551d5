use anyhow::{Context, Result};
use std::fs::File;
use std::io::{stdin, BufReader};
use std::path::Path;

use clabot::committers::Credential;
use clabot::gitlab;

use crate::args::GlobalArgs;

/// Get a buffered reader for the file at the specified input source, or stdin if not specified or
/// if specified as `-`.
pub fn get_reader_for_file_or_stdin<P: AsRef<Path>>(
    path: Option<P>,
) -> std::io::Result<Box<dyn std::io::Read>> {
    match path.as_ref() {
        Some(p) if p.as_ref() != Path::new("-") => {
            let f = File::open(p)?;
            Ok(Box::new(BufReader::new(f)))
        }
        _ => Ok(Box::new(BufReader::new(stdin()))),
    }
}

/// Create a GitLab client according to the global arguments, along with the credential to hand to
/// the committer pipeline.
///
/// The access token comes from `GITLAB_ACCESS_TOKEN`; without it, the credential is empty and
/// unauthenticated access is used.
pub fn gitlab_client(global_args: &GlobalArgs) -> Result<(gitlab::Client, Credential)> {
    let client = gitlab::ClientBuilder::new()
        .base_url(global_args.gitlab_api.gitlab_url.clone())
        .and_then(|b| b.private_token_from_env())
        .and_then(|b| b.ignore_certs(global_args.gitlab_api.ignore_certs).build())
        .context("Failed to initialize GitLab client")?;
    let credential = client.credential();
    Ok((client, credential))
}

/// Create the single-threaded async runtime the commands run on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")
}
