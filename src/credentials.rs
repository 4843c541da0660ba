// src/credentials.rs
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::error::{IngestError, Result};

pub const DEFAULT_PORT: u16 = 5432;

/// Where and as whom to connect. The password is looked up separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl ConnectTarget {
    /// `<scheme>://<user>:<password>@<host>/<database>`, percent-encoded. The
    /// port is only written when it is not the default.
    pub fn connection_url(&self, password: &str) -> std::result::Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}://{}/", self.scheme, self.host))?;
        url.set_path(&self.database);
        url.set_username(&self.user)
            .map_err(|_| url::ParseError::EmptyHost)?;
        url.set_password(Some(password))
            .map_err(|_| url::ParseError::EmptyHost)?;
        if self.port != DEFAULT_PORT {
            url.set_port(Some(self.port))
                .map_err(|_| url::ParseError::InvalidPort)?;
        }
        Ok(url)
    }
}

/// `--passfile`, else `$PGPASSFILE`, else `$HOME/.pgpass`.
pub fn resolve_passfile(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| std::env::var_os("PGPASSFILE").map(PathBuf::from))
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".pgpass")))
}

/// Split one `.pgpass` line on unescaped `:`, undoing `\:` and `\\`.
fn split_entry(line: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(5);
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

/// First password in `contents` whose database and user match `target`
/// (`*` matches anything). The host and port columns are not consulted: one
/// entry serves a database whatever address it is reached through.
pub fn find_password(contents: &str, target: &ConnectTarget) -> Option<String> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(split_entry)
        .filter(|fields| fields.len() == 5)
        .find(|f| field_matches(&f[2], &target.database) && field_matches(&f[3], &target.user))
        .map(|mut f| f.swap_remove(4))
}

/// Look the password up in `passfile`. A missing file counts as no entry.
pub fn lookup_password(passfile: Option<&Path>, target: &ConnectTarget) -> Result<String> {
    let not_found = || IngestError::CredentialNotFound {
        host: target.host.clone(),
        port: target.port,
        database: target.database.clone(),
        user: target.user.clone(),
        passfile: passfile.map(Path::to_path_buf),
    };

    let Some(path) = passfile else {
        return Err(not_found());
    };
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no passfile");
            return Err(not_found());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read passfile");
            return Err(not_found());
        }
    };

    find_password(&contents, target).ok_or_else(not_found)
}
