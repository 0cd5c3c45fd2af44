//! Remote repository addresses.
//!
//! Canonical normalization: trim whitespace, drop trailing `/`, drop one
//! trailing `.git`, then take the last two segments separated by `/` (or the
//! `:` of an scp-style address) as `owner` and `repo`. The project name is
//! `<owner>_<repo>`, case preserved.
//!
//! ```text
//! https://github.com/acme/widget        -> acme_widget
//! https://github.com/acme/widget.git/   -> acme_widget
//! git@github.com:acme/widget.git        -> acme_widget
//! acme/widget                           -> acme_widget
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::types::ProjectName;

/// Separator between owner and repo in a derived [`ProjectName`].
pub const NAME_SEPARATOR: char = '_';

/// A parsed remote repository address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAddress {
    raw: String,
    owner: String,
    repo: String,
}

impl RepoAddress {
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::Invalid {
            address: address.to_string(),
        };

        let raw = address.trim();
        let trimmed = raw.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let mut segments = trimmed.rsplit(['/', ':']);
        let repo = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let owner = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

        Ok(Self {
            raw: raw.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// The address as given, trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `<owner>_<repo>`.
    pub fn project_name(&self) -> ProjectName {
        ProjectName(format!("{}{NAME_SEPARATOR}{}", self.owner, self.repo))
    }

    /// `<api_base>/repos/<owner>/<repo>`.
    pub fn api_address(&self, api_base: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Address handed to the VCS mirror. Bare `owner/repo` slugs are expanded
    /// to a GitHub HTTPS URL; anything else is used as given.
    pub fn clone_address(&self) -> String {
        if self.raw.contains("://") || self.raw.contains('@') {
            self.raw.clone()
        } else {
            format!("https://github.com/{}/{}.git", self.owner, self.repo)
        }
    }
}

impl FromStr for RepoAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
