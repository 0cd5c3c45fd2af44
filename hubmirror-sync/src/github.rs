//! Blocking GitHub REST client.

use std::collections::VecDeque;
use std::io::Read;
use std::time::Duration;

use hubmirror_core::Record;
use serde_json::Value;

use crate::error::RemoteError;
use crate::remote::{with_query, Pages, RemoteSource};

const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = "hubmirror";
const PAGE_SIZE: &str = "per_page=100";

/// [`RemoteSource`] backed by the GitHub REST API.
pub struct GithubClient {
    agent: ureq::Agent,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response, RemoteError> {
        tracing::debug!("GET {url}");
        let mut request = self.agent.get(url).set("Accept", ACCEPT);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("token {token}"));
        }
        request.call().map_err(|err| map_error(url, err))
    }

    /// One page of a listing plus the address of the next page, if any.
    fn get_page(&self, url: &str) -> Result<(Vec<Record>, Option<String>), RemoteError> {
        let response = self.get(url)?;
        let next = response.header("Link").and_then(|h| link_for(h, "next"));
        Ok((read_array(url, response)?, next))
    }
}

impl RemoteSource for GithubClient {
    fn fetch_one(&self, address: &str) -> Result<Record, RemoteError> {
        let response = self.get(address)?;
        read_json(address, response)
    }

    fn fetch_many<'a>(&'a self, address: &str, filters: &[&str]) -> Pages<'a> {
        let mut params = filters.to_vec();
        params.push(PAGE_SIZE);
        Box::new(GithubPages {
            client: self,
            next: Some(with_query(address, &params)),
            buffer: VecDeque::new(),
        })
    }

    fn count_of(&self, address: &str, filters: &[&str]) -> Result<u64, RemoteError> {
        let mut params = filters.to_vec();
        params.push("per_page=1");
        let url = with_query(address, &params);
        let response = self.get(&url)?;
        let last = response
            .header("Link")
            .and_then(|h| link_for(h, "last"))
            .and_then(|link| page_param(&link));
        if let Some(pages) = last {
            return Ok(pages);
        }
        Ok(read_array(&url, response)?.len() as u64)
    }
}

/// Iterator over a paginated listing. The next page is requested only once
/// the buffered one is drained.
struct GithubPages<'a> {
    client: &'a GithubClient,
    next: Option<String>,
    buffer: VecDeque<Record>,
}

impl Iterator for GithubPages<'_> {
    type Item = Result<Record, RemoteError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            let url = self.next.take()?;
            match self.client.get_page(&url) {
                Ok((items, next)) => {
                    self.buffer = items.into();
                    self.next = next;
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn map_error(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(404, _) => RemoteError::NotFound {
            address: url.to_string(),
        },
        ureq::Error::Status(code, response) => RemoteError::Unavailable {
            address: url.to_string(),
            reason: format!("HTTP {code} {}", response.status_text()),
        },
        ureq::Error::Transport(transport) => RemoteError::Unavailable {
            address: url.to_string(),
            reason: transport.to_string(),
        },
    }
}

fn read_json(url: &str, response: ureq::Response) -> Result<Value, RemoteError> {
    response.into_json().map_err(|err| RemoteError::Decode {
        address: url.to_string(),
        reason: err.to_string(),
    })
}

/// Body of a listing. `204 No Content` and an empty body (GitHub's answer
/// for some listings of an empty repository) read as no records.
fn read_array(url: &str, response: ureq::Response) -> Result<Vec<Record>, RemoteError> {
    let decode = |reason: String| RemoteError::Decode {
        address: url.to_string(),
        reason,
    };
    if response.status() == 204 {
        return Ok(Vec::new());
    }
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|err| decode(err.to_string()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice(&body).map_err(|err| decode(err.to_string()))? {
        Value::Array(items) => Ok(items),
        other => Err(decode(format!("expected a JSON array, got {}", kind_of(&other)))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// URL of the `rel` entry in an RFC 8288 `Link` header.
pub(crate) fn link_for(header: &str, rel: &str) -> Option<String> {
    let wanted = format!("rel=\"{rel}\"");
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let url = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        parts
            .any(|p| p.trim() == wanted)
            .then(|| url.to_string())
    })
}

/// Value of the `page` query parameter.
pub(crate) fn page_param(url: &str) -> Option<u64> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page=")?.parse().ok())
}
