//! The remote object source contract.

use hubmirror_core::Record;

use crate::error::RemoteError;

/// Lazy, forward-only sequence of listed records.
///
/// Pages are fetched on demand; an error ends the sequence.
pub type Pages<'a> = Box<dyn Iterator<Item = Result<Record, RemoteError>> + 'a>;

/// Read access to the hosting API.
///
/// Addresses are absolute resource URLs, e.g.
/// `https://api.github.com/repos/acme/widget/issues`. Filters are raw
/// `key=value` query parameters.
pub trait RemoteSource {
    fn fetch_one(&self, address: &str) -> Result<Record, RemoteError>;

    /// Every record under a listing address. Each call starts from page one.
    fn fetch_many<'a>(&'a self, address: &str, filters: &[&str]) -> Pages<'a>;

    /// Number of records under a listing address, for progress sizing only.
    fn count_of(&self, address: &str, filters: &[&str]) -> Result<u64, RemoteError>;
}

/// Append query parameters to `address`.
pub fn with_query(address: &str, params: &[&str]) -> String {
    if params.is_empty() {
        return address.to_string();
    }
    let sep = if address.contains('?') { '&' } else { '?' };
    format!("{address}{sep}{}", params.join("&"))
}
