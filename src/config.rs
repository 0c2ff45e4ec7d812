use crate::core::Headers;
use chrono::FixedOffset;
use std::time::Duration;

/// Header announcing the protocol version on every request.
pub const ODATA_VERSION_HEADER: &str = "OData-Version";

/// Default `Accept` header for `$metadata` requests.
pub const DEFAULT_METADATA_ACCEPT: &str = "application/json;odata.metadata=full";

/// Default `Content-Type` of each change operation inside a batch.
pub const DEFAULT_CHANGE_CONTENT_TYPE: &str = "application/json;IEEE754Compatible=true";

/// Adapter configuration
///
/// Built once per service endpoint and shared by every round-trip.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Service root, e.g. `http://localhost:55802/odata/`
    pub service_name: String,

    /// Headers sent with queries and batches
    pub headers: Headers,

    /// `Accept` header of the metadata request
    pub metadata_accept: String,

    /// `Content-Type` of each change operation
    pub change_content_type: String,

    /// Per-request timeout used by the bundled transport
    pub request_timeout: Duration,

    /// Local UTC offset for date rebasing; `None` means the host's offset
    /// in effect at each value's instant
    pub local_utc_offset: Option<FixedOffset>,
}

impl AdapterConfig {
    /// Create a configuration for one service root
    pub fn new(service_name: &str) -> Self {
        let mut headers = Headers::new();
        headers.insert(ODATA_VERSION_HEADER.to_string(), "4.0".to_string());
        Self {
            service_name: service_name.to_string(),
            headers,
            metadata_accept: DEFAULT_METADATA_ACCEPT.to_string(),
            change_content_type: DEFAULT_CHANGE_CONTENT_TYPE.to_string(),
            request_timeout: Duration::from_secs(30),
            local_utc_offset: None,
        }
    }

    /// Add or replace a default header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the metadata `Accept` header
    pub fn metadata_accept(mut self, accept: &str) -> Self {
        self.metadata_accept = accept.to_string();
        self
    }

    /// Set the change operation `Content-Type`
    pub fn change_content_type(mut self, content_type: &str) -> Self {
        self.change_content_type = content_type.to_string();
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Pin the local UTC offset instead of reading it from the host
    pub fn local_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.local_utc_offset = Some(offset);
        self
    }

    /// Join the service root and a relative path with exactly one `/`
    pub fn qualify_url(&self, path: &str) -> String {
        let root = self.service_name.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if root.is_empty() {
            return path.to_string();
        }
        format!("{}/{}", root, path)
    }

    /// Route prefix for batch target URIs
    ///
    /// The path portion of the service root without a leading `/` and with a
    /// trailing `/`:
    ///
    /// ```ignore
    /// 'http://localhost:55802/odata/'    -> 'odata/'
    /// 'http://10.0.0.1/service/odata'    -> 'service/odata/'
    /// 'odata'                            -> 'odata/'
    /// ```
    pub fn route_prefix(&self) -> String {
        let name = self.service_name.as_str();
        let path = match name.find("://") {
            Some(scheme_end) => {
                let authority_and_path = &name[scheme_end + 3..];
                authority_and_path
                    .find('/')
                    .map(|slash| &authority_and_path[slash..])
                    .unwrap_or("")
            }
            None => name,
        };

        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() || trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::new("odata/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_prefix_takes_the_path_of_absolute_service_names() {
        assert_eq!(AdapterConfig::new("http://localhost:55802/odata/").route_prefix(), "odata/");
        assert_eq!(
            AdapterConfig::new("http://198.154.121.75/service/odata").route_prefix(),
            "service/odata/"
        );
        assert_eq!(AdapterConfig::new("http://localhost:55802").route_prefix(), "");
    }

    #[test]
    fn route_prefix_normalizes_relative_service_names() {
        assert_eq!(AdapterConfig::new("odata").route_prefix(), "odata/");
        assert_eq!(AdapterConfig::new("/odata/").route_prefix(), "odata/");
    }

    #[test]
    fn qualify_url_joins_with_single_slash() {
        let config = AdapterConfig::new("http://host/odata/");
        assert_eq!(config.qualify_url("$metadata"), "http://host/odata/$metadata");
        assert_eq!(config.qualify_url("/$batch"), "http://host/odata/$batch");
    }

    #[test]
    fn default_headers_announce_version_four() {
        let config = AdapterConfig::new("odata").header("Authorization", "Bearer t");
        assert_eq!(config.headers.get(ODATA_VERSION_HEADER).map(String::as_str), Some("4.0"));
        assert_eq!(config.headers.len(), 2);
    }

    #[test]
    fn local_offset_is_unpinned_by_default() {
        assert_eq!(AdapterConfig::new("odata").local_utc_offset, None);
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let config = AdapterConfig::new("odata").local_utc_offset(offset);
        assert_eq!(config.local_utc_offset, Some(offset));
    }
}
