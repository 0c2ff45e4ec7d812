use crate::batch::{
    BatchRequestBuilder, BatchResponseCorrelator, BatchResult, InterceptorFactory,
    PassThroughInterceptor, wire,
};
use crate::config::AdapterConfig;
use crate::core::{AdapterError, Result};
use crate::entity::TrackedEntity;
use crate::fault::{ConnectivityClassifier, FaultNormalizer, ServerFault};
use crate::metadata::{CsdlMetadata, MetadataNormalizer, MetadataStore};
use crate::query::{QueryResult, normalize_query_response, translate_query_url};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

const METADATA_PATH: &str = "$metadata";
const BATCH_PATH: &str = "$batch";

/// Data-service adapter speaking the newer protocol dialect on the wire while
/// presenting the older dialect's shapes to its caller.
///
/// Each round-trip resolves exactly once and never retries.
pub struct ODataV4Adapter<T: Transport> {
    config: AdapterConfig,
    transport: T,
    normalizer: FaultNormalizer,
    interceptors: Arc<dyn InterceptorFactory>,
}

impl<T: Transport> ODataV4Adapter<T> {
    pub fn new(config: AdapterConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            normalizer: FaultNormalizer::new(),
            interceptors: Arc::new(PassThroughInterceptor),
        }
    }

    /// Replace the classifier applied last to every normalized failure.
    pub fn with_classifier(mut self, classifier: Arc<dyn ConnectivityClassifier>) -> Self {
        self.normalizer = FaultNormalizer::with_classifier(classifier);
        self
    }

    pub fn with_interceptor_factory(mut self, factory: Arc<dyn InterceptorFactory>) -> Self {
        self.interceptors = factory;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Run one query, rewriting the older dialect's count tokens on the way out.
    pub async fn execute_query(&self, url: &str) -> Result<QueryResult> {
        let url = translate_query_url(url);
        let span = info_span!("odata.query", url = %url);
        self.query(&url).instrument(span).await
    }

    /// Fetch, normalize and import the service's schema metadata.
    ///
    /// The store is checked right before import: when another fetch already
    /// populated it, this fetch's metadata is returned but not imported.
    pub async fn fetch_metadata(&self, store: &dyn MetadataStore) -> Result<CsdlMetadata> {
        let span = info_span!("odata.metadata.fetch", service = %self.config.service_name);
        self.metadata(store).instrument(span).await
    }

    /// Send every pending change of `bundle` as one atomic change group.
    ///
    /// Updates and deletes cache their derived target URI on the entity.
    pub async fn save_changes<E: TrackedEntity>(&self, bundle: &mut [E]) -> Result<BatchResult> {
        let span = info_span!("odata.batch.save", bundle = bundle.len());
        self.save(bundle).instrument(span).await
    }

    async fn query(&self, url: &str) -> Result<QueryResult> {
        let request = HttpRequest::get(url, self.config.headers.clone());
        let response = self.round_trip(request, url).await?;
        let body = parse_json_body(&response)?;
        let mut result = normalize_query_response(&body)?;
        event!(
            Level::DEBUG,
            rows = result.results.len(),
            inline_count = ?result.inline_count,
            "query completed"
        );
        result.http_response = Some(response);
        Ok(result)
    }

    async fn metadata(&self, store: &dyn MetadataStore) -> Result<CsdlMetadata> {
        let url = self.config.qualify_url(METADATA_PATH);
        let service_name = self.config.service_name.as_str();
        let mut headers = self.config.headers.clone();
        headers.insert("Accept".to_string(), self.config.metadata_accept.clone());

        let response = self
            .round_trip(HttpRequest::get(url.as_str(), headers), &url)
            .await
            .map_err(|err| prefix_metadata_failure(err, &url))?;
        let raw = parse_json_body(&response).map_err(|err| AdapterError::MetadataShape {
            url: url.clone(),
            reason: format!("response holds no JSON metadata ({})", err),
        })?;
        let metadata = MetadataNormalizer::new().normalize(raw, &url)?;

        if store.has_metadata_for(service_name)? {
            event!(Level::INFO, "metadata already imported by another fetch; import skipped");
            return Ok(metadata);
        }

        store
            .import_metadata(service_name, &metadata)
            .map_err(|reason| AdapterError::MetadataImport {
                url: url.clone(),
                reason,
            })?;
        store.add_data_service(service_name)?;
        event!(Level::INFO, "metadata imported");
        Ok(metadata)
    }

    async fn save<E: TrackedEntity>(&self, bundle: &mut [E]) -> Result<BatchResult> {
        let url = self.config.qualify_url(BATCH_PATH);
        let route_prefix = self.config.route_prefix();
        let built = {
            let mut interceptor = self.interceptors.create(bundle.len());
            BatchRequestBuilder::new(
                &route_prefix,
                &self.config.change_content_type,
                self.config.local_utc_offset,
            )
            .build(bundle, interceptor.as_mut())?
        };

        if built.requests.is_empty() {
            event!(Level::DEBUG, "nothing to save");
            return Ok(BatchResult::default());
        }

        let encoded = wire::encode(&built.requests)?;
        let mut headers = self.config.headers.clone();
        headers.insert("Content-Type".to_string(), encoded.content_type);
        let request = HttpRequest::post(url.as_str(), headers, encoded.body);

        let response = self.round_trip(request, &url).await?;
        let content_type = response.header("Content-Type").unwrap_or_default();
        let decoded = wire::decode(content_type, response.body.as_deref().unwrap_or_default())?;

        let result = BatchResponseCorrelator::new(&self.normalizer, Some(url.as_str()))
            .correlate(&decoded, &built.tables)?;
        event!(
            Level::INFO,
            operations = built.requests.len(),
            key_mappings = result.key_mappings.len(),
            "batch saved"
        );
        Ok(result)
    }

    /// Send a request; transport failures and error statuses become normalized faults.
    async fn round_trip(&self, request: HttpRequest, url: &str) -> Result<HttpResponse> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(failure) => {
                let fault = self.normalizer.normalize((&failure).into(), Some(url));
                event!(Level::WARN, error = %fault, "request failed without a response");
                return Err(fault.into());
            }
        };

        if !response.is_success() {
            let fault = self.normalizer.normalize((&response).into(), Some(url));
            event!(Level::WARN, status = response.status, error = %fault, "request rejected");
            return Err(fault.into());
        }
        Ok(response)
    }
}

fn parse_json_body(response: &HttpResponse) -> Result<JsonValue> {
    let body = response
        .body
        .as_deref()
        .ok_or_else(|| AdapterError::Decode("response has no body".to_string()))?;
    Ok(serde_json::from_str(body)?)
}

fn prefix_metadata_failure(err: AdapterError, url: &str) -> AdapterError {
    let prefix = |mut fault: ServerFault| {
        fault.message = format!("Metadata query failed for: {}; {}", url, fault.message);
        fault
    };
    match err {
        AdapterError::Transport(fault) => AdapterError::Transport(prefix(fault)),
        AdapterError::ServerFault(fault) => AdapterError::ServerFault(prefix(fault)),
        other => other,
    }
}
