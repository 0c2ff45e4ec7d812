// ============================================================================
// odata4-bridge Library
// ============================================================================

//! Lets an entity client built for the older OData dialect talk to a service
//! speaking the newer one.
//!
//! The crate owns four translations:
//!
//! - query URLs and result envelopes ([`query`])
//! - schema metadata, including the association graph the newer dialect
//!   omits ([`metadata`])
//! - grouped change sets, encoded into one `$batch` request and correlated
//!   back by position ([`batch`])
//! - nested server errors, flattened into one message ([`fault`])
//!
//! The network itself sits behind the [`Transport`] trait.
//!
//! # Examples
//!
//! ```no_run
//! use odata4_bridge::{AdapterConfig, InMemoryMetadataStore, ODataV4Adapter, ReqwestTransport};
//!
//! # async fn run() -> odata4_bridge::Result<()> {
//! let config = AdapterConfig::new("http://localhost:55802/odata/");
//! let transport = ReqwestTransport::new(&config)?;
//! let adapter = ODataV4Adapter::new(config, transport);
//!
//! let store = InMemoryMetadataStore::new();
//! adapter.fetch_metadata(&store).await?;
//!
//! let page = adapter
//!     .execute_query("http://localhost:55802/odata/Customers?$top=10&$inlinecount=allpages")
//!     .await?;
//! println!("{} of {:?}", page.results.len(), page.inline_count);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod entity;
pub mod facade;
pub mod fault;
pub mod metadata;
pub mod query;
pub mod transport;

pub use batch::{BatchRequestBuilder, BatchResponseCorrelator, BatchResult, KeyMapping, SavedEntity};
pub use config::AdapterConfig;
pub use crate::core::{AdapterError, Result};
pub use entity::{
    AutoGeneratedKeyType, DataProperty, DataType, EntityKey, EntityRecord, EntityState,
    EntityTypeInfo, ExtraMetadata, TrackedEntity,
};
pub use facade::ODataV4Adapter;
pub use fault::{FaultNormalizer, ServerFault};
pub use metadata::{CsdlMetadata, InMemoryMetadataStore, MetadataNormalizer, MetadataStore};
pub use query::{QueryResult, translate_query_url};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportFailure};
