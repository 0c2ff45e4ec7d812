/// Change-set save tests over a scripted `$batch` endpoint
///
/// Run with: cargo test --test batch_tests
mod support;

use odata4_bridge::batch::{ChangeRequest, ChangeRequestInterceptor, InterceptorFactory};
use odata4_bridge::{
    AdapterConfig, AdapterError, AutoGeneratedKeyType, DataProperty, DataType, EntityRecord,
    EntityTypeInfo, ExtraMetadata, KeyMapping, ODataV4Adapter, TrackedEntity,
};
use chrono::FixedOffset;
use pretty_assertions::assert_eq;
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use std::sync::Arc;
use support::{ScriptedTransport, batch_response, part};

fn order_type() -> Arc<EntityTypeInfo> {
    Arc::new(
        EntityTypeInfo::new("Order", "Orders")
            .key(DataProperty::new("OrderId", DataType::Int32).on_server("Id"))
            .property(DataProperty::new("Total", DataType::Decimal))
            .auto_generated(AutoGeneratedKeyType::Identity),
    )
}

fn customer_type() -> Arc<EntityTypeInfo> {
    Arc::new(
        EntityTypeInfo::new("Customer", "Customers")
            .key(DataProperty::new("Id", DataType::Int32))
            .property(DataProperty::new("Name", DataType::String)),
    )
}

fn values(value: JsonValue) -> JsonMap<String, JsonValue> {
    value.as_object().cloned().unwrap()
}

fn config() -> AdapterConfig {
    AdapterConfig::new("http://host/odata/").local_utc_offset(FixedOffset::east_opt(0).unwrap())
}

fn mixed_bundle() -> Vec<EntityRecord> {
    let created = EntityRecord::added(order_type(), values(json!({ "OrderId": -1, "Total": 9.5 })));

    let mut renamed = EntityRecord::unchanged(customer_type(), values(json!({ "Id": 7, "Name": "Ann" })));
    renamed.set("Name", json!("Anne"));

    let mut removed = EntityRecord::unchanged(order_type(), values(json!({ "OrderId": 5 })));
    removed.mark_deleted();

    let untouched = EntityRecord::unchanged(customer_type(), values(json!({ "Id": 8 })));

    vec![created, untouched, renamed, removed]
}

#[tokio::test]
async fn test_save_round_trip_maps_keys_and_falls_back_to_originals() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new().reply(batch_response(&[
        part("HTTP/1.1 201 Created", Some(json!({ "Id": 42, "Total": "9.5" }))),
        part("HTTP/1.1 200 OK", Some(json!({ "Id": 7, "Name": "Anne" }))),
        part("HTTP/1.1 204 No Content", None),
    ]));
    let adapter = ODataV4Adapter::new(config(), transport.clone());
    let mut bundle = mixed_bundle();

    let result = adapter.save_changes(&mut bundle).await?;

    assert_eq!(
        result.key_mappings,
        vec![KeyMapping {
            entity_type_name: "Order".to_string(),
            temp_value: json!(-1),
            real_value: json!(42),
        }]
    );
    assert_eq!(result.entities.len(), 3);
    assert_eq!(result.entities[0].returned(), Some(&json!({ "Id": 42, "Total": "9.5" })));
    assert_eq!(result.entities[1].returned(), Some(&json!({ "Id": 7, "Name": "Anne" })));
    let deleted = result.entities[2].original_key().expect("original entity for the delete");
    assert_eq!(deleted.entity_type_name, "Order");
    assert_eq!(deleted.values, vec![json!(5)]);

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, http::Method::POST);
    assert_eq!(sent[0].uri, "http://host/odata/$batch");
    let content_type = sent[0].headers.get("Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/mixed; boundary=batch_"));

    let body = sent[0].body.as_deref().unwrap();
    assert!(body.contains("Content-ID: 1\r\n\r\nPOST odata/Orders HTTP/1.1\r\n"));
    assert!(body.contains("Content-ID: 2\r\n\r\nPATCH odata/Customers(7) HTTP/1.1\r\n"));
    assert!(body.contains("Content-ID: 3\r\n\r\nDELETE odata/Orders(5) HTTP/1.1\r\n"));
    assert!(!body.contains("Content-ID: 4"));
    assert!(body.contains("Content-Type: application/json;IEEE754Compatible=true"));
    assert!(body.contains(r#"{"Id":-1,"Total":"9.5"}"#));
    assert!(body.contains(r#"{"Name":"Anne"}"#));
    Ok(())
}

#[tokio::test]
async fn test_failed_operation_rejects_whole_save_with_flattened_message() {
    let transport = ScriptedTransport::new().reply(batch_response(&[
        part("HTTP/1.1 201 Created", Some(json!({ "Id": 42 }))),
        part(
            "HTTP/1.1 400 Bad Request",
            Some(json!({
                "error": {
                    "code": "",
                    "message": "An error has occurred.",
                    "innererror": {
                        "message": "An error occurred while updating the entries.",
                        "type": "DbUpdateException",
                        "internalexception": {
                            "message": "The DELETE statement conflicted with the REFERENCE constraint.",
                            "type": "SqlException"
                        }
                    }
                }
            })),
        ),
        part("HTTP/1.1 204 No Content", None),
    ]));
    let adapter = ODataV4Adapter::new(config(), transport);
    let mut bundle = mixed_bundle();

    let err = adapter.save_changes(&mut bundle).await.unwrap_err();

    let fault = match err {
        AdapterError::ServerFault(fault) => fault,
        other => panic!("expected server fault, got {other:?}"),
    };
    assert_eq!(
        fault.message,
        "An error has occurred.; An error occurred while updating the entries.; \
         The DELETE statement conflicted with the REFERENCE constraint."
    );
    assert_eq!(fault.status, Some(400));
    assert_eq!(fault.url.as_deref(), Some("http://host/odata/$batch"));
}

#[tokio::test]
async fn test_missing_sub_response_is_a_batch_fault() {
    let transport = ScriptedTransport::new().reply(batch_response(&[
        part("HTTP/1.1 201 Created", Some(json!({ "Id": 42 }))),
        part("HTTP/1.1 204 No Content", None),
    ]));
    let adapter = ODataV4Adapter::new(config(), transport);
    let mut bundle = mixed_bundle();

    let err = adapter.save_changes(&mut bundle).await.unwrap_err();
    assert!(matches!(err, AdapterError::BatchFault(_)));
}

#[tokio::test]
async fn test_bundle_without_changes_makes_no_request() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new();
    let adapter = ODataV4Adapter::new(config(), transport.clone());
    let mut bundle = vec![EntityRecord::unchanged(customer_type(), values(json!({ "Id": 1 })))];

    let result = adapter.save_changes(&mut bundle).await?;

    assert!(result.entities.is_empty());
    assert!(result.key_mappings.is_empty());
    assert!(transport.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cached_uri_is_reused_verbatim() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new()
        .reply(batch_response(&[part("HTTP/1.1 204 No Content", None)]));
    let adapter = ODataV4Adapter::new(config(), transport.clone());

    let mut legacy = EntityRecord::unchanged(customer_type(), values(json!({ "Id": 7, "Name": "Ann" })))
        .with_extra_metadata(ExtraMetadata {
            uri_key: Some("Customers(7)/Legacy".to_string()),
            etag: Some("W/\"3\"".to_string()),
        });
    legacy.set("Name", json!("Anne"));
    let mut bundle = vec![legacy];
    adapter.save_changes(&mut bundle).await?;

    let body = transport.requests()[0].body.clone().unwrap();
    assert!(body.contains("PATCH odata/Customers(7)/Legacy HTTP/1.1\r\n"));
    assert!(body.contains("If-Match: W/\"3\"\r\n"));
    Ok(())
}

#[tokio::test]
async fn test_uri_derived_on_first_save_survives_key_edits() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new()
        .reply(batch_response(&[part("HTTP/1.1 204 No Content", None)]))
        .reply(batch_response(&[part("HTTP/1.1 204 No Content", None)]));
    let adapter = ODataV4Adapter::new(config(), transport.clone());

    let mut customer = EntityRecord::unchanged(customer_type(), values(json!({ "Id": 9, "Name": "Bo" })));
    customer.set("Name", json!("Bob"));
    let mut bundle = vec![customer];
    adapter.save_changes(&mut bundle).await?;
    assert_eq!(
        bundle[0].extra_metadata().and_then(|m| m.uri_key.as_deref()),
        Some("Customers(9)")
    );

    bundle[0].set("Id", json!(10));
    adapter.save_changes(&mut bundle).await?;

    let sent = transport.requests();
    assert_eq!(sent.len(), 2);
    for request in &sent {
        let body = request.body.as_deref().unwrap();
        assert!(body.contains("PATCH odata/Customers(9) HTTP/1.1\r\n"));
        assert!(!body.contains("Customers(10)"));
    }
    assert_eq!(
        bundle[0].extra_metadata().and_then(|m| m.uri_key.as_deref()),
        Some("Customers(9)")
    );
    Ok(())
}

#[tokio::test]
async fn test_interceptor_factory_rewrites_outgoing_operations() -> anyhow::Result<()> {
    struct TagRequests;
    impl ChangeRequestInterceptor for TagRequests {
        fn get_request(&mut self, mut request: ChangeRequest, entity: &dyn TrackedEntity, _index: usize) -> ChangeRequest {
            request
                .headers
                .insert("X-Entity".to_string(), entity.entity_type().name.clone());
            request
        }
        fn done(&mut self, _requests: &mut Vec<ChangeRequest>) {}
    }
    impl InterceptorFactory for TagRequests {
        fn create(&self, _bundle_len: usize) -> Box<dyn ChangeRequestInterceptor> {
            Box::new(TagRequests)
        }
    }

    let transport = ScriptedTransport::new()
        .reply(batch_response(&[part("HTTP/1.1 201 Created", Some(json!({ "Id": 1 })))]));
    let adapter = ODataV4Adapter::new(config(), transport.clone())
        .with_interceptor_factory(Arc::new(TagRequests));
    let mut bundle = vec![EntityRecord::added(order_type(), values(json!({ "OrderId": -3 })))];

    let result = adapter.save_changes(&mut bundle).await?;

    assert_eq!(result.key_mappings[0].real_value, json!(1));
    let body = transport.requests()[0].body.clone().unwrap();
    assert!(body.contains("X-Entity: Order\r\n"));
    Ok(())
}
