use serde_json::Value as JsonValue;

const ODATA_TYPE_FIELD: &str = "@odata.type";

/// Client-side type name of a root result node.
///
/// `#Shop.Model.Customer` becomes `Customer:#Shop.Model`, the
/// `ShortName:#Namespace` form the client's metadata store is keyed by.
pub fn entity_type_name_for_node(node: &JsonValue) -> Option<String> {
    let odata_type = node.get(ODATA_TYPE_FIELD)?.as_str()?;
    let qualified = odata_type.strip_prefix('#').unwrap_or(odata_type);
    let (namespace, short_name) = qualified.rsplit_once('.')?;
    Some(format!("{}:#{}", short_name, namespace))
}
