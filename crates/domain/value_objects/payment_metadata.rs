//! Mining of the free-form metadata bag a gateway returns with a verified payment.
//!
//! Upstream checkouts are inconsistent about field names and encodings, so every
//! lookup tries a fixed list of keys in order. The metadata may be an object, a
//! stringified JSON object, or an object whose string values hold JSON blobs. Plain
//! keys on the top-level object always win over anything unpacked from a blob.

use serde_json::{Map, Value};

const INVOICE_ID_KEYS: [&str; 5] = [
    "invoice_id",
    "invoiceId",
    "invoice",
    "invoice_ref",
    "invoiceReference",
];
const COURSE_LIST_KEYS: [&str; 3] = ["course_ids", "courseIds", "courses"];
const ITEMS_KEY: &str = "items";
const ITEM_COURSE_KEYS: [&str; 2] = ["courseId", "course_id"];
const NESTED_ID_KEYS: [&str; 3] = ["id", "courseId", "course_id"];
const CORPORATE_KEYS: [&str; 3] = ["is_corporate", "isCorporate", "corporate"];
const SEAT_COUNT_KEYS: [&str; 3] = ["seat_count", "seatCount", "seats"];
const CUSTOM_FIELDS_KEY: &str = "custom_fields";

/// Course data recovered from metadata when no invoice is available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataEnrollment {
    pub course_ids: Vec<String>,
    pub corporate: bool,
    pub corporate_seat_count: Option<u32>,
}

impl MetadataEnrollment {
    /// Nothing enrollable: no course ids and no corporate placeholder.
    pub fn is_unresolvable(&self) -> bool {
        self.course_ids.is_empty() && !self.corporate
    }
}

pub fn extract_invoice_id(metadata: &Value) -> Option<String> {
    metadata_layers(metadata)
        .iter()
        .find_map(|layer| lookup(layer, &INVOICE_ID_KEYS).and_then(id_value))
}

pub fn extract_enrollment(metadata: &Value) -> MetadataEnrollment {
    let layers = metadata_layers(metadata);

    let course_ids = layers
        .iter()
        .map(course_ids_in)
        .find(|ids| !ids.is_empty())
        .unwrap_or_default();
    let corporate = layers
        .iter()
        .find_map(|layer| lookup(layer, &CORPORATE_KEYS).and_then(flag_value))
        .unwrap_or(false);
    let corporate_seat_count = layers
        .iter()
        .find_map(|layer| lookup(layer, &SEAT_COUNT_KEYS).and_then(seat_value));

    MetadataEnrollment {
        course_ids,
        corporate,
        corporate_seat_count,
    }
}

/// Trims, drops empties and removes duplicates while keeping first-seen order.
pub fn dedupe_course_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unique: Vec<String> = Vec::new();
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !unique.iter().any(|seen| seen == id) {
            unique.push(id.to_string());
        }
    }
    unique
}

fn metadata_layers(metadata: &Value) -> Vec<Map<String, Value>> {
    match metadata {
        Value::Object(map) => {
            let mut layers = vec![map.clone()];
            layers.extend(map.values().filter_map(|value| match parse_blob(value) {
                Some(Value::Object(inner)) => Some(inner),
                _ => None,
            }));
            layers
        }
        Value::String(_) => match parse_blob(metadata) {
            Some(Value::Object(inner)) => metadata_layers(&Value::Object(inner)),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn parse_blob(value: &Value) -> Option<Value> {
    let raw = value.as_str()?.trim();
    if !(raw.starts_with('{') || raw.starts_with('[')) {
        return None;
    }
    serde_json::from_str(raw).ok()
}

/// Direct keys first, then the gateway's `custom_fields` list.
fn lookup<'a>(layer: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| layer.get(*key).filter(|value| !value.is_null()))
        .or_else(|| custom_field(layer, keys))
}

fn custom_field<'a>(layer: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let fields = layer.get(CUSTOM_FIELDS_KEY)?.as_array()?;
    keys.iter().find_map(|key| {
        fields.iter().find_map(|field| {
            let name = field.get("variable_name")?.as_str()?;
            if name == *key {
                field.get("value").filter(|value| !value.is_null())
            } else {
                None
            }
        })
    })
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.trim().to_string()).filter(|id| !id.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        Value::Object(map) => NESTED_ID_KEYS
            .iter()
            .chain(INVOICE_ID_KEYS.iter())
            .find_map(|key| map.get(*key))
            .and_then(id_value),
        _ => None,
    }
}

fn course_ids_in(layer: &Map<String, Value>) -> Vec<String> {
    for key in COURSE_LIST_KEYS {
        if let Some(value) = layer.get(key) {
            let ids = course_id_list(value);
            if !ids.is_empty() {
                return ids;
            }
        }
    }

    if let Some(items) = layer.get(ITEMS_KEY) {
        let ids = item_course_ids(items);
        if !ids.is_empty() {
            return ids;
        }
    }

    custom_field(layer, &COURSE_LIST_KEYS)
        .map(course_id_list)
        .unwrap_or_default()
}

fn course_id_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(entries) => dedupe_course_ids(entries.iter().filter_map(id_value)),
        Value::String(raw) => match parse_blob(value) {
            Some(parsed @ Value::Array(_)) => course_id_list(&parsed),
            _ => dedupe_course_ids(raw.split(',').map(str::to_string)),
        },
        Value::Number(number) => vec![number.to_string()],
        _ => Vec::new(),
    }
}

fn item_course_ids(items: &Value) -> Vec<String> {
    let entries = match items {
        Value::Array(entries) => entries.clone(),
        Value::String(_) => match parse_blob(items) {
            Some(Value::Array(entries)) => entries,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    dedupe_course_ids(entries.iter().filter_map(|item| {
        ITEM_COURSE_KEYS
            .iter()
            .find_map(|key| item.get(*key))
            .and_then(id_value)
    }))
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Some(true),
            "false" | "0" | "no" | "n" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn seat_value(value: &Value) -> Option<u32> {
    let seats = match value {
        Value::Number(number) => number.as_u64()?,
        Value::String(raw) => raw.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(seats).ok().filter(|seats| *seats > 0)
}
