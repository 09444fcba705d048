//! Per-tool input tables: field name -> {required, type, constraint}.
//!
//! Arguments are checked against the table before a handler runs, and the
//! same table renders the JSON Schema advertised by `tools/list`.

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    String,
    /// An integer, optionally bounded above.
    Integer { max: Option<i64> },
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
    StringList,
    /// `[{"email": "..."}]`, each a syntactically valid address.
    Attendees,
    /// `[{"id": "..."}]`
    CalendarRefs,
    /// Any JSON object, checked further by the handler's own decoding.
    Object,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub description: &'static str,
}

impl Field {
    pub const fn required(name: &'static str, ty: FieldType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            description,
        }
    }
}

/// Render a field table as a JSON Schema object.
pub fn to_json_schema(fields: &[Field]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| {
            let mut schema = type_schema(f.ty);
            schema["description"] = json!(f.description);
            (f.name.to_string(), schema)
        })
        .collect();
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn type_schema(ty: FieldType) -> Value {
    match ty {
        FieldType::String => json!({"type": "string"}),
        FieldType::Integer { max: None } => json!({"type": "integer"}),
        FieldType::Integer { max: Some(max) } => json!({"type": "integer", "maximum": max}),
        FieldType::Enum(values) => json!({"type": "string", "enum": values}),
        FieldType::StringList => json!({"type": "array", "items": {"type": "string"}}),
        FieldType::Attendees => json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"email": {"type": "string", "format": "email"}},
                "required": ["email"]
            }
        }),
        FieldType::CalendarRefs => json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            }
        }),
        FieldType::Object => json!({"type": "object"}),
    }
}

/// Check arguments against a field table. Absent and `null` are the same.
/// Keys the table does not declare are ignored.
pub fn validate(fields: &[Field], args: &Value) -> Result<(), String> {
    let empty = Map::new();
    let object = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err("arguments must be an object".to_string()),
    };

    for field in fields {
        match object.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(format!("'{}' is required", field.name));
                }
            }
            Some(value) => check_type(field, value)?,
        }
    }
    Ok(())
}

fn check_type(field: &Field, value: &Value) -> Result<(), String> {
    let name = field.name;
    match field.ty {
        FieldType::String => {
            value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string"))?;
        }
        FieldType::Integer { max } => {
            let n = value
                .as_i64()
                .ok_or_else(|| format!("'{name}' must be an integer"))?;
            if let Some(max) = max
                && n > max
            {
                return Err(format!("'{name}' must be at most {max}"));
            }
        }
        FieldType::Enum(allowed) => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string"))?;
            if !allowed.contains(&s) {
                return Err(format!("'{name}' must be one of: {}", allowed.join(", ")));
            }
        }
        FieldType::StringList => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("'{name}' must be an array of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(format!("'{name}' must be an array of strings"));
            }
        }
        FieldType::Attendees => {
            for email in object_items(name, value, "email")? {
                if !is_valid_email(email) {
                    return Err(format!("'{name}' contains an invalid email address: {email}"));
                }
            }
        }
        FieldType::CalendarRefs => {
            object_items(name, value, "id")?;
        }
        FieldType::Object => {
            if !value.is_object() {
                return Err(format!("'{name}' must be an object"));
            }
        }
    }
    Ok(())
}

/// Extract the string `key` of every object in an array field.
fn object_items<'a>(name: &str, value: &'a Value, key: &str) -> Result<Vec<&'a str>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("'{name}' must be an array"))?;
    items
        .iter()
        .map(|item| {
            item.get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| format!("every entry of '{name}' needs a string '{key}'"))
        })
        .collect()
}

/// Syntactic address check: one `@`, a non-empty local part, and a dotted
/// domain with no empty labels. No whitespace anywhere.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty() && !l.starts_with('-') && !l.ends_with('-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[Field] = &[
        Field::required("calendarId", FieldType::String, "Calendar"),
        Field::optional("maxResults", FieldType::Integer { max: Some(50) }, "Limit"),
        Field::optional("sendUpdates", FieldType::Enum(&["all", "none"]), "Notify"),
        Field::optional("attendees", FieldType::Attendees, "Guests"),
        Field::optional("calendars", FieldType::CalendarRefs, "Calendars"),
        Field::optional("recurrence", FieldType::StringList, "RRULEs"),
        Field::optional("reminders", FieldType::Object, "Reminders"),
    ];

    #[test]
    fn test_valid_arguments() {
        let args = json!({
            "calendarId": "primary",
            "maxResults": 50,
            "sendUpdates": "all",
            "attendees": [{"email": "bob@example.com"}],
            "calendars": [{"id": "primary"}],
            "recurrence": ["RRULE:FREQ=WEEKLY"],
            "reminders": {"useDefault": true}
        });
        assert!(validate(FIELDS, &args).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate(FIELDS, &json!({})).unwrap_err();
        assert_eq!(err, "'calendarId' is required");
        let err = validate(FIELDS, &json!({"calendarId": null})).unwrap_err();
        assert_eq!(err, "'calendarId' is required");
    }

    #[test]
    fn test_null_arguments_treated_as_empty() {
        let fields = &[Field::optional("q", FieldType::String, "Query")];
        assert!(validate(fields, &Value::Null).is_ok());
        assert!(validate(fields, &json!([])).is_err());
    }

    #[test]
    fn test_wrong_types() {
        assert!(validate(FIELDS, &json!({"calendarId": 7})).is_err());
        assert!(validate(FIELDS, &json!({"calendarId": "p", "maxResults": "5"})).is_err());
        assert!(validate(FIELDS, &json!({"calendarId": "p", "maxResults": 1.5})).is_err());
        assert!(validate(FIELDS, &json!({"calendarId": "p", "recurrence": [1]})).is_err());
        assert!(validate(FIELDS, &json!({"calendarId": "p", "reminders": "yes"})).is_err());
        assert!(validate(FIELDS, &json!({"calendarId": "p", "calendars": [{"name": "x"}]})).is_err());
    }

    #[test]
    fn test_integer_maximum() {
        let err = validate(FIELDS, &json!({"calendarId": "p", "maxResults": 51})).unwrap_err();
        assert_eq!(err, "'maxResults' must be at most 50");
    }

    #[test]
    fn test_enum_values() {
        let err = validate(FIELDS, &json!({"calendarId": "p", "sendUpdates": "some"})).unwrap_err();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn test_invalid_attendee_email() {
        let err = validate(
            FIELDS,
            &json!({"calendarId": "p", "attendees": [{"email": "not-an-email"}]}),
        )
        .unwrap_err();
        assert!(err.contains("invalid email"));
    }

    #[test]
    fn test_undeclared_fields_ignored() {
        assert!(validate(FIELDS, &json!({"calendarId": "p", "colour": "1"})).is_ok());
        assert!(validate(&[], &json!({"random_string": "x"})).is_ok());
        // Declared fields are still checked alongside extras.
        let err = validate(FIELDS, &json!({"colour": "1"})).unwrap_err();
        assert_eq!(err, "'calendarId' is required");
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+tag@sub.example.co.uk"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@localhost"));
        assert!(!is_valid_email("alice@@example.com"));
        assert!(!is_valid_email("alice@example..com"));
        assert!(!is_valid_email("al ice@example.com"));
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = to_json_schema(FIELDS);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["calendarId"]));
        assert!(schema.get("additionalProperties").is_none());
        assert_eq!(schema["properties"]["maxResults"]["maximum"], 50);
        assert_eq!(schema["properties"]["sendUpdates"]["enum"], json!(["all", "none"]));
        assert_eq!(schema["properties"]["calendarId"]["description"], "Calendar");
    }
}
