//! Strict JSON schemas for the three completion shapes. Every property is listed as required and
//! optional values are nullable, which is what strict structured-output modes accept.

use crate::services::llm::ResponseSchema;
use serde_json::json;

pub fn analysis_schema() -> ResponseSchema {
    ResponseSchema {
        name: "analysis_result",
        schema: json!({
            "type": "object",
            "properties": {
                "author_name": { "type": "string", "description": "Name of the protagonist" },
                "birth_year": { "type": ["integer", "null"], "description": "Birth year, if stated or inferable" },
                "current_age": { "type": ["integer", "null"], "description": "Current age, if stated or inferable" },
                "summary": { "type": "string", "description": "Summary of the whole life story" },
                "detected_periods": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Life periods mentioned in the text"
                },
                "main_themes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Main themes of the story"
                }
            },
            "required": ["author_name", "birth_year", "current_age", "summary", "detected_periods", "main_themes"],
            "additionalProperties": false
        }),
    }
}

pub fn period_schema() -> ResponseSchema {
    ResponseSchema {
        name: "period_extraction",
        schema: json!({
            "type": "object",
            "properties": {
                "period": { "type": "string", "description": "Life period label" },
                "age_range": { "type": "string", "description": "Age range of the period" },
                "title": { "type": "string", "description": "Title for this period" },
                "content": { "type": "string", "description": "Narrative prose of at least 1500 characters" },
                "key_events": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Key events, at least 5"
                },
                "emotions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Dominant emotions, at least 4"
                },
                "lessons_learned": { "type": ["string", "null"], "description": "Lesson drawn from the period" },
                "has_content": { "type": "boolean", "description": "Whether the text contains anything about this period" }
            },
            "required": ["period", "age_range", "title", "content", "key_events", "emotions", "lessons_learned", "has_content"],
            "additionalProperties": false
        }),
    }
}

pub fn autobiography_schema() -> ResponseSchema {
    ResponseSchema {
        name: "autobiography_result",
        schema: json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Title of the autobiography" },
                "author_name": { "type": "string", "description": "Name of the author (protagonist)" },
                "prologue": { "type": "string", "description": "Prologue of at least 500 characters" },
                "chapters": {
                    "type": "array",
                    "description": "One chapter per period with content, in life order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "period": { "type": "string" },
                            "title": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["period", "title", "content"],
                        "additionalProperties": false
                    }
                },
                "epilogue": { "type": "string", "description": "Epilogue of at least 500 characters" },
                "key_themes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "At least 5 key themes"
                },
                "life_lessons": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "At least 5 life lessons"
                }
            },
            "required": ["title", "author_name", "prologue", "chapters", "epilogue", "key_themes", "life_lessons"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn assert_strict(value: &Value) {
        if value["type"] == "object" {
            assert_eq!(value["additionalProperties"], false);
            let props = value["properties"].as_object().unwrap();
            let required: Vec<&str> = value["required"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap())
                .collect();
            for (name, prop) in props {
                assert!(required.contains(&name.as_str()), "{} not required", name);
                assert_strict(prop);
            }
        }
        if let Some(items) = value.get("items") {
            assert_strict(items);
        }
    }

    #[test]
    fn test_schemas_are_strict() {
        for schema in [analysis_schema(), period_schema(), autobiography_schema()] {
            assert_strict(&schema.schema);
        }
    }
}
