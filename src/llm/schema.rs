/*
 * src/llm/schema.rs
 *
 * Static, hand-written JSON Schemas used as the adapter's source of
 * truth for strict-schema mode (spec §4.8/§9 — "Schema generation
 * quirks": a converter that turns a typed schema object into a JSON
 * Schema at runtime is brittle, so the schema text lives here as a
 * literal instead of being derived from `model::gate::GateDecision`
 * et al. at call time. The typed structs are used only for
 * post-validation.)
 */

pub const GATE_SCHEMA_VERSION: &str = "gate.v1";
pub const GATE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "food_signal": { "type": "string", "enum": ["NO", "UNCERTAIN", "YES"] },
    "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
    "has_food": { "type": "boolean" },
    "has_location": { "type": "boolean" },
    "has_modifiers": { "type": "boolean" },
    "language": { "type": "string" }
  },
  "required": ["food_signal", "confidence", "has_food", "has_location", "has_modifiers", "language"],
  "additionalProperties": false
}"#;

pub const ROUTE_SCHEMA_VERSION: &str = "route.v1";
pub const ROUTE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "route": { "type": "string", "enum": ["NEARBY", "TEXTSEARCH", "LANDMARK"] },
    "language_hint": { "type": "string" },
    "region_hint": { "type": ["string", "null"] },
    "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
    "category_text": { "type": "string" },
    "location_text": { "type": "string" },
    "geocode_query": { "type": ["string", "null"] }
  },
  "required": ["route", "language_hint", "confidence", "category_text", "location_text"],
  "additionalProperties": false
}"#;

pub const BASE_FILTERS_SCHEMA_VERSION: &str = "base_filters.v1";
pub const BASE_FILTERS_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "language": { "type": ["string", "null"] },
    "open_state": { "type": ["string", "null"], "enum": ["OPEN_NOW", "OPEN_AT", "OPEN_BETWEEN", null] },
    "open_at": { "type": ["object", "null"] },
    "open_between": { "type": ["object", "null"] },
    "region_hint": { "type": ["string", "null"] }
  },
  "required": [],
  "additionalProperties": false
}"#;

pub const POST_CONSTRAINTS_SCHEMA_VERSION: &str = "post_constraints.v1";
pub const POST_CONSTRAINTS_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "open_state": { "type": ["string", "null"], "enum": ["OPEN_NOW", "OPEN_AT", "OPEN_BETWEEN", null] },
    "open_at": { "type": ["object", "null"] },
    "open_between": { "type": ["object", "null"] },
    "price_level": { "type": ["integer", "null"], "minimum": 1, "maximum": 4 },
    "is_kosher": { "type": ["boolean", "null"] },
    "requires_accessible": { "type": ["boolean", "null"] },
    "requires_parking": { "type": ["boolean", "null"] }
  },
  "required": [],
  "additionalProperties": false
}"#;
