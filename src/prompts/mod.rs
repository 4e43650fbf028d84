// Prompt templates, rendering and output schemas

pub mod render;
pub mod schema;
pub mod templates;

pub use render::{render, replacements, Replacements};
pub use schema::{extract_json, FieldSpec, FieldType, OutputSchema, StructuredValue};
pub use templates::{
    PromptSpec, CRITIQUE_PROMPT, FAITHFULNESS_PROMPT, IMPROVE_SIMPLE, IMPROVE_VARIANTS,
    SPICY_PROMPT,
};
