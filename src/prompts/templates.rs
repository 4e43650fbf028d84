// Built-in prompts for the improve / critique / score cycle

use super::schema::{FieldSpec, FieldType, OutputSchema};

/// A template with named `{placeholders}` plus the shape its answer must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSpec {
    pub name: &'static str,
    pub template: &'static str,
    pub schema: OutputSchema,
    /// For improve prompts: the field holding the rewrite used downstream.
    pub rewrite_field: Option<&'static str>,
}

pub const IMPROVED_VARIANTS: OutputSchema = OutputSchema {
    title: "ImprovedText",
    fields: &[
        FieldSpec::required(
            "worst_terms",
            FieldType::StringArray,
            "Array of strings of the worst terms in the text.",
        ),
        FieldSpec::required(
            "worst_fix",
            FieldType::String,
            "The text with worst terms replaced or softened.",
        ),
        FieldSpec::required(
            "nvc",
            FieldType::String,
            "The text with NVC perspective sharing where needed.",
        ),
        FieldSpec::required(
            "constructive",
            FieldType::String,
            "The text with constructive suggestions.",
        ),
        FieldSpec::required(
            "best",
            FieldType::String,
            "A hybrid close to the original that combines the best of the variations.",
        ),
    ],
};

pub const IMPROVED_TEXT: OutputSchema = OutputSchema {
    title: "ImprovedText",
    fields: &[FieldSpec::required(
        "text",
        FieldType::String,
        "The improved text.",
    )],
};

pub const CRITIQUE: OutputSchema = OutputSchema {
    title: "Critique",
    fields: &[FieldSpec::required(
        "critique",
        FieldType::String,
        "The critique of the text.",
    )],
};

pub const FAITHFULNESS_SCORE: OutputSchema = OutputSchema {
    title: "FaithfulnessScore",
    fields: &[FieldSpec::required(
        "faithfulness_score",
        FieldType::Score,
        "The faithfulness score of the text.",
    )],
};

pub const SPICY_SCORE: OutputSchema = OutputSchema {
    title: "SpicyScore",
    fields: &[FieldSpec::required(
        "spicy_score",
        FieldType::Score,
        "The spiciness score of the text.",
    )],
};

const IMPROVE_VARIANTS_TEMPLATE: &str = r#"
Given some inflammatory text, make minimal changes to the text to make it less inflammatory, while keeping the original meaning as much as possible.
Make the new version more calm and constructive, without changing the intended meaning, with only minimal changes to the existing text.
Make sure the refined text is a good reflection of the original text, without adding new ideas.
Make the changes as minimal as possible. Some optional strategies to make the text less inflammatory include:
-Soften harsh tone, replace or omit judgemental or extreme words.
-Rather than accusations, share perspective.
-Consider focusing on specific actions rather than character.
-Rephrasing exaggerated expressions like "always", "never" or "everyone" to be more moderate.
-Using gentler alternatives to express similar points where needed.

Avoid adding new ideas, ONLY build upon what's already there, for example, you might reframe an existing point to be more balanced but never introduce unrelated concepts.

Make both parties more happy where possible:
The reader should be INFORMED and not *offended*, and the original author should be *content* that their points were *honoured* by your edit, by minimally refining their text without losing the original intent.

Format:
JSON object with the following properties:
worst_terms, (array of strings of the worst terms in the text.)
worst_fix, (Text with worst terms replaced or softened.)
nvc, (text with Non-violent Communication perspective sharing where needed.)
constructive, (text with constructive suggestions.)
best: (The most minimal calm variation of the original text, learning from prior variations)

Example input text: "You're always annoying me. You never listen to me."
Example improved text outputs:
worst_terms: ["annoying", "always annoying", "never listen"]
worst_fix: "You're often frustrating me. You rarely listen to me."
nvc: "I often feel annoyed by you. I rarely feel you listen to me."
constructive: "I often feel frustrated by you. I rarely feel you listen to me. How can we improve our communication?"
best: "You're often frustrating me. It feels like you often don't listen to me."
End of example.
Here is the real input text to improve:
`{original_text}`

Previous rephrasing attempts:
{previous_suggestions}

Provide your improved version in the required JSON format.
To get a good answer, make the original text non-inflammatory, while being as faithful to the original text as much as possible.
Use valid JSON then stop, do not add any remarks before or after the JSON, the required keys are: worst_terms, worst_fix, nvc, constructive, best.
"#;

const IMPROVE_SIMPLE_TEMPLATE: &str = r#"
Your task is to rephrase inflammatory text, so it is more calm and constructive, without changing the intended meaning.
The improved text should have a softened tone, avoiding judgemental and extreme words.
Make sure the refined text is a good reflection of the original text, without adding new ideas.

1. Rather than accusations, share perspective.
2. Remove or soften judgemental language.
3. Focus on specific actions rather than character.
4. Rephrase extreme words like "always", "never" or "everyone" to be more moderate.
5. Focus on softening the tone, rather than changing the substance or meaning.
6. Use gentler alternatives to express similar points.
7. Don't add completely new ideas, ONLY build upon what's already there.
8. For example, you might reframe an existing point to be more balanced. Never introduce unrelated concepts.

Example:
Example input text: "You're always annoying me. You never listen to me."
Example improved text output: {"text":"I am frustrated by your behaviour. Could you listen to me better?"}

End of example.
Here is the real input text to improve:
`{original_text}`

Previous rephrasing attempts:
{previous_suggestions}

Provide your improved version in this format:
{"text":"STRING"}
To get a good answer, make the original text non-inflammatory, while being as faithful to the ideas in the original text as much as possible. Use valid JSON then stop, do not add any remarks before or after the JSON.
"#;

const CRITIQUE_TEMPLATE: &str = r#"
Critique the text. We prefer the edit prevent inflaming discussions!
We also prefer concise text, and a similar semantic intent to the original.

Here is the original text:
`{original_text}`

Here is the text to critique:
`{last_edit}`

Output your response as valid JSON in this format:
{
    "critique":"STRING"
}

E.g:
{
    "critique":"This is too fluffy and different from the original intent."
}
Please critique the text.
You must output the JSON in the required format only, with no remarks or prefacing remarks - JUST JSON!"#;

const FAITHFULNESS_TEMPLATE: &str = r#"
Score the text.

A score of 1 would have the same semantic intent as the original text. A score of 0 would mean the text has lost all semantic similarity.

Here is the original text:
`{original_text}`

Here is the new text to score:
`{last_edit}`

The float variable is scored from 0 to 1.

Output your response as valid JSON in this format, then stop:
{
    "faithfulness_score":FLOAT
}
Please score the text.
You must output the JSON in the required format only, with no remarks or prefacing remarks - JUST JSON!
"#;

const SPICY_TEMPLATE: &str = r#"
Score the text.

A calm spicy_score of 0 is ideal. A spicy_score of 1 is the worst, very inflammatory text that makes the reader feel attacked.

Here is the original text:
`{original_text}`

Here is the text to score:
`{last_edit}`
The float variable is scored from 0 to 1.

Output your response as valid JSON in this format, then stop:
{
    "spicy_score":FLOAT
}
Please score the text.
You must output the JSON in the required format only, with no remarks or prefacing remarks - JUST JSON!
"#;

pub const IMPROVE_VARIANTS: PromptSpec = PromptSpec {
    name: "improve",
    template: IMPROVE_VARIANTS_TEMPLATE,
    schema: IMPROVED_VARIANTS,
    rewrite_field: Some("best"),
};

pub const IMPROVE_SIMPLE: PromptSpec = PromptSpec {
    name: "improve_simple",
    template: IMPROVE_SIMPLE_TEMPLATE,
    schema: IMPROVED_TEXT,
    rewrite_field: Some("text"),
};

pub const CRITIQUE_PROMPT: PromptSpec = PromptSpec {
    name: "critique",
    template: CRITIQUE_TEMPLATE,
    schema: CRITIQUE,
    rewrite_field: None,
};

pub const FAITHFULNESS_PROMPT: PromptSpec = PromptSpec {
    name: "faithfulness",
    template: FAITHFULNESS_TEMPLATE,
    schema: FAITHFULNESS_SCORE,
    rewrite_field: None,
};

pub const SPICY_PROMPT: PromptSpec = PromptSpec {
    name: "spicy",
    template: SPICY_TEMPLATE,
    schema: SPICY_SCORE,
    rewrite_field: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_fields_exist_in_schema() {
        for spec in [IMPROVE_VARIANTS, IMPROVE_SIMPLE] {
            let field = spec.rewrite_field.unwrap();
            assert!(spec.schema.field(field).is_some(), "{}", spec.name);
        }
    }

    #[test]
    fn test_improve_templates_have_both_placeholders() {
        for spec in [IMPROVE_VARIANTS, IMPROVE_SIMPLE] {
            assert!(spec.template.contains("{original_text}"));
            assert!(spec.template.contains("{previous_suggestions}"));
        }
    }

    #[test]
    fn test_scoring_templates_reference_edit() {
        for spec in [CRITIQUE_PROMPT, FAITHFULNESS_PROMPT, SPICY_PROMPT] {
            assert!(spec.template.contains("{original_text}"));
            assert!(spec.template.contains("{last_edit}"));
            assert!(spec.rewrite_field.is_none());
        }
    }
}
