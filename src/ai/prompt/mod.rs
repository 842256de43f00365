//! Prompt Builder
//!
//! Standardized prompt construction shared by every pipeline role, so all
//! system prompts have the same shape: role, objectives, rules, output schema.

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key-value facts
    Context(Vec<(String, String)>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Hard rules the reply must follow
    Rules(Vec<String>),
    /// Literal JSON shape the reply must match
    OutputSchema(String),
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: &[&str]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Add a context item; consecutive items share one section
    pub fn context_item(mut self, key: &str, value: impl Into<String>) -> Self {
        let item = (key.to_string(), value.into());
        match self.sections.last_mut() {
            Some(PromptSection::Context(items)) => items.push(item),
            _ => self.sections.push(PromptSection::Context(vec![item])),
        }
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn rules(mut self, rules: &[&str]) -> Self {
        self.sections.push(PromptSection::Rules(
            rules.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn output_schema(mut self, schema: &str) -> Self {
        self.sections
            .push(PromptSection::OutputSchema(schema.trim().to_string()));
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n\n",
                        expertise, task
                    ));
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Rules(rules) => {
                    prompt.push_str("<RULES>\n");
                    for rule in rules {
                        prompt.push_str(&format!("- {}\n", rule));
                    }
                    prompt.push_str("</RULES>\n\n");
                }
                PromptSection::OutputSchema(schema) => {
                    prompt.push_str("Respond ONLY with a JSON object of this shape:\n\n```json\n");
                    prompt.push_str(&schema);
                    prompt.push_str("\n```\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}
