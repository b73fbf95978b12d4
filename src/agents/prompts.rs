// Prompt templates for LLM interactions
//
// This module contains the prompt templates used by the agent drivers.
// Prompts are versioned so a logged request can be traced to its template.

use std::collections::HashMap;

use super::errors::{AgentError, AgentResult};
use crate::domain::message::PromptMessage;

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
    pub user_template: String,
}

impl PromptTemplate {
    /// Render the user template, replacing every `{{name}}` with its variable
    ///
    /// # Example
    /// ```
    /// use std::collections::HashMap;
    /// use agent_bus::agents::prompts::library;
    ///
    /// let vars = HashMap::from([("topic".to_string(), "Rust async".to_string())]);
    /// let text = library::planner().render(&vars).unwrap();
    /// assert!(text.contains("Rust async"));
    /// ```
    pub fn render(&self, variables: &HashMap<String, String>) -> AgentResult<String> {
        let mut rendered = String::with_capacity(self.user_template.len());
        let mut rest = self.user_template.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            let key = rest[start + 2..start + 2 + len].trim();
            let value = variables
                .get(key)
                .ok_or_else(|| AgentError::MissingVariable {
                    template: self.name.clone(),
                    variable: key.to_string(),
                })?;

            rendered.push_str(&rest[..start]);
            rendered.push_str(value);
            rest = &rest[start + 2 + len + 2..];
        }

        rendered.push_str(rest);
        Ok(rendered)
    }

    /// System and rendered user message, ready for an LLM call
    pub fn to_prompt(&self, variables: &HashMap<String, String>) -> AgentResult<Vec<PromptMessage>> {
        Ok(vec![
            PromptMessage::system(self.system.clone()),
            PromptMessage::user(self.render(variables)?),
        ])
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn planner() -> PromptTemplate {
        PromptTemplate {
            name: "planner".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a planning agent. Break the request into clear, ordered steps \
                     and suggest an article title with 3-5 section subtitles."
                .to_string(),
            user_template: "{{topic}}".to_string(),
        }
    }

    pub fn researcher() -> PromptTemplate {
        PromptTemplate {
            name: "researcher".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a research agent. Gather the key facts and context needed \
                     to write the planned article."
                .to_string(),
            user_template: "Research the following plan:\n\n{{plan}}".to_string(),
        }
    }

    pub fn writer() -> PromptTemplate {
        PromptTemplate {
            name: "writer".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a writing agent. Turn research into a well-structured article \
                     that starts with its title and section subtitles."
                .to_string(),
            user_template: "Write an article based on this research:\n\n{{research}}".to_string(),
        }
    }

    pub fn reviewer() -> PromptTemplate {
        PromptTemplate {
            name: "reviewer".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a review agent. Give specific, actionable feedback on clarity, \
                     accuracy, structure and style."
                .to_string(),
            user_template: "Review this content:\n\n{{draft}}".to_string(),
        }
    }

    pub fn rewrite() -> PromptTemplate {
        PromptTemplate {
            name: "rewrite".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a writing agent revising your own article.".to_string(),
            user_template: "Revise the article below using the reviewer's feedback.\n\n\
                            Feedback:\n{{feedback}}\n\n\
                            Article:\n{{draft}}"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Role;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_all_placeholders() {
        let text = library::rewrite()
            .render(&vars(&[("feedback", "shorter"), ("draft", "long text")]))
            .unwrap();

        assert!(text.contains("Feedback:\nshorter"));
        assert!(text.contains("Article:\nlong text"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn missing_variable_is_an_error() {
        let err = library::reviewer().render(&HashMap::new()).unwrap_err();

        assert!(matches!(
            err,
            AgentError::MissingVariable { ref variable, .. } if variable == "draft"
        ));
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        let template = PromptTemplate {
            name: "t".to_string(),
            version: "1".to_string(),
            system: String::new(),
            user_template: "Hello {{ name }}!".to_string(),
        };

        assert_eq!(template.render(&vars(&[("name", "Ada")])).unwrap(), "Hello Ada!");
    }

    #[test]
    fn unterminated_placeholder_is_left_verbatim() {
        let template = PromptTemplate {
            name: "t".to_string(),
            version: "1".to_string(),
            system: String::new(),
            user_template: "Hello {{name".to_string(),
        };

        assert_eq!(template.render(&HashMap::new()).unwrap(), "Hello {{name");
    }

    #[test]
    fn prompt_has_system_then_user() {
        let prompt = library::planner()
            .to_prompt(&vars(&[("topic", "Ferris")]))
            .unwrap();

        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert_eq!(prompt[1].role, Role::User);
        assert_eq!(prompt[1].content, "Ferris");
    }
}
