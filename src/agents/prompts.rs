// Prompt templates for the voice personas
//
// Each persona is described to the hosted language model by a system
// prompt. Templates use `{{name}}` placeholders; the same substitution is
// used for the spoken confirmations returned by operations.

use super::registry::OperationRegistry;

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
}

impl PromptTemplate {
    /// Render the system prompt with variables
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        render(&self.system, variables)
    }

    /// Render the system prompt for `agent`, listing the operations the
    /// model may call
    pub fn instructions(&self, agent: &str, registry: &OperationRegistry) -> String {
        let operations = registry
            .operations()
            .iter()
            .map(|op| format!("- {}: {}", op.name, op.description))
            .collect::<Vec<_>>()
            .join("\n");

        self.render(&[("agent", agent), ("operations", &operations)])
    }
}

/// Replaces every `{{key}}` in `template` with its value
///
/// Substitution is a single pass over the template, so placeholders inside
/// substituted values are never expanded. Unknown placeholders are left
/// untouched; when a key is given twice the later value wins.
///
/// # Example
/// ```
/// use voice_capture_api::agents::prompts::render;
///
/// let text = render("Thanks {{name}}!", &[("name", "Sam")]);
/// assert_eq!(text, "Thanks Sam!");
/// ```
pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        if key.contains("{{") {
            // "{{" with no closing pair of its own is plain text
            out.push_str("{{");
            rest = after;
            continue;
        }

        match variables.iter().rev().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// [`render`] over owned name/value pairs
pub fn render_owned(template: &str, variables: &[(String, String)]) -> String {
    let borrowed: Vec<(&str, &str)> = variables
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    render(template, &borrowed)
}

// Persona prompt library
pub mod library {
    use super::PromptTemplate;

    fn persona(name: &str, system: &str) -> PromptTemplate {
        PromptTemplate {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            system: system.to_string(),
        }
    }

    pub fn barista() -> PromptTemplate {
        persona(
            "barista",
            "You are {{agent}}, a friendly barista at Brew & Bean Coffee. \
             Take a complete order: drink type, size, milk preference, any extras \
             and the customer's name. Ask clarifying questions until nothing is \
             missing, then confirm the order and complete it. Keep replies short, \
             you are speaking, not writing.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn sales_rep() -> PromptTemplate {
        persona(
            "sales_rep",
            "You are {{agent}}, a warm, consultative sales development representative. \
             Understand what brought the visitor here and collect their name, \
             company, email, role, use case, team size and timeline naturally \
             over the conversation. Never ask for everything at once. When they \
             are done, recap and save the lead even if some details are missing.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn wellness_companion() -> PromptTemplate {
        persona(
            "wellness_companion",
            "You are {{agent}}, a grounded wellness companion running a short daily \
             check-in. Ask about mood and energy, any stress, and one to three \
             small objectives for the day. You are not a medical professional: \
             no diagnosis, no clinical advice. Recap before completing the \
             check-in, and refer to the previous check-in when there is one.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn fraud_agent() -> PromptTemplate {
        persona(
            "fraud_agent",
            "You are {{agent}}, a calm fraud detection representative calling about a \
             suspicious transaction. Ask for the customer's name and pull up their \
             case, then verify them with the security question on file only; never \
             ask for full card numbers, PINs or passwords. If verification fails, \
             end the call politely. Otherwise read out the transaction, ask whether \
             they made it, record the answer and close the case.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn tutor() -> PromptTemplate {
        persona(
            "tutor",
            "You are {{agent}}, an active recall coach with three modes: learn (explain a \
             concept), quiz (ask and evaluate questions) and teach back (the \
             learner explains, you give feedback). Record the mode and concept \
             whenever they change and log every score.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn improv_host() -> PromptTemplate {
        persona(
            "improv_host",
            "You are {{agent}}, the high-energy host of Improv Battle. Explain the rules, \
             run three rounds, set a scenario for each, react honestly to the \
             performance, then close with a summary of the player's style. \
             Handle early exits gracefully.\n\n\
             Operations:\n{{operations}}",
        )
    }

    pub fn grocery_assistant() -> PromptTemplate {
        persona(
            "grocery_assistant",
            "You are {{agent}}, a helpful grocery ordering assistant. Add the items the \
             customer asks for to the cart, collect their name and delivery \
             address, read the cart back and place the order.\n\n\
             Operations:\n{{operations}}",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_every_occurrence() {
        let text = render("{{a}} and {{a}} then {{b}}", &[("a", "x"), ("b", "y")]);
        assert_eq!(text, "x and x then y");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        assert_eq!(render("Hi {{who}}", &[("name", "Sam")]), "Hi {{who}}");
    }

    #[test]
    fn render_does_not_expand_substituted_values() {
        let text = render("Noted {{value}}, order {{id}}", &[("value", "{{id}}"), ("id", "ORD-1")]);
        assert_eq!(text, "Noted {{id}}, order ORD-1");
    }

    #[test]
    fn render_handles_stray_braces() {
        assert_eq!(render("{{ open {{a}}", &[("a", "x")]), "{{ open x");
        assert_eq!(render("tail {{a", &[("a", "x")]), "tail {{a");
        assert_eq!(render("{{a}}", &[("a", "x"), ("a", "y")]), "y");
    }

    #[test]
    fn render_owned_pairs() {
        let vars = vec![("name".to_string(), "Sam".to_string())];
        assert_eq!(render_owned("Hi {{name}}", &vars), "Hi Sam");
    }

    #[test]
    fn personas_list_operations() {
        let template = library::barista();
        let text = template.render(&[("agent", "Maya"), ("operations", "- update_size: size")]);

        assert_eq!(template.version, "1.0.0");
        assert!(text.starts_with("You are Maya, a friendly barista"));
        assert!(text.contains("- update_size: size"));
        assert!(!text.contains("{{operations}}"));
    }
}
