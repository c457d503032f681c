//! Assembly of the literal instruction text sent to the external agent
//!
//! Ordering is fixed: security preamble, session header, current-state block,
//! optional scrape block, trimmed history, the new message, and finally any
//! attachment directives. Callers pass history with the just-stored user
//! message already excluded so it is not duplicated against the final line.

use crate::models::{Attachment, Message, TenantIdentity};

/// History turns included in the prompt
pub const HISTORY_LIMIT: usize = 10;

/// The agent holds direct database credentials, so org isolation is enforced
/// in the instructions themselves. The host environment does not persist
/// session variables between tool invocations, which is why the scoping
/// statement and the write must travel in one atomic call.
fn security_preamble(org_id: &str) -> String {
    format!(
        "[SECURITY — ORG SCOPING]\n\
         You are operating on behalf of exactly one merchant organization: {org}.\n\
         Every database WRITE must be scoped to org_id '{org}'. The execution\n\
         environment does NOT persist session variables between separate tool\n\
         calls, so never issue a scoping statement on its own. Combine the\n\
         scoping directive and the write in a single atomic call, e.g.:\n\
         SELECT set_config('app.current_org', '{org}', true); INSERT INTO ...;\n\
         Never read or modify rows belonging to any other org_id.",
        org = org_id
    )
}

pub fn assemble(
    identity: &TenantIdentity,
    new_message: &str,
    history: &[Message],
    snapshot_text: &str,
    enrichment_text: Option<&str>,
    attachments: &[Attachment],
) -> String {
    let mut prompt = String::new();

    // 1. Security preamble
    prompt.push_str(&security_preamble(&identity.org_id));
    prompt.push_str("\n\n");

    // 2. Session header
    prompt.push_str("[ONBOARDING SESSION]\n");
    prompt.push_str(&format!("Org ID: {}\n", identity.org_id));
    prompt.push_str(&format!("User Email: {}\n", identity.email));
    prompt.push_str(&format!("User Name: {}\n\n", identity.display_name));

    // 3. Current-state block
    prompt.push_str("Current workspace state:\n");
    if snapshot_text.trim().is_empty() {
        prompt.push_str("No workspace state available yet.\n");
    } else {
        prompt.push_str(snapshot_text);
        prompt.push('\n');
    }
    prompt.push('\n');

    // 4. Enrichment block, verbatim
    if let Some(enrichment) = enrichment_text {
        prompt.push_str(enrichment);
        prompt.push_str("\n\n");
    }

    // 5. Trimmed conversation history
    if !history.is_empty() {
        let start = history.len().saturating_sub(HISTORY_LIMIT);
        prompt.push_str("Recent conversation:\n");
        for msg in &history[start..] {
            prompt.push_str(&format!("{}: {}\n", msg.role.prompt_label(), msg.content));
        }
        prompt.push('\n');
    }

    // 6. The new message, always last
    prompt.push_str(&format!("Merchant says: {}", new_message));

    // Attachment directives trail the message; the agent fetches the files itself
    if !attachments.is_empty() {
        prompt.push_str("\n\n[ATTACHED FILES]\n");
        for att in attachments {
            prompt.push_str(&format!(
                "- {} ({}) at {}\n",
                att.name, att.media_type, att.url
            ));
        }
        prompt.push_str("Retrieve and process these files yourself as part of handling the request.");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    fn identity() -> TenantIdentity {
        TenantIdentity {
            user_id: "u1".to_string(),
            org_id: "acme".to_string(),
            email: "jo@acme.test".to_string(),
            display_name: "Jo".to_string(),
        }
    }

    fn history_of(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                };
                Message::new("acme", "u1", role, &format!("turn {}", i))
            })
            .collect()
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let prompt = assemble(
            &identity(),
            "set up my store",
            &history_of(2),
            "Branding: Not configured",
            Some("[WEBSITE SCRAPE RESULTS]\nBrand: Acme"),
            &[],
        );

        let preamble = prompt.find("[SECURITY — ORG SCOPING]").unwrap();
        let header = prompt.find("[ONBOARDING SESSION]").unwrap();
        let state = prompt.find("Current workspace state:").unwrap();
        let scrape = prompt.find("[WEBSITE SCRAPE RESULTS]").unwrap();
        let history = prompt.find("Recent conversation:").unwrap();
        let message = prompt.find("Merchant says: set up my store").unwrap();

        assert!(preamble < header);
        assert!(header < state);
        assert!(state < scrape);
        assert!(scrape < history);
        assert!(history < message);
    }

    #[test]
    fn new_message_is_last_without_attachments() {
        let prompt = assemble(&identity(), "hello", &[], "state", None, &[]);
        assert!(prompt.ends_with("Merchant says: hello"));
    }

    #[test]
    fn history_is_trimmed_to_last_ten() {
        let prompt = assemble(&identity(), "hi", &history_of(15), "state", None, &[]);
        assert!(!prompt.contains("turn 4"));
        assert!(prompt.contains("turn 5"));
        assert!(prompt.contains("turn 14"));
    }

    #[test]
    fn roles_render_distinct_labels() {
        let prompt = assemble(&identity(), "hi", &history_of(2), "state", None, &[]);
        assert!(prompt.contains("Merchant: turn 0"));
        assert!(prompt.contains("Assistant: turn 1"));
    }

    #[test]
    fn empty_snapshot_renders_fallback_line() {
        let prompt = assemble(&identity(), "hi", &[], "", None, &[]);
        assert!(prompt.contains("No workspace state available yet."));
    }

    #[test]
    fn preamble_names_the_org_and_atomic_scoping() {
        let prompt = assemble(&identity(), "hi", &[], "state", None, &[]);
        assert!(prompt.contains("org_id 'acme'"));
        assert!(prompt.contains("single atomic call"));
    }

    #[test]
    fn attachments_render_as_trailing_directive() {
        let attachments = vec![Attachment {
            url: "https://files.test/menu.pdf".to_string(),
            name: "menu.pdf".to_string(),
            media_type: "application/pdf".to_string(),
        }];
        let prompt = assemble(&identity(), "import this", &[], "state", None, &attachments);

        let message = prompt.find("Merchant says: import this").unwrap();
        let block = prompt.find("[ATTACHED FILES]").unwrap();
        assert!(message < block);
        assert!(prompt.contains("menu.pdf (application/pdf) at https://files.test/menu.pdf"));
    }
}
