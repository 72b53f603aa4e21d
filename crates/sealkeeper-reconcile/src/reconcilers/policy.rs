//! Policy section: a straight create-or-update, no read-before-write needed
//! since the server's policy-write endpoint is already idempotent.

use sealkeeper_client::SealedStoreApi;
use tracing::info;

use crate::config::PolicyConfig;
use crate::error::ReconcileError;

/// Write every configured policy document, in document order.
///
/// # Errors
///
/// Returns the first client error.
pub async fn reconcile<C: SealedStoreApi>(client: &C, policies: &[PolicyConfig]) -> Result<(), ReconcileError> {
    for policy in policies {
        let rules = format_rules(&policy.rules);
        client.put_policy(&policy.name, &rules).await?;
        info!(name = %policy.name, "wrote policy");
    }
    Ok(())
}

/// Run a policy document's rules through a canonical printer before it is
/// sent to the server: trailing whitespace stripped per line, runs of
/// blank lines collapsed to one, and a single trailing newline enforced.
/// The server accepts unformatted source just as well, but a stable
/// on-disk form keeps diffs against a previous reconciliation run small.
#[must_use]
fn format_rules(rules: &str) -> String {
    let mut out = String::with_capacity(rules.len());
    let mut blank_run = false;
    for line in rules.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if blank_run {
                continue;
            }
            blank_run = true;
        } else {
            blank_run = false;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcilers::test_support::RecordingClient;

    #[test]
    fn format_rules_strips_trailing_whitespace() {
        let formatted = format_rules("path \"secret/*\" {   \n  capabilities = [\"read\"]\n}");
        assert_eq!(formatted, "path \"secret/*\" {\n  capabilities = [\"read\"]\n}\n");
    }

    #[test]
    fn format_rules_collapses_blank_line_runs() {
        let formatted = format_rules("a\n\n\n\nb\n");
        assert_eq!(formatted, "a\n\nb\n");
    }

    #[tokio::test]
    async fn reconcile_writes_every_policy_in_order() {
        let client = RecordingClient::default();
        let policies = vec![
            PolicyConfig {
                name: "a".to_owned(),
                rules: "path \"x\" { capabilities = [\"read\"] }".to_owned(),
            },
            PolicyConfig {
                name: "b".to_owned(),
                rules: "path \"y\" { capabilities = [\"read\"] }".to_owned(),
            },
        ];
        reconcile(&client, &policies).await.unwrap();

        let calls = client.calls();
        let a_idx = calls.iter().position(|c| c == "put_policy:a").unwrap();
        let b_idx = calls.iter().position(|c| c == "put_policy:b").unwrap();
        assert!(a_idx < b_idx);
    }
}
