use futures_util::future::join_all;
use std::fmt;
use std::future::Future;

use crate::error::{Error, Result};
use crate::models::FindingUpdate;

/// Drive every future concurrently on the current task and collect one
/// outcome per branch, in input order. A failing branch does not cancel
/// its siblings.
pub async fn gather<I, F, T>(tasks: I) -> Vec<Result<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    join_all(tasks).await
}

#[derive(Debug, Clone)]
pub struct BulkItemResult {
    pub finding_number: String,
    pub outcome: Result<()>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-item outcomes of a bulk update, in input order.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub items: Vec<BulkItemResult>,
}

impl BulkResult {
    pub fn succeeded(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|i| i.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|i| !i.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(BulkItemResult::is_success)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for BulkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded().count(),
            self.failed().count()
        )
    }
}

// Local checks before an update is sent
pub fn validate_update(update: &FindingUpdate) -> Result<()> {
    if update.finding_number.trim().is_empty() {
        return Err(Error::InvalidRequest("finding_number is empty".into()));
    }
    if update.finding_status.is_none() && update.comment.is_none() {
        return Err(Error::InvalidRequest(format!(
            "update for {} changes nothing",
            update.finding_number
        )));
    }
    Ok(())
}

/// Parse `NUMBER=STATUS[:COMMENT]`.
pub fn parse_update(spec: &str) -> Result<FindingUpdate> {
    let (number, rest) = spec.split_once('=').ok_or_else(|| {
        Error::InvalidRequest(format!("expected NUMBER=STATUS[:COMMENT], got {:?}", spec))
    })?;
    let (status, comment) = match rest.split_once(':') {
        Some((status, comment)) => (status, Some(comment)),
        None => (rest, None),
    };
    let mut update = FindingUpdate::status(number.trim(), status.trim());
    if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        update = update.comment(comment);
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn gather_keeps_order_and_every_outcome() {
        let tasks = (0..5u64).map(|i| async move {
            // finish in reverse order
            sleep(Duration::from_millis(50 * (5 - i))).await;
            if i == 2 {
                Err(Error::api(format!("asset {} failed", i)))
            } else {
                Ok(i)
            }
        });
        let results = gather(tasks).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        assert!(results[2].is_err());
        assert_eq!(results[4].as_ref().ok(), Some(&4));
    }

    #[test]
    fn summary_counts_outcomes() {
        let result = BulkResult {
            items: vec![
                BulkItemResult {
                    finding_number: "VULN-001".into(),
                    outcome: Ok(()),
                },
                BulkItemResult {
                    finding_number: "".into(),
                    outcome: Err(Error::InvalidRequest("finding_number is empty".into())),
                },
            ],
        };
        assert!(!result.all_succeeded());
        assert_eq!(result.to_string(), "1 succeeded, 1 failed");
        assert_eq!(result.failed().next().map(|i| i.finding_number.as_str()), Some(""));
    }

    #[test]
    fn validation_rejects_empty_updates() {
        assert!(validate_update(&FindingUpdate::status("VULN-001", "In Progress")).is_ok());
        assert!(validate_update(&FindingUpdate::status(" ", "In Progress")).is_err());
        let noop = FindingUpdate {
            finding_number: "VULN-001".into(),
            finding_status: None,
            comment: None,
        };
        assert!(matches!(validate_update(&noop), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn parses_cli_update_specs() {
        let update = parse_update("VULN-001=In Progress:Working on fix").unwrap();
        assert_eq!(update.finding_number, "VULN-001");
        assert_eq!(update.finding_status.as_deref(), Some("In Progress"));
        assert_eq!(update.comment.as_deref(), Some("Working on fix"));

        let bare = parse_update("VULN-002=Closed").unwrap();
        assert_eq!(bare.comment, None);

        assert!(parse_update("VULN-003").is_err());
    }
}
