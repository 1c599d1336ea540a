use chrono::NaiveDate;
use reqwest::Client;

use crate::db::Database;
use crate::error::AppError;
use crate::notifier::Notifier;
use crate::parser;
use crate::schedule;

/// The change-detection pipeline with every collaborator injected up front.
pub struct Pipeline {
    client: Client,
    db: Database,
    notifier: Option<Notifier>,
    url_template: String,
    class_name: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub scanned: usize,
    pub new: u32,
    pub fetch_failures: u32,
    pub delivery_failures: u32,
}

impl Pipeline {
    pub fn new(
        client: Client,
        db: Database,
        notifier: Option<Notifier>,
        url_template: String,
        class_name: String,
    ) -> Self {
        Self {
            client,
            db,
            notifier,
            url_template,
            class_name,
        }
    }

    /// One poll cycle: today's page first, then the next school day's.
    ///
    /// A failed fetch only skips that day until the next poll. Malformed rows
    /// and store failures propagate; the caller decides whether to keep the
    /// process alive.
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<CycleStats, AppError> {
        let mut stats = CycleStats::default();

        for day in schedule::target_days(today) {
            match parser::fetch_day(&self.client, &self.url_template, day).await {
                Ok(html) => {
                    let outcome = self.process_document(&html, day).await?;
                    tracing::info!(
                        day = %day,
                        scanned = outcome.scanned,
                        new = outcome.new,
                        "Day processed"
                    );
                    stats.scanned += outcome.scanned;
                    stats.new += outcome.new;
                    stats.delivery_failures += outcome.delivery_failures;
                }
                Err(e) => {
                    stats.fetch_failures += 1;
                    tracing::warn!(day = %day, error = %e, "Fetch failed, will retry on the next poll");
                }
            }
        }

        Ok(stats)
    }

    /// Extract, normalize, dedup and notify for one day's page.
    ///
    /// Records are persisted before delivery is attempted, so a failed
    /// delivery is never retried as if the announcement were new again.
    pub async fn process_document(
        &self,
        html: &str,
        day: NaiveDate,
    ) -> Result<CycleStats, AppError> {
        let subs = parser::parse_substitutions(html, &self.class_name, day)?;
        let mut stats = CycleStats {
            scanned: subs.len(),
            ..Default::default()
        };

        for sub in &subs {
            if !self.db.insert_if_new(sub)? {
                continue;
            }
            stats.new += 1;

            match &self.notifier {
                Some(notifier) => match notifier.send_substitution(sub).await {
                    Ok(()) => {
                        tracing::info!(
                            lesson = %sub.lesson_num,
                            subject = %sub.lesson_name,
                            "Notification sent"
                        );
                    }
                    Err(e) => {
                        stats.delivery_failures += 1;
                        tracing::error!(
                            lesson = %sub.lesson_num,
                            error = %e,
                            "Failed to deliver notification"
                        );
                    }
                },
                None => {
                    println!(
                        "[DRY-RUN] Would notify: Lekcja {} - {}",
                        sub.lesson_num, sub.lesson_name
                    );
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Substitution;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SAMPLE_PAGE: &str = r#"<table>
<tbody>
<tr class="table-active">
<td colspan="6">Klasa 3A (wych. mgr Kowalska)</td>
</tr>
<tr>
<td>2</td>
<td>Matematyka</td>
<td>mgr Nowak</td>
<td>101</td>
<td>okienko</td>
<td>mgr Kowalski</td>
</tr>
<tr class="table-active">
<td colspan="6">Klasa 3B (wych. mgr Nowicka)</td>
</tr>
</tbody>
</table>"#;

    const BROKEN_PAGE: &str = r#"<table>
<tbody>
<tr class="table-active">
<td colspan="6">Klasa 3A (wych. mgr Kowalska)</td>
</tr>
<tr>
<td>2</td><td>Matematyka</td><td>mgr Nowak</td>
</tr>
</tbody>
</table>"#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    fn expected_sub() -> Substitution {
        Substitution {
            lesson_num: "2".to_string(),
            lesson_name: "Matematyka".to_string(),
            substitute: "mgr Nowak".to_string(),
            room: "101".to_string(),
            additional_info: "okienko".to_string(),
            teacher: "mgr Kowalski".to_string(),
            day: "2026-08-07".to_string(),
        }
    }

    /// Webhook stand-in: answers every request with `status_line`, counts
    /// hits, and records request payloads.
    async fn webhook_server(
        status_line: &'static str,
        hits: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<String>>>,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                hits.fetch_add(1, Ordering::SeqCst);

                let mut data = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            data.extend_from_slice(&buf[..n]);
                            let headers_done = data.windows(4).any(|w| w == b"\r\n\r\n");
                            if headers_done && data.ends_with(b"}") {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                bodies.lock().unwrap().push(String::from_utf8_lossy(&data).into_owned());

                let response =
                    format!("HTTP/1.1 {status_line}\r\nconnection: close\r\n\r\n");
                let _ = sock.write_all(response.as_bytes()).await;
            }
        });
        addr
    }

    fn make_pipeline(notifier: Option<Notifier>) -> Pipeline {
        Pipeline::new(
            Client::new(),
            Database::init(":memory:").unwrap(),
            notifier,
            "http://127.0.0.1:9/plan/{date}".to_string(),
            "3A".to_string(),
        )
    }

    #[tokio::test]
    async fn test_new_record_is_persisted_and_notified_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let addr = webhook_server("204 No Content", hits.clone(), bodies.clone()).await;

        let notifier = Notifier::new(Client::new(), format!("http://{addr}/hook"), None);
        let pipeline = make_pipeline(Some(notifier));

        let first = pipeline.process_document(SAMPLE_PAGE, day()).await.unwrap();
        assert_eq!(first.scanned, 1);
        assert_eq!(first.new, 1);
        assert_eq!(first.delivery_failures, 0);

        // Unchanged page, unchanged store: nothing new, nothing sent.
        let second = pipeline.process_document(SAMPLE_PAGE, day()).await.unwrap();
        assert_eq!(second.new, 0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let bodies = bodies.lock().unwrap();
        assert!(bodies[0].contains(r#""title":"Lekcja: 2""#));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_record_persisted() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let addr = webhook_server("500 Internal Server Error", hits.clone(), bodies).await;

        let notifier = Notifier::new(Client::new(), format!("http://{addr}/hook"), None);
        let pipeline = make_pipeline(Some(notifier));

        let first = pipeline.process_document(SAMPLE_PAGE, day()).await.unwrap();
        assert_eq!(first.new, 1);
        assert_eq!(first.delivery_failures, 1);
        assert!(pipeline.db.contains(&expected_sub()).unwrap());

        // The announcement was already marked seen, so the failed delivery is
        // not replayed on the next cycle.
        let second = pipeline.process_document(SAMPLE_PAGE, day()).await.unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.delivery_failures, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dry_run_still_persists() {
        let pipeline = make_pipeline(None);
        let stats = pipeline.process_document(SAMPLE_PAGE, day()).await.unwrap();
        assert_eq!(stats.new, 1);
        assert!(pipeline.db.contains(&expected_sub()).unwrap());
    }

    #[tokio::test]
    async fn test_malformed_row_propagates() {
        let pipeline = make_pipeline(None);
        let err = pipeline
            .process_document(BROKEN_PAGE, day())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedRow { .. }));
    }
}
