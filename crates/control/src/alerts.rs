use chrono::Utc;
use power_metrics::tracing::TracingService;
use power_models::{AlertSubscription, AlertsConfig, MonitorError, ProjectRecord};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, instrument, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
}

/// Sends new-project alert e-mails through the Resend API.
#[derive(Clone)]
pub struct AlertNotifier {
    client: Client,
    api_key: String,
    from_email: String,
    url: String,
}

impl AlertNotifier {
    /// `None` when no API key is configured; alerts are then skipped entirely.
    pub fn from_config(config: &AlertsConfig) -> Result<Option<Self>, MonitorError> {
        if !config.enabled() {
            warn!("No Resend API key configured, e-mail alerts disabled");
            return Ok(None);
        }
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| MonitorError::ConfigError {
                reason: format!("Failed to build alert client: {e}"),
            })?;

        Ok(Some(Self {
            client,
            api_key: config.resend_api_key.clone().unwrap_or_default(),
            from_email: config.from_email.clone(),
            url: config.resend_url.clone(),
        }))
    }

    /// One e-mail per subscription with at least one matching project. Delivery
    /// failures are logged and do not stop the remaining subscriptions.
    #[instrument(skip_all, fields(subscriptions = subscriptions.len(), projects = projects.len()))]
    pub async fn notify(&self, subscriptions: &[AlertSubscription], projects: &[ProjectRecord]) -> usize {
        if projects.is_empty() {
            return 0;
        }
        let mut sent = 0;
        for subscription in subscriptions {
            let matching: Vec<&ProjectRecord> =
                projects.iter().filter(|p| subscription.matches(p)).collect();
            if matching.is_empty() {
                continue;
            }
            match self.send(&subscription.email, &matching).await {
                Ok(()) => {
                    TracingService::log_alert_sent(&subscription.email, matching.len());
                    sent += 1;
                }
                Err(e) => error!(email = %subscription.email, error = %e, "Failed to send alert"),
            }
        }
        sent
    }

    async fn send(&self, to: &str, projects: &[&ProjectRecord]) -> Result<(), MonitorError> {
        let email = OutgoingEmail {
            from: &self.from_email,
            to: vec![to],
            subject: subject_line(projects.len()),
            html: render_alert(projects),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await
            .map_err(|e| MonitorError::AlertDelivery {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::AlertDelivery {
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(())
    }
}

pub fn subject_line(count: usize) -> String {
    format!(
        "⚡ {count} New Power Project(s) - {}",
        Utc::now().format("%Y-%m-%d")
    )
}

pub fn render_alert(projects: &[&ProjectRecord]) -> String {
    let mut html = format!(
        "<h2>New Power Projects Alert</h2>\n<p>{} new project(s) found matching your criteria:</p>\n<ul>\n",
        projects.len()
    );
    for project in projects {
        let location = [project.county.as_str(), project.state.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let customer = if project.customer.is_empty() {
            "Unknown"
        } else {
            &project.customer
        };
        html.push_str(&format!(
            "<li><strong>{}</strong><br>Capacity: {} MW<br>Location: {}<br>Customer: {}<br>Source: {}<br><br></li>\n",
            escape_html(&project.project_name),
            project.capacity_mw,
            escape_html(&location),
            escape_html(customer),
            escape_html(&project.source),
        ));
    }
    html.push_str("</ul>\n<p>Visit your dashboard for more details.</p>\n");
    html
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use power_collector::RawProject;

    fn project(name: &str, customer: &str) -> ProjectRecord {
        RawProject {
            request_id: "PJM_1".into(),
            project_name: name.into(),
            capacity_mw: 300.0,
            county: "Loudoun".into(),
            state: "VA".into(),
            customer: customer.into(),
            ..Default::default()
        }
        .into_record("PJM", "PJM", "")
    }

    #[test]
    fn subject_counts_projects() {
        let subject = subject_line(3);
        assert!(subject.starts_with("⚡ 3 New Power Project(s) - "));
        assert_eq!(subject.len(), "⚡ 3 New Power Project(s) - ".len() + 10);
    }

    #[test]
    fn rendered_alert_escapes_fields() {
        let a = project("<script>alert(1)</script>", "");
        let b = project("AT&T Campus", "Big \"Cloud\"");
        let html = render_alert(&[&a, &b]);

        assert!(html.contains("2 new project(s)"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("AT&amp;T Campus"));
        assert!(html.contains("Customer: Unknown"));
        assert!(html.contains("Big &quot;Cloud&quot;"));
        assert!(html.contains("Location: Loudoun, VA"));
        assert!(html.contains("Capacity: 300 MW"));
    }

    #[test]
    fn disabled_without_api_key() {
        let config = power_models::Config::default();
        assert!(AlertNotifier::from_config(&config.alerts).unwrap().is_none());
    }
}
