use std::time::Duration;

use faqbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::{CommandResult, EXIT_CHECK_FAILURE};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

const READINESS_CHECKS: [&str; 3] =
    ["discord_token_readiness", "answer_service_reachability", "feedback_service_reachability"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_CHECK_FAILURE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(error) => {
                    return summarize(vec![DoctorCheck {
                        name: "async_runtime",
                        status: CheckStatus::Fail,
                        details: format!("failed to initialize async runtime: {error}"),
                    }]);
                }
            };
            let mut checks = vec![config_passed()];
            checks.extend(runtime.block_on(readiness_checks(&config)));
            checks
        }
        Err(error) => {
            let mut checks = vec![DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }];
            checks.extend(READINESS_CHECKS.iter().map(|&name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
            checks
        }
    };

    summarize(checks)
}

fn config_passed() -> DoctorCheck {
    DoctorCheck {
        name: "config_validation",
        status: CheckStatus::Pass,
        details: "configuration loaded and validated".to_string(),
    }
}

pub fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Network probes for a loaded config, in [`READINESS_CHECKS`] order.
pub async fn readiness_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            return READINESS_CHECKS
                .iter()
                .map(|&name| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to build http client: {error}"),
                })
                .collect();
        }
    };

    vec![
        check_discord_token(&client, config).await,
        check_reachable(&client, READINESS_CHECKS[1], &config.services.rag_api).await,
        check_reachable(&client, READINESS_CHECKS[2], &config.services.feedback_api).await,
    ]
}

async fn check_discord_token(client: &reqwest::Client, config: &AppConfig) -> DoctorCheck {
    let name = READINESS_CHECKS[0];
    let url = format!("{}/users/@me", config.discord.api_base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .header("Authorization", format!("Bot {}", config.discord.token.expose_secret()))
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: "bot token accepted by Discord".to_string(),
        },
        Ok(response) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("Discord rejected the bot token with HTTP {}", response.status()),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("Discord API unreachable: {error}"),
        },
    }
}

/// Any HTTP response counts as reachable; the endpoints only accept POST.
async fn check_reachable(client: &reqwest::Client, name: &'static str, url: &str) -> DoctorCheck {
    match client.get(url).send().await {
        Ok(response) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{url}` answered with HTTP {}", response.status().as_u16()),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{url}` unreachable: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
