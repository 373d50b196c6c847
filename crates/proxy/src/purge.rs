use {
    serde_json::Value,
    tracing::{info, warn},
};

use crate::{client::RemoteDataProxy, error::Error, outcome::QueryOutcome};

pub(crate) const PURGE_QUERY: &str = "delete from chat_logs where created_at < ?";

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Reply sent when the purge argument is unusable or the delete failed.
pub const PURGE_FAILED_MESSAGE: &str = "요청이 잘못되었거나 에러가 발생하였습니다.";

pub fn purge_success_message(days: f64) -> String {
    format!("{}일 이상 지난 데이터가 삭제되었습니다.", format_general(days))
}

/// Six significant digits with trailing zeros dropped, switching to an
/// exponent outside `1e-4..1e6` (`1.5`, `1.23457`, `1e+20`, `1e-05`).
fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (-4..6).contains(&exponent) {
        let decimals = usize::try_from(5 - exponent).unwrap_or_default();
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

fn parse_days(days: &str) -> Result<f64, Error> {
    let parsed: f64 = days
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("\"{days}\" is not a number: {e}")))?;
    if !parsed.is_finite() {
        return Err(Error::validation(format!("\"{days}\" is not finite")));
    }
    Ok(parsed)
}

impl RemoteDataProxy {
    /// Delete chat logs older than `days` days and return the user-facing
    /// result message. Unparseable input issues no request.
    pub async fn purge_logs_older_than(&self, days: &str) -> String {
        self.purge_logs_older_than_at(days, chatrelay_common::time::unix_now_f64())
            .await
    }

    pub(crate) async fn purge_logs_older_than_at(&self, days: &str, now: f64) -> String {
        let days = match parse_days(days) {
            Ok(days) => days,
            Err(e) => {
                warn!(error = %e, "purge rejected");
                return PURGE_FAILED_MESSAGE.to_string();
            },
        };

        #[allow(clippy::cast_possible_truncation)]
        let cutoff = (now - days * SECONDS_PER_DAY).round() as i64;

        match self.execute(PURGE_QUERY, Some(&[Value::from(cutoff)])).await {
            QueryOutcome::Failed(e) => {
                warn!(days, cutoff, error = %e, "chat log purge failed");
                PURGE_FAILED_MESSAGE.to_string()
            },
            QueryOutcome::Rows(_) | QueryOutcome::Empty => {
                info!(days, cutoff, "chat logs purged");
                purge_success_message(days)
            },
        }
    }
}
